//! Telephone number value types (NANP, US and Canada).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from parsing the value types in this module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// The input could not be normalized to an E.164 NANP number.
    #[error("invalid phone number: {0}")]
    InvalidPhoneNumber(String),

    /// The input is not a valid three-digit NANP area code.
    #[error("invalid area code: {0}")]
    InvalidAreaCode(String),

    /// The input is not a supported country code.
    #[error("invalid country: {0} (expected US or CA)")]
    InvalidCountry(String),
}

/// An E.164 telephone number in the North American Numbering Plan.
///
/// Stored in canonical `+1XXXXXXXXXX` form. Accepts 10-digit national
/// input, 11-digit input with a leading `1`, and already-prefixed `+1`
/// input, with common separators stripped.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Parses and normalizes a phone number to E.164.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        let mut digits = String::with_capacity(11);
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '+' if i == 0 => {}
                ' ' | '-' | '.' | '(' | ')' => {}
                c if c.is_ascii_digit() => digits.push(c),
                _ => return Err(ParseError::InvalidPhoneNumber(input.to_string())),
            }
        }

        let national = match digits.len() {
            10 => digits.as_str(),
            11 if digits.starts_with('1') => &digits[1..],
            _ => return Err(ParseError::InvalidPhoneNumber(input.to_string())),
        };

        // NANP area codes never start with 0 or 1.
        if national.starts_with('0') || national.starts_with('1') {
            return Err(ParseError::InvalidPhoneNumber(input.to_string()));
        }

        Ok(Self(format!("+1{national}")))
    }

    /// Returns the canonical `+1XXXXXXXXXX` form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the ten national digits (without the `+1` prefix).
    pub fn national(&self) -> &str {
        &self.0[2..]
    }

    /// Returns the number's area code.
    pub fn area_code(&self) -> AreaCode {
        AreaCode(self.national()[..3].to_string())
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PhoneNumber {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(number: PhoneNumber) -> Self {
        number.0
    }
}

/// A three-digit NANP area code (NPA).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String")]
#[serde(into = "String")]
pub struct AreaCode(String);

impl AreaCode {
    /// Parses a three-digit area code.
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        let valid = trimmed.len() == 3
            && trimmed.chars().all(|c| c.is_ascii_digit())
            && !trimmed.starts_with('0')
            && !trimmed.starts_with('1');
        if !valid {
            return Err(ParseError::InvalidAreaCode(input.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the area code digits.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AreaCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for AreaCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AreaCode {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AreaCode> for String {
    fn from(code: AreaCode) -> Self {
        code.0
    }
}

/// Countries served by the acquisition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Country {
    #[serde(rename = "US")]
    Us,
    #[serde(rename = "CA")]
    Ca,
}

impl Country {
    /// Returns the ISO 3166-1 alpha-2 code.
    pub fn as_iso(&self) -> &'static str {
        match self {
            Country::Us => "US",
            Country::Ca => "CA",
        }
    }
}

impl std::fmt::Display for Country {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_iso())
    }
}

impl std::str::FromStr for Country {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "US" => Ok(Country::Us),
            "CA" => Ok(Country::Ca),
            _ => Err(ParseError::InvalidCountry(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ten_digit_national_number() {
        let number = PhoneNumber::parse("9345550142").unwrap();
        assert_eq!(number.as_str(), "+19345550142");
    }

    #[test]
    fn parses_eleven_digit_number_with_country_code() {
        let number = PhoneNumber::parse("19345550142").unwrap();
        assert_eq!(number.as_str(), "+19345550142");
    }

    #[test]
    fn parses_e164_input_unchanged() {
        let number = PhoneNumber::parse("+19345550142").unwrap();
        assert_eq!(number.as_str(), "+19345550142");
    }

    #[test]
    fn strips_common_separators() {
        let number = PhoneNumber::parse("(934) 555-0142").unwrap();
        assert_eq!(number.as_str(), "+19345550142");
    }

    #[test]
    fn rejects_short_and_malformed_input() {
        assert!(PhoneNumber::parse("555").is_err());
        assert!(PhoneNumber::parse("abc5550142x").is_err());
        assert!(PhoneNumber::parse("29345550142").is_err());
        assert!(PhoneNumber::parse("0345550142").is_err());
    }

    #[test]
    fn extracts_area_code() {
        let number = PhoneNumber::parse("+19345550142").unwrap();
        assert_eq!(number.area_code().as_str(), "934");
        assert_eq!(number.national(), "9345550142");
    }

    #[test]
    fn phone_number_deserialization_validates() {
        let number: PhoneNumber = serde_json::from_str("\"9345550142\"").unwrap();
        assert_eq!(number.as_str(), "+19345550142");
        assert!(serde_json::from_str::<PhoneNumber>("\"bogus\"").is_err());
    }

    #[test]
    fn area_code_accepts_three_digits() {
        assert_eq!(AreaCode::parse("934").unwrap().as_str(), "934");
        assert!(AreaCode::parse("93").is_err());
        assert!(AreaCode::parse("1234").is_err());
        assert!(AreaCode::parse("034").is_err());
        assert!(AreaCode::parse("9a4").is_err());
    }

    #[test]
    fn country_parses_case_insensitively() {
        assert_eq!("us".parse::<Country>().unwrap(), Country::Us);
        assert_eq!("CA".parse::<Country>().unwrap(), Country::Ca);
        assert!("UK".parse::<Country>().is_err());
    }

    #[test]
    fn country_serializes_as_iso_code() {
        assert_eq!(serde_json::to_string(&Country::Us).unwrap(), "\"US\"");
        let country: Country = serde_json::from_str("\"CA\"").unwrap();
        assert_eq!(country, Country::Ca);
    }
}
