//! The per-number record shape the inventory endpoint ingests.

use common::{AreaCode, PhoneNumber};
use serde::Serialize;

/// NANP area codes assigned to Canada.
const CANADIAN_AREA_CODES: &[&str] = &[
    "204", "226", "236", "249", "250", "289", "306", "343", "365", "403", "416", "418", "431",
    "437", "438", "450", "506", "514", "519", "548", "579", "581", "587", "604", "613", "639",
    "647", "705", "709", "742", "778", "780", "782", "807", "819", "825", "867", "873", "902",
    "905",
];

const US_REGION_ID: i64 = 101;
const CA_REGION_ID: i64 = 102;
const US_CARRIER_TIER_ID: i64 = 10000252;
const CA_CARRIER_TIER_ID: i64 = 10000253;

/// Returns true if the area code belongs to Canada.
pub fn is_canadian(area_code: &AreaCode) -> bool {
    CANADIAN_AREA_CODES.contains(&area_code.as_str())
}

/// Fixed platform identifiers stamped onto every published record.
#[derive(Debug, Clone)]
pub struct InventoryIdentity {
    pub carrier_id: String,
    pub account_id: i64,
    pub sub_account_id: i64,
    pub app_id: String,
}

/// One number as the inventory endpoint wants it.
///
/// Region and carrier tier derive from the number's area code; the rest
/// comes from the configured identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NumberRecord {
    pub number: String,
    pub number_type: String,
    pub voice_enabled: bool,
    pub sms_enabled: bool,
    pub mms_enabled: bool,
    pub carrier_id: String,
    pub carrier_tier_id: i64,
    pub region_id: i64,
    pub account_id: i64,
    pub sub_account_id: i64,
    pub app_id: String,
}

impl NumberRecord {
    /// Builds the record for one provisioned number.
    pub fn for_number(number: &PhoneNumber, identity: &InventoryIdentity) -> Self {
        let canadian = is_canadian(&number.area_code());
        Self {
            number: number.as_str().to_string(),
            number_type: "LOCAL".to_string(),
            voice_enabled: true,
            sms_enabled: true,
            mms_enabled: false,
            carrier_id: identity.carrier_id.clone(),
            carrier_tier_id: if canadian {
                CA_CARRIER_TIER_ID
            } else {
                US_CARRIER_TIER_ID
            },
            region_id: if canadian { CA_REGION_ID } else { US_REGION_ID },
            account_id: identity.account_id,
            sub_account_id: identity.sub_account_id,
            app_id: identity.app_id.clone(),
        }
    }

    /// Builds records for a whole batch of numbers.
    pub fn for_numbers(numbers: &[PhoneNumber], identity: &InventoryIdentity) -> Vec<Self> {
        numbers
            .iter()
            .map(|number| Self::for_number(number, identity))
            .collect()
    }
}
