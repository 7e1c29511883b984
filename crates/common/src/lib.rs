pub mod ids;
pub mod phone;

pub use ids::{BackorderId, OrderId, RequestId};
pub use phone::{AreaCode, Country, ParseError, PhoneNumber};
