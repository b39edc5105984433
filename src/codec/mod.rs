//! Wire codec for the vendor XML protocol
//!
//! Translates between typed sync requests/records and the external
//! accounting server's envelope format. Request construction is pure string
//! building with escaping; response extraction is tolerant and never fails.

pub mod convert;
pub mod records;
pub mod request;
pub mod response;

pub use convert::*;
pub use records::*;
pub use request::*;
pub use response::*;
