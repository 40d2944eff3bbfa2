/// Header carrying the HMAC-SHA256 signature of the raw webhook body
pub const SIGNATURE_HEADER: &str = "X-Signature-256";
pub const SIGNATURE_PREFIX: &str = "sha256=";

/// Provider envelope object wrapping the event fields
pub const ENVELOPE_DATA_FIELD: &str = "data";

pub const FIELD_CALL_ID: &str = "call_id";
pub const FIELD_CONTACT_ID: &str = "contact_id";
pub const FIELD_TALKING_TIME: &str = "talking_time";
pub const FIELD_WAITING_TIME: &str = "waiting_time";
pub const FIELD_PHONE_NUMBER: &str = "phone_number";
pub const FIELD_AGENT: &str = "agent";
pub const FIELD_DIRECTION: &str = "direction";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_FIRST_NAME: &str = "first_name";
pub const FIELD_LAST_NAME: &str = "last_name";

pub const SYNTHETIC_ID_PREFIX: &str = "syn-";
/// Hex characters of the content hash kept in a synthesized id
pub const SYNTHETIC_ID_HEX_LEN: usize = 16;
