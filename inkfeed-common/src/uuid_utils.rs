//! Identifier utilities

use uuid::Uuid;

/// Length of the short record token
pub const SHORT_ID_LEN: usize = 8;

/// Generate a new UUIDv4
pub fn generate() -> Uuid {
    Uuid::new_v4()
}

/// Short random token used for record ids and upload file names
///
/// First eight hex digits of a fresh v4 UUID.
pub fn short_id() -> String {
    let mut id = generate().simple().to_string();
    id.truncate(SHORT_ID_LEN);
    id
}
