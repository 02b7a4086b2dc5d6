pub const MAX_RESOURCES: usize = 1_000;
pub const MAX_BOOKINGS_PER_RESOURCE: usize = 10_000;
pub const MAX_LOCATION_LEN: usize = 64;
pub const MAX_LABEL_LEN: usize = 64;
pub const MAX_NAME_LEN: usize = 200;
pub const MAX_PHONE_LEN: usize = 40;
pub const MAX_NOTES_LEN: usize = 2_000;
/// Longest accepted request line on the wire, in bytes.
pub const MAX_FRAME_LEN: usize = 64 * 1024;
