//! Hard limits guarding every externally supplied value.

use crate::model::Ms;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_PHONE_LEN: usize = 32;
pub const MAX_ADDRESS_LEN: usize = 512;
pub const MAX_POSTAL_CODE_LEN: usize = 16;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_TERMS_LEN: usize = 16384;
pub const MAX_REASON_LEN: usize = 1024;
pub const MAX_CURRENCY_LEN: usize = 8;
pub const MAX_FILENAME_LEN: usize = 255;

pub const MAX_CUSTOMERS: usize = 100_000;
pub const MAX_FACILITIES: usize = 10_000;
pub const MAX_BOOKINGS_PER_FACILITY: usize = 100_000;

/// One calendar day in milliseconds; bookings are priced per started day.
pub const DAY_MS: Ms = 86_400_000;

/// 2000-01-01T00:00:00Z — anything earlier is a client bug.
pub const MIN_VALID_TIMESTAMP_MS: Ms = 946_684_800_000;
/// 2100-01-01T00:00:00Z.
pub const MAX_VALID_TIMESTAMP_MS: Ms = 4_102_444_800_000;

/// A single booking may span at most one year.
pub const MAX_RANGE_DURATION_MS: Ms = 366 * DAY_MS;

/// Availability queries may cover at most two years.
pub const MAX_QUERY_WINDOW_MS: Ms = 2 * 366 * DAY_MS;

/// Uploaded contract documents are capped at 16 MiB.
pub const MAX_DOCUMENT_BYTES: usize = 16 * 1024 * 1024;
