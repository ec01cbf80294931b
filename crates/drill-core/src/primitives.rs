//! # Innate Primitives
//!
//! Hardcoded runtime constants for the drill engine.
//!
//! These values are compiled into the binary and are immutable at runtime.
//! Stage graphs themselves live in [`crate::stage::config`]; this module only
//! holds the scalar constants shared across modules.

/// Magic bytes for the binary stage store header.
///
/// - File Header = Magic Bytes ("DRIL") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"DRIL";

/// Current binary store format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

/// Seconds in one day. All gap arithmetic is done in whole seconds.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Learner key used when a record carries no usable learner identifier.
pub const GUEST_LEARNER: &str = "guest";

/// Subject used when none (or an empty one) is given.
pub const DEFAULT_SUBJECT: &str = "english";

/// Subject key selecting the 5-stage configuration.
pub const MATH_SUBJECT: &str = "math";

/// Session mode that also selects the 5-stage configuration.
pub const MATH_DRILL_MODE: &str = "math-drill";

/// Mode tag excluding an attempt (or a whole record) from stage mutation.
pub const REVIEW_MODE: &str = "review";

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for learner and question identifiers.
///
/// Longer identifiers are rejected at the ingestion boundary.
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum number of attempts accepted from a single session record.
///
/// Attempts past this count are dropped by the Ingestor.
pub const MAX_ATTEMPTS_PER_RECORD: usize = 10_000;

/// Maximum allowed size of a persisted stage store (binary or JSON).
///
/// Validated BEFORE attempting deserialization.
pub const MAX_STORE_PAYLOAD_SIZE: usize = 256 * 1024 * 1024; // 256 MB

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"DRIL");
    }

    #[test]
    fn one_day_in_seconds() {
        assert_eq!(SECONDS_PER_DAY, 24 * 60 * 60);
    }
}
