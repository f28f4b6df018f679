//! Size and range limits applied at ingestion.
//!
//! MEMORY SAFETY: These limits bound what a single request can make the
//! pipeline hold. Oversized fields are truncated, never rejected.

// === Batch Limits ===

/// Maximum request body size in bytes (1MB).
pub const MAX_BATCH_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum records accepted per batch; the remainder is truncated.
pub const MAX_BATCH_EVENTS: usize = 1000;

// === Custom Event Limits ===

/// Maximum custom properties JSON size in bytes (16KB).
pub const MAX_CUSTOM_PROPERTIES_BYTES: usize = 16 * 1024;

// === String Field Limits (chars) ===

/// Page URL max length.
pub const MAX_URL_LEN: usize = 2048;

/// Referrer URL max length.
/// Matches HTTP Referer header limit.
pub const MAX_REFERRER_LEN: usize = 2048;

/// Page title max length.
pub const MAX_TITLE_LEN: usize = 512;

/// Visible text of a clicked element.
pub const MAX_CLICK_TEXT_LEN: usize = 200;

/// HTML element tag name max length.
pub const MAX_ELEMENT_TAG_LEN: usize = 64;

/// HTML element id max length.
pub const MAX_ELEMENT_ID_LEN: usize = 256;

/// Route `from`/`to` path max length.
pub const MAX_ROUTE_LEN: usize = 2048;

/// Custom event name max length.
pub const MAX_CUSTOM_NAME_LEN: usize = 100;

/// Tracking, session, form and client event ids.
pub const MAX_ID_LEN: usize = 128;

/// Unknown event type echoed back in rejections.
pub const MAX_TYPE_ECHO_LEN: usize = 64;

// === Numeric Bounds ===

/// Scroll depth percentage bounds.
pub const MIN_SCROLL_DEPTH: f64 = 0.0;
pub const MAX_SCROLL_DEPTH: f64 = 100.0;

/// Pixel coordinate bounds for click positions.
pub const MIN_COORDINATE: f64 = 0.0;
pub const MAX_COORDINATE: f64 = 100_000.0;

// === Timestamp Bounds ===

/// Numeric epochs below this value are seconds and get scaled to
/// milliseconds. 100_000_000_000 ms is March 1973, 100_000_000_000 s is
/// far beyond any plausible date.
pub const EPOCH_SECONDS_THRESHOLD: f64 = 100_000_000_000.0;
