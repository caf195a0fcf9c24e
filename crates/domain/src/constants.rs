//! Tunable defaults shared across the workspace.

/// Lifetime of a state/PKCE entry between authorization and callback.
pub const STATE_TTL_SECS: i64 = 3600;

/// Refresh a token once it is within this many seconds of expiry.
pub const ROTATION_THRESHOLD_SECS: i64 = 30 * 60;

/// Bound on every outbound provider call.
pub const HTTP_TIMEOUT_SECS: u64 = 10;

/// Fixed delay before the single retry on transient provider errors.
pub const RETRY_DELAY_MS: u64 = 500;

/// Telegram widget payloads older than this are rejected.
pub const WIDGET_MAX_AGE_SECS: i64 = STATE_TTL_SECS;
