//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, operation completions |
//! | DEBUG | Decision points, intermediate values |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "db", "ordering", "linking"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "streams", "card_links", "resolver"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "insert_card", "move_card", "replace_links", "repair"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Stream UUID being operated on.
pub const STREAM_ID: &str = "stream_id";

/// Card UUID being operated on.
pub const CARD_ID: &str = "card_id";

/// Brain UUID scoping the operation.
pub const BRAIN_ID: &str = "brain_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of membership rows renumbered.
pub const ROWS_RENUMBERED: &str = "rows_renumbered";

/// Number of links found in a card's content.
pub const LINK_COUNT: &str = "link_count";

/// Number of links that resolved to a target card.
pub const RESOLVED_COUNT: &str = "resolved_count";

// ─── Database fields ───────────────────────────────────────────────────────

/// Number of active connections in the pool.
pub const POOL_SIZE: &str = "pool_size";

/// Number of idle connections in the pool.
pub const POOL_IDLE: &str = "pool_idle";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
