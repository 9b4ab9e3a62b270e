//! Core data models for the brains note store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// BRAIN & CARD TYPES
// =============================================================================

/// A brain: the tenant-level owner of cards and streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Brain {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub created_at_utc: DateTime<Utc>,
}

/// A card: the linkable content unit.
///
/// Untitled cards (`title = None`) are excluded from cross-brain title
/// lookup and belong to exactly one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: Uuid,
    pub brain_id: Uuid,
    /// Nullable: untitled cards are not addressable by `[[title]]`.
    pub title: Option<String>,
    pub content: String,
    pub content_hash: String,
    pub size_bytes: i64,
    pub created_at_utc: DateTime<Utc>,
    pub updated_at_utc: DateTime<Utc>,
    /// Soft delete marker. Link queries only see cards where this is None.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Card {
    /// Whether the card is visible to link queries and repair passes.
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

// =============================================================================
// STREAM TYPES
// =============================================================================

/// A stream: an ordered, arbitrarily-nestable sequence of card references
/// within one brain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    pub id: Uuid,
    pub brain_id: Uuid,
    pub name: String,
    /// Favorited streams are exempt from the (external) retention sweep.
    pub favorite: bool,
    pub created_at_utc: DateTime<Utc>,
    pub last_accessed_at_utc: DateTime<Utc>,
    /// Number of cards in this stream (computed)
    #[serde(default)]
    pub card_count: i64,
}

/// One (stream, card) membership row carrying position and depth.
///
/// Invariant: within a stream the set of `position` values is the contiguous
/// range `[0, N)` after every completed ordering operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamCard {
    pub stream_id: Uuid,
    pub card_id: Uuid,
    /// Non-negative, unique per stream.
    pub position: i32,
    /// Non-negative nesting level. A display hint, not a tree encoding.
    pub depth: i32,
    pub in_ai_context: bool,
    pub collapsed: bool,
    pub added_at_utc: DateTime<Utc>,
}

/// Where to insert a card relative to the existing ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertPlacement {
    /// Insert directly after the given position (new position = after + 1).
    AfterPosition(i32),
    /// Append past the current maximum position.
    End,
}

/// One instruction in a batch reorder.
#[derive(Debug, Clone)]
pub struct ReorderInstruction {
    pub card_id: Uuid,
    pub new_position: i32,
    pub new_depth: Option<i32>,
}

/// Read-only position diagnostics for one stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionStats {
    pub count: i64,
    /// `count - 1`, or -1 for an empty stream.
    pub expected_max_position: i32,
    pub actual_max_position: i32,
    pub has_gaps: bool,
}

// =============================================================================
// LINK TYPES
// =============================================================================

/// A raw `[[...]]` occurrence in card content.
///
/// Offsets are byte offsets of the inner text within the source string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

/// A classified link reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedLink {
    /// `[[title]]`: same-brain title lookup.
    Simple { target_title: String },
    /// `[[title:vN]]`: version recorded but resolved like Simple.
    Versioned { target_title: String, version: u32 },
    /// `[[brain/title]]`: lookup in a sibling brain of the same owner.
    CrossBrain {
        brain_name: String,
        target_title: String,
    },
}

/// Outcome of resolving one TypedLink. A miss is data, not an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub target_card_id: Option<Uuid>,
    pub target_brain_id: Option<Uuid>,
    pub is_valid: bool,
    /// Human-readable reason when `is_valid` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResolvedLink {
    pub fn valid(target_card_id: Uuid, target_brain_id: Uuid) -> Self {
        Self {
            target_card_id: Some(target_card_id),
            target_brain_id: Some(target_brain_id),
            is_valid: true,
            error: None,
        }
    }

    pub fn broken(error: impl Into<String>) -> Self {
        Self {
            target_card_id: None,
            target_brain_id: None,
            is_valid: false,
            error: Some(error.into()),
        }
    }
}

/// A resolved link ready for the index writer: raw occurrence + resolution.
#[derive(Debug, Clone)]
pub struct ResolvedCardLink {
    pub link_text: String,
    pub link_offset: i32,
    pub resolution: ResolvedLink,
}

/// A persisted link row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardLink {
    pub id: Uuid,
    pub source_card_id: Uuid,
    /// None exactly when `is_valid` is false.
    pub target_card_id: Option<Uuid>,
    pub link_text: String,
    /// Byte offset of the link text within the source content.
    pub link_offset: i32,
    /// 0-based ordinal among identical link texts in the same source,
    /// in document order.
    pub instance_ordinal: i32,
    pub is_valid: bool,
    pub created_at_utc: DateTime<Utc>,
}

/// Counts returned by `process_card_links`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSummary {
    pub links_found: i64,
    pub links_resolved: i64,
    pub broken_links: i64,
}

/// One broken-link report row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokenLink {
    pub source_card_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_title: Option<String>,
    pub link_text: String,
    pub link_offset: i32,
}

/// One forward-link or backlink row (valid links only).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkOccurrence {
    pub card_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card_title: Option<String>,
    pub link_text: String,
    pub link_offset: i32,
    pub instance_ordinal: i32,
}

/// Outcome of one repair pass over a brain's broken links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairSummary {
    pub found: i64,
    pub repaired: i64,
    pub still_broken: i64,
}

/// Link-health statistics for one brain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkStats {
    pub total: i64,
    pub valid: i64,
    pub broken: i64,
    pub cards_with_links: i64,
    pub referenced_cards: i64,
    /// 100.0 when `total` is 0, else valid/total*100 rounded to one decimal.
    pub health_percent: f64,
}

impl LinkStats {
    /// Compute health_percent from valid/total, avoiding division by zero.
    pub fn health_percent_for(valid: i64, total: i64) -> f64 {
        if total == 0 {
            100.0
        } else {
            (valid as f64 / total as f64 * 1000.0).round() / 10.0
        }
    }
}
