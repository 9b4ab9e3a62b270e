//! Repository trait definitions.
//!
//! These traits define the contract between the core abstractions and the
//! database layer. The db crate provides PostgreSQL implementations; tests
//! may provide in-memory ones.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Brain, BrokenLink, Card, InsertPlacement, LinkOccurrence, LinkStats, LinkSummary,
    PositionStats, ReorderInstruction, RepairSummary, ResolvedCardLink, Stream,
};

// =============================================================================
// ORDERING ENGINE
// =============================================================================

/// Repository maintaining the ordered card membership of streams.
///
/// Every mutating operation preserves the no-gap invariant: after it
/// completes, the positions of a stream are exactly `{0, ..., count-1}`.
/// Writers on the same stream serialize; writers on different streams do not
/// block each other.
#[async_trait]
pub trait StreamRepository: Send + Sync {
    /// Create a stream in a brain. Returns the new stream id.
    async fn create(&self, brain_id: Uuid, name: &str) -> Result<Uuid>;

    /// Fetch a stream by id.
    async fn get(&self, stream_id: Uuid) -> Result<Option<Stream>>;

    /// List streams in a brain, favorites first.
    async fn list_for_brain(&self, brain_id: Uuid) -> Result<Vec<Stream>>;

    /// Delete a stream and its memberships.
    async fn delete(&self, stream_id: Uuid) -> Result<bool>;

    /// Bump the stream's last-accessed timestamp.
    async fn touch_accessed(&self, stream_id: Uuid) -> Result<()>;

    /// Set or clear the favorite flag.
    async fn set_favorite(&self, stream_id: Uuid, favorite: bool) -> Result<()>;

    /// Insert a card into the stream at the given placement.
    ///
    /// Idempotent: if the card is already a member, returns its existing
    /// position without touching any other row.
    async fn insert_card(
        &self,
        stream_id: Uuid,
        card_id: Uuid,
        placement: InsertPlacement,
        depth: i32,
    ) -> Result<i32>;

    /// Move a card to a new position, renumbering the rest contiguously.
    ///
    /// Returns false without position side effects when the card is not a
    /// member or already sits at `new_position`; a supplied `new_depth`
    /// still applies in the latter case.
    async fn move_card(
        &self,
        stream_id: Uuid,
        card_id: Uuid,
        new_position: i32,
        new_depth: Option<i32>,
    ) -> Result<bool>;

    /// Remove a card and close the gap. Returns false if it was not a member.
    async fn remove_card(&self, stream_id: Uuid, card_id: Uuid) -> Result<bool>;

    /// Apply a batch of reorder instructions atomically, then normalize.
    ///
    /// Fails the whole batch with `Error::InvalidInput` if any instruction
    /// references a card that is not a member. Returns the number of
    /// instructions applied.
    async fn batch_reorder(
        &self,
        stream_id: Uuid,
        instructions: Vec<ReorderInstruction>,
    ) -> Result<usize>;

    /// Re-assign positions 0..N-1 in current relative order. Idempotent.
    async fn normalize(&self, stream_id: Uuid) -> Result<()>;

    /// Read-only position diagnostics.
    async fn position_stats(&self, stream_id: Uuid) -> Result<PositionStats>;
}

// =============================================================================
// LINK INDEX & GRAPH QUERIES
// =============================================================================

/// Repository owning the card link index and its read paths.
#[async_trait]
pub trait CardLinkRepository: Send + Sync {
    /// Replace the full link set of a source card in one transaction,
    /// assigning instance ordinals by document order.
    async fn replace_links(
        &self,
        source_card_id: Uuid,
        resolved: Vec<ResolvedCardLink>,
    ) -> Result<()>;

    /// Extract, classify, resolve, and replace links for a card's content.
    ///
    /// Called exactly once per content change, not once per membership.
    async fn process_card_links(&self, source_card_id: Uuid, content: &str)
        -> Result<LinkSummary>;

    /// All invalid links with an active source card, scoped to one brain.
    async fn broken_links(&self, brain_id: Uuid) -> Result<Vec<BrokenLink>>;

    /// Re-resolve every broken link in a brain by reprocessing the source
    /// cards' live content.
    async fn repair_broken_links(&self, brain_id: Uuid) -> Result<RepairSummary>;

    /// Valid links pointing at `target_card_id`, active sources only.
    async fn backlinks(&self, target_card_id: Uuid) -> Result<Vec<LinkOccurrence>>;

    /// Valid links leaving `source_card_id`, active source only.
    async fn forward_links(&self, source_card_id: Uuid) -> Result<Vec<LinkOccurrence>>;

    /// Link-health statistics for one brain.
    async fn link_stats(&self, brain_id: Uuid) -> Result<LinkStats>;
}

// =============================================================================
// EXTERNAL READ INTERFACES
// =============================================================================

/// Read-only lookups the resolver and repair pass depend on.
///
/// Content storage itself is owned elsewhere; this trait is the narrow seam
/// through which the link subsystem sees brains and cards.
#[async_trait]
pub trait BrainDirectory: Send + Sync {
    /// Find a brain by owning user and name.
    async fn find_brain_by_owner_and_name(
        &self,
        owner_id: Uuid,
        name: &str,
    ) -> Result<Option<Brain>>;

    /// Find an active, titled card by brain and exact title.
    async fn find_card_by_brain_and_title(
        &self,
        brain_id: Uuid,
        title: &str,
    ) -> Result<Option<Card>>;

    /// Fetch a card (including content) by id.
    async fn card(&self, card_id: Uuid) -> Result<Option<Card>>;
}
