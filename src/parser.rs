//! The `Parser` capability: the boundary between this crate's concurrency
//! machinery and whatever document backend actually decodes pages and draws
//! pixels.
//!
//! Exactly one capability instance belongs to the coordinator thread, and
//! each worker in the pool owns its own independent duplicate (see
//! [`crate::pool::WorkerPool`]) — never shared, so `Parser` implementations
//! never need interior synchronization of their own.

use std::sync::Arc;

use crate::error::EngineResult;
use crate::geometry::Rect;

/// A handle to a page's parsed content, reusable across zoom/rotation
/// variants of the same page without re-parsing. Implementations decide
/// what this actually holds (a parsed object tree, a decoded glyph cache,
/// etc); the render pipeline only ever stores it behind an `Arc`.
pub trait DisplayList: Send + Sync {}

impl<T: Send + Sync> DisplayList for T {}

/// A document decoding and rasterization backend.
///
/// Implementations must be cheap to [`duplicate`](Parser::duplicate): the
/// pool calls it once per worker at startup, not per request.
pub trait Parser: Send {
    type DisplayList: DisplayList;

    /// Total page count of the open document.
    fn num_pages(&self) -> usize;

    /// The page's unscaled bounds, as reported by the backend.
    fn page_bounds(&self, page: usize) -> EngineResult<Rect>;

    /// Build (or fetch from the backend's own internal cache) the
    /// page's display list. Called by the coordinator thread only.
    fn get_display_list(&self, page: usize) -> EngineResult<Arc<Self::DisplayList>>;

    /// Rasterize the portion of `display_list` inside `clip` into `dst`,
    /// which is exactly `3 * clip width * clip height` bytes of tightly
    /// packed RGB. Called by worker threads, once per horizontal band, with
    /// a `dst` slice that never overlaps any other concurrent call's slice
    /// on the same page.
    fn write_section(
        &self,
        display_list: &Self::DisplayList,
        clip: Rect,
        zoom: f64,
        rotation: u16,
        dst: &mut [u8],
    ) -> EngineResult<()>;

    /// Produce an independent capability instance usable from another
    /// thread. Implementations typically open a fresh handle onto the same
    /// underlying document rather than cloning any mutable decode state.
    fn duplicate(&self) -> EngineResult<Self>
    where
        Self: Sized;
}
