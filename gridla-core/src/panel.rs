//! Progress of one panel through a step of a blocked driver.

/// Stage reached by the current panel of a blocked driver.
///
/// A panel moves through the stages in declaration order and never goes back. It is dropped once
/// it reaches [`PanelState::Applied`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PanelState {
    /// Nothing was done yet.
    Unprocessed,
    /// A replicated (or fully local) copy of the panel exists.
    Gathered,
    /// The panel kernel ran on that copy.
    Factored,
    /// The factored panel was redistributed for the trailing update.
    Scattered,
    /// The trailing update was applied.
    Applied,
}

impl PanelState {
    /// Moves to `next` and logs the transition at `trace` level under `target`, for the panel
    /// starting at global index `offset`.
    ///
    /// # Panics
    ///
    /// Panics in debug mode if `next` does not come after the current state.
    #[track_caller]
    #[inline]
    pub fn advance(&mut self, next: PanelState, target: &str, offset: usize) {
        debug_assert!(
            next > *self,
            "panel at offset {} cannot go from {:?} to {:?}",
            offset,
            *self,
            next,
        );
        log::trace!(target: target, "panel at offset {offset}: {:?} -> {:?}", *self, next);
        *self = next;
    }
}
