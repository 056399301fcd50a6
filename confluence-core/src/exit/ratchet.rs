/// Ratchet invariant enforcement
///
/// **Core Rule:** Stops may tighten, never loosen (even if ATR expands or the
/// breakeven level sits behind a trailed stop).
use crate::domain::Side;

/// Ratchet state for the live stop of one position.
///
/// - Long positions: stop can only rise
/// - Short positions: stop can only fall
#[derive(Debug, Clone, PartialEq)]
pub struct RatchetState {
    level: f64,
    side: Side,
}

impl RatchetState {
    /// Create a ratchet anchored at the initial stop.
    pub fn new(side: Side, initial_level: f64) -> Self {
        Self {
            level: initial_level,
            side,
        }
    }

    /// Apply ratchet to a proposed stop level.
    ///
    /// Returns the ratcheted level (max for longs, min for shorts). Non-finite
    /// proposals are ignored.
    ///
    /// # Example
    /// ```
    /// use confluence_core::domain::Side;
    /// use confluence_core::exit::RatchetState;
    ///
    /// let mut ratchet = RatchetState::new(Side::Long, 95.0);
    /// assert_eq!(ratchet.apply(100.0), 100.0);
    /// // Loosening is blocked
    /// assert_eq!(ratchet.apply(90.0), 100.0);
    /// ```
    pub fn apply(&mut self, proposed: f64) -> f64 {
        if proposed.is_finite() {
            self.level = match self.side {
                Side::Long => self.level.max(proposed),
                Side::Short => self.level.min(proposed),
            };
        }
        self.level
    }

    /// True when `proposed` would move the stop strictly tighter.
    pub fn would_tighten(&self, proposed: f64) -> bool {
        proposed.is_finite()
            && match self.side {
                Side::Long => proposed > self.level,
                Side::Short => proposed < self.level,
            }
    }

    pub fn level(&self) -> f64 {
        self.level
    }
}
