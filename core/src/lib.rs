use serde::{Deserialize, Serialize};

pub use catalog::*;
pub use deck::*;
pub use error::*;
pub use session::*;
pub use types::*;

mod catalog;
mod deck;
mod error;
mod session;
mod types;

/// Parameters a session is started with; immutable for its whole duration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub pairs: PairCount,
    pub time_limit_secs: u32,
}

impl SessionConfig {
    pub const fn new_unchecked(pairs: PairCount, time_limit_secs: u32) -> Self {
        Self {
            pairs,
            time_limit_secs,
        }
    }

    pub fn new(pairs: PairCount, time_limit_secs: u32) -> Self {
        let pairs = pairs.clamp(1, PairCount::MAX / 2);
        let time_limit_secs = time_limit_secs.max(1);
        Self::new_unchecked(pairs, time_limit_secs)
    }

    pub const fn easy() -> Self {
        Self::new_unchecked(6, 90)
    }

    pub const fn medium() -> Self {
        Self::new_unchecked(9, 90)
    }

    pub const fn hard() -> Self {
        Self::new_unchecked(12, 90)
    }

    /// Number of cards on the table: two per pair.
    pub const fn deck_size(&self) -> usize {
        2 * self.pairs as usize
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::easy()
    }
}
