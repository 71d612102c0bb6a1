use serde::{Deserialize, Serialize};

/// Stable identifier a catalog entry keeps between fetches.
pub type EntryId = u32;

/// Count type for pairs in a session.
pub type PairCount = u16;

/// One creature pulled from the catalog. Immutable once fetched; unique by
/// `id` within a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardIdentity {
    pub id: EntryId,
    pub name: String,
    pub artwork_url: String,
}

/// A single card on the table. Two cards share each identity; a card's
/// position is its index in the deck. `matched` only ever goes false to true.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub identity: CardIdentity,
    pub matched: bool,
}

impl Card {
    pub const fn new(identity: CardIdentity) -> Self {
        Self {
            identity,
            matched: false,
        }
    }

    pub fn entry_id(&self) -> EntryId {
        self.identity.id
    }
}
