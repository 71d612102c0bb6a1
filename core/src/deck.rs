use rand::prelude::*;

use crate::*;

/// Builds a shuffled deck of `2 * identities.len()` cards, two per identity.
///
/// Identities are expected to already be unique; the deck keeps whatever it
/// is given. Shuffling is an in-place Fisher-Yates pass, so every permutation
/// of the deck is equally likely.
pub fn build_deck<R: Rng + ?Sized>(identities: &[CardIdentity], rng: &mut R) -> Vec<Card> {
    let mut deck = Vec::with_capacity(2 * identities.len());
    for identity in identities {
        deck.push(Card::new(identity.clone()));
        deck.push(Card::new(identity.clone()));
    }

    for i in (1..deck.len()).rev() {
        let j = rng.random_range(0..=i);
        deck.swap(i, j);
    }
    deck
}
