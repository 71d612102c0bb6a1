use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::*;

/// Mismatched cards stay face-up this long; input is locked out meanwhile.
pub const UNFLIP_DELAY_MS: u32 = 1_000;
/// How long the power-up keeps every card face visible.
pub const POWER_UP_REVEAL_MS: u32 = 2_000;
/// Cooldown before the power-up can be used again.
pub const POWER_UP_COOLDOWN_MS: u32 = 10_000;

/// Monotonic counter identifying which run of the session a deferred callback
/// or in-flight load belongs to.
pub type Generation = u64;

/// Lifecycle phase of a session.
///
/// Valid transitions:
/// - Idle -> Loading (start)
/// - Loading -> Playing (deck ready)
/// - Loading -> Idle (load failed)
/// - Playing -> Won | Lost
/// - any -> Idle (reset), Won | Lost -> Loading (start)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Loading,
    Playing,
    Won,
    Lost,
}

impl Phase {
    /// Game over, no input accepted until the next start or reset.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }

    /// Whether a new session may begin from this phase.
    pub const fn can_start(self) -> bool {
        matches!(self, Self::Idle | Self::Won | Self::Lost)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimerKind {
    /// Hide a mismatched pair and release the input lockout.
    Unflip,
    /// End of the power-up's reveal window.
    PowerUpHide,
    /// End of the power-up's cooldown.
    PowerUpRearm,
}

/// Handle for a deferred callback scheduled by the session. The driver hands
/// it back via [`Session::timer_fired`]; tokens minted for a superseded
/// generation are dropped there, which is what cancels stale timers.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerToken {
    pub kind: TimerKind,
    pub generation: Generation,
}

/// Counter snapshot for the status display.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub seconds_left: u32,
    pub attempts: u32,
    pub matched_pairs: PairCount,
    pub total_pairs: PairCount,
}

/// Terminal summary emitted exactly once per finished game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub won: bool,
    pub matched_pairs: PairCount,
    pub total_pairs: PairCount,
    pub attempts: u32,
    pub seconds_left: u32,
}

/// State-change notifications for whoever renders the session, plus
/// `Schedule`, which asks the driver to arm a one-shot timer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    Status(Status),
    CardFaceChanged { index: usize, face_up: bool },
    CardMatched { index: usize },
    PowerUpAvailabilityChanged(bool),
    RevealAllChanged(bool),
    Ended(Summary),
    LoadFailed(String),
    Schedule { token: TimerToken, delay_ms: u32 },
}

pub type Events = SmallVec<[Event; 4]>;

/// One game session from start intent to win, loss, or reset.
///
/// Operations outside their valid phase are silent no-ops returning no
/// events: user input timing relative to async transitions cannot be
/// controlled, so stray intents are expected and harmless.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    phase: Phase,
    config: SessionConfig,
    deck: Vec<Card>,
    face_up: SmallVec<[usize; 2]>,
    matched_pairs: PairCount,
    attempts: u32,
    seconds_left: u32,
    power_up_available: bool,
    reveal_all: bool,
    generation: Generation,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> SessionConfig {
        self.config
    }

    pub fn deck(&self) -> &[Card] {
        &self.deck
    }

    pub fn card_at(&self, index: usize) -> Option<&Card> {
        self.deck.get(index)
    }

    pub fn is_face_up(&self, index: usize) -> bool {
        self.face_up.contains(&index)
    }

    pub fn seconds_left(&self) -> u32 {
        self.seconds_left
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn matched_pairs(&self) -> PairCount {
        self.matched_pairs
    }

    pub fn total_pairs(&self) -> PairCount {
        self.config.pairs
    }

    pub fn pairs_left(&self) -> PairCount {
        self.config.pairs - self.matched_pairs
    }

    pub fn power_up_available(&self) -> bool {
        self.power_up_available
    }

    /// Whether the power-up reveal window is currently open.
    pub fn reveal_all(&self) -> bool {
        self.reveal_all
    }

    /// The generation in-flight loads and timers must carry to be accepted.
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn status(&self) -> Status {
        Status {
            seconds_left: self.seconds_left,
            attempts: self.attempts,
            matched_pairs: self.matched_pairs,
            total_pairs: self.config.pairs,
        }
    }

    fn status_event(&self) -> Event {
        Event::Status(self.status())
    }

    fn schedule(&self, kind: TimerKind, delay_ms: u32) -> Event {
        Event::Schedule {
            token: TimerToken {
                kind,
                generation: self.generation,
            },
            delay_ms,
        }
    }

    /// Begin a new session, entering Loading. Rejected while a load is
    /// already in flight or a game is running; valid again once the session
    /// is Idle or finished.
    pub fn start(&mut self, config: SessionConfig) -> Events {
        let mut events = Events::new();
        if !self.phase.can_start() {
            log::debug!("start ignored in phase {:?}", self.phase);
            return events;
        }

        *self = Self {
            phase: Phase::Loading,
            config,
            seconds_left: config.time_limit_secs,
            power_up_available: true,
            generation: self.generation + 1,
            ..Self::default()
        };
        log::debug!(
            "session {} loading: {} pairs, {}s",
            self.generation,
            config.pairs,
            config.time_limit_secs
        );
        events.push(self.status_event());
        events
    }

    /// Install the fetched deck and begin play. Only accepted while Loading
    /// and only for the generation the load was started for, so a fetch that
    /// outlives a reset can never touch the newer session.
    pub fn deck_ready(&mut self, generation: Generation, deck: Vec<Card>) -> Events {
        let mut events = Events::new();
        if self.phase != Phase::Loading || generation != self.generation {
            log::debug!("deck for stale session {generation} dropped");
            return events;
        }
        debug_assert_eq!(deck.len(), self.config.deck_size());

        self.deck = deck;
        self.phase = Phase::Playing;
        self.seconds_left = self.config.time_limit_secs;
        events.push(self.status_event());
        events.push(Event::PowerUpAvailabilityChanged(true));
        events
    }

    /// Abandon a failed load and return to Idle so start can be retried.
    pub fn load_failed(&mut self, generation: Generation, message: impl Into<String>) -> Events {
        let mut events = Events::new();
        if self.phase != Phase::Loading || generation != self.generation {
            return events;
        }

        self.phase = Phase::Idle;
        events.push(Event::LoadFailed(message.into()));
        events
    }

    /// One second of countdown, driven by the frontend's interval. Reaching
    /// zero with pairs outstanding loses the game on the spot; the terminal
    /// transition invalidates any pending unflip.
    pub fn tick(&mut self) -> Events {
        let mut events = Events::new();
        if self.phase != Phase::Playing {
            return events;
        }

        self.seconds_left = self.seconds_left.saturating_sub(1);
        events.push(self.status_event());
        if self.seconds_left == 0 {
            self.end(false, &mut events);
        }
        events
    }

    /// Turn a card face up and evaluate the pair once two are up.
    ///
    /// Silently ignores clicks that cannot act: out-of-range positions,
    /// matched or already face-up cards, and any click while two cards are
    /// pending evaluation (the mismatch lockout window).
    pub fn flip(&mut self, index: usize) -> Events {
        let mut events = Events::new();
        if self.phase != Phase::Playing || self.face_up.len() >= 2 {
            return events;
        }
        let Some(card) = self.deck.get(index) else {
            return events;
        };
        if card.matched || self.face_up.contains(&index) {
            return events;
        }

        self.face_up.push(index);
        events.push(Event::CardFaceChanged {
            index,
            face_up: true,
        });
        if self.face_up.len() < 2 {
            return events;
        }

        // pair complete, evaluate
        let (first, second) = (self.face_up[0], self.face_up[1]);
        self.attempts += 1;
        if self.deck[first].entry_id() == self.deck[second].entry_id() {
            self.deck[first].matched = true;
            self.deck[second].matched = true;
            self.matched_pairs += 1;
            self.face_up.clear();
            events.push(Event::CardMatched { index: first });
            events.push(Event::CardMatched { index: second });
            events.push(self.status_event());
            if self.matched_pairs == self.config.pairs {
                self.end(true, &mut events);
            }
        } else {
            events.push(self.status_event());
            events.push(self.schedule(TimerKind::Unflip, UNFLIP_DELAY_MS));
        }
        events
    }

    /// Reveal every card face for a moment. Single-use until the cooldown
    /// re-arms it; does not pause the countdown or lock input, and never
    /// touches `face_up` or matched state.
    pub fn activate_power_up(&mut self) -> Events {
        let mut events = Events::new();
        if self.phase != Phase::Playing || !self.power_up_available {
            return events;
        }

        self.power_up_available = false;
        self.reveal_all = true;
        events.push(Event::PowerUpAvailabilityChanged(false));
        events.push(Event::RevealAllChanged(true));
        events.push(self.schedule(TimerKind::PowerUpHide, POWER_UP_REVEAL_MS));
        events
    }

    /// A deferred callback fired. Tokens from an earlier generation (a
    /// session that was since reset, restarted, or finished) do nothing.
    pub fn timer_fired(&mut self, token: TimerToken) -> Events {
        let mut events = Events::new();
        if token.generation != self.generation || self.phase != Phase::Playing {
            log::trace!("stale timer dropped: {token:?}");
            return events;
        }

        match token.kind {
            TimerKind::Unflip => {
                for &index in &self.face_up {
                    events.push(Event::CardFaceChanged {
                        index,
                        face_up: false,
                    });
                }
                self.face_up.clear();
            }
            TimerKind::PowerUpHide => {
                self.reveal_all = false;
                events.push(Event::RevealAllChanged(false));
                events.push(self.schedule(TimerKind::PowerUpRearm, POWER_UP_COOLDOWN_MS));
            }
            TimerKind::PowerUpRearm => {
                self.power_up_available = true;
                events.push(Event::PowerUpAvailabilityChanged(true));
            }
        }
        events
    }

    /// Drop everything and return to Idle. Pending timers and in-flight
    /// loads become stale through the generation bump.
    pub fn reset(&mut self) -> Events {
        let mut events = Events::new();
        *self = Self {
            generation: self.generation + 1,
            ..Self::default()
        };
        events.push(self.status_event());
        events
    }

    fn end(&mut self, won: bool, events: &mut Events) {
        self.phase = if won { Phase::Won } else { Phase::Lost };
        // pending unflip and power-up timers belong to the finished game now
        self.generation += 1;
        self.face_up.clear();
        self.reveal_all = false;
        let summary = Summary {
            won,
            matched_pairs: self.matched_pairs,
            total_pairs: self.config.pairs,
            attempts: self.attempts,
            seconds_left: self.seconds_left,
        };
        log::debug!("session ended: {summary:?}");
        events.push(Event::Ended(summary));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: EntryId) -> CardIdentity {
        CardIdentity {
            id,
            name: format!("entry-{id}"),
            artwork_url: format!("https://img.example/{id}.png"),
        }
    }

    /// Deck laid out in the given order, no shuffling, so positions are known.
    fn deck_of(ids: &[EntryId]) -> Vec<Card> {
        ids.iter().map(|&id| Card::new(identity(id))).collect()
    }

    fn playing(ids: &[EntryId], config: SessionConfig) -> Session {
        let mut session = Session::new();
        session.start(config);
        let events = session.deck_ready(session.generation(), deck_of(ids));
        assert!(!events.is_empty());
        assert_eq!(session.phase(), Phase::Playing);
        session
    }

    fn scheduled_token(events: &Events) -> TimerToken {
        events
            .iter()
            .find_map(|event| match event {
                Event::Schedule { token, .. } => Some(*token),
                _ => None,
            })
            .expect("a timer should have been scheduled")
    }

    fn six_pairs() -> Session {
        playing(
            &[1, 1, 2, 3, 2, 3, 4, 4, 5, 5, 6, 6],
            SessionConfig::easy(),
        )
    }

    #[test]
    fn matching_pair_is_cleared_immediately() {
        let mut session = six_pairs();

        session.flip(0);
        let events = session.flip(1);

        assert!(events.contains(&Event::CardMatched { index: 0 }));
        assert!(events.contains(&Event::CardMatched { index: 1 }));
        assert_eq!(session.matched_pairs(), 1);
        assert_eq!(session.attempts(), 1);
        assert!(!session.is_face_up(0) && !session.is_face_up(1));
        assert!(session.card_at(0).unwrap().matched);
    }

    #[test]
    fn mismatch_locks_input_until_unflip_fires() {
        let mut session = six_pairs();

        session.flip(2);
        let events = session.flip(3);
        let token = scheduled_token(&events);
        assert_eq!(token.kind, TimerKind::Unflip);
        assert_eq!(session.attempts(), 1);
        assert_eq!(session.matched_pairs(), 0);

        // both stay up and further flips are rejected during the lockout
        assert!(session.is_face_up(2) && session.is_face_up(3));
        assert!(session.flip(6).is_empty());
        assert!(!session.is_face_up(6));

        let events = session.timer_fired(token);
        assert!(events.contains(&Event::CardFaceChanged {
            index: 2,
            face_up: false
        }));
        assert!(events.contains(&Event::CardFaceChanged {
            index: 3,
            face_up: false
        }));
        assert!(!session.is_face_up(2) && !session.is_face_up(3));
        assert!(!session.flip(6).is_empty());
    }

    #[test]
    fn flip_ignores_matched_face_up_and_out_of_range() {
        let mut session = six_pairs();

        session.flip(0);
        assert!(session.flip(0).is_empty(), "already face-up");
        assert!(session.flip(99).is_empty(), "out of range");
        session.flip(1);

        assert!(session.flip(0).is_empty(), "already matched");
        assert!(session.flip(1).is_empty(), "already matched");
        assert_eq!(session.attempts(), 1);
    }

    #[test]
    fn attempts_count_every_completed_evaluation() {
        let mut session = six_pairs();

        session.flip(0);
        let token = scheduled_token(&session.flip(2)); // mismatch
        assert_eq!(session.attempts(), 1);
        session.timer_fired(token);

        session.flip(0);
        session.flip(1); // match
        assert_eq!(session.attempts(), 2);

        session.flip(3); // single card, evaluation not complete
        assert_eq!(session.attempts(), 2);
    }

    #[test]
    fn winning_stops_the_countdown() {
        let mut session = playing(&[1, 1, 2, 2], SessionConfig::new_unchecked(2, 90));

        session.flip(0);
        session.flip(1);
        session.flip(2);
        let events = session.flip(3);

        let ended = events.iter().find_map(|event| match event {
            Event::Ended(summary) => Some(*summary),
            _ => None,
        });
        let summary = ended.expect("game should have ended");
        assert!(summary.won);
        assert_eq!(summary.matched_pairs, 2);
        assert_eq!(summary.attempts, 2);
        assert_eq!(session.phase(), Phase::Won);

        let seconds = session.seconds_left();
        assert!(session.tick().is_empty());
        assert_eq!(session.seconds_left(), seconds);
    }

    #[test]
    fn countdown_expiry_loses_the_game() {
        let mut session = playing(&[1, 1, 2, 2], SessionConfig::new_unchecked(2, 90));

        let mut ended = None;
        for _ in 0..90 {
            for event in session.tick() {
                if let Event::Ended(summary) = event {
                    ended = Some(summary);
                }
            }
        }

        let summary = ended.expect("countdown should have expired");
        assert!(!summary.won);
        assert_eq!(summary.matched_pairs, 0);
        assert_eq!(summary.seconds_left, 0);
        assert_eq!(session.phase(), Phase::Lost);
        assert!(session.flip(0).is_empty(), "no input after loss");
    }

    #[test]
    fn expiry_during_pending_evaluation_cancels_the_unflip() {
        let mut session = playing(&[1, 2, 1, 2], SessionConfig::new_unchecked(2, 2));

        session.flip(0);
        let token = scheduled_token(&session.flip(1));

        session.tick();
        let events = session.tick();
        assert!(matches!(events.last(), Some(Event::Ended(_))));
        assert_eq!(session.phase(), Phase::Lost);

        // the deferred unflip fires late and must not touch anything
        let before = session.clone();
        assert!(session.timer_fired(token).is_empty());
        assert_eq!(session, before);
    }

    #[test]
    fn power_up_runs_reveal_then_cooldown() {
        let mut session = six_pairs();

        let events = session.activate_power_up();
        assert!(events.contains(&Event::PowerUpAvailabilityChanged(false)));
        assert!(events.contains(&Event::RevealAllChanged(true)));
        assert!(session.reveal_all());
        let hide = scheduled_token(&events);
        assert_eq!(hide.kind, TimerKind::PowerUpHide);

        // reveal is a pure visibility signal
        assert!(!session.is_face_up(0));

        let events = session.timer_fired(hide);
        assert!(events.contains(&Event::RevealAllChanged(false)));
        assert!(!session.reveal_all());
        let rearm = scheduled_token(&events);
        assert_eq!(rearm.kind, TimerKind::PowerUpRearm);
        assert!(!session.power_up_available());

        let events = session.timer_fired(rearm);
        assert!(events.contains(&Event::PowerUpAvailabilityChanged(true)));
        assert!(session.power_up_available());
    }

    #[test]
    fn power_up_is_noop_while_unavailable() {
        let mut session = six_pairs();

        session.activate_power_up();
        assert!(session.activate_power_up().is_empty());

        let mut idle = Session::new();
        assert!(idle.activate_power_up().is_empty());
    }

    #[test]
    fn start_is_rejected_while_loading() {
        let mut session = Session::new();

        assert!(!session.start(SessionConfig::easy()).is_empty());
        assert_eq!(session.phase(), Phase::Loading);
        let generation = session.generation();

        assert!(session.start(SessionConfig::hard()).is_empty());
        assert_eq!(session.generation(), generation);
        assert_eq!(session.config(), SessionConfig::easy());
    }

    #[test]
    fn failed_load_returns_to_idle() {
        let mut session = Session::new();
        session.start(SessionConfig::easy());
        let generation = session.generation();

        let events = session.load_failed(generation, "catalog unreachable");
        assert!(matches!(events.first(), Some(Event::LoadFailed(_))));
        assert_eq!(session.phase(), Phase::Idle);

        // and start can be retried
        assert!(!session.start(SessionConfig::easy()).is_empty());
    }

    #[test]
    fn stale_deck_and_stale_failure_are_dropped() {
        let mut session = Session::new();
        session.start(SessionConfig::easy());
        let old = session.generation();

        session.reset();
        assert!(session.deck_ready(old, deck_of(&[1, 1])).is_empty());
        assert!(session.load_failed(old, "too late").is_empty());
        assert_eq!(session.phase(), Phase::Idle);
    }

    #[test]
    fn reset_invalidates_pending_timers() {
        let mut session = six_pairs();
        session.flip(2);
        let token = scheduled_token(&session.flip(3));

        session.reset();
        assert_eq!(session.phase(), Phase::Idle);
        assert!(session.timer_fired(token).is_empty());
        assert!(session.deck().is_empty());
    }
}
