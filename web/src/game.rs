use gloo::timers::callback::{Interval, Timeout};
use rand::prelude::*;
use yew::prelude::*;

use shinkei_core::{
    Card, CatalogClient, Event, Events, Generation, Phase, Session, SessionConfig, Summary,
    TimerToken, build_deck,
};

use crate::net::BrowserFetch;
use crate::theme::Theme;
use crate::utils::*;

/// Bounded retry for the whole deck load: the catalog is retried a few times
/// with a fixed backoff, then the failure is surfaced and the session returns
/// to Idle. Never an unbounded auto-retry loop.
const LOAD_ATTEMPTS: u32 = 3;
const LOAD_RETRY_DELAY_MS: u32 = 2_000;

const DIFFICULTIES: &[(&str, SessionConfig)] = &[
    ("Easy", SessionConfig::easy()),
    ("Medium", SessionConfig::medium()),
    ("Hard", SessionConfig::hard()),
];

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Msg {
    SetDifficulty(SessionConfig),
    StartOrReset,
    CardClicked(usize),
    PowerUp,
    Tick,
    TimerFired(TimerToken),
    DeckReady {
        generation: Generation,
        deck: Vec<Card>,
    },
    LoadFailed {
        generation: Generation,
        message: String,
    },
    ClosePopup,
    ToggleTheme,
}

#[derive(Properties, Clone, PartialEq)]
pub(crate) struct GameProps {
    /// Forced RNG seed from the location hash, for reproducible decks.
    #[prop_or_default]
    pub seed: Option<u64>,
}

fn format_for_counter(num: i32) -> String {
    match num {
        ..0 => "000".to_string(),
        0..1000 => format!("{:03}", num),
        1000.. => "999".to_string(),
    }
}

/// Column count the grid is laid out with, per difficulty.
const fn grid_columns(deck_size: usize) -> usize {
    match deck_size {
        ..=12 => 4,
        ..=18 => 6,
        _ => 6,
    }
}

fn spawn_deck_load(
    link: yew::html::Scope<GameView>,
    generation: Generation,
    config: SessionConfig,
    seed: u64,
) {
    wasm_bindgen_futures::spawn_local(async move {
        use gloo::timers::future::TimeoutFuture;

        let client = CatalogClient::new(BrowserFetch);
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut last_error = None;
        for attempt in 1..=LOAD_ATTEMPTS {
            match client
                .fetch_random_identities(config.pairs as usize, &mut rng)
                .await
            {
                Ok(identities) => {
                    let deck = build_deck(&identities, &mut rng);
                    link.send_message(Msg::DeckReady { generation, deck });
                    return;
                }
                Err(err) => {
                    log::warn!("deck load attempt {attempt}/{LOAD_ATTEMPTS} failed: {err}");
                    last_error = Some(err);
                    if attempt < LOAD_ATTEMPTS {
                        TimeoutFuture::new(LOAD_RETRY_DELAY_MS).await;
                    }
                }
            }
        }
        let message = last_error
            .map(|err| err.to_string())
            .unwrap_or_else(|| "deck load failed".to_string());
        link.send_message(Msg::LoadFailed {
            generation,
            message,
        });
    });
}

pub(crate) struct GameView {
    session: Session,
    config: SessionConfig,
    forced_seed: Option<u64>,
    countdown: Option<Interval>,
    popup: Option<Summary>,
    message: Option<String>,
    theme: Option<Theme>,
}

impl GameView {
    fn next_seed(&self) -> u64 {
        self.forced_seed.unwrap_or_else(js_random_seed)
    }

    fn start_countdown(&mut self, ctx: &Context<Self>) {
        if self.session.phase() == Phase::Playing && self.countdown.is_none() {
            let link = ctx.link().clone();
            self.countdown = Some(Interval::new(1_000, move || link.send_message(Msg::Tick)));
        }
    }

    fn stop_countdown(&mut self) {
        self.countdown = None;
    }

    /// Route the session's outbound events: arm requested timers, surface the
    /// terminal popup and load errors. Everything else is state the view
    /// rereads on the next render.
    fn apply_events(&mut self, ctx: &Context<Self>, events: Events) {
        for event in events {
            match event {
                Event::Schedule { token, delay_ms } => {
                    let link = ctx.link().clone();
                    Timeout::new(delay_ms, move || link.send_message(Msg::TimerFired(token)))
                        .forget();
                }
                Event::Ended(summary) => {
                    self.stop_countdown();
                    self.popup = Some(summary);
                }
                Event::LoadFailed(message) => {
                    self.stop_countdown();
                    self.message = Some(message);
                }
                Event::Status(_)
                | Event::CardFaceChanged { .. }
                | Event::CardMatched { .. }
                | Event::PowerUpAvailabilityChanged(_)
                | Event::RevealAllChanged(_) => {}
            }
        }
    }

    fn start_game(&mut self, ctx: &Context<Self>) -> bool {
        let events = self.session.start(self.config);
        if events.is_empty() {
            // a load is already in flight
            return false;
        }
        self.popup = None;
        self.message = None;
        spawn_deck_load(
            ctx.link().clone(),
            self.session.generation(),
            self.config,
            self.next_seed(),
        );
        self.apply_events(ctx, events);
        true
    }

    fn reset_game(&mut self, ctx: &Context<Self>) -> bool {
        self.stop_countdown();
        self.popup = None;
        self.message = None;
        let events = self.session.reset();
        self.apply_events(ctx, events);
        true
    }

    fn control_label(&self) -> &'static str {
        match self.session.phase() {
            Phase::Idle => "Start Game",
            Phase::Loading => "Cancel",
            Phase::Playing => "Reset",
            Phase::Won | Phase::Lost => "Play Again",
        }
    }

    fn view_card(&self, ctx: &Context<Self>, index: usize, card: &Card) -> Html {
        let face_up = card.matched || self.session.is_face_up(index) || self.session.reveal_all();
        let class = classes!(
            "card",
            face_up.then_some("flipped"),
            card.matched.then_some("matched"),
        );
        let onclick = ctx.link().callback(move |_| Msg::CardClicked(index));
        html! {
            <div {class} {onclick}>
                <div class="card-inner">
                    <div class="card-back"/>
                    <div class="card-front">
                        <img
                            src={card.identity.artwork_url.clone()}
                            alt={card.identity.name.clone()}
                            loading="lazy"
                        />
                    </div>
                </div>
            </div>
        }
    }

    fn view_popup(&self, ctx: &Context<Self>, summary: &Summary) -> Html {
        let onclose = ctx.link().callback(|_| Msg::ClosePopup);
        let title = if summary.won { "You Won!" } else { "Game Over" };
        html! {
            <Modal>
                <dialog id="result" open={true} class={if summary.won { "won" } else { "lost" }}>
                    <article>
                        <h2>{title}</h2>
                        <ul>
                            <li>{format!("Pairs: {}/{}", summary.matched_pairs, summary.total_pairs)}</li>
                            <li>{format!("Clicks: {}", summary.attempts)}</li>
                            <li>{format!("Time left: {}s", summary.seconds_left)}</li>
                        </ul>
                        <footer>
                            <button onclick={onclose}>{"Close"}</button>
                        </footer>
                    </article>
                </dialog>
            </Modal>
        }
    }
}

impl Component for GameView {
    type Message = Msg;
    type Properties = GameProps;

    fn create(ctx: &Context<Self>) -> Self {
        Self {
            session: Session::new(),
            config: SessionConfig::easy(),
            forced_seed: ctx.props().seed,
            countdown: None,
            popup: None,
            message: None,
            theme: LocalOrDefault::local_or_default(),
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        use Msg::*;

        match msg {
            SetDifficulty(config) => {
                if self.config == config {
                    return false;
                }
                self.config = config;
                // changing difficulty mid-game abandons the session
                if !self.session.phase().can_start() {
                    self.reset_game(ctx);
                }
                true
            }
            StartOrReset => {
                if self.session.phase().can_start() {
                    self.start_game(ctx)
                } else {
                    self.reset_game(ctx)
                }
            }
            CardClicked(index) => {
                let events = self.session.flip(index);
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                updated
            }
            PowerUp => {
                let events = self.session.activate_power_up();
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                updated
            }
            Tick => {
                let events = self.session.tick();
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                updated
            }
            TimerFired(token) => {
                let events = self.session.timer_fired(token);
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                updated
            }
            DeckReady { generation, deck } => {
                let events = self.session.deck_ready(generation, deck);
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                self.start_countdown(ctx);
                updated
            }
            LoadFailed {
                generation,
                message,
            } => {
                let events = self.session.load_failed(generation, message);
                let updated = !events.is_empty();
                self.apply_events(ctx, events);
                updated
            }
            ClosePopup => {
                self.popup = None;
                self.reset_game(ctx)
            }
            ToggleTheme => {
                let theme = self.theme.unwrap_or_default().toggled();
                self.theme = Some(theme);
                Theme::apply(self.theme);
                true
            }
        }
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        use Msg::*;

        let session = &self.session;
        let playing = session.phase() == Phase::Playing;

        let difficulty_buttons = DIFFICULTIES.iter().map(|&(label, config)| {
            let class = classes!(
                "difficulty",
                (self.config == config).then_some("active"),
            );
            let onclick = ctx.link().callback(move |_| SetDifficulty(config));
            html! {
                <button {class} {onclick}>{label}</button>
            }
        });

        let theme_label = match self.theme.unwrap_or_default() {
            Theme::Light => "Dark Mode",
            Theme::Dark => "Light Mode",
        };

        let message = self.message.clone().or_else(|| {
            (session.phase() == Phase::Loading).then(|| "Loading cards...".to_string())
        });

        let columns = grid_columns(session.config().deck_size());
        let grid_style = format!("--columns: {columns}");

        html! {
            <div class="shinkei">
                <header>
                    { for difficulty_buttons }
                    <button class="theme" onclick={ctx.link().callback(|_| ToggleTheme)}>
                        {theme_label}
                    </button>
                </header>
                <nav>
                    <aside title="Seconds left">{format_for_counter(session.seconds_left() as i32)}</aside>
                    <aside title="Clicks">{format_for_counter(session.attempts() as i32)}</aside>
                    <aside title="Matches">
                        {format!("{}/{}", session.matched_pairs(), session.total_pairs())}
                    </aside>
                    <aside title="Pairs left">{session.pairs_left()}</aside>
                    <span>
                        <button
                            class="powerup"
                            disabled={!(playing && session.power_up_available())}
                            onclick={ctx.link().callback(|_| PowerUp)}
                        >
                            {"Reveal"}
                        </button>
                        <button class="control" onclick={ctx.link().callback(|_| StartOrReset)}>
                            {self.control_label()}
                        </button>
                    </span>
                </nav>
                if let Some(message) = message {
                    <p class="message">{message}</p>
                }
                <section class="board" style={grid_style}>
                    {
                        for session
                            .deck()
                            .iter()
                            .enumerate()
                            .map(|(index, card)| self.view_card(ctx, index, card))
                    }
                </section>
                if let Some(summary) = &self.popup {
                    { self.view_popup(ctx, summary) }
                }
            </div>
        }
    }
}
