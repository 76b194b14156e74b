//! Circle Rush entry point
//!
//! The web build wires the game to the DOM. The native build runs a short
//! headless session against the offline score store.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::RefCell;
    use std::f64::consts::TAU;
    use std::rc::{Rc, Weak};

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlInputElement, KeyboardEvent, Window};

    use circle_rush::audio::{AudioManager, MusicCue};
    use circle_rush::platform::web::{BrowserHost, Dispatch, FetchTransport, LocalStorage};
    use circle_rush::platform::{HostEvent, HostHandle, KeyValueStorage, MemoryStorage};
    use circle_rush::scores::{ScoreService, ScoreStore};
    use circle_rush::sim::Bounds;
    use circle_rush::{Game, Settings, StoreError, StoreRequest};

    type Scores = ScoreService<FetchTransport, Rc<dyn KeyValueStorage>>;

    const CIRCLE_COLOR: &str = "#ffcc00";
    const OFFLINE_NOTICE: &str = "Server not responding. No worries, you can still play offline!";

    /// Everything the page needs, shared between DOM callbacks
    struct App {
        game: Game,
        host: BrowserHost,
        scores: Rc<Scores>,
        audio: AudioManager,
        settings: Settings,
        window: Window,
        document: Document,
        canvas: HtmlCanvasElement,
        ctx: CanvasRenderingContext2d,
        this: Weak<RefCell<App>>,
    }

    impl App {
        /// Route a fired host handle into the game
        fn dispatch(app: &Rc<RefCell<App>>, handle: HostHandle, event: HostEvent) {
            let Ok(mut app) = app.try_borrow_mut() else {
                log::warn!("Dropping {:?}: app busy", handle);
                return;
            };
            app.host.collect();
            app.host.fired(handle);
            let now = app.host.now_ms();
            let app = &mut *app;
            let request = app.game.on_host_event(handle, event, now, &mut app.host);
            app.after_update(request);
        }

        /// Sounds, HUD and board after any state change
        fn after_update(&mut self, request: Option<StoreRequest>) {
            for event in self.game.take_events() {
                self.audio.on_event(&event);
            }
            if let Some(request) = request {
                self.spawn(request);
            }
            self.refresh_hud();
            self.draw();
        }

        /// Run a store request without holding the app borrow across the await
        fn spawn(&self, request: StoreRequest) {
            let scores = self.scores.clone();
            let this = self.this.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let follow_up = match request {
                    StoreRequest::FetchBest {
                        ticket,
                        player,
                        level,
                    } => {
                        let result = scores.get_best(&player, level).await;
                        with_app(&this, |app| {
                            match result {
                                Ok(best) => {
                                    app.game.apply_best(ticket, best);
                                }
                                Err(err) => log::warn!("Could not load best time: {err}"),
                            }
                            None
                        })
                    }
                    StoreRequest::Submit {
                        ticket,
                        player,
                        level,
                        time,
                    } => {
                        let result = scores.submit_score(&player, level, time).await;
                        with_app(&this, |app| match result {
                            Ok(outcome) => app.game.apply_submit(ticket, outcome),
                            Err(err) => {
                                log::warn!("Could not save score: {err}");
                                None
                            }
                        })
                    }
                };
                with_app(&this, |app| {
                    if let Some(next) = follow_up {
                        app.spawn(next);
                    }
                    None::<()>
                });
            });
        }

        fn check_offline_notice(&mut self) {
            if self.scores.take_offline_notice() {
                self.game.set_offline();
                let _ = self.window.alert_with_message(OFFLINE_NOTICE);
            }
        }

        fn set_text(&self, id: &str, text: &str) {
            if let Some(el) = self.document.get_element_by_id(id) {
                el.set_text_content(Some(text));
            }
        }

        fn set_hidden(&self, id: &str, hidden: bool) {
            if let Some(el) = self.document.get_element_by_id(id) {
                let _ = el.class_list().toggle_with_force("hidden", hidden);
            }
        }

        fn refresh_hud(&mut self) {
            self.check_offline_notice();
            self.set_text("level", &self.game.level_text());
            self.set_text("timer-cnt", &self.game.timer_text());
            self.set_text("cnt-hi-score", &self.game.best_text());
            self.set_text("cnt-score", &self.game.last_score_text());
            let message = self.game.result().map(|r| r.message()).unwrap_or_default();
            self.set_text("game-message", &message);
            self.set_text("player-name", &self.game.player_label().unwrap_or_default());
            self.set_hidden("mute-on", self.settings.muted);
            self.set_hidden("mute-off", !self.settings.muted);
        }

        fn draw(&self) {
            let bounds = self.game.bounds();
            self.ctx
                .clear_rect(0.0, 0.0, bounds.width as f64, bounds.height as f64);
            let Some(circle) = self.game.circle() else {
                return;
            };
            self.ctx.begin_path();
            if self
                .ctx
                .arc(circle.pos.x as f64, circle.pos.y as f64, circle.radius as f64, 0.0, TAU)
                .is_ok()
            {
                self.ctx.set_fill_style_str(CIRCLE_COLOR);
                self.ctx.fill();
            }
        }

        /// Match the canvas backing store to its CSS size
        fn fit_canvas(&mut self) {
            let width = self.canvas.client_width().max(0) as u32;
            let height = self.canvas.client_height().max(0) as u32;
            self.canvas.set_width(width);
            self.canvas.set_height(height);
            self.game.resize(Bounds::new(width as f32, height as f32));
        }

        fn show_prompt(&self) {
            if let Some(input) = self
                .document
                .get_element_by_id("username-input")
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
            {
                input.set_value(&self.scores.offline().last_player().unwrap_or_default());
                let _ = input.focus();
            }
            self.set_hidden("popup", false);
        }

        fn prompt_value(&self) -> String {
            self.document
                .get_element_by_id("username-input")
                .and_then(|el| el.dyn_into::<HtmlInputElement>().ok())
                .map(|input| input.value())
                .unwrap_or_default()
        }

        fn toggle_mute(&mut self) {
            self.settings.muted = !self.settings.muted;
            self.audio.apply(&self.settings);
            self.settings.save();
        }
    }

    /// Borrow the app from an async task, if it still exists and is free
    fn with_app<R>(this: &Weak<RefCell<App>>, f: impl FnOnce(&mut App) -> Option<R>) -> Option<R> {
        let app = this.upgrade()?;
        let Ok(mut app) = app.try_borrow_mut() else {
            log::warn!("Store answer dropped: app busy");
            return None;
        };
        let result = f(&mut app);
        app.refresh_hud();
        result
    }

    fn sign_in(app: &Rc<RefCell<App>>) {
        let (scores, name) = {
            let app = app.borrow();
            (app.scores.clone(), app.prompt_value())
        };
        let this = Rc::downgrade(app);
        wasm_bindgen_futures::spawn_local(async move {
            let result = scores.sign_in(&name).await;
            with_app(&this, |app| {
                match result {
                    Ok((session, profile)) => {
                        app.game.sign_in(session, &profile);
                        app.set_hidden("popup", true);
                    }
                    Err(StoreError::Validation(message)) => {
                        let _ = app.window.alert_with_message(&message);
                    }
                    Err(err) => {
                        log::error!("Sign-in failed: {err}");
                        let _ = app.window.alert_with_message("Error loading user!");
                    }
                }
                None::<()>
            });
        });
    }

    /// Attach a click handler that runs `action` on the app
    fn on_click(app: &Rc<RefCell<App>>, id: &str, action: fn(&mut App, f64) -> Option<StoreRequest>) {
        let Some(el) = app.borrow().document.get_element_by_id(id) else {
            log::warn!("Missing element #{id}");
            return;
        };
        let this = Rc::downgrade(app);
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
            let Some(app) = this.upgrade() else { return };
            let Ok(mut app) = app.try_borrow_mut() else { return };
            app.host.collect();
            let now = app.host.now_ms();
            let request = action(&mut app, now);
            app.after_update(request);
        });
        let _ = el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn start_or_prompt(app: &mut App, now: f64) -> Option<StoreRequest> {
        if app.game.player().is_none() {
            app.show_prompt();
            return None;
        }
        app.game.start(now, &mut app.host);
        None
    }

    fn setup_buttons(app: &Rc<RefCell<App>>) {
        on_click(app, "start-button", start_or_prompt);
        on_click(app, "replay", start_or_prompt);
        on_click(app, "next-level", |app, now| app.game.next_level(now, &mut app.host));
        on_click(app, "prev-level", |app, now| app.game.prev_level(now, &mut app.host));
        on_click(app, "mute-on", |app, _| {
            app.toggle_mute();
            None
        });
        on_click(app, "mute-off", |app, _| {
            app.toggle_mute();
            None
        });
        on_click(app, "switch-user", |app, _| {
            app.game.switch_user(&mut app.host);
            app.audio.cue_music(MusicCue::Stop);
            app.show_prompt();
            None
        });

        let document = app.borrow().document.clone();
        if let Some(btn) = document.get_element_by_id("start-fun") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| sign_in(&app));
            let _ = btn.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
        }
        if let Some(input) = document.get_element_by_id("username-input") {
            let app = app.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if event.key() == "Enter" {
                    sign_in(&app);
                }
            });
            let _ = input.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }
    }

    fn setup_resize(app: &Rc<RefCell<App>>) {
        let window = app.borrow().window.clone();
        let this = Rc::downgrade(app);
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Some(app) = this.upgrade() else { return };
            let Ok(mut app) = app.try_borrow_mut() else { return };
            app.fit_canvas();
            app.draw();
        });
        let _ = window.add_event_listener_with_callback("resize", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        if console_log::init_with_level(log::Level::Info).is_err() {
            web_sys::console::warn_1(&"Logger already initialized".into());
        }

        log::info!("Circle Rush starting...");

        let settings = Settings::load();
        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;
        let canvas: HtmlCanvasElement = document
            .get_element_by_id("game-canvas")
            .ok_or("no canvas")?
            .dyn_into()?;
        let ctx: CanvasRenderingContext2d = canvas.get_context("2d")?.ok_or("no 2d context")?.dyn_into()?;

        let storage: Rc<dyn KeyValueStorage> = match LocalStorage::open() {
            Some(storage) => Rc::new(storage),
            None => Rc::new(MemoryStorage::new()),
        };
        let config = settings.game_config();
        let scores = Rc::new(ScoreService::new(
            FetchTransport::new(settings.server_base()),
            storage,
            config.level_count,
        ));

        let seed = js_sys::Date::now() as u64;
        let bounds = Bounds::new(canvas.client_width() as f32, canvas.client_height() as f32);
        let app = Rc::new_cyclic(|this: &Weak<RefCell<App>>| {
            let weak = this.clone();
            let dispatch: Dispatch = Rc::new(move |handle: HostHandle, event: HostEvent| {
                if let Some(app) = weak.upgrade() {
                    App::dispatch(&app, handle, event);
                }
            });
            RefCell::new(App {
                game: Game::new(config, bounds, seed),
                host: BrowserHost::new(window.clone(), canvas.clone(), dispatch),
                scores,
                audio: AudioManager::new(&settings),
                settings,
                window,
                document,
                canvas,
                ctx,
                this: this.clone(),
            })
        });
        log::info!("Game initialized with seed: {}", seed);

        setup_buttons(&app);
        setup_resize(&app);
        {
            let mut app = app.borrow_mut();
            app.fit_canvas();
            app.refresh_hud();
            app.draw();
            app.show_prompt();
        }

        log::info!("Circle Rush running!");
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    wasm_game::run()
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    //! Plays one round per level group without a browser or server

    use circle_rush::platform::manual::ManualHost;
    use circle_rush::platform::{HandleKind, HostEvent, KeyValueStorage, MemoryStorage};
    use circle_rush::scores::{HttpResponse, ScoreService, ScoreStore, Transport};
    use circle_rush::sim::{Bounds, RoundPhase};
    use circle_rush::{Game, GameConfig, StoreError, StoreRequest};
    use pollster::block_on;

    /// Frame period of a 60 Hz display
    const FRAME_MS: f64 = 1000.0 / 60.0;

    /// No network here; the service falls back to offline on the first call
    struct NoServer;

    impl Transport for NoServer {
        async fn get(&self, _path: &str) -> Result<HttpResponse, StoreError> {
            Err(StoreError::Transport("no network in headless mode".into()))
        }

        async fn post_json(&self, _path: &str, _body: &str) -> Result<HttpResponse, StoreError> {
            Err(StoreError::Transport("no network in headless mode".into()))
        }
    }

    fn execute<S: KeyValueStorage>(
        game: &mut Game,
        scores: &ScoreService<NoServer, S>,
        mut request: Option<StoreRequest>,
    ) {
        while let Some(next) = request.take() {
            request = match next {
                StoreRequest::FetchBest {
                    ticket,
                    player,
                    level,
                } => {
                    match block_on(scores.get_best(&player, level)) {
                        Ok(best) => {
                            game.apply_best(ticket, best);
                        }
                        Err(err) => log::warn!("get_best failed: {err}"),
                    }
                    None
                }
                StoreRequest::Submit {
                    ticket,
                    player,
                    level,
                    time,
                } => match block_on(scores.submit_score(&player, level, time)) {
                    Ok(outcome) => game.apply_submit(ticket, outcome),
                    Err(err) => {
                        log::warn!("submit failed: {err}");
                        None
                    }
                },
            };
        }
    }

    /// Let the circle move for `frames` frames, then click its centre
    fn play_round<S: KeyValueStorage>(
        game: &mut Game,
        host: &mut ManualHost,
        scores: &ScoreService<NoServer, S>,
        mut now: f64,
        frames: u32,
    ) -> f64 {
        for _ in 0..frames {
            now += FRAME_MS;
            if let Some(frame) = host.fire(HandleKind::Frame) {
                game.on_host_event(frame, HostEvent::Frame, now, host);
            }
            if let Some(tick) = host.fire(HandleKind::Interval) {
                game.on_host_event(tick, HostEvent::Interval, now, host);
            }
        }
        if let Some(relocate) = host.fire(HandleKind::Timeout) {
            game.on_host_event(relocate, HostEvent::Timeout, now, host);
        }

        let (Some(circle), Some(pointer)) = (game.circle().copied(), host.live_of(HandleKind::Pointer)) else {
            return now;
        };
        let click = HostEvent::Pointer {
            x: circle.pos.x,
            y: circle.pos.y,
        };
        let request = game.on_host_event(pointer, click, now, host);
        execute(game, scores, request);
        now
    }

    pub fn run() -> Result<(), StoreError> {
        let config = GameConfig::default();
        let scores = ScoreService::new(NoServer, MemoryStorage::new(), config.level_count);
        let (session, profile) = block_on(scores.sign_in("headless"))?;
        if scores.take_offline_notice() {
            log::info!("Score server unreachable, playing offline");
        }

        let mut game = Game::new(config, Bounds::new(500.0, 400.0), 7);
        let mut host = ManualHost::new();
        game.sign_in(session, &profile);

        let mut now = 0.0;
        for level in 1..=game.level_count() {
            // The scripted clicker gets a little quicker every level
            let frames = 120u32.saturating_sub(level * 4);
            let request = game.change_level(level as i64, now, &mut host);
            execute(&mut game, &scores, request);
            now = play_round(&mut game, &mut host, &scores, now, frames);
            if game.phase() == RoundPhase::Ended {
                println!(
                    "{:<10} {} (best {})",
                    game.level_text(),
                    game.last_score_text(),
                    game.best_text()
                );
            }
            now += 1000.0;
        }

        // Replay the last level faster to set a new record
        game.start(now, &mut host);
        play_round(&mut game, &mut host, &scores, now, 10);
        if let Some(result) = game.result() {
            println!("{}", result.message());
        }
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Circle Rush (native) starting...");
    log::info!("Run with `trunk serve` for the web version; playing a headless session");

    if let Err(err) = headless::run() {
        log::error!("Headless session failed: {err}");
        std::process::exit(1);
    }
}
