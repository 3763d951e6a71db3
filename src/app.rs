// The controller: a winit event loop that ticks the pet at a fixed rate,
// samples the cursor, and moves the two sprite windows.

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{DeviceEvent, DeviceId, ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, DeviceEvents, EventLoop, EventLoopProxy};
use winit::window::WindowId;

use crate::config::{Config, wander_speed_for};
use crate::event::AppMsg;
use crate::model::geometry::{Point, ScreenRect};
use crate::model::pet::{AnimationKey, Pet, PetState};
use crate::model::state::PetStatus;
use crate::panel;
use crate::sprite::library::AnimationLibrary;
use crate::sprite::player::SpritePlayer;
use crate::sprite::window::SpriteWindow;
use crate::tracker::{CursorSample, CursorTracker, SessionEnv, create_cursor_tracker};

const STATUS_INTERVAL: Duration = Duration::from_millis(200);
const SCREEN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Both ends of the panel's channel: the pet publishes on `tx`, the panel
/// thread reads `rx`.
pub struct PanelChannels {
    pub tx: Sender<AppMsg>,
    pub rx: Receiver<AppMsg>,
}

/// Geometry of the monitor the pet lives on, in logical pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Screen {
    pub rect: ScreenRect,
    pub scale_factor: f64,
}

impl Screen {
    pub const FALLBACK: Screen = Screen {
        rect: ScreenRect::new(0.0, 0.0, 1920.0, 1080.0),
        scale_factor: 1.0,
    };

    pub fn from_physical(x: i32, y: i32, width: u32, height: u32, scale_factor: f64) -> Self {
        let sf = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        Self {
            rect: ScreenRect::new(
                x as f64 / sf,
                y as f64 / sf,
                width as f64 / sf,
                height as f64 / sf,
            ),
            scale_factor: sf,
        }
    }

    pub fn logical_height(&self) -> u32 {
        self.rect.height.round().max(1.0) as u32
    }
}

fn primary_screen(event_loop: &ActiveEventLoop) -> Screen {
    let monitor = event_loop
        .primary_monitor()
        .or_else(|| event_loop.available_monitors().next());
    match monitor {
        Some(m) => {
            let pos = m.position();
            let size = m.size();
            Screen::from_physical(pos.x, pos.y, size.width, size.height, m.scale_factor())
        }
        None => {
            warn!("no monitor reported, assuming 1920x1080");
            Screen::FALLBACK
        }
    }
}

/// Divides backend samples that are in physical pixels.
pub fn to_logical(x: f64, y: f64, needs_dpr_scaling: bool, scale_factor: f64) -> (f64, f64) {
    if needs_dpr_scaling && scale_factor > 0.0 && scale_factor != 1.0 {
        (x / scale_factor, y / scale_factor)
    } else {
        (x, y)
    }
}

/// Where the seal window sits, as far as the pet is concerned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SealSpot {
    pub visible: bool,
    pub center: Point,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SealChange {
    Unchanged,
    Appeared,
    Dismissed,
}

/// Runs one behaviour tick for a logical cursor sample and keeps the seal
/// bookkeeping in step with it. `spawn` picks the centre of a newly
/// summoned seal. The pet ends up inside `screen` shrunk by `margin`; the
/// caller only has to mirror the returned change onto the windows.
pub fn step_pet(
    pet: &mut Pet,
    cursor: CursorSample,
    now_ms: f64,
    seal: &mut SealSpot,
    spawn: impl FnOnce() -> Point,
    screen: &ScreenRect,
    margin: f64,
) -> SealChange {
    pet.begin_tick();
    pet.update_mouse(cursor.x, cursor.y, cursor.pressed, now_ms);
    pet.tick(now_ms);

    let mut change = SealChange::Unchanged;
    if pet.seal_should_appear() {
        *seal = SealSpot {
            visible: true,
            center: spawn(),
        };
        change = SealChange::Appeared;
    }
    if pet.seal_should_disappear() {
        seal.visible = false;
        change = SealChange::Dismissed;
    }
    if seal.visible {
        pet.set_seal_position(seal.center.x, seal.center.y);
    }

    pet.clamp_to(screen, margin);
    change
}

/// Delivers the quit request an interrupt stands for. Returns false once
/// nobody is listening anymore.
fn forward_interrupt<E>(send: impl FnOnce(AppMsg) -> Result<(), E>) -> bool {
    send(AppMsg::Quit).is_ok()
}

/// Ctrl+C asks the event loop to shut down cleanly so compositor scripts
/// and windows are torn down. A second one after the loop is gone exits.
fn install_interrupt_handler(proxy: EventLoopProxy<AppMsg>) {
    let installed = ctrlc::set_handler(move || {
        if !forward_interrupt(|msg| proxy.send_event(msg)) {
            std::process::exit(130);
        }
    });
    if let Err(e) = installed {
        warn!("cannot install Ctrl+C handler: {e}");
    }
}

/// Builds the event loop, optionally starts the panel, and runs until quit.
pub fn run(config: Config, library: AnimationLibrary, panel: Option<PanelChannels>) -> Result<()> {
    let env = SessionEnv::from_process();

    #[cfg_attr(not(target_os = "linux"), allow(unused_mut))]
    let mut builder = EventLoop::<AppMsg>::with_user_event();
    #[cfg(target_os = "linux")]
    if env.wayland {
        // toolkit-level windows must be XWayland surfaces so global
        // positioning and always-on-top work
        use winit::platform::x11::EventLoopBuilderExtX11;
        builder.with_x11();
        info!("wayland session detected, using XWayland for sprite windows");
    }
    let event_loop = builder.build().context("Failed to create event loop")?;
    event_loop.listen_device_events(DeviceEvents::Always);
    install_interrupt_handler(event_loop.create_proxy());

    let mut status_tx = None;
    let mut panel_thread = None;
    if let Some(channels) = panel {
        let handle = panel::spawn(event_loop.create_proxy(), channels.rx, config.speed)?;
        panel_thread = Some((handle, channels.tx.clone()));
        status_tx = Some(channels.tx);
    }

    let mut app = App::new(config, library, env, status_tx);
    let loop_result = event_loop.run_app(&mut app);

    let mut panel_result = Ok(());
    if let Some((handle, tx)) = panel_thread {
        let _ = tx.send(AppMsg::Quit);
        panel_result = handle
            .join()
            .map_err(|_| anyhow!("panel thread panicked"))
            .and_then(|r| r);
    }

    loop_result.context("Event loop failed")?;
    if let Some(e) = app.fatal.take() {
        return Err(e);
    }
    panel_result
}

struct App {
    config: Config,
    library: AnimationLibrary,
    env: SessionEnv,
    status_tx: Option<Sender<AppMsg>>,
    speed_override: Option<f64>,
    started: Instant,
    running: Option<Running>,
    fatal: Option<anyhow::Error>,
}

impl App {
    fn new(
        config: Config,
        library: AnimationLibrary,
        env: SessionEnv,
        status_tx: Option<Sender<AppMsg>>,
    ) -> Self {
        let speed_override = config.speed.map(|p| p.move_speed());
        Self {
            config,
            library,
            env,
            status_tx,
            speed_override,
            started: Instant::now(),
            running: None,
            fatal: None,
        }
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            running.tracker.close();
            running.pet_window.hide();
            running.seal_window.hide();
            info!("shutting down");
        }
        event_loop.exit();
    }
}

impl ApplicationHandler<AppMsg> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.running.is_some() {
            return;
        }
        match Running::start(
            event_loop,
            &self.config,
            &self.library,
            &self.env,
            self.speed_override,
            self.started.elapsed(),
        ) {
            Ok(running) => {
                event_loop.set_control_flow(ControlFlow::WaitUntil(running.next_tick));
                self.running = Some(running);
            }
            Err(e) => {
                self.fatal = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => self.shutdown(event_loop),
            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(running) = self.running.as_mut() {
                    running.screen_dirty = true;
                }
            }
            _ => {}
        }
    }

    fn device_event(&mut self, _event_loop: &ActiveEventLoop, _id: DeviceId, event: DeviceEvent) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        match event {
            DeviceEvent::MouseMotion { delta: (dx, dy) } => {
                running.tracker.on_device_motion(dx, dy)
            }
            // the primary button id differs between platforms
            DeviceEvent::Button { button: 0 | 1, state } => running
                .tracker
                .on_device_button(state == ElementState::Pressed),
            _ => {}
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, msg: AppMsg) {
        match msg {
            AppMsg::SetSpeed(speed) => {
                info!(speed, "speed changed");
                self.speed_override = Some(speed);
                if let Some(running) = self.running.as_mut() {
                    running.set_speed(speed);
                }
            }
            AppMsg::Quit => self.shutdown(event_loop),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = self.running.as_mut() else {
            return;
        };
        let now = Instant::now();
        if now >= running.next_tick {
            running.tick(event_loop, &self.config, &self.library, self.started.elapsed());
            if let Some(tx) = &self.status_tx {
                running.publish_status(tx, now);
            }
            running.next_tick += running.interval;
            if running.next_tick <= now {
                running.next_tick = now + running.interval;
            }
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(running.next_tick));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(mut running) = self.running.take() {
            running.tracker.close();
        }
    }
}

struct Running {
    pet: Pet,
    last_state: PetState,
    tracker: Box<dyn CursorTracker>,
    pet_window: SpriteWindow,
    seal_window: SpriteWindow,
    pet_player: SpritePlayer,
    seal_player: SpritePlayer,
    screen: Screen,
    screen_dirty: bool,
    render_scale: f64,
    needs_redraw: bool,
    pressed: bool,
    speed_override: Option<f64>,
    rng: StdRng,
    interval: Duration,
    next_tick: Instant,
    last_status: Option<Instant>,
    last_screen_check: Instant,
}

impl Running {
    fn start(
        event_loop: &ActiveEventLoop,
        config: &Config,
        library: &AnimationLibrary,
        env: &SessionEnv,
        speed_override: Option<f64>,
        elapsed: Duration,
    ) -> Result<Self> {
        let screen = primary_screen(event_loop);
        let scaled = config.pet.adapt_to_screen(screen.logical_height());
        info!(
            height = screen.logical_height(),
            ratio = scaled.ratio,
            scale_factor = screen.scale_factor,
            "screen adapted"
        );

        let mut pet_window = SpriteWindow::create(event_loop, "Aemeath")?;
        let mut seal_window = SpriteWindow::create(event_loop, "Aemeath seal")?;
        pet_window.set_scale_factor(screen.scale_factor);
        seal_window.set_scale_factor(screen.scale_factor);

        let start = screen.rect.center();
        let mut pet = Pet::new(start, config.pet.clone(), scaled, library.idle_count());
        if let Some(speed) = speed_override {
            pet.set_speeds(speed, wander_speed_for(speed));
        }

        let tracker = create_cursor_tracker(env, config.backend, screen.rect);

        let render_scale = scaled.sprite_scale * screen.scale_factor;
        let mut pet_player = SpritePlayer::new();
        pet_player.set_scale(render_scale);
        pet_player.set_animation(pet.animation(), elapsed);
        let mut seal_player = SpritePlayer::new();
        seal_player.set_scale(render_scale);
        seal_player.set_animation(AnimationKey::Seal, elapsed);

        pet_window.move_center_to(start);
        if let Some(frame) = pet_player.render(library) {
            pet_window.present(frame)?;
        }
        pet_window.show();

        let interval = Duration::from_millis(config.pet.tick_interval_ms.max(1));
        let now = Instant::now();
        Ok(Self {
            last_state: pet.state(),
            pet,
            tracker,
            pet_window,
            seal_window,
            pet_player,
            seal_player,
            screen,
            screen_dirty: false,
            render_scale,
            needs_redraw: false,
            pressed: false,
            speed_override,
            rng: StdRng::from_os_rng(),
            interval,
            next_tick: now + interval,
            last_status: None,
            last_screen_check: now,
        })
    }

    fn set_speed(&mut self, speed: f64) {
        self.speed_override = Some(speed);
        self.pet.set_speeds(speed, wander_speed_for(speed));
    }

    fn tick(
        &mut self,
        event_loop: &ActiveEventLoop,
        config: &Config,
        library: &AnimationLibrary,
        elapsed: Duration,
    ) {
        if self.screen_dirty || self.last_screen_check.elapsed() >= SCREEN_CHECK_INTERVAL {
            self.last_screen_check = Instant::now();
            let screen = primary_screen(event_loop);
            if self.screen_dirty || screen != self.screen {
                self.apply_screen(screen, config, library);
            }
            self.screen_dirty = false;
        }

        let now_ms = elapsed.as_secs_f64() * 1000.0;
        let sample = self.tracker.query();
        let (mx, my) = to_logical(
            sample.x,
            sample.y,
            self.tracker.needs_dpr_scaling(),
            self.screen.scale_factor,
        );
        self.pressed = sample.pressed;

        let mut seal = SealSpot {
            visible: self.seal_window.is_visible(),
            center: self.seal_window.center(),
        };
        let rect = self.screen.rect;
        let rng = &mut self.rng;
        let change = step_pet(
            &mut self.pet,
            CursorSample::new(mx, my, sample.pressed),
            now_ms,
            &mut seal,
            || rect.random_point(rng, config.pet.seal_spawn_margin),
            &rect,
            config.pet.screen_margin,
        );
        match change {
            SealChange::Appeared => self.show_seal(seal.center, library, elapsed),
            SealChange::Dismissed => {
                self.seal_window.hide();
                info!("seal dismissed");
            }
            SealChange::Unchanged => {}
        }

        let p = self.pet.position();
        self.pet_window
            .move_center_to(Point::new(p.x.trunc(), p.y.trunc()));

        if self.pet.state() != self.last_state {
            debug!(from = self.last_state.label(), to = self.pet.state().label(), "pet state");
            self.last_state = self.pet.state();
        }

        let mut dirty = std::mem::take(&mut self.needs_redraw);
        dirty |= self.pet_player.set_animation(self.pet.animation(), elapsed);
        dirty |= self.pet_player.set_flipped(self.pet.flipped());
        dirty |= self.pet_player.advance(library, elapsed);
        if dirty {
            if let Some(frame) = self.pet_player.render(library) {
                if let Err(e) = self.pet_window.present(frame) {
                    warn!("failed to draw pet: {e:#}");
                }
            }
        }

        if self.seal_window.is_visible() && self.seal_player.advance(library, elapsed) {
            self.present_seal(library);
        }
    }

    fn show_seal(&mut self, spot: Point, library: &AnimationLibrary, elapsed: Duration) {
        self.seal_player.restart(elapsed);
        self.seal_window.move_center_to(spot);
        self.present_seal(library);
        self.seal_window.show();
        info!(x = spot.x, y = spot.y, "seal appeared");
    }

    fn present_seal(&mut self, library: &AnimationLibrary) {
        if let Some(frame) = self.seal_player.render(library) {
            if let Err(e) = self.seal_window.present(frame) {
                warn!("failed to draw seal: {e:#}");
            }
        }
    }

    fn apply_screen(&mut self, screen: Screen, config: &Config, library: &AnimationLibrary) {
        let scaled = config.pet.adapt_to_screen(screen.logical_height());
        self.pet.set_scaled(scaled);
        if let Some(speed) = self.speed_override {
            self.pet.set_speeds(speed, wander_speed_for(speed));
        }

        self.render_scale = scaled.sprite_scale * screen.scale_factor;
        self.needs_redraw |= self.pet_player.set_scale(self.render_scale);
        if self.seal_player.set_scale(self.render_scale) && self.seal_window.is_visible() {
            self.present_seal(library);
        }
        self.pet_window.set_scale_factor(screen.scale_factor);
        self.seal_window.set_scale_factor(screen.scale_factor);

        info!(
            height = screen.logical_height(),
            ratio = scaled.ratio,
            scale_factor = screen.scale_factor,
            "screen changed, parameters re-adapted"
        );
        self.screen = screen;
    }

    fn publish_status(&mut self, tx: &Sender<AppMsg>, now: Instant) {
        if self
            .last_status
            .is_some_and(|last| now.duration_since(last) < STATUS_INTERVAL)
        {
            return;
        }
        self.last_status = Some(now);

        let status = PetStatus {
            state: self.pet.state(),
            position: self.pet.position(),
            cursor: self.pet.mouse(),
            pressed: self.pressed,
            mouse_idle_ms: self.pet.mouse_idle_ms(),
            backend: self.tracker.kind().to_string(),
            seal_visible: self.seal_window.is_visible(),
            move_speed: self.pet.move_speed(),
            screen_height: self.screen.logical_height(),
        };
        let _ = tx.send(AppMsg::Status(status));
    }
}
