// Pet behaviour: a small state machine driven by cursor distance and idle time

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::TAU;

use super::geometry::{Point, ScreenRect};
use crate::config::{Scaled, Tunables};

/// Idle clip whose probability ramps up the longer the mouse rests.
pub const SPECIAL_IDLE: usize = 2;

/// Inner radius for random wander targets, in pixels.
const MIN_WANDER_RADIUS: f64 = 20.0;

/// Mouse travel (in multiples of the move threshold) that wakes an idling pet.
const IDLE_WAKE_FACTOR: f64 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PetState {
    Chasing,
    Wandering,
    Idling,
    Dragging,
    SealMode,
}

impl PetState {
    pub fn label(self) -> &'static str {
        match self {
            PetState::Chasing => "chasing",
            PetState::Wandering => "wandering",
            PetState::Idling => "idling",
            PetState::Dragging => "dragging",
            PetState::SealMode => "seal mode",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationKey {
    Move,
    Drag,
    Seal,
    /// 1-based index into the idle clips.
    Idle(usize),
}

/// Pure logic, no windowing. Per tick call [`Pet::begin_tick`],
/// [`Pet::update_mouse`], then [`Pet::tick`], and read the outputs.
pub struct Pet {
    position: Point,

    state: PetState,
    prev_state: PetState,

    mouse: Point,
    last_mouse: Point,
    mouse_idle_start_ms: f64,
    mouse_idle_ms: f64,
    mouse_pressed: bool,

    wander_anchor: Point,
    wander_target: Point,
    wander_end_ms: f64,
    wander_dir_change_ms: f64,

    idle_end_ms: f64,
    idle_anchor_mouse: Point,

    seal_active: bool,
    seal: Point,
    seal_wander_target: Point,
    seal_wander_dir_ms: f64,

    animation: AnimationKey,
    flipped: bool,
    seal_should_appear: bool,
    seal_should_disappear: bool,

    move_speed: f64,
    wander_speed: f64,

    tunables: Tunables,
    scaled: Scaled,
    idle_count: usize,
    rng: StdRng,
}

impl Pet {
    pub fn new(start: Point, tunables: Tunables, scaled: Scaled, idle_count: usize) -> Self {
        Self::with_rng(start, tunables, scaled, idle_count, StdRng::from_os_rng())
    }

    pub fn with_seed(
        start: Point,
        tunables: Tunables,
        scaled: Scaled,
        idle_count: usize,
        seed: u64,
    ) -> Self {
        Self::with_rng(start, tunables, scaled, idle_count, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        start: Point,
        tunables: Tunables,
        scaled: Scaled,
        idle_count: usize,
        rng: StdRng,
    ) -> Self {
        Self {
            position: start,
            state: PetState::Chasing,
            prev_state: PetState::Chasing,
            mouse: start,
            last_mouse: start,
            mouse_idle_start_ms: 0.0,
            mouse_idle_ms: 0.0,
            mouse_pressed: false,
            wander_anchor: start,
            wander_target: start,
            wander_end_ms: 0.0,
            wander_dir_change_ms: 0.0,
            idle_end_ms: 0.0,
            idle_anchor_mouse: start,
            seal_active: false,
            seal: Point::default(),
            seal_wander_target: Point::default(),
            seal_wander_dir_ms: 0.0,
            animation: AnimationKey::Move,
            flipped: false,
            seal_should_appear: false,
            seal_should_disappear: false,
            move_speed: scaled.move_speed,
            wander_speed: scaled.wander_speed,
            tunables,
            scaled,
            idle_count,
            rng,
        }
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn clamp_to(&mut self, rect: &ScreenRect, margin: f64) {
        self.position = rect.clamp(self.position, margin);
    }

    pub fn state(&self) -> PetState {
        self.state
    }

    pub fn animation(&self) -> AnimationKey {
        self.animation
    }

    pub fn flipped(&self) -> bool {
        self.flipped
    }

    pub fn seal_should_appear(&self) -> bool {
        self.seal_should_appear
    }

    pub fn seal_should_disappear(&self) -> bool {
        self.seal_should_disappear
    }

    pub fn seal_active(&self) -> bool {
        self.seal_active
    }

    pub fn mouse(&self) -> Point {
        self.mouse
    }

    pub fn mouse_idle_ms(&self) -> f64 {
        self.mouse_idle_ms
    }

    pub fn move_speed(&self) -> f64 {
        self.move_speed
    }

    pub fn wander_speed(&self) -> f64 {
        self.wander_speed
    }

    pub fn set_speeds(&mut self, move_speed: f64, wander_speed: f64) {
        self.move_speed = move_speed;
        self.wander_speed = wander_speed;
    }

    /// New screen geometry: distances follow and speeds reset to the
    /// scaled defaults.
    pub fn set_scaled(&mut self, scaled: Scaled) {
        self.scaled = scaled;
        self.move_speed = scaled.move_speed;
        self.wander_speed = scaled.wander_speed;
    }

    /// Clears the one-shot seal signals.
    pub fn begin_tick(&mut self) {
        self.seal_should_appear = false;
        self.seal_should_disappear = false;
    }

    pub fn update_mouse(&mut self, x: f64, y: f64, pressed: bool, now_ms: f64) {
        self.mouse_pressed = pressed;

        let current = Point::new(x, y);
        let moved = self.last_mouse.distance_to(current) > self.scaled.mouse_move_threshold;

        if moved {
            self.mouse_idle_start_ms = now_ms;
            self.mouse_idle_ms = 0.0;
            if self.seal_active {
                self.seal_active = false;
                self.seal_should_disappear = true;
            }
        } else {
            self.mouse_idle_ms = now_ms - self.mouse_idle_start_ms;
        }

        self.last_mouse = current;
        self.mouse = current;
    }

    pub fn set_seal_position(&mut self, x: f64, y: f64) {
        self.seal = Point::new(x, y);
    }

    pub fn tick(&mut self, now_ms: f64) {
        // dragging overrides whatever we were doing
        if self.mouse_pressed && self.state != PetState::Dragging {
            self.prev_state = self.state;
            self.state = PetState::Dragging;
        } else if !self.mouse_pressed && self.state == PetState::Dragging {
            self.state = self.prev_state;
        }

        let target = if self.seal_active && self.state != PetState::Dragging {
            self.seal
        } else {
            self.mouse
        };
        let (dx, dy) = self.position.delta_to(target);
        let dist = dx.hypot(dy);

        match self.state {
            PetState::Chasing => self.handle_chasing(dx, dy, dist, now_ms),
            PetState::Wandering => self.handle_wandering(dist, now_ms),
            PetState::Idling => self.handle_idling(dist, now_ms),
            PetState::Dragging => self.handle_dragging(),
            PetState::SealMode => self.handle_seal_mode(now_ms),
        }
    }

    fn handle_dragging(&mut self) {
        self.animation = AnimationKey::Drag;
        self.flipped = false;
    }

    fn handle_chasing(&mut self, dx: f64, dy: f64, dist: f64, now_ms: f64) {
        if dist < self.scaled.near_distance {
            self.state = PetState::Wandering;
            self.init_wander(now_ms);
            return;
        }

        self.move_toward(dx, dy, dist, self.move_speed);
        self.animation = AnimationKey::Move;
        self.flipped = dx < 0.0;
    }

    fn handle_wandering(&mut self, dist: f64, now_ms: f64) {
        if dist > self.scaled.far_distance && !self.seal_active {
            self.state = PetState::Chasing;
            return;
        }

        if now_ms > self.wander_end_ms {
            self.state = PetState::Idling;
            self.init_idle(now_ms);
            return;
        }

        self.wander_anchor = if self.seal_active { self.seal } else { self.mouse };

        if now_ms > self.wander_dir_change_ms {
            self.pick_wander_target(now_ms);
        }

        let (wx, wy) = self.position.delta_to(self.wander_target);
        let wdist = wx.hypot(wy);
        if wdist < self.wander_speed {
            self.pick_wander_target(now_ms);
        } else {
            self.move_toward(wx, wy, wdist, self.wander_speed);
        }

        self.animation = AnimationKey::Move;
        self.flipped = wx < 0.0;
    }

    fn handle_idling(&mut self, dist: f64, now_ms: f64) {
        if dist > self.scaled.far_distance && !self.seal_active {
            self.state = PetState::Chasing;
            return;
        }

        if !self.seal_active {
            let wake = self.scaled.mouse_move_threshold * IDLE_WAKE_FACTOR;
            if self.idle_anchor_mouse.distance_to(self.mouse) > wake {
                self.state = PetState::Wandering;
                self.init_wander(now_ms);
                return;
            }
        }

        if !self.seal_active && self.mouse_idle_ms > self.tunables.mouse_idle_t2_ms as f64 {
            self.seal_active = true;
            self.seal_should_appear = true;
            self.state = PetState::SealMode;
            self.seal_wander_dir_ms = 0.0;
            return;
        }

        if now_ms > self.idle_end_ms {
            self.animation = self.pick_idle_animation();
            self.idle_end_ms = now_ms + self.tunables.idle_duration_ms.sample(&mut self.rng);
        }

        self.flipped = false;
    }

    fn handle_seal_mode(&mut self, now_ms: f64) {
        if !self.seal_active {
            self.state = PetState::Chasing;
            return;
        }

        let (sdx, sdy) = self.position.delta_to(self.seal);
        let sdist = sdx.hypot(sdy);

        if sdist > self.scaled.near_distance {
            self.move_toward(sdx, sdy, sdist, self.move_speed);
            self.animation = AnimationKey::Move;
            self.flipped = sdx < 0.0;
            return;
        }

        if now_ms > self.seal_wander_dir_ms {
            let angle = self.rng.random_range(0.0..TAU);
            let radius = self.random_radius(self.scaled.seal_wander_radius);
            self.seal_wander_target = self.seal.polar_offset(angle, radius);
            self.seal_wander_dir_ms =
                now_ms + self.tunables.wander_dir_change_ms.sample(&mut self.rng);
        }

        let (wx, wy) = self.position.delta_to(self.seal_wander_target);
        let wdist = wx.hypot(wy);
        if wdist > self.wander_speed {
            self.move_toward(wx, wy, wdist, self.wander_speed);
        }

        self.animation = AnimationKey::Move;
        self.flipped = wx < 0.0;
    }

    fn move_toward(&mut self, dx: f64, dy: f64, dist: f64, speed: f64) {
        if dist <= speed {
            self.position.x += dx;
            self.position.y += dy;
        } else {
            self.position.x += dx / dist * speed;
            self.position.y += dy / dist * speed;
        }
    }

    fn init_wander(&mut self, now_ms: f64) {
        self.wander_anchor = self.mouse;
        self.wander_end_ms = now_ms + self.tunables.wander_duration_ms.sample(&mut self.rng);
        self.pick_wander_target(now_ms);
    }

    fn pick_wander_target(&mut self, now_ms: f64) {
        let angle = self.rng.random_range(0.0..TAU);
        let radius = self.random_radius(self.scaled.wander_radius);
        self.wander_target = self.wander_anchor.polar_offset(angle, radius);
        self.wander_dir_change_ms =
            now_ms + self.tunables.wander_dir_change_ms.sample(&mut self.rng);
    }

    /// Uniform between the inner radius and `max`, whichever order they
    /// come in on small screens.
    fn random_radius(&mut self, max: f64) -> f64 {
        self.rng
            .random_range(max.min(MIN_WANDER_RADIUS)..=max.max(MIN_WANDER_RADIUS))
    }

    fn init_idle(&mut self, now_ms: f64) {
        self.idle_anchor_mouse = self.mouse;
        self.animation = self.pick_idle_animation();
        self.idle_end_ms = now_ms + self.tunables.idle_duration_ms.sample(&mut self.rng);
        self.flipped = false;
    }

    /// Uniform before `t1`; afterwards the special clip's share grows
    /// linearly until it is the only one left.
    pub(crate) fn pick_idle_animation(&mut self) -> AnimationKey {
        let n = self.idle_count;
        if n == 0 {
            return AnimationKey::Move;
        }

        let t1 = self.tunables.mouse_idle_t1_ms as f64;
        if self.mouse_idle_ms < t1 {
            return AnimationKey::Idle(self.rng.random_range(1..=n));
        }

        let ramp_len = self.tunables.idle2_ramp_ms.max(1) as f64;
        let ramp = ((self.mouse_idle_ms - t1) / ramp_len).min(1.0);

        let base = 1.0 / n as f64;
        let special_prob = base + ramp * (1.0 - base);
        let other_prob = (1.0 - special_prob) / (n.saturating_sub(1).max(1)) as f64;

        let r: f64 = self.rng.random();
        let mut cumulative = 0.0;
        for idx in 1..=n {
            cumulative += if idx == SPECIAL_IDLE {
                special_prob
            } else {
                other_prob
            };
            if r < cumulative {
                return AnimationKey::Idle(idx);
            }
        }

        AnimationKey::Idle(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pet_at(x: f64, y: f64) -> Pet {
        let tunables = Tunables::default();
        let scaled = tunables.unscaled();
        Pet::with_seed(Point::new(x, y), tunables, scaled, 5, 42)
    }

    fn step(pet: &mut Pet, mx: f64, my: f64, pressed: bool, now_ms: f64) {
        pet.begin_tick();
        pet.update_mouse(mx, my, pressed, now_ms);
        pet.tick(now_ms);
    }

    /// Drives a pet resting under a still mouse into the idling state.
    fn idle_pet() -> Pet {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 500.0, 500.0, false, 0.0);
        assert_eq!(pet.state(), PetState::Wandering);
        step(&mut pet, 500.0, 500.0, false, 5000.0);
        assert_eq!(pet.state(), PetState::Idling);
        pet
    }

    #[test]
    fn test_chases_far_cursor_at_move_speed() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 1000.0, 500.0, false, 0.0);

        assert_eq!(pet.state(), PetState::Chasing);
        assert_eq!(pet.position(), Point::new(504.0, 500.0));
        assert_eq!(pet.animation(), AnimationKey::Move);
        assert!(!pet.flipped());
    }

    #[test]
    fn test_chasing_left_is_flipped() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 0.0, 500.0, false, 0.0);
        assert!(pet.flipped());
        assert_eq!(pet.position(), Point::new(496.0, 500.0));
    }

    #[test]
    fn test_move_toward_snaps_when_within_one_step() {
        let mut pet = pet_at(0.0, 0.0);
        pet.move_toward(3.0, 0.0, 3.0, 4.0);
        assert_eq!(pet.position(), Point::new(3.0, 0.0));
        pet.move_toward(30.0, 40.0, 50.0, 5.0);
        assert_eq!(pet.position(), Point::new(6.0, 4.0));
    }

    #[test]
    fn test_close_cursor_starts_wandering() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 540.0, 500.0, false, 0.0);
        assert_eq!(pet.state(), PetState::Wandering);
        // the transition tick does not move
        assert_eq!(pet.position(), Point::new(500.0, 500.0));
    }

    #[test]
    fn test_hysteresis_between_near_and_far() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 500.0, 500.0, false, 0.0);
        assert_eq!(pet.state(), PetState::Wandering);

        // 150px is beyond near but inside far: keep wandering
        step(&mut pet, 650.0, 500.0, false, 33.0);
        assert_eq!(pet.state(), PetState::Wandering);

        step(&mut pet, 900.0, 500.0, false, 66.0);
        assert_eq!(pet.state(), PetState::Chasing);
    }

    #[test]
    fn test_wandering_stays_near_anchor() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 500.0, 500.0, false, 0.0);
        for i in 1..60 {
            step(&mut pet, 500.0, 500.0, false, i as f64 * 33.0);
            assert_eq!(pet.state(), PetState::Wandering);
            assert_eq!(pet.animation(), AnimationKey::Move);
            let d = pet.position().distance_to(Point::new(500.0, 500.0));
            assert!(d <= 80.0 + 1.5, "wandered too far: {d}");
        }
    }

    #[test]
    fn test_wander_timeout_goes_idle() {
        let pet = idle_pet();
        assert!(matches!(pet.animation(), AnimationKey::Idle(1..=5)));
        assert!(!pet.flipped());
    }

    #[test]
    fn test_idle_wakes_on_mouse_travel() {
        let mut pet = idle_pet();
        // 60px > 10 * threshold, still inside far distance
        step(&mut pet, 560.0, 500.0, false, 5033.0);
        assert_eq!(pet.state(), PetState::Wandering);
    }

    #[test]
    fn test_idle_far_cursor_chases() {
        let mut pet = idle_pet();
        step(&mut pet, 1200.0, 500.0, false, 5033.0);
        assert_eq!(pet.state(), PetState::Chasing);
    }

    #[test]
    fn test_idle_clip_rotates_after_deadline() {
        let mut pet = idle_pet();
        let mut seen = std::collections::HashSet::new();
        for i in 0..40 {
            step(&mut pet, 500.0, 500.0, false, 5000.0 + (i as f64) * 7000.0);
            if pet.state() != PetState::Idling {
                break;
            }
            seen.insert(pet.animation());
        }
        assert!(seen.len() > 1);
    }

    #[test]
    fn test_drag_overrides_and_restores_state() {
        let mut pet = pet_at(500.0, 500.0);
        step(&mut pet, 1000.0, 500.0, false, 0.0);
        assert_eq!(pet.state(), PetState::Chasing);

        step(&mut pet, 1000.0, 500.0, true, 33.0);
        assert_eq!(pet.state(), PetState::Dragging);
        assert_eq!(pet.animation(), AnimationKey::Drag);
        let held = pet.position();

        step(&mut pet, 1000.0, 500.0, true, 66.0);
        assert_eq!(pet.position(), held);

        step(&mut pet, 1000.0, 500.0, false, 99.0);
        assert_eq!(pet.state(), PetState::Chasing);
        assert_eq!(pet.animation(), AnimationKey::Move);
    }

    #[test]
    fn test_long_idle_summons_seal_and_movement_dismisses_it() {
        let mut pet = idle_pet();

        step(&mut pet, 500.0, 500.0, false, 130_000.0);
        assert_eq!(pet.state(), PetState::SealMode);
        assert!(pet.seal_should_appear());
        assert!(pet.seal_active());

        pet.set_seal_position(900.0, 500.0);
        step(&mut pet, 500.0, 500.0, false, 130_033.0);
        // one-shot flag was cleared
        assert!(!pet.seal_should_appear());
        assert_eq!(pet.animation(), AnimationKey::Move);
        assert!(pet.position().x > 500.0);
        assert!(!pet.flipped());

        pet.begin_tick();
        pet.update_mouse(600.0, 600.0, false, 130_066.0);
        assert!(pet.seal_should_disappear());
        assert!(!pet.seal_active());
        pet.tick(130_066.0);
        assert_eq!(pet.state(), PetState::Chasing);
    }

    #[test]
    fn test_seal_mode_wanders_near_seal() {
        let mut pet = idle_pet();
        step(&mut pet, 500.0, 500.0, false, 130_000.0);
        pet.set_seal_position(520.0, 500.0);
        for i in 1..100 {
            step(&mut pet, 500.0, 500.0, false, 130_000.0 + i as f64 * 33.0);
            assert_eq!(pet.state(), PetState::SealMode);
            let d = pet.position().distance_to(Point::new(520.0, 500.0));
            assert!(d <= 120.0 + 4.0, "strayed from seal: {d}");
        }
    }

    #[test]
    fn test_small_jitter_does_not_reset_idle_clock() {
        let mut pet = pet_at(500.0, 500.0);
        pet.update_mouse(503.0, 500.0, false, 1000.0);
        assert_eq!(pet.mouse_idle_ms(), 1000.0);
        pet.update_mouse(510.0, 500.0, false, 2000.0);
        assert_eq!(pet.mouse_idle_ms(), 0.0);
    }

    #[test]
    fn test_idle_pick_uniform_before_t1() {
        let mut pet = pet_at(0.0, 0.0);
        pet.update_mouse(0.0, 0.0, false, 1000.0);
        let mut seen = [0usize; 6];
        for _ in 0..1000 {
            match pet.pick_idle_animation() {
                AnimationKey::Idle(i) => seen[i] += 1,
                other => panic!("unexpected {other:?}"),
            }
        }
        assert!(seen[1..].iter().all(|&c| c > 100));
    }

    #[test]
    fn test_idle_pick_fully_ramped_is_special() {
        let mut pet = pet_at(0.0, 0.0);
        pet.update_mouse(0.0, 0.0, false, 95_000.0);
        for _ in 0..500 {
            assert_eq!(pet.pick_idle_animation(), AnimationKey::Idle(SPECIAL_IDLE));
        }
    }

    #[test]
    fn test_idle_pick_half_ramp_favours_special() {
        let mut pet = pet_at(0.0, 0.0);
        pet.update_mouse(0.0, 0.0, false, 60_000.0);
        let special = (0..2000)
            .filter(|_| pet.pick_idle_animation() == AnimationKey::Idle(SPECIAL_IDLE))
            .count();
        // expected share is 0.2 + 0.5 * 0.8 = 0.6
        assert!((1000..1400).contains(&special), "got {special}");
    }

    #[test]
    fn test_idle_pick_without_clips_falls_back_to_move() {
        let tunables = Tunables::default();
        let scaled = tunables.unscaled();
        let mut pet = Pet::with_seed(Point::default(), tunables, scaled, 0, 1);
        assert_eq!(pet.pick_idle_animation(), AnimationKey::Move);
    }

    #[test]
    fn test_set_scaled_resets_speeds() {
        let mut pet = pet_at(0.0, 0.0);
        pet.set_speeds(12.0, 4.8);
        let scaled = Tunables::default().adapt_to_screen(2560);
        pet.set_scaled(scaled);
        assert_eq!(pet.move_speed(), 8.0);
        assert_eq!(pet.wander_speed(), 3.0);
    }

    #[test]
    fn test_small_screen_wander_radius_spans_up_to_inner_radius() {
        let tunables = Tunables::default();
        // 160 / 1280 shrinks the 80px wander radius to 10px
        let scaled = tunables.adapt_to_screen(160);
        assert_eq!(scaled.wander_radius, 10.0);
        let mut pet = Pet::with_seed(Point::new(100.0, 80.0), tunables, scaled, 5, 7);
        pet.update_mouse(100.0, 80.0, false, 0.0);

        let mut longest: f64 = 0.0;
        for i in 0..500 {
            pet.pick_wander_target(i as f64);
            let d = pet.wander_target.distance_to(pet.wander_anchor);
            assert!((10.0 - 1e-9..=20.0 + 1e-9).contains(&d), "radius {d}");
            longest = longest.max(d);
        }
        assert!(longest > 15.0, "radius pinned near 10px: {longest}");
    }

    #[test]
    fn test_clamp_to_screen() {
        let mut pet = pet_at(-100.0, 5000.0);
        pet.clamp_to(&ScreenRect::new(0.0, 0.0, 1920.0, 1080.0), 30.0);
        assert_eq!(pet.position(), Point::new(30.0, 1049.0));
    }
}
