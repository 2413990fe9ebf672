//! Keyboard and mouse state, fed from winit events.
//!
//! Beyond raw pressed/released tracking, keys support edge-trigger queries:
//! a key reports true exactly once per physical press, then again at a
//! throttled repeat interval while it stays held. Mouse buttons are
//! edge-only (no repeat).

use std::collections::{HashMap, HashSet};
use std::time::Instant;

pub use winit::keyboard::KeyCode;

use ember_core::RateGate;

/// Minimum interval between repeat triggers for a held key.
const KEY_REPEAT_INTERVAL_MS: u64 = 16;

/// The mouse buttons the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl From<winit::event::MouseButton> for MouseButton {
    fn from(button: winit::event::MouseButton) -> Self {
        use winit::event::MouseButton as Wb;
        match button {
            Wb::Right => Self::Right,
            Wb::Middle => Self::Middle,
            // Back/Forward/Other collapse onto Left
            _ => Self::Left,
        }
    }
}

/// Current keyboard and mouse state.
///
/// Constructed once at startup, updated only by the platform-event adapter,
/// and read by the control loop.
#[derive(Debug, Default)]
pub struct InputState {
    pressed_keys: HashSet<KeyCode>,
    just_pressed_keys: HashSet<KeyCode>,
    just_released_keys: HashSet<KeyCode>,
    /// Per-key repeat throttles, armed while the key is held
    repeat_gates: HashMap<KeyCode, RateGate>,

    pressed_buttons: HashSet<MouseButton>,
    just_pressed_buttons: HashSet<MouseButton>,
    just_released_buttons: HashSet<MouseButton>,

    mouse_position: (f32, f32),
    mouse_delta: (f32, f32),
    scroll_delta: (f32, f32),
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears per-frame state; call once at the top of every frame.
    pub fn begin_frame(&mut self) {
        self.just_pressed_keys.clear();
        self.just_released_keys.clear();
        self.just_pressed_buttons.clear();
        self.just_released_buttons.clear();
        self.mouse_delta = (0.0, 0.0);
        self.scroll_delta = (0.0, 0.0);
    }

    pub fn on_key_pressed(&mut self, key: KeyCode) {
        if self.pressed_keys.insert(key) {
            self.just_pressed_keys.insert(key);
        }
    }

    pub fn on_key_released(&mut self, key: KeyCode) {
        if self.pressed_keys.remove(&key) {
            self.just_released_keys.insert(key);
        }
        self.repeat_gates.remove(&key);
    }

    pub fn on_mouse_pressed(&mut self, button: MouseButton) {
        if self.pressed_buttons.insert(button) {
            self.just_pressed_buttons.insert(button);
        }
    }

    pub fn on_mouse_released(&mut self, button: MouseButton) {
        if self.pressed_buttons.remove(&button) {
            self.just_released_buttons.insert(button);
        }
    }

    pub fn on_mouse_moved(&mut self, x: f32, y: f32) {
        let old = self.mouse_position;
        self.mouse_position = (x, y);
        self.mouse_delta = (x - old.0, y - old.1);
    }

    pub fn on_scroll(&mut self, delta_x: f32, delta_y: f32) {
        self.scroll_delta = (delta_x, delta_y);
    }

    /// True while the key is held down.
    pub fn is_key_pressed(&self, key: KeyCode) -> bool {
        self.pressed_keys.contains(&key)
    }

    /// True only on the frame the key went up.
    pub fn is_key_just_released(&self, key: KeyCode) -> bool {
        self.just_released_keys.contains(&key)
    }

    /// Edge-triggered key query with throttled repeat.
    ///
    /// Returns true exactly once for a physical press (even if the key was
    /// already released again by the time of the poll), then at most once
    /// per repeat interval while the key stays held. Consumes the pressed
    /// edge, so a second poll in the same frame returns false.
    pub fn key_edge_triggered(&mut self, key: KeyCode) -> bool {
        self.key_edge_triggered_at(key, Instant::now())
    }

    /// [`key_edge_triggered`](Self::key_edge_triggered) with an explicit
    /// clock reading.
    pub fn key_edge_triggered_at(&mut self, key: KeyCode, now: Instant) -> bool {
        if self.just_pressed_keys.remove(&key) {
            // Arm the repeat gate so the held-key path does not double-fire
            // within the interval
            let gate = self
                .repeat_gates
                .entry(key)
                .or_insert_with(|| RateGate::from_millis(KEY_REPEAT_INTERVAL_MS));
            gate.reset();
            gate.try_fire_at(now);
            return true;
        }

        if self.pressed_keys.contains(&key) {
            return self
                .repeat_gates
                .entry(key)
                .or_insert_with(|| RateGate::from_millis(KEY_REPEAT_INTERVAL_MS))
                .try_fire_at(now);
        }

        false
    }

    /// True while the button is held down.
    pub fn is_mouse_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Edge-triggered mouse button query. Mouse buttons do not repeat.
    pub fn is_mouse_just_pressed(&self, button: MouseButton) -> bool {
        self.just_pressed_buttons.contains(&button)
    }

    /// Last reported cursor position in window coordinates.
    pub fn mouse_position(&self) -> (f32, f32) {
        self.mouse_position
    }

    /// Cursor movement since the last `begin_frame`.
    pub fn mouse_delta(&self) -> (f32, f32) {
        self.mouse_delta
    }

    /// Scroll wheel movement since the last `begin_frame`.
    pub fn scroll_delta(&self) -> (f32, f32) {
        self.scroll_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_press_release_between_polls_triggers_once() {
        let mut input = InputState::new();
        let now = Instant::now();

        input.on_key_pressed(KeyCode::KeyK);
        input.on_key_released(KeyCode::KeyK);

        assert!(input.key_edge_triggered_at(KeyCode::KeyK, now));
        assert!(!input.key_edge_triggered_at(KeyCode::KeyK, now));
        assert!(!input.key_edge_triggered_at(
            KeyCode::KeyK,
            now + Duration::from_millis(100)
        ));
    }

    #[test]
    fn test_next_press_cycle_triggers_again() {
        let mut input = InputState::new();
        let now = Instant::now();

        input.on_key_pressed(KeyCode::KeyK);
        input.on_key_released(KeyCode::KeyK);
        assert!(input.key_edge_triggered_at(KeyCode::KeyK, now));

        input.begin_frame();
        input.on_key_pressed(KeyCode::KeyK);
        input.on_key_released(KeyCode::KeyK);
        assert!(input.key_edge_triggered_at(KeyCode::KeyK, now));
    }

    #[test]
    fn test_held_key_repeats_at_interval() {
        let mut input = InputState::new();
        let t0 = Instant::now();

        input.on_key_pressed(KeyCode::Digit1);

        // Press edge fires immediately and arms the throttle
        assert!(input.key_edge_triggered_at(KeyCode::Digit1, t0));
        assert!(!input.key_edge_triggered_at(KeyCode::Digit1, t0 + Duration::from_millis(5)));

        // Still held past the interval: repeat fires
        assert!(input.key_edge_triggered_at(KeyCode::Digit1, t0 + Duration::from_millis(20)));
        assert!(!input.key_edge_triggered_at(KeyCode::Digit1, t0 + Duration::from_millis(25)));
    }

    #[test]
    fn test_release_stops_repeat() {
        let mut input = InputState::new();
        let t0 = Instant::now();

        input.on_key_pressed(KeyCode::Digit1);
        assert!(input.key_edge_triggered_at(KeyCode::Digit1, t0));

        input.on_key_released(KeyCode::Digit1);
        input.begin_frame();
        assert!(!input.key_edge_triggered_at(
            KeyCode::Digit1,
            t0 + Duration::from_millis(100)
        ));
    }

    #[test]
    fn test_mouse_buttons_are_edge_only() {
        let mut input = InputState::new();

        input.on_mouse_pressed(MouseButton::Left);
        assert!(input.is_mouse_just_pressed(MouseButton::Left));

        // Next frame: still held but no longer "just pressed"
        input.begin_frame();
        assert!(!input.is_mouse_just_pressed(MouseButton::Left));
        assert!(input.is_mouse_pressed(MouseButton::Left));
    }

    #[test]
    fn test_mouse_delta_accumulates_from_moves() {
        let mut input = InputState::new();
        input.on_mouse_moved(10.0, 10.0);
        input.on_mouse_moved(15.0, 5.0);
        assert_eq!(input.mouse_delta(), (5.0, -5.0));
        input.begin_frame();
        assert_eq!(input.mouse_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_scroll_delta_cleared_each_frame() {
        let mut input = InputState::new();
        input.on_scroll(0.0, -2.0);
        assert_eq!(input.scroll_delta(), (0.0, -2.0));
        input.begin_frame();
        assert_eq!(input.scroll_delta(), (0.0, 0.0));
    }

    #[test]
    fn test_winit_button_mapping() {
        use winit::event::MouseButton as Wb;
        assert_eq!(MouseButton::from(Wb::Left), MouseButton::Left);
        assert_eq!(MouseButton::from(Wb::Right), MouseButton::Right);
        assert_eq!(MouseButton::from(Wb::Middle), MouseButton::Middle);
        // Extra buttons collapse onto Left rather than being dropped
        assert_eq!(MouseButton::from(Wb::Back), MouseButton::Left);
    }
}
