//! Modifier-key tracking shared by the gesture engine.
//!
//! One physical keyboard exists per process, so modifier state is legitimately
//! shared — but it is an explicitly constructed service with a subscribe
//! lifecycle tied to the gesture engine, not an ambient singleton. The host
//! forwards raw key events; the watcher answers "is alt held right now"
//! per drag tick.

#[cfg(test)]
#[path = "keyboard_test.rs"]
mod keyboard_test;

/// Keyboard modifier keys held during a pointer event.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key is held.
    pub shift: bool,
    /// Ctrl key is held.
    pub ctrl: bool,
    /// Alt / Option key is held.
    pub alt: bool,
    /// Meta / Command key is held.
    pub meta: bool,
}

/// Tracks the alt key's down/up state independent of any single gesture.
///
/// The "does alt-drag highlight a container" decision is evaluated per drag
/// tick, and a stale container highlight must be cleared on key-up even when
/// no gesture is active — so this state outlives individual gestures.
#[derive(Debug, Default)]
pub struct ModifierWatcher {
    alt_down: bool,
    subscribers: usize,
}

impl ModifierWatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer. Key events are ignored while nobody subscribes.
    pub fn subscribe(&mut self) {
        self.subscribers += 1;
    }

    /// Deregister a consumer; the last unsubscribe resets tracked state.
    pub fn unsubscribe(&mut self) {
        self.subscribers = self.subscribers.saturating_sub(1);
        if self.subscribers == 0 {
            self.alt_down = false;
        }
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
    }

    /// Feed a key-down event. Returns true when the alt state changed.
    pub fn on_key_down(&mut self, key: &str) -> bool {
        if self.subscribers == 0 || !is_alt(key) {
            return false;
        }
        let changed = !self.alt_down;
        self.alt_down = true;
        changed
    }

    /// Feed a key-up event. Returns true when the alt state changed.
    pub fn on_key_up(&mut self, key: &str) -> bool {
        if self.subscribers == 0 || !is_alt(key) {
            return false;
        }
        let changed = self.alt_down;
        self.alt_down = false;
        changed
    }

    /// Whether alt is currently held.
    #[must_use]
    pub fn is_alt_down(&self) -> bool {
        self.alt_down
    }
}

fn is_alt(key: &str) -> bool {
    key == "Alt" || key == "Option"
}
