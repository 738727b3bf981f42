//! Scroll-snap navigation state machine.
//!
//! Converts wheel deltas, touch drags, key presses and visibility ratios into
//! discrete section transitions. Gesture-driven transitions go through
//! [`SectionNavigator::scroll_to`], which locks out further gestures for a
//! fixed duration; visibility-driven activation is never gated by the lock.

use tracing::{debug, trace};

use crate::clock::{Clock, OneShot};
use crate::events::EventChannel;
use crate::section::{Section, SectionChanged};

/// Minimum visible ratio for a section to become active from visibility.
pub const VISIBILITY_THRESHOLD: f32 = 0.55;
/// Accumulated wheel delta needed to step one section.
pub const WHEEL_TRIGGER: f32 = 80.0;
/// Inactivity window after which the wheel accumulator drops back to zero.
pub const WHEEL_RESET_MS: u64 = 180;
/// Vertical drag distance needed to step one section.
pub const TOUCH_TRIGGER: f32 = 70.0;
/// Hard upper bound on how long a programmatic scroll holds the lock.
pub const LOCK_DURATION_MS: u64 = 900;

/// The environment's ability to bring a section into view.
pub trait ScrollHost {
    fn scroll_into_view(&mut self, section: &Section);
}

/// Keys the navigator reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Next,
    Previous,
    First,
    Last,
}

impl NavKey {
    /// Maps DOM-style key names. Unknown keys map to `None`.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "ArrowDown" | "PageDown" | "Space" | " " => Some(NavKey::Next),
            "ArrowUp" | "PageUp" => Some(NavKey::Previous),
            "Home" => Some(NavKey::First),
            "End" => Some(NavKey::Last),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavigatorState {
    pub active_index: usize,
    pub locked: bool,
    pub wheel_accumulator: f32,
    pub pending_touch_origin: Option<f32>,
}

pub struct SectionNavigator {
    sections: Vec<Section>,
    state: NavigatorState,
    channel: EventChannel<SectionChanged>,
    host: Box<dyn ScrollHost>,
    clock: Clock,
    wheel_reset: OneShot,
    unlock: OneShot,
    initial_pending: bool,
    published: usize,
    shut_down: bool,
}

impl SectionNavigator {
    /// Mounts over the discovered sections. With no sections the navigator is
    /// inert: it never observes input and never publishes.
    pub fn mount(
        sections: Vec<Section>,
        channel: EventChannel<SectionChanged>,
        host: Box<dyn ScrollHost>,
        clock: Clock,
    ) -> Self {
        let initial_pending = !sections.is_empty();
        if sections.is_empty() {
            debug!("navigator: no sections discovered, staying idle");
        }
        Self {
            sections,
            state: NavigatorState::default(),
            channel,
            host,
            clock,
            wheel_reset: OneShot::default(),
            unlock: OneShot::default(),
            initial_pending,
            published: 0,
            shut_down: false,
        }
    }

    pub fn is_observing(&self) -> bool {
        !self.shut_down && !self.sections.is_empty()
    }

    /// Stops observing input and clears every pending timer. The active
    /// section is kept for inspection.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.initial_pending = false;
        self.wheel_reset.cancel();
        self.unlock.cancel();
        self.state.wheel_accumulator = 0.0;
        self.state.pending_touch_origin = None;
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn state(&self) -> &NavigatorState {
        &self.state
    }

    pub fn active_index(&self) -> usize {
        self.state.active_index
    }

    pub fn active_section(&self) -> Option<&Section> {
        self.sections.get(self.state.active_index)
    }

    pub fn is_locked(&self) -> bool {
        self.state.locked
    }

    pub fn wheel_accumulator(&self) -> f32 {
        self.state.wheel_accumulator
    }

    pub fn pending_touch_origin(&self) -> Option<f32> {
        self.state.pending_touch_origin
    }

    /// Number of change events this navigator has published.
    pub fn published_count(&self) -> usize {
        self.published
    }

    /// Earliest pending timer deadline, for hosts that sleep between events.
    pub fn next_deadline_ms(&self) -> Option<u64> {
        match (self.wheel_reset.deadline_ms(), self.unlock.deadline_ms()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fires the wheel debounce and the unlock timer if they are due.
    pub fn poll_timers(&mut self) {
        let now = self.clock.now_ms();
        if self.wheel_reset.fire_if_due(now) {
            trace!(
                accumulated = self.state.wheel_accumulator,
                "navigator: wheel idle, accumulator reset"
            );
            self.state.wheel_accumulator = 0.0;
        }
        if self.unlock.fire_if_due(now) {
            debug!(now_ms = now, "navigator: scroll lock released");
            self.state.locked = false;
        }
    }

    /// Runs the deferred first activation on the first frame after mount.
    pub fn on_frame(&mut self) {
        if !self.is_observing() {
            return;
        }
        self.poll_timers();
        if self.initial_pending {
            self.initial_pending = false;
            self.activate(0, true);
        }
    }

    /// Reports visibility ratios keyed by section id. The most visible
    /// section above [`VISIBILITY_THRESHOLD`] becomes active immediately.
    pub fn on_visibility<I, S>(&mut self, ratios: I)
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        if !self.is_observing() {
            return;
        }
        self.poll_timers();

        let mut best: Option<(usize, f32)> = None;
        for (id, ratio) in ratios {
            if !ratio.is_finite() || ratio < VISIBILITY_THRESHOLD {
                continue;
            }
            let Some(section) = self.sections.iter().find(|s| s.id == id.as_ref()) else {
                continue;
            };
            if best.map_or(true, |(_, top)| ratio > top) {
                best = Some((section.index, ratio));
            }
        }

        if let Some((index, _)) = best {
            self.activate(index, false);
        }
    }

    /// Non-finite deltas are dropped before they reach the accumulator.
    pub fn on_wheel(&mut self, delta_y: f32) {
        if !self.is_observing() || !delta_y.is_finite() {
            return;
        }
        self.poll_timers();
        if self.state.locked {
            trace!(delta_y, "navigator: wheel suppressed while locked");
            return;
        }

        self.state.wheel_accumulator += delta_y;
        self.wheel_reset.arm(self.clock.now_ms(), WHEEL_RESET_MS);

        let accumulated = self.state.wheel_accumulator;
        if accumulated.abs() < WHEEL_TRIGGER {
            return;
        }

        self.state.wheel_accumulator = 0.0;
        self.wheel_reset.cancel();
        if let Some(target) = self.step_target(direction_of(accumulated)) {
            self.scroll_to(target);
        }
    }

    /// Only single-finger touches start a drag.
    pub fn on_touch_start(&mut self, y: f32, fingers: u32) {
        if !self.is_observing() {
            return;
        }
        self.state.pending_touch_origin = (fingers == 1 && y.is_finite()).then_some(y);
    }

    pub fn on_touch_move(&mut self, y: f32) {
        if !self.is_observing() || !y.is_finite() {
            return;
        }
        self.poll_timers();
        if self.state.locked {
            return;
        }
        let Some(origin) = self.state.pending_touch_origin else {
            return;
        };

        // Finger travelling up the screen means forward.
        let displacement = origin - y;
        if displacement.abs() < TOUCH_TRIGGER {
            return;
        }

        self.state.pending_touch_origin = None;
        if let Some(target) = self.step_target(direction_of(displacement)) {
            self.scroll_to(target);
        }
    }

    /// Touch end and touch cancel both land here.
    pub fn on_touch_end(&mut self) {
        self.state.pending_touch_origin = None;
    }

    pub fn on_key(&mut self, key: NavKey) {
        if !self.is_observing() {
            return;
        }
        self.poll_timers();
        if self.state.locked {
            return;
        }

        let target = match key {
            NavKey::Next => self.step_target(1),
            NavKey::Previous => self.step_target(-1),
            NavKey::First => Some(0),
            NavKey::Last => Some(self.sections.len() - 1),
        };
        if let Some(target) = target {
            self.scroll_to(target);
        }
    }

    /// Programmatic jump. Out-of-range targets and requests made while a
    /// previous jump still holds the lock are ignored.
    pub fn scroll_to(&mut self, index: usize) -> bool {
        if !self.is_observing() {
            return false;
        }
        self.poll_timers();
        let Some(section) = self.sections.get(index) else {
            return false;
        };
        if self.state.locked {
            trace!(index, "navigator: scroll_to rejected while locked");
            return false;
        }

        self.state.wheel_accumulator = 0.0;
        self.wheel_reset.cancel();
        self.state.locked = true;
        self.host.scroll_into_view(section);
        self.unlock.arm(self.clock.now_ms(), LOCK_DURATION_MS);
        debug!(
            index,
            id = %section.id,
            now_ms = self.clock.now_ms(),
            "navigator: scrolling to section, lock engaged"
        );

        self.activate(index, false);
        true
    }

    fn step_target(&self, direction: i32) -> Option<usize> {
        let target = self.state.active_index as i64 + i64::from(direction);
        if target < 0 || target >= self.sections.len() as i64 {
            return None;
        }
        Some(target as usize)
    }

    fn activate(&mut self, index: usize, initial: bool) {
        if !initial {
            // An earlier activation supersedes the deferred initial one.
            if self.initial_pending {
                self.initial_pending = false;
            } else if index == self.state.active_index {
                return;
            }
        }

        let Some(section) = self.sections.get(index) else {
            return;
        };
        self.state.active_index = index;
        let event = SectionChanged::for_section(section);
        debug!(index, id = %event.id, side = event.side.as_str(), "navigator: active section changed");
        self.published += 1;
        self.channel.publish(&event);
    }
}

fn direction_of(value: f32) -> i32 {
    if value < 0.0 {
        -1
    } else {
        1
    }
}
