//! Transient radial disturbances and the bounded FIFO that holds them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use tracing::debug;

use crate::clock::Clock;
use crate::events::{EventChannel, Subscription};
use crate::section::{SectionChanged, Side};
use crate::viewport::SharedViewport;

pub const RIPPLE_CAPACITY: usize = 6;
pub const RIPPLE_DURATION_MS: u64 = 2_600;
pub const RIPPLE_ANGULAR_SPEED: f32 = 6.0;
pub const RIPPLE_STRENGTH: f32 = 1.0;
pub const INITIAL_RIPPLE_STRENGTH: f32 = 0.55;

/// Wave number in radians per CSS pixel.
pub const WAVE_NUMBER: f32 = 0.045;
/// Phase speed multiplier applied to `age * angular_speed`.
pub const PHASE_SPEED: f32 = 1.0;
/// Distance over which the spatial envelope falls to `1/e`.
pub const SPATIAL_FALLOFF_PX: f32 = 420.0;

/// Horizontal origin as a fraction of viewport width, for each icon side.
const ORIGIN_X_LEFT: f32 = 0.18;
const ORIGIN_X_RIGHT: f32 = 0.82;
const ORIGIN_Y: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ripple {
    pub origin: (f32, f32),
    pub start_ms: u64,
    pub duration_ms: u64,
    pub angular_speed: f32,
    pub strength: f32,
}

impl Ripple {
    pub fn new(origin: (f32, f32), start_ms: u64, strength: f32) -> Self {
        Self {
            origin,
            start_ms,
            duration_ms: RIPPLE_DURATION_MS,
            angular_speed: RIPPLE_ANGULAR_SPEED,
            strength,
        }
    }

    pub fn age_secs(&self, now_ms: u64) -> f32 {
        now_ms.saturating_sub(self.start_ms) as f32 / 1000.0
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.start_ms) >= self.duration_ms
    }

    /// Linear envelope from 1 at birth to 0 at `duration`, clamped at 0.
    pub fn temporal_decay(&self, now_ms: u64) -> f32 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        let age = now_ms.saturating_sub(self.start_ms) as f32;
        (1.0 - age / self.duration_ms as f32).max(0.0)
    }

    /// Field contribution at `(x, y)` in CSS pixels.
    pub fn contribution(&self, x: f32, y: f32, now_ms: u64) -> f32 {
        let temporal = self.temporal_decay(now_ms);
        if temporal <= 0.0 {
            return 0.0;
        }
        let dx = x - self.origin.0;
        let dy = y - self.origin.1;
        let distance = (dx * dx + dy * dy).sqrt();
        let age = self.age_secs(now_ms);
        let spatial = (-distance / SPATIAL_FALLOFF_PX).exp();
        (distance * WAVE_NUMBER - age * self.angular_speed * PHASE_SPEED).sin()
            * temporal
            * spatial
            * self.strength
    }
}

/// Bounded FIFO. Pushing into a full set evicts the oldest ripple regardless
/// of how much lifetime it has left.
#[derive(Debug, Clone)]
pub struct RippleSet {
    ripples: VecDeque<Ripple>,
    capacity: usize,
}

impl Default for RippleSet {
    fn default() -> Self {
        Self::with_capacity(RIPPLE_CAPACITY)
    }
}

impl RippleSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ripples: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.ripples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ripples.is_empty()
    }

    pub fn push(&mut self, ripple: Ripple) -> Option<Ripple> {
        let evicted = if self.ripples.len() >= self.capacity {
            self.ripples.pop_front()
        } else {
            None
        };
        self.ripples.push_back(ripple);
        evicted
    }

    /// Drops every ripple whose lifetime is over.
    pub fn prune(&mut self, now_ms: u64) -> usize {
        let before = self.ripples.len();
        self.ripples.retain(|ripple| !ripple.is_expired(now_ms));
        before - self.ripples.len()
    }

    /// Oldest first, so summation adds the newest ripple last.
    pub fn iter(&self) -> impl Iterator<Item = &Ripple> {
        self.ripples.iter()
    }

    pub fn clear(&mut self) {
        self.ripples.clear();
    }
}

pub type SharedRipples = Rc<RefCell<RippleSet>>;

/// Origin for a ripple answering a section whose content sits on `side`:
/// the ripple starts on the opposite (icon) side.
pub fn ripple_origin(side: Side, width: f32, height: f32) -> (f32, f32) {
    let fraction = match side.opposite() {
        Side::Left => ORIGIN_X_LEFT,
        Side::Right => ORIGIN_X_RIGHT,
    };
    (width * fraction, height * ORIGIN_Y)
}

/// Listens for section changes and appends one ripple per change.
pub struct RippleEmitter {
    ripples: SharedRipples,
    channel: EventChannel<SectionChanged>,
    subscription: Option<Subscription>,
}

impl RippleEmitter {
    /// Subscribes and emits the reduced-strength startup ripple at the
    /// viewport centre.
    pub fn attach(
        channel: &EventChannel<SectionChanged>,
        viewport: SharedViewport,
        clock: Clock,
    ) -> Self {
        let ripples: SharedRipples = Rc::new(RefCell::new(RippleSet::default()));

        {
            let size = viewport.get();
            ripples.borrow_mut().push(Ripple::new(
                (size.width * 0.5, size.height * ORIGIN_Y),
                clock.now_ms(),
                INITIAL_RIPPLE_STRENGTH,
            ));
        }

        let sink = Rc::clone(&ripples);
        let subscription = channel.subscribe(move |event: &SectionChanged| {
            let size = viewport.get();
            let origin = ripple_origin(event.side, size.width, size.height);
            let ripple = Ripple::new(origin, clock.now_ms(), RIPPLE_STRENGTH);
            let evicted = sink.borrow_mut().push(ripple);
            debug!(
                id = %event.id,
                x = origin.0,
                y = origin.1,
                evicted = evicted.is_some(),
                "ripple: emitted"
            );
        });

        Self {
            ripples,
            channel: channel.clone(),
            subscription: Some(subscription),
        }
    }

    /// Shared handle for readers such as the renderer.
    pub fn ripples(&self) -> SharedRipples {
        Rc::clone(&self.ripples)
    }

    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.channel.unsubscribe(subscription);
        }
    }
}
