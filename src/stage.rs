//! The headless host environment.
//!
//! A [`Stage`] plays the part a browser plays for the presentation: it owns
//! the virtual clock, the frame loop, the simulated page and the input tape,
//! wires the navigator, ripple emitter and renderer to one event channel,
//! and releases all of it together on teardown.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, trace};

use crate::clock::{CancelToken, Clock, FrameLoop};
use crate::events::{EventChannel, Subscription};
use crate::navigator::{NavKey, SectionNavigator};
use crate::page::{Page, PageHost};
use crate::renderer::{GlyphFieldRenderer, Surface};
use crate::ripple::{RippleEmitter, SharedRipples};
use crate::schema::{Scene, TapeEvent, TapeInput};
use crate::section::{discover_sections, SectionChanged, Side};
use crate::viewport::{self, SharedViewport, Viewport};

/// A change event as observed on the channel, with its publication time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEvent {
    pub at_ms: u64,
    pub id: String,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameInfo {
    pub index: u64,
    pub at_ms: u64,
    pub active_section: Option<String>,
    pub painted: bool,
}

pub struct Stage<S: Surface> {
    clock: Clock,
    viewport: SharedViewport,
    channel: EventChannel<SectionChanged>,
    page: Rc<RefCell<Page>>,
    navigator: SectionNavigator,
    emitter: RippleEmitter,
    renderer: GlyphFieldRenderer<S>,
    token: CancelToken,
    frames: FrameLoop,
    tape: VecDeque<TapeEvent>,
    published: Rc<RefCell<Vec<PublishedEvent>>>,
    recorder: Option<Subscription>,
    torn_down: bool,
}

impl<S: Surface> Stage<S> {
    /// Discovers sections and mounts every component at time zero. The
    /// emitter and renderer subscribe before the navigator's deferred first
    /// publication, so both observe the initial section.
    pub fn mount(scene: &Scene, surface: Option<S>) -> Self {
        let clock = Clock::new();
        let viewport = viewport::shared(scene.viewport);
        let channel = EventChannel::new();

        let published = Rc::new(RefCell::new(Vec::new()));
        let recorder = {
            let sink = Rc::clone(&published);
            let clock = clock.clone();
            channel.subscribe(move |event: &SectionChanged| {
                sink.borrow_mut().push(PublishedEvent {
                    at_ms: clock.now_ms(),
                    id: event.id.clone(),
                    side: event.side,
                });
            })
        };

        let emitter = RippleEmitter::attach(&channel, Rc::clone(&viewport), clock.clone());
        let renderer = GlyphFieldRenderer::mount(
            surface,
            &channel,
            Rc::clone(&viewport),
            clock.clone(),
            emitter.ripples(),
            scene.tint_table(),
            scene.seed,
        );

        let sections = discover_sections(&scene.sections);
        let page = Rc::new(RefCell::new(Page::new(
            sections.iter().map(|section| section.id.clone()).collect(),
            Rc::clone(&viewport),
        )));
        let navigator = SectionNavigator::mount(
            sections,
            channel.clone(),
            Box::new(PageHost::new(Rc::clone(&page), clock.clone())),
            clock.clone(),
        );

        let token = CancelToken::new();
        let frames = FrameLoop::new(scene.fps, token.clone());
        debug!(
            sections = scene.sections.len(),
            fps = scene.fps,
            tape = scene.tape.len(),
            "stage: mounted"
        );

        Self {
            clock,
            viewport,
            channel,
            page,
            navigator,
            emitter,
            renderer,
            token,
            frames,
            tape: scene.tape.iter().cloned().collect(),
            published: Rc::clone(&published),
            recorder: Some(recorder),
            torn_down: false,
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn navigator(&self) -> &SectionNavigator {
        &self.navigator
    }

    pub fn renderer(&self) -> &GlyphFieldRenderer<S> {
        &self.renderer
    }

    pub fn ripples(&self) -> SharedRipples {
        self.emitter.ripples()
    }

    pub fn channel(&self) -> &EventChannel<SectionChanged> {
        &self.channel
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.get()
    }

    pub fn scroll_y(&self) -> f32 {
        self.page.borrow().scroll_y()
    }

    pub fn published(&self) -> Vec<PublishedEvent> {
        self.published.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.frames.is_running()
    }

    /// Time of frame `index` on the stage clock.
    pub fn frame_time_ms(&self, index: u64) -> u64 {
        self.frames.frame_time_ms(index)
    }

    /// Applies one input at the current clock time.
    pub fn apply(&mut self, input: &TapeInput) {
        if self.torn_down {
            return;
        }
        trace!(now_ms = self.clock.now_ms(), ?input, "stage: input");
        match input {
            TapeInput::Wheel { delta_y } => self.navigator.on_wheel(*delta_y),
            TapeInput::TouchStart { y, fingers } => self.navigator.on_touch_start(*y, *fingers),
            TapeInput::TouchMove { y } => self.navigator.on_touch_move(*y),
            TapeInput::TouchEnd | TapeInput::TouchCancel => self.navigator.on_touch_end(),
            TapeInput::Key { key } => {
                if let Some(key) = NavKey::from_key_name(key) {
                    self.navigator.on_key(key);
                }
            }
            TapeInput::Resize { width, height } => {
                let current = self.viewport.get();
                self.viewport.set(Viewport {
                    width: width.max(1.0),
                    height: height.max(1.0),
                    device_pixel_ratio: current.device_pixel_ratio,
                });
                let anchor = self.navigator.active_index();
                self.page.borrow_mut().on_resize(anchor);
                self.renderer.on_resize();
                self.report_visibility();
            }
            TapeInput::Scroll { y } => {
                self.page.borrow_mut().scroll_to_offset(*y);
                self.report_visibility();
            }
            TapeInput::Visibility { ratios } => self
                .navigator
                .on_visibility(ratios.iter().map(|(id, ratio)| (id.as_str(), *ratio))),
            TapeInput::Publish { payload } => match SectionChanged::from_payload(payload) {
                Some(event) => {
                    self.channel.publish(&event);
                }
                None => debug!(%payload, "stage: dropping malformed section payload"),
            },
        }
    }

    /// Runs the stage forward to `target_ms`: timers, tape inputs and frames
    /// are processed in time order, and `on_frame` sees every frame.
    pub fn advance_to<F>(&mut self, target_ms: u64, mut on_frame: F) -> Result<()>
    where
        F: FnMut(&FrameInfo, &GlyphFieldRenderer<S>) -> Result<()>,
    {
        while !self.torn_down {
            let next = [
                self.tape.front().map(|event| event.at_ms),
                self.frames.next_frame_ms(),
                self.navigator.next_deadline_ms(),
            ]
            .into_iter()
            .flatten()
            .filter(|at| *at <= target_ms)
            .min();
            let Some(next) = next else {
                break;
            };

            self.clock.advance_to(next);
            let now = self.clock.now_ms();
            self.navigator.poll_timers();

            while let Some(event) = self.tape.front() {
                if event.at_ms > now {
                    break;
                }
                if let Some(event) = self.tape.pop_front() {
                    self.apply(&event.input);
                }
            }

            if let Some(index) = self.frames.take_due(now) {
                let info = self.run_frame(index);
                on_frame(&info, &self.renderer)?;
            }
        }

        self.clock.advance_to(target_ms);
        Ok(())
    }

    fn run_frame(&mut self, index: u64) -> FrameInfo {
        let now = self.clock.now_ms();
        let moved = self.page.borrow_mut().step(now);
        if moved {
            self.report_visibility();
        }
        self.navigator.on_frame();
        let painted = self.renderer.tick();
        FrameInfo {
            index,
            at_ms: now,
            active_section: self.navigator.active_section().map(|section| section.id.clone()),
            painted,
        }
    }

    fn report_visibility(&mut self) {
        let changes = self.page.borrow_mut().visibility_changes();
        if !changes.is_empty() {
            self.navigator.on_visibility(changes);
        }
    }

    /// Cancels the frame loop, clears pending timers and tape input and
    /// unsubscribes every listener. Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.token.cancel();
        self.navigator.shutdown();
        self.emitter.detach();
        self.renderer.detach();
        if let Some(recorder) = self.recorder.take() {
            self.channel.unsubscribe(recorder);
        }
        self.tape.clear();
        debug!(now_ms = self.clock.now_ms(), "stage: torn down");
    }
}

impl<S: Surface> Drop for Stage<S> {
    fn drop(&mut self) {
        self.teardown();
    }
}
