//! Simulated page: full-height sections stacked vertically, a scroll offset
//! with smooth-scroll animation, and visibility ratios derived from it.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::trace;

use crate::clock::Clock;
use crate::navigator::{ScrollHost, VISIBILITY_THRESHOLD};
use crate::section::Section;
use crate::viewport::SharedViewport;

pub const SMOOTH_SCROLL_MS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScrollAnimation {
    target_index: usize,
    from: f32,
    to: f32,
    start_ms: u64,
    duration_ms: u64,
}

impl ScrollAnimation {
    fn position(&self, now_ms: u64) -> f32 {
        if self.duration_ms == 0 {
            return self.to;
        }
        let progress = (now_ms.saturating_sub(self.start_ms) as f32 / self.duration_ms as f32)
            .clamp(0.0, 1.0);
        self.from + (self.to - self.from) * ease_out_cubic(progress)
    }

    fn is_done(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.start_ms) >= self.duration_ms
    }
}

fn ease_out_cubic(t: f32) -> f32 {
    1.0 - (1.0 - t).powi(3)
}

#[derive(Debug, Clone)]
pub struct Page {
    section_ids: Vec<String>,
    viewport: SharedViewport,
    height: f32,
    scroll_y: f32,
    animation: Option<ScrollAnimation>,
    above_threshold: Vec<bool>,
}

impl Page {
    pub fn new(section_ids: Vec<String>, viewport: SharedViewport) -> Self {
        let mut page = Self {
            above_threshold: vec![false; section_ids.len()],
            section_ids,
            height: viewport.get().height,
            viewport,
            scroll_y: 0.0,
            animation: None,
        };
        // The resting state at offset zero is the baseline, not a change.
        page.visibility_changes();
        page
    }

    pub fn scroll_y(&self) -> f32 {
        self.scroll_y
    }

    pub fn is_scrolling(&self) -> bool {
        self.animation.is_some()
    }

    pub fn max_scroll(&self) -> f32 {
        let height = self.viewport.get().height;
        (self.section_ids.len().saturating_sub(1)) as f32 * height
    }

    pub fn start_smooth_scroll(&mut self, index: usize, now_ms: u64) {
        let target = (index as f32 * self.viewport.get().height).clamp(0.0, self.max_scroll());
        self.animation = Some(ScrollAnimation {
            target_index: index,
            from: self.scroll_y,
            to: target,
            start_ms: now_ms,
            duration_ms: SMOOTH_SCROLL_MS,
        });
    }

    /// Immediate scroll, as from a scrollbar drag. Cancels any animation.
    pub fn scroll_to_offset(&mut self, y: f32) {
        self.animation = None;
        self.scroll_y = y.clamp(0.0, self.max_scroll());
    }

    /// Rescales the page to the new viewport height. At rest the offset
    /// snaps to `anchor_index`, so the section in view stays in view; an
    /// in-flight smooth scroll keeps its progress and its target section.
    pub fn on_resize(&mut self, anchor_index: usize) {
        let height = self.viewport.get().height;
        let scale = if self.height > 0.0 { height / self.height } else { 1.0 };
        self.height = height;
        let max_scroll = self.max_scroll();

        match self.animation.as_mut() {
            Some(animation) => {
                animation.from = (animation.from * scale).clamp(0.0, max_scroll);
                animation.to = (animation.target_index as f32 * height).clamp(0.0, max_scroll);
                self.scroll_y = (self.scroll_y * scale).clamp(0.0, max_scroll);
            }
            None => {
                self.scroll_y = (anchor_index as f32 * height).clamp(0.0, max_scroll);
            }
        }
        trace!(height, scroll_y = self.scroll_y, "page: resized");
    }

    /// Advances the smooth scroll. Returns `true` if the offset moved.
    pub fn step(&mut self, now_ms: u64) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };
        let previous = self.scroll_y;
        self.scroll_y = animation.position(now_ms);
        if animation.is_done(now_ms) {
            self.scroll_y = animation.to;
            self.animation = None;
        }
        trace!(scroll_y = self.scroll_y, "page: scroll step");
        (self.scroll_y - previous).abs() > f32::EPSILON
    }

    /// Visible fraction of each section's own height.
    pub fn visibility(&self) -> Vec<(String, f32)> {
        let height = self.viewport.get().height;
        if height <= 0.0 {
            return Vec::new();
        }
        let view_top = self.scroll_y;
        let view_bottom = self.scroll_y + height;
        self.section_ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let top = index as f32 * height;
                let bottom = top + height;
                let overlap = (bottom.min(view_bottom) - top.max(view_top)).max(0.0);
                (id.clone(), overlap / height)
            })
            .collect()
    }

    /// Ratios of the sections that crossed [`VISIBILITY_THRESHOLD`] in either
    /// direction since the previous call. Sections that stay on one side of
    /// it are not reported again. While a smooth scroll is in flight only
    /// its target is reported; sections passed on the way are recorded
    /// silently.
    pub fn visibility_changes(&mut self) -> Vec<(String, f32)> {
        let target = self.animation.map(|animation| animation.target_index);
        let ratios = self.visibility();
        let mut changes = Vec::new();
        for (index, (id, ratio)) in ratios.into_iter().enumerate() {
            let above = ratio >= VISIBILITY_THRESHOLD;
            let Some(previous) = self.above_threshold.get_mut(index) else {
                continue;
            };
            if *previous == above {
                continue;
            }
            *previous = above;
            if target.map_or(true, |target| target == index) {
                changes.push((id, ratio));
            }
        }
        changes
    }
}

/// [`ScrollHost`] backed by the shared page.
pub struct PageHost {
    page: Rc<RefCell<Page>>,
    clock: Clock,
}

impl PageHost {
    pub fn new(page: Rc<RefCell<Page>>, clock: Clock) -> Self {
        Self { page, clock }
    }
}

impl ScrollHost for PageHost {
    fn scroll_into_view(&mut self, section: &Section) {
        self.page
            .borrow_mut()
            .start_smooth_scroll(section.index, self.clock.now_ms());
    }
}
