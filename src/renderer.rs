//! The glyph-field renderer: grid sizing, star mask upkeep and the per-frame
//! composite of noise, stars and ripples onto a [`Surface`].

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::clock::Clock;
use crate::events::{EventChannel, Subscription};
use crate::field::{composite_cell, FrameParams, GlyphCell, TintTable, CELL_SIZE};
use crate::ripple::SharedRipples;
use crate::section::SectionChanged;
use crate::star_mask::{StarMask, XorShift64};
use crate::viewport::{SharedViewport, Viewport};

/// Drawing target for composited frames.
pub trait Surface {
    /// Called once on mount and again after every viewport resize.
    fn resize(&mut self, viewport: Viewport, cols: usize, rows: usize);
    fn paint(&mut self, grid: &GlyphGrid);
}

/// Row-major frame buffer, reused between frames and fully rewritten each
/// frame.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphGrid {
    cols: usize,
    rows: usize,
    cells: Vec<GlyphCell>,
}

impl GlyphGrid {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            rows,
            cells: vec![GlyphCell::default(); cols * rows],
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cells(&self) -> &[GlyphCell] {
        &self.cells
    }

    pub fn row(&self, row: usize) -> &[GlyphCell] {
        let start = row * self.cols;
        &self.cells[start..start + self.cols]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&GlyphCell> {
        if col >= self.cols {
            return None;
        }
        self.cells.get(row * self.cols + col)
    }

    pub fn set(&mut self, row: usize, col: usize, cell: GlyphCell) {
        if col < self.cols && row < self.rows {
            self.cells[row * self.cols + col] = cell;
        }
    }

    fn reshape(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        self.cells.clear();
        self.cells.resize(cols * rows, GlyphCell::default());
    }
}

/// Columns and rows covering the viewport, rounding partial cells up.
pub fn grid_dimensions(viewport: Viewport) -> (usize, usize) {
    let cols = (viewport.width.max(0.0) / CELL_SIZE).ceil() as usize;
    let rows = (viewport.height.max(0.0) / CELL_SIZE).ceil() as usize;
    (cols.max(1), rows.max(1))
}

pub struct GlyphFieldRenderer<S: Surface> {
    surface: Option<S>,
    viewport: SharedViewport,
    clock: Clock,
    start_ms: u64,
    ripples: SharedRipples,
    tints: TintTable,
    active_section: Rc<RefCell<Option<String>>>,
    channel: EventChannel<SectionChanged>,
    subscription: Option<Subscription>,
    rng: XorShift64,
    stars: StarMask,
    grid: GlyphGrid,
    frames_painted: u64,
}

impl<S: Surface> GlyphFieldRenderer<S> {
    /// Without a surface the renderer is inert: it never subscribes and
    /// never paints.
    pub fn mount(
        surface: Option<S>,
        channel: &EventChannel<SectionChanged>,
        viewport: SharedViewport,
        clock: Clock,
        ripples: SharedRipples,
        tints: TintTable,
        seed: u64,
    ) -> Self {
        let active_section = Rc::new(RefCell::new(None));
        let subscription = surface.as_ref().map(|_| {
            let sink = Rc::clone(&active_section);
            channel.subscribe(move |event: &SectionChanged| {
                *sink.borrow_mut() = Some(event.id.clone());
            })
        });
        if surface.is_none() {
            debug!("renderer: drawing surface unavailable, staying idle");
        }

        let start_ms = clock.now_ms();
        let mut renderer = Self {
            surface,
            viewport,
            clock,
            start_ms,
            ripples,
            tints,
            active_section,
            channel: channel.clone(),
            subscription,
            rng: XorShift64::from_seed(seed),
            stars: StarMask::empty(),
            grid: GlyphGrid::new(0, 0),
            frames_painted: 0,
        };
        renderer.on_resize();
        renderer
    }

    pub fn is_active(&self) -> bool {
        self.surface.is_some()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn grid(&self) -> &GlyphGrid {
        &self.grid
    }

    pub fn star_mask(&self) -> &StarMask {
        &self.stars
    }

    pub fn frames_painted(&self) -> u64 {
        self.frames_painted
    }

    pub fn active_section(&self) -> Option<String> {
        self.active_section.borrow().clone()
    }

    /// Re-reads the viewport; on a dimension change the grid is reshaped and
    /// the star mask regenerated. The frame loop is unaffected.
    pub fn on_resize(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let viewport = self.viewport.get();
        let (cols, rows) = grid_dimensions(viewport);
        surface.resize(viewport, cols, rows);
        if cols == self.grid.cols() && rows == self.grid.rows() && !self.stars.is_empty() {
            return;
        }

        self.grid.reshape(cols, rows);
        self.stars = StarMask::generate(cols, rows, &mut self.rng);
        debug!(
            width = viewport.width,
            height = viewport.height,
            cols,
            rows,
            "renderer: grid resized"
        );
    }

    /// One animation tick. Returns `false` when nothing was painted.
    pub fn tick(&mut self) -> bool {
        if self.surface.is_none() {
            return false;
        }

        let now_ms = self.clock.now_ms();
        let viewport = self.viewport.get();
        let tint = self
            .tints
            .resolve(self.active_section.borrow().as_deref());

        {
            let mut ripples = self.ripples.borrow_mut();
            let expired = ripples.prune(now_ms);
            if expired > 0 {
                trace!(expired, remaining = ripples.len(), "renderer: ripples expired");
            }
        }

        let ripples = self.ripples.borrow();
        let params = FrameParams {
            width: viewport.width,
            height: viewport.height,
            t: now_ms.saturating_sub(self.start_ms) as f32 / 1000.0,
            now_ms,
            tint,
            ripples: &ripples,
        };

        let cols = self.grid.cols;
        for row in 0..self.grid.rows {
            for col in 0..cols {
                let star = self.stars.is_star(row, col);
                self.grid.cells[row * cols + col] = composite_cell(&params, row, col, star);
            }
        }
        drop(ripples);

        if let Some(surface) = self.surface.as_mut() {
            surface.paint(&self.grid);
        }
        self.frames_painted += 1;
        trace!(now_ms, frame = self.frames_painted, "renderer: frame painted");
        true
    }

    pub fn detach(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.channel.unsubscribe(subscription);
        }
    }
}
