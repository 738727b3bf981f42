use std::cell::Cell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// Viewport size in CSS pixels plus the device pixel ratio of the display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Backing-store size in physical pixels, never zero.
    pub fn physical_size(&self) -> (u32, u32) {
        let ratio = self.device_pixel_ratio.max(0.1);
        let width = (self.width * ratio).round().max(1.0) as u32;
        let height = (self.height * ratio).round().max(1.0) as u32;
        (width, height)
    }
}

/// Viewport shared by the page, the ripple emitter and the renderer.
pub type SharedViewport = Rc<Cell<Viewport>>;

pub fn shared(viewport: Viewport) -> SharedViewport {
    Rc::new(Cell::new(viewport))
}
