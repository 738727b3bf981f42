//! Per-cell field maths: periodic noise, star twinkle, squashing and the
//! mapping from a normalized value to a glyph and colour.

use std::collections::HashMap;
use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::ripple::RippleSet;

/// Grid cell edge in CSS pixels.
pub const CELL_SIZE: f32 = 14.0;

/// Field ramp, faint to dense.
pub const FIELD_RAMP: [char; 12] = [' ', '.', ',', ':', ';', '-', '=', '+', '*', '#', '%', '@'];
/// Star ramp, shorter and never blank.
pub const STAR_RAMP: [char; 4] = ['.', '+', '*', '#'];
/// Stars never render below this ramp index.
pub const STAR_FLOOR_INDEX: usize = 1;

const FIELD_ALPHA_FLOOR: f32 = 0.06;
const FIELD_ALPHA_SCALE: f32 = 0.54;
const STAR_ALPHA_FLOOR: f32 = 0.35;
const STAR_ALPHA_SCALE: f32 = 0.65;

const TWINKLE_AMPLITUDE: f32 = 0.9;
const SQUASH_GAIN: f32 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Tint {
    pub const DEFAULT: Tint = Tint {
        r: 122,
        g: 168,
        b: 255,
    };

    pub fn rgb(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Base tint per section id with a fallback for unknown sections.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TintTable {
    by_section: HashMap<String, Tint>,
    fallback: Tint,
}

impl TintTable {
    pub fn new(by_section: HashMap<String, Tint>, fallback: Tint) -> Self {
        Self {
            by_section,
            fallback,
        }
    }

    pub fn resolve(&self, section_id: Option<&str>) -> Tint {
        section_id
            .and_then(|id| self.by_section.get(id))
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// Weighted sum of sinusoids over normalized position and time, plus a
/// low-amplitude term over raw row/col that breaks up axis-aligned banding.
#[inline]
pub fn base_field(nx: f32, ny: f32, row: usize, col: usize, t: f32) -> f32 {
    let primary = 0.50 * (nx * 6.0 + t * 0.60).sin()
        + 0.35 * (ny * 8.0 - t * 0.45 + 1.3).sin()
        + 0.25 * ((nx + ny) * 10.0 + t * 0.80 + 2.1).sin();
    let secondary =
        0.08 * (col as f32 * 0.37 + t * 1.7).sin() * (row as f32 * 0.53 - t * 1.3).cos();
    primary + secondary
}

#[inline]
pub fn twinkle(nx: f32, ny: f32, t: f32) -> f32 {
    let shimmer = 0.6 + 0.4 * (t * 1.1 + nx * 13.0).cos();
    TWINKLE_AMPLITUDE * (t * 3.2 + nx * 57.0 + ny * 91.0).sin() * shimmer
}

/// Sum of all live ripple contributions at `(x, y)`, oldest first.
#[inline]
pub fn ripple_sum(ripples: &RippleSet, x: f32, y: f32, now_ms: u64) -> f32 {
    ripples
        .iter()
        .map(|ripple| ripple.contribution(x, y, now_ms))
        .sum()
}

/// Monotone sinusoidal squash into `[0, 1]`.
#[inline]
pub fn squash(value: f32) -> f32 {
    0.5 + 0.5 * (value * SQUASH_GAIN).clamp(-FRAC_PI_2, FRAC_PI_2).sin()
}

pub fn glyph_index(normalized: f32, star: bool) -> usize {
    let normalized = normalized.clamp(0.0, 1.0);
    if star {
        let last = STAR_RAMP.len() - 1;
        ((normalized * last as f32).round() as usize).clamp(STAR_FLOOR_INDEX, last)
    } else {
        let last = FIELD_RAMP.len() - 1;
        ((normalized * last as f32).round() as usize).min(last)
    }
}

pub fn glyph_for(normalized: f32, star: bool) -> char {
    let index = glyph_index(normalized, star);
    if star {
        STAR_RAMP[index]
    } else {
        FIELD_RAMP[index]
    }
}

pub fn alpha_for(normalized: f32, star: bool) -> f32 {
    let normalized = normalized.clamp(0.0, 1.0);
    let alpha = if star {
        STAR_ALPHA_FLOOR + STAR_ALPHA_SCALE * normalized
    } else {
        FIELD_ALPHA_FLOOR + FIELD_ALPHA_SCALE * normalized
    };
    alpha.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlyphCell {
    pub glyph: char,
    pub color: [u8; 3],
    pub alpha: f32,
    pub star: bool,
}

impl Default for GlyphCell {
    fn default() -> Self {
        Self {
            glyph: ' ',
            color: Tint::DEFAULT.rgb(),
            alpha: 0.0,
            star: false,
        }
    }
}

/// Inputs shared by every cell of one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameParams<'a> {
    pub width: f32,
    pub height: f32,
    pub t: f32,
    pub now_ms: u64,
    pub tint: Tint,
    pub ripples: &'a RippleSet,
}

/// Composites one cell.
#[inline]
pub fn composite_cell(params: &FrameParams<'_>, row: usize, col: usize, star: bool) -> GlyphCell {
    let x = (col as f32 + 0.5) * CELL_SIZE;
    let y = (row as f32 + 0.5) * CELL_SIZE;
    let nx = (x / params.width.max(1.0) - 0.5).clamp(-0.5, 0.5);
    let ny = (y / params.height.max(1.0) - 0.5).clamp(-0.5, 0.5);

    let mut value = base_field(nx, ny, row, col, params.t);
    if star {
        value += twinkle(nx, ny, params.t);
    }
    value += ripple_sum(params.ripples, x, y, params.now_ms);

    let normalized = squash(value);
    GlyphCell {
        glyph: glyph_for(normalized, star),
        color: params.tint.rgb(),
        alpha: alpha_for(normalized, star),
        star,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        alpha_for, composite_cell, glyph_for, glyph_index, squash, FrameParams, Tint, TintTable,
        FIELD_RAMP, STAR_FLOOR_INDEX, STAR_RAMP,
    };
    use crate::ripple::{Ripple, RippleSet};

    #[test]
    fn squash_stays_in_unit_range() {
        for value in [-100.0, -2.0, -0.3, 0.0, 0.7, 3.0, 250.0] {
            let n = squash(value);
            assert!((0.0..=1.0).contains(&n), "{value} -> {n}");
        }
        assert!(squash(0.2) > squash(0.1));
        assert!((squash(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn stars_never_render_blank() {
        assert_eq!(glyph_index(0.0, true), STAR_FLOOR_INDEX);
        assert_ne!(glyph_for(0.0, true), ' ');
        assert_eq!(glyph_for(1.0, true), STAR_RAMP[STAR_RAMP.len() - 1]);
    }

    #[test]
    fn field_ramp_spans_blank_to_dense() {
        assert_eq!(glyph_for(0.0, false), ' ');
        assert_eq!(glyph_for(1.0, false), FIELD_RAMP[FIELD_RAMP.len() - 1]);
    }

    #[test]
    fn stars_have_higher_alpha_floor() {
        assert!(alpha_for(0.0, true) > alpha_for(0.0, false));
        assert!(alpha_for(1.0, true) <= 1.0);
    }

    #[test]
    fn unknown_section_falls_back_to_default_tint() {
        let accent = Tint { r: 255, g: 80, b: 40 };
        let table = TintTable::new(HashMap::from([("hero".to_owned(), accent)]), Tint::DEFAULT);
        assert_eq!(table.resolve(Some("hero")), accent);
        assert_eq!(table.resolve(Some("missing")), Tint::DEFAULT);
        assert_eq!(table.resolve(None), Tint::DEFAULT);
    }

    fn params(ripples: &RippleSet, now_ms: u64) -> FrameParams<'_> {
        FrameParams {
            width: 280.0,
            height: 140.0,
            t: 0.3,
            now_ms,
            tint: Tint::DEFAULT,
            ripples,
        }
    }

    #[test]
    fn ripple_changes_nearby_cells_until_it_expires() {
        let mut ripples = RippleSet::default();
        let quiet = RippleSet::default();
        ripples.push(Ripple::new((21.0, 21.0), 0, 1.0));

        let with = composite_cell(&params(&ripples, 300), 1, 1, false);
        let without = composite_cell(&params(&quiet, 300), 1, 1, false);
        assert_ne!(with.alpha, without.alpha);

        let expired = composite_cell(&params(&ripples, 10_000), 1, 1, false);
        let baseline = composite_cell(&params(&quiet, 10_000), 1, 1, false);
        assert_eq!(expired, baseline);
    }
}
