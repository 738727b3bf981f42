//! Sparse star overlay over the glyph grid.
//!
//! Stars are independent random draws over the cell indices. Two draws may
//! land on the same cell, so the distinct-star count can be lower than the
//! sample count. That is accepted and deliberately not deduplicated.

use tracing::debug;

/// Fraction of cells sampled as stars.
pub const STAR_DENSITY: f32 = 0.012;
/// Sample count floor for very small grids.
pub const MIN_STARS: usize = 24;

/// Tiny deterministic PRNG (xorshift64*).
#[derive(Debug, Clone, Copy)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// `seed = 0` is remapped to a non-zero internal state.
    pub const fn from_seed(seed: u64) -> Self {
        let mixed = seed ^ 0x9E37_79B9_7F4A_7C15;
        let state = if mixed == 0 {
            0xA076_1D64_78BD_642F
        } else {
            mixed
        };
        Self { state }
    }

    #[inline(always)]
    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    /// Uniform value in `[0, bound)` using rejection sampling.
    #[inline(always)]
    pub fn next_below(&mut self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        let bound = bound as u64;
        let zone = u64::MAX - (u64::MAX % bound);
        loop {
            let sample = self.next_u64();
            if sample < zone {
                return (sample % bound) as usize;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarMask {
    cols: usize,
    rows: usize,
    cells: Vec<bool>,
    samples: usize,
}

impl StarMask {
    pub fn empty() -> Self {
        Self {
            cols: 0,
            rows: 0,
            cells: Vec::new(),
            samples: 0,
        }
    }

    /// Number of draws for a grid of `total_cells`.
    pub fn sample_count(total_cells: usize) -> usize {
        ((total_cells as f32 * STAR_DENSITY) as usize).max(MIN_STARS)
    }

    pub fn generate(cols: usize, rows: usize, rng: &mut XorShift64) -> Self {
        let total = cols * rows;
        let mut cells = vec![false; total];
        let samples = Self::sample_count(total);
        if total > 0 {
            for _ in 0..samples {
                cells[rng.next_below(total)] = true;
            }
        }
        let mask = Self {
            cols,
            rows,
            cells,
            samples,
        };
        debug!(
            cols,
            rows,
            samples,
            distinct = mask.star_count(),
            "star mask: regenerated"
        );
        mask
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Draws taken when the mask was built, collisions included.
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Distinct star cells.
    pub fn star_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }

    #[inline]
    pub fn is_star(&self, row: usize, col: usize) -> bool {
        if col >= self.cols {
            return false;
        }
        self.cells
            .get(row * self.cols + col)
            .copied()
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{StarMask, XorShift64, MIN_STARS};

    #[test]
    fn mask_matches_grid_size() {
        let mut rng = XorShift64::from_seed(7);
        let mask = StarMask::generate(120, 40, &mut rng);
        assert_eq!(mask.len(), 120 * 40);
        assert!(mask.star_count() <= mask.samples());
        assert!(mask.star_count() > 0);
    }

    #[test]
    fn tiny_grid_still_draws_minimum_samples() {
        let mut rng = XorShift64::from_seed(3);
        let mask = StarMask::generate(2, 2, &mut rng);
        assert_eq!(mask.len(), 4);
        assert_eq!(mask.samples(), MIN_STARS);
        assert!(mask.star_count() <= 4);
    }

    #[test]
    fn same_seed_same_mask() {
        let a = StarMask::generate(64, 32, &mut XorShift64::from_seed(11));
        let b = StarMask::generate(64, 32, &mut XorShift64::from_seed(11));
        assert_eq!(a, b);
    }

    #[test]
    fn bounded_draws_stay_in_range() {
        let mut rng = XorShift64::from_seed(0);
        for _ in 0..1_000 {
            assert!(rng.next_below(17) < 17);
        }
        assert_eq!(rng.next_below(0), 0);
    }

    #[test]
    fn out_of_range_lookup_is_false() {
        let mask = StarMask::generate(4, 4, &mut XorShift64::from_seed(5));
        assert!(!mask.is_star(10, 0));
        assert!(!mask.is_star(0, 10));
    }
}
