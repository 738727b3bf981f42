use crate::renderer::GlyphGrid;

/// Fixed-size text rendition of one glyph grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsciiFrame {
    width: usize,
    height: usize,
    lines: Vec<String>,
}

impl AsciiFrame {
    pub fn blank(width: usize, height: usize) -> Self {
        let line = " ".repeat(width);
        Self {
            width,
            height,
            lines: vec![line; height],
        }
    }

    pub fn from_grid(grid: &GlyphGrid) -> Self {
        let lines = (0..grid.rows())
            .map(|row| grid.row(row).iter().map(|cell| cell.glyph).collect::<String>())
            .collect::<Vec<_>>();
        Self {
            width: grid.cols(),
            height: grid.rows(),
            lines,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn to_text(&self) -> String {
        if self.lines.is_empty() {
            return String::new();
        }
        let mut value = self.lines.join("\n");
        value.push('\n');
        value
    }

    /// FNV-1a over the text, stable across platforms.
    pub fn content_hash(&self) -> u64 {
        fnv1a64(self.to_text().as_bytes())
    }
}

pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf2_9ce4_8422_2325_u64;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0001_0000_01b3);
    }
    hash
}
