use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::field::{Tint, TintTable};
use crate::section::SectionDescriptor;
use crate::viewport::Viewport;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scene {
    pub viewport: Viewport,
    #[serde(default = "default_fps")]
    pub fps: u32,
    pub duration: Duration,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub font: Option<PathBuf>,
    #[serde(default)]
    pub font_sha256: Option<String>,
    #[serde(default)]
    pub default_tint: Tint,
    #[serde(default)]
    pub sections: Vec<SectionDescriptor>,
    #[serde(default)]
    pub tints: HashMap<String, Tint>,
    #[serde(default)]
    pub tape: Vec<TapeEvent>,
}

fn default_fps() -> u32 {
    60
}

impl Scene {
    pub fn validate(&self) -> Result<()> {
        if !(self.viewport.width > 0.0 && self.viewport.height > 0.0) {
            bail!(
                "viewport must be positive, got {}x{}",
                self.viewport.width,
                self.viewport.height
            );
        }
        if !(self.viewport.device_pixel_ratio > 0.0) {
            bail!("viewport.device_pixel_ratio must be > 0");
        }
        if self.fps == 0 {
            bail!("fps must be > 0");
        }

        match self.duration {
            Duration::Seconds(seconds) => {
                if !(seconds > 0.0) {
                    bail!("duration in seconds must be > 0");
                }
            }
            Duration::Frames { frames } => {
                if frames == 0 {
                    bail!("duration frames must be > 0");
                }
            }
        }

        Ok(())
    }

    pub fn total_frames(&self) -> u32 {
        match self.duration {
            Duration::Seconds(seconds) => {
                let frames = (seconds * self.fps as f32).ceil();
                frames.max(1.0) as u32
            }
            Duration::Frames { frames } => frames.max(1),
        }
    }

    /// Scene length in milliseconds, rounded up to whole frames.
    pub fn duration_ms(&self) -> u64 {
        let frames = u64::from(self.total_frames());
        (frames * 1000).div_ceil(u64::from(self.fps.max(1)))
    }

    pub fn tint_table(&self) -> TintTable {
        TintTable::new(self.tints.clone(), self.default_tint)
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Duration {
    Seconds(f32),
    Frames { frames: u32 },
}

/// One scripted input at a point in time.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TapeEvent {
    pub at_ms: u64,
    #[serde(flatten)]
    pub input: TapeInput,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TapeInput {
    Wheel {
        delta_y: f32,
    },
    TouchStart {
        y: f32,
        #[serde(default = "default_fingers")]
        fingers: u32,
    },
    TouchMove {
        y: f32,
    },
    TouchEnd,
    TouchCancel,
    Key {
        key: String,
    },
    Resize {
        width: f32,
        height: f32,
    },
    /// Direct scroll-offset change, as from dragging a scrollbar.
    Scroll {
        y: f32,
    },
    /// Raw visibility report, bypassing the page simulation.
    Visibility {
        ratios: BTreeMap<String, f32>,
    },
    /// Untyped section-changed payload published by a third party.
    Publish {
        payload: Value,
    },
}

fn default_fingers() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::{Scene, TapeInput};

    fn parse(yaml: &str) -> Scene {
        serde_yaml::from_str(yaml).expect("scene should parse")
    }

    #[test]
    fn tape_inputs_parse_with_kind_tag() {
        let scene = parse(
            r#"
viewport: { width: 640, height: 360 }
duration: { frames: 10 }
sections:
  - { id: a, side: left }
tape:
  - { at_ms: 100, kind: wheel, delta_y: 90 }
  - { at_ms: 200, kind: touch_start, y: 500 }
  - { at_ms: 250, kind: touch_end }
  - { at_ms: 300, kind: key, key: ArrowDown }
  - { at_ms: 400, kind: visibility, ratios: { a: 0.9 } }
  - { at_ms: 500, kind: publish, payload: { id: a } }
"#,
        );

        assert_eq!(scene.fps, 60);
        assert_eq!(scene.tape[0].input, TapeInput::Wheel { delta_y: 90.0 });
        assert_eq!(
            scene.tape[1].input,
            TapeInput::TouchStart {
                y: 500.0,
                fingers: 1
            }
        );
        assert_eq!(scene.tape[2].input, TapeInput::TouchEnd);
        assert!(matches!(scene.tape[5].input, TapeInput::Publish { .. }));
    }

    #[test]
    fn seconds_duration_rounds_up_to_frames() {
        let scene = parse(
            r#"
viewport: { width: 640, height: 360 }
fps: 30
duration: 1.01
"#,
        );
        assert_eq!(scene.total_frames(), 31);
        assert_eq!(scene.duration_ms(), 1034);
        assert!(scene.validate().is_ok());
    }

    #[test]
    fn zero_viewport_is_rejected() {
        let scene = parse(
            r#"
viewport: { width: 0, height: 360 }
duration: { frames: 1 }
"#,
        );
        assert!(scene.validate().is_err());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let result = serde_yaml::from_str::<Scene>(
            r#"
viewport: { width: 640, height: 360 }
duration: { frames: 1 }
colour: red
"#,
        );
        assert!(result.is_err());
    }
}
