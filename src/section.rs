use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Which half of the viewport a section's content occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "left" => Some(Side::Left),
            "right" => Some(Side::Right),
            _ => None,
        }
    }
}

/// One region of the page. Discovered once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub index: usize,
    pub id: String,
    pub side: Side,
}

/// Declarative section input as read from the scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionDescriptor {
    pub id: String,
    pub side: Side,
}

/// Assigns positional indices in declaration order.
pub fn discover_sections(descriptors: &[SectionDescriptor]) -> Vec<Section> {
    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| Section {
            index,
            id: descriptor.id.clone(),
            side: descriptor.side,
        })
        .collect()
}

/// The one event kind that crosses component boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionChanged {
    pub id: String,
    pub side: Side,
}

impl SectionChanged {
    pub fn for_section(section: &Section) -> Self {
        Self {
            id: section.id.clone(),
            side: section.side,
        }
    }

    /// Decodes an untyped `{id, side}` payload. A payload with a missing or
    /// malformed field yields `None` and is dropped by callers.
    pub fn from_payload(payload: &Value) -> Option<Self> {
        let id = payload.get("id")?.as_str()?;
        let side = Side::parse(payload.get("side")?.as_str()?)?;
        Some(Self {
            id: id.to_owned(),
            side,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{discover_sections, SectionChanged, SectionDescriptor, Side};

    #[test]
    fn discovery_assigns_indices_in_order() {
        let descriptors = vec![
            SectionDescriptor {
                id: "intro".to_owned(),
                side: Side::Left,
            },
            SectionDescriptor {
                id: "work".to_owned(),
                side: Side::Right,
            },
        ];

        let sections = discover_sections(&descriptors);
        assert_eq!(sections[0].index, 0);
        assert_eq!(sections[1].index, 1);
        assert_eq!(sections[1].id, "work");
    }

    #[test]
    fn payload_without_side_is_rejected() {
        assert_eq!(SectionChanged::from_payload(&json!({ "id": "intro" })), None);
        assert_eq!(
            SectionChanged::from_payload(&json!({ "id": "intro", "side": "up" })),
            None
        );
        assert_eq!(
            SectionChanged::from_payload(&json!({ "id": "intro", "side": "right" })),
            Some(SectionChanged {
                id: "intro".to_owned(),
                side: Side::Right,
            })
        );
    }
}
