use std::fmt;

use anyhow::Error;
use serde::Serialize;
use serde_json::Value;

pub const ARG_INVALID: &str = "ARG_INVALID";
pub const SCENE_INVALID: &str = "SCENE_INVALID";
pub const FONT_REQUIRED: &str = "FONT_REQUIRED";
pub const OUTPUT_UNWRITABLE: &str = "OUTPUT_UNWRITABLE";
/// Fallback for failures that carry no code of their own.
pub const INTERNAL: &str = "INTERNAL";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodedErrorKind {
    Usage,
    Scene,
}

impl CodedErrorKind {
    pub fn exit_code(self) -> i32 {
        match self {
            CodedErrorKind::Usage => 2,
            CodedErrorKind::Scene => 3,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CodedError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub kind: CodedErrorKind,
}

impl CodedError {
    pub fn usage(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Usage,
        }
    }

    pub fn scene(message: impl Into<String>) -> Self {
        Self {
            code: SCENE_INVALID,
            message: message.into(),
            details: None,
            kind: CodedErrorKind::Scene,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code.to_owned(),
                message: self.message.clone(),
                details: self.details.clone(),
            },
        }
    }
}

impl fmt::Display for CodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for CodedError {}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

pub fn find_coded_error(error: &Error) -> Option<&CodedError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<CodedError>())
}

/// Envelope for any error: the coded cause if one is in the chain,
/// otherwise [`INTERNAL`] with the full context chain as the message.
pub fn envelope_for(error: &Error) -> ErrorEnvelope {
    match find_coded_error(error) {
        Some(coded) => coded.envelope(),
        None => ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: INTERNAL.to_owned(),
                message: format!("{error:#}"),
                details: None,
            },
        },
    }
}

pub fn exit_code_for(error: &Error) -> i32 {
    find_coded_error(error).map_or(1, |coded| coded.kind.exit_code())
}
