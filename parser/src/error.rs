//! Parse diagnostics.

use std::fmt;

use thiserror::Error;
use uidl_core::{Position, SUPPORTED_VERSION, StructureError};

/// One problem found while reading a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The text does not match the grammar.
    #[error("{message}")]
    Syntax { position: Position, message: String },

    /// The version header names a version this crate does not read.
    #[error("unsupported version {found}, only version {} is supported", SUPPORTED_VERSION)]
    UnsupportedVersion {
        found: u64,
        position: Option<Position>,
    },

    /// Malformed or ill-shaped relaxed-JSON input.
    #[error("{message}")]
    Json {
        position: Option<Position>,
        message: String,
    },

    /// Duplicate names, duplicate keys and reserved-key collisions.
    #[error(transparent)]
    Structure(#[from] StructureError),
}

impl ParseError {
    pub fn syntax(position: Position, message: impl Into<String>) -> Self {
        ParseError::Syntax {
            position,
            message: message.into(),
        }
    }

    pub fn json(position: Option<Position>, message: impl Into<String>) -> Self {
        ParseError::Json {
            position,
            message: message.into(),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            ParseError::Syntax { position, .. } => Some(*position),
            ParseError::UnsupportedVersion { position, .. }
            | ParseError::Json { position, .. } => *position,
            ParseError::Structure(err) => err.position(),
        }
    }
}

/// Every diagnostic of one document, ordered by source position.
///
/// Displays one `document:line:column: message` line per error.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseErrors {
    pub document: String,
    pub errors: Vec<ParseError>,
}

impl ParseErrors {
    pub fn new(document: impl Into<String>, mut errors: Vec<ParseError>) -> Self {
        // Stable, so errors without a position keep their relative order.
        errors.sort_by_key(|err| err.position().map(|pos| pos.offset));
        Self {
            document: document.into(),
            errors,
        }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParseError> {
        self.errors.iter()
    }
}

impl fmt::Display for ParseErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, err) in self.errors.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            match err.position() {
                Some(pos) => write!(f, "{}:{pos}: {err}", self.document)?,
                None => write!(f, "{}: {err}", self.document)?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for ParseErrors {}
