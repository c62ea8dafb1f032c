use thiserror::Error;

use crate::flag_definitions::FlagType;
use crate::store::StoreError;

/// Which part of the console an error belongs to. Validation and coercion
/// failures never reach the store; store failures leave displayed data stale
/// until the next refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Coercion,
    Collaborator,
}

#[derive(Error, Debug)]
pub enum ConsoleError {
    #[error("duplicate segment type in combination: {0}")]
    DuplicateSegmentType(String),
    #[error("segment combination cannot be empty")]
    EmptyCombination,
    #[error("segment entry has values but no segment type selected")]
    MissingSegmentType,
    #[error("no values selected for segment type: {0}")]
    EmptyValues(String),
    #[error("mixed inclusion markers for segment type: {0}")]
    MixedPolarity(String),
    #[error("segment value may not begin with the exclusion marker: {0:?}")]
    ReservedValueMarker(String),
    #[error("unknown segment type: {0}")]
    UnknownSegmentType(String),
    #[error("unknown value {value:?} for segment type {segment_type}")]
    UnknownSegmentValue { segment_type: String, value: String },
    #[error("rollout percentage out of range: {0}")]
    PercentageOutOfRange(i64),
    #[error("missing required field: {0}")]
    MissingRequiredField(&'static str),
    #[error("override index out of bounds: {0}")]
    IndexOutOfBounds(usize),
    #[error("new order is not a permutation of the current overrides")]
    InvalidOrder,

    #[error("not a valid number: {0:?}")]
    InvalidNumber(String),
    #[error("value does not match the declared {expected:?} type")]
    TypeMismatch { expected: FlagType },

    #[error("not found in store")]
    NotFound,
    #[error("timed out while talking to the store")]
    StoreTimeout,
    #[error("store request failed")]
    StoreUnavailable,
    #[error("failed to parse store document")]
    DataParsingError,
}

impl ConsoleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ConsoleError::DuplicateSegmentType(_)
            | ConsoleError::EmptyCombination
            | ConsoleError::MissingSegmentType
            | ConsoleError::EmptyValues(_)
            | ConsoleError::MixedPolarity(_)
            | ConsoleError::ReservedValueMarker(_)
            | ConsoleError::UnknownSegmentType(_)
            | ConsoleError::UnknownSegmentValue { .. }
            | ConsoleError::PercentageOutOfRange(_)
            | ConsoleError::MissingRequiredField(_)
            | ConsoleError::IndexOutOfBounds(_)
            | ConsoleError::InvalidOrder => ErrorKind::Validation,

            ConsoleError::InvalidNumber(_) | ConsoleError::TypeMismatch { .. } => {
                ErrorKind::Coercion
            }

            ConsoleError::NotFound
            | ConsoleError::StoreTimeout
            | ConsoleError::StoreUnavailable
            | ConsoleError::DataParsingError => ErrorKind::Collaborator,
        }
    }
}

impl From<StoreError> for ConsoleError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => ConsoleError::NotFound,
            StoreError::Timeout(_) => ConsoleError::StoreTimeout,
            StoreError::Transport(e) => {
                if e.is_timeout() {
                    ConsoleError::StoreTimeout
                } else if e.is_decode() {
                    tracing::error!("failed to decode store response: {}", e);
                    ConsoleError::DataParsingError
                } else {
                    tracing::error!("store request failed: {}", e);
                    ConsoleError::StoreUnavailable
                }
            }
            StoreError::Status(404) => ConsoleError::NotFound,
            StoreError::Status(status) => {
                tracing::error!("store returned unexpected status: {}", status);
                ConsoleError::StoreUnavailable
            }
            StoreError::Parse(e) => {
                tracing::error!("failed to parse store document: {}", e);
                ConsoleError::DataParsingError
            }
        }
    }
}
