use std::fmt::Debug;
use std::result;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("variable '{0}' not found in Dataset")]
    MissingVariable(String),

    #[error("coordinate '{0}' missing in Dataset")]
    MissingCoordinate(String),

    #[error("variable '{variable}' has no '{dim}' dimension")]
    MissingDimension { variable: String, dim: String },

    #[error("coordinate '{0}' must hold numeric labels")]
    NonNumericCoordinate(String),

    #[error("dimension '{0}' is assigned more than one role")]
    DuplicateRole(String),

    #[error("no time dimension is configured")]
    NoTimeDimension,

    #[error("inconsistent dataset: {0}")]
    Shape(String),

    #[error("unable to read configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("timestep {step} is out of range, dataset has {nsteps} step(s)")]
    StepOutOfRange { step: usize, nsteps: usize },

    #[error("position {position} is out of range for dimension '{dim}' with size {size}")]
    PositionOutOfRange {
        dim: String,
        position: usize,
        size: usize,
    },

    #[error("{name} {value} is out of range [{min}, {max}]")]
    ValueOutOfRange {
        name: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("no step along '{0}' is nearest to the given time")]
    NoNearestStep(String),

    #[error("invalid dimension(s): {0:?}")]
    InvalidDimension(Vec<String>),

    #[error("Invalid variable name '{name}', must be one of {allowed:?}")]
    InvalidVariable { name: String, allowed: Vec<String> },

    #[error("'{0}' is not a valid colormap")]
    InvalidColormap(String),

    #[error("unable to parse color: {0:?}")]
    InvalidColor(String),

    #[error("control {control} does not accept value {value}")]
    InvalidControlValue { control: String, value: String },

    #[error("dataset view is not initialized")]
    NotInitialized,

    #[error("viewer has no '{0}' component")]
    MissingComponent(&'static str),

    #[error("viewer {0} is not part of this session")]
    UnknownViewer(usize),

    #[error("linking works with at least two viewers, got {0}")]
    TooFewViewers(usize),

    #[error("linking works with distinct viewers, viewer {0} was given more than once")]
    DuplicateViewer(usize),
}

/// Broad category of an [`Error`], used by callers to decide whether a failure is recoverable.
///
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad dimension roles or an inconsistent dataset. Fix the configuration and reload.
    Configuration,

    /// A cursor or numeric setting outside of its valid range. State is unchanged.
    Range,

    /// Unknown extra dimension. State is unchanged.
    InvalidDimension,

    /// Unknown color variable. State is unchanged.
    InvalidVariable,

    /// Some other rejected UI value (colormap, color, control value). State is unchanged.
    InvalidValue,

    /// A cursor operation was attempted before any dataset was loaded.
    NotInitialized,

    /// An argument to `link` is not a viewer known to the session.
    LinkType,

    /// Wrong number or repetition of viewers passed to `link`.
    LinkValue,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingVariable(_)
            | Self::MissingCoordinate(_)
            | Self::MissingDimension { .. }
            | Self::NonNumericCoordinate(_)
            | Self::DuplicateRole(_)
            | Self::NoTimeDimension
            | Self::Shape(_)
            | Self::Config(_)
            | Self::MissingComponent(_) => ErrorKind::Configuration,

            Self::StepOutOfRange { .. }
            | Self::PositionOutOfRange { .. }
            | Self::ValueOutOfRange { .. }
            | Self::NoNearestStep(_) => ErrorKind::Range,

            Self::InvalidDimension(_) => ErrorKind::InvalidDimension,
            Self::InvalidVariable { .. } => ErrorKind::InvalidVariable,

            Self::InvalidColormap(_) | Self::InvalidColor(_) | Self::InvalidControlValue { .. } => {
                ErrorKind::InvalidValue
            }

            Self::NotInitialized => ErrorKind::NotInitialized,
            Self::UnknownViewer(_) => ErrorKind::LinkType,
            Self::TooFewViewers(_) | Self::DuplicateViewer(_) => ErrorKind::LinkValue,
        }
    }

    pub(crate) fn invalid_control<C: Debug, V: Debug>(control: C, value: V) -> Self {
        Self::InvalidControlValue {
            control: format!("{control:?}"),
            value: format!("{value:?}"),
        }
    }
}

pub type Result<T> = result::Result<T, Error>;
