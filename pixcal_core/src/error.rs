use thiserror::Error;

use crate::params::DiodeType;

/// Failure to turn one raw record into a calibration bundle.
///
/// Every variant except `ShapeMismatch` is fatal for the module being parsed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("record shape is not handled by this parser")]
    ShapeMismatch,
    #[error("module {module}: front-end {front_end} entry is empty")]
    EmptyEntry { module: usize, front_end: usize },
    #[error(
        "module {module}: front-end {front_end} has {found} fields, expected {expected}"
    )]
    FieldCount {
        module: usize,
        front_end: usize,
        expected: usize,
        found: usize,
    },
    #[error("module {module}: front-end {front_end} field {index} is not numeric: {token}")]
    BadToken {
        module: usize,
        front_end: usize,
        index: usize,
        token: String,
    },
    #[error("module {module}: record has no entry for front-end {front_end}")]
    MissingFrontEnd { module: usize, front_end: usize },
    #[error("module {module}: record is not an array of front-end arrays")]
    NotAnArray { module: usize },
    #[error("module {module}: unknown module in detector layout")]
    UnknownModule { module: usize },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibError {
    #[error("module {module} out of range (store holds {size} modules)")]
    ModuleOutOfRange { module: usize, size: usize },
    #[error("module {0} has no calibration")]
    ModuleNotPopulated(usize),
    #[error("front-end {front_end} out of range for module {module} ({count} front-ends)")]
    FrontEndOutOfRange {
        module: usize,
        front_end: usize,
        count: usize,
    },
    #[error("{diode:?} calibration missing for module {module}")]
    DiodeTypeMissing { diode: DiodeType, module: usize },
    #[error("ToT {tot} outside lookup table range 1..={len}")]
    TotOutOfRange { tot: f32, len: usize },
    #[error("module {0} has no lookup table")]
    MissingLookupTable(usize),
    #[error("module {module}: got {found} front-end values, expected {expected}")]
    LengthMismatch {
        module: usize,
        expected: usize,
        found: usize,
    },
    #[error("bundle for module {0} is not valid")]
    InvalidBundle(usize),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

pub type Result<T, E = CalibError> = std::result::Result<T, E>;
pub use eyre::Report;
