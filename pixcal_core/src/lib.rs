#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap,
    clippy::float_cmp,
    clippy::must_use_candidate,
    clippy::suboptimal_flops,
    clippy::missing_const_for_fn
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Pixel charge calibration (geometry-agnostic).
//!
//! Converts deposited charge to time-over-threshold (ToT) and back, per
//! module, front-end chip and pixel diode type. Geometry and run settings
//! come from `pixcal_traits::DetectorLayout` and `pixcal_traits::ModuleConfig`.
//!
//! ## Architecture
//!
//! - **Parameters**: threshold, fit and resolution value types (`params`)
//! - **Parsers**: three historical record encodings (`parsers`)
//! - **Bundle**: one module's parsed constants plus the extrapolation
//!   transition search (`bundle`)
//! - **Store**: dense per-module storage and the conversion queries (`store`)
//! - **Ingestion**: records or defaults into a populated store (`ingest`)
//!
//! ## Conversion strategies
//!
//! | strategy  | charge to ToT                                         |
//! |-----------|-------------------------------------------------------|
//! | `RUN1PIX` | `A (E + Q) / (C + Q)`                                 |
//! | `RUN3PIX` | as `RUN1PIX`, linear above 1e5 electrons              |
//! | `LUTFEI4` | closest entry of a 16-code lookup table               |
//! | `RD53`    | as `RUN1PIX`                                          |

pub mod bundle;
pub mod error;
pub mod ingest;
pub mod mocks;
pub mod params;
pub mod parsers;
pub mod store;

pub use bundle::{CHARGE_LIMIT, CalibrationBundle, LINEAR_FIT_DX};
pub use error::{CalibError, ParseError, Result};
pub use ingest::{IngestReport, Ingestor, ModuleFailure};
pub use params::{
    CalibrationStrategy, DiodeType, IblCalibration, LegacyFitParameters, LinearFitParameters,
    Resolutions, Thresholds,
};
pub use parsers::{
    ArrayParser, CalibrationParser, IndexedArrayParser, ParseContext, RawPayload, RawRecord,
    RecordSet, TextParser, parse_record,
};
pub use store::ChargeCalibStore;
