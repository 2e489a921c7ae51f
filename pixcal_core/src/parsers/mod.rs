//! Record parsers: normalize the historical calibration encodings into a
//! [`CalibrationBundle`].
//!
//! Three encodings exist, one per parser:
//!
//! | field          | shape                                   | per front-end |
//! |----------------|-----------------------------------------|---------------|
//! | `data_array`   | JSON array of arrays (LUT capable)      | 20 numbers    |
//! | `data_indexed` | JSON array of arrays, leading index slot| 21 numbers    |
//! | `data`         | text, header line then one line per FE  | 21 tokens     |
//!
//! The 20 standard fields are: thresholds (value, sigma, noise, in-time) for
//! NORMAL, LONG and GANGED, the non-linear fit (A, E, C) for NORMAL then
//! GANGED, and the resolution pair.

mod array;
mod indexed;
mod text;

pub use array::ArrayParser;
pub use indexed::IndexedArrayParser;
pub use text::TextParser;

use pixcal_traits::{DetectorLayout, ModuleConfig, ModuleLocation, ReadoutTechnology};
use serde::Deserialize;
use serde_json::Value;

use crate::bundle::{CHARGE_LIMIT, CalibrationBundle};
use crate::error::ParseError;
use crate::params::{
    CalibrationStrategy, DiodeType, IblCalibration, LegacyFitParameters, Resolutions, Thresholds,
};

/// Numeric fields of a standard front-end entry.
pub const FE_FIELDS: usize = 20;
/// Standard fields plus the reserved front-end index slot.
pub const FE_FIELDS_INDEXED: usize = FE_FIELDS + 1;

/// One module's raw calibration record, tagged by encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Text(String),
    Array(Value),
    IndexedArray(Value),
}

/// Record as delivered by the conditions source.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPayload {
    pub module: usize,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub data_array: Option<Value>,
    #[serde(default)]
    pub data_indexed: Option<Value>,
}

impl RawPayload {
    /// Pick the encoding by field presence: `data_array`, then
    /// `data_indexed`, then `data`.
    pub fn record(&self) -> Option<RawRecord> {
        if let Some(v) = &self.data_array {
            return Some(RawRecord::Array(v.clone()));
        }
        if let Some(v) = &self.data_indexed {
            return Some(RawRecord::IndexedArray(v.clone()));
        }
        self.data.clone().map(RawRecord::Text)
    }
}

/// A batch of records, e.g. one conditions folder snapshot.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RecordSet {
    pub records: Vec<RawPayload>,
}

impl RecordSet {
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

/// Collaborators a parser consults while reading one record.
#[derive(Clone, Copy)]
pub struct ParseContext<'a> {
    pub layout: &'a dyn DetectorLayout,
    pub config: &'a dyn ModuleConfig,
}

impl<'a> ParseContext<'a> {
    pub fn new(layout: &'a dyn DetectorLayout, config: &'a dyn ModuleConfig) -> Self {
        Self { layout, config }
    }

    fn module_info(&self, module: usize) -> Result<ModuleInfo, ParseError> {
        let unknown = || ParseError::UnknownModule { module };
        Ok(ModuleInfo {
            module,
            front_ends: self.layout.front_end_count(module).ok_or_else(unknown)?,
            technology: self.layout.readout_technology(module).ok_or_else(unknown)?,
            location: self.layout.location(module).ok_or_else(unknown)?,
            dbm: self.layout.is_dbm(module),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ModuleInfo {
    module: usize,
    front_ends: usize,
    technology: ReadoutTechnology,
    location: ModuleLocation,
    dbm: bool,
}

impl ModuleInfo {
    fn uses_lut(&self) -> bool {
        self.technology == ReadoutTechnology::Fei4 && !self.dbm
    }
}

/// Contract shared by all record encodings.
pub trait CalibrationParser {
    fn name(&self) -> &'static str;

    /// Parse `record` for `module`. Returns `ParseError::ShapeMismatch` when
    /// the record is in another encoding so the caller can try the next parser.
    fn parse(&self, module: usize, record: &RawRecord) -> Result<CalibrationBundle, ParseError>;
}

/// Try each parser in priority order until one accepts the record's shape.
pub fn parse_record(
    ctx: ParseContext<'_>,
    module: usize,
    record: &RawRecord,
) -> Result<CalibrationBundle, ParseError> {
    let array = ArrayParser::new(ctx);
    let indexed = IndexedArrayParser::new(ctx);
    let text = TextParser::new(ctx);
    let parsers: [&dyn CalibrationParser; 3] = [&array, &indexed, &text];
    for parser in parsers {
        match parser.parse(module, record) {
            Err(ParseError::ShapeMismatch) => continue,
            other => {
                tracing::trace!(module, parser = parser.name(), "record parsed");
                return other;
            }
        }
    }
    Err(ParseError::ShapeMismatch)
}

/// Numbers of one JSON front-end entry, checked against the expected width.
fn json_fields(
    module: usize,
    front_end: usize,
    entry: &Value,
    expected: usize,
) -> Result<Vec<f64>, ParseError> {
    let items = entry
        .as_array()
        .ok_or(ParseError::NotAnArray { module })?;
    if items.is_empty() {
        return Err(ParseError::EmptyEntry { module, front_end });
    }
    if items.len() != expected {
        return Err(ParseError::FieldCount {
            module,
            front_end,
            expected,
            found: items.len(),
        });
    }
    items
        .iter()
        .enumerate()
        .map(|(index, v)| {
            v.as_f64().ok_or_else(|| ParseError::BadToken {
                module,
                front_end,
                index,
                token: v.to_string(),
            })
        })
        .collect()
}

/// Walk the front-end entries of a JSON record, `front_ends` of them.
fn json_entries(
    module: usize,
    data: &Value,
    front_ends: usize,
) -> Result<impl Iterator<Item = (usize, &Value)>, ParseError> {
    let entries = data.as_array().ok_or(ParseError::NotAnArray { module })?;
    if entries.len() < front_ends {
        return Err(ParseError::MissingFrontEnd {
            module,
            front_end: entries.len(),
        });
    }
    Ok(entries.iter().take(front_ends).enumerate())
}

#[inline]
fn thresholds_at(fields: &[f64], offset: usize) -> Thresholds {
    Thresholds::new(
        fields[offset] as i32,
        fields[offset + 1] as i32,
        fields[offset + 2] as i32,
        fields[offset + 3] as i32,
    )
}

#[inline]
fn fit_at(fields: &[f64], offset: usize) -> LegacyFitParameters {
    LegacyFitParameters::new(
        fields[offset] as f32,
        fields[offset + 1] as f32,
        fields[offset + 2] as f32,
    )
}

/// Append one standard front-end (`fields.len() == FE_FIELDS`) and its
/// extrapolation lines.
fn push_standard_front_end(
    bundle: &mut CalibrationBundle,
    ctx: &ParseContext<'_>,
    info: &ModuleInfo,
    fields: &[f64],
) {
    debug_assert_eq!(fields.len(), FE_FIELDS);
    bundle.push_thresholds(
        thresholds_at(fields, 0),
        thresholds_at(fields, 4),
        thresholds_at(fields, 8),
    );
    bundle.params.push(fit_at(fields, 12));
    bundle.params_ganged.push(fit_at(fields, 15));
    bundle
        .resolutions
        .push(Resolutions::new(fields[18] as f32, fields[19] as f32));

    if ctx.config.linear_extrapolation() && info.technology == ReadoutTechnology::Fei3 {
        bundle.calibration_type = CalibrationStrategy::Run3Pix;
        if info.dbm {
            bundle.insert_zero_linear_params();
            return;
        }
        let (start, end) = ctx
            .config
            .tot_search_bounds(info.location)
            .unwrap_or_else(|| {
                tracing::warn!(
                    module = info.module,
                    barrel_ec = info.location.barrel_ec,
                    layer = info.location.layer,
                    "no ToT search bounds; extrapolation disabled for module"
                );
                (0, 0)
            });
        for diode in [DiodeType::Normal, DiodeType::Ganged] {
            let idx = bundle.idx_at_charge_limit(CHARGE_LIMIT, diode, start, end);
            bundle.insert_linear_params(diode, idx);
        }
    } else {
        bundle.calibration_type = CalibrationStrategy::Run1Pix;
        bundle.insert_zero_linear_params();
    }
}

/// Append one lookup-table front-end: 4 thresholds then 16 charges.
fn push_lut_front_end(bundle: &mut CalibrationBundle, fields: &[f64]) {
    debug_assert_eq!(fields.len(), 4 + IblCalibration::LEN);
    let thresholds = thresholds_at(fields, 0);
    bundle.push_thresholds(thresholds, thresholds, thresholds);
    let charges = std::array::from_fn(|i| fields[4 + i] as f32);
    bundle.lut.push(IblCalibration::new(charges));
    bundle.params.push(LegacyFitParameters::default());
    bundle.params_ganged.push(LegacyFitParameters::default());
    bundle.insert_zero_linear_params();
    bundle.resolutions.push(Resolutions::default());
    bundle.calibration_type = CalibrationStrategy::LutFei4;
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Standard field rows shared by the parser unit tests.

    /// 20 standard fields with recognizable values.
    pub fn standard_fields() -> Vec<f64> {
        vec![
            3500.0, 35.0, 160.0, 5000.0, // normal
            3600.0, 36.0, 170.0, 5100.0, // long
            3700.0, 37.0, 180.0, 5200.0, // ganged
            70.2, -3561.25, 26000.0, // fit
            71.0, -3500.0, 27000.0, // ganged fit
            0.08, 0.0002, // resolution
        ]
    }
}
