//! `data_array` records: JSON array of 20-number front-end arrays.
//!
//! Modules read out by FEI4 chips (except DBM) store a lookup table instead
//! of the non-linear fit: `[value, sigma, noise, in_time, q1 .. q16]`.

use super::{
    CalibrationParser, FE_FIELDS, ParseContext, RawRecord, json_entries, json_fields,
    push_lut_front_end, push_standard_front_end,
};
use crate::bundle::CalibrationBundle;
use crate::error::ParseError;

pub struct ArrayParser<'a> {
    ctx: ParseContext<'a>,
}

impl<'a> ArrayParser<'a> {
    pub fn new(ctx: ParseContext<'a>) -> Self {
        Self { ctx }
    }
}

impl CalibrationParser for ArrayParser<'_> {
    fn name(&self) -> &'static str {
        "array"
    }

    fn parse(&self, module: usize, record: &RawRecord) -> Result<CalibrationBundle, ParseError> {
        let RawRecord::Array(data) = record else {
            return Err(ParseError::ShapeMismatch);
        };
        let info = self.ctx.module_info(module)?;
        let mut bundle = CalibrationBundle::with_capacity(info.front_ends);
        for (front_end, entry) in json_entries(module, data, info.front_ends)? {
            let fields = json_fields(module, front_end, entry, FE_FIELDS)?;
            if info.uses_lut() {
                push_lut_front_end(&mut bundle, &fields);
            } else {
                push_standard_front_end(&mut bundle, &self.ctx, &info, &fields);
            }
        }
        bundle.is_valid = true;
        Ok(bundle)
    }
}

#[cfg(test)]
mod tests {
    use pixcal_traits::ReadoutTechnology;
    use serde_json::json;

    use super::*;
    use crate::mocks::{StaticConfig, UniformLayout};
    use crate::params::{CalibrationStrategy, LinearFitParameters, Thresholds};
    use crate::parsers::test_support::standard_fields;

    #[test]
    fn reads_standard_front_ends() {
        let layout = UniformLayout::new(4, 2, ReadoutTechnology::Fei3);
        let config = StaticConfig::default();
        let parser = ArrayParser::new(ParseContext::new(&layout, &config));
        let record = RawRecord::Array(json!([standard_fields(), standard_fields()]));

        let b = parser.parse(1, &record).expect("valid record");
        assert!(b.is_valid);
        assert_eq!(b.len(), 2);
        assert_eq!(b.threshold[0], Thresholds::new(3500, 35, 160, 5000));
        assert_eq!(b.threshold_ganged[1], Thresholds::new(3700, 37, 180, 5200));
        assert_eq!(b.lin, vec![LinearFitParameters::default(); 2]);
        assert_eq!(b.calibration_type, CalibrationStrategy::Run1Pix);
        assert!(b.lut.is_empty());
        assert!(b.is_consistent());
    }

    #[test]
    fn reads_lookup_table_for_fei4() {
        let layout = UniformLayout::new(1, 1, ReadoutTechnology::Fei4);
        let config = StaticConfig::default();
        let parser = ArrayParser::new(ParseContext::new(&layout, &config));
        let mut fe: Vec<f64> = vec![1500.0, 10.0, 75.0, 2000.0];
        fe.extend((1..=16).map(|t| f64::from(t) * 1000.0));
        let b = parser
            .parse(0, &RawRecord::Array(json!([fe])))
            .expect("valid LUT record");

        assert_eq!(b.calibration_type, CalibrationStrategy::LutFei4);
        assert_eq!(b.lut.len(), 1);
        assert_eq!(b.lut[0].charge(1), Some(1000.0));
        assert_eq!(b.threshold_long[0], Thresholds::new(1500, 10, 75, 2000));
        assert!(b.is_consistent());
    }

    #[test]
    fn dbm_module_uses_standard_layout() {
        let layout = UniformLayout::new(1, 1, ReadoutTechnology::Fei4).with_dbm(0);
        let config = StaticConfig::default();
        let parser = ArrayParser::new(ParseContext::new(&layout, &config));
        let b = parser
            .parse(0, &RawRecord::Array(json!([standard_fields()])))
            .expect("valid");
        assert!(b.lut.is_empty());
        assert_eq!(b.calibration_type, CalibrationStrategy::Run1Pix);
    }

    #[test]
    fn rejects_other_shapes_and_short_records() {
        let layout = UniformLayout::new(1, 2, ReadoutTechnology::Fei3);
        let config = StaticConfig::default();
        let parser = ArrayParser::new(ParseContext::new(&layout, &config));

        let text = RawRecord::Text("header\n".into());
        assert_eq!(parser.parse(0, &text).unwrap_err(), ParseError::ShapeMismatch);

        let one_fe = RawRecord::Array(json!([standard_fields()]));
        assert_eq!(
            parser.parse(0, &one_fe).unwrap_err(),
            ParseError::MissingFrontEnd {
                module: 0,
                front_end: 1
            }
        );

        let empty = RawRecord::Array(json!([standard_fields(), []]));
        assert_eq!(
            parser.parse(0, &empty).unwrap_err(),
            ParseError::EmptyEntry {
                module: 0,
                front_end: 1
            }
        );
    }
}
