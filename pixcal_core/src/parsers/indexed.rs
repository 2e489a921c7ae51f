//! `data_indexed` records: like `data_array` but each front-end array keeps
//! a leading front-end index slot (21 numbers). The slot is not interpreted.

use super::{
    CalibrationParser, FE_FIELDS_INDEXED, ParseContext, RawRecord, json_entries, json_fields,
    push_standard_front_end,
};
use crate::bundle::CalibrationBundle;
use crate::error::ParseError;

pub struct IndexedArrayParser<'a> {
    ctx: ParseContext<'a>,
}

impl<'a> IndexedArrayParser<'a> {
    pub fn new(ctx: ParseContext<'a>) -> Self {
        Self { ctx }
    }
}

impl CalibrationParser for IndexedArrayParser<'_> {
    fn name(&self) -> &'static str {
        "indexed-array"
    }

    fn parse(&self, module: usize, record: &RawRecord) -> Result<CalibrationBundle, ParseError> {
        let RawRecord::IndexedArray(data) = record else {
            return Err(ParseError::ShapeMismatch);
        };
        let info = self.ctx.module_info(module)?;
        let mut bundle = CalibrationBundle::with_capacity(info.front_ends);
        for (front_end, entry) in json_entries(module, data, info.front_ends)? {
            let fields = json_fields(module, front_end, entry, FE_FIELDS_INDEXED)?;
            push_standard_front_end(&mut bundle, &self.ctx, &info, &fields[1..]);
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
    use crate::params::{LegacyFitParameters, Resolutions};
    use crate::parsers::test_support::standard_fields;

    fn indexed(fe: usize) -> Vec<f64> {
        let mut v = vec![fe as f64];
        v.extend(standard_fields());
        v
    }

    #[test]
    fn skips_index_slot() {
        let layout = UniformLayout::new(1, 2, ReadoutTechnology::Fei3);
        let config = StaticConfig::default();
        let parser = IndexedArrayParser::new(ParseContext::new(&layout, &config));
        let b = parser
            .parse(0, &RawRecord::IndexedArray(json!([indexed(0), indexed(1)])))
            .expect("valid");
        assert_eq!(b.len(), 2);
        assert_eq!(b.threshold[1].value, 3500);
        assert_eq!(b.params[0], LegacyFitParameters::new(70.2, -3561.25, 26000.0));
        assert_eq!(b.resolutions[1], Resolutions::new(0.08, 0.0002));
    }

    #[test]
    fn twenty_fields_are_one_short() {
        let layout = UniformLayout::new(1, 1, ReadoutTechnology::Fei3);
        let config = StaticConfig::default();
        let parser = IndexedArrayParser::new(ParseContext::new(&layout, &config));
        let err = parser
            .parse(0, &RawRecord::IndexedArray(json!([standard_fields()])))
            .unwrap_err();
        assert_eq!(
            err,
            ParseError::FieldCount {
                module: 0,
                front_end: 0,
                expected: 21,
                found: 20
            }
        );
    }

    #[test]
    fn array_records_are_not_indexed_records() {
        let layout = UniformLayout::new(1, 1, ReadoutTechnology::Fei3);
        let config = StaticConfig::default();
        let parser = IndexedArrayParser::new(ParseContext::new(&layout, &config));
        let err = parser
            .parse(0, &RawRecord::Array(json!([indexed(0)])))
            .unwrap_err();
        assert_eq!(err, ParseError::ShapeMismatch);
    }
}
