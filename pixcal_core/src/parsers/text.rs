//! `data` records: the line-oriented text encoding.
//!
//! The first line is a header and is skipped. Every following non-blank line
//! describes one front-end as 21 whitespace-separated tokens: the front-end
//! index followed by the 20 standard fields.

use super::{
    CalibrationParser, FE_FIELDS_INDEXED, ParseContext, RawRecord, push_standard_front_end,
};
use crate::bundle::CalibrationBundle;
use crate::error::ParseError;

pub struct TextParser<'a> {
    ctx: ParseContext<'a>,
}

impl<'a> TextParser<'a> {
    pub fn new(ctx: ParseContext<'a>) -> Self {
        Self { ctx }
    }
}

fn line_fields(module: usize, front_end: usize, line: &str) -> Result<Vec<f64>, ParseError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() != FE_FIELDS_INDEXED {
        return Err(ParseError::FieldCount {
            module,
            front_end,
            expected: FE_FIELDS_INDEXED,
            found: tokens.len(),
        });
    }
    tokens
        .iter()
        .enumerate()
        .map(|(index, tok)| {
            tok.parse::<f64>().map_err(|_| ParseError::BadToken {
                module,
                front_end,
                index,
                token: (*tok).to_string(),
            })
        })
        .collect()
}

impl CalibrationParser for TextParser<'_> {
    fn name(&self) -> &'static str {
        "text"
    }

    fn parse(&self, module: usize, record: &RawRecord) -> Result<CalibrationBundle, ParseError> {
        let RawRecord::Text(data) = record else {
            return Err(ParseError::ShapeMismatch);
        };
        let info = self.ctx.module_info(module)?;
        let mut bundle = CalibrationBundle::with_capacity(info.front_ends);
        let lines = data
            .lines()
            .skip(1)
            .filter(|l| !l.trim().is_empty());
        for (front_end, line) in lines.enumerate() {
            let fields = line_fields(module, front_end, line)?;
            push_standard_front_end(&mut bundle, &self.ctx, &info, &fields[1..]);
        }
        if bundle.is_empty() {
            return Err(ParseError::EmptyEntry {
                module,
                front_end: 0,
            });
        }
        bundle.is_valid = true;
        Ok(bundle)
    }
}
