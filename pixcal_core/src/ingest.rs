//! One ingestion pass: raw records (or defaults) into a populated store.
//!
//! Modules are independent. A record that fails to parse or merge fails its
//! own module only; the failure is logged and reported, sibling modules are
//! still ingested, and the failed module stays unpopulated.

use std::collections::BTreeSet;

use eyre::WrapErr;
use pixcal_traits::{DetectorLayout, ModuleConfig, ReadoutTechnology};

use crate::error::{CalibError, ParseError};
use crate::params::CalibrationStrategy;
use crate::parsers::{ParseContext, RawPayload, RecordSet, parse_record};
use crate::store::ChargeCalibStore;

/// Warnings about out-of-range module indices before they are summarized.
const MAX_CHANNEL_WARNINGS: usize = 10;

/// A module whose record could not be ingested.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleFailure {
    pub module: usize,
    pub error: CalibError,
}

/// Outcome of an ingestion pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Modules populated from records.
    pub populated: usize,
    /// Modules populated from defaults.
    pub defaulted: usize,
    pub failed: Vec<ModuleFailure>,
    /// Records skipped because their module index lies outside the layout.
    pub skipped_channels: usize,
    /// Modules whose analog thresholds were forced by an override.
    pub overridden: usize,
}

impl IngestReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.skipped_channels == 0
    }
}

pub struct Ingestor<'a> {
    layout: &'a dyn DetectorLayout,
    config: &'a dyn ModuleConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(layout: &'a dyn DetectorLayout, config: &'a dyn ModuleConfig) -> Self {
        Self { layout, config }
    }

    /// Build a store from `records`, or from defaults for every module when
    /// no records are given.
    pub fn run(&self, records: Option<&RecordSet>) -> eyre::Result<(ChargeCalibStore, IngestReport)> {
        let mut store = ChargeCalibStore::new(self.layout.module_count());
        let mut report = IngestReport::default();

        match records {
            Some(set) => self.ingest_records(&mut store, set, &mut report),
            None => self
                .fill_all_defaults(&mut store, &mut report)
                .wrap_err("default calibration fill failed")?,
        }
        self.apply_threshold_overrides(&mut store, &mut report)
            .wrap_err("analog threshold override failed")?;

        tracing::info!(
            modules = store.module_count(),
            populated = report.populated,
            defaulted = report.defaulted,
            failed = report.failed.len(),
            skipped = report.skipped_channels,
            overridden = report.overridden,
            "charge calibration ingested"
        );
        Ok((store, report))
    }

    fn ingest_records(&self, store: &mut ChargeCalibStore, set: &RecordSet, report: &mut IngestReport) {
        let module_count = self.layout.module_count();
        let mut min_invalid = usize::MAX;
        let mut max_invalid = 0usize;
        let mut merged = BTreeSet::new();

        for payload in &set.records {
            let module = payload.module;
            if module >= module_count {
                min_invalid = min_invalid.min(module);
                max_invalid = max_invalid.max(module);
                report.skipped_channels += 1;
                if report.skipped_channels <= MAX_CHANNEL_WARNINGS {
                    tracing::warn!(
                        module,
                        module_count,
                        suppressing_further = report.skipped_channels == MAX_CHANNEL_WARNINGS,
                        "record for module outside the layout skipped"
                    );
                }
                continue;
            }

            match self.ingest_one(store, payload) {
                Ok(()) => {
                    if !merged.insert(module) {
                        tracing::warn!(module, "duplicate record replaced earlier calibration");
                    }
                    tracing::debug!(module, "module calibration merged");
                }
                Err(error) => {
                    tracing::error!(module, error = %error, "module calibration rejected");
                    report.failed.push(ModuleFailure { module, error });
                }
            }
        }
        report.populated = merged.len();

        if report.skipped_channels > MAX_CHANNEL_WARNINGS {
            tracing::warn!(
                count = report.skipped_channels,
                min = min_invalid,
                max = max_invalid,
                module_count,
                "records outside the layout skipped"
            );
        }
    }

    fn ingest_one(&self, store: &mut ChargeCalibStore, payload: &RawPayload) -> Result<(), CalibError> {
        let module = payload.module;
        let record = payload.record().ok_or(ParseError::ShapeMismatch)?;
        let ctx = ParseContext::new(self.layout, self.config);
        let bundle = parse_record(ctx, module, &record)?;

        let expected = self
            .layout
            .front_end_count(module)
            .ok_or(ParseError::UnknownModule { module })?;
        if bundle.len() != expected {
            return Err(CalibError::LengthMismatch {
                module,
                expected,
                found: bundle.len(),
            });
        }
        store.merge_bundle(module, bundle)
    }

    fn fill_all_defaults(&self, store: &mut ChargeCalibStore, report: &mut IngestReport) -> eyre::Result<()> {
        for module in 0..self.layout.module_count() {
            let (Some(location), Some(front_ends)) = (
                self.layout.location(module),
                self.layout.front_end_count(module),
            ) else {
                tracing::trace!(module, "no module at index; left unpopulated");
                continue;
            };
            let defaults = self.config.default_calibration(location).ok_or_else(|| {
                eyre::eyre!(
                    "no default calibration for module {module} at ({}, {})",
                    location.barrel_ec,
                    location.layer
                )
            })?;
            store.fill_defaults(module, front_ends, &defaults)?;
            if self.layout.readout_technology(module) == Some(ReadoutTechnology::Rd53) {
                store.set_calibration_strategy(module, CalibrationStrategy::Rd53)?;
            }
            report.defaulted += 1;
        }
        Ok(())
    }

    fn apply_threshold_overrides(&self, store: &mut ChargeCalibStore, report: &mut IngestReport) -> eyre::Result<()> {
        for module in 0..store.module_count() {
            if !store.is_populated(module) {
                continue;
            }
            let Some(value) = self
                .layout
                .location(module)
                .and_then(|loc| self.config.analog_threshold_override(loc))
            else {
                continue;
            };
            store.override_analog_threshold(module, value)?;
            report.overridden += 1;
        }
        Ok(())
    }
}
