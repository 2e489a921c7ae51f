//! Per-module calibration bundle produced by a record parser.
//!
//! A bundle lives for exactly one module ingestion: a parser fills it, the
//! store absorbs it with [`crate::ChargeCalibStore::merge_bundle`], then it is
//! dropped. Fit parameters exist for the NORMAL and GANGED families only;
//! LONG shares NORMAL's fit and LARGE shares GANGED's.

use crate::params::{
    CalibrationStrategy, DiodeType, IblCalibration, LegacyFitParameters, LinearFitParameters,
    Resolutions, Thresholds,
};

/// Charge above which the non-linear fit is replaced by a line.
pub const CHARGE_LIMIT: f32 = 1e5;

/// ToT distance between the two points sampled for the extrapolation line.
pub const LINEAR_FIT_DX: i32 = 5;

#[derive(Debug, Clone, Default)]
pub struct CalibrationBundle {
    pub is_valid: bool,
    pub calibration_type: CalibrationStrategy,
    pub threshold: Vec<Thresholds>,
    pub threshold_long: Vec<Thresholds>,
    pub threshold_ganged: Vec<Thresholds>,
    pub params: Vec<LegacyFitParameters>,
    pub params_ganged: Vec<LegacyFitParameters>,
    pub lin: Vec<LinearFitParameters>,
    pub lin_ganged: Vec<LinearFitParameters>,
    pub resolutions: Vec<Resolutions>,
    /// Only filled for lookup-table modules.
    pub lut: Vec<IblCalibration>,
}

impl CalibrationBundle {
    /// Empty, not yet valid bundle sized for `front_ends` entries.
    pub fn with_capacity(front_ends: usize) -> Self {
        Self {
            is_valid: false,
            calibration_type: CalibrationStrategy::default(),
            threshold: Vec::with_capacity(front_ends),
            threshold_long: Vec::with_capacity(front_ends),
            threshold_ganged: Vec::with_capacity(front_ends),
            params: Vec::with_capacity(front_ends),
            params_ganged: Vec::with_capacity(front_ends),
            lin: Vec::with_capacity(front_ends),
            lin_ganged: Vec::with_capacity(front_ends),
            resolutions: Vec::with_capacity(front_ends),
            lut: Vec::new(),
        }
    }

    /// Number of front-ends parsed so far.
    pub fn len(&self) -> usize {
        self.threshold.len()
    }

    pub fn is_empty(&self) -> bool {
        self.threshold.is_empty()
    }

    pub fn legacy_params(&self, diode: DiodeType) -> &[LegacyFitParameters] {
        match diode {
            DiodeType::Normal | DiodeType::Long => &self.params,
            DiodeType::Ganged | DiodeType::Large => &self.params_ganged,
        }
    }

    pub fn linear_params(&self, diode: DiodeType) -> &[LinearFitParameters] {
        match diode {
            DiodeType::Normal | DiodeType::Long => &self.lin,
            DiodeType::Ganged | DiodeType::Large => &self.lin_ganged,
        }
    }

    fn linear_params_mut(&mut self, diode: DiodeType) -> &mut Vec<LinearFitParameters> {
        match diode {
            DiodeType::Normal | DiodeType::Long => &mut self.lin,
            DiodeType::Ganged | DiodeType::Large => &mut self.lin_ganged,
        }
    }

    /// Append one front-end's thresholds, the same values for every family.
    pub fn push_thresholds(&mut self, normal: Thresholds, long: Thresholds, ganged: Thresholds) {
        self.threshold.push(normal);
        self.threshold_long.push(long);
        self.threshold_ganged.push(ganged);
    }

    /// First ToT in `[start, end)` whose charge, evaluated with the most
    /// recently appended fit for `diode`, exceeds `charge_limit`.
    pub fn idx_at_charge_limit(
        &self,
        charge_limit: f32,
        diode: DiodeType,
        start: i32,
        end: i32,
    ) -> Option<i32> {
        let fit = self.legacy_params(diode).last()?;
        (start..end).find(|&tot| fit.q(tot as f32) > charge_limit)
    }

    /// Append the extrapolation line for `diode`.
    ///
    /// The line passes through the fit at `idx_limit` and `idx_limit - 5`; it
    /// is not slope-matched to the fit. A missing or non-positive index
    /// appends `{0, 0}`.
    pub fn insert_linear_params(&mut self, diode: DiodeType, idx_limit: Option<i32>) {
        let line = match (idx_limit, self.legacy_params(diode).last()) {
            (Some(x1), Some(fit)) if x1 > 0 => {
                let x2 = x1 - LINEAR_FIT_DX;
                let (x1, x2) = (x1 as f32, x2 as f32);
                let y1 = fit.q(x1);
                let y2 = fit.q(x2);
                let dx = LINEAR_FIT_DX as f32;
                LinearFitParameters::new((y1 - y2) / dx, (y2 * x1 - y1 * x2) / dx)
            }
            _ => LinearFitParameters::default(),
        };
        self.linear_params_mut(diode).push(line);
    }

    /// Append `{0, 0}` for both fit families.
    pub fn insert_zero_linear_params(&mut self) {
        self.lin.push(LinearFitParameters::default());
        self.lin_ganged.push(LinearFitParameters::default());
    }

    /// Every per-front-end vector holds the same number of entries.
    pub fn is_consistent(&self) -> bool {
        let n = self.len();
        [
            self.threshold_long.len(),
            self.threshold_ganged.len(),
            self.params.len(),
            self.params_ganged.len(),
            self.lin.len(),
            self.lin_ganged.len(),
            self.resolutions.len(),
        ]
        .iter()
        .all(|&l| l == n)
            && (self.lut.is_empty() || self.lut.len() == n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle_with(fit: LegacyFitParameters) -> CalibrationBundle {
        let mut b = CalibrationBundle::with_capacity(1);
        b.params.push(fit);
        b.params_ganged.push(fit);
        b
    }

    #[test]
    fn search_uses_latest_fit() {
        let mut b = bundle_with(LegacyFitParameters::new(0.0, 0.0, 0.0));
        assert_eq!(b.idx_at_charge_limit(CHARGE_LIMIT, DiodeType::Normal, 0, 100), None);
        b.params.push(LegacyFitParameters::new(100.0, 0.0, 2000.0));
        // Q(t) = 2000 t / (100 - t): 98000 at t = 98, 198000 at t = 99
        assert_eq!(
            b.idx_at_charge_limit(CHARGE_LIMIT, DiodeType::Normal, 0, 100),
            Some(99)
        );
    }

    #[test]
    fn search_without_fit_finds_nothing() {
        let b = CalibrationBundle::with_capacity(0);
        assert_eq!(b.idx_at_charge_limit(CHARGE_LIMIT, DiodeType::Ganged, 0, 10), None);
    }

    #[test]
    fn non_positive_limit_appends_zero_line() {
        let mut b = bundle_with(LegacyFitParameters::new(100.0, 0.0, 1000.0));
        b.insert_linear_params(DiodeType::Normal, Some(0));
        b.insert_linear_params(DiodeType::Ganged, None);
        assert_eq!(b.lin, vec![LinearFitParameters::default()]);
        assert_eq!(b.lin_ganged, vec![LinearFitParameters::default()]);
    }
}
