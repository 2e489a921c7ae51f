//! Charge calibration store.
//!
//! Dense `[module][front-end]` arrays per diode type for thresholds and fit
//! parameters, one resolution array per module, and sparse per-module slots
//! for the calibration strategy and the FEI4 lookup tables.
//!
//! A module is either unpopulated or populated with a fixed front-end count;
//! every array written for it must have that length. Setters are only meant
//! for the ingestion pass. Once ingestion is done the store is shared
//! read-only (e.g. behind an `Arc`) and queried concurrently.

use std::collections::HashMap;

use pixcal_traits::DefaultCalibration;

use crate::bundle::{CHARGE_LIMIT, CalibrationBundle};
use crate::error::{CalibError, Result};
use crate::params::{
    CalibrationStrategy, DiodeType, IblCalibration, LegacyFitParameters, LinearFitParameters,
    Resolutions, Thresholds,
};

type PerDiode<T> = [Vec<Vec<T>>; DiodeType::COUNT];

fn per_diode<T: Clone>(module_count: usize) -> PerDiode<T> {
    std::array::from_fn(|_| vec![Vec::new(); module_count])
}

#[derive(Debug, Clone)]
pub struct ChargeCalibStore {
    /// Front-end count per module; `None` until the module is populated.
    front_ends: Vec<Option<usize>>,
    thresholds: PerDiode<Thresholds>,
    legacy: PerDiode<LegacyFitParameters>,
    linear: PerDiode<LinearFitParameters>,
    resolutions: Vec<Vec<Resolutions>>,
    strategies: HashMap<usize, CalibrationStrategy>,
    lut: HashMap<usize, Vec<IblCalibration>>,
}

impl ChargeCalibStore {
    /// Store sized for module indices `0..module_count`.
    pub fn new(module_count: usize) -> Self {
        Self {
            front_ends: vec![None; module_count],
            thresholds: per_diode(module_count),
            legacy: per_diode(module_count),
            linear: per_diode(module_count),
            resolutions: vec![Vec::new(); module_count],
            strategies: HashMap::new(),
            lut: HashMap::new(),
        }
    }

    pub fn module_count(&self) -> usize {
        self.front_ends.len()
    }

    pub fn front_end_count(&self, module: usize) -> Option<usize> {
        self.front_ends.get(module).copied().flatten()
    }

    pub fn is_populated(&self, module: usize) -> bool {
        self.front_end_count(module).is_some()
    }

    /// Number of populated modules.
    pub fn populated(&self) -> usize {
        self.front_ends.iter().filter(|n| n.is_some()).count()
    }

    fn check_module(&self, module: usize) -> Result<()> {
        if module < self.module_count() {
            Ok(())
        } else {
            Err(CalibError::ModuleOutOfRange {
                module,
                size: self.module_count(),
            })
        }
    }

    /// Validate that `module` may hold `len` front-ends; populates it on first use.
    fn claim(&mut self, module: usize, len: usize) -> Result<()> {
        self.check_module(module)?;
        match self.front_ends[module] {
            None => {
                self.front_ends[module] = Some(len);
                Ok(())
            }
            Some(n) if n == len => Ok(()),
            Some(n) => Err(CalibError::LengthMismatch {
                module,
                expected: n,
                found: len,
            }),
        }
    }

    // ── Setters (ingestion only) ─────────────────────────────────────────────

    pub fn set_thresholds(
        &mut self,
        diode: DiodeType,
        module: usize,
        values: Vec<Thresholds>,
    ) -> Result<()> {
        self.claim(module, values.len())?;
        self.thresholds[diode.index()][module] = values;
        Ok(())
    }

    pub fn set_legacy_fit_parameters(
        &mut self,
        diode: DiodeType,
        module: usize,
        values: Vec<LegacyFitParameters>,
    ) -> Result<()> {
        self.claim(module, values.len())?;
        self.legacy[diode.index()][module] = values;
        Ok(())
    }

    pub fn set_linear_fit_parameters(
        &mut self,
        diode: DiodeType,
        module: usize,
        values: Vec<LinearFitParameters>,
    ) -> Result<()> {
        self.claim(module, values.len())?;
        self.linear[diode.index()][module] = values;
        Ok(())
    }

    pub fn set_resolutions(&mut self, module: usize, values: Vec<Resolutions>) -> Result<()> {
        self.claim(module, values.len())?;
        self.resolutions[module] = values;
        Ok(())
    }

    pub fn set_calibration_strategy(
        &mut self,
        module: usize,
        strategy: CalibrationStrategy,
    ) -> Result<()> {
        self.check_module(module)?;
        self.strategies.insert(module, strategy);
        Ok(())
    }

    pub fn set_lookup_table(&mut self, module: usize, tables: Vec<IblCalibration>) -> Result<()> {
        self.claim(module, tables.len())?;
        self.lut.insert(module, tables);
        Ok(())
    }

    /// Absorb a parsed bundle for `module`.
    ///
    /// LONG pixels share NORMAL's fit; LARGE pixels share GANGED's thresholds
    /// and fit. Nothing is written unless the whole bundle fits.
    pub fn merge_bundle(&mut self, module: usize, bundle: CalibrationBundle) -> Result<()> {
        self.check_module(module)?;
        if !bundle.is_valid || !bundle.is_consistent() {
            return Err(CalibError::InvalidBundle(module));
        }
        self.claim(module, bundle.len())?;

        let CalibrationBundle {
            calibration_type,
            threshold,
            threshold_long,
            threshold_ganged,
            params,
            params_ganged,
            lin,
            lin_ganged,
            resolutions,
            lut,
            ..
        } = bundle;

        self.set_thresholds(DiodeType::Normal, module, threshold)?;
        self.set_thresholds(DiodeType::Long, module, threshold_long)?;
        self.set_thresholds(DiodeType::Ganged, module, threshold_ganged.clone())?;
        self.set_thresholds(DiodeType::Large, module, threshold_ganged)?;

        self.set_legacy_fit_parameters(DiodeType::Normal, module, params.clone())?;
        self.set_legacy_fit_parameters(DiodeType::Long, module, params)?;
        self.set_legacy_fit_parameters(DiodeType::Ganged, module, params_ganged.clone())?;
        self.set_legacy_fit_parameters(DiodeType::Large, module, params_ganged)?;

        self.set_linear_fit_parameters(DiodeType::Normal, module, lin.clone())?;
        self.set_linear_fit_parameters(DiodeType::Long, module, lin)?;
        self.set_linear_fit_parameters(DiodeType::Ganged, module, lin_ganged.clone())?;
        self.set_linear_fit_parameters(DiodeType::Large, module, lin_ganged)?;

        self.set_resolutions(module, resolutions)?;
        self.set_calibration_strategy(module, calibration_type)?;
        if lut.is_empty() {
            self.lut.remove(&module);
        } else {
            self.set_lookup_table(module, lut)?;
        }
        Ok(())
    }

    /// Populate `module` with uniform defaults for all diode types.
    pub fn fill_defaults(
        &mut self,
        module: usize,
        front_ends: usize,
        defaults: &DefaultCalibration,
    ) -> Result<()> {
        self.claim(module, front_ends)?;
        let thresholds = Thresholds::new(
            defaults.analog_threshold,
            defaults.analog_threshold_sigma,
            defaults.analog_threshold_noise,
            defaults.in_time_threshold,
        );
        let fit = LegacyFitParameters::new(defaults.q2tot_a, defaults.q2tot_e, defaults.q2tot_c);
        for diode in DiodeType::ALL {
            self.set_thresholds(diode, module, vec![thresholds; front_ends])?;
            self.set_legacy_fit_parameters(diode, module, vec![fit; front_ends])?;
            self.set_linear_fit_parameters(
                diode,
                module,
                vec![LinearFitParameters::default(); front_ends],
            )?;
        }
        self.set_resolutions(module, vec![Resolutions::default(); front_ends])
    }

    /// Force the analog threshold of every diode type and front-end of `module`.
    pub fn override_analog_threshold(&mut self, module: usize, value: i32) -> Result<()> {
        self.check_module(module)?;
        if !self.is_populated(module) {
            return Err(CalibError::ModuleNotPopulated(module));
        }
        for per_module in &mut self.thresholds {
            for t in &mut per_module[module] {
                t.value = value;
            }
        }
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    fn slot<'a, T>(
        &self,
        rows: &'a [Vec<T>],
        diode: DiodeType,
        module: usize,
        front_end: usize,
    ) -> Result<&'a T> {
        self.check_module(module)?;
        if !self.is_populated(module) {
            return Err(CalibError::ModuleNotPopulated(module));
        }
        let row = &rows[module];
        if row.is_empty() {
            return Err(CalibError::DiodeTypeMissing { diode, module });
        }
        row.get(front_end).ok_or(CalibError::FrontEndOutOfRange {
            module,
            front_end,
            count: row.len(),
        })
    }

    pub fn thresholds(&self, diode: DiodeType, module: usize, front_end: usize) -> Result<Thresholds> {
        self.slot(&self.thresholds[diode.index()], diode, module, front_end)
            .copied()
    }

    pub fn analog_threshold(&self, diode: DiodeType, module: usize, front_end: usize) -> Result<i32> {
        Ok(self.thresholds(diode, module, front_end)?.value)
    }

    pub fn analog_threshold_sigma(
        &self,
        diode: DiodeType,
        module: usize,
        front_end: usize,
    ) -> Result<i32> {
        Ok(self.thresholds(diode, module, front_end)?.sigma)
    }

    pub fn analog_threshold_noise(
        &self,
        diode: DiodeType,
        module: usize,
        front_end: usize,
    ) -> Result<i32> {
        Ok(self.thresholds(diode, module, front_end)?.noise)
    }

    pub fn in_time_threshold(&self, diode: DiodeType, module: usize, front_end: usize) -> Result<i32> {
        Ok(self.thresholds(diode, module, front_end)?.in_time_value)
    }

    pub fn legacy_fit_parameters(
        &self,
        diode: DiodeType,
        module: usize,
        front_end: usize,
    ) -> Result<LegacyFitParameters> {
        self.slot(&self.legacy[diode.index()], diode, module, front_end)
            .copied()
    }

    pub fn linear_fit_parameters(
        &self,
        diode: DiodeType,
        module: usize,
        front_end: usize,
    ) -> Result<LinearFitParameters> {
        self.slot(&self.linear[diode.index()], diode, module, front_end)
            .copied()
    }

    /// Resolution pair of one front-end; identical for every diode type.
    pub fn resolutions(&self, module: usize, front_end: usize) -> Result<Resolutions> {
        self.slot(&self.resolutions, DiodeType::Normal, module, front_end)
            .copied()
    }

    /// Strategy of `module`; unset modules use `RUN1PIX`.
    pub fn calibration_strategy(&self, module: usize) -> Result<CalibrationStrategy> {
        self.check_module(module)?;
        Ok(self.strategies.get(&module).copied().unwrap_or_default())
    }

    fn lookup_table(&self, module: usize, front_end: usize) -> Result<&IblCalibration> {
        self.check_module(module)?;
        let tables = self
            .lut
            .get(&module)
            .ok_or(CalibError::MissingLookupTable(module))?;
        tables.get(front_end).ok_or(CalibError::FrontEndOutOfRange {
            module,
            front_end,
            count: tables.len(),
        })
    }

    // ── Conversions ──────────────────────────────────────────────────────────

    /// Charge (electrons) to ToT.
    pub fn tot(&self, diode: DiodeType, module: usize, front_end: usize, q: f32) -> Result<f32> {
        match self.calibration_strategy(module)? {
            CalibrationStrategy::LutFei4 => self.tot_lut_fei4(module, front_end, q),
            CalibrationStrategy::Run1Pix | CalibrationStrategy::Rd53 => {
                Ok(self.legacy_fit_parameters(diode, module, front_end)?.tot(q))
            }
            CalibrationStrategy::Run3Pix => {
                let tot = self.legacy_fit_parameters(diode, module, front_end)?.tot(q);
                if q > CHARGE_LIMIT {
                    Ok(self.linear_fit_parameters(diode, module, front_end)?.tot(q))
                } else {
                    Ok(tot)
                }
            }
        }
    }

    /// ToT to charge (electrons).
    ///
    /// For `RUN3PIX` modules the result never falls below the analog threshold.
    pub fn charge(&self, diode: DiodeType, module: usize, front_end: usize, tot: f32) -> Result<f32> {
        match self.calibration_strategy(module)? {
            CalibrationStrategy::LutFei4 => self.charge_lut_fei4(module, front_end, tot),
            CalibrationStrategy::Run1Pix | CalibrationStrategy::Rd53 => {
                Ok(self.legacy_fit_parameters(diode, module, front_end)?.q(tot))
            }
            CalibrationStrategy::Run3Pix => {
                let mut q = self.legacy_fit_parameters(diode, module, front_end)?.q(tot);
                if q > CHARGE_LIMIT {
                    q = self.linear_fit_parameters(diode, module, front_end)?.q(tot);
                }
                let threshold = self.analog_threshold(diode, module, front_end)? as f32;
                Ok(q.max(threshold))
            }
        }
    }

    /// ToT smearing width at charge `q`.
    pub fn tot_res(&self, module: usize, front_end: usize, q: f32) -> Result<f32> {
        Ok(self.resolutions(module, front_end)?.total(q))
    }

    /// Lookup-table charge for a 1-based ToT code in `1..=16`.
    pub fn charge_lut_fei4(&self, module: usize, front_end: usize, tot: f32) -> Result<f32> {
        let table = self.lookup_table(module, front_end)?;
        let out_of_range = CalibError::TotOutOfRange {
            tot,
            len: IblCalibration::LEN,
        };
        if !(1.0..=IblCalibration::LEN as f32).contains(&tot) {
            return Err(out_of_range);
        }
        table.charge(tot as usize).ok_or(out_of_range)
    }

    /// Lookup-table ToT code whose charge is closest to `q`.
    pub fn tot_lut_fei4(&self, module: usize, front_end: usize, q: f32) -> Result<f32> {
        Ok(self.lookup_table(module, front_end)?.tot(q) as f32)
    }
}
