//! Collaborator contracts for the charge calibration engine.
//!
//! The calibration store never resolves geometry or reads configuration on its
//! own. Everything it needs about a module (where it sits, how many front-ends
//! it reads out, which chip generation it uses) and about the run (whether the
//! high-charge linear extrapolation is active, the ToT search window, default
//! constants) arrives through the two traits below.

/// Front-end chip generation of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadoutTechnology {
    /// Legacy pixel chips; calibrated with the non-linear fit.
    Fei3,
    /// Insertable-layer chips; calibrated with a ToT lookup table.
    Fei4,
    Rd53,
}

/// Physical region of a module: barrel/endcap code plus layer or disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleLocation {
    pub barrel_ec: i32,
    pub layer: i32,
}

impl ModuleLocation {
    pub const fn new(barrel_ec: i32, layer: i32) -> Self {
        Self { barrel_ec, layer }
    }
}

/// Constants used when a module has no calibration record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DefaultCalibration {
    pub analog_threshold: i32,
    pub analog_threshold_sigma: i32,
    pub analog_threshold_noise: i32,
    pub in_time_threshold: i32,
    pub q2tot_a: f32,
    pub q2tot_e: f32,
    pub q2tot_c: f32,
}

/// Identifier resolution and geometry for the full set of modules.
pub trait DetectorLayout {
    /// Largest module index plus one.
    fn module_count(&self) -> usize;
    fn location(&self, module: usize) -> Option<ModuleLocation>;
    /// Number of front-end chips read out for `module`.
    fn front_end_count(&self, module: usize) -> Option<usize>;
    fn readout_technology(&self, module: usize) -> Option<ReadoutTechnology>;
    /// Diamond beam monitor modules share FEI4 chips but never use the lookup table.
    fn is_dbm(&self, module: usize) -> bool;
}

/// Run-level calibration settings.
pub trait ModuleConfig {
    fn linear_extrapolation(&self) -> bool;

    /// Half-open ToT window `[start, end)` scanned for the extrapolation transition.
    fn tot_search_bounds(&self, location: ModuleLocation) -> Option<(i32, i32)>;

    fn default_calibration(&self, location: ModuleLocation) -> Option<DefaultCalibration>;

    /// Forced analog threshold for threshold scans; `None` keeps the stored values.
    fn analog_threshold_override(&self, _location: ModuleLocation) -> Option<i32> {
        None
    }
}

/// Front-ends read out by a module reporting `circuits` readout circuits.
///
/// Some layouts report circuits per half-module; anything at or above eight
/// describes half of the module.
#[inline]
pub fn front_ends_from_circuits(circuits: usize) -> usize {
    const HALF_MODULE_THRESHOLD: usize = 8;
    if circuits < HALF_MODULE_THRESHOLD {
        circuits
    } else {
        2 * circuits
    }
}

#[cfg(test)]
mod tests {
    use super::front_ends_from_circuits;

    #[test]
    fn half_module_circuits_double() {
        assert_eq!(front_ends_from_circuits(2), 2);
        assert_eq!(front_ends_from_circuits(7), 7);
        assert_eq!(front_ends_from_circuits(8), 16);
    }
}
