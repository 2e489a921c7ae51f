//! In-memory collaborators for tests and benches.

use std::collections::{HashMap, HashSet};

use pixcal_traits::{
    DefaultCalibration, DetectorLayout, ModuleConfig, ModuleLocation, ReadoutTechnology,
};

/// Every module sits at the same location with the same front-end count.
#[derive(Debug, Clone)]
pub struct UniformLayout {
    pub module_count: usize,
    pub front_ends: usize,
    pub technology: ReadoutTechnology,
    pub location: ModuleLocation,
    technologies: HashMap<usize, ReadoutTechnology>,
    dbm: HashSet<usize>,
}

impl UniformLayout {
    pub fn new(module_count: usize, front_ends: usize, technology: ReadoutTechnology) -> Self {
        Self {
            module_count,
            front_ends,
            technology,
            location: ModuleLocation::new(0, 1),
            technologies: HashMap::new(),
            dbm: HashSet::new(),
        }
    }

    pub fn with_technology(mut self, module: usize, technology: ReadoutTechnology) -> Self {
        self.technologies.insert(module, technology);
        self
    }

    pub fn with_dbm(mut self, module: usize) -> Self {
        self.dbm.insert(module);
        self
    }
}

impl DetectorLayout for UniformLayout {
    fn module_count(&self) -> usize {
        self.module_count
    }

    fn location(&self, module: usize) -> Option<ModuleLocation> {
        (module < self.module_count).then_some(self.location)
    }

    fn front_end_count(&self, module: usize) -> Option<usize> {
        (module < self.module_count).then_some(self.front_ends)
    }

    fn readout_technology(&self, module: usize) -> Option<ReadoutTechnology> {
        (module < self.module_count).then(|| {
            self.technologies
                .get(&module)
                .copied()
                .unwrap_or(self.technology)
        })
    }

    fn is_dbm(&self, module: usize) -> bool {
        self.dbm.contains(&module)
    }
}

/// Same settings for every location.
#[derive(Debug, Clone)]
pub struct StaticConfig {
    pub linear_extrapolation: bool,
    pub tot_search_bounds: (i32, i32),
    pub defaults: DefaultCalibration,
    pub threshold_override: Option<i32>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            linear_extrapolation: false,
            tot_search_bounds: (3, 255),
            defaults: DefaultCalibration {
                analog_threshold: 3500,
                analog_threshold_sigma: 35,
                analog_threshold_noise: 160,
                in_time_threshold: 5000,
                q2tot_a: 70.2,
                q2tot_e: -3561.25,
                q2tot_c: 26000.0,
            },
            threshold_override: None,
        }
    }
}

impl ModuleConfig for StaticConfig {
    fn linear_extrapolation(&self) -> bool {
        self.linear_extrapolation
    }

    fn tot_search_bounds(&self, _location: ModuleLocation) -> Option<(i32, i32)> {
        Some(self.tot_search_bounds)
    }

    fn default_calibration(&self, _location: ModuleLocation) -> Option<DefaultCalibration> {
        Some(self.defaults)
    }

    fn analog_threshold_override(&self, _location: ModuleLocation) -> Option<i32> {
        self.threshold_override
    }
}
