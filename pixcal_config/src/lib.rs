#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and module layout parsing for the charge calibration engine.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - The module layout can be listed inline (`[[modules]]`) or loaded from a
//!   CSV file with strict headers.
//! - `Config` implements the `DetectorLayout` and `ModuleConfig` contracts so
//!   a file-described detector can drive ingestion directly.
use std::collections::HashMap;

use pixcal_traits::{
    DefaultCalibration, DetectorLayout, ModuleConfig, ModuleLocation, ReadoutTechnology,
    front_ends_from_circuits,
};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Replace the non-linear fit by a line above the charge limit (FEI3 only).
    pub linear_extrapolation: bool,
}

/// Global default non-linear fit used when no records are supplied.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct FitDefaults {
    pub q2tot_a: f32,
    pub q2tot_e: f32,
    pub q2tot_c: f32,
}

impl Default for FitDefaults {
    fn default() -> Self {
        Self {
            q2tot_a: 70.2,
            q2tot_e: -3561.25,
            q2tot_c: 26000.0,
        }
    }
}

/// Per (barrel_ec, layer) settings.
#[derive(Debug, Deserialize, Clone)]
pub struct RegionCfg {
    pub barrel_ec: i32,
    pub layer: i32,
    /// First ToT scanned by the extrapolation transition search (inclusive).
    pub tot_threshold: i32,
    /// End of the transition search window (exclusive).
    pub fei3_latency: i32,
    pub analog_threshold: i32,
    #[serde(default)]
    pub analog_threshold_sigma: i32,
    #[serde(default)]
    pub analog_threshold_noise: i32,
    pub in_time_threshold: i32,
    /// Forces every analog threshold in this region after ingestion.
    #[serde(default)]
    pub analog_threshold_override: Option<i32>,
}

impl RegionCfg {
    pub fn location(&self) -> ModuleLocation {
        ModuleLocation::new(self.barrel_ec, self.layer)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Technology {
    Fei3,
    Fei4,
    Rd53,
}

impl From<Technology> for ReadoutTechnology {
    fn from(t: Technology) -> Self {
        match t {
            Technology::Fei3 => ReadoutTechnology::Fei3,
            Technology::Fei4 => ReadoutTechnology::Fei4,
            Technology::Rd53 => ReadoutTechnology::Rd53,
        }
    }
}

/// One module of the layout.
///
/// CSV form, expected headers:
/// hash,barrel_ec,layer,technology,circuits,dbm
///
/// Example:
/// hash,barrel_ec,layer,technology,circuits,dbm
/// 0,0,0,fei4,2,false
/// 1,0,1,fei3,16,false
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ModuleCfg {
    pub hash: usize,
    pub barrel_ec: i32,
    pub layer: i32,
    pub technology: Technology,
    pub circuits: usize,
    #[serde(default)]
    pub dbm: bool,
}

impl ModuleCfg {
    pub fn location(&self) -> ModuleLocation {
        ModuleLocation::new(self.barrel_ec, self.layer)
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub defaults: FitDefaults,
    pub regions: Vec<RegionCfg>,
    /// Inline layout; may be empty when a layout CSV is supplied instead.
    #[serde(default)]
    pub modules: Vec<ModuleCfg>,
    #[serde(default)]
    pub logging: Logging,
    #[serde(skip)]
    index: LayoutIndex,
}

/// Lookup tables derived from `regions` and `modules`.
#[derive(Debug, Default)]
struct LayoutIndex {
    modules: HashMap<usize, ModuleCfg>,
    regions: HashMap<ModuleLocation, RegionCfg>,
    module_count: usize,
}

impl LayoutIndex {
    fn build(regions: &[RegionCfg], modules: &[ModuleCfg]) -> Self {
        Self {
            modules: modules.iter().map(|m| (m.hash, *m)).collect(),
            regions: regions.iter().map(|r| (r.location(), r.clone())).collect(),
            module_count: modules.iter().map(|m| m.hash + 1).max().unwrap_or(0),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    let mut cfg = toml::from_str::<Config>(s)?;
    cfg.reindex();
    Ok(cfg)
}

/// Read a module layout CSV with exact headers.
pub fn load_modules_csv(path: &std::path::Path) -> eyre::Result<Vec<ModuleCfg>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open layout CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["hash", "barrel_ec", "layer", "technology", "circuits", "dbm"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "layout CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut modules = Vec::new();
    for (idx, rec) in rdr.deserialize::<ModuleCfg>().enumerate() {
        match rec {
            Ok(m) => modules.push(m),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(modules)
}

impl Config {
    /// Replace the inline module list, e.g. with rows from `load_modules_csv`.
    pub fn with_modules(mut self, modules: Vec<ModuleCfg>) -> Self {
        self.modules = modules;
        self.reindex();
        self
    }

    fn reindex(&mut self) {
        self.index = LayoutIndex::build(&self.regions, &self.modules);
    }

    pub fn region(&self, location: ModuleLocation) -> Option<&RegionCfg> {
        self.index.regions.get(&location)
    }

    pub fn module(&self, hash: usize) -> Option<&ModuleCfg> {
        self.index.modules.get(&hash)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.modules.is_empty() {
            eyre::bail!("modules must list at least one module");
        }
        if self.index.modules.len() != self.modules.len() {
            eyre::bail!("modules contain duplicate hash values");
        }
        if self.index.regions.len() != self.regions.len() {
            eyre::bail!("regions contain duplicate (barrel_ec, layer) entries");
        }

        // Defaults
        if self.defaults.q2tot_a == 0.0 || !self.defaults.q2tot_a.is_finite() {
            eyre::bail!("defaults.q2tot_a must be finite and non-zero");
        }
        if !(self.defaults.q2tot_e.is_finite() && self.defaults.q2tot_c.is_finite()) {
            eyre::bail!("defaults.q2tot_e and defaults.q2tot_c must be finite");
        }

        // Regions
        for r in &self.regions {
            if r.tot_threshold >= r.fei3_latency {
                eyre::bail!(
                    "region ({}, {}): tot_threshold must be < fei3_latency",
                    r.barrel_ec,
                    r.layer
                );
            }
            if r.analog_threshold < 0 || r.in_time_threshold < 0 {
                eyre::bail!(
                    "region ({}, {}): thresholds must be >= 0",
                    r.barrel_ec,
                    r.layer
                );
            }
            if let Some(o) = r.analog_threshold_override
                && o < 0
            {
                eyre::bail!(
                    "region ({}, {}): analog_threshold_override must be >= 0",
                    r.barrel_ec,
                    r.layer
                );
            }
        }

        // Modules
        for m in &self.modules {
            if m.circuits == 0 {
                eyre::bail!("module {}: circuits must be >= 1", m.hash);
            }
            if self.region(m.location()).is_none() {
                eyre::bail!(
                    "module {}: no region configured for ({}, {})",
                    m.hash,
                    m.barrel_ec,
                    m.layer
                );
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}

impl DetectorLayout for Config {
    fn module_count(&self) -> usize {
        self.index.module_count
    }

    fn location(&self, module: usize) -> Option<ModuleLocation> {
        self.module(module).map(ModuleCfg::location)
    }

    fn front_end_count(&self, module: usize) -> Option<usize> {
        self.module(module).map(|m| front_ends_from_circuits(m.circuits))
    }

    fn readout_technology(&self, module: usize) -> Option<ReadoutTechnology> {
        self.module(module).map(|m| m.technology.into())
    }

    fn is_dbm(&self, module: usize) -> bool {
        self.module(module).is_some_and(|m| m.dbm)
    }
}

impl ModuleConfig for Config {
    fn linear_extrapolation(&self) -> bool {
        self.calibration.linear_extrapolation
    }

    fn tot_search_bounds(&self, location: ModuleLocation) -> Option<(i32, i32)> {
        self.region(location)
            .map(|r| (r.tot_threshold, r.fei3_latency))
    }

    fn default_calibration(&self, location: ModuleLocation) -> Option<DefaultCalibration> {
        self.region(location).map(|r| DefaultCalibration {
            analog_threshold: r.analog_threshold,
            analog_threshold_sigma: r.analog_threshold_sigma,
            analog_threshold_noise: r.analog_threshold_noise,
            in_time_threshold: r.in_time_threshold,
            q2tot_a: self.defaults.q2tot_a,
            q2tot_e: self.defaults.q2tot_e,
            q2tot_c: self.defaults.q2tot_c,
        })
    }

    fn analog_threshold_override(&self, location: ModuleLocation) -> Option<i32> {
        self.region(location)
            .and_then(|r| r.analog_threshold_override)
    }
}
