#![no_main]
use libfuzzer_sys::fuzz_target;
use pixcal_traits::{DetectorLayout, ModuleConfig};

fuzz_target!(|data: &str| {
    // Parse errors and validation errors are fine; panics are not.
    let Ok(cfg) = pixcal_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A validated config must answer every layout query for its own modules
    for m in &cfg.modules {
        let loc = cfg.location(m.hash).expect("listed module has a location");
        assert!(cfg.front_end_count(m.hash).is_some());
        assert!(cfg.default_calibration(loc).is_some());
        assert!(cfg.tot_search_bounds(loc).is_some());
    }
});
