use pixcal_config::load_toml;
use pixcal_traits::{DetectorLayout, ModuleConfig, ModuleLocation, ReadoutTechnology};
use rstest::rstest;

const VALID: &str = r#"
[calibration]
linear_extrapolation = true

[defaults]
q2tot_a = 70.2
q2tot_e = -3561.25
q2tot_c = 26000.0

[[regions]]
barrel_ec = 0
layer = 0
tot_threshold = 1
fei3_latency = 16
analog_threshold = 1500
in_time_threshold = 2000

[[regions]]
barrel_ec = 0
layer = 1
tot_threshold = 3
fei3_latency = 151
analog_threshold = 3500
analog_threshold_sigma = 35
analog_threshold_noise = 160
in_time_threshold = 5000
analog_threshold_override = 4200

[[modules]]
hash = 0
barrel_ec = 0
layer = 0
technology = "fei4"
circuits = 2

[[modules]]
hash = 3
barrel_ec = 0
layer = 1
technology = "fei3"
circuits = 16
"#;

#[rstest]
fn accepts_valid_config_and_exposes_layout() {
    let cfg = load_toml(VALID).expect("parse TOML");
    cfg.validate().expect("valid config should pass");

    assert_eq!(cfg.module_count(), 4);
    assert_eq!(cfg.front_end_count(0), Some(2));
    // 16 circuits describe a half-module
    assert_eq!(cfg.front_end_count(3), Some(32));
    assert_eq!(cfg.front_end_count(1), None);
    assert_eq!(cfg.readout_technology(0), Some(ReadoutTechnology::Fei4));
    assert_eq!(cfg.location(3), Some(ModuleLocation::new(0, 1)));
    assert!(!cfg.is_dbm(3));
}

#[rstest]
fn exposes_region_settings() {
    let cfg = load_toml(VALID).expect("parse TOML");
    let loc = ModuleLocation::new(0, 1);
    assert!(cfg.linear_extrapolation());
    assert_eq!(cfg.tot_search_bounds(loc), Some((3, 151)));
    assert_eq!(cfg.analog_threshold_override(loc), Some(4200));
    assert_eq!(cfg.analog_threshold_override(ModuleLocation::new(0, 0)), None);

    let d = cfg.default_calibration(loc).expect("region defaults");
    assert_eq!(d.analog_threshold, 3500);
    assert_eq!(d.analog_threshold_noise, 160);
    assert!((d.q2tot_a - 70.2).abs() < 1e-6);
}

#[rstest]
#[case("tot_threshold = 3", "tot_threshold = 200", "tot_threshold must be < fei3_latency")]
#[case("circuits = 16", "circuits = 0", "circuits must be >= 1")]
#[case("q2tot_a = 70.2", "q2tot_a = 0.0", "q2tot_a must be finite and non-zero")]
#[case("layer = 1\ntechnology", "layer = 2\ntechnology", "no region configured")]
#[case("hash = 3", "hash = 0", "duplicate hash")]
fn rejects_invalid_values(#[case] from: &str, #[case] to: &str, #[case] expected: &str) {
    let toml = VALID.replacen(from, to, 1);
    let cfg = load_toml(&toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should reject");
    assert!(
        format!("{err}").contains(expected),
        "unexpected error: {err}"
    );
}

#[rstest]
fn rejects_config_without_modules() {
    let toml = VALID.split("[[modules]]").next().expect("prefix");
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("no modules");
    assert!(format!("{err}").contains("at least one module"));
}

#[rstest]
fn unknown_technology_fails_to_parse() {
    let toml = VALID.replace("\"fei3\"", "\"fe65\"");
    assert!(load_toml(&toml).is_err());
}
