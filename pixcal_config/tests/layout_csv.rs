use std::fs::File;
use std::io::Write;

use pixcal_config::{Technology, load_modules_csv, load_toml};
use pixcal_traits::DetectorLayout;
use rstest::rstest;
use tempfile::tempdir;

const REGIONS: &str = r#"
[[regions]]
barrel_ec = 0
layer = 0
tot_threshold = 1
fei3_latency = 16
analog_threshold = 1500
in_time_threshold = 2000
"#;

fn write_csv(body: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("layout.csv");
    let mut f = File::create(&path).unwrap();
    f.write_all(body.as_bytes()).unwrap();
    (dir, path)
}

#[rstest]
fn loads_layout_rows() {
    let (_dir, path) = write_csv(
        "hash,barrel_ec,layer,technology,circuits,dbm\n0,0,0,fei4,2,false\n5,0,0,fei4,1,true\n",
    );
    let modules = load_modules_csv(&path).expect("valid layout");
    assert_eq!(modules.len(), 2);
    assert_eq!(modules[0].technology, Technology::Fei4);
    assert!(modules[1].dbm);

    let cfg = load_toml(REGIONS).unwrap().with_modules(modules);
    cfg.validate().expect("layout with regions is valid");
    assert_eq!(cfg.module_count(), 6);
    assert!(cfg.is_dbm(5));
    assert_eq!(cfg.front_end_count(5), Some(1));
}

#[rstest]
fn rejects_wrong_headers() {
    let (_dir, path) = write_csv("id,barrel_ec,layer,technology,circuits,dbm\n0,0,0,fei4,2,false\n");
    let err = load_modules_csv(&path).expect_err("bad headers");
    assert!(format!("{err}").contains("layout CSV must have headers"));
}

#[rstest]
fn reports_bad_row_number() {
    let (_dir, path) = write_csv(
        "hash,barrel_ec,layer,technology,circuits,dbm\n0,0,0,fei4,2,false\n1,0,0,fe99,2,false\n",
    );
    let err = load_modules_csv(&path).expect_err("bad technology");
    assert!(format!("{err}").contains("invalid CSV row 3"));
}
