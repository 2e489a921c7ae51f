//! Calibration commands: config loading, ingestion and conversion queries.

use crate::cli::{Cli, Commands, Diode, Target};
use eyre::{Result, WrapErr};
use pixcal_config::Config;
use pixcal_core::{ChargeCalibStore, DiodeType, IngestReport, Ingestor, RecordSet};
use serde_json::json;
use std::fs;
use std::path::Path;

/// Read, merge with the optional layout CSV, and validate the config.
pub fn load_config(path: &Path, layout: Option<&Path>) -> Result<Config> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let mut cfg =
        pixcal_config::load_toml(&text).wrap_err_with(|| format!("parse config {}", path.display()))?;
    if let Some(csv) = layout {
        let modules = pixcal_config::load_modules_csv(csv)?;
        tracing::debug!(path = %csv.display(), modules = modules.len(), "layout CSV loaded");
        cfg = cfg.with_modules(modules);
    }
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

pub fn load_records(path: &Path) -> Result<RecordSet> {
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read records {}", path.display()))?;
    let set = RecordSet::from_json(&text)
        .wrap_err_with(|| format!("parse records {}", path.display()))?;
    tracing::debug!(path = %path.display(), records = set.records.len(), "records loaded");
    Ok(set)
}

pub fn ingest(cfg: &Config, records: Option<&RecordSet>) -> Result<(ChargeCalibStore, IngestReport)> {
    Ingestor::new(cfg, cfg).run(records)
}

fn diode_name(d: Diode) -> &'static str {
    match d {
        Diode::Normal => "normal",
        Diode::Long => "long",
        Diode::Ganged => "ganged",
        Diode::Large => "large",
    }
}

fn print_report(store: &ChargeCalibStore, report: &IngestReport, json_mode: bool) {
    if json_mode {
        let failed: Vec<_> = report
            .failed
            .iter()
            .map(|f| json!({ "module": f.module, "error": f.error.to_string() }))
            .collect();
        let obj = json!({
            "modules": store.module_count(),
            "populated": report.populated,
            "defaulted": report.defaulted,
            "failed": failed,
            "skipped_channels": report.skipped_channels,
            "overridden": report.overridden,
        });
        println!("{obj}");
    } else {
        println!(
            "ingested: modules={} populated={} defaulted={} failed={} skipped={} overridden={}",
            store.module_count(),
            report.populated,
            report.defaulted,
            report.failed.len(),
            report.skipped_channels,
            report.overridden
        );
        for f in &report.failed {
            println!("  module {}: {}", f.module, f.error);
        }
    }
}

fn check_strict(report: &IngestReport) -> Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    let summary = format!(
        "ingestion incomplete: {} module(s) rejected, {} record(s) skipped",
        report.failed.len(),
        report.skipped_channels
    );
    match report.failed.first() {
        Some(first) => Err(eyre::Report::new(first.error.clone()).wrap_err(summary)),
        None => Err(eyre::eyre!(summary)),
    }
}

fn print_value(name: &str, value: f32, target: Target, diode: Option<Diode>, strategy: &str, json_mode: bool) {
    if json_mode {
        let mut obj = json!({
            "module": target.module,
            "front_end": target.front_end,
            "strategy": strategy,
        });
        obj[name] = json!(value);
        if let Some(d) = diode {
            obj["diode"] = json!(diode_name(d));
        }
        println!("{obj}");
    } else {
        let diode = diode.map(|d| format!(" diode={}", diode_name(d))).unwrap_or_default();
        println!(
            "{name}={value} module={} front_end={}{diode} strategy={strategy}",
            target.module, target.front_end
        );
    }
}

/// Execute the selected subcommand against a validated config.
pub fn run_command(cli: &Cli, cfg: &Config) -> Result<()> {
    let records = cli.records.as_deref().map(load_records).transpose()?;
    let (store, report) = ingest(cfg, records.as_ref())?;

    match &cli.cmd {
        Commands::SelfCheck => {
            if cli.json {
                println!("{}", json!({ "status": "ok", "modules": store.module_count() }));
            } else {
                println!("ok");
            }
            Ok(())
        }
        Commands::Ingest { strict } => {
            print_report(&store, &report, cli.json);
            if *strict { check_strict(&report) } else { Ok(()) }
        }
        Commands::Tot {
            target,
            diode,
            charge,
        } => {
            let strategy = store.calibration_strategy(target.module)?;
            let tot = store
                .tot(DiodeType::from(*diode), target.module, target.front_end, *charge)
                .wrap_err("charge to ToT conversion failed")?;
            print_value("tot", tot, *target, Some(*diode), strategy.as_str(), cli.json);
            Ok(())
        }
        Commands::Charge { target, diode, tot } => {
            let strategy = store.calibration_strategy(target.module)?;
            let q = store
                .charge(DiodeType::from(*diode), target.module, target.front_end, *tot)
                .wrap_err("ToT to charge conversion failed")?;
            print_value("charge", q, *target, Some(*diode), strategy.as_str(), cli.json);
            Ok(())
        }
        Commands::Res { target, charge } => {
            let strategy = store.calibration_strategy(target.module)?;
            let res = store
                .tot_res(target.module, target.front_end, *charge)
                .wrap_err("ToT resolution lookup failed")?;
            print_value("res", res, *target, None, strategy.as_str(), cli.json);
            Ok(())
        }
    }
}
