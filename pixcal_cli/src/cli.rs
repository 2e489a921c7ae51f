//! CLI argument definitions and shared statics.

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pixcal_core::DiodeType;
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "pixcal", version, about = "Pixel charge calibration CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/pixcal.toml")]
    pub config: PathBuf,

    /// Optional module layout CSV (strict header); replaces [[modules]]
    #[arg(long, value_name = "FILE")]
    pub layout: Option<PathBuf>,

    /// Calibration records JSON; without it every module gets defaults
    #[arg(long, value_name = "FILE")]
    pub records: Option<PathBuf>,

    /// Print results and errors as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); falls back to [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Pixel diode type as typed on the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum Diode {
    Normal,
    Long,
    Ganged,
    Large,
}

impl From<Diode> for DiodeType {
    fn from(d: Diode) -> Self {
        match d {
            Diode::Normal => DiodeType::Normal,
            Diode::Long => DiodeType::Long,
            Diode::Ganged => DiodeType::Ganged,
            Diode::Large => DiodeType::Large,
        }
    }
}

/// Which pixel to query.
#[derive(Args, Debug, Clone, Copy)]
pub struct Target {
    /// Module hash
    #[arg(long)]
    pub module: usize,
    /// Front-end index within the module
    #[arg(long = "front-end", default_value_t = 0)]
    pub front_end: usize,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest records (or defaults) and print a summary
    Ingest {
        /// Fail when any module was rejected or any record was skipped
        #[arg(long, action = ArgAction::SetTrue)]
        strict: bool,
    },
    /// Convert charge (electrons) to ToT
    Tot {
        #[command(flatten)]
        target: Target,
        #[arg(long, value_enum, default_value_t = Diode::Normal)]
        diode: Diode,
        /// Charge in electrons
        #[arg(long, allow_negative_numbers = true)]
        charge: f32,
    },
    /// Convert ToT to charge (electrons)
    Charge {
        #[command(flatten)]
        target: Target,
        #[arg(long, value_enum, default_value_t = Diode::Normal)]
        diode: Diode,
        /// Time over threshold
        #[arg(long, allow_negative_numbers = true)]
        tot: f32,
    },
    /// ToT resolution at a given charge
    Res {
        #[command(flatten)]
        target: Target,
        /// Charge in electrons
        #[arg(long, allow_negative_numbers = true)]
        charge: f32,
    },
    /// Validate config, layout and records without querying
    SelfCheck,
}
