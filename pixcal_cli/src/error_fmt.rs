//! Human-readable error descriptions and structured JSON error formatting.

use pixcal_core::{CalibError, ParseError};

/// Stable failure classes, one exit code each.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Failure {
    Config,
    Records,
    Query,
    Ingestion,
    Other,
}

impl Failure {
    pub fn name(self) -> &'static str {
        match self {
            Failure::Config => "ConfigInvalid",
            Failure::Records => "RecordsInvalid",
            Failure::Query => "QueryOutOfRange",
            Failure::Ingestion => "IngestionIncomplete",
            Failure::Other => "Error",
        }
    }
}

pub fn classify(err: &eyre::Report) -> Failure {
    if let Some(ce) = err.downcast_ref::<CalibError>() {
        return match ce {
            CalibError::ModuleOutOfRange { .. }
            | CalibError::ModuleNotPopulated(_)
            | CalibError::FrontEndOutOfRange { .. }
            | CalibError::DiodeTypeMissing { .. }
            | CalibError::TotOutOfRange { .. }
            | CalibError::MissingLookupTable(_) => Failure::Query,
            CalibError::LengthMismatch { .. }
            | CalibError::InvalidBundle(_)
            | CalibError::Parse(_) => Failure::Ingestion,
        };
    }
    if err.downcast_ref::<toml::de::Error>().is_some() {
        return Failure::Config;
    }
    if err.downcast_ref::<serde_json::Error>().is_some() {
        return Failure::Records;
    }

    // Config validation and CSV errors are plain eyre messages
    let chain = format!("{err:#}").to_ascii_lowercase();
    if chain.contains("invalid configuration")
        || chain.contains("layout csv")
        || chain.contains("read config")
    {
        return Failure::Config;
    }
    if chain.contains("read records") {
        return Failure::Records;
    }
    if chain.contains("ingestion incomplete") {
        return Failure::Ingestion;
    }
    Failure::Other
}

fn describe_parse(pe: &ParseError) -> String {
    match pe {
        ParseError::FieldCount {
            module,
            front_end,
            expected,
            found,
        } => format!(
            "What happened: Module {module} front-end {front_end} has {found} fields, expected {expected}.\nLikely causes: Truncated export or records written for another format.\nHow to fix: Regenerate the records for this module."
        ),
        ParseError::MissingFrontEnd { module, front_end } => format!(
            "What happened: Module {module} has no entry for front-end {front_end}.\nLikely causes: The layout lists more front-ends (circuits) than the record holds.\nHow to fix: Check `circuits` for this module in the layout."
        ),
        other => format!(
            "What happened: {other}.\nLikely causes: Malformed calibration record.\nHow to fix: Inspect the record for this module; re-run with --log-level=debug for detail."
        ),
    }
}

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(ce) = err.downcast_ref::<CalibError>() {
        return match ce {
            CalibError::ModuleOutOfRange { module, size } => format!(
                "What happened: Module {module} is outside the layout ({size} module slots).\nLikely causes: Wrong --module or a layout that does not match the records.\nHow to fix: Use a hash listed in [[modules]] or the layout CSV."
            ),
            CalibError::ModuleNotPopulated(module) => format!(
                "What happened: Module {module} has no calibration.\nLikely causes: Its record was rejected during ingestion, or no record was supplied.\nHow to fix: Run `pixcal ingest` to see which modules failed."
            ),
            CalibError::FrontEndOutOfRange {
                module,
                front_end,
                count,
            } => format!(
                "What happened: Front-end {front_end} does not exist on module {module} ({count} front-ends).\nLikely causes: Wrong --front-end.\nHow to fix: Use an index below {count}."
            ),
            CalibError::TotOutOfRange { tot, len } => format!(
                "What happened: ToT {tot} is outside the lookup table range 1..={len}.\nLikely causes: FEI4 modules only report ToT codes 1 to {len}.\nHow to fix: Pass an integer ToT code within range."
            ),
            CalibError::MissingLookupTable(module) => format!(
                "What happened: Module {module} has no lookup table.\nLikely causes: The module is not an FEI4 module.\nHow to fix: Use the fit-based conversions for this module."
            ),
            CalibError::Parse(pe) => describe_parse(pe),
            other => format!(
                "What happened: {other}.\nLikely causes: Records and layout disagree.\nHow to fix: Re-run with --log-level=debug for per-module detail."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<toml::de::Error>() {
        return format!(
            "What happened: The config file is not valid TOML for this tool.\nDetail: {}\nHow to fix: Compare with etc/pixcal.toml.",
            te.message()
        );
    }

    let msg = err.to_string();
    let lower = format!("{err:#}").to_ascii_lowercase();

    // Layout CSV header special-case
    if lower.contains("layout csv must have headers") {
        return "Invalid headers in layout CSV. Expected 'hash,barrel_ec,layer,technology,circuits,dbm'.".to_string();
    }

    if lower.contains("invalid configuration") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid ({cause}).\nLikely causes: Missing region for a module, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if err.downcast_ref::<serde_json::Error>().is_some() {
        return format!(
            "What happened: Records file could not be parsed ({}).\nLikely causes: Not a {{\"records\": [...]}} document.\nHow to fix: Each record needs `module` and one of data, data_array, data_indexed.",
            err.root_cause()
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Cause: {msg}"
    )
}

/// Stable exit codes per failure class; clap usage errors exit with 2.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match classify(err) {
        Failure::Other => 1,
        Failure::Config => 3,
        Failure::Records => 4,
        Failure::Query => 5,
        Failure::Ingestion => 6,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let failure = classify(err);
    let mut obj = json!({ "reason": failure.name(), "message": humanize(err) });
    if let Some(ce) = err.downcast_ref::<CalibError>() {
        obj["details"] = json!({ "error": ce.to_string() });
    }
    obj.to_string()
}
