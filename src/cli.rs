//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::builtins::BuiltinTable;
use crate::domain::config_validation::{build_app_config, build_budget, indicators_dir, log_level};
use crate::domain::context::is_market_series;
use crate::domain::definition::IndicatorSet;
use crate::domain::engine::IndicatorEngine;
use crate::domain::error::IndiforgeError;
use crate::domain::eval::EvalBudget;
use crate::domain::manager::IndicatorManager;
use crate::domain::normalizer::formulas_to_json;
use crate::logging::init_logging;
use crate::ports::config_port::ConfigPort;
use crate::ports::table_port::TablePort;

#[derive(Parser, Debug)]
#[command(name = "indiforge", about = "Indicator formula engine for OHLCV tables")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply every indicator set to the raw tables and write enriched tables
    Apply {
        #[arg(short, long)]
        config: PathBuf,
        /// Only process this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List the indicator sets that load from the definitions directory
    List {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate an indicator-set document and parse its formulas
    Check {
        #[arg(long)]
        set: PathBuf,
        /// Read engine limits from this config
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Write an indicator-set document from shorthand formulas
    Author {
        #[arg(long)]
        name: String,
        /// NAME=EXPR, repeatable; shorthand C/H/L/O/V is expanded
        #[arg(long = "formula", required = true)]
        formulas: Vec<String>,
        #[arg(short, long)]
        out: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Apply { config, symbol } => run_apply(&config, symbol.as_deref()),
        Command::List { config } => run_list(&config),
        Command::Check { set, config } => run_check(&set, config.as_deref()),
        Command::Author {
            name,
            formulas,
            out,
        } => run_author(&name, &formulas, &out),
    }
}

fn report(err: &IndiforgeError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| report(&e))
}

/// Engine and manager over the configured definitions directory, with every
/// set loaded.
pub fn build_manager(config: &dyn ConfigPort) -> Result<IndicatorManager, IndiforgeError> {
    let engine = IndicatorEngine::with_budget(
        Arc::new(BuiltinTable::standard()),
        build_budget(config)?,
    );
    let mut manager = IndicatorManager::new(indicators_dir(config)?, engine)?;
    manager.load_all_sets()?;
    Ok(manager)
}

/// Outcome of applying indicators to a batch of symbols.
#[derive(Debug, Default)]
pub struct ApplySummary {
    pub written: Vec<String>,
    pub failed: Vec<(String, IndiforgeError)>,
}

/// Read each symbol from `source`, apply every loaded set, write to `sink`.
///
/// A failing symbol is logged and recorded; the rest still run.
pub fn apply_indicators(
    manager: &IndicatorManager,
    source: &dyn TablePort,
    sink: &dyn TablePort,
    symbols: &[String],
) -> ApplySummary {
    let mut summary = ApplySummary::default();
    for symbol in symbols {
        let result = source
            .read_table(symbol)
            .and_then(|table| manager.calculate(&table))
            .and_then(|enriched| sink.write_table(symbol, &enriched));
        match result {
            Ok(()) => {
                info!("Apply: {} written", symbol);
                summary.written.push(symbol.clone());
            }
            Err(e) => {
                error!("Apply: {} failed: {}", symbol, e);
                summary.failed.push((symbol.clone(), e));
            }
        }
    }
    summary
}

fn run_apply(config_path: &Path, symbol: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let app = match build_app_config(&adapter) {
        Ok(app) => app,
        Err(e) => return report(&e),
    };
    init_logging(&app.log_level);

    let manager = match build_manager(&adapter) {
        Ok(m) => m,
        Err(e) => return report(&e),
    };
    let source = CsvAdapter::new(app.input_dir.clone());
    let sink = CsvAdapter::new(app.output_dir.clone());

    let symbols = match symbol {
        Some(s) => vec![s.to_string()],
        None => match source.list_symbols() {
            Ok(symbols) => symbols,
            Err(e) => return report(&e),
        },
    };
    eprintln!(
        "Applying {} set(s) to {} symbol(s)...",
        manager.list_sets().len(),
        symbols.len()
    );

    let summary = apply_indicators(&manager, &source, &sink, &symbols);
    eprintln!(
        "{} written to {}, {} failed",
        summary.written.len(),
        app.output_dir.display(),
        summary.failed.len()
    );
    match summary.failed.first() {
        Some((_, e)) => e.into(),
        None => ExitCode::SUCCESS,
    }
}

fn run_list(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    match log_level(&adapter) {
        Ok(level) => init_logging(&level),
        Err(e) => return report(&e),
    }
    let manager = match build_manager(&adapter) {
        Ok(m) => m,
        Err(e) => return report(&e),
    };
    for name in manager.list_sets() {
        let count = manager
            .engine()
            .indicator_set(&name)
            .map_or(0, |s| s.indicators.len());
        println!("{}\t{} indicator(s)", name, count);
    }
    ExitCode::SUCCESS
}

/// Outcome of checking one document.
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub parse_failures: usize,
    /// Indicators that read names which neither the builtins, the market
    /// aliases nor an earlier indicator of the set define. These resolve only
    /// if another set or an extra input column supplies them.
    pub unresolved: Vec<(String, Vec<String>)>,
}

pub fn check_set(
    set: &IndicatorSet,
    engine: &IndicatorEngine,
) -> Result<CheckSummary, IndiforgeError> {
    set.validate(engine.builtins())?;
    let mut summary = CheckSummary::default();
    let mut defined: HashSet<&str> = HashSet::new();
    for def in &set.indicators {
        match engine.parse_formula(&def.formula) {
            Ok(expr) => {
                let unknown: Vec<String> = expr
                    .identifiers()
                    .into_iter()
                    .filter(|id| {
                        !engine.builtins().contains(id)
                            && !is_market_series(id)
                            && !defined.contains(id.as_str())
                    })
                    .collect();
                if unknown.is_empty() {
                    println!("ok    {} = {}", def.name, expr);
                } else {
                    println!(
                        "warn  {} = {}  (undefined here: {})",
                        def.name,
                        expr,
                        unknown.join(", ")
                    );
                    summary.unresolved.push((def.name.clone(), unknown));
                }
            }
            Err(e) => {
                summary.parse_failures += 1;
                println!(
                    "error {}:\n{}",
                    def.name,
                    e.display_with_context(&def.formula)
                );
            }
        }
        defined.insert(def.name.as_str());
    }
    Ok(summary)
}

fn run_check(set_path: &Path, config_path: Option<&Path>) -> ExitCode {
    init_logging("warn");
    let budget = match config_path {
        Some(path) => {
            let adapter = match load_config(path) {
                Ok(a) => a,
                Err(code) => return code,
            };
            match build_budget(&adapter) {
                Ok(b) => b,
                Err(e) => return report(&e),
            }
        }
        None => EvalBudget::default(),
    };
    let engine = IndicatorEngine::with_budget(Arc::new(BuiltinTable::standard()), budget);

    let text = match fs::read_to_string(set_path) {
        Ok(t) => t,
        Err(e) => return report(&IndiforgeError::Io(e)),
    };
    let set = match IndicatorSet::from_json(&text) {
        Ok(s) => s,
        Err(e) => {
            return report(&IndiforgeError::DefinitionParse {
                path: set_path.display().to_string(),
                reason: e.to_string(),
            });
        }
    };
    match check_set(&set, &engine) {
        Ok(summary) if summary.parse_failures == 0 => {
            eprintln!(
                "{}: {} indicator(s) parse, {} read names from outside the set",
                set.set_name,
                set.indicators.len(),
                summary.unresolved.len()
            );
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            eprintln!(
                "{}: {} formula(s) failed to parse",
                set.set_name, summary.parse_failures
            );
            ExitCode::from(4)
        }
        Err(e) => report(&e),
    }
}

/// Split `NAME=EXPR` arguments into pairs.
pub fn parse_formula_args(args: &[String]) -> Result<Vec<(String, String)>, IndiforgeError> {
    args.iter()
        .map(|arg| match arg.split_once('=') {
            Some((name, formula)) if !name.trim().is_empty() => {
                Ok((name.trim().to_string(), formula.to_string()))
            }
            _ => Err(IndiforgeError::DefinitionInvalid {
                set_name: String::new(),
                reason: format!("expected NAME=EXPR, got '{}'", arg),
            }),
        })
        .collect()
}

fn run_author(name: &str, formulas: &[String], out: &Path) -> ExitCode {
    init_logging("info");
    let pairs = match parse_formula_args(formulas) {
        Ok(p) => p,
        Err(e) => return report(&e),
    };
    match formulas_to_json(name, pairs.as_slice(), out, &BuiltinTable::standard()) {
        Ok(set) => {
            eprintln!(
                "Wrote {} indicator(s) to {}",
                set.indicators.len(),
                out.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => report(&e),
    }
}
