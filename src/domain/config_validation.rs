//! Configuration validation.
//!
//! Validates every config field before the pipeline runs and assembles the
//! typed [`AppConfig`].

use crate::domain::error::IndiforgeError;
use crate::domain::eval::EvalBudget;
use crate::ports::config_port::ConfigPort;
use std::path::PathBuf;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Largest window, lag or node count any config may allow.
pub const MAX_WINDOW_CEILING: usize = 1_000_000;

/// Tallest formula tree any config may allow.
pub const MAX_DEPTH_CEILING: usize = 128;

pub const MAX_FORMULA_LEN_CEILING: usize = 65_536;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub indicators_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub budget: EvalBudget,
    pub log_level: String,
}

/// Log level from `[logging] level`, `info` when unset.
pub fn log_level(config: &dyn ConfigPort) -> Result<String, IndiforgeError> {
    let level = config
        .get_string("logging", "level")
        .map(|l| l.trim().to_lowercase())
        .unwrap_or_else(|| "info".to_string());
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(IndiforgeError::ConfigInvalid {
            section: "logging".to_string(),
            key: "level".to_string(),
            reason: format!("must be one of {}", LOG_LEVELS.join(", ")),
        });
    }
    Ok(level)
}

pub fn indicators_dir(config: &dyn ConfigPort) -> Result<PathBuf, IndiforgeError> {
    config.require_string("indicators", "dir").map(PathBuf::from)
}

pub fn build_budget(config: &dyn ConfigPort) -> Result<EvalBudget, IndiforgeError> {
    let defaults = EvalBudget::default();
    Ok(EvalBudget {
        max_window: engine_limit(config, "max_window", defaults.max_window, MAX_WINDOW_CEILING)?,
        max_depth: engine_limit(config, "max_depth", defaults.max_depth, MAX_DEPTH_CEILING)?,
        max_formula_len: engine_limit(
            config,
            "max_formula_len",
            defaults.max_formula_len,
            MAX_FORMULA_LEN_CEILING,
        )?,
        max_nodes: engine_limit(config, "max_nodes", defaults.max_nodes, MAX_WINDOW_CEILING)?,
    })
}

pub fn build_app_config(config: &dyn ConfigPort) -> Result<AppConfig, IndiforgeError> {
    let indicators_dir = indicators_dir(config)?;
    let input_dir = PathBuf::from(config.require_string("data", "input_dir")?);
    let output_dir = PathBuf::from(config.require_string("data", "output_dir")?);
    if input_dir == output_dir {
        return Err(IndiforgeError::ConfigInvalid {
            section: "data".to_string(),
            key: "output_dir".to_string(),
            reason: "output_dir must differ from input_dir".to_string(),
        });
    }
    Ok(AppConfig {
        indicators_dir,
        input_dir,
        output_dir,
        budget: build_budget(config)?,
        log_level: log_level(config)?,
    })
}

fn engine_limit(
    config: &dyn ConfigPort,
    key: &str,
    default: usize,
    ceiling: usize,
) -> Result<usize, IndiforgeError> {
    let raw = match config.get_string("engine", key) {
        Some(raw) => raw,
        None => return Ok(default),
    };
    let invalid = |reason: String| IndiforgeError::ConfigInvalid {
        section: "engine".to_string(),
        key: key.to_string(),
        reason,
    };
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| invalid(format!("'{}' is not an integer", raw.trim())))?;
    match usize::try_from(value) {
        Ok(v) if (1..=ceiling).contains(&v) => Ok(v),
        _ => Err(invalid(format!("{} must be between 1 and {}", key, ceiling))),
    }
}
