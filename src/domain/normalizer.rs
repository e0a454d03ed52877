//! Shorthand formula normalization and set authoring.
//!
//! Authors write `MA(C, 5) - REF(C, 1)`; documents store
//! `MA(CLOSE, 5) - REF(CLOSE, 1)`. Only whole tokens are rewritten, so the `C`
//! in `CCI` or `MACD` is left alone.

use crate::domain::builtins::BuiltinTable;
use crate::domain::definition::{IndicatorDefinition, IndicatorSet};
use crate::domain::error::IndiforgeError;
use std::fs;
use std::path::Path;
use tracing::info;

/// Shorthand aliases and the canonical series they stand for.
pub const VARIABLE_ALIASES: [(&str, &str); 5] = [
    ("C", "CLOSE"),
    ("H", "HIGH"),
    ("L", "LOW"),
    ("O", "OPEN"),
    ("V", "VOL"),
];

fn canonical(token: &str) -> &str {
    VARIABLE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == token)
        .map(|(_, name)| *name)
        .unwrap_or(token)
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Trim, upper-case and expand whole-token aliases.
pub fn normalize_formula(formula: &str) -> String {
    let upper = formula.trim().to_uppercase();
    let mut out = String::with_capacity(upper.len() + 16);
    let mut rest = upper.as_str();
    while let Some(c) = rest.chars().next() {
        if is_token_char(c) {
            let end = rest.find(|c: char| !is_token_char(c)).unwrap_or(rest.len());
            out.push_str(canonical(&rest[..end]));
            rest = &rest[end..];
        } else {
            out.push(c);
            rest = &rest[c.len_utf8()..];
        }
    }
    out
}

/// Build a validated set from `(name, formula)` pairs.
///
/// Names are trimmed and upper-cased, formulas normalized.
pub fn build_indicator_set<N, F>(
    set_name: &str,
    indicators: &[(N, F)],
    builtins: &BuiltinTable,
) -> Result<IndicatorSet, IndiforgeError>
where
    N: AsRef<str>,
    F: AsRef<str>,
{
    let set = IndicatorSet {
        set_name: set_name.trim().to_string(),
        indicators: indicators
            .iter()
            .map(|(name, formula)| {
                IndicatorDefinition::new(
                    name.as_ref().trim().to_uppercase(),
                    "",
                    normalize_formula(formula.as_ref()),
                )
            })
            .collect(),
    };
    set.validate(builtins)?;
    Ok(set)
}

/// Build a set and write it as a pretty-printed document to `out_path`.
///
/// Nothing is written when the set does not validate.
pub fn formulas_to_json<N, F>(
    set_name: &str,
    indicators: &[(N, F)],
    out_path: &Path,
    builtins: &BuiltinTable,
) -> Result<IndicatorSet, IndiforgeError>
where
    N: AsRef<str>,
    F: AsRef<str>,
{
    let set = build_indicator_set(set_name, indicators, builtins)?;
    let json = set.to_json_pretty()?;
    if let Some(parent) = out_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(out_path, json)?;
    info!(
        "Normalizer: wrote set '{}' ({} indicators) to {}",
        set.set_name,
        set.indicators.len(),
        out_path.display()
    );
    Ok(set)
}
