//! Core domain types and logic.

pub mod builtins;
pub mod config_validation;
pub mod context;
pub mod definition;
pub mod engine;
pub mod error;
pub mod eval;
pub mod formula;
pub mod formula_parser;
pub mod manager;
pub mod normalizer;
pub mod ohlcv;
pub mod table;
pub mod value;
