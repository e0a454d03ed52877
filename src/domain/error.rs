//! Domain error types.

/// A parse error with position information for formula parsing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl ParseError {
    /// Format the error with a caret pointing at the error position in the input.
    pub fn display_with_context(&self, input: &str) -> String {
        let caret = " ".repeat(self.position) + "^";
        format!(
            "{input}\n{caret}\n{err}",
            input = input,
            caret = caret,
            err = self
        )
    }
}

/// Failure while evaluating a single indicator formula.
///
/// These never escape a set evaluation: the engine logs them and omits the
/// indicator's column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("variable '{0}' is not bound to any data")]
    UnboundVariable(String),

    #[error("'{0}' is not a function")]
    NotAFunction(String),

    #[error("function '{0}' used as a value")]
    NotAValue(String),

    #[error("{name} expects {expected} argument(s), found {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("invalid argument to {name}: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("evaluation budget exceeded: {reason}")]
    BudgetExceeded { reason: String },

    #[error("result contains non-finite values (first at row {row})")]
    NonFinite { row: usize },
}

/// Top-level error type for indiforge.
#[derive(Debug, thiserror::Error)]
pub enum IndiforgeError {
    #[error("failed to parse indicator set {path}: {reason}")]
    DefinitionParse { path: String, reason: String },

    #[error("invalid indicator set '{set_name}': {reason}")]
    DefinitionInvalid { set_name: String, reason: String },

    #[error("indicator set '{0}' is not loaded")]
    SetNotLoaded(String),

    #[error("input table is missing required column '{0}'")]
    MissingColumn(String),

    #[error("column '{name}' has {found} rows, table has {expected}")]
    ColumnLength {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&IndiforgeError> for std::process::ExitCode {
    fn from(err: &IndiforgeError) -> Self {
        let code: u8 = match err {
            IndiforgeError::Io(_) => 1,
            IndiforgeError::ConfigParse { .. }
            | IndiforgeError::ConfigMissing { .. }
            | IndiforgeError::ConfigInvalid { .. } => 2,
            IndiforgeError::Data { .. } | IndiforgeError::ColumnLength { .. } => 3,
            IndiforgeError::DefinitionParse { .. }
            | IndiforgeError::DefinitionInvalid { .. }
            | IndiforgeError::Json(_) => 4,
            IndiforgeError::SetNotLoaded(_) | IndiforgeError::MissingColumn(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
