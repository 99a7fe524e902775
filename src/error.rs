//! Error types for the hintcheck crate.

use thiserror::Error;

use crate::report::Violation;

/// A type alias for `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The main error type for the hintcheck crate.
///
/// Everything except [`Error::Violation`] and [`Error::Raised`] is raised at
/// decoration time, or at the first call needing a forward reference.
#[derive(Error, Debug)]
pub enum Error {
    /// A hint (or one of its children) cannot be compiled into a check.
    #[error("Unsupported type hint {hint} at {position}: {reason}")]
    HintUnsupported {
        /// Rendering of the offending sub-hint.
        hint: String,
        /// Path from the root hint to the sub-hint, e.g. `x: Union[int, ?][1]`.
        position: String,
        /// Why the hint was rejected.
        reason: String,
    },

    /// The callable's signature cannot be wrapped.
    #[error("Function {func}() parameter {param} malformed: {reason}")]
    ParamMalformed {
        /// Qualified name of the callable.
        func: String,
        /// Offending parameter name.
        param: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A hint string could not be parsed.
    #[error("Hint parse error: {0}")]
    HintParse(String),

    /// A parameter name collides with the wrapper's own names.
    #[error("Function {func}() parameter name {param:?} invalid: {reason}")]
    ParamName {
        /// Qualified name of the callable.
        func: String,
        /// Offending parameter name.
        param: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A forward reference could not be found in its module namespace.
    #[error("Forward reference {name:?} unresolvable in module {module:?}")]
    ForwardRefUnresolved {
        /// Referenced name.
        name: String,
        /// Namespace the reference was resolved against.
        module: String,
    },

    /// A call-time type violation.
    #[error(transparent)]
    Violation(Box<Violation>),

    /// The generator produced something it should not have.
    #[error("Internal error: {reason}\n{source_text}")]
    Internal {
        /// Which invariant broke.
        reason: String,
        /// Offending generated source, if any.
        source_text: String,
    },

    /// An error returned by the wrapped callable itself.
    #[error("{0}")]
    Raised(String),
}

impl Error {
    /// Creates a new unsupported-hint error.
    pub fn hint_unsupported(
        hint: impl Into<String>,
        position: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::HintUnsupported {
            hint: hint.into(),
            position: position.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new hint parse error.
    pub fn hint_parse(msg: impl Into<String>) -> Self {
        Self::HintParse(msg.into())
    }

    /// Creates a new malformed-parameter error.
    pub fn param_malformed(
        func: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParamMalformed { func: func.into(), param: param.into(), reason: reason.into() }
    }

    /// Creates a new parameter-name error.
    pub fn param_name(
        func: impl Into<String>,
        param: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ParamName { func: func.into(), param: param.into(), reason: reason.into() }
    }

    /// Creates a new internal error carrying the offending source text.
    pub fn internal(reason: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self::Internal { reason: reason.into(), source_text: source_text.into() }
    }

    /// Returns the violation record if this is a call-time violation.
    pub fn as_violation(&self) -> Option<&Violation> {
        match self {
            Self::Violation(v) => Some(v),
            _ => None,
        }
    }

    /// Whether this error is raised at decoration time.
    pub fn is_decoration_error(&self) -> bool {
        matches!(
            self,
            Self::HintUnsupported { .. }
                | Self::HintParse(_)
                | Self::ParamMalformed { .. }
                | Self::ParamName { .. }
        )
    }
}

impl From<Violation> for Error {
    fn from(v: Violation) -> Self {
        Self::Violation(Box::new(v))
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Self::Raised(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Self::Raised(s)
    }
}

/// A non-fatal diagnostic emitted while decorating.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct HintWarning {
    /// Rendering of the hint the warning is about.
    pub hint: String,
    /// Human-readable message.
    pub message: String,
}

impl std::fmt::Display for HintWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.hint, self.message)
    }
}
