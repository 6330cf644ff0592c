//! Rule parsing errors

/// Why a filter-list line could not be turned into a network rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleSyntaxError {
    #[error("empty rule")]
    Empty,

    #[error("not a network rule")]
    NotNetworkRule,

    #[error("unknown modifier `{0}`")]
    UnknownModifier(String),

    #[error("modifier `{0}` requires a value")]
    MissingValue(&'static str),

    #[error("invalid value `{value}` for modifier `{modifier}`")]
    InvalidValue { modifier: &'static str, value: String },

    #[error("modifier `{0}` is only allowed in exception rules")]
    ExceptionOnly(&'static str),

    #[error("modifiers `{0}` and `{1}` cannot be combined")]
    ConflictingModifiers(&'static str, &'static str),

    #[error("pattern matches every URL")]
    TooWide,

    #[error("rule excludes every request type")]
    EmptyTypeMask,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
}

impl From<regex::Error> for RuleSyntaxError {
    fn from(err: regex::Error) -> Self {
        Self::InvalidRegex(err.to_string())
    }
}
