//! Argument model shared by the parser and the specification codec.

use indexmap::IndexSet;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error returned when a type name is not one of the supported value types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown value type: {0}")]
pub struct UnknownValueType(pub String);

/// The conversion a supplied value must survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Signed 32-bit integer
    #[serde(alias = "integer")]
    Int,
    /// Single precision float
    Float,
    /// `true` or `false` (any case)
    #[serde(alias = "bool")]
    Boolean,
    /// Any string
    String,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::String => "string",
        }
    }

    /// Whether `value` converts cleanly to this type.
    pub fn accepts(&self, value: &str) -> bool {
        match self {
            ValueType::Int => value.parse::<i32>().is_ok(),
            // Decimal or exponent notation only; `inf` and `NaN` spellings are rejected.
            ValueType::Float => {
                value
                    .chars()
                    .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'))
                    && value.parse::<f32>().is_ok()
            }
            ValueType::Boolean => {
                value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false")
            }
            ValueType::String => true,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = UnknownValueType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(ValueType::Int),
            "float" => Ok(ValueType::Float),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "string" => Ok(ValueType::String),
            _ => Err(UnknownValueType(s.to_string())),
        }
    }
}

/// Option semantics carried only by named arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedOptions {
    /// Required arguments have no default and start out unset.
    pub required: bool,
    /// The declared default, kept even after the live value changes.
    pub default: Option<String>,
    /// Single-character aliases, reachable as `-c`.
    pub nicknames: IndexSet<char>,
    /// Canonical names of arguments this one may not be combined with.
    pub mutually_exclusive_with: IndexSet<String>,
}

/// Whether an argument is matched by position or by `--name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Positional,
    Named(NamedOptions),
}

/// One declared argument and the values collected for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentSpec {
    name: String,
    value_type: Option<ValueType>,
    description: String,
    accepted: IndexSet<String>,
    arity: usize,
    values: Vec<String>,
    kind: Kind,
}

/// Prefix a named argument's name with `--` unless it already carries dashes.
pub fn long_name(name: &str) -> String {
    if name.starts_with('-') {
        name.to_string()
    } else {
        format!("--{}", name)
    }
}

impl ArgumentSpec {
    fn new(name: String, kind: Kind) -> Self {
        Self {
            name,
            value_type: None,
            description: String::new(),
            accepted: IndexSet::new(),
            arity: 1,
            values: Vec::new(),
            kind,
        }
    }

    /// A positional argument, filled by slot order.
    pub fn positional(name: impl Into<String>) -> Self {
        Self::new(name.into(), Kind::Positional)
    }

    /// A named argument with no default; parsing fails unless it is supplied.
    pub fn required(name: &str) -> Self {
        Self::new(
            long_name(name),
            Kind::Named(NamedOptions {
                required: true,
                ..NamedOptions::default()
            }),
        )
    }

    /// A named argument that falls back to `default` when not supplied.
    pub fn optional(name: &str, default: impl Into<String>) -> Self {
        let default = default.into();
        let mut spec = Self::new(
            long_name(name),
            Kind::Named(NamedOptions {
                required: false,
                default: Some(default.clone()),
                ..NamedOptions::default()
            }),
        );
        spec.values.push(default);
        spec
    }

    /// A boolean named argument defaulting to `false`.
    pub fn flag(name: &str) -> Self {
        Self::optional(name, "false").with_type(ValueType::Boolean)
    }

    pub fn with_type(mut self, value_type: ValueType) -> Self {
        self.value_type = Some(value_type);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_accepted<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accepted.extend(values.into_iter().map(Into::into));
        self
    }

    /// Number of consecutive tokens the argument consumes.
    pub fn with_arity(mut self, arity: usize) -> Self {
        self.arity = arity;
        self.values.truncate(arity);
        self
    }

    /// Add short aliases. Ignored for positional arguments.
    pub fn with_nicknames(mut self, nicknames: impl IntoIterator<Item = char>) -> Self {
        if let Kind::Named(ref mut options) = self.kind {
            options.nicknames.extend(nicknames);
        }
        self
    }

    /// Record a mutual exclusion edge towards `other`; the parser adds the
    /// reverse edge when both are declared. Ignored for positional arguments.
    pub fn with_mutex(mut self, other: &str) -> Self {
        if let Kind::Named(ref mut options) = self.kind {
            options.mutually_exclusive_with.insert(long_name(other));
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> Option<ValueType> {
        self.value_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn accepted(&self) -> &IndexSet<String> {
        &self.accepted
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn named(&self) -> Option<&NamedOptions> {
        match &self.kind {
            Kind::Named(options) => Some(options),
            Kind::Positional => None,
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.kind, Kind::Positional)
    }

    pub fn is_boolean(&self) -> bool {
        self.value_type == Some(ValueType::Boolean)
    }

    pub fn is_required(&self) -> bool {
        self.named().map_or(true, |options| options.required)
    }

    pub fn is_mutually_exclusive_with(&self, other: &str) -> bool {
        self.named()
            .is_some_and(|options| options.mutually_exclusive_with.contains(other))
    }

    /// The first collected value, `None` while unset.
    pub fn value(&self) -> Option<&str> {
        self.values.first().map(String::as_str)
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub(crate) fn set_type(&mut self, value_type: ValueType) {
        self.value_type = Some(value_type);
    }

    pub(crate) fn set_description(&mut self, description: String) {
        self.description = description;
    }

    pub(crate) fn set_accepted(&mut self, values: IndexSet<String>) {
        self.accepted = values;
    }

    pub(crate) fn options_mut(&mut self) -> Option<&mut NamedOptions> {
        match &mut self.kind {
            Kind::Named(options) => Some(options),
            Kind::Positional => None,
        }
    }

    /// Drop collected values back to the declared default.
    pub(crate) fn reset(&mut self) {
        self.values.clear();
        if let Kind::Named(NamedOptions {
            default: Some(default),
            ..
        }) = &self.kind
        {
            self.values.push(default.clone());
        }
    }

    pub(crate) fn assign(&mut self, mut values: Vec<String>) {
        values.truncate(self.arity);
        self.values = values;
    }
}

impl From<&str> for ArgumentSpec {
    fn from(name: &str) -> Self {
        ArgumentSpec::positional(name)
    }
}

impl From<String> for ArgumentSpec {
    fn from(name: String) -> Self {
        ArgumentSpec::positional(name)
    }
}
