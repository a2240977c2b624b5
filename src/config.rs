//! JSON declaration format for building a parser without writing Rust.

use crate::argument::{long_name, ArgumentSpec, ValueType};
use crate::parser::{ArgumentParser, DeclareError};
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;

/// Errors that can occur during config parsing and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON config: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("duplicate argument name: {0}")]
    DuplicateName(String),

    #[error("argument name '{0}' is reserved for help")]
    ReservedName(String),

    #[error("invalid short option '{0}': must be a single ASCII letter or digit other than 'h'")]
    InvalidShortOption(char),

    #[error("short option '-{0}' is used more than once")]
    DuplicateShortOption(char),

    #[error("'values' on argument '{0}' must be at least 1")]
    ZeroValues(String),

    #[error("'accepted' on argument '{0}' is empty: must have at least one value")]
    EmptyAccepted(String),

    #[error("'accepted' on argument '{0}' has duplicate value: {1}")]
    DuplicateAccepted(String, String),

    #[error("argument '{0}' is mutually exclusive with undeclared argument '{1}'")]
    UnknownMutex(String, String),

    #[error("failed to declare argument: {0}")]
    Declare(#[from] DeclareError),
}

fn default_values() -> usize {
    1
}

/// A positional argument entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionalConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
    pub description: Option<String>,
    pub accepted: Option<Vec<String>>,
    /// Number of consecutive tokens consumed
    #[serde(default = "default_values")]
    pub values: usize,
}

/// A named (`--name`) argument entry.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedConfig {
    /// Long name, with or without the leading `--`
    pub name: String,
    #[serde(default)]
    pub short: Vec<char>,
    #[serde(rename = "type")]
    pub value_type: Option<ValueType>,
    pub description: Option<String>,
    /// Default value; the argument is required when absent
    pub default: Option<String>,
    pub accepted: Option<Vec<String>>,
    /// Names of mutually exclusive named arguments
    #[serde(default)]
    pub mutex: Vec<String>,
    #[serde(default = "default_values")]
    pub values: usize,
}

/// Top-level declaration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Program name shown in usage and error lines
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub positionals: Vec<PositionalConfig>,
    #[serde(default)]
    pub named: Vec<NamedConfig>,
    /// Short-only boolean flags, one per character (e.g. "as")
    #[serde(default)]
    pub flags: String,
}

impl Config {
    /// Parse a JSON string into a Config.
    pub fn from_json(json: &str) -> Result<Config, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut names = HashSet::new();
        let mut shorts = HashSet::new();

        for arg in &self.positionals {
            if arg.name == "-h" || arg.name == "--help" {
                return Err(ConfigError::ReservedName(arg.name.clone()));
            }
            if !names.insert(arg.name.clone()) {
                return Err(ConfigError::DuplicateName(arg.name.clone()));
            }
            validate_values(&arg.name, arg.values)?;
            validate_accepted(&arg.name, arg.accepted.as_deref())?;
        }

        let named: HashSet<String> = self.named.iter().map(|arg| long_name(&arg.name)).collect();
        for arg in &self.named {
            let name = long_name(&arg.name);
            if name == "--help" {
                return Err(ConfigError::ReservedName(name));
            }
            if !names.insert(name.clone()) {
                return Err(ConfigError::DuplicateName(name));
            }
            for &short in &arg.short {
                validate_short(short, &mut shorts)?;
            }
            validate_values(&name, arg.values)?;
            validate_accepted(&name, arg.accepted.as_deref())?;
            for other in &arg.mutex {
                if !named.contains(&long_name(other)) {
                    return Err(ConfigError::UnknownMutex(name, other.clone()));
                }
            }
        }

        for short in self.flags.trim_start_matches('-').chars() {
            validate_short(short, &mut shorts)?;
        }

        Ok(())
    }

    /// Build a parser holding every declared argument.
    pub fn build(&self) -> Result<ArgumentParser, ConfigError> {
        self.validate()?;

        let mut parser = ArgumentParser::new(self.name.clone());
        if let Some(ref description) = self.description {
            parser.set_program_description(description.clone());
        }

        for arg in &self.positionals {
            let spec = decorate(
                ArgumentSpec::positional(arg.name.clone()),
                arg.value_type,
                arg.description.as_deref(),
                arg.accepted.as_deref(),
                arg.values,
            );
            parser.declare_positional(spec)?;
        }

        for arg in &self.named {
            let spec = match arg.default {
                Some(ref default) => ArgumentSpec::optional(&arg.name, default.clone()),
                None => ArgumentSpec::required(&arg.name),
            };
            let spec = decorate(
                spec,
                arg.value_type,
                arg.description.as_deref(),
                arg.accepted.as_deref(),
                arg.values,
            )
            .with_nicknames(arg.short.iter().copied());
            parser.declare_named(spec, "")?;
        }

        for arg in &self.named {
            for other in &arg.mutex {
                parser.set_mutually_exclusive(&arg.name, other)?;
            }
        }

        if !self.flags.is_empty() {
            parser.declare_flags(&self.flags)?;
        }

        Ok(parser)
    }
}

fn decorate(
    spec: ArgumentSpec,
    value_type: Option<ValueType>,
    description: Option<&str>,
    accepted: Option<&[String]>,
    values: usize,
) -> ArgumentSpec {
    let mut spec = spec.with_arity(values);
    if let Some(value_type) = value_type {
        spec = spec.with_type(value_type);
    }
    if let Some(description) = description {
        spec = spec.with_description(description);
    }
    if let Some(accepted) = accepted {
        spec = spec.with_accepted(accepted.iter().cloned());
    }
    spec
}

fn validate_short(short: char, seen: &mut HashSet<char>) -> Result<(), ConfigError> {
    if short == 'h' || !short.is_ascii_alphanumeric() {
        return Err(ConfigError::InvalidShortOption(short));
    }
    if !seen.insert(short) {
        return Err(ConfigError::DuplicateShortOption(short));
    }
    Ok(())
}

fn validate_values(name: &str, values: usize) -> Result<(), ConfigError> {
    if values == 0 {
        return Err(ConfigError::ZeroValues(name.to_string()));
    }
    Ok(())
}

fn validate_accepted(name: &str, accepted: Option<&[String]>) -> Result<(), ConfigError> {
    if let Some(accepted) = accepted {
        if accepted.is_empty() {
            return Err(ConfigError::EmptyAccepted(name.to_string()));
        }
        let mut seen = HashSet::new();
        for value in accepted {
            if !seen.insert(value) {
                return Err(ConfigError::DuplicateAccepted(
                    name.to_string(),
                    value.clone(),
                ));
            }
        }
    }
    Ok(())
}
