//! The parser engine: argument registry, declaration API and token parsing.

use crate::argument::{long_name, ArgumentSpec, Kind, ValueType};
use crate::help::{generate_help, generate_usage};
use indexmap::{IndexMap, IndexSet};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::{debug, trace};

/// Tokens that always request help and can never be declared.
const HELP_TOKENS: [&str; 2] = ["-h", "--help"];
const HELP_NICKNAME: char = 'h';

/// Errors raised while declaring arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclareError {
    #[error("argument name must not be empty")]
    EmptyName,

    #[error("'{0}' is reserved for help")]
    Reserved(String),

    #[error("argument already declared: {0}")]
    Duplicate(String),

    #[error("invalid short option '{0}': must be a single ASCII letter or digit")]
    InvalidNickname(char),

    #[error("unknown argument: {0}")]
    Unknown(String),

    #[error("'{0}' cannot be declared as a positional argument")]
    NotPositional(String),

    #[error("'{0}' is not a named argument")]
    NotNamed(String),

    #[error("argument {0}: number of values must be at least 1")]
    ZeroArity(String),
}

/// Classification of a failed parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unrecognized arguments: {0}")]
    UnrecognizedArgument(String),

    #[error("the following arguments are required: {0}")]
    MissingRequiredArgument(String),

    #[error("argument {name}: invalid {value_type} value: {value}")]
    InvalidType {
        name: String,
        value_type: ValueType,
        value: String,
    },

    #[error("argument {name}: unaccepted value: {value}")]
    UnacceptedValue { name: String, value: String },

    #[error("argument {name}: expected {expected} value(s), found {found}")]
    NotEnoughValues {
        name: String,
        expected: usize,
        found: usize,
    },

    #[error("the following arguments are mutually exclusive: {first} and {second}")]
    MutuallyExclusiveConflict { first: String, second: String },
}

/// A failed parse, rendered argparse-style.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{usage}\n{program}: error: {kind}")]
pub struct ParseError {
    usage: String,
    program: String,
    kind: ErrorKind,
}

impl ParseError {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn usage(&self) -> &str {
        &self.usage
    }
}

/// Outcome of a successful call to [`ArgumentParser::parse`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// Every token was consumed and values were committed.
    Parsed,
    /// `-h` or `--help` was seen; carries the rendered help text.
    Help(String),
}

/// Result of parsing (values are read back from the parser).
pub type ParseResult = Result<ParseOutcome, ParseError>;

/// Values gathered during one parse, committed only when every check passes.
#[derive(Debug, Default)]
struct Staged {
    values: HashMap<String, Vec<String>>,
    encountered_named: IndexSet<String>,
    filled_positionals: usize,
}

enum Step {
    Done(Staged),
    Help,
}

/// Owns the declared arguments and parses command lines against them.
#[derive(Debug, Clone)]
pub struct ArgumentParser {
    program_name: String,
    program_description: String,
    arguments: IndexMap<String, ArgumentSpec>,
    positional_order: Vec<String>,
    named_order: Vec<String>,
    flag_order: Vec<String>,
    nicknames: HashMap<char, String>,
}

impl ArgumentParser {
    pub fn new(program_name: impl Into<String>) -> Self {
        Self {
            program_name: program_name.into(),
            program_description: String::new(),
            arguments: IndexMap::new(),
            positional_order: Vec::new(),
            named_order: Vec::new(),
            flag_order: Vec::new(),
            nicknames: HashMap::new(),
        }
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn set_program_name(&mut self, name: impl Into<String>) {
        self.program_name = name.into();
    }

    pub fn program_description(&self) -> &str {
        &self.program_description
    }

    pub fn set_program_description(&mut self, description: impl Into<String>) {
        self.program_description = description.into();
    }

    /// Declare a positional argument. Slots are filled in declaration order.
    pub fn declare_positional(&mut self, arg: impl Into<ArgumentSpec>) -> Result<(), DeclareError> {
        let arg = arg.into();
        let name = arg.name().to_string();
        if name.is_empty() {
            return Err(DeclareError::EmptyName);
        }
        if HELP_TOKENS.contains(&name.as_str()) {
            return Err(DeclareError::Reserved(name));
        }
        if !arg.is_positional() || name.starts_with('-') {
            return Err(DeclareError::NotPositional(name));
        }
        if arg.arity() == 0 {
            return Err(DeclareError::ZeroArity(name));
        }
        if self.arguments.contains_key(&name) {
            return Err(DeclareError::Duplicate(name));
        }

        debug!(name = %name, arity = arg.arity(), "declared positional argument");
        self.positional_order.push(name.clone());
        self.arguments.insert(name, arg);
        Ok(())
    }

    /// Declare every name in `names` as an untyped positional argument.
    pub fn declare_positionals<I, S>(&mut self, names: I) -> Result<(), DeclareError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.declare_positional(ArgumentSpec::positional(name))?;
        }
        Ok(())
    }

    /// Declare a named argument, registering its nicknames plus those in
    /// `nicknames` (a leading `-` is ignored, so `"-t"` and `"t"` are equal).
    pub fn declare_named(&mut self, arg: ArgumentSpec, nicknames: &str) -> Result<(), DeclareError> {
        let name = arg.name().to_string();
        if name.trim_start_matches('-').is_empty() {
            return Err(DeclareError::EmptyName);
        }
        if HELP_TOKENS.contains(&name.as_str()) {
            return Err(DeclareError::Reserved(name));
        }
        if !name.starts_with("--") || arg.is_positional() {
            return Err(DeclareError::NotNamed(name));
        }
        if arg.arity() == 0 {
            return Err(DeclareError::ZeroArity(name));
        }
        if self.arguments.contains_key(&name) {
            return Err(DeclareError::Duplicate(name));
        }

        let mut shorts: IndexSet<char> = arg
            .named()
            .map(|options| options.nicknames.clone())
            .unwrap_or_default();
        shorts.extend(nicknames.trim_start_matches('-').chars());
        for &short in &shorts {
            self.check_short_free(short)?;
        }

        let mut arg = arg;
        if let Some(options) = arg.options_mut() {
            options.nicknames = shorts.clone();
        }
        for short in shorts {
            self.nicknames.insert(short, name.clone());
        }

        debug!(name = %name, "declared named argument");
        self.named_order.push(name.clone());
        self.arguments.insert(name.clone(), arg);
        self.link_mutex(&name);
        Ok(())
    }

    /// Make every mutual exclusion edge touching `name` two-way, whichever
    /// side was declared first.
    fn link_mutex(&mut self, name: &str) {
        let partners: Vec<String> = self
            .arguments
            .get(name)
            .and_then(ArgumentSpec::named)
            .map(|options| options.mutually_exclusive_with.iter().cloned().collect())
            .unwrap_or_default();
        for partner in partners.iter().filter(|partner| partner.as_str() != name) {
            if let Some(options) = self.arguments.get_mut(partner).and_then(ArgumentSpec::options_mut) {
                options.mutually_exclusive_with.insert(name.to_string());
            }
        }

        let referrers: Vec<String> = self
            .arguments
            .iter()
            .filter(|(key, arg)| key.as_str() != name && arg.is_mutually_exclusive_with(name))
            .map(|(key, _)| key.clone())
            .collect();
        if let Some(options) = self.arguments.get_mut(name).and_then(ArgumentSpec::options_mut) {
            options.mutually_exclusive_with.extend(referrers);
        }
    }

    /// Declare one short-only boolean flag per character, each defaulting to `false`.
    pub fn declare_flags(&mut self, flags: &str) -> Result<(), DeclareError> {
        let chars: Vec<char> = flags.trim_start_matches('-').chars().collect();
        let mut seen = IndexSet::new();
        for &c in &chars {
            self.check_short_free(c)?;
            if !seen.insert(c) {
                return Err(DeclareError::Duplicate(format!("-{}", c)));
            }
        }

        for c in chars {
            let name = format!("-{}", c);
            debug!(name = %name, "declared flag");
            self.flag_order.push(name.clone());
            self.arguments
                .insert(name.clone(), ArgumentSpec::flag(&name));
            self.link_mutex(&name);
        }
        Ok(())
    }

    fn check_short_free(&self, short: char) -> Result<(), DeclareError> {
        if short == HELP_NICKNAME {
            return Err(DeclareError::Reserved(format!("-{}", short)));
        }
        if !short.is_ascii_alphanumeric() {
            return Err(DeclareError::InvalidNickname(short));
        }
        let key = format!("-{}", short);
        if self.nicknames.contains_key(&short) || self.arguments.contains_key(&key) {
            return Err(DeclareError::Duplicate(key));
        }
        Ok(())
    }

    pub fn set_description(&mut self, name: &str, description: impl Into<String>) -> Result<(), DeclareError> {
        self.lookup_mut(name)?.set_description(description.into());
        Ok(())
    }

    pub fn set_type(&mut self, name: &str, value_type: ValueType) -> Result<(), DeclareError> {
        self.lookup_mut(name)?.set_type(value_type);
        Ok(())
    }

    pub fn set_accepted<I, S>(&mut self, name: &str, values: I) -> Result<(), DeclareError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.lookup_mut(name)?.set_accepted(values);
        Ok(())
    }

    /// Mark two named arguments as mutually exclusive, recording the edge on both.
    pub fn set_mutually_exclusive(&mut self, first: &str, second: &str) -> Result<(), DeclareError> {
        let first = self.named_key(first)?;
        let second = self.named_key(second)?;
        for (from, to) in [(&first, &second), (&second, &first)] {
            if let Some(options) = self.arguments.get_mut(from).and_then(ArgumentSpec::options_mut) {
                options.mutually_exclusive_with.insert(to.clone());
            }
        }
        Ok(())
    }

    fn named_key(&self, name: &str) -> Result<String, DeclareError> {
        let key = match self.canonical(name) {
            Some(key) => key.to_string(),
            None => long_name(name),
        };
        match self.arguments.get(&key).map(ArgumentSpec::kind) {
            Some(Kind::Named(_)) => Ok(key),
            Some(Kind::Positional) => Err(DeclareError::NotNamed(name.to_string())),
            None => Err(DeclareError::Unknown(name.to_string())),
        }
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut ArgumentSpec, DeclareError> {
        let key = self
            .canonical(name)
            .ok_or_else(|| DeclareError::Unknown(name.to_string()))?
            .to_string();
        self.arguments
            .get_mut(&key)
            .ok_or(DeclareError::Unknown(key))
    }

    /// Resolve a declared name or short alias to its registry key.
    fn canonical(&self, name: &str) -> Option<&str> {
        if let Some((key, _)) = self.arguments.get_key_value(name) {
            return Some(key.as_str());
        }
        let mut chars = name.strip_prefix('-')?.chars();
        match (chars.next(), chars.next()) {
            (Some(short), None) => self.nicknames.get(&short).map(String::as_str),
            _ => None,
        }
    }

    /// Look up an argument by name or short alias.
    pub fn get(&self, name: &str) -> Option<&ArgumentSpec> {
        self.canonical(name).and_then(|key| self.arguments.get(key))
    }

    /// Primary value of an argument, `None` while unset or undeclared.
    pub fn value(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ArgumentSpec::value)
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.get(name).map(ArgumentSpec::values)
    }

    pub fn value_type(&self, name: &str) -> Option<ValueType> {
        self.get(name).and_then(ArgumentSpec::value_type)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.get(name).map(ArgumentSpec::description)
    }

    pub fn positional_names(&self) -> &[String] {
        &self.positional_order
    }

    pub fn named_names(&self) -> &[String] {
        &self.named_order
    }

    /// Short-only flags created through [`ArgumentParser::declare_flags`].
    pub fn flag_names(&self) -> &[String] {
        &self.flag_order
    }

    /// Every declared argument in declaration order.
    pub fn arguments(&self) -> impl Iterator<Item = &ArgumentSpec> {
        self.arguments.values()
    }

    /// Parse `tokens` against the declared arguments.
    ///
    /// Values are committed only when the whole command line is valid; a
    /// failed parse leaves the previous values untouched. Every successful
    /// parse starts from the declared defaults, so a parser can be reused.
    pub fn parse<I, S>(&mut self, tokens: I) -> ParseResult
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: VecDeque<String> = tokens.into_iter().map(Into::into).collect();
        debug!(program = %self.program_name, tokens = queue.len(), "parsing arguments");

        match self.run(queue) {
            Ok(Step::Help) => Ok(ParseOutcome::Help(generate_help(self))),
            Ok(Step::Done(staged)) => {
                self.commit(staged);
                Ok(ParseOutcome::Parsed)
            }
            Err(kind) => {
                debug!(error = %kind, "parse failed");
                Err(ParseError {
                    usage: generate_usage(self),
                    program: self.program_name.clone(),
                    kind,
                })
            }
        }
    }

    fn run(&self, mut queue: VecDeque<String>) -> Result<Step, ErrorKind> {
        let mut staged = Staged::default();

        while let Some(token) = queue.pop_front() {
            if HELP_TOKENS.contains(&token.as_str()) {
                return Ok(Step::Help);
            }

            if token.starts_with("--") {
                let key = self
                    .arguments
                    .get_key_value(token.as_str())
                    .filter(|(_, arg)| !arg.is_positional())
                    .map(|(key, _)| key.as_str())
                    .ok_or_else(|| ErrorKind::UnrecognizedArgument(token.clone()))?;
                trace!(token = %token, "long option");
                self.take_named(key, &mut queue, &mut staged)?;
            } else if token.starts_with('-') && token.chars().count() > 2 {
                trace!(token = %token, "short flag cluster");
                self.take_cluster(&token, &mut staged)?;
            } else if token.starts_with('-') && token.chars().count() == 2 {
                let key = self
                    .canonical(&token)
                    .ok_or_else(|| ErrorKind::UnrecognizedArgument(token.clone()))?;
                trace!(token = %token, name = %key, "short option");
                self.take_named(key, &mut queue, &mut staged)?;
            } else {
                self.take_positional(token, &mut queue, &mut staged)?;
            }
        }

        self.check_complete(&staged)?;
        Ok(Step::Done(staged))
    }

    fn take_named(
        &self,
        key: &str,
        queue: &mut VecDeque<String>,
        staged: &mut Staged,
    ) -> Result<(), ErrorKind> {
        let arg = &self.arguments[key];
        let values = if arg.is_boolean() {
            vec!["true".to_string()]
        } else {
            let values = take_values(arg, Vec::new(), queue)?;
            for value in &values {
                check_value(arg, value)?;
            }
            values
        };
        self.stage(arg, values, staged);
        Ok(())
    }

    fn take_cluster(&self, token: &str, staged: &mut Staged) -> Result<(), ErrorKind> {
        for short in token.chars().skip(1) {
            let flag = format!("-{}", short);
            let arg = self
                .canonical(&flag)
                .and_then(|key| self.arguments.get(key))
                .filter(|arg| arg.is_boolean())
                .ok_or_else(|| ErrorKind::UnrecognizedArgument(flag.clone()))?;
            self.stage(arg, vec!["true".to_string()], staged);
        }
        Ok(())
    }

    fn take_positional(
        &self,
        token: String,
        queue: &mut VecDeque<String>,
        staged: &mut Staged,
    ) -> Result<(), ErrorKind> {
        let Some(name) = self.positional_order.get(staged.filled_positionals) else {
            return Err(ErrorKind::UnrecognizedArgument(token));
        };
        let arg = &self.arguments[name];
        let values = take_values(arg, vec![token], queue)?;
        for value in &values {
            check_value(arg, value)?;
        }
        staged.filled_positionals += 1;
        self.stage(arg, values, staged);
        Ok(())
    }

    fn stage(&self, arg: &ArgumentSpec, values: Vec<String>, staged: &mut Staged) {
        trace!(name = %arg.name(), ?values, "staged values");
        if !arg.is_positional() {
            staged.encountered_named.insert(arg.name().to_string());
        }
        staged.values.insert(arg.name().to_string(), values);
    }

    fn check_complete(&self, staged: &Staged) -> Result<(), ErrorKind> {
        if let Some(missing) = self.positional_order.get(staged.filled_positionals) {
            return Err(ErrorKind::MissingRequiredArgument(missing.clone()));
        }

        for name in &self.named_order {
            if self.arguments[name].is_required() && !staged.values.contains_key(name) {
                return Err(ErrorKind::MissingRequiredArgument(name.clone()));
            }
        }

        // Edges are two-way once declared, so checking one side is enough.
        let encountered: Vec<&String> = staged.encountered_named.iter().collect();
        for (i, current) in encountered.iter().enumerate() {
            for earlier in &encountered[..i] {
                if self.arguments[current.as_str()].is_mutually_exclusive_with(earlier) {
                    return Err(ErrorKind::MutuallyExclusiveConflict {
                        first: (*current).clone(),
                        second: (*earlier).clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn commit(&mut self, mut staged: Staged) {
        for (name, arg) in self.arguments.iter_mut() {
            arg.reset();
            if let Some(values) = staged.values.remove(name) {
                arg.assign(values);
            }
        }
    }
}

/// Pull tokens until `arg`'s arity is satisfied.
fn take_values(
    arg: &ArgumentSpec,
    mut values: Vec<String>,
    queue: &mut VecDeque<String>,
) -> Result<Vec<String>, ErrorKind> {
    while values.len() < arg.arity() {
        match queue.pop_front() {
            Some(token) => values.push(token),
            None => {
                return Err(ErrorKind::NotEnoughValues {
                    name: arg.name().to_string(),
                    expected: arg.arity(),
                    found: values.len(),
                })
            }
        }
    }
    Ok(values)
}

/// Accepted-value membership is checked before the type conversion.
fn check_value(arg: &ArgumentSpec, value: &str) -> Result<(), ErrorKind> {
    if !arg.accepted().is_empty() && !arg.accepted().contains(value) {
        return Err(ErrorKind::UnacceptedValue {
            name: arg.name().to_string(),
            value: value.to_string(),
        });
    }
    if let Some(value_type) = arg.value_type() {
        if !value_type.accepts(value) {
            return Err(ErrorKind::InvalidType {
                name: arg.name().to_string(),
                value_type,
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    fn volume_parser() -> ArgumentParser {
        let mut parser = ArgumentParser::new("VolumeCalculator");
        for name in ["length", "width", "height"] {
            parser
                .declare_positional(ArgumentSpec::positional(name).with_type(ValueType::Float))
                .unwrap();
        }
        parser
            .declare_named(
                ArgumentSpec::optional("type", "box").with_accepted(["box", "ellipsoid", "pyramid"]),
                "-t",
            )
            .unwrap();
        parser
    }

    fn unwrap_err(result: ParseResult) -> ParseError {
        match result {
            Err(err) => err,
            Ok(outcome) => panic!("Expected error, got {:?}", outcome),
        }
    }

    #[test]
    fn test_parse_positionals_in_order() {
        let mut parser = volume_parser();
        let outcome = parser.parse(args(&["7", "5", "2"])).unwrap();
        assert_eq!(outcome, ParseOutcome::Parsed);
        assert_eq!(parser.value("length"), Some("7"));
        assert_eq!(parser.value("width"), Some("5"));
        assert_eq!(parser.value("height"), Some("2"));
        assert_eq!(parser.value("--type"), Some("box"));
    }

    #[test]
    fn test_parse_named_between_positionals() {
        let mut parser = volume_parser();
        parser
            .parse(args(&["5", "--type", "ellipsoid", "4", "3"]))
            .unwrap();
        assert_eq!(parser.value("length"), Some("5"));
        assert_eq!(parser.value("width"), Some("4"));
        assert_eq!(parser.value("height"), Some("3"));
        assert_eq!(parser.value("--type"), Some("ellipsoid"));
    }

    #[test]
    fn test_parse_nickname_consumes_value() {
        let mut parser = volume_parser();
        parser.parse(args(&["-t", "pyramid", "5", "4", "3"])).unwrap();
        assert_eq!(parser.value("--type"), Some("pyramid"));
        assert_eq!(parser.value("-t"), Some("pyramid"));
    }

    #[test]
    fn test_error_too_few_positionals() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["5", "4"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingRequiredArgument("height".to_string())
        );
        assert_eq!(
            err.to_string(),
            "usage: VolumeCalculator length width height\n\
             VolumeCalculator: error: the following arguments are required: height"
        );
    }

    #[test]
    fn test_error_too_many_positionals() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2", "43", "44"])));
        assert_eq!(err.kind(), &ErrorKind::UnrecognizedArgument("43".to_string()));
        assert!(err
            .to_string()
            .ends_with("VolumeCalculator: error: unrecognized arguments: 43"));
    }

    #[test]
    fn test_error_invalid_type() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "something", "2"])));
        assert_eq!(
            err.to_string(),
            "usage: VolumeCalculator length width height\n\
             VolumeCalculator: error: argument width: invalid float value: something"
        );
    }

    #[test]
    fn test_error_unaccepted_value() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2", "--type", "sphere"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::UnacceptedValue {
                name: "--type".to_string(),
                value: "sphere".to_string(),
            }
        );
        assert!(err
            .to_string()
            .ends_with("error: argument --type: unaccepted value: sphere"));
    }

    #[test]
    fn test_accepted_checked_before_type() {
        let mut parser = ArgumentParser::new("prog");
        parser
            .declare_positional(
                ArgumentSpec::positional("count")
                    .with_type(ValueType::Int)
                    .with_accepted(["1", "2"]),
            )
            .unwrap();
        let err = unwrap_err(parser.parse(args(&["x"])));
        assert!(matches!(err.kind(), ErrorKind::UnacceptedValue { .. }));
    }

    #[test]
    fn test_help_short_and_long() {
        let mut parser = volume_parser();
        parser.set_program_description("Calculate the volume of a box.");
        for token in ["-h", "--help"] {
            match parser.parse(args(&["7", token])).unwrap() {
                ParseOutcome::Help(text) => {
                    assert!(text.starts_with("usage: VolumeCalculator length width height\n"));
                    assert!(text.contains("Calculate the volume of a box."));
                }
                other => panic!("Expected Help, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_help_stops_before_later_errors() {
        let mut parser = volume_parser();
        let outcome = parser.parse(args(&["-h", "not-a-number", "1", "2", "3"])).unwrap();
        assert!(matches!(outcome, ParseOutcome::Help(_)));
    }

    #[test]
    fn test_boolean_long_form_does_not_consume() {
        let mut parser = volume_parser();
        parser.declare_named(ArgumentSpec::flag("test"), "").unwrap();
        parser.parse(args(&["7", "--test", "5", "2"])).unwrap();
        assert_eq!(parser.value("--test"), Some("true"));
        assert_eq!(parser.value("width"), Some("5"));
    }

    #[test]
    fn test_boolean_nickname_sets_true() {
        let mut parser = volume_parser();
        parser.declare_named(ArgumentSpec::flag("test"), "-e").unwrap();
        parser.parse(args(&["7", "5", "-e", "2"])).unwrap();
        assert_eq!(parser.value("-e"), Some("true"));
        assert_eq!(parser.value("--test"), Some("true"));
    }

    #[test]
    fn test_multiple_nicknames_resolve_to_same_argument() {
        let mut parser = volume_parser();
        parser
            .declare_named(
                ArgumentSpec::optional("test", "1").with_type(ValueType::Int),
                "-se",
            )
            .unwrap();
        parser.parse(args(&["7", "5", "2", "-s", "2"])).unwrap();
        assert_eq!(parser.value("--test"), Some("2"));
        assert_eq!(parser.value("-s"), Some("2"));
        assert_eq!(parser.value("-e"), Some("2"));
    }

    #[test]
    fn test_declared_flags_cluster() {
        let mut parser = volume_parser();
        parser.declare_flags("-abc").unwrap();
        parser.parse(args(&["7", "5", "2", "-abc"])).unwrap();
        assert_eq!(parser.value("-a"), Some("true"));
        assert_eq!(parser.value("-b"), Some("true"));
        assert_eq!(parser.value("-c"), Some("true"));
    }

    #[test]
    fn test_declared_flags_default_false() {
        let mut parser = volume_parser();
        parser.declare_flags("ab").unwrap();
        parser.parse(args(&["7", "5", "2", "-b"])).unwrap();
        assert_eq!(parser.value("-a"), Some("false"));
        assert_eq!(parser.value("-b"), Some("true"));
        assert_eq!(parser.value_type("-a"), Some(ValueType::Boolean));
    }

    #[test]
    fn test_cluster_resolves_nicknames() {
        let mut parser = volume_parser();
        parser.declare_flags("a").unwrap();
        parser.declare_named(ArgumentSpec::flag("verbose"), "v").unwrap();
        parser.parse(args(&["-av", "7", "5", "2"])).unwrap();
        assert_eq!(parser.value("--verbose"), Some("true"));
        assert_eq!(parser.value("-a"), Some("true"));
    }

    #[test]
    fn test_error_undeclared_flag_in_cluster() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2", "-abc"])));
        assert_eq!(err.kind(), &ErrorKind::UnrecognizedArgument("-a".to_string()));
    }

    #[test]
    fn test_error_value_option_in_cluster() {
        let mut parser = volume_parser();
        parser.declare_flags("a").unwrap();
        let err = unwrap_err(parser.parse(args(&["-at", "box", "7", "5", "2"])));
        assert_eq!(err.kind(), &ErrorKind::UnrecognizedArgument("-t".to_string()));
    }

    #[test]
    fn test_error_unknown_long_option() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2", "--color", "red"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::UnrecognizedArgument("--color".to_string())
        );
    }

    #[test]
    fn test_negative_number_is_treated_as_flag() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "-5", "2"])));
        assert_eq!(err.kind(), &ErrorKind::UnrecognizedArgument("-5".to_string()));
    }

    #[test]
    fn test_error_missing_option_value() {
        let mut parser = volume_parser();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2", "--type"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::NotEnoughValues {
                name: "--type".to_string(),
                expected: 1,
                found: 0,
            }
        );
    }

    #[test]
    fn test_multi_value_positional() {
        let mut parser = ArgumentParser::new("prog");
        parser
            .declare_positional(
                ArgumentSpec::positional("point")
                    .with_type(ValueType::Int)
                    .with_arity(2),
            )
            .unwrap();
        parser.declare_positional("label").unwrap();
        parser.parse(args(&["3", "4", "origin"])).unwrap();
        assert_eq!(
            parser.values("point").unwrap(),
            &["3".to_string(), "4".to_string()]
        );
        assert_eq!(parser.value("point"), Some("3"));
        assert_eq!(parser.value("label"), Some("origin"));
    }

    #[test]
    fn test_error_not_enough_values_for_positional() {
        let mut parser = ArgumentParser::new("prog");
        parser
            .declare_positional(ArgumentSpec::positional("point").with_arity(3))
            .unwrap();
        let err = unwrap_err(parser.parse(args(&["1", "2"])));
        assert_eq!(
            err.to_string(),
            "usage: prog point\nprog: error: argument point: expected 3 value(s), found 2"
        );
    }

    #[test]
    fn test_error_required_named_missing() {
        let mut parser = volume_parser();
        parser.declare_named(ArgumentSpec::required("color"), "").unwrap();
        let err = unwrap_err(parser.parse(args(&["7", "5", "2"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::MissingRequiredArgument("--color".to_string())
        );
    }

    #[test]
    fn test_required_named_supplied() {
        let mut parser = volume_parser();
        parser.declare_named(ArgumentSpec::required("color"), "").unwrap();
        assert_eq!(parser.value("--color"), None);
        parser.parse(args(&["7", "5", "2", "--color", "red"])).unwrap();
        assert_eq!(parser.value("--color"), Some("red"));
    }

    #[test]
    fn test_mutually_exclusive_conflict_names_both() {
        for order in [["--add", "--subtract"], ["--subtract", "--add"]] {
            let mut parser = ArgumentParser::new("Calculator");
            parser.declare_named(ArgumentSpec::flag("add"), "").unwrap();
            parser.declare_named(ArgumentSpec::flag("subtract"), "").unwrap();
            parser.set_mutually_exclusive("--add", "--subtract").unwrap();

            let err = unwrap_err(parser.parse(args(&order)));
            let expected = format!(
                "the following arguments are mutually exclusive: {} and {}",
                order[1], order[0]
            );
            assert_eq!(err.kind().to_string(), expected);
        }
    }

    #[test]
    fn test_mutually_exclusive_single_is_fine() {
        let mut parser = ArgumentParser::new("Calculator");
        parser.declare_named(ArgumentSpec::flag("add"), "a").unwrap();
        parser.declare_named(ArgumentSpec::flag("subtract"), "s").unwrap();
        parser.set_mutually_exclusive("add", "subtract").unwrap();
        parser.parse(args(&["-a"])).unwrap();
        assert_eq!(parser.value("--add"), Some("true"));
        assert_eq!(parser.value("--subtract"), Some("false"));
    }

    #[test]
    fn test_mutually_exclusive_via_nicknames() {
        let mut parser = ArgumentParser::new("Calculator");
        parser.declare_named(ArgumentSpec::flag("add"), "a").unwrap();
        parser.declare_named(ArgumentSpec::flag("subtract"), "s").unwrap();
        parser.set_mutually_exclusive("add", "subtract").unwrap();
        let err = unwrap_err(parser.parse(args(&["-as"])));
        assert!(matches!(
            err.kind(),
            ErrorKind::MutuallyExclusiveConflict { .. }
        ));
    }

    #[test]
    fn test_mutex_declared_on_one_side_links_both() {
        let mut parser = volume_parser();
        parser
            .declare_named(ArgumentSpec::optional("shape", "circle").with_mutex("type"), "")
            .unwrap();
        assert!(parser.get("--type").unwrap().is_mutually_exclusive_with("--shape"));

        let err = unwrap_err(parser.parse(args(&[
            "7", "5", "2", "--type", "box", "--shape", "square",
        ])));
        assert_eq!(
            err.kind(),
            &ErrorKind::MutuallyExclusiveConflict {
                first: "--shape".to_string(),
                second: "--type".to_string(),
            }
        );
    }

    #[test]
    fn test_mutex_partner_declared_later_is_linked() {
        let mut parser = ArgumentParser::new("Calculator");
        parser
            .declare_named(ArgumentSpec::flag("add").with_mutex("subtract").with_mutex("-v"), "")
            .unwrap();
        parser.declare_named(ArgumentSpec::flag("subtract"), "").unwrap();
        parser.declare_flags("v").unwrap();

        assert!(parser.get("--subtract").unwrap().is_mutually_exclusive_with("--add"));
        assert!(parser.get("-v").unwrap().is_mutually_exclusive_with("--add"));
        let err = unwrap_err(parser.parse(args(&["--subtract", "--add"])));
        assert_eq!(
            err.kind(),
            &ErrorKind::MutuallyExclusiveConflict {
                first: "--add".to_string(),
                second: "--subtract".to_string(),
            }
        );
        assert!(parser.parse(args(&["-v", "--subtract"])).is_ok());
        assert!(parser.parse(args(&["-v", "--add"])).is_err());
    }

    #[test]
    fn test_failed_parse_leaves_values_untouched() {
        let mut parser = volume_parser();
        parser.parse(args(&["1", "2", "3"])).unwrap();
        let err = unwrap_err(parser.parse(args(&["9", "8", "oops"])));
        assert!(matches!(err.kind(), ErrorKind::InvalidType { .. }));
        assert_eq!(parser.value("length"), Some("1"));
        assert_eq!(parser.value("height"), Some("3"));
    }

    #[test]
    fn test_reparse_starts_from_defaults() {
        let mut parser = volume_parser();
        parser.parse(args(&["1", "2", "3", "-t", "pyramid"])).unwrap();
        parser.parse(args(&["4", "5", "6"])).unwrap();
        assert_eq!(parser.value("--type"), Some("box"));
        assert_eq!(parser.value("length"), Some("4"));
    }

    #[test]
    fn test_declare_rejects_help_names() {
        let mut parser = ArgumentParser::new("prog");
        assert_eq!(
            parser.declare_positional("-h"),
            Err(DeclareError::Reserved("-h".to_string()))
        );
        assert_eq!(
            parser.declare_named(ArgumentSpec::flag("help"), ""),
            Err(DeclareError::Reserved("--help".to_string()))
        );
        assert_eq!(
            parser.declare_named(ArgumentSpec::optional("hue", "3"), "-h"),
            Err(DeclareError::Reserved("-h".to_string()))
        );
        assert_eq!(
            parser.declare_flags("-ah"),
            Err(DeclareError::Reserved("-h".to_string()))
        );
        assert!(parser.get("-a").is_none());
    }

    #[test]
    fn test_declare_rejects_duplicates() {
        let mut parser = volume_parser();
        assert_eq!(
            parser.declare_positional("length"),
            Err(DeclareError::Duplicate("length".to_string()))
        );
        assert_eq!(
            parser.declare_named(ArgumentSpec::optional("type", "x"), ""),
            Err(DeclareError::Duplicate("--type".to_string()))
        );
        assert_eq!(
            parser.declare_flags("t"),
            Err(DeclareError::Duplicate("-t".to_string()))
        );
        assert_eq!(
            parser.declare_named(ArgumentSpec::flag("verbose"), "t"),
            Err(DeclareError::Duplicate("-t".to_string()))
        );
    }

    #[test]
    fn test_declare_rejects_wrong_kind() {
        let mut parser = ArgumentParser::new("prog");
        assert_eq!(
            parser.declare_positional(ArgumentSpec::flag("x")),
            Err(DeclareError::NotPositional("--x".to_string()))
        );
        assert_eq!(
            parser.declare_named(ArgumentSpec::positional("x"), ""),
            Err(DeclareError::NotNamed("x".to_string()))
        );
        assert_eq!(
            parser.declare_positional(ArgumentSpec::positional("x").with_arity(0)),
            Err(DeclareError::ZeroArity("x".to_string()))
        );
    }

    #[test]
    fn test_setters_and_accessors() {
        let mut parser = ArgumentParser::new("prog");
        parser.declare_positional("test").unwrap();
        parser.set_description("test", "test description").unwrap();
        parser.set_type("test", ValueType::Float).unwrap();
        parser.set_accepted("test", ["1.5"]).unwrap();
        assert_eq!(parser.description("test"), Some("test description"));
        assert_eq!(parser.value_type("test"), Some(ValueType::Float));
        assert!(parser.get("test").unwrap().accepted().contains("1.5"));
        assert_eq!(
            parser.set_type("missing", ValueType::Int),
            Err(DeclareError::Unknown("missing".to_string()))
        );
    }

    #[test]
    fn test_program_name() {
        let mut parser = ArgumentParser::new("VolumeCalculator");
        assert_eq!(parser.program_name(), "VolumeCalculator");
        parser.set_program_name("new name");
        assert_eq!(parser.program_name(), "new name");
    }

    #[test]
    fn test_positional_only_parser_without_positionals() {
        let mut parser = ArgumentParser::new("prog");
        let err = unwrap_err(parser.parse(args(&["extra"])));
        assert_eq!(
            err.to_string(),
            "usage: prog\nprog: error: unrecognized arguments: extra"
        );
    }
}
