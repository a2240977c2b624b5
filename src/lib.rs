//! argspec - argparse-style command-line parsing with shareable specifications.
//!
//! Arguments are declared on an [`ArgumentParser`] (in code, from a JSON
//! [`Config`], or from an XML specification), the raw tokens are parsed once,
//! and typed values are read back by name. Failures render argparse-style
//! usage and error lines.

pub mod argument;
pub mod config;
pub mod help;
pub mod output;
pub mod parser;
pub mod xml;

pub use argument::{ArgumentSpec, Kind, NamedOptions, ValueType};
pub use config::{Config, ConfigError};
pub use help::{generate_help, generate_usage};
pub use output::{render_values, write_specification};
pub use parser::{ArgumentParser, DeclareError, ErrorKind, ParseError, ParseOutcome, ParseResult};
pub use xml::{from_xml, load_xml, read_file, to_xml, SpecError};
