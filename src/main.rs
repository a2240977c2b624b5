//! argspec - parse command lines against a declared argument specification.

use anyhow::{Context, Result};
use argspec::{read_file, render_values, to_xml, write_specification, ArgumentParser, Config, ParseOutcome};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

/// Exit status for a rejected command line, as argparse uses.
const USAGE_EXIT_CODE: i32 = 2;

/// Argparse-style argument parsing driven by XML or JSON specifications.
#[derive(Parser, Debug)]
#[command(name = "argspec", version, about, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the argument declarations come from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct Source {
    /// XML specification file
    #[arg(long)]
    spec: Option<PathBuf>,

    /// JSON declaration document
    #[arg(long)]
    config: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse arguments and print the resulting values
    Parse {
        #[command(flatten)]
        source: Source,

        /// Program name for usage and error lines
        #[arg(long)]
        program: Option<String>,

        /// Arguments to parse
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print help text for the declared arguments
    Help {
        #[command(flatten)]
        source: Source,

        /// Program name for the usage line
        #[arg(long)]
        program: Option<String>,
    },

    /// Convert a JSON declaration document to an XML specification
    Export {
        /// JSON declaration document
        #[arg(long)]
        config: String,

        /// Write to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("ARGSPEC_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Build a parser from the selected source; `--program` overrides the stored name.
fn load_parser(source: &Source, program: Option<&str>) -> Result<ArgumentParser> {
    let mut parser = match (&source.spec, &source.config) {
        (Some(path), _) => {
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "program".to_string());
            let mut parser = ArgumentParser::new(name);
            read_file(&mut parser, path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            parser
        }
        (None, Some(json)) => {
            let cfg = Config::from_json(json).context("failed to parse config JSON")?;
            cfg.build().context("invalid config")?
        }
        (None, None) => anyhow::bail!("either --spec or --config is required"),
    };

    if let Some(program) = program {
        parser.set_program_name(program);
    }
    Ok(parser)
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse {
            source,
            program,
            args,
        } => {
            let mut parser = load_parser(&source, program.as_deref())?;
            debug!(program = %parser.program_name(), "loaded declarations");
            match parser.parse(args) {
                Ok(ParseOutcome::Parsed) => print!("{}", render_values(&parser)),
                Ok(ParseOutcome::Help(text)) => println!("{}", text),
                Err(err) => {
                    eprintln!("{}", err);
                    std::process::exit(USAGE_EXIT_CODE);
                }
            }
        }
        Commands::Help { source, program } => {
            let parser = load_parser(&source, program.as_deref())?;
            println!("{}", argspec::generate_help(&parser));
        }
        Commands::Export { config, output } => {
            let cfg = Config::from_json(&config).context("failed to parse config JSON")?;
            let parser = cfg.build().context("invalid config")?;
            match output {
                Some(path) => write_specification(&parser, &path)?,
                None => println!("{}", to_xml(&parser).context("failed to export")?),
            }
        }
    }

    Ok(())
}
