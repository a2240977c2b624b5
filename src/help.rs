//! Usage and help text generation.

use crate::parser::ArgumentParser;

/// Build the usage line: `usage: <program> <positional names>`.
pub fn generate_usage(parser: &ArgumentParser) -> String {
    let mut usage = format!("usage: {}", parser.program_name());
    for name in parser.positional_names() {
        usage.push(' ');
        usage.push_str(name);
    }
    usage
}

/// Generate the full help text.
///
/// Layout is the usage line, the program description (if any), then one
/// `name description` line per positional argument followed by the named
/// arguments and short-only flags.
pub fn generate_help(parser: &ArgumentParser) -> String {
    let mut lines = vec![generate_usage(parser)];

    if !parser.program_description().is_empty() {
        lines.push(parser.program_description().to_string());
    }

    if !parser.positional_names().is_empty() {
        lines.push("positional arguments:".to_string());
        lines.extend(describe(parser, parser.positional_names()));
    }

    let named: Vec<String> = parser
        .named_names()
        .iter()
        .chain(parser.flag_names())
        .cloned()
        .collect();
    if !named.is_empty() {
        lines.push("named arguments:".to_string());
        lines.extend(describe(parser, &named));
    }

    lines.join("\n")
}

fn describe<'a>(parser: &'a ArgumentParser, names: &'a [String]) -> impl Iterator<Item = String> + 'a {
    names.iter().map(move |name| {
        let description = parser.description(name).unwrap_or_default();
        format!("{} {}", name, description).trim_end().to_string()
    })
}
