//! XML import and export of argument specifications.
//!
//! The document root is `<arguments>`, holding `<positional>` entries, then
//! `<named>` entries, then one `<flag>` per short-only boolean flag. A flag
//! with nothing but its letter is written in the short form `<flag>a</flag>`:
//!
//! ```xml
//! <arguments>
//!   <positional><name>length</name><type>float</type><position>1</position></positional>
//!   <named><name>type</name><shortname>t</shortname><type>string</type><default>box</default></named>
//!   <named><name>color</name><required/></named>
//!   <flag>a</flag>
//!   <flag><name>b</name><description>brief output</description></flag>
//! </arguments>
//! ```
//!
//! Mutual exclusion partners are written without the `--` of named arguments
//! and keep the single `-` of flags.
//!
//! ```xml
//! <named><name>add</name><default>false</default><mutex>subtract</mutex><mutex>-v</mutex></named>
//! ```

use crate::argument::{ArgumentSpec, ValueType};
use crate::parser::{ArgumentParser, DeclareError};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// The specification document could not be read or written.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("bad specification: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("bad specification: {0}")]
    Io(#[from] std::io::Error),

    #[error("bad specification: document is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("bad specification: {0}")]
    Malformed(String),

    #[error("bad specification: {0}")]
    Declaration(#[from] DeclareError),
}

fn malformed(message: impl Into<String>) -> SpecError {
    SpecError::Malformed(message.into())
}

/// Serialize the declared arguments as a compact XML document.
pub fn to_xml(parser: &ArgumentParser) -> Result<String, SpecError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(BytesStart::new("arguments")))?;

    for (index, name) in parser.positional_names().iter().enumerate() {
        let arg = lookup(parser, name)?;
        writer.write_event(Event::Start(BytesStart::new("positional")))?;
        write_text(&mut writer, "name", arg.name())?;
        write_common(&mut writer, arg)?;
        write_text(&mut writer, "position", &(index + 1).to_string())?;
        write_accepted(&mut writer, arg)?;
        write_arity(&mut writer, arg)?;
        writer.write_event(Event::End(BytesEnd::new("positional")))?;
    }

    for name in parser.named_names() {
        let arg = lookup(parser, name)?;
        let Some(options) = arg.named() else {
            return Err(malformed(format!("{} is not a named argument", name)));
        };
        writer.write_event(Event::Start(BytesStart::new("named")))?;
        write_text(&mut writer, "name", name.trim_start_matches('-'))?;
        for short in &options.nicknames {
            write_text(&mut writer, "shortname", &short.to_string())?;
        }
        write_common(&mut writer, arg)?;
        match (&options.default, options.required) {
            (Some(default), false) => write_text(&mut writer, "default", default)?,
            _ => {
                writer.write_event(Event::Empty(BytesStart::new("required")))?;
            }
        }
        write_mutex(&mut writer, parser, arg)?;
        write_accepted(&mut writer, arg)?;
        write_arity(&mut writer, arg)?;
        writer.write_event(Event::End(BytesEnd::new("named")))?;
    }

    for name in parser.flag_names() {
        let arg = lookup(parser, name)?;
        let short = name.trim_start_matches('-');
        let plain = arg.is_boolean()
            && arg.description().is_empty()
            && arg.accepted().is_empty()
            && mutex_partners(parser, arg).is_empty();
        if plain {
            write_text(&mut writer, "flag", short)?;
            continue;
        }

        writer.write_event(Event::Start(BytesStart::new("flag")))?;
        write_text(&mut writer, "name", short)?;
        if let Some(value_type) = arg.value_type().filter(|t| *t != ValueType::Boolean) {
            write_text(&mut writer, "type", value_type.as_str())?;
        }
        if !arg.description().is_empty() {
            write_text(&mut writer, "description", arg.description())?;
        }
        write_mutex(&mut writer, parser, arg)?;
        write_accepted(&mut writer, arg)?;
        writer.write_event(Event::End(BytesEnd::new("flag")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("arguments")))?;
    let xml = String::from_utf8(writer.into_inner())?;
    debug!(bytes = xml.len(), "exported specification");
    Ok(xml)
}

fn lookup<'a>(parser: &'a ArgumentParser, name: &str) -> Result<&'a ArgumentSpec, SpecError> {
    parser
        .get(name)
        .ok_or_else(|| malformed(format!("argument {} is not registered", name)))
}

fn write_text(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<(), SpecError> {
    writer
        .create_element(tag)
        .write_text_content(BytesText::new(text))?;
    Ok(())
}

fn write_common(writer: &mut Writer<Vec<u8>>, arg: &ArgumentSpec) -> Result<(), SpecError> {
    if let Some(value_type) = arg.value_type() {
        write_text(writer, "type", value_type.as_str())?;
    }
    if !arg.description().is_empty() {
        write_text(writer, "description", arg.description())?;
    }
    Ok(())
}

/// Declared partners of `arg`, in the order the edges were added.
fn mutex_partners<'a>(parser: &ArgumentParser, arg: &'a ArgumentSpec) -> Vec<&'a str> {
    arg.named()
        .map(|options| {
            options
                .mutually_exclusive_with
                .iter()
                .filter(|other| parser.get(other).is_some())
                .map(String::as_str)
                .collect()
        })
        .unwrap_or_default()
}

fn write_mutex(
    writer: &mut Writer<Vec<u8>>,
    parser: &ArgumentParser,
    arg: &ArgumentSpec,
) -> Result<(), SpecError> {
    for other in mutex_partners(parser, arg) {
        write_text(writer, "mutex", other.strip_prefix("--").unwrap_or(other))?;
    }
    Ok(())
}

fn write_accepted(writer: &mut Writer<Vec<u8>>, arg: &ArgumentSpec) -> Result<(), SpecError> {
    for value in arg.accepted() {
        write_text(writer, "accepted", value)?;
    }
    Ok(())
}

fn write_arity(writer: &mut Writer<Vec<u8>>, arg: &ArgumentSpec) -> Result<(), SpecError> {
    if arg.arity() > 1 {
        write_text(writer, "values", &arg.arity().to_string())?;
    }
    Ok(())
}

/// Fields collected for one `<positional>`, `<named>` or `<flag>` element.
#[derive(Debug, Default)]
struct Entry {
    name: Option<String>,
    value_type: Option<ValueType>,
    description: String,
    position: Option<usize>,
    arity: Option<usize>,
    accepted: Vec<String>,
    shortnames: Vec<char>,
    default: Option<String>,
    required: bool,
    mutex: Vec<String>,
    /// Text directly inside a short-form `<flag>`.
    bare: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Positional,
    Named,
    Flag,
}

impl Section {
    fn tag(self) -> &'static str {
        match self {
            Section::Positional => "positional",
            Section::Named => "named",
            Section::Flag => "flag",
        }
    }

    fn fields(self) -> &'static [&'static str] {
        match self {
            Section::Positional => &["name", "type", "description", "position", "values", "accepted"],
            Section::Named => &[
                "name",
                "shortname",
                "type",
                "description",
                "default",
                "required",
                "mutex",
                "accepted",
                "values",
            ],
            Section::Flag => &["name", "type", "description", "mutex", "accepted"],
        }
    }
}

impl Entry {
    fn set_field(&mut self, field: &str, text: String) -> Result<(), SpecError> {
        match field {
            "name" => self.name = Some(text.trim().to_string()),
            "type" => {
                if !text.trim().is_empty() {
                    let value_type = text
                        .parse::<ValueType>()
                        .map_err(|e| malformed(e.to_string()))?;
                    self.value_type = Some(value_type);
                }
            }
            "description" => self.description = text,
            "position" => self.position = Some(parse_number(field, &text)?),
            "values" => self.arity = Some(parse_number(field, &text)?),
            "accepted" => self.accepted.push(text),
            "shortname" => {
                let mut chars = text.trim().chars();
                match (chars.next(), chars.next()) {
                    (Some(short), None) => self.shortnames.push(short),
                    _ => return Err(malformed(format!("invalid shortname '{}'", text))),
                }
            }
            "default" => self.default = Some(text),
            "required" => self.required = true,
            "mutex" => self.mutex.push(text.trim().to_string()),
            other => return Err(malformed(format!("unexpected element <{}>", other))),
        }
        Ok(())
    }

    fn into_spec(self, section: Section) -> Result<ArgumentSpec, SpecError> {
        let name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| malformed("argument without a <name>"))?;

        let mut spec = match section {
            Section::Positional => ArgumentSpec::positional(name),
            Section::Named if self.required => ArgumentSpec::required(&name),
            Section::Named => {
                let default = self
                    .default
                    .ok_or_else(|| malformed(format!("{} needs <required/> or <default>", name)))?;
                ArgumentSpec::optional(&name, default)
            }
            Section::Flag => return Err(malformed(format!("flag {} is declared by letter", name))),
        };
        if let Some(value_type) = self.value_type {
            spec = spec.with_type(value_type);
        }
        if let Some(arity) = self.arity {
            spec = spec.with_arity(arity);
        }
        spec = spec
            .with_description(self.description)
            .with_accepted(self.accepted)
            .with_nicknames(self.shortnames);
        for other in &self.mutex {
            spec = spec.with_mutex(other);
        }
        Ok(spec)
    }

    /// Letters of a `<flag>`, from `<name>` or the short form.
    fn flag_letters(&self) -> Result<String, SpecError> {
        let bare = self.bare.trim();
        let letters = match &self.name {
            Some(name) if bare.is_empty() => name.as_str(),
            Some(_) => return Err(malformed(format!("unexpected text '{}' in <flag>", bare))),
            None => bare,
        };
        let letters = letters.trim_start_matches('-');
        if letters.is_empty() {
            return Err(malformed("flag without a name"));
        }
        Ok(letters.to_string())
    }
}

fn parse_number(field: &str, text: &str) -> Result<usize, SpecError> {
    text.trim()
        .parse()
        .map_err(|_| malformed(format!("<{}> must be a positive number, got '{}'", field, text)))
}

/// Import state: where the reader currently is in the document.
#[derive(Debug, Default)]
struct Importer {
    in_root: bool,
    entry: Option<(Section, Entry)>,
    field: Option<(String, String)>,
    positionals: BTreeMap<usize, ArgumentSpec>,
    named: Vec<ArgumentSpec>,
    flags: Vec<Entry>,
}

impl Importer {
    fn start(&mut self, tag: &str) -> Result<(), SpecError> {
        if self.field.is_some() {
            return Err(malformed(format!("unexpected element <{}> inside a value", tag)));
        }
        match (self.in_root, &self.entry, tag) {
            (false, _, "arguments") => self.in_root = true,
            (false, _, other) => return Err(malformed(format!("expected <arguments>, found <{}>", other))),
            (true, None, "positional") => self.entry = Some((Section::Positional, Entry::default())),
            (true, None, "named") => self.entry = Some((Section::Named, Entry::default())),
            (true, None, "flag") => self.entry = Some((Section::Flag, Entry::default())),
            (true, Some((section, _)), field) => {
                if !section.fields().contains(&field) {
                    return Err(malformed(format!(
                        "unexpected element <{}> in <{}>",
                        field,
                        section.tag()
                    )));
                }
                self.field = Some((field.to_string(), String::new()))
            }
            (true, None, other) => return Err(malformed(format!("unexpected element <{}>", other))),
        }
        Ok(())
    }

    fn text(&mut self, text: &str) -> Result<(), SpecError> {
        if let Some((_, buffer)) = self.field.as_mut() {
            buffer.push_str(text);
        } else if let Some((Section::Flag, entry)) = self.entry.as_mut() {
            entry.bare.push_str(text);
        } else if !text.trim().is_empty() {
            return Err(malformed(format!("unexpected text '{}'", text.trim())));
        }
        Ok(())
    }

    fn end(&mut self, tag: &str) -> Result<(), SpecError> {
        if let Some((field, buffer)) = self.field.take() {
            if field != tag {
                return Err(malformed(format!("mismatched </{}>", tag)));
            }
            if let Some((_, entry)) = self.entry.as_mut() {
                entry.set_field(&field, buffer)?;
            }
            return Ok(());
        }
        match (self.entry.take(), tag) {
            (Some((Section::Positional, entry)), "positional") => {
                let position = entry
                    .position
                    .ok_or_else(|| malformed("positional without a <position>"))?;
                if position == 0 {
                    return Err(malformed("positions start at 1"));
                }
                let spec = entry.into_spec(Section::Positional)?;
                if self.positionals.insert(position, spec).is_some() {
                    return Err(malformed(format!("duplicate position {}", position)));
                }
            }
            (Some((Section::Named, entry)), "named") => {
                self.named.push(entry.into_spec(Section::Named)?);
            }
            (Some((Section::Flag, entry)), "flag") => self.flags.push(entry),
            (None, "arguments") if self.in_root => self.in_root = false,
            (_, other) => return Err(malformed(format!("mismatched </{}>", other))),
        }
        Ok(())
    }

    /// Declare everything read so far into `parser`, positionals in position order.
    fn finish(self, parser: &mut ArgumentParser) -> Result<(), SpecError> {
        if self.in_root || self.entry.is_some() {
            return Err(malformed("document ended early"));
        }
        for spec in self.named {
            parser.declare_named(spec, "")?;
        }
        for (_, spec) in self.positionals {
            parser.declare_positional(spec)?;
        }

        let mut links = Vec::new();
        for entry in &self.flags {
            let letters = entry.flag_letters()?;
            parser.declare_flags(&letters)?;
            for letter in letters.chars() {
                let name = format!("-{}", letter);
                if let Some(value_type) = entry.value_type {
                    parser.set_type(&name, value_type)?;
                }
                parser.set_description(&name, entry.description.clone())?;
                parser.set_accepted(&name, entry.accepted.iter().cloned())?;
                links.extend(entry.mutex.iter().map(|other| (name.clone(), other.clone())));
            }
        }
        // Partners may be flags declared further down the document.
        for (name, other) in links {
            parser.set_mutually_exclusive(&name, &other)?;
        }
        Ok(())
    }
}

/// Add the arguments described by `xml` to `parser`.
///
/// Nothing is declared unless the whole document is valid.
pub fn load_xml(parser: &mut ArgumentParser, xml: &str) -> Result<(), SpecError> {
    // Text is kept verbatim; whitespace between elements is dropped by the importer.
    let mut reader = Reader::from_str(xml);

    let mut importer = Importer::default();
    let mut seen_root = false;
    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let tag = tag_name(&e);
                seen_root |= tag == "arguments";
                importer.start(&tag)?;
            }
            Event::Empty(e) => {
                let tag = tag_name(&e);
                seen_root |= tag == "arguments";
                importer.start(&tag)?;
                importer.end(&tag)?;
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                importer.end(&tag)?;
            }
            Event::Text(e) => importer.text(&e.unescape()?)?,
            Event::CData(e) => importer.text(&String::from_utf8_lossy(&e.into_inner()))?,
            Event::Eof => break,
            _ => {}
        }
    }
    if !seen_root {
        return Err(malformed("missing <arguments> root element"));
    }

    let mut staged = parser.clone();
    importer.finish(&mut staged)?;
    debug!(
        positionals = staged.positional_names().len(),
        named = staged.named_names().len(),
        "imported specification"
    );
    *parser = staged;
    Ok(())
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_lowercase()
}

/// Build a new parser for `program` from an XML document.
pub fn from_xml(program: &str, xml: &str) -> Result<ArgumentParser, SpecError> {
    let mut parser = ArgumentParser::new(program);
    load_xml(&mut parser, xml)?;
    Ok(parser)
}

/// Read a specification file into `parser`.
pub fn read_file(parser: &mut ArgumentParser, path: &Path) -> Result<(), SpecError> {
    let xml = std::fs::read_to_string(path)?;
    debug!(path = %path.display(), "reading specification");
    load_xml(parser, &xml)
}
