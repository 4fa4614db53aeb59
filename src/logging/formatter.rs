//! Line rendering with optional ANSI severity colours
//!
//! A record is first rendered through a template, then colour escapes are
//! wrapped around the first occurrence of the level name, the logger name or
//! the whole line. Colouring after rendering keeps the uncoloured text
//! byte-identical to what the file sinks receive.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use super::error::{LogError, Result};
use super::record::{LogRecord, Severity};

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "{asctime} | [{levelname:>8}][{module}] | {message}";

/// Timestamp format for `{asctime}`
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Which part of a rendered line gets coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ColourMode {
    #[default]
    None,
    Level,
    Line,
    LoggerName,
}

impl FromStr for ColourMode {
    type Err = LogError;

    fn from_str(s: &str) -> Result<Self> {
        let mode = s.trim().to_ascii_lowercase();
        match mode.strip_prefix("wrap-").unwrap_or(&mode) {
            "none" | "off" => Ok(ColourMode::None),
            "level" => Ok(ColourMode::Level),
            "line" => Ok(ColourMode::Line),
            "logger-name" | "name" => Ok(ColourMode::LoggerName),
            other => Err(LogError::config(format!("Unknown colour mode '{}'", other))),
        }
    }
}

/// ANSI escapes per severity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColourTable {
    pub critical: String,
    pub error: String,
    pub warning: String,
    pub info: String,
    pub debug: String,
    /// Fallback colour, used for logger names when no dedicated colour is set
    pub default: String,
    pub reset: String,
}

impl ColourTable {
    /// Keys every configured table must define
    pub const REQUIRED_KEYS: [&'static str; 7] = [
        "critical", "error", "warning", "info", "debug", "default", "reset",
    ];

    /// Build a table from configuration, failing on any missing key
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let missing: Vec<&str> = Self::REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| !map.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(LogError::config(format!(
                "Colour table is missing required entries: {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| map.get(key).cloned().unwrap_or_default();
        Ok(Self {
            critical: get("critical"),
            error: get("error"),
            warning: get("warning"),
            info: get("info"),
            debug: get("debug"),
            default: get("default"),
            reset: get("reset"),
        })
    }

    pub fn for_severity(&self, severity: Severity) -> &str {
        match severity {
            Severity::Critical => &self.critical,
            Severity::Error => &self.error,
            Severity::Warning => &self.warning,
            Severity::Info => &self.info,
            Severity::Debug => &self.debug,
        }
    }
}

impl Default for ColourTable {
    fn default() -> Self {
        let grey = "\x1b[38;20m";
        Self {
            critical: "\x1b[31;1m".to_string(),
            error: "\x1b[31;20m".to_string(),
            warning: "\x1b[33;20m".to_string(),
            info: grey.to_string(),
            debug: grey.to_string(),
            default: grey.to_string(),
            reset: "\x1b[0m".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Asctime,
    LevelName,
    Name,
    Module,
    File,
    Line,
    Message,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "asctime" => Some(Field::Asctime),
            "levelname" => Some(Field::LevelName),
            "name" => Some(Field::Name),
            "module" => Some(Field::Module),
            "file" | "filename" => Some(Field::File),
            "line" | "lineno" => Some(Field::Line),
            "message" => Some(Field::Message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Right,
    Center,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field {
        field: Field,
        align: Align,
        width: usize,
    },
}

fn parse_template(template: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut literal = String::new();
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                literal.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                literal.push('}');
            }
            '{' => {
                let mut placeholder = String::new();
                let mut closed = false;
                for inner in chars.by_ref() {
                    if inner == '}' {
                        closed = true;
                        break;
                    }
                    placeholder.push(inner);
                }
                if !closed {
                    return Err(LogError::config(format!(
                        "Unterminated placeholder in format '{}'",
                        template
                    )));
                }
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(parse_placeholder(&placeholder)?);
            }
            '}' => {
                return Err(LogError::config(format!(
                    "Unmatched '}}' in format '{}'",
                    template
                )));
            }
            _ => literal.push(c),
        }
    }

    if !literal.is_empty() {
        segments.push(Segment::Literal(literal));
    }
    Ok(segments)
}

fn parse_placeholder(placeholder: &str) -> Result<Segment> {
    let (name, spec) = placeholder
        .split_once(':')
        .unwrap_or((placeholder, ""));
    let field = Field::parse(name.trim())
        .ok_or_else(|| LogError::config(format!("Unknown format field '{{{}}}'", name)))?;

    let (align, digits) = match spec.chars().next() {
        Some('<') => (Align::Left, &spec[1..]),
        Some('>') => (Align::Right, &spec[1..]),
        Some('^') => (Align::Center, &spec[1..]),
        _ => (Align::Left, spec),
    };
    let width = if digits.is_empty() {
        0
    } else {
        digits.parse::<usize>().map_err(|_| {
            LogError::config(format!("Invalid width in format field '{{{}}}'", placeholder))
        })?
    };

    Ok(Segment::Field {
        field,
        align,
        width,
    })
}

/// Insert a `[{name}]` token after the first ` | ` of a template
pub fn with_logger_name(template: &str) -> String {
    template.replacen(" | ", " | [{name}]", 1)
}

/// Renders records to text and colours them by severity
#[derive(Debug, Clone)]
pub struct SeverityFormatter {
    segments: Vec<Segment>,
    date_format: String,
    colours: ColourTable,
    logger_colour: Option<String>,
}

impl SeverityFormatter {
    /// Compile a template; unknown fields fail here rather than per line
    pub fn new(template: &str) -> Result<Self> {
        Ok(Self {
            segments: parse_template(template)?,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            colours: ColourTable::default(),
            logger_colour: None,
        })
    }

    /// Use a chrono strftime format for `{asctime}`
    pub fn with_date_format(mut self, date_format: &str) -> Result<Self> {
        if StrftimeItems::new(date_format).any(|item| matches!(item, Item::Error)) {
            return Err(LogError::config(format!(
                "Invalid date format '{}'",
                date_format
            )));
        }
        self.date_format = date_format.to_string();
        Ok(self)
    }

    pub fn with_colours(mut self, colours: ColourTable) -> Self {
        self.colours = colours;
        self
    }

    /// Give the logger name its own colour
    pub fn with_logger_colour(mut self, escape: impl Into<String>) -> Self {
        self.logger_colour = Some(escape.into());
        self
    }

    pub fn colours(&self) -> &ColourTable {
        &self.colours
    }

    /// Render the record without any colour
    pub fn render(&self, record: &LogRecord) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field {
                    field,
                    align,
                    width,
                } => {
                    let value = self.field_value(*field, record);
                    let padded = match align {
                        Align::Left => format!("{:<w$}", value, w = *width),
                        Align::Right => format!("{:>w$}", value, w = *width),
                        Align::Center => format!("{:^w$}", value, w = *width),
                    };
                    out.push_str(&padded);
                }
            }
        }
        out
    }

    fn field_value(&self, field: Field, record: &LogRecord) -> String {
        match field {
            Field::Asctime => record.timestamp.format(&self.date_format).to_string(),
            Field::LevelName => record.severity.as_str().to_string(),
            Field::Name => record.logger.clone(),
            Field::Module => record.module.clone().unwrap_or_else(|| "-".to_string()),
            Field::File => record.file.clone().unwrap_or_else(|| "-".to_string()),
            Field::Line => record
                .line
                .map(|l| l.to_string())
                .unwrap_or_else(|| "-".to_string()),
            Field::Message => record.message.clone(),
        }
    }

    /// Render the record and apply colour according to `mode`
    pub fn format(&self, record: &LogRecord, mode: ColourMode) -> String {
        let text = self.render(record);
        let severity_colour = self.colours.for_severity(record.severity);
        let reset = self.colours.reset.as_str();

        match mode {
            ColourMode::None => text,
            ColourMode::Level => {
                let level = find_span(&text, record.severity.as_str(), severity_colour);
                let name = self.logger_colour.as_deref().and_then(|colour| {
                    find_span_outside(&text, &record.logger, colour, level.as_ref())
                });
                paint(&text, level.into_iter().chain(name).collect(), reset)
            }
            ColourMode::Line => {
                let mut out = String::with_capacity(text.len() + 16);
                out.push_str(severity_colour);
                let name_span = self
                    .logger_colour
                    .as_deref()
                    .and_then(|colour| find_span(&text, &record.logger, colour));
                match name_span {
                    Some(span) => {
                        out.push_str(&text[..span.start]);
                        out.push_str(span.colour);
                        out.push_str(&text[span.start..span.end]);
                        out.push_str(reset);
                        out.push_str(severity_colour);
                        out.push_str(&text[span.end..]);
                    }
                    None => out.push_str(&text),
                }
                out.push_str(reset);
                out
            }
            ColourMode::LoggerName => {
                let colour = self
                    .logger_colour
                    .as_deref()
                    .unwrap_or(self.colours.default.as_str());
                let spans = find_span(&text, &record.logger, colour)
                    .into_iter()
                    .collect();
                paint(&text, spans, reset)
            }
        }
    }
}

/// Byte range of a first occurrence and the colour to wrap it in
#[derive(Debug, Clone, Copy)]
struct Span<'a> {
    start: usize,
    end: usize,
    colour: &'a str,
}

fn find_span<'a>(text: &str, needle: &str, colour: &'a str) -> Option<Span<'a>> {
    if needle.is_empty() {
        return None;
    }
    text.find(needle).map(|start| Span {
        start,
        end: start + needle.len(),
        colour,
    })
}

/// First occurrence of `needle` that does not overlap `taken`
fn find_span_outside<'a>(
    text: &str,
    needle: &str,
    colour: &'a str,
    taken: Option<&Span<'_>>,
) -> Option<Span<'a>> {
    if needle.is_empty() {
        return None;
    }
    text.match_indices(needle)
        .map(|(start, _)| Span {
            start,
            end: start + needle.len(),
            colour,
        })
        .find(|span| taken.map_or(true, |t| span.end <= t.start || t.end <= span.start))
}

/// Wrap each span in its colour and a reset; later overlapping spans are dropped
fn paint(text: &str, mut spans: Vec<Span<'_>>, reset: &str) -> String {
    let mut kept: Vec<Span<'_>> = Vec::with_capacity(spans.len());
    for span in spans.drain(..) {
        if kept
            .iter()
            .all(|k| span.end <= k.start || k.end <= span.start)
        {
            kept.push(span);
        }
    }
    kept.sort_by_key(|s| s.start);

    let mut out = String::with_capacity(text.len() + kept.len() * 16);
    let mut cursor = 0;
    for span in kept {
        out.push_str(&text[cursor..span.start]);
        out.push_str(span.colour);
        out.push_str(&text[span.start..span.end]);
        out.push_str(reset);
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}
