//! Rendering of records into output lines
//!
//! A formatter owns a `%token%` template and a chain of named renderers. A
//! token with a renderer of the same name is produced by that renderer; any
//! other token is looked up as a record field and printed with its display
//! form, or `-` when the field is absent or blank.

use super::channel::ChannelCore;
use super::error::{LoggerError, Result};
use super::handler::HandlerChain;
use super::record::{FieldValue, Fields, Payload, Record};
use std::sync::Arc;

/// Syslog-like default line
pub const DEFAULT_TEMPLATE: &str =
    "<%pri%> %version% %timestamp% %hostname% %app_name% %procid% %msgid% %sd% %msg% \n";

const BLANK: &str = "-";

pub type RenderHandler = dyn Fn(&ChannelCore, &Record) -> Result<String> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Token(String),
}

#[derive(Debug, Clone)]
pub struct Formatter {
    template: String,
    segments: Vec<Segment>,
    renderers: HandlerChain<RenderHandler>,
}

impl Default for Formatter {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl Formatter {
    /// Formatter over `template` with the `msg`, `sd` and `app_name` renderers
    pub fn new(template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            segments: parse_template(&template),
            template,
            renderers: HandlerChain::builtin([
                ("sd", Arc::new(structured_data) as Arc<RenderHandler>),
                ("msg", Arc::new(message) as Arc<RenderHandler>),
                ("app_name", Arc::new(app_name) as Arc<RenderHandler>),
            ]),
        }
    }

    #[must_use]
    pub fn template(&self) -> &str {
        &self.template
    }

    /// Register a renderer for `%name%`
    pub fn set<F>(&mut self, name: impl Into<String>, render: F) -> Result<&mut Self>
    where
        F: Fn(&ChannelCore, &Record) -> Result<String> + Send + Sync + 'static,
    {
        self.renderers.set(name, Arc::new(render))?;
        Ok(self)
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.renderers.remove(name).is_some()
    }

    #[must_use]
    pub fn renderers(&self) -> &HandlerChain<RenderHandler> {
        &self.renderers
    }

    /// Render a record.
    ///
    /// A record flagged with `transform == false` renders its `msg` alone.
    ///
    /// # Errors
    ///
    /// Propagates renderer failures such as malformed structured data.
    pub fn format(&self, core: &ChannelCore, record: &Record) -> Result<String> {
        if !record.transform() {
            return Ok(record.get("msg").map(ToString::to_string).unwrap_or_default());
        }

        let mut out = String::with_capacity(self.template.len() + 64);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Token(name) => match self.renderers.get(name) {
                    Some(render) => out.push_str(&render(core, record)?),
                    None => out.push_str(&field_or_blank(record.get(name))),
                },
            }
        }
        Ok(out)
    }

    /// Render any payload: raw bytes pass through, plain values use their
    /// display form, records go through [`Formatter::format`].
    ///
    /// Channels always format processed records; this is for rendering raw
    /// payloads with a channel's formatter outside the write pipeline, e.g.
    /// in a custom [`Channel`](crate::core::Channel) that forwards bytes.
    ///
    /// # Errors
    ///
    /// Returns the error of a failing renderer.
    pub fn format_payload(&self, core: &ChannelCore, payload: &Payload) -> Result<Vec<u8>> {
        match payload {
            Payload::Value(FieldValue::Bytes(bytes)) => Ok(bytes.clone()),
            Payload::Value(value) => Ok(value.to_string().into_bytes()),
            Payload::Record(record) => self.format(core, record).map(String::into_bytes),
        }
    }
}

/// Split on `%` pairs: the text between the 1st and 2nd `%` is a token, the
/// text between the 2nd and 3rd is literal, and so on. An unpaired trailing
/// `%` stays literal.
fn parse_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;
    while let Some(open) = rest.find('%') {
        let Some(close) = rest[open + 1..].find('%') else {
            break;
        };
        if open > 0 {
            segments.push(Segment::Literal(rest[..open].to_string()));
        }
        segments.push(Segment::Token(rest[open + 1..open + 1 + close].to_string()));
        rest = &rest[open + close + 2..];
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_string()));
    }
    segments
}

fn field_or_blank(value: Option<&FieldValue>) -> String {
    match value {
        Some(value) if !value.is_blank() => value.to_string(),
        _ => BLANK.to_string(),
    }
}

fn message(_: &ChannelCore, record: &Record) -> Result<String> {
    Ok(match record.get("msg") {
        Some(FieldValue::Error(err)) => err.message.clone(),
        other => field_or_blank(other),
    })
}

fn app_name(_: &ChannelCore, record: &Record) -> Result<String> {
    Ok(field_or_blank(
        record.get("app_name").or_else(|| record.get("appname")),
    ))
}

fn structured_data(_: &ChannelCore, record: &Record) -> Result<String> {
    match record.get("sd") {
        None | Some(FieldValue::Null) => Ok(BLANK.to_string()),
        Some(FieldValue::String(sd)) if sd.is_empty() => Ok(BLANK.to_string()),
        Some(FieldValue::String(sd)) => Ok(sd.clone()),
        Some(FieldValue::Map(element)) => sd_element(element),
        Some(FieldValue::List(elements)) => elements
            .iter()
            .map(|element| match element {
                FieldValue::Map(element) => sd_element(element),
                other => Err(LoggerError::structured_data(format!(
                    "structured data entry must be an object, got {}",
                    other
                ))),
            })
            .collect(),
        Some(other) => Err(LoggerError::structured_data(format!(
            "structured data must be a string, an object or a list, got {}",
            other
        ))),
    }
}

fn sd_element(element: &Fields) -> Result<String> {
    let id = element
        .get("id")
        .filter(|id| !id.is_blank())
        .ok_or_else(|| LoggerError::structured_data("structured data entry has no id"))?;
    let params: Vec<String> = element
        .iter()
        .filter(|(key, _)| *key != "id")
        .map(|(key, value)| format!("{}={}", key, value))
        .collect();
    Ok(format!("[{} {}]", id, params.join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::ChannelOptions;
    use crate::core::level::Level;
    use crate::core::record::ErrorValue;

    fn core() -> ChannelCore {
        ChannelCore::new(ChannelOptions::new()).unwrap()
    }

    fn full_record() -> Record {
        Record::message("hello")
            .with("level", Level::Info)
            .with("pri", 14)
            .with("version", 1)
            .with("timestamp", "2025-01-08T10:30:45.123Z")
            .with("hostname", "box")
            .with("appname", "api")
            .with("procid", 42)
    }

    #[test]
    fn test_template_parsing() {
        assert_eq!(
            parse_template("<%pri%> %msg%"),
            vec![
                Segment::Literal("<".into()),
                Segment::Token("pri".into()),
                Segment::Literal("> ".into()),
                Segment::Token("msg".into()),
            ]
        );
        assert_eq!(
            parse_template("100% sure"),
            vec![Segment::Literal("100% sure".into())]
        );
    }

    #[test]
    fn test_default_template() {
        let line = Formatter::default().format(&core(), &full_record()).unwrap();
        assert_eq!(line, "<14> 1 2025-01-08T10:30:45.123Z box api 42 - - hello \n");
    }

    #[test]
    fn test_missing_fields_render_blank() {
        let line = Formatter::default().format(&core(), &Record::new()).unwrap();
        assert_eq!(line, "<-> - - - - - - - - \n");
    }

    #[test]
    fn test_untransformed_records_render_msg_only() {
        let mut record = full_record();
        record.set_transform(false);
        assert_eq!(Formatter::default().format(&core(), &record).unwrap(), "hello");
    }

    #[test]
    fn test_error_messages() {
        let record = Record::message(ErrorValue::new("disk full"));
        let line = Formatter::new("%msg%").format(&core(), &record).unwrap();
        assert_eq!(line, "disk full");
    }

    #[test]
    fn test_structured_data() {
        let formatter = Formatter::new("%sd%");
        let element = Fields::from([
            ("id", FieldValue::from("req")),
            ("method", FieldValue::from("GET")),
            ("status", FieldValue::Int(200)),
        ]);
        let record = Record::new().with("sd", element.clone());
        assert_eq!(
            formatter.format(&core(), &record).unwrap(),
            "[req method=GET status=200]"
        );

        let other = Fields::from([("id", "auth")]);
        let record = Record::new().with(
            "sd",
            FieldValue::List(vec![element.into(), other.into()]),
        );
        assert_eq!(
            formatter.format(&core(), &record).unwrap(),
            "[req method=GET status=200][auth ]"
        );

        let record = Record::new().with("sd", "[raw]");
        assert_eq!(formatter.format(&core(), &record).unwrap(), "[raw]");
    }

    #[test]
    fn test_structured_data_errors() {
        let formatter = Formatter::new("%sd%");
        let record = Record::new().with("sd", Fields::from([("method", "GET")]));
        assert!(matches!(
            formatter.format(&core(), &record),
            Err(LoggerError::StructuredData { .. })
        ));

        let record = Record::new().with("sd", 5);
        assert!(matches!(
            formatter.format(&core(), &record),
            Err(LoggerError::StructuredData { .. })
        ));
    }

    #[test]
    fn test_payload_rendering() {
        let formatter = Formatter::default();
        let bytes = formatter
            .format_payload(&core(), &Payload::from(vec![0xffu8, 0x00]))
            .unwrap();
        assert_eq!(bytes, vec![0xff, 0x00]);

        let text = formatter
            .format_payload(&core(), &Payload::from("plain"))
            .unwrap();
        assert_eq!(text, b"plain");
    }

    #[test]
    fn test_custom_renderer() {
        let mut formatter = Formatter::new("[%level%] %msg%");
        formatter
            .set("level", |_, record| {
                Ok(record
                    .level()
                    .map_or("?".to_string(), |level| level.name().to_uppercase()))
            })
            .unwrap();

        let record = Record::message("up").with("level", Level::Notice);
        assert_eq!(formatter.format(&core(), &record).unwrap(), "[NOTE] up");
    }
}
