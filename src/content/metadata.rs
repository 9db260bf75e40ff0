use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use spdlog::debug;
use thiserror::Error;

/// Fields every metadata update has to carry. `null` counts as present.
pub const REQUIRED_FIELDS: [&str; 4] = ["description", "title", "datepublished", "tags"];

/// `None` when the key is absent, `Some(None)` when it is present with `null`.
pub type Field<T> = Option<Option<T>>;

/// Record stored on the first line of a post file.
///
/// Values are not type checked: any JSON object is metadata. Keys that are
/// not known fields are kept in `extra` so a merge never drops what a client
/// stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostMetadata {
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub description: Field<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub title: Field<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub datepublished: Field<Value>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub tags: Field<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Field<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl PostMetadata {
    /// Record reported for a post without a metadata line.
    pub fn placeholder(name: &str) -> Self {
        PostMetadata {
            description: Some(None),
            title: Some(None),
            datepublished: Some(None),
            tags: Some(None),
            filename: Some(Value::from(name)),
            extra: Map::new(),
        }
    }

    pub fn missing_required_fields(&self) -> Vec<&'static str> {
        let present = [
            self.description.is_some(),
            self.title.is_some(),
            self.datepublished.is_some(),
            self.tags.is_some(),
        ];
        REQUIRED_FIELDS.iter()
            .zip(present)
            .filter(|(_, present)| !present)
            .map(|(name, _)| *name)
            .collect()
    }

    /// Turns absent required fields into `null` so responses share one shape.
    pub fn with_required_fields(mut self) -> Self {
        self.description.get_or_insert(None);
        self.title.get_or_insert(None);
        self.datepublished.get_or_insert(None);
        self.tags.get_or_insert(None);
        self
    }

    pub fn with_filename(mut self, name: &str) -> Self {
        self.filename = Some(Value::from(name));
        self
    }
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct MetadataError(#[from] serde_json::Error);

/// How a bracketed first line that is not valid metadata is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataMode {
    /// Fall back to treating the line as content.
    #[default]
    Lenient,
    /// Report the line as a decoding failure.
    Strict,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LeadingLine {
    Metadata(PostMetadata),
    PlainContent,
}

/// A first line is a metadata candidate when, trimmed, it is wrapped in braces.
pub fn looks_like_metadata(line: &str) -> bool {
    let line = line.trim();
    line.starts_with('{') && line.ends_with('}')
}

pub fn decode_leading_line(line: &str, mode: MetadataMode) -> Result<LeadingLine, MetadataError> {
    if !looks_like_metadata(line) {
        return Ok(LeadingLine::PlainContent);
    }

    let decoded = serde_json::from_str::<Map<String, Value>>(line.trim())
        .and_then(|map| serde_json::from_value::<PostMetadata>(Value::Object(map)));
    match decoded {
        Ok(metadata) => Ok(LeadingLine::Metadata(metadata)),
        Err(e) => match mode {
            MetadataMode::Strict => Err(MetadataError(e)),
            MetadataMode::Lenient => {
                debug!("Bracketed first line is not metadata, treating it as content. Desc={}", e);
                Ok(LeadingLine::PlainContent)
            }
        },
    }
}

pub fn parse_leading_line(line: &str) -> LeadingLine {
    decode_leading_line(line, MetadataMode::Lenient).unwrap_or(LeadingLine::PlainContent)
}

/// Compact, newline-terminated JSON line.
pub fn serialize(metadata: &PostMetadata) -> Result<String, MetadataError> {
    let mut line = serde_json::to_string(metadata)?;
    line.push('\n');
    Ok(line)
}
