use std::fmt;
use std::fmt::{Display, Formatter};

use crate::error::{StoreError, StoreResult};

pub mod markdown_renderer;
pub mod metadata;
pub mod parsing_utils;
pub mod post_file;

pub const POST_EXTENSION: &str = "md";

const MAX_NAME_LEN: usize = 255;

/// Name of a post: the file name in the posts directory without `.md`.
#[derive(Debug, Clone, Eq, Hash, PartialEq)]
pub struct PostName(String);

impl PostName {
    /// Accepts a name only if joining it to the posts directory stays inside it.
    pub fn parse(raw: &str) -> StoreResult<PostName> {
        if raw.is_empty() {
            return Err(StoreError::validation("Post name must not be empty"));
        }
        if raw.len() > MAX_NAME_LEN {
            return Err(StoreError::validation(format!("Post name is longer than {} bytes", MAX_NAME_LEN)));
        }
        if raw.starts_with('.') {
            return Err(StoreError::validation(format!("Invalid post name {}: must not start with '.'", raw)));
        }
        if raw.contains("..") || raw.contains('/') || raw.contains('\\') {
            return Err(StoreError::validation(format!("Invalid post name {}: path separators are not allowed", raw)));
        }
        if raw.chars().any(char::is_control) {
            return Err(StoreError::validation("Invalid post name: control characters are not allowed"));
        }

        Ok(PostName(raw.to_string()))
    }

    /// Uploaded files carry their extension, the post name does not.
    pub fn from_upload(file_name: &str) -> StoreResult<PostName> {
        let suffix = format!(".{}", POST_EXTENSION);
        let stem = file_name.strip_suffix(suffix.as_str()).unwrap_or(file_name);
        Self::parse(stem)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.0, POST_EXTENSION)
    }
}

impl Display for PostName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
