use std::collections::HashMap;

use crate::content::PostName;
use crate::error::{StoreError, StoreResult};

#[derive(PartialEq, Debug)]
pub struct QueryString {
    items: HashMap<String, String>,
}

impl QueryString {
    pub fn from(buf: &str) -> Self {
        let vs: Vec<(String, String)> = serde_urlencoded::from_str(buf).unwrap_or_else(|_| vec![]);
        let items: HashMap<String, String> = vs.into_iter().collect();

        QueryString {
            items,
        }
    }

    pub fn from_optional(buf: Option<&str>) -> Self {
        Self::from(buf.unwrap_or(""))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// A missing or empty parameter is reported as a validation error.
    pub fn require_post_name(&self, key: &str) -> StoreResult<PostName> {
        match self.get(key) {
            Some(val) if !val.is_empty() => PostName::parse(val),
            _ => Err(StoreError::validation(format!("{} query parameter is required", key))),
        }
    }
}
