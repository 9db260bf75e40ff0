use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::{fs, io};

use crate::content::metadata::{decode_leading_line, parse_leading_line, LeadingLine, MetadataError, MetadataMode};
use crate::content::parsing_utils::split_leading_line;
use crate::content::PostName;

/// A post file loaded whole.
pub struct PostFile {
    pub name: PostName,
    pub file_path: PathBuf,
    pub raw_content: String,
}

impl PostFile {
    pub fn from_file(name: PostName, file_path: PathBuf) -> io::Result<PostFile> {
        let raw_content = fs::read_to_string(&file_path)?;

        Ok(PostFile {
            name,
            file_path,
            raw_content,
        })
    }

    /// Interprets the first line and returns it with the markdown that follows.
    /// Without a metadata line the whole file is markdown.
    pub fn split(&self, mode: MetadataMode) -> Result<(LeadingLine, &str), MetadataError> {
        let (first_line, rest) = split_leading_line(&self.raw_content);
        match decode_leading_line(first_line, mode)? {
            LeadingLine::PlainContent => Ok((LeadingLine::PlainContent, self.raw_content.as_str())),
            metadata => Ok((metadata, rest)),
        }
    }
}

/// Reads the first line only, so listing never loads whole posts.
pub fn read_leading_line(file_path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(file_path)?);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line)
}

/// Puts `metadata_line` in front of `raw`, replacing the current first line
/// when that line already is metadata.
pub fn with_metadata_line(raw: &str, metadata_line: &str) -> String {
    if raw.is_empty() {
        return metadata_line.to_string();
    }

    let (first_line, rest) = split_leading_line(raw);
    let content = match parse_leading_line(first_line) {
        LeadingLine::Metadata(_) => rest,
        LeadingLine::PlainContent => raw,
    };

    let mut merged = String::with_capacity(metadata_line.len() + content.len());
    merged.push_str(metadata_line);
    merged.push_str(content);
    merged
}
