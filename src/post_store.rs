use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::{fs, io};

use serde::Serialize;
use spdlog::{debug, info, warn};
use uuid::Uuid;

use crate::content::markdown_renderer::MarkdownRenderer;
use crate::content::metadata::{decode_leading_line, serialize, LeadingLine, MetadataMode, PostMetadata, REQUIRED_FIELDS};
use crate::content::post_file::{read_leading_line, with_metadata_line, PostFile};
use crate::content::{PostName, POST_EXTENSION};
use crate::error::{StoreError, StoreResult};

#[derive(Debug, Serialize)]
pub struct RenderedPost {
    pub metadata: PostMetadata,
    pub content: String,
}

/// Posts kept as `<name>.md` files in a single directory.
pub struct PostStore {
    root_dir: PathBuf,
    metadata_mode: MetadataMode,
    renderer: MarkdownRenderer,
}

impl PostStore {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        PostStore {
            root_dir: root_dir.into(),
            metadata_mode: MetadataMode::default(),
            renderer: MarkdownRenderer::default(),
        }
    }

    pub fn with_metadata_mode(mut self, metadata_mode: MetadataMode) -> Self {
        self.metadata_mode = metadata_mode;
        self
    }

    pub fn with_renderer(mut self, renderer: MarkdownRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn ensure_root_dir(&self) -> StoreResult<()> {
        if !self.root_dir.exists() {
            info!("Creating posts directory {}", self.root_dir.display());
            fs::create_dir_all(&self.root_dir).map_err(|e| StoreError::io(&self.root_dir, e))?;
        }
        Ok(())
    }

    fn post_path(&self, name: &PostName) -> PathBuf {
        self.root_dir.join(name.file_name())
    }

    fn map_io(name: &PostName, path: &Path, e: io::Error) -> StoreError {
        match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(name.to_string()),
            _ => StoreError::io(path, e),
        }
    }

    fn retrieve_files(&self) -> StoreResult<Vec<(String, PathBuf)>> {
        let mut posts = vec![];
        let entries = fs::read_dir(&self.root_dir).map_err(|e| StoreError::io(&self.root_dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.root_dir, e))?;
            let file_type = entry.file_type().map_err(|e| StoreError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(POST_EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!("Skipping post with a non UTF-8 file name: {}", path.display());
                continue;
            };
            if stem.starts_with('.') {
                continue;
            }

            posts.push((stem.to_string(), path.clone()));
        }
        Ok(posts)
    }

    /// Metadata of every post, in directory order.
    pub fn list_posts(&self) -> StoreResult<Vec<PostMetadata>> {
        let mut posts = vec![];
        for (name, path) in self.retrieve_files()? {
            let line = match read_leading_line(&path) {
                Ok(line) => line,
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!("Post {} disappeared while listing", name);
                    continue;
                }
                Err(e) => return Err(StoreError::io(path, e)),
            };

            let leading = decode_leading_line(&line, self.metadata_mode)
                .map_err(|source| StoreError::MetadataDecode { name: name.clone(), source })?;
            let metadata = match leading {
                LeadingLine::Metadata(metadata) => metadata.with_required_fields(),
                LeadingLine::PlainContent => PostMetadata::placeholder(&name),
            };
            posts.push(metadata.with_filename(&name));
        }

        debug!("Listed {} posts from {}", posts.len(), self.root_dir.display());
        Ok(posts)
    }

    pub fn get_post(&self, name: &PostName) -> StoreResult<RenderedPost> {
        let path = self.post_path(name);
        let post_file = PostFile::from_file(name.clone(), path.clone()).map_err(|e| Self::map_io(name, &path, e))?;

        let (leading, content) = post_file.split(self.metadata_mode)
            .map_err(|source| StoreError::MetadataDecode { name: name.to_string(), source })?;
        let metadata = match leading {
            LeadingLine::Metadata(metadata) => metadata.with_required_fields(),
            LeadingLine::PlainContent => PostMetadata::placeholder(name.as_str()),
        };

        let content = self.renderer.render(content)
            .map_err(|source| StoreError::Render { name: name.to_string(), source })?;

        debug!("Rendered post {} from {}", name, post_file.file_path.display());
        Ok(RenderedPost {
            metadata: metadata.with_filename(name.as_str()),
            content,
        })
    }

    /// Writes `content` verbatim. Never overwrites an existing post.
    pub fn create_post(&self, name: &PostName, content: &[u8]) -> StoreResult<()> {
        let path = self.post_path(name);
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => StoreError::AlreadyExists(name.to_string()),
                _ => StoreError::io(&path, e),
            })?;
        file.write_all(content).map_err(|e| StoreError::io(&path, e))?;

        info!("Created post {} ({} bytes)", name, content.len());
        Ok(())
    }

    /// Overwrites the whole file, metadata line included.
    pub fn replace_content(&self, name: &PostName, content: &[u8]) -> StoreResult<()> {
        let path = self.post_path(name);
        let mut file = OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| Self::map_io(name, &path, e))?;
        file.write_all(content).map_err(|e| StoreError::io(&path, e))?;

        info!("Replaced content of post {} ({} bytes)", name, content.len());
        Ok(())
    }

    pub fn update_metadata(&self, name: &PostName, metadata: PostMetadata) -> StoreResult<()> {
        let path = self.post_path(name);
        let raw = fs::read_to_string(&path).map_err(|e| Self::map_io(name, &path, e))?;

        let missing = metadata.missing_required_fields();
        if !missing.is_empty() {
            return Err(StoreError::validation(format!(
                "Missing required fields: {}. Required fields are: {}",
                missing.join(", "),
                REQUIRED_FIELDS.join(", ")
            )));
        }

        let metadata = metadata.with_filename(name.as_str());
        let line = serialize(&metadata)
            .map_err(|source| StoreError::MetadataDecode { name: name.to_string(), source })?;
        let merged = with_metadata_line(&raw, &line);
        self.write_replacing(name, &path, merged.as_bytes())?;

        info!("Metadata updated for post {}", name);
        Ok(())
    }

    pub fn delete_post(&self, name: &PostName) -> StoreResult<()> {
        let path = self.post_path(name);
        fs::remove_file(&path).map_err(|e| Self::map_io(name, &path, e))?;

        info!("Deleted post {}", name);
        Ok(())
    }

    /// Writes next to the post and renames over it, so readers see either the
    /// old or the new file. The new file takes the old file's permissions.
    fn write_replacing(&self, name: &PostName, path: &Path, content: &[u8]) -> StoreResult<()> {
        let permissions = fs::metadata(path)
            .map_err(|e| Self::map_io(name, path, e))?
            .permissions();

        let tmp_path = self.root_dir.join(format!(".{}.tmp", Uuid::new_v4()));
        let written = fs::write(&tmp_path, content)
            .and_then(|_| fs::set_permissions(&tmp_path, permissions));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(tmp_path, e));
        }
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StoreError::io(path, e));
        }
        Ok(())
    }
}
