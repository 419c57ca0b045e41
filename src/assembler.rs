//! Content assembly
//!
//! Turns a [`GenerationRequest`] into the ordered, provider-neutral turn
//! sequence a backend sees: caller history oldest first, then exactly one
//! user turn carrying the new prompt and, when attached, the image.

use crate::ai::mime::{detect_image_mime, normalize_image_mime};
use crate::models::{GenerationRequest, MediaPart, MediaRef, MediaSource, Role};
use crate::{Error, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    Media(MediaPart),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentTurn {
    pub role: Role,
    pub parts: Vec<ContentPart>,
}

impl ContentTurn {
    pub fn text(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ContentPart::Text(text.into())],
        }
    }

    pub fn has_media(&self) -> bool {
        self.parts
            .iter()
            .any(|part| matches!(part, ContentPart::Media(_)))
    }

    /// Concatenated text parts, mostly useful for logs and assertions.
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::Media(_) => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Builds content turns, reading media from disk when the request points at a file.
#[derive(Debug, Clone, Default)]
pub struct ContentAssembler {
    media_root: Option<PathBuf>,
}

impl ContentAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict filesystem media to paths that resolve inside `root`.
    pub fn with_media_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.media_root = Some(root.into());
        self
    }

    pub async fn assemble(&self, request: &GenerationRequest) -> Result<Vec<ContentTurn>> {
        // Resolve media before building anything so an unreadable image fails fast.
        let media = match &request.media {
            Some(media) => Some(self.resolve_media(media).await?),
            None => None,
        };

        let mut turns: Vec<ContentTurn> = request
            .history
            .iter()
            .filter(|turn| !turn.text.is_empty())
            .map(|turn| ContentTurn::text(turn.role, turn.text.clone()))
            .collect();

        let mut parts = vec![ContentPart::Text(request.new_prompt.clone())];
        if let Some(media) = media {
            parts.push(ContentPart::Media(media));
        }
        turns.push(ContentTurn {
            role: Role::User,
            parts,
        });

        tracing::debug!(
            turns = turns.len(),
            skipped = request.history.len() + 1 - turns.len(),
            "Assembled content turns"
        );
        Ok(turns)
    }

    async fn resolve_media(&self, media: &MediaRef) -> Result<MediaPart> {
        let bytes = match &media.source {
            MediaSource::Inline(bytes) => bytes.clone(),
            MediaSource::Path(path) => self.read_path(path).await?,
        };

        if bytes.is_empty() {
            return Err(Error::MediaUnavailable("image is empty".to_string()));
        }

        let mime_type = match &media.mime_type {
            Some(declared) => normalize_image_mime(declared).ok_or_else(|| {
                Error::InvalidRequest(format!("unsupported image type '{}'", declared))
            })?,
            None => detect_image_mime(&bytes).ok_or_else(|| {
                Error::InvalidRequest("unrecognized image format".to_string())
            })?,
        };

        Ok(MediaPart {
            mime_type: mime_type.to_string(),
            bytes,
        })
    }

    async fn read_path(&self, path: &Path) -> Result<Vec<u8>> {
        let path = match &self.media_root {
            Some(root) => self.confine(root, path).await?,
            None => path.to_path_buf(),
        };

        tokio::fs::read(&path).await.map_err(|e| {
            tracing::warn!("Failed to read image {}: {}", path.display(), e);
            Error::MediaUnavailable(format!("cannot read {}: {}", path.display(), e))
        })
    }

    async fn confine(&self, root: &Path, path: &Path) -> Result<PathBuf> {
        let root = tokio::fs::canonicalize(root).await.map_err(|e| {
            Error::MediaUnavailable(format!("media root {}: {}", root.display(), e))
        })?;
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let resolved = tokio::fs::canonicalize(&candidate).await.map_err(|e| {
            Error::MediaUnavailable(format!("cannot read {}: {}", candidate.display(), e))
        })?;

        if !resolved.starts_with(&root) {
            return Err(Error::InvalidRequest(format!(
                "image path {} is outside the media root",
                path.display()
            )));
        }
        Ok(resolved)
    }
}
