// src/content/resolve.rs

//! Mapping request paths onto files of the content tree.
//!
//! A request path is decoded and lexically normalized, then probed against
//! the tree in a fixed order: `<path>/index.md`, `<path>/README.md`, `<path>`
//! and finally `<path>.md`. The first candidate that opens and is a regular
//! file wins; its extension decides how it is served.

use super::{ContentFile, ContentFs, NodeKind};
use crate::frontmatter;
use axum::http::StatusCode;
use percent_encoding::percent_decode_str;
use std::borrow::Cow;
use std::io;
use thiserror::Error;
use tracing::{debug, error};

/// Documents probed at the root of the tree, in order.
pub const ROOT_DOCUMENTS: [&str; 2] = ["index.md", "README.md"];

/// Per-request resolution failures. None of them affect other requests.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("path traversal rejected")]
    Forbidden,
    #[error("Not Found: {path}")]
    NotFound { path: String },
    #[error("Unrecognized extension: {path}")]
    UnrecognizedExtension { path: String },
    #[error("can not read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl ResolveError {
    pub fn status(&self) -> StatusCode {
        match self {
            ResolveError::Forbidden => StatusCode::FORBIDDEN,
            ResolveError::NotFound { .. } => StatusCode::NOT_FOUND,
            ResolveError::UnrecognizedExtension { .. } => StatusCode::EXPECTATION_FAILED,
            ResolveError::Read { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// A candidate that opened successfully and is a regular file.
pub struct ResolvedFile {
    /// Normalized request path the file was resolved for.
    pub request: String,
    /// Path of the winning candidate inside the tree.
    pub path: String,
    pub kind: NodeKind,
    file: Box<dyn ContentFile>,
}

impl std::fmt::Debug for ResolvedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedFile")
            .field("request", &self.request)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// What a resolved file turns into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPage {
    /// A markdown document with its front matter stripped.
    Markdown { title: String, markdown: String },
    /// Raw bytes served verbatim.
    Asset {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
}

/// Decodes and normalizes a request path.
///
/// Percent-encoding and HTML entities are decoded, one leading `/` is
/// stripped and `.`/`..` segments are collapsed without touching the
/// filesystem. A `..` that survives normalization (the path climbs above the
/// root) is rejected. The root itself normalizes to the empty string.
pub fn normalize_request_path(request_path: &str) -> Result<String, ResolveError> {
    let decoded = percent_decode_str(request_path).decode_utf8_lossy();
    let decoded = unescape_entities(&decoded);
    let trimmed = decoded.strip_prefix('/').unwrap_or(&decoded);

    let mut segments: Vec<&str> = Vec::new();
    for segment in trimmed.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ => segments.push(".."),
            },
            s => segments.push(s),
        }
    }

    if segments.contains(&"..") {
        return Err(ResolveError::Forbidden);
    }
    Ok(segments.join("/"))
}

/// Resolves `request_path` to a regular file of `root`.
///
/// A candidate that cannot be opened or stat'ed is skipped; a file that
/// vanishes after the probe surfaces later as [`ResolveError::Read`].
pub fn resolve(request_path: &str, root: &dyn ContentFs) -> Result<ResolvedFile, ResolveError> {
    let request = normalize_request_path(request_path)?;

    let candidates = if request.is_empty() {
        vec![ROOT_DOCUMENTS[0].to_string(), ROOT_DOCUMENTS[1].to_string()]
    } else {
        let mut candidates = vec![
            format!("{request}/index.md"),
            format!("{request}/README.md"),
            request.clone(),
        ];
        // `/p` serves `p.md` when nothing above matched.
        if !request.ends_with(".md") {
            candidates.push(format!("{request}.md"));
        }
        candidates
    };

    for path in candidates {
        if let Some(file) = open_regular(root, &path) {
            debug!(request = %request, served = %path, "resolved content file");
            return Ok(ResolvedFile {
                kind: NodeKind::of_file(&path),
                request,
                path,
                file,
            });
        }
    }
    Err(ResolveError::NotFound { path: request })
}

/// Finds the root document, `index.md` then `README.md`.
pub fn resolve_root(root: &dyn ContentFs) -> Option<ResolvedFile> {
    ROOT_DOCUMENTS.iter().find_map(|name| {
        open_regular(root, name).map(|file| ResolvedFile {
            request: String::new(),
            path: name.to_string(),
            kind: NodeKind::Markdown,
            file,
        })
    })
}

/// Resolves and loads in one step.
pub fn resolve_page(request_path: &str, root: &dyn ContentFs) -> Result<ContentPage, ResolveError> {
    resolve(request_path, root)?.load()
}

fn open_regular(root: &dyn ContentFs, path: &str) -> Option<Box<dyn ContentFile>> {
    let file = root.open(path).ok()?;
    match file.stat() {
        Ok(stat) if !stat.is_dir => Some(file),
        _ => None,
    }
}

impl ResolvedFile {
    /// Reads the file and dispatches on its kind.
    ///
    /// Markdown is run through front matter extraction; its title is the
    /// `title` entry, else the request path without `.md`.
    pub fn load(self) -> Result<ContentPage, ResolveError> {
        match self.kind {
            NodeKind::Markdown => {
                let (path, request) = (self.path.clone(), self.request.clone());
                let bytes = self.read()?;
                let (markdown, meta) = frontmatter::extract(&String::from_utf8_lossy(&bytes));
                let title = match meta.title() {
                    Some(title) => title.to_string(),
                    None => request
                        .strip_suffix(".md")
                        .unwrap_or(&request)
                        .to_string(),
                };
                debug!(path = %path, title = %title, "loaded markdown");
                Ok(ContentPage::Markdown { title, markdown })
            }
            NodeKind::Image(content_type) => Ok(ContentPage::Asset {
                content_type,
                bytes: self.read()?,
            }),
            NodeKind::Directory | NodeKind::Unrecognized => {
                Err(ResolveError::UnrecognizedExtension { path: self.path })
            }
        }
    }

    /// Reads the whole file, consuming the handle.
    pub fn read(mut self) -> Result<Vec<u8>, ResolveError> {
        self.file.read_all().map_err(|source| {
            error!(path = %self.path, "failed to read content file: {}", source);
            ResolveError::Read {
                path: self.path,
                source,
            }
        })
    }
}

/// Decodes the HTML character references a browser may leave in a URL.
fn unescape_entities(input: &str) -> Cow<'_, str> {
    if !input.contains('&') {
        return Cow::Borrowed(input);
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').and_then(|semi| {
            let decoded = decode_entity(&rest[1..semi])?;
            Some((decoded, semi + 1))
        });
        match decoded {
            Some((c, len)) => {
                out.push(c);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}
