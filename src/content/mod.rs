// src/content/mod.rs

//! The content tree of an asteroid.
//!
//! The resolver only needs a read-only tree that can open a slash-separated
//! relative path, stat the handle and read it whole. [`DirFs`] serves a
//! directory on disk; [`MemFs`] holds a tree in memory for embedding an
//! asteroid in a host process (and for tests).

pub mod resolve;

pub use resolve::{normalize_request_path, resolve, ContentPage, ResolveError, ResolvedFile};

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

/// Size and kind of an opened entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    pub size: u64,
    pub is_dir: bool,
}

/// An opened entry of a content tree. Contents are read lazily and never cached.
pub trait ContentFile: Send {
    fn stat(&self) -> io::Result<FileStat>;
    fn read_all(&mut self) -> io::Result<Vec<u8>>;
}

/// A read-only content tree.
///
/// Paths are relative, slash-separated and already normalized by the caller;
/// the empty path names the root.
pub trait ContentFs: Send + Sync + fmt::Debug {
    /// Opens `path`, failing with [`io::ErrorKind::NotFound`] when it does not exist.
    fn open(&self, path: &str) -> io::Result<Box<dyn ContentFile>>;
}

/// What a content path holds, judged by stat and extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Markdown,
    /// An image, with the content type inferred from its extension.
    Image(&'static str),
    Directory,
    Unrecognized,
}

impl NodeKind {
    /// Classifies a regular file by extension (ASCII case-insensitive).
    pub fn of_file(path: &str) -> NodeKind {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("md") => NodeKind::Markdown,
            Some("jpg") | Some("jpeg") => NodeKind::Image("image/jpeg"),
            Some("png") => NodeKind::Image("image/png"),
            Some("gif") => NodeKind::Image("image/gif"),
            Some("svg") => NodeKind::Image("image/svg+xml"),
            _ => NodeKind::Unrecognized,
        }
    }
}

/// A content tree rooted at a directory on disk.
#[derive(Debug, Clone)]
pub struct DirFs {
    root: PathBuf,
}

impl DirFs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn local_path(&self, path: &str) -> io::Result<PathBuf> {
        let mut local = self.root.clone();
        for segment in path.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if segment == ".." || segment.contains('\\') {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes content root: {path}"),
                ));
            }
            local.push(segment);
        }
        Ok(local)
    }
}

impl ContentFs for DirFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn ContentFile>> {
        let file = File::open(self.local_path(path)?)?;
        Ok(Box::new(DiskFile { file }))
    }
}

struct DiskFile {
    file: File,
}

impl ContentFile for DiskFile {
    fn stat(&self) -> io::Result<FileStat> {
        let meta = self.file.metadata()?;
        Ok(FileStat {
            size: meta.len(),
            is_dir: meta.is_dir(),
        })
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.file.read_to_end(&mut buf)?;
        Ok(buf)
    }
}

/// An in-memory content tree. Directories exist implicitly as prefixes of file paths.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, builder style.
    pub fn with_file(mut self, path: &str, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(path, contents);
        self
    }

    pub fn insert(&mut self, path: &str, contents: impl Into<Vec<u8>>) {
        self.files
            .insert(path.trim_matches('/').to_string(), contents.into());
    }

    fn is_dir(&self, path: &str) -> bool {
        if path.is_empty() {
            return true;
        }
        let prefix = format!("{path}/");
        self.files
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(k, _)| k.starts_with(&prefix))
    }
}

impl ContentFs for MemFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn ContentFile>> {
        let path = path.trim_matches('/');
        if let Some(contents) = self.files.get(path) {
            return Ok(Box::new(MemFile {
                contents: Some(contents.clone()),
            }));
        }
        if self.is_dir(path) {
            return Ok(Box::new(MemFile { contents: None }));
        }
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such file: {path}"),
        ))
    }
}

/// `contents == None` marks a directory.
struct MemFile {
    contents: Option<Vec<u8>>,
}

impl ContentFile for MemFile {
    fn stat(&self) -> io::Result<FileStat> {
        Ok(match &self.contents {
            Some(c) => FileStat {
                size: c.len() as u64,
                is_dir: false,
            },
            None => FileStat {
                size: 0,
                is_dir: true,
            },
        })
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        match &self.contents {
            Some(c) => Ok(c.clone()),
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "is a directory",
            )),
        }
    }
}
