// src/compositor.rs

//! View and theme composition.
//!
//! Views and themes follow two different rules:
//!
//! - **Views** are layered per file: a template present in the override tree
//!   shadows the default one, anything else falls through to the defaults.
//! - **Themes** replace each other wholesale: an explicit theme directory is
//!   the whole theme, with no per-file fallback to the embedded default.

use crate::content::{normalize_request_path, NodeKind, ResolveError};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Views shipped with the binary.
const DEFAULT_VIEWS: &[(&str, &str)] = &[
    ("layout.html", include_str!("../assets/views/layout.html")),
    ("markdown.html", include_str!("../assets/views/markdown.html")),
    ("403.html", include_str!("../assets/views/403.html")),
];

/// Theme shipped with the binary.
const DEFAULT_THEME: &[(&str, &[u8])] = &[
    ("css/asteroid.css", include_bytes!("../assets/theme/css/asteroid.css")),
    ("img/logo.svg", include_bytes!("../assets/theme/img/logo.svg")),
];

/// Subtrees a theme may expose.
pub const THEME_SUBTREES: [&str; 3] = ["css", "img", "font"];

/// A flat tree of templates, keyed by slash-separated relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewTree {
    files: BTreeMap<String, String>,
}

impl ViewTree {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The views embedded in the binary.
    pub fn embedded_defaults() -> Self {
        Self::from_files(DEFAULT_VIEWS.iter().copied())
    }

    pub fn from_files<K, V>(files: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            files: files
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Reads every file below `dir` into memory.
    pub fn from_dir(dir: &Path) -> io::Result<Self> {
        let mut tree = Self::default();
        tree.load_dir(dir, "")?;
        debug!("loaded {} view(s) from {}", tree.len(), dir.display());
        Ok(tree)
    }

    fn load_dir(&mut self, dir: &Path, prefix: &str) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let key = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };
            if entry.file_type()?.is_dir() {
                self.load_dir(&entry.path(), &key)?;
            } else {
                let bytes = fs::read(entry.path())?;
                self.files
                    .insert(key, String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Which layer a view was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewLayer {
    Override,
    Default,
}

/// The merged template tree of one reload cycle. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ViewSet {
    overrides: ViewTree,
    defaults: ViewTree,
}

impl ViewSet {
    /// Looks `name` up in the override tree, then in the defaults.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.lookup(name).map(|(_, view)| view)
    }

    pub fn lookup(&self, name: &str) -> Option<(ViewLayer, &str)> {
        self.overrides
            .get(name)
            .map(|v| (ViewLayer::Override, v))
            .or_else(|| self.defaults.get(name).map(|v| (ViewLayer::Default, v)))
    }
}

/// The active theme: one tree, never a mix of two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeBundle {
    Embedded,
    Dir(PathBuf),
}

/// A theme file ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeAsset {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ThemeBundle {
    pub fn is_embedded(&self) -> bool {
        matches!(self, ThemeBundle::Embedded)
    }

    /// Reads `path` (e.g. `css/asteroid.css`) from the bundle.
    ///
    /// Only the `css/`, `img/` and `font/` subtrees are exposed.
    pub fn read(&self, path: &str) -> Result<ThemeAsset, ResolveError> {
        let path = normalize_request_path(path)?;
        let not_found = || ResolveError::NotFound { path: path.clone() };

        let subtree = path.split('/').next().unwrap_or_default();
        if !THEME_SUBTREES.contains(&subtree) || !path.contains('/') {
            return Err(not_found());
        }

        let bytes = match self {
            ThemeBundle::Embedded => DEFAULT_THEME
                .iter()
                .find(|(name, _)| *name == path)
                .map(|(_, bytes)| bytes.to_vec())
                .ok_or_else(not_found)?,
            ThemeBundle::Dir(root) => {
                let local = root.join(&path);
                match fs::metadata(&local) {
                    Ok(meta) if meta.is_file() => {}
                    _ => return Err(not_found()),
                }
                fs::read(&local).map_err(|source| ResolveError::Read {
                    path: path.clone(),
                    source,
                })?
            }
        };
        Ok(ThemeAsset {
            content_type: theme_content_type(&path),
            bytes,
        })
    }
}

fn theme_content_type(path: &str) -> &'static str {
    if let NodeKind::Image(content_type) = NodeKind::of_file(path) {
        return content_type;
    }
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("css") => "text/css; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        _ => "application/octet-stream",
    }
}

/// Builds the view set and picks the theme for one reload cycle.
///
/// Pure and deterministic: the override tree shadows the defaults per file,
/// and `explicit_theme`, when given, replaces the embedded theme entirely.
pub fn compose(
    override_views: ViewTree,
    default_views: ViewTree,
    explicit_theme: Option<&Path>,
) -> (ViewSet, ThemeBundle) {
    let views = ViewSet {
        overrides: override_views,
        defaults: default_views,
    };
    let theme = match explicit_theme {
        Some(dir) => ThemeBundle::Dir(dir.to_path_buf()),
        None => ThemeBundle::Embedded,
    };
    (views, theme)
}
