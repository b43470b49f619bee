// src/snapshot.rs

//! Fully composed request handlers.
//!
//! A [`HandlerSnapshot`] binds the content tree, the view set, the theme and
//! the pre-rendered root page of one reload cycle. It is built by a pure
//! factory from a [`SiteConfig`] and never changes afterwards; a reload
//! builds a new one instead.

use crate::compositor::{compose, ThemeBundle, ViewSet, ViewTree};
use crate::config::SiteConfig;
use crate::content::resolve::{resolve_page, resolve_root};
use crate::content::{ContentFs, ContentPage, ResolveError};
use crate::frontmatter;
use crate::render::{self, RenderError, Vars, FORBIDDEN_VIEW, MARKDOWN_VIEW};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use std::borrow::Cow;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Used when neither configuration nor `.TITLE` names the asteroid.
pub const DEFAULT_ASTEROID_NAME: &str = "CHANGEME";

/// File at the content root holding the asteroid name.
pub const TITLE_FILE: &str = ".TITLE";

const HTML: &str = "text/html; charset=utf-8";
const PLAIN: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json";

/// Conditions under which no site can be served at all.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("asteroid must include /(index|README).md")]
    RootDocumentMissing,
    #[error("can not read root document {path}: {source}")]
    RootDocumentUnreadable {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("can not load views from {}: {source}", path.display())]
    Views {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// A response produced by a snapshot, independent of the HTTP server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteResponse {
    pub status: StatusCode,
    pub content_type: Cow<'static, str>,
    pub body: Vec<u8>,
}

impl SiteResponse {
    fn new(status: StatusCode, content_type: impl Into<Cow<'static, str>>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    fn html(status: StatusCode, body: String) -> Self {
        Self::new(status, HTML, body)
    }

    fn plain(status: StatusCode, body: String) -> Self {
        Self::new(status, PLAIN, body)
    }

    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

impl IntoResponse for SiteResponse {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, self.content_type.into_owned())],
            self.body,
        )
            .into_response()
    }
}

/// Where a request path is dispatched.
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Home,
    Status,
    Theme(&'a str),
    Content(&'a str),
}

impl<'a> Route<'a> {
    fn of(path: &'a str) -> Self {
        if path.is_empty() || path == "/" {
            Route::Home
        } else if path == "/status.json" {
            Route::Status
        } else if let Some(rest) = path.strip_prefix("/static/") {
            Route::Theme(rest)
        } else {
            Route::Content(path)
        }
    }
}

/// One immutable, fully composed request handler.
pub struct HandlerSnapshot {
    generation: u64,
    asteroid_name: String,
    content: Arc<dyn ContentFs>,
    views: ViewSet,
    theme: ThemeBundle,
    home: String,
}

impl std::fmt::Debug for HandlerSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSnapshot")
            .field("generation", &self.generation)
            .field("asteroid_name", &self.asteroid_name)
            .field("theme", &self.theme)
            .finish_non_exhaustive()
    }
}

impl HandlerSnapshot {
    /// Builds the handler for one cycle.
    ///
    /// Fails when the root document (`index.md` or `README.md`) is missing or
    /// unreadable, or when the override views cannot be loaded.
    pub fn build(config: &SiteConfig, generation: u64) -> Result<Self, BuildError> {
        let overrides = match &config.views_dir {
            Some(dir) => ViewTree::from_dir(dir).map_err(|source| BuildError::Views {
                path: dir.clone(),
                source,
            })?,
            None => ViewTree::empty(),
        };
        let (views, theme) = compose(
            overrides,
            ViewTree::embedded_defaults(),
            config.theme_dir.as_deref(),
        );

        let asteroid_name = asteroid_name(config);
        let home = render_home(config.content.as_ref(), &views, &asteroid_name)?;

        info!(
            generation,
            asteroid = %asteroid_name,
            embedded_theme = theme.is_embedded(),
            "site built"
        );
        Ok(Self {
            generation,
            asteroid_name,
            content: Arc::clone(&config.content),
            views,
            theme,
            home,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn asteroid_name(&self) -> &str {
        &self.asteroid_name
    }

    pub fn views(&self) -> &ViewSet {
        &self.views
    }

    pub fn theme(&self) -> &ThemeBundle {
        &self.theme
    }

    /// Answers a request for `path` (the URL path, without query).
    ///
    /// Performs blocking file I/O; per-request failures become error
    /// responses and never escape.
    pub fn respond(&self, path: &str) -> SiteResponse {
        match Route::of(path) {
            Route::Home => SiteResponse::html(StatusCode::OK, self.home.clone()),
            Route::Status => self.status(),
            Route::Theme(asset) => match self.theme.read(asset) {
                Ok(asset) => SiteResponse::new(StatusCode::OK, asset.content_type, asset.bytes),
                Err(e) => self.error_response(path, e),
            },
            Route::Content(request) => match resolve_page(request, self.content.as_ref()) {
                Ok(ContentPage::Markdown { title, markdown }) => {
                    let content = render::markdown_to_html(&markdown);
                    let vars = Vars::new()
                        .text("AsteroidName", &self.asteroid_name)
                        .text("PageName", &title)
                        .text("AtHome", "0")
                        .html("Content", content);
                    match render::render_page(&self.views, MARKDOWN_VIEW, vars) {
                        Ok(page) => SiteResponse::html(StatusCode::OK, page),
                        Err(e) => {
                            warn!(path, "render failed: {}", e);
                            SiteResponse::plain(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
                        }
                    }
                }
                Ok(ContentPage::Asset {
                    content_type,
                    bytes,
                }) => SiteResponse::new(StatusCode::OK, content_type, bytes),
                Err(e) => self.error_response(path, e),
            },
        }
    }

    fn status(&self) -> SiteResponse {
        let status = serde_json::json!({
            "asteroid": self.asteroid_name,
            "generation": self.generation,
            "theme": if self.theme.is_embedded() { "embedded" } else { "dir" },
        });
        SiteResponse::new(StatusCode::OK, JSON, status.to_string())
    }

    fn error_response(&self, path: &str, err: ResolveError) -> SiteResponse {
        let status = err.status();
        match err {
            ResolveError::Forbidden => {
                warn!(path, "path traversal rejected");
                let vars = Vars::new().text("AsteroidName", &self.asteroid_name);
                match render::render_page(&self.views, FORBIDDEN_VIEW, vars) {
                    Ok(page) => SiteResponse::html(status, page),
                    Err(_) => SiteResponse::plain(status, "Forbidden".to_string()),
                }
            }
            e => {
                debug!(path, status = status.as_u16(), "{}", e);
                SiteResponse::plain(status, e.to_string())
            }
        }
    }
}

fn asteroid_name(config: &SiteConfig) -> String {
    if let Some(name) = &config.asteroid_name {
        return name.clone();
    }
    let from_title_file = config
        .content
        .open(TITLE_FILE)
        .and_then(|mut f| f.read_all())
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
        .filter(|name| !name.is_empty());
    match from_title_file {
        Some(name) => {
            debug!("asteroid name read from {}: {:?}", TITLE_FILE, name);
            name
        }
        None => DEFAULT_ASTEROID_NAME.to_string(),
    }
}

/// Renders the root document. Its page name is its `title` entry, else the asteroid name.
fn render_home(content: &dyn ContentFs, views: &ViewSet, asteroid_name: &str) -> Result<String, BuildError> {
    let root = resolve_root(content).ok_or(BuildError::RootDocumentMissing)?;
    let path = root.path.clone();
    let bytes = root.read().map_err(|e| match e {
        ResolveError::Read { path, source } => BuildError::RootDocumentUnreadable { path, source },
        other => BuildError::RootDocumentUnreadable {
            path: path.clone(),
            source: io::Error::new(io::ErrorKind::Other, other.to_string()),
        },
    })?;

    let (markdown, meta) = frontmatter::extract(&String::from_utf8_lossy(&bytes));
    let title = meta.title().unwrap_or(asteroid_name);
    let content = render::markdown_to_html(&markdown);
    let vars = Vars::new()
        .text("AsteroidName", asteroid_name)
        .text("PageName", title)
        .text("AtHome", "1")
        .html("Content", content);
    Ok(render::render_page(views, MARKDOWN_VIEW, vars)?)
}
