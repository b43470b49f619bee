// src/render.rs

//! Page rendering: markdown to HTML, then into the views.
//!
//! Views are plain HTML with `{{Name}}` placeholders. A page view is rendered
//! first and its output is placed into `layout.html` as `{{Body}}`.

use crate::compositor::ViewSet;
use pulldown_cmark::{html, Options, Parser};
use std::borrow::Cow;
use thiserror::Error;

/// The outer view every page is wrapped in.
pub const LAYOUT_VIEW: &str = "layout.html";
pub const MARKDOWN_VIEW: &str = "markdown.html";
pub const FORBIDDEN_VIEW: &str = "403.html";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("view not found: {0}")]
    MissingView(String),
}

/// Renders markdown with tables, footnotes, strikethrough and task lists.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut opts = Options::empty();
    opts.insert(Options::ENABLE_TABLES);
    opts.insert(Options::ENABLE_FOOTNOTES);
    opts.insert(Options::ENABLE_STRIKETHROUGH);
    opts.insert(Options::ENABLE_TASKLISTS);

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, opts));
    out
}

pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Values for view placeholders.
#[derive(Debug, Clone, Default)]
pub struct Vars<'a> {
    entries: Vec<(&'a str, Cow<'a, str>)>,
}

impl<'a> Vars<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a text value; it is HTML-escaped on insertion.
    pub fn text(mut self, name: &'a str, value: &'a str) -> Self {
        self.entries.push((name, escape_html(value)));
        self
    }

    /// Sets a value that is already HTML.
    pub fn html(mut self, name: &'a str, value: impl Into<Cow<'a, str>>) -> Self {
        self.entries.push((name, value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        // Later values win.
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_ref())
    }
}

/// Replaces every `{{Name}}` in `template`. Unknown names render as nothing.
pub fn substitute(template: &str, vars: &Vars<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(vars.get(after[..end].trim()).unwrap_or_default());
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders `view` and wraps the result in the layout.
pub fn render_page(views: &ViewSet, view: &str, vars: Vars<'_>) -> Result<String, RenderError> {
    let page = views
        .get(view)
        .ok_or_else(|| RenderError::MissingView(view.to_string()))?;
    let layout = views
        .get(LAYOUT_VIEW)
        .ok_or_else(|| RenderError::MissingView(LAYOUT_VIEW.to_string()))?;
    let body = substitute(page, &vars);
    Ok(substitute(layout, &vars.html("Body", body)))
}
