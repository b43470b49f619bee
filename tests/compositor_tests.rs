//! # Composition and Rendering Tests
//!
//! View layering (override first, default on miss), whole-tree theme
//! replacement, and placeholder rendering.

use asteroid::compositor::{compose, ThemeBundle, ViewLayer, ViewTree};
use asteroid::content::ResolveError;
use asteroid::render::{self, escape_html, substitute, Vars};
use std::fs;

fn defaults() -> ViewTree {
    ViewTree::from_files([
        ("layout.html", "<body>{{Body}}</body>"),
        ("markdown.html", "<h1>{{PageName}}</h1>{{Content}}"),
        ("403.html", "forbidden"),
    ])
}

#[test]
fn test_views_override_first_default_on_miss() {
    let overrides = ViewTree::from_files([("markdown.html", "<article>{{Content}}</article>")]);
    let (views, _) = compose(overrides, defaults(), None);

    assert_eq!(
        views.lookup("markdown.html"),
        Some((ViewLayer::Override, "<article>{{Content}}</article>"))
    );
    assert_eq!(
        views.lookup("layout.html"),
        Some((ViewLayer::Default, "<body>{{Body}}</body>"))
    );
    assert_eq!(views.get("403.html"), Some("forbidden"));
    assert_eq!(views.get("missing.html"), None);
}

#[test]
fn test_override_only_views_are_served() {
    let overrides = ViewTree::from_files([("extra/partial.html", "partial")]);
    let (views, _) = compose(overrides, defaults(), None);
    assert_eq!(
        views.lookup("extra/partial.html"),
        Some((ViewLayer::Override, "partial"))
    );
}

#[test]
fn test_views_from_dir() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("partials")).unwrap();
    fs::write(dir.path().join("403.html"), "go away").unwrap();
    fs::write(dir.path().join("partials/nav.html"), "<nav/>").unwrap();

    let overrides = ViewTree::from_dir(dir.path()).unwrap();
    assert_eq!(overrides.len(), 2);

    let (views, _) = compose(overrides, ViewTree::embedded_defaults(), None);
    assert_eq!(views.get("403.html"), Some("go away"));
    assert_eq!(views.get("partials/nav.html"), Some("<nav/>"));
    assert_eq!(
        views.lookup("layout.html").map(|(layer, _)| layer),
        Some(ViewLayer::Default)
    );
}

#[test]
fn test_embedded_defaults_cover_every_page_view() {
    let views = ViewTree::embedded_defaults();
    for name in [render::LAYOUT_VIEW, render::MARKDOWN_VIEW, render::FORBIDDEN_VIEW] {
        assert!(views.get(name).is_some(), "{name} missing from defaults");
    }
}

#[test]
fn test_embedded_theme_when_none_given() {
    let (_, theme) = compose(ViewTree::empty(), defaults(), None);
    assert_eq!(theme, ThemeBundle::Embedded);

    let css = theme.read("css/asteroid.css").unwrap();
    assert!(css.content_type.starts_with("text/css"));
    assert!(!css.bytes.is_empty());
    assert_eq!(theme.read("img/logo.svg").unwrap().content_type, "image/svg+xml");
}

#[test]
fn test_explicit_theme_replaces_whole_tree() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("css")).unwrap();
    fs::create_dir_all(dir.path().join("font")).unwrap();
    fs::write(dir.path().join("css/site.css"), "body{}").unwrap();
    fs::write(dir.path().join("font/mono.woff2"), b"wOF2").unwrap();

    let (_, theme) = compose(ViewTree::empty(), defaults(), Some(dir.path()));
    assert_eq!(theme, ThemeBundle::Dir(dir.path().to_path_buf()));

    assert_eq!(theme.read("css/site.css").unwrap().bytes, b"body{}".to_vec());
    assert_eq!(theme.read("font/mono.woff2").unwrap().content_type, "font/woff2");

    // No per-file fallback to the embedded theme.
    assert!(matches!(
        theme.read("css/asteroid.css"),
        Err(ResolveError::NotFound { .. })
    ));
}

#[test]
fn test_theme_only_exposes_known_subtrees() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("js")).unwrap();
    fs::write(dir.path().join("js/app.js"), "alert(1)").unwrap();
    fs::write(dir.path().join("secret.txt"), "no").unwrap();

    let theme = ThemeBundle::Dir(dir.path().to_path_buf());
    assert!(matches!(theme.read("js/app.js"), Err(ResolveError::NotFound { .. })));
    assert!(matches!(theme.read("secret.txt"), Err(ResolveError::NotFound { .. })));
    assert!(matches!(theme.read("css"), Err(ResolveError::NotFound { .. })));
    assert!(matches!(
        theme.read("css/../../etc/passwd"),
        Err(ResolveError::Forbidden)
    ));
}

#[test]
fn test_compose_is_deterministic() {
    let a = compose(ViewTree::empty(), defaults(), None);
    let b = compose(ViewTree::empty(), defaults(), None);
    assert_eq!(a.0.get("layout.html"), b.0.get("layout.html"));
    assert_eq!(a.1, b.1);
}

#[test]
fn test_substitute() {
    let vars = Vars::new().text("Name", "Neptune").html("Raw", "<b>x</b>");
    assert_eq!(substitute("Hi {{Name}}, {{ Raw }}!", &vars), "Hi Neptune, <b>x</b>!");
    assert_eq!(substitute("{{Unknown}}|", &vars), "|");
    assert_eq!(substitute("open {{Name", &vars), "open {{Name");
}

#[test]
fn test_text_values_are_escaped() {
    assert_eq!(escape_html("a < b & \"c\""), "a &lt; b &amp; &quot;c&quot;");
    let vars = Vars::new().text("PageName", "<script>");
    assert_eq!(substitute("{{PageName}}", &vars), "&lt;script&gt;");
}

#[test]
fn test_render_page_wraps_view_in_layout() {
    let (views, _) = compose(ViewTree::empty(), defaults(), None);
    let vars = Vars::new()
        .text("PageName", "Moons")
        .html("Content", render::markdown_to_html("*Triton*"));
    let page = render::render_page(&views, "markdown.html", vars).unwrap();
    assert_eq!(page, "<body><h1>Moons</h1><p><em>Triton</em></p>\n</body>");
}

#[test]
fn test_render_page_missing_view() {
    let (views, _) = compose(ViewTree::empty(), ViewTree::empty(), None);
    assert!(render::render_page(&views, "markdown.html", Vars::new()).is_err());
}

#[test]
fn test_markdown_extensions() {
    let html = render::markdown_to_html("| a |\n|---|\n| 1 |\n\n~~old~~\n\n- [x] done\n");
    assert!(html.contains("<table>"));
    assert!(html.contains("<del>old</del>"));
    assert!(html.contains("checkbox"));
}
