//! # Content Resolution Tests
//!
//! Path normalization, traversal rejection, the `index.md` / `README.md` /
//! bare path fallback order, and dispatch by extension, against both the
//! in-memory and the on-disk content trees.

use asteroid::content::resolve::{resolve_page, resolve_root};
use asteroid::content::{
    normalize_request_path, resolve, ContentFile, ContentFs, ContentPage, DirFs, MemFs, NodeKind,
    ResolveError,
};
use axum::http::StatusCode;
use std::fs;
use std::io;
use std::sync::Mutex;

/// A content tree that records every path it is asked to open.
#[derive(Debug, Default)]
struct RecordingFs {
    inner: MemFs,
    opened: Mutex<Vec<String>>,
}

impl ContentFs for RecordingFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn ContentFile>> {
        self.opened.lock().unwrap().push(path.to_string());
        self.inner.open(path)
    }
}

/// A content tree whose files stat fine but fail when read.
#[derive(Debug)]
struct VanishingFs;

struct VanishingFile;

impl ContentFile for VanishingFile {
    fn stat(&self) -> io::Result<asteroid::content::FileStat> {
        Ok(asteroid::content::FileStat {
            size: 10,
            is_dir: false,
        })
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        Err(io::Error::new(io::ErrorKind::NotFound, "gone"))
    }
}

impl ContentFs for VanishingFs {
    fn open(&self, path: &str) -> io::Result<Box<dyn ContentFile>> {
        if path == "ghost.md" {
            Ok(Box::new(VanishingFile))
        } else {
            Err(io::Error::new(io::ErrorKind::NotFound, "no"))
        }
    }
}

fn neptune() -> MemFs {
    MemFs::new()
        .with_file("index.md", "---\ntitle: Neptune\n---\n# Welcome\n")
        .with_file("moons.md", "# Moons\n")
        .with_file("triton.md", "---title: Triton, the big one---\nretrograde orbit")
        .with_file("rings/README.md", "# Rings\n")
        .with_file("storms/index.md", "# Storms\n")
        .with_file("storms/README.md", "# not this one\n")
        .with_file("img/neptune.png", vec![0x89, b'P', b'N', b'G'])
        .with_file("img/diagram.SVG", "<svg/>")
        .with_file("notes.txt", "plain")
}

fn markdown(page: ContentPage) -> (String, String) {
    match page {
        ContentPage::Markdown { title, markdown } => (title, markdown),
        other => panic!("expected markdown, got {:?}", other),
    }
}

#[test]
fn test_normalize_request_path() {
    assert_eq!(normalize_request_path("/").unwrap(), "");
    assert_eq!(normalize_request_path("/a/b").unwrap(), "a/b");
    assert_eq!(normalize_request_path("/a/./b/").unwrap(), "a/b");
    assert_eq!(normalize_request_path("/a/../b").unwrap(), "b");
    assert_eq!(normalize_request_path("//a//b").unwrap(), "a/b");
    assert_eq!(normalize_request_path("/deep%20blue/sea").unwrap(), "deep blue/sea");
    assert_eq!(normalize_request_path("/a&amp;b").unwrap(), "a&b");
    assert_eq!(normalize_request_path("/a..b.md").unwrap(), "a..b.md");
}

#[test]
fn test_normalize_rejects_escaping_paths() {
    for path in ["/..", "/../etc/passwd", "/a/../../b", "/%2e%2e/secret", "/a/%2E%2E/%2e%2e/x", "/&#46;&#46;/x"] {
        assert!(
            matches!(normalize_request_path(path), Err(ResolveError::Forbidden)),
            "{path} should be rejected"
        );
    }
}

#[test]
fn test_traversal_never_opens_a_file() {
    let fs = RecordingFs {
        inner: neptune(),
        ..Default::default()
    };
    let err = resolve("/../index.md", &fs).unwrap_err();
    assert!(matches!(err, ResolveError::Forbidden));
    assert_eq!(err.status(), StatusCode::FORBIDDEN);
    assert!(fs.opened.lock().unwrap().is_empty());
}

#[test]
fn test_fallback_order() {
    let fs = RecordingFs {
        inner: neptune(),
        ..Default::default()
    };
    let resolved = resolve("/rings", &fs).unwrap();
    assert_eq!(resolved.path, "rings/README.md");
    assert_eq!(
        *fs.opened.lock().unwrap(),
        vec!["rings/index.md".to_string(), "rings/README.md".to_string()]
    );

    // index.md beats README.md
    assert_eq!(resolve("/storms", &fs).unwrap().path, "storms/index.md");
}

#[test]
fn test_directory_without_document_is_not_found() {
    let err = resolve("/img", &neptune()).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { ref path } if path == "img"));
    assert_eq!(err.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_missing_path_is_not_found() {
    let err = resolve_page("/pluto", &neptune()).unwrap_err();
    assert!(matches!(err, ResolveError::NotFound { .. }));
}

#[test]
fn test_markdown_title_from_front_matter() {
    let (title, body) = markdown(resolve_page("/triton.md", &neptune()).unwrap());
    assert_eq!(title, "Triton, the big one");
    assert_eq!(body, "retrograde orbit");
}

#[test]
fn test_markdown_title_defaults_to_request_path() {
    let (title, body) = markdown(resolve_page("/moons.md", &neptune()).unwrap());
    assert_eq!(title, "moons");
    assert_eq!(body, "# Moons\n");
}

#[test]
fn test_markdown_served_for_directory_request() {
    let (title, body) = markdown(resolve_page("/rings/", &neptune()).unwrap());
    assert_eq!(title, "rings");
    assert_eq!(body, "# Rings\n");
}

#[test]
fn test_root_request_resolves_index() {
    let (_, body) = markdown(resolve_page("/", &neptune()).unwrap());
    assert_eq!(body, "# Welcome\n\n");
}

#[test]
fn test_images_are_served_verbatim() {
    match resolve_page("/img/neptune.png", &neptune()).unwrap() {
        ContentPage::Asset {
            content_type,
            bytes,
        } => {
            assert_eq!(content_type, "image/png");
            assert_eq!(bytes, vec![0x89, b'P', b'N', b'G']);
        }
        other => panic!("expected asset, got {:?}", other),
    }
    assert!(matches!(
        resolve_page("/img/diagram.SVG", &neptune()).unwrap(),
        ContentPage::Asset { content_type: "image/svg+xml", .. }
    ));
}

#[test]
fn test_unrecognized_extension() {
    let err = resolve_page("/notes.txt", &neptune()).unwrap_err();
    assert!(matches!(err, ResolveError::UnrecognizedExtension { ref path } if path == "notes.txt"));
    assert_eq!(err.status(), StatusCode::EXPECTATION_FAILED);
}

#[test]
fn test_read_failure_after_probe_is_internal_error() {
    let err = resolve_page("/ghost.md", &VanishingFs).unwrap_err();
    assert!(matches!(err, ResolveError::Read { .. }));
    assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_node_kind_by_extension() {
    assert_eq!(NodeKind::of_file("a/b.md"), NodeKind::Markdown);
    assert_eq!(NodeKind::of_file("a.jpeg"), NodeKind::Image("image/jpeg"));
    assert_eq!(NodeKind::of_file("a.JPG"), NodeKind::Image("image/jpeg"));
    assert_eq!(NodeKind::of_file("a.gif"), NodeKind::Image("image/gif"));
    assert_eq!(NodeKind::of_file("Makefile"), NodeKind::Unrecognized);
}

#[test]
fn test_resolve_root_prefers_index() {
    let both = MemFs::new()
        .with_file("index.md", "index")
        .with_file("README.md", "readme");
    assert_eq!(resolve_root(&both).unwrap().path, "index.md");

    let readme_only = MemFs::new().with_file("README.md", "readme");
    assert_eq!(resolve_root(&readme_only).unwrap().path, "README.md");

    let neither = MemFs::new().with_file("other.md", "x");
    assert!(resolve_root(&neither).is_none());
}

#[test]
fn test_dir_fs_resolution() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("index.md"), "# Home\n").unwrap();
    fs::create_dir_all(root.join("subdir/deep")).unwrap();
    fs::write(root.join("subdir/deep/blue.md"), "---\ntitle: Blue\n---\nocean\n").unwrap();
    fs::write(root.join("subdir/deep.md"), "the deep page").unwrap();
    fs::write(root.join("photo.jpg"), b"\xff\xd8\xff").unwrap();

    let content = DirFs::new(root);

    let (title, body) = markdown(resolve_page("/subdir/deep/blue.md", &content).unwrap());
    assert_eq!(title, "Blue");
    assert_eq!(body, "ocean\n\n");

    // `subdir/deep` is a directory without documents, so `subdir/deep.md` is served.
    let (title, body) = markdown(resolve_page("/subdir/deep", &content).unwrap());
    assert_eq!(title, "subdir/deep");
    assert_eq!(body, "the deep page");

    assert!(matches!(
        resolve_page("/photo.jpg", &content).unwrap(),
        ContentPage::Asset { content_type: "image/jpeg", .. }
    ));
    assert!(matches!(
        resolve_page("/../outside.md", &content).unwrap_err(),
        ResolveError::Forbidden
    ));
}

#[test]
fn test_dir_fs_refuses_parent_segments() {
    let dir = tempfile::tempdir().unwrap();
    let content = DirFs::new(dir.path());
    let err = content.open("../etc/passwd").err().unwrap();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
}
