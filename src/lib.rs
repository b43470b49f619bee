// src/lib.rs

#![doc = r##"
# Asteroid

Asteroid serves a directory of markdown documents and media as a themed
website, and reloads its serving state whenever content or theme files change
(or on `SIGUSR1`), without restarting.

## Modules

- [`config`]: Configuration loading and merging from CLI, file, and environment.
- [`frontmatter`]: Front matter extraction from markdown documents.
- [`content`]: The content tree and request path resolution.
- [`compositor`]: Layered view templates and whole-tree theme selection.
- [`render`]: Markdown rendering and view placeholder substitution.
- [`snapshot`]: Immutable, fully composed request handlers.
- [`reload`]: Atomic republishing of the active handler.
- [`event`]: File change event struct.
- [`watcher`]: File system watcher for change detection.
- [`web`]: The HTTP server.

## Embedding

A host can serve an in-memory asteroid without the binary:

```no_run
use std::sync::Arc;
use asteroid::config::{ReloadFailurePolicy, SiteConfig};
use asteroid::content::MemFs;
use asteroid::reload::ReloadController;

let content = MemFs::new().with_file("index.md", "# Hello");
let site = SiteConfig::new(Arc::new(content)).with_name("neptune");
let controller = Arc::new(ReloadController::start(site, ReloadFailurePolicy::Exit)?);
let app = asteroid::web::router(controller);
# let _ = app;
# Ok::<(), asteroid::snapshot::BuildError>(())
```
"##]

pub mod compositor;
pub mod config;
pub mod content;
pub mod event;
pub mod frontmatter;
pub mod reload;
pub mod render;
pub mod snapshot;
pub mod watcher;
pub mod web;
