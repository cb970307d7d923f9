//! Core domain types, media resolution, template filling and the
//! row-to-slide rendering pipeline.

pub mod cache;
pub mod config;
pub mod error;
pub mod ooxml;
pub mod pipeline;
pub mod render;
pub mod resolver;
pub mod template;
pub mod types;

pub use cache::{CacheStore, DirStore, MemoryStore, ResourceCache};
pub use config::{AssetPaths, Config, MediaFailurePolicy};
pub use error::{Error, FetchError, RenderError, ResolveError, Result};
pub use pipeline::{DeckAssembler, Pipeline, RowOutcome, SheetReport};
pub use render::{BrowserRenderer, PageRenderer};
pub use resolver::{EmbeddedResource, Fetch, HttpFetcher, ResourceResolver, RetryPolicy};
pub use template::{FilledPage, Slot, TemplateFiller};
pub use types::{CellValue, DeckSummary, MediaReference, RenderedArtifact, Row, Sheet};
