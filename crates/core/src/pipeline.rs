//! Sheet processing: fill, render and assemble, one row at a time.
//!
//! Row-level problems (unresolvable media, render failures) are reported and
//! the row is left out of the deck. Anything that goes wrong outside a row is
//! returned to the caller and ends the run.

use crate::config::{Config, MediaFailurePolicy};
use crate::error::{RenderError, ResolveError};
use crate::render::PageRenderer;
use crate::resolver::ResourceResolver;
use crate::template::TemplateFiller;
use crate::types::{DeckSummary, RenderedArtifact, Sheet};
use crate::Result;
use std::path::{Path, PathBuf};

/// Writes the deck for one sheet.
pub trait DeckAssembler {
    /// Write a deck with one content slide per artifact, in order, to `output`.
    fn assemble(&self, artifacts: &[PathBuf], output: &Path) -> Result<DeckSummary>;

    /// Check that a rendered image can go into a deck.
    ///
    /// Rows whose image is rejected here are reported and left out of the deck.
    fn check_artifact(&self, _artifact: &Path) -> Result<()> {
        Ok(())
    }
}

/// What happened to a single row.
#[derive(Debug)]
pub enum RowOutcome {
    /// The row was rendered and will get a slide.
    Rendered {
        artifact: RenderedArtifact,
        /// Media that failed to resolve but was tolerated by the policy.
        media_warning: Option<ResolveError>,
    },

    /// The row's media could not be resolved and the row was dropped.
    Skipped { row_index: usize, reason: ResolveError },

    /// The renderer failed for this row.
    RenderFailed { row_index: usize, error: RenderError },
}

impl RowOutcome {
    pub fn row_index(&self) -> usize {
        match self {
            RowOutcome::Rendered { artifact, .. } => artifact.row_index,
            RowOutcome::Skipped { row_index, .. } | RowOutcome::RenderFailed { row_index, .. } => {
                *row_index
            }
        }
    }

    pub fn artifact(&self) -> Option<&RenderedArtifact> {
        match self {
            RowOutcome::Rendered { artifact, .. } => Some(artifact),
            _ => None,
        }
    }
}

/// Result of processing one sheet.
#[derive(Debug)]
pub struct SheetReport {
    pub sheet: String,
    pub outcomes: Vec<RowOutcome>,
    pub deck: DeckSummary,
}

impl SheetReport {
    /// Number of rows that made it into the deck.
    pub fn rendered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.artifact().is_some()).count()
    }

    /// Number of rows left out of the deck.
    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.rendered_count()
    }
}

/// Drives the resolver, filler, renderer and assembler for each sheet.
pub struct Pipeline {
    config: Config,
    resolver: ResourceResolver,
    filler: TemplateFiller,
    renderer: Box<dyn PageRenderer>,
    assembler: Box<dyn DeckAssembler>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        resolver: ResourceResolver,
        filler: TemplateFiller,
        renderer: Box<dyn PageRenderer>,
        assembler: Box<dyn DeckAssembler>,
    ) -> Self {
        Self {
            config,
            resolver,
            filler,
            renderer,
            assembler,
        }
    }

    /// Process every row of `sheet` in order, then write its deck.
    ///
    /// `on_row` sees each outcome as soon as the row is done.
    pub fn process_sheet(
        &mut self,
        sheet: &Sheet,
        mut on_row: impl FnMut(&RowOutcome),
    ) -> Result<SheetReport> {
        std::fs::create_dir_all(self.config.output_dir_path())?;

        let mut outcomes = Vec::with_capacity(sheet.rows.len());

        for (row_index, row) in sheet.rows.iter().enumerate() {
            let page = self.filler.fill(&mut self.resolver, row, row_index);

            let outcome = match page.media_failure {
                Some(reason) if self.config.media_failure == MediaFailurePolicy::Skip => {
                    log::warn!(
                        "Sheet '{}' row {}: skipped, media unavailable: {}",
                        sheet.name,
                        row_index + 1,
                        reason
                    );
                    RowOutcome::Skipped { row_index, reason }
                }
                media_warning => match self
                    .renderer
                    .render(&page.html, &sheet.name, row_index)
                    .and_then(|path| match self.assembler.check_artifact(&path) {
                        Ok(()) => Ok(path),
                        Err(e) => Err(RenderError::UnusableOutput {
                            path,
                            message: e.to_string(),
                        }),
                    }) {
                    Ok(path) => RowOutcome::Rendered {
                        artifact: RenderedArtifact {
                            sheet: sheet.name.clone(),
                            row_index,
                            path,
                        },
                        media_warning,
                    },
                    Err(error) => {
                        log::warn!(
                            "Sheet '{}' row {}: render failed: {}",
                            sheet.name,
                            row_index + 1,
                            error
                        );
                        RowOutcome::RenderFailed { row_index, error }
                    }
                },
            };

            on_row(&outcome);
            outcomes.push(outcome);
        }

        let artifacts: Vec<PathBuf> = outcomes
            .iter()
            .filter_map(RowOutcome::artifact)
            .map(|a| a.path.clone())
            .collect();

        let deck = self
            .assembler
            .assemble(&artifacts, &self.config.deck_path(&sheet.name))?;

        log::debug!(
            "Sheet '{}': {} of {} rows rendered, cache {} hit(s) / {} miss(es)",
            sheet.name,
            artifacts.len(),
            sheet.rows.len(),
            self.resolver.cache().hits(),
            self.resolver.cache().misses()
        );

        Ok(SheetReport {
            sheet: sheet.name.clone(),
            outcomes,
            deck,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceCache;
    use crate::error::FetchError;
    use crate::resolver::tests::FakeFetcher;
    use crate::resolver::RetryPolicy;
    use crate::types::{CellValue, Row};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    /// Records pages; fails for the listed row indices.
    struct FakeRenderer {
        pages: Rc<RefCell<Vec<String>>>,
        fail_rows: Vec<usize>,
    }

    impl PageRenderer for FakeRenderer {
        fn render(&self, html: &str, sheet: &str, row_index: usize) -> std::result::Result<PathBuf, RenderError> {
            if self.fail_rows.contains(&row_index) {
                return Err(RenderError::BrowserFailed {
                    status: "exit status: 1".to_string(),
                    stderr: "crashed".to_string(),
                });
            }
            self.pages.borrow_mut().push(html.to_string());
            Ok(PathBuf::from(format!("{}_page_{}.png", sheet, row_index + 1)))
        }
    }

    struct FakeAssembler {
        decks: Rc<RefCell<Vec<(Vec<PathBuf>, PathBuf)>>>,
        rejected: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl DeckAssembler for FakeAssembler {
        fn check_artifact(&self, artifact: &Path) -> Result<()> {
            if self.rejected.borrow().iter().any(|r| r == artifact) {
                return Err(crate::Error::AssemblyError("truncated image".to_string()));
            }
            Ok(())
        }

        fn assemble(&self, artifacts: &[PathBuf], output: &Path) -> Result<DeckSummary> {
            self.decks
                .borrow_mut()
                .push((artifacts.to_vec(), output.to_path_buf()));
            Ok(DeckSummary {
                path: output.to_path_buf(),
                slide_count: artifacts.len() + 2,
                content_slides: artifacts.len(),
                header_pictures: 0,
            })
        }
    }

    struct Harness {
        pipeline: Pipeline,
        pages: Rc<RefCell<Vec<String>>>,
        decks: Rc<RefCell<Vec<(Vec<PathBuf>, PathBuf)>>>,
        rejected: Rc<RefCell<Vec<PathBuf>>>,
    }

    fn harness(
        base: &Path,
        policy: MediaFailurePolicy,
        fetcher: FakeFetcher,
        fail_rows: Vec<usize>,
    ) -> Harness {
        let mut config = Config::with_base_dir(base);
        config.media_failure = policy;

        let resolver = ResourceResolver::new(
            base,
            ResourceCache::in_memory(),
            Box::new(fetcher),
            RetryPolicy::new(3, Duration::ZERO),
        )
        .with_sleep(|_| {});
        let filler = TemplateFiller::new(
            "<h1>{{col2}}</h1><img src=\"{{col7}}\">",
            config.resolved_assets(),
        )
        .unwrap();

        let pages = Rc::new(RefCell::new(Vec::new()));
        let decks = Rc::new(RefCell::new(Vec::new()));
        let rejected = Rc::new(RefCell::new(Vec::new()));
        let pipeline = Pipeline::new(
            config,
            resolver,
            filler,
            Box::new(FakeRenderer {
                pages: pages.clone(),
                fail_rows,
            }),
            Box::new(FakeAssembler {
                decks: decks.clone(),
                rejected: rejected.clone(),
            }),
        );

        Harness {
            pipeline,
            pages,
            decks,
            rejected,
        }
    }

    fn sheet(rows: &[(&str, &str)]) -> Sheet {
        let mut sheet = Sheet::new("Team");
        sheet.headers = vec!["col2".to_string(), "col7".to_string()];
        sheet.rows = rows
            .iter()
            .map(|(title, media)| {
                Row::from_pairs([
                    ("col2", CellValue::Text(title.to_string())),
                    ("col7", CellValue::Text(media.to_string())),
                ])
            })
            .collect();
        sheet
    }

    fn three_rows_with_dead_url() -> (Sheet, FakeFetcher) {
        let fetcher = FakeFetcher::new()
            .script("https://img.test/1.png", vec![Ok(b"one".to_vec())])
            .script(
                "https://img.test/2.png",
                vec![Err(FetchError::Transport("operation timed out".to_string()))],
            )
            .script("https://img.test/3.png", vec![Ok(b"three".to_vec())]);
        let sheet = sheet(&[
            ("Row one", "https://img.test/1.png"),
            ("Row two", "https://img.test/2.png"),
            ("Row three", "https://img.test/3.png"),
        ]);
        (sheet, fetcher)
    }

    #[test]
    fn test_dead_media_row_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (sheet, fetcher) = three_rows_with_dead_url();
        let calls = fetcher.calls.clone();
        let mut h = harness(dir.path(), MediaFailurePolicy::Skip, fetcher, vec![]);

        let mut seen = Vec::new();
        let report = h
            .pipeline
            .process_sheet(&sheet, |o| seen.push(o.row_index()))
            .unwrap();

        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(report.rendered_count(), 2);
        assert_eq!(report.failed_count(), 1);
        assert!(matches!(
            &report.outcomes[1],
            RowOutcome::Skipped {
                row_index: 1,
                reason: ResolveError::RetriesExhausted { attempts: 3, .. }
            }
        ));
        assert_eq!(calls.get(), 5);

        let decks = h.decks.borrow();
        assert_eq!(decks.len(), 1);
        assert_eq!(
            decks[0].0,
            vec![
                PathBuf::from("Team_page_1.png"),
                PathBuf::from("Team_page_3.png")
            ]
        );
        assert_eq!(decks[0].1, dir.path().join("Team.pptx"));
        assert_eq!(report.deck.slide_count, 4);
        assert!(dir.path().join("output_images").is_dir());
    }

    #[test]
    fn test_placeholder_policy_renders_without_media() {
        let dir = tempfile::tempdir().unwrap();
        let (sheet, fetcher) = three_rows_with_dead_url();
        let mut h = harness(dir.path(), MediaFailurePolicy::Placeholder, fetcher, vec![]);

        let report = h.pipeline.process_sheet(&sheet, |_| {}).unwrap();

        assert_eq!(report.rendered_count(), 3);
        assert!(matches!(
            &report.outcomes[1],
            RowOutcome::Rendered {
                media_warning: Some(_),
                ..
            }
        ));
        assert_eq!(h.pages.borrow()[1], "<h1>Row two</h1><img src=\"\">");
    }

    #[test]
    fn test_render_failure_does_not_stop_the_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = sheet(&[("a", ""), ("b", ""), ("c", "")]);
        let mut h = harness(dir.path(), MediaFailurePolicy::Skip, FakeFetcher::new(), vec![0]);

        let report = h.pipeline.process_sheet(&sheet, |_| {}).unwrap();

        assert!(matches!(
            report.outcomes[0],
            RowOutcome::RenderFailed { row_index: 0, .. }
        ));
        assert_eq!(report.rendered_count(), 2);
        assert_eq!(
            h.decks.borrow()[0].0,
            vec![
                PathBuf::from("Team_page_2.png"),
                PathBuf::from("Team_page_3.png")
            ]
        );
    }

    #[test]
    fn test_unusable_image_is_a_render_failure() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = sheet(&[("a", ""), ("b", ""), ("c", "")]);
        let mut h = harness(dir.path(), MediaFailurePolicy::Skip, FakeFetcher::new(), vec![]);
        h.rejected.borrow_mut().push(PathBuf::from("Team_page_2.png"));

        let report = h.pipeline.process_sheet(&sheet, |_| {}).unwrap();

        match &report.outcomes[1] {
            RowOutcome::RenderFailed {
                row_index: 1,
                error: RenderError::UnusableOutput { path, message },
            } => {
                assert_eq!(path, &PathBuf::from("Team_page_2.png"));
                assert!(message.contains("truncated image"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(report.rendered_count(), 2);
        assert_eq!(
            h.decks.borrow()[0].0,
            vec![
                PathBuf::from("Team_page_1.png"),
                PathBuf::from("Team_page_3.png")
            ]
        );
    }

    #[test]
    fn test_empty_media_renders_with_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = sheet(&[("Only text", "")]);
        let mut h = harness(dir.path(), MediaFailurePolicy::Skip, FakeFetcher::new(), vec![]);

        let report = h.pipeline.process_sheet(&sheet, |_| {}).unwrap();

        assert_eq!(report.rendered_count(), 1);
        assert_eq!(
            h.pages.borrow().as_slice(),
            &["<h1>Only text</h1><img src=\"\">".to_string()]
        );
    }

    #[test]
    fn test_repeated_media_fetched_once_across_sheets() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://img.test/shared.png";
        let fetcher = FakeFetcher::new().script(url, vec![Ok(b"shared".to_vec())]);
        let calls = fetcher.calls.clone();
        let mut h = harness(dir.path(), MediaFailurePolicy::Skip, fetcher, vec![]);

        let sheet = sheet(&[("a", url), ("b", url)]);
        h.pipeline.process_sheet(&sheet, |_| {}).unwrap();
        h.pipeline.process_sheet(&sheet, |_| {}).unwrap();

        assert_eq!(calls.get(), 1);
        let pages = h.pages.borrow();
        assert_eq!(pages.len(), 4);
        assert!(pages
            .iter()
            .all(|p| p.ends_with("<img src=\"data:image/png;base64,c2hhcmVk\">")));
    }

    #[test]
    fn test_identical_runs_produce_identical_pages() {
        let dir = tempfile::tempdir().unwrap();
        let run = || {
            let (sheet, fetcher) = three_rows_with_dead_url();
            let mut h = harness(dir.path(), MediaFailurePolicy::Placeholder, fetcher, vec![]);
            h.pipeline.process_sheet(&sheet, |_| {}).unwrap();
            let pages = h.pages.borrow().clone();
            pages
        };

        assert_eq!(run(), run());
    }
}
