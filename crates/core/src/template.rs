//! Template filling.
//!
//! Substitution is literal and limited to a fixed set of `{{name}}` tokens.
//! All tokens are replaced in one left-to-right pass, so text inserted for one
//! slot is never scanned again for another.

use crate::config::AssetPaths;
use crate::error::ResolveError;
use crate::resolver::ResourceResolver;
use crate::types::Row;
use crate::{Error, Result};
use aho_corasick::{AhoCorasick, MatchKind};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

/// Matches anything that looks like a placeholder, known or not.
static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*[A-Za-z0-9_.\-]+\s*\}\}").unwrap());

/// Row field that carries the media reference.
pub const MEDIA_FIELD: &str = "col7";

/// The fixed set of template slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Col2,
    Col3,
    Col4,
    Col5,
    Col6,
    Col7,
    LogoLeft,
    LogoRight,
    BottomStrip,
}

impl Slot {
    pub const ALL: [Slot; 9] = [
        Slot::Col2,
        Slot::Col3,
        Slot::Col4,
        Slot::Col5,
        Slot::Col6,
        Slot::Col7,
        Slot::LogoLeft,
        Slot::LogoRight,
        Slot::BottomStrip,
    ];

    /// Literal token as it appears in the template.
    pub fn token(self) -> &'static str {
        match self {
            Slot::Col2 => "{{col2}}",
            Slot::Col3 => "{{col3}}",
            Slot::Col4 => "{{col4}}",
            Slot::Col5 => "{{col5}}",
            Slot::Col6 => "{{col6}}",
            Slot::Col7 => "{{col7}}",
            Slot::LogoLeft => "{{logo_left}}",
            Slot::LogoRight => "{{logo_right}}",
            Slot::BottomStrip => "{{bottom_strip}}",
        }
    }

    /// Row field a text slot reads from.
    fn text_field(self) -> Option<&'static str> {
        match self {
            Slot::Col2 => Some("col2"),
            Slot::Col3 => Some("col3"),
            Slot::Col4 => Some("col4"),
            Slot::Col5 => Some("col5"),
            Slot::Col6 => Some("col6"),
            _ => None,
        }
    }
}

/// Output of filling the template for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilledPage {
    /// Self-contained HTML with every slot substituted.
    pub html: String,

    /// Set when the row's media reference was present but could not be resolved.
    pub media_failure: Option<ResolveError>,
}

/// Fills a template with row values and embedded media.
#[derive(Debug)]
pub struct TemplateFiller {
    template: String,
    matcher: AhoCorasick,
    assets: AssetPaths,
    unknown: Vec<String>,
}

impl TemplateFiller {
    /// Prepare `template`. `assets` should already be absolute paths.
    pub fn new(template: impl Into<String>, assets: AssetPaths) -> Result<Self> {
        let template = template.into();
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostLongest)
            .build(Slot::ALL.iter().map(|s| s.token()))
            .map_err(|e| Error::TemplateError(e.to_string()))?;

        let unknown = unknown_placeholders(&template);
        for token in &unknown {
            log::warn!("Template placeholder {} is not a known slot and will be left as-is", token);
        }

        Ok(Self {
            template,
            matcher,
            assets,
            unknown,
        })
    }

    /// Load the template from a file.
    pub fn from_file(path: &Path, assets: AssetPaths) -> Result<Self> {
        if !path.exists() {
            return Err(Error::MissingInput(path.to_path_buf()));
        }
        Self::new(std::fs::read_to_string(path)?, assets)
    }

    /// Placeholder-looking tokens outside the known slot set.
    pub fn unknown_placeholders(&self) -> &[String] {
        &self.unknown
    }

    /// Fill the template for the row at `row_index` (0-based).
    ///
    /// Missing fields become empty strings. A media reference that fails to
    /// resolve leaves its slot empty and is reported in the result.
    pub fn fill(
        &self,
        resolver: &mut ResourceResolver,
        row: &Row,
        row_index: usize,
    ) -> FilledPage {
        let mut media_failure = None;
        let mut values = Vec::with_capacity(Slot::ALL.len());

        for slot in Slot::ALL {
            let value = match slot {
                Slot::Col7 => match resolver.resolve(&row.text(MEDIA_FIELD), row_index) {
                    Ok(Some(resource)) => resource.to_data_uri(),
                    Ok(None) => String::new(),
                    Err(e) => {
                        media_failure = Some(e);
                        String::new()
                    }
                },
                Slot::LogoLeft => embed_asset(resolver, &self.assets.logo_left, row_index),
                Slot::LogoRight => embed_asset(resolver, &self.assets.logo_right, row_index),
                Slot::BottomStrip => embed_asset(resolver, &self.assets.bottom_strip, row_index),
                text => text.text_field().map(|f| row.text(f)).unwrap_or_default(),
            };
            values.push(value);
        }

        FilledPage {
            html: self.matcher.replace_all(&self.template, &values),
            media_failure,
        }
    }
}

/// Decorative assets are optional: a missing file is an empty slot, silently.
fn embed_asset(resolver: &mut ResourceResolver, path: &Path, row_index: usize) -> String {
    if !path.exists() {
        log::debug!("Decorative asset {} not present", path.display());
        return String::new();
    }

    match resolver.resolve(&path.to_string_lossy(), row_index) {
        Ok(Some(resource)) => resource.to_data_uri(),
        Ok(None) => String::new(),
        Err(e) => {
            log::warn!("Decorative asset {} unusable: {}", path.display(), e);
            String::new()
        }
    }
}

fn unknown_placeholders(template: &str) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for m in PLACEHOLDER_REGEX.find_iter(template) {
        let token = m.as_str();
        if !Slot::ALL.iter().any(|s| s.token() == token) && !unknown.iter().any(|u| u == token) {
            unknown.push(token.to_string());
        }
    }
    unknown
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResourceCache;
    use crate::error::FetchError;
    use crate::resolver::tests::FakeFetcher;
    use crate::resolver::RetryPolicy;
    use crate::types::CellValue;
    use std::time::Duration;

    const TEMPLATE: &str = "<h1>{{col2}}</h1><p>{{col3}}|{{col4}}|{{col5}}|{{col6}}</p>\
        <img src=\"{{col7}}\"><img src=\"{{logo_left}}\"><img src=\"{{logo_right}}\">\
        <img src=\"{{bottom_strip}}\">";

    fn resolver(base: &Path, fetcher: FakeFetcher) -> ResourceResolver {
        ResourceResolver::new(
            base,
            ResourceCache::in_memory(),
            Box::new(fetcher),
            RetryPolicy::new(2, Duration::ZERO),
        )
        .with_sleep(|_| {})
    }

    fn no_assets(dir: &Path) -> AssetPaths {
        AssetPaths {
            logo_left: dir.join("logo_left.png"),
            logo_right: dir.join("logo_right.png"),
            bottom_strip: dir.join("bottom_strip.png"),
        }
    }

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_fill_replaces_every_known_slot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("logo_left.png"), b"L").unwrap();

        let url = "https://img.test/p.png";
        let mut resolver = resolver(dir.path(), FakeFetcher::new().script(url, vec![Ok(b"P".to_vec())]));
        let filler = TemplateFiller::new(TEMPLATE, no_assets(dir.path())).unwrap();

        let row = Row::from_pairs([
            ("col2", text("Title")),
            ("col3", CellValue::Number(42.0)),
            ("col4", text("c")),
            ("col5", text("d")),
            ("col6", text("e")),
            ("col7", text(url)),
        ]);

        let page = filler.fill(&mut resolver, &row, 0);
        assert!(page.media_failure.is_none());
        assert!(page.html.starts_with("<h1>Title</h1><p>42|c|d|e</p>"));
        assert!(page.html.contains("src=\"data:image/png;base64,UA==\""));
        assert!(page.html.contains("src=\"data:image/png;base64,TA==\""));
        for slot in Slot::ALL {
            assert!(!page.html.contains(slot.token()), "{} left behind", slot.token());
        }
    }

    #[test]
    fn test_missing_fields_and_assets_are_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(dir.path(), FakeFetcher::new());
        let filler = TemplateFiller::new(TEMPLATE, no_assets(dir.path())).unwrap();

        let page = filler.fill(&mut resolver, &Row::new(), 3);
        assert_eq!(
            page.html,
            "<h1></h1><p>|||</p><img src=\"\"><img src=\"\"><img src=\"\"><img src=\"\">"
        );
        assert!(page.media_failure.is_none());
    }

    #[test]
    fn test_inserted_values_are_not_rescanned() {
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = resolver(dir.path(), FakeFetcher::new());
        let filler = TemplateFiller::new("{{col2}}-{{col3}}", no_assets(dir.path())).unwrap();

        let row = Row::from_pairs([("col2", text("{{col3}}")), ("col3", text("x"))]);
        assert_eq!(filler.fill(&mut resolver, &row, 0).html, "{{col3}}-x");
    }

    #[test]
    fn test_media_failure_reported_with_empty_slot() {
        let dir = tempfile::tempdir().unwrap();
        let url = "https://img.test/down.jpg";
        let mut resolver = resolver(
            dir.path(),
            FakeFetcher::new().script(url, vec![Err(FetchError::Transport("timeout".into()))]),
        );
        let filler = TemplateFiller::new("<img src=\"{{col7}}\">", no_assets(dir.path())).unwrap();

        let row = Row::from_pairs([("col7", text(url))]);
        let page = filler.fill(&mut resolver, &row, 1);
        assert_eq!(page.html, "<img src=\"\">");
        assert!(matches!(
            page.media_failure,
            Some(ResolveError::RetriesExhausted { attempts: 2, .. })
        ));
    }

    #[test]
    fn test_fill_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pic.gif"), b"GIF89a").unwrap();
        let filler = TemplateFiller::new(TEMPLATE, no_assets(dir.path())).unwrap();
        let row = Row::from_pairs([("col2", text("a")), ("col7", text("pic.gif"))]);

        let first = filler.fill(&mut resolver(dir.path(), FakeFetcher::new()), &row, 0);
        let second = filler.fill(&mut resolver(dir.path(), FakeFetcher::new()), &row, 0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_unknown_placeholders_detected() {
        let filler = TemplateFiller::new(
            "{{col2}} {{ col3 }} {{col8}} {{col8}} {{logo_left}}",
            AssetPaths::default(),
        )
        .unwrap();
        assert_eq!(filler.unknown_placeholders(), &["{{ col3 }}", "{{col8}}"]);
    }

    #[test]
    fn test_from_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = TemplateFiller::from_file(&dir.path().join("template.html"), AssetPaths::default())
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }
}
