//! Page rendering through a headless browser.
//!
//! Filled templates are self-contained, so the browser only ever loads a
//! single local file. The file doubles as the debug copy of the page and
//! stays next to the screenshot.

use crate::config::{sanitize_file_stem, Config, RenderConfig};
use crate::error::RenderError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Browser executables tried, in order, when none is configured.
pub const BROWSER_CANDIDATES: &[&str] = &[
    "chromium",
    "chromium-browser",
    "google-chrome",
    "google-chrome-stable",
    "chrome",
    "msedge",
];

/// Turns a filled template into an image file.
pub trait PageRenderer {
    /// Render `html` for the row at `row_index` (0-based) of `sheet_name`,
    /// returning the path of the image.
    fn render(&self, html: &str, sheet_name: &str, row_index: usize) -> Result<PathBuf, RenderError>;
}

/// Renderer backed by a Chromium-family browser in headless screenshot mode.
#[derive(Debug, Clone)]
pub struct BrowserRenderer {
    browser: PathBuf,
    output_dir: PathBuf,
    viewport: (u32, u32),
    extra_flags: Vec<String>,
}

impl BrowserRenderer {
    pub fn new(browser: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, config: &RenderConfig) -> Self {
        Self {
            browser: browser.into(),
            output_dir: output_dir.into(),
            viewport: (config.viewport_width, config.viewport_height),
            extra_flags: config.extra_flags.clone(),
        }
    }

    /// Renderer for a run, locating the browser if none is configured.
    pub fn from_config(config: &Config) -> Result<Self, RenderError> {
        let browser = find_browser(config.render.browser.as_deref())?;
        log::debug!("Using browser {}", browser.display());
        Ok(Self::new(browser, config.output_dir_path(), &config.render))
    }

    pub fn browser(&self) -> &Path {
        &self.browser
    }

    /// Debug markup and image paths for a row.
    pub fn artifact_paths(&self, sheet_name: &str, row_index: usize) -> (PathBuf, PathBuf) {
        let stem = artifact_stem(sheet_name, row_index);
        (
            self.output_dir.join(format!("{}.html", stem)),
            self.output_dir.join(format!("{}.png", stem)),
        )
    }

    fn command_args(&self, page: &Path, screenshot: &Path) -> Vec<OsString> {
        let mut screenshot_flag = OsString::from("--screenshot=");
        screenshot_flag.push(screenshot);

        let mut args: Vec<OsString> = vec![
            "--headless".into(),
            "--disable-gpu".into(),
            "--hide-scrollbars".into(),
            "--allow-file-access-from-files".into(),
            "--disable-web-security".into(),
            format!("--window-size={},{}", self.viewport.0, self.viewport.1).into(),
            screenshot_flag,
        ];
        args.extend(self.extra_flags.iter().map(OsString::from));
        args.push(file_url(page).into());
        args
    }
}

impl PageRenderer for BrowserRenderer {
    fn render(&self, html: &str, sheet_name: &str, row_index: usize) -> Result<PathBuf, RenderError> {
        let (page, screenshot) = self.artifact_paths(sheet_name, row_index);

        std::fs::write(&page, html).map_err(|source| RenderError::DebugMarkup {
            path: page.clone(),
            source,
        })?;

        // A stale image from an earlier run must not pass for this one.
        if screenshot.exists() {
            std::fs::remove_file(&screenshot).map_err(|source| RenderError::StaleOutput {
                path: screenshot.clone(),
                source,
            })?;
        }

        let output = Command::new(&self.browser)
            .args(self.command_args(&page, &screenshot))
            .output()
            .map_err(|source| RenderError::Spawn {
                browser: self.browser.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RenderError::BrowserFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if !screenshot.exists() {
            return Err(RenderError::MissingOutput(screenshot));
        }

        Ok(screenshot)
    }
}

/// `<sheet>_page_<n>` with `n` the 1-based row number.
pub fn artifact_stem(sheet_name: &str, row_index: usize) -> String {
    format!("{}_page_{}", sanitize_file_stem(sheet_name), row_index + 1)
}

/// Locate the browser: the configured one, else the first candidate on `PATH`.
pub fn find_browser(configured: Option<&Path>) -> Result<PathBuf, RenderError> {
    if let Some(path) = configured {
        if path.components().count() > 1 || path.is_file() {
            return Ok(path.to_path_buf());
        }
        return search_path(path.as_os_str())
            .ok_or_else(|| RenderError::BrowserNotFound(path.display().to_string()));
    }

    BROWSER_CANDIDATES
        .iter()
        .find_map(|name| search_path(name.as_ref()))
        .ok_or_else(|| RenderError::BrowserNotFound(BROWSER_CANDIDATES.join(", ")))
}

fn search_path(name: &std::ffi::OsStr) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = candidate.with_extension("exe");
        exe.is_file().then_some(exe)
    })
}

/// `file://` URL for a local path, with the characters browsers choke on escaped.
pub fn file_url(path: &Path) -> String {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let raw = absolute.to_string_lossy().replace('\\', "/");

    let mut url = String::from("file://");
    if !raw.starts_with('/') {
        url.push('/');
    }
    for c in raw.chars() {
        match c {
            ' ' => url.push_str("%20"),
            '#' => url.push_str("%23"),
            '%' => url.push_str("%25"),
            '?' => url.push_str("%3F"),
            c => url.push(c),
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer(dir: &Path) -> BrowserRenderer {
        BrowserRenderer::new("/usr/bin/chromium", dir, &RenderConfig::default())
    }

    #[test]
    fn test_artifact_paths_are_named_by_sheet_and_row() {
        let r = renderer(Path::new("/out"));
        let (html, png) = r.artifact_paths("Team A", 0);
        assert_eq!(html, PathBuf::from("/out/Team A_page_1.html"));
        assert_eq!(png, PathBuf::from("/out/Team A_page_1.png"));
        assert_eq!(artifact_stem("a/b", 9), "a_b_page_10");
    }

    #[test]
    fn test_command_args() {
        let r = BrowserRenderer::new(
            "chromium",
            "/out",
            &RenderConfig {
                extra_flags: vec!["--no-sandbox".to_string()],
                ..RenderConfig::default()
            },
        );
        let args: Vec<String> = r
            .command_args(Path::new("/out/S_page_1.html"), Path::new("/out/S_page_1.png"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert!(args.contains(&"--headless".to_string()));
        assert!(args.contains(&"--allow-file-access-from-files".to_string()));
        assert!(args.contains(&"--disable-web-security".to_string()));
        assert!(args.contains(&"--window-size=2500,2000".to_string()));
        assert!(args.contains(&"--screenshot=/out/S_page_1.png".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert_eq!(args.last().unwrap(), "file:///out/S_page_1.html");
    }

    #[test]
    fn test_file_url_escapes() {
        assert_eq!(
            file_url(Path::new("/data/My Sheet#1_page_1.html")),
            "file:///data/My%20Sheet%231_page_1.html"
        );
    }

    #[test]
    fn test_find_browser_configured_path() {
        let found = find_browser(Some(Path::new("/opt/browser/chrome"))).unwrap();
        assert_eq!(found, PathBuf::from("/opt/browser/chrome"));

        assert!(matches!(
            find_browser(Some(Path::new("definitely-not-a-browser-xyz"))),
            Err(RenderError::BrowserNotFound(_))
        ));
    }

    #[test]
    fn test_undeletable_stale_image_is_reported_as_such() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the image should go cannot be removed as a file.
        let blocked = dir.path().join("Sheet1_page_1.png");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), b"x").unwrap();

        let renderer = BrowserRenderer::new("/nonexistent/browser", dir.path(), &RenderConfig::default());
        match renderer.render("<p>hi</p>", "Sheet1", 0) {
            Err(RenderError::StaleOutput { path, .. }) => assert_eq!(path, blocked),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_render_with_scripted_browser() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };

        let ok = script(
            "fake-browser",
            "#!/bin/sh\nfor a in \"$@\"; do case \"$a\" in --screenshot=*) printf png > \"${a#--screenshot=}\";; esac; done\n",
        );
        let failing = script("broken-browser", "#!/bin/sh\necho boom >&2\nexit 3\n");
        let silent = script("silent-browser", "#!/bin/sh\nexit 0\n");

        let out = dir.path().join("out");
        std::fs::create_dir(&out).unwrap();

        let renderer = BrowserRenderer::new(&ok, &out, &RenderConfig::default());
        let png = renderer.render("<p>hi</p>", "Sheet1", 2).unwrap();
        assert_eq!(png, out.join("Sheet1_page_3.png"));
        assert_eq!(std::fs::read(&png).unwrap(), b"png");
        assert_eq!(
            std::fs::read_to_string(out.join("Sheet1_page_3.html")).unwrap(),
            "<p>hi</p>"
        );

        let renderer = BrowserRenderer::new(&failing, &out, &RenderConfig::default());
        match renderer.render("<p>hi</p>", "Sheet1", 2) {
            Err(RenderError::BrowserFailed { stderr, .. }) => assert_eq!(stderr, "boom"),
            other => panic!("unexpected: {:?}", other),
        }

        let renderer = BrowserRenderer::new(&silent, &out, &RenderConfig::default());
        assert!(matches!(
            renderer.render("<p>hi</p>", "Sheet1", 2),
            Err(RenderError::MissingOutput(_))
        ));
    }
}
