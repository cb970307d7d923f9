//! Run configuration.
//!
//! Every path the pipeline touches is derived from a single base directory.
//! Defaults can be overridden by an optional `present_me.toml` in that
//! directory (or an explicit config file), and the binary layers its flags on
//! top of whatever was loaded.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the optional config file looked up in the base directory.
pub const CONFIG_FILE_NAME: &str = "present_me.toml";

/// Browser-like identification sent with media downloads.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Complete configuration for one run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory every relative path is resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,

    /// Input workbook.
    pub workbook: PathBuf,

    /// HTML template with `{{...}}` placeholders.
    pub template: PathBuf,

    /// Where rendered images and debug markup go.
    pub output_dir: PathBuf,

    /// Where downloaded media is kept when the persistent cache is enabled.
    pub resource_dir: PathBuf,

    /// Decorative images used by the template and the header/footer slides.
    pub assets: AssetPaths,

    /// What to do with a row whose media reference cannot be resolved.
    pub media_failure: MediaFailurePolicy,

    pub fetch: FetchConfig,
    pub render: RenderConfig,
    pub cache: CacheConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::new(),
            workbook: PathBuf::from("data.xlsx"),
            template: PathBuf::from("template.html"),
            output_dir: PathBuf::from("output_images"),
            resource_dir: PathBuf::from("resource_images"),
            assets: AssetPaths::default(),
            media_failure: MediaFailurePolicy::default(),
            fetch: FetchConfig::default(),
            render: RenderConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Config {
    /// Default configuration rooted at `base_dir`.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration for `base_dir`.
    ///
    /// An explicit config file must exist. Without one, `present_me.toml` in
    /// the base directory is used when present, otherwise the defaults.
    pub fn load(base_dir: impl Into<PathBuf>, explicit: Option<&Path>) -> Result<Self> {
        let base_dir = base_dir.into();

        let file = match explicit {
            Some(path) if !path.exists() => return Err(Error::MissingInput(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Some(base_dir.join(CONFIG_FILE_NAME)).filter(|p| p.exists()),
        };

        let mut config = match file {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };

        config.base_dir = base_dir;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text. The base directory is left empty.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            return Err(Error::ConfigError(
                "fetch.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.render.viewport_width == 0 || self.render.viewport_height == 0 {
            return Err(Error::ConfigError(
                "render viewport must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve a path against the base directory unless it is absolute.
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn workbook_path(&self) -> PathBuf {
        self.resolve_path(&self.workbook)
    }

    pub fn template_path(&self) -> PathBuf {
        self.resolve_path(&self.template)
    }

    pub fn output_dir_path(&self) -> PathBuf {
        self.resolve_path(&self.output_dir)
    }

    pub fn resource_dir_path(&self) -> PathBuf {
        self.resolve_path(&self.resource_dir)
    }

    /// Output deck path for a sheet: `<base>/<sheet>.pptx`.
    pub fn deck_path(&self, sheet_name: &str) -> PathBuf {
        self.base_dir
            .join(format!("{}.pptx", sanitize_file_stem(sheet_name)))
    }

    /// Absolute locations of the decorative assets.
    pub fn resolved_assets(&self) -> AssetPaths {
        AssetPaths {
            logo_left: self.resolve_path(&self.assets.logo_left),
            logo_right: self.resolve_path(&self.assets.logo_right),
            bottom_strip: self.resolve_path(&self.assets.bottom_strip),
        }
    }
}

/// The three fixed decorative images.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssetPaths {
    pub logo_left: PathBuf,
    pub logo_right: PathBuf,
    pub bottom_strip: PathBuf,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            logo_left: PathBuf::from("logo_left.png"),
            logo_right: PathBuf::from("logo_right.png"),
            bottom_strip: PathBuf::from("bottom_strip.png"),
        }
    }
}

/// Handling of rows whose media reference fails to resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFailurePolicy {
    /// Leave the row out of the deck.
    #[default]
    Skip,
    /// Render the row with an empty media slot.
    Placeholder,
}

/// Media download settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Per-attempt timeout, in seconds.
    pub timeout_secs: u64,

    /// Total number of attempts per reference (first try included).
    pub max_attempts: u32,

    /// Base delay between attempts, in milliseconds; attempt `n` waits `n` times this.
    pub retry_delay_ms: u64,

    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            max_attempts: 3,
            retry_delay_ms: 2000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Headless browser settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Browser executable; searched on `PATH` when unset.
    pub browser: Option<PathBuf>,

    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Additional command-line flags passed to the browser.
    pub extra_flags: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            browser: None,
            viewport_width: 2500,
            viewport_height: 2000,
            extra_flags: Vec::new(),
        }
    }
}

/// Resource cache settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// Keep downloaded media in `resource_dir` across runs.
    pub persist: bool,
}

/// Default base directory: `~/Desktop/present_me`.
pub fn default_base_dir() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(|home| PathBuf::from(home).join("Desktop").join("present_me"))
        .unwrap_or_else(|| PathBuf::from("present_me"))
}

/// Make a sheet name safe to use as a file name stem.
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "sheet".to_string()
    } else {
        trimmed.to_string()
    }
}
