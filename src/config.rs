use crate::error::{Error, Result};
use crate::internal::render::{
    DEFAULT_CONTAINER_SELECTOR, DEFAULT_LOADING_SELECTOR, DEFAULT_PREVIEW_URL, RenderOptions,
};
use ron::extensions::Extensions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "snapshot-render.ron";
/// Key of the configuration block inside a `package.json`.
pub const PACKAGE_JSON_KEY: &str = "snapshotRender";

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory searched for snapshot fixtures.
    #[serde(rename = "in")]
    pub input: Option<PathBuf>,
    /// Root directory the images are written under.
    pub out: Option<PathBuf>,
    /// Categories to skip entirely.
    pub exclude: Vec<String>,
    pub render: RenderConfig,
    pub logging: LoggingConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    /// WebDriver server driving the browser (e.g. chromedriver).
    pub webdriver_url: String,
    /// Message preview page; the payload is appended as `msg=`.
    pub preview_url: String,
    pub loading_selector: String,
    pub container_selector: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub padding: f64,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    /// Extra arguments for the browser binary.
    pub browser_args: Vec<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            preview_url: DEFAULT_PREVIEW_URL.to_string(),
            loading_selector: DEFAULT_LOADING_SELECTOR.to_string(),
            container_selector: DEFAULT_CONTAINER_SELECTOR.to_string(),
            timeout_secs: 30,
            poll_interval_ms: 100,
            padding: 0.0,
            viewport_width: 1000,
            viewport_height: 600,
            device_scale_factor: 2.0,
            browser_args: Vec::new(),
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            preview_url: self.preview_url.clone(),
            loading_selector: self.loading_selector.clone(),
            container_selector: self.container_selector.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
            padding: self.padding,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level (trace|debug|info|warn|error).
    pub level: String,
    /// Per-module overrides, e.g. `"snapshot_render::api": "debug"`.
    pub module_levels: BTreeMap<String, String>,
    /// When set, logs go to a daily file in this directory instead of stderr.
    pub log_directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            module_levels: BTreeMap::new(),
            log_directory: None,
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directive built from the base level and module overrides.
    pub fn filter_directive(&self) -> String {
        let mut filter = self.level.clone();
        for (module, level) in &self.module_levels {
            filter.push_str(&format!(",{}={}", module, level));
        }
        filter
    }
}

impl AppConfig {
    /// Load from `explicit` if given, otherwise from the first configuration
    /// found in the usual places. Nothing found means defaults; a file that is
    /// found but unreadable is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        let local = PathBuf::from(CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from(&local);
        }

        let package_json = PathBuf::from("package.json");
        if package_json.exists() {
            let content = read(&package_json)?;
            if let Some(config) = Self::from_package_json(&content, &package_json)? {
                return Ok(Self {
                    loaded_from: Some(package_json),
                    ..config
                });
            }
        }

        let mut fallbacks = Vec::new();
        if let Ok(exe) = std::env::current_exe()
            && let Some(dir) = exe.parent()
        {
            fallbacks.push(dir.join(CONFIG_FILE_NAME));
        }
        if let Some(dir) = dirs::config_dir() {
            fallbacks.push(dir.join("snapshot-render").join("config.ron"));
        }
        for path in fallbacks {
            if path.exists() {
                return Self::load_from(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load a RON file, or a JSON file (optionally a `package.json` carrying the
    /// block under [`PACKAGE_JSON_KEY`]).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = read(path)?;
        let config = if path.extension().is_some_and(|ext| ext == "json") {
            match Self::from_package_json(&content, path)? {
                Some(config) => config,
                None => serde_json::from_str(&content).map_err(|e| Error::config(path, e))?,
            }
        } else {
            Self::from_ron(&content).map_err(|e| Error::config(path, e))?
        };
        Ok(Self {
            loaded_from: Some(path.to_path_buf()),
            ..config
        })
    }

    pub fn from_ron(content: &str) -> std::result::Result<Self, ron::error::SpannedError> {
        ron::Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .from_str(content)
    }

    fn from_package_json(content: &str, path: &Path) -> Result<Option<Self>> {
        let package: serde_json::Value =
            serde_json::from_str(content).map_err(|e| Error::config(path, e))?;
        match package.get(PACKAGE_JSON_KEY) {
            Some(block) => serde_json::from_value(block.clone())
                .map(Some)
                .map_err(|e| Error::config(path, e)),
            None => Ok(None),
        }
    }
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::config(path, e))
}

/// Values given on the command line; they win over the configuration file.
#[derive(Debug, Default, Clone)]
pub struct CliOverrides {
    pub input: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub exclude: Vec<String>,
    pub webdriver_url: Option<String>,
}

/// Fully merged run settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub input: PathBuf,
    pub output: PathBuf,
    pub exclude: Vec<String>,
    pub render: RenderConfig,
}

impl Settings {
    pub fn resolve(config: AppConfig, overrides: &CliOverrides) -> Result<Self> {
        let input = overrides.input.clone().or(config.input);
        let output = overrides.out.clone().or(config.out);
        let (Some(input), Some(output)) = (input, output) else {
            return Err(Error::MissingPaths);
        };

        let mut exclude = config.exclude;
        for category in &overrides.exclude {
            if !exclude.contains(category) {
                exclude.push(category.clone());
            }
        }

        let mut render = config.render;
        if let Some(url) = &overrides.webdriver_url {
            render.webdriver_url = url.clone();
        }

        Ok(Self {
            input,
            output,
            exclude,
            render,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.input.is_none());
        assert_eq!(config.render.timeout_secs, 30);
        assert_eq!(config.render.viewport_width, 1000);
        assert_eq!(config.render.device_scale_factor, 2.0);
        assert_eq!(config.render.options().timeout, Duration::from_secs(30));
        assert_eq!(config.render.options().padding, 0.0);
        assert_eq!(config.logging.filter_directive(), "info");
    }

    #[test]
    fn test_ron_without_some_wrappers() {
        let config = AppConfig::from_ron(
            r#"(
    // fixtures live next to the components
    in: "src/components",
    out: "docs/messages",
    exclude: ["Internal", "Forms/Legacy"],
    render: (timeout_secs: 10),
)"#,
        )
        .unwrap();

        assert_eq!(config.input, Some(PathBuf::from("src/components")));
        assert_eq!(config.out, Some(PathBuf::from("docs/messages")));
        assert_eq!(config.exclude, vec!["Internal", "Forms/Legacy"]);
        assert_eq!(config.render.timeout_secs, 10);
        assert_eq!(config.render.container_selector, "#msgs_div");
    }

    #[test]
    fn test_package_json_block() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("package.json");
        fs::write(
            &path,
            r#"{"name": "app", "snapshotRender": {"in": "fixtures", "out": "shots", "exclude": ["Button"]}}"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.input, Some(PathBuf::from("fixtures")));
        assert_eq!(config.exclude, vec!["Button"]);
        assert_eq!(config.loaded_from, Some(path));
    }

    #[test]
    fn test_unparsable_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot-render.ron");
        fs::write(&path, "(in: ").unwrap();

        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/no/such/config.ron"))).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_cli_overrides_take_precedence() {
        let config = AppConfig {
            input: Some("from-config".into()),
            out: Some("out-config".into()),
            exclude: vec!["Button".into()],
            ..Default::default()
        };
        let overrides = CliOverrides {
            input: Some("from-cli".into()),
            exclude: vec!["Card".into(), "Button".into()],
            webdriver_url: Some("http://127.0.0.1:4444".into()),
            ..Default::default()
        };

        let settings = Settings::resolve(config, &overrides).unwrap();

        assert_eq!(settings.input, PathBuf::from("from-cli"));
        assert_eq!(settings.output, PathBuf::from("out-config"));
        assert_eq!(settings.exclude, vec!["Button", "Card"]);
        assert_eq!(settings.render.webdriver_url, "http://127.0.0.1:4444");
    }

    #[test]
    fn test_missing_paths() {
        let overrides = CliOverrides {
            input: Some("in".into()),
            ..Default::default()
        };
        let err = Settings::resolve(AppConfig::default(), &overrides).unwrap_err();
        assert!(matches!(err, Error::MissingPaths));
    }

    #[test]
    fn test_filter_directive_with_modules() {
        let mut logging = LoggingConfig {
            level: "warn".into(),
            ..Default::default()
        };
        logging
            .module_levels
            .insert("snapshot_render::api".into(), "debug".into());
        logging
            .module_levels
            .insert("reqwest".into(), "error".into());

        assert_eq!(
            logging.filter_directive(),
            "warn,reqwest=error,snapshot_render::api=debug"
        );
    }
}
