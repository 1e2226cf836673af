//! Client configuration.
//!
//! Values come from built-in defaults, then an optional JSON config file, then
//! `FORMFILL_*` environment variables (a `.env` file is honoured by the binary).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{FormFillError, Result};
use crate::templates::{TemplateCatalog, TemplateInfo, DEFAULT_TEMPLATE};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the form service.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Per-request timeout. OCR on large scans can be slow.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Where exported PDFs are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_template")]
    pub default_template: String,
    /// Replaces the built-in template catalog when non-empty.
    #[serde(default)]
    pub templates: Vec<TemplateInfo>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_template() -> String {
    DEFAULT_TEMPLATE.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
            output_dir: default_output_dir(),
            default_template: default_template(),
            templates: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env(|key| std::env::var(key).ok())
    }

    /// Load a JSON config file, then overlay the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Load a JSON config file, then overlay variables looked up through `var`.
    pub fn load_with_env(path: &Path, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FormFillError::Config(format!("failed to read config {:?}: {}", path, e))
        })?;
        let config: ClientConfig = serde_json::from_str(&content).map_err(|e| {
            FormFillError::Config(format!("failed to parse config {:?}: {}", path, e))
        })?;
        info!("Loaded config from {:?}", path);
        config.with_env(var)
    }

    /// Overlay `FORMFILL_*` variables looked up through `var`.
    pub fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = var("FORMFILL_API_URL") {
            self.api_url = url;
        }
        if let Some(secs) = var("FORMFILL_TIMEOUT_SECS") {
            self.timeout_secs = secs.trim().parse().map_err(|_| {
                FormFillError::Config(format!("FORMFILL_TIMEOUT_SECS is not a number: {}", secs))
            })?;
        }
        if let Some(dir) = var("FORMFILL_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Some(template) = var("FORMFILL_DEFAULT_TEMPLATE") {
            self.default_template = template;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(FormFillError::Config(format!(
                "api_url must be an http(s) URL: {}",
                self.api_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(FormFillError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Template catalog: the configured list, or the built-in one.
    pub fn catalog(&self) -> Result<TemplateCatalog> {
        if self.templates.is_empty() {
            Ok(TemplateCatalog::default())
        } else {
            TemplateCatalog::from_templates(self.templates.clone())
        }
    }
}
