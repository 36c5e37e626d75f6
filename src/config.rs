//! Configuration types for the watch folder
//!
//! The configuration is loaded once at startup from a YAML document (JSON is
//! accepted when the file has a `.json` extension) and is read-only afterwards.

use crate::error::{BgWatchError, Result};
use crate::settle::SettlePolicy;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default header carrying the API key
pub const DEFAULT_API_KEY_HEADER: &str = "x-api-key";

/// Default multipart field name for the uploaded image
pub const DEFAULT_IMAGE_FIELD: &str = "imageFile";

/// Directory layout used by the watch loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectoryLayout {
    /// Watched directory where new images are dropped
    pub source: PathBuf,
    /// Archive for originals that were processed successfully
    pub destination: PathBuf,
    /// Output directory for API results
    pub processed: PathBuf,
}

impl Default for DirectoryLayout {
    fn default() -> Self {
        Self {
            source: PathBuf::from("./source"),
            destination: PathBuf::from("./destination"),
            processed: PathBuf::from("./processed"),
        }
    }
}

impl DirectoryLayout {
    /// Layout with all three directories placed under `root`
    pub fn under<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref();
        Self {
            source: root.join("source"),
            destination: root.join("destination"),
            processed: root.join("processed"),
        }
    }

    /// All directories in bootstrap order
    #[must_use]
    pub fn all(&self) -> [&Path; 3] {
        [&self.source, &self.destination, &self.processed]
    }
}

/// Immutable configuration shared by every upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Endpoint receiving the multipart POST
    #[serde(default)]
    pub api_url: String,

    /// Static API key sent with every request
    #[serde(default)]
    pub api_key: String,

    /// Header name used for the API key
    #[serde(default = "default_api_key_header")]
    pub api_key_header: String,

    /// Multipart field name of the file part
    #[serde(default = "default_image_field")]
    pub image_field: String,

    /// Free-form processing parameters sent as plain text fields, in the
    /// order they appear in the document
    #[serde(
        default = "default_form_fields",
        deserialize_with = "deserialize_form_fields"
    )]
    pub form_fields: IndexMap<String, String>,

    /// Source, destination and processed directories
    #[serde(default)]
    pub directories: DirectoryLayout,

    /// How to wait for a writer to finish before reading a new file
    #[serde(default)]
    pub settle: SettlePolicy,

    /// Optional request timeout; no timeout when absent
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_api_key_header() -> String {
    DEFAULT_API_KEY_HEADER.to_string()
}

fn default_image_field() -> String {
    DEFAULT_IMAGE_FIELD.to_string()
}

fn default_form_fields() -> IndexMap<String, String> {
    IndexMap::from([("background.color".to_string(), "FFFFFF".to_string())])
}

/// Scalar accepted as a form field value; YAML authors tend to write
/// `padding: 0.1` rather than `padding: "0.1"`.
///
/// Numbers are re-rendered from their parsed value, so `margin: 1.0` is sent
/// as `1` and `padding: 0.10` as `0.1`. Quote the value when the exact text
/// matters.
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl From<FieldValue> for String {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(s) => s,
            FieldValue::Integer(i) => i.to_string(),
            FieldValue::Float(f) => f.to_string(),
            FieldValue::Bool(b) => b.to_string(),
        }
    }
}

fn deserialize_form_fields<'de, D>(deserializer: D) -> std::result::Result<IndexMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = IndexMap::<String, FieldValue>::deserialize(deserializer)?;
    Ok(raw.into_iter().map(|(k, v)| (k, String::from(v))).collect())
}

impl WatchConfig {
    /// Start building a configuration for the given endpoint and key
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bgremove_watch::WatchConfig;
    ///
    /// let config = WatchConfig::builder("https://image-api.example.com/v2/edit", "secret")
    ///     .form_field("background.color", "000000")
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(config.form_fields["background.color"], "000000");
    /// ```
    #[must_use]
    pub fn builder<U: Into<String>, K: Into<String>>(api_url: U, api_key: K) -> WatchConfigBuilder {
        WatchConfigBuilder::new(api_url, api_key)
    }

    /// Load and validate configuration from a file
    ///
    /// Files ending in `.json` are parsed as JSON, everything else as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            BgWatchError::invalid_config(format!(
                "failed to read config file '{}': {e}",
                path.display()
            ))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let config = if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .map_err(|e| match e {
            BgWatchError::Config(msg) => {
                BgWatchError::invalid_config(format!("'{}': {msg}", path.display()))
            },
            other => other,
        })?;

        tracing::debug!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| BgWatchError::invalid_config(format!("YAML parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| BgWatchError::invalid_config(format!("JSON parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration parameters
    ///
    /// # Validation Rules
    ///
    /// - `api_url`: present, absolute, `http` or `https`
    /// - `api_key`: present and non-empty
    /// - `api_key_header`: a valid HTTP header name
    /// - `image_field`: non-empty
    /// - `settle`: see [`SettlePolicy::validate`]
    pub fn validate(&self) -> Result<()> {
        if self.api_url.trim().is_empty() {
            return Err(BgWatchError::missing_config_key("api_url"));
        }

        let url = reqwest::Url::parse(&self.api_url).map_err(|e| {
            BgWatchError::invalid_config(format!("api_url '{}' is not a valid URL: {e}", self.api_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(BgWatchError::invalid_config(format!(
                "api_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.api_key.trim().is_empty() {
            return Err(BgWatchError::missing_config_key("api_key"));
        }

        if reqwest::header::HeaderName::from_bytes(self.api_key_header.as_bytes()).is_err() {
            return Err(BgWatchError::invalid_config(format!(
                "api_key_header '{}' is not a valid header name",
                self.api_key_header
            )));
        }

        if self.image_field.trim().is_empty() {
            return Err(BgWatchError::missing_config_key("image_field"));
        }

        self.settle.validate()
    }

    /// Request timeout, if one was configured
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// API key safe to print: first four characters, the rest masked
    #[must_use]
    pub fn masked_api_key(&self) -> String {
        let visible: String = self.api_key.chars().take(4).collect();
        let hidden = self.api_key.chars().count().saturating_sub(4);
        format!("{visible}{}", "*".repeat(hidden))
    }
}

/// Builder for `WatchConfig`
#[derive(Debug)]
pub struct WatchConfigBuilder {
    config: WatchConfig,
}

impl WatchConfigBuilder {
    fn new<U: Into<String>, K: Into<String>>(api_url: U, api_key: K) -> Self {
        Self {
            config: WatchConfig {
                api_url: api_url.into(),
                api_key: api_key.into(),
                api_key_header: default_api_key_header(),
                image_field: default_image_field(),
                form_fields: default_form_fields(),
                directories: DirectoryLayout::default(),
                settle: SettlePolicy::default(),
                request_timeout_secs: None,
            },
        }
    }

    /// Set the header carrying the API key
    #[must_use]
    pub fn api_key_header<S: Into<String>>(mut self, header: S) -> Self {
        self.config.api_key_header = header.into();
        self
    }

    /// Set the multipart field name of the file part
    #[must_use]
    pub fn image_field<S: Into<String>>(mut self, field: S) -> Self {
        self.config.image_field = field.into();
        self
    }

    /// Add or replace one processing parameter
    #[must_use]
    pub fn form_field<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.config.form_fields.insert(key.into(), value.into());
        self
    }

    /// Drop all processing parameters, including the defaults
    #[must_use]
    pub fn clear_form_fields(mut self) -> Self {
        self.config.form_fields.clear();
        self
    }

    /// Set the directory layout
    #[must_use]
    pub fn directories(mut self, directories: DirectoryLayout) -> Self {
        self.config.directories = directories;
        self
    }

    /// Set the settle policy
    #[must_use]
    pub fn settle(mut self, settle: SettlePolicy) -> Self {
        self.config.settle = settle;
        self
    }

    /// Set a request timeout in seconds
    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<WatchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
