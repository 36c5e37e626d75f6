//! Upload pipeline: file → multipart request → processing API → output file

use crate::config::WatchConfig;
use crate::error::{BgWatchError, Result};
use async_trait::async_trait;
use instant::Instant;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Content type of the uploaded file part
const FILE_PART_MIME: &str = "application/octet-stream";

/// Something that turns a source file into a result file
///
/// The watch loop only depends on this trait, so it can be driven by a
/// stand-in processor.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    /// Process the file at `path` and return where the result was written
    ///
    /// # Errors
    ///
    /// Returns `BgWatchError` for:
    /// - Source file that cannot be read
    /// - Transport failures or non-200 responses
    /// - Output file that cannot be written
    async fn process(&self, path: &Path) -> Result<PathBuf>;
}

/// Uploads files to the configured processing API and stores the responses
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    client: Client,
    config: Arc<WatchConfig>,
}

impl UploadPipeline {
    /// Create a new pipeline
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(config: Arc<WatchConfig>) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| BgWatchError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, config })
    }

    /// Configuration used by this pipeline
    #[must_use]
    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Where the result for `source` is written: `<processed>/<base name>`
    pub fn output_path(&self, source: &Path) -> Result<PathBuf> {
        Ok(self.config.directories.processed.join(base_name(source)?))
    }

    /// Build the multipart body: one file part plus the configured text fields
    pub fn build_form(&self, file_name: &str, bytes: Vec<u8>) -> Result<Form> {
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(FILE_PART_MIME)
            .map_err(|e| BgWatchError::network_error("Failed to build file part", e))?;

        let form = self
            .config
            .form_fields
            .iter()
            .fold(Form::new().part(self.config.image_field.clone(), part), |form, (key, value)| {
                form.text(key.clone(), value.clone())
            });

        Ok(form)
    }

    /// Upload one file and write the API result to the processed directory
    pub async fn process(&self, path: &Path) -> Result<PathBuf> {
        let started = Instant::now();
        let file_name = base_name(path)?;
        let output_path = self.config.directories.processed.join(&file_name);

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| BgWatchError::file_io_error("open source file", path, &e))?;
        let upload_size = bytes.len();

        let form = self.build_form(&file_name, bytes)?;

        tracing::debug!(
            url = %self.config.api_url,
            file = %file_name,
            bytes = upload_size,
            "Uploading file"
        );

        let response = self
            .client
            .post(&self.config.api_url)
            .header(self.config.api_key_header.as_str(), self.config.api_key.as_str())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                BgWatchError::network_error(format!("POST {} failed", self.config.api_url), e)
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.map_err(|e| {
                BgWatchError::network_error(
                    format!("Failed to read error body (status {status})"),
                    e,
                )
            })?;
            return Err(BgWatchError::Api {
                status: status.as_u16(),
                body,
            });
        }

        // Read the whole body before touching the output file
        let body = response
            .bytes()
            .await
            .map_err(|e| BgWatchError::network_error("Failed to read response body", e))?;

        tokio::fs::write(&output_path, &body)
            .await
            .map_err(|e| BgWatchError::file_io_error("write result file", &output_path, &e))?;

        tracing::debug!(
            output = %output_path.display(),
            bytes = body.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Result written"
        );

        Ok(output_path)
    }
}

#[async_trait]
impl FileProcessor for UploadPipeline {
    async fn process(&self, path: &Path) -> Result<PathBuf> {
        UploadPipeline::process(self, path).await
    }
}

/// Base name of `path` with every directory component stripped
pub fn base_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| {
            BgWatchError::file_io_error(
                "determine file name of",
                path,
                &std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
            )
        })
}
