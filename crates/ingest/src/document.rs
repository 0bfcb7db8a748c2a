use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;
use url::Url;

use crate::error::IngestError;
use crate::reader::TextExtractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Eml,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "eml" => Some(Self::Eml),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Eml => "eml",
        }
    }

    /// Infer the format from the extension of the URL path. Anything
    /// unrecognised (or missing) is assumed to be a PDF.
    pub fn infer_from_url(url: &str) -> Self {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };

        Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
            .unwrap_or(Self::Pdf)
    }

    /// Detect the format of a stored file from its extension.
    pub fn detect(path: &Path) -> Result<Self, IngestError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("");

        Self::from_extension(extension)
            .ok_or_else(|| IngestError::UnsupportedFormat(extension.to_string()))
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A downloaded document held in temporary storage. The backing file is
/// removed when the value is dropped.
#[derive(Debug)]
pub struct Document {
    source: String,
    file: NamedTempFile,
}

impl Document {
    pub fn from_bytes(
        source: impl Into<String>,
        extension: &str,
        bytes: &[u8],
    ) -> Result<Self, IngestError> {
        let mut file = tempfile::Builder::new()
            .prefix("policy-doc-")
            .suffix(&format!(".{}", extension.trim_start_matches('.')))
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;

        Ok(Self {
            source: source.into(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> Result<DocumentFormat, IngestError> {
        DocumentFormat::detect(self.path())
    }

    pub async fn extract_text(&self) -> Result<String, IngestError> {
        let format = self.format()?;
        let bytes = tokio::fs::read(self.path()).await?;
        debug!(source = %self.source, %format, bytes = bytes.len(), "Extracting document text");
        TextExtractor::extract(format, bytes).await
    }
}

/// Retrieves a document by URL into temporary storage.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Document, IngestError>;
}

#[derive(Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Document, IngestError> {
        let fetch_error = |reason: String| IngestError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(fetch_error(format!("status {}", response.status())));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        let format = DocumentFormat::infer_from_url(url);
        debug!(url, %format, bytes = bytes.len(), "Downloaded document");

        let source = url.to_string();
        tokio::task::spawn_blocking(move || {
            Document::from_bytes(source, format.extension(), &bytes)
        })
        .await
        .map_err(|e| IngestError::Io(std::io::Error::other(e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_recognised_extensions() {
        assert_eq!(
            DocumentFormat::infer_from_url("https://host/docs/policy.pdf"),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::infer_from_url("https://host/docs/Policy.DOCX?sv=2023&sig=abc"),
            DocumentFormat::Docx
        );
        assert_eq!(
            DocumentFormat::infer_from_url("https://host/mail/claim.eml#top"),
            DocumentFormat::Eml
        );
    }

    #[test]
    fn test_unrecognised_extension_falls_back_to_pdf() {
        assert_eq!(
            DocumentFormat::infer_from_url("https://host/notes.txt"),
            DocumentFormat::Pdf
        );
        assert_eq!(
            DocumentFormat::infer_from_url("https://host/download"),
            DocumentFormat::Pdf
        );
        assert_eq!(DocumentFormat::infer_from_url("not a url.eml"), DocumentFormat::Eml);
    }

    #[test]
    fn test_detect_rejects_unknown_file_types() {
        assert_eq!(
            DocumentFormat::detect(Path::new("/tmp/x.eml")).unwrap(),
            DocumentFormat::Eml
        );
        let err = DocumentFormat::detect(Path::new("/tmp/x.txt")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(ext) if ext == "txt"));
    }

    #[test]
    fn test_temp_file_removed_on_drop() {
        let document = Document::from_bytes("mem://a", "eml", b"hello").unwrap();
        let path = document.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(document.format().unwrap(), DocumentFormat::Eml);

        drop(document);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_extract_text_reads_stored_file() {
        let raw = "Subject: Claim\r\nContent-Type: text/plain\r\n\r\nRoom rent is capped.\r\n";
        let document = Document::from_bytes("mem://claim", ".eml", raw.as_bytes()).unwrap();

        let text = document.extract_text().await.unwrap();
        assert_eq!(text.trim(), "Room rent is capped.");
    }

    #[tokio::test]
    async fn test_unsupported_stored_format() {
        let document = Document::from_bytes("mem://notes", "txt", b"plain").unwrap();
        let err = document.extract_text().await.unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedFormat(_)));
    }
}
