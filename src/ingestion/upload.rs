//! Blob uploads to server-issued SAS URIs

use crate::core::error::{PublishError, Result};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// Content type sent for a file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("zip") => "application/zip",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// PUT a local file to a SAS URI as a block blob
///
/// Azure storage answers `201 Created` on success; any other status is an
/// [`PublishError::UploadFailed`].
pub async fn upload_to_sas(http: &reqwest::Client, sas_uri: &str, file: &Path) -> Result<()> {
    if !file.is_file() {
        return Err(PublishError::FileNotFound {
            path: file.display().to_string(),
            what: "upload source".to_string(),
        });
    }

    let bytes = fs::read(file).await?;
    let size = bytes.len();
    debug!(file = %file.display(), size, "uploading to storage");

    let response = http
        .put(sas_uri)
        .header(CONTENT_TYPE, content_type_for(file))
        .header("x-ms-blob-type", "BlockBlob")
        .body(bytes)
        .send()
        .await?;

    if response.status() != StatusCode::CREATED {
        return Err(PublishError::UploadFailed {
            status: response.status().as_u16(),
        });
    }

    info!(file = %file.display(), size, "upload complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("logo.PNG")), "image/png");
        assert_eq!(content_type_for(Path::new("app.zip")), "application/zip");
        assert_eq!(content_type_for(Path::new("README")), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_upload_success() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("logo.png");
        std::fs::write(&file, b"png-bytes").unwrap();

        Mock::given(method("PUT"))
            .and(path("/container/logo.png"))
            .and(header("x-ms-blob-type", "BlockBlob"))
            .and(header("content-type", "image/png"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let sas = format!("{}/container/logo.png?sig=abc", server.uri());
        upload_to_sas(&reqwest::Client::new(), &sas, &file)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_upload_non_201_fails() {
        let server = MockServer::start().await;
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("app.zip");
        std::fs::write(&file, b"zip-bytes").unwrap();

        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sas = format!("{}/container/app.zip", server.uri());
        let result = upload_to_sas(&reqwest::Client::new(), &sas, &file).await;

        assert!(matches!(result, Err(PublishError::UploadFailed { status: 200 })));
    }

    #[tokio::test]
    async fn test_upload_missing_file() {
        let temp_dir = TempDir::new().unwrap();

        let result = upload_to_sas(
            &reqwest::Client::new(),
            "http://127.0.0.1:9/never",
            &temp_dir.path().join("missing.png"),
        )
        .await;

        assert!(matches!(result, Err(PublishError::FileNotFound { .. })));
    }
}
