//! Binary fetch
//!
//! The fetch never trusts declared content-type headers: many servers
//! return HTML interstitials to non-browser clients with a cheerful
//! `application/pdf` header. Only the leading file-signature bytes decide
//! (checked by the materializer after the fetch).

use crate::config::MaterializerConfig;
use crate::error::MaterializerError;
use docket_domain::SourceDescriptor;
use tracing::debug;

/// Fetches a source descriptor's binary
///
/// The HTTP implementation handles remote URLs; deployments wire in an
/// object-store implementation for bucket sources, tests use in-memory
/// doubles.
pub trait BlobFetcher {
    /// Fetch the binary, honoring the config's deadline and byte cap
    fn fetch(
        &self,
        source: &SourceDescriptor,
        config: &MaterializerConfig,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, MaterializerError>> + Send;
}

/// Fetcher for remote HTTP(S) URLs
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a fetcher with a default client
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fetcher over an existing client (shared pools, proxies)
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl BlobFetcher for HttpFetcher {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        config: &MaterializerConfig,
    ) -> Result<Vec<u8>, MaterializerError> {
        let url = match source {
            SourceDescriptor::RemoteUrl { url } => url,
            SourceDescriptor::ObjectStore { bucket, path } => {
                return Err(MaterializerError::Fetch(format!(
                    "no object-store fetcher configured for {}/{}",
                    bucket, path
                )));
            }
            SourceDescriptor::Pointer { document_id } => {
                // The resolver unwraps pointers before the fetch.
                return Err(MaterializerError::BrokenPointer(format!(
                    "unresolved pointer to {}",
                    document_id
                )));
            }
        };

        let mut response = self
            .client
            .get(url)
            .timeout(config.fetch_timeout())
            .send()
            .await
            .map_err(map_reqwest_error)?;

        if !response.status().is_success() {
            return Err(MaterializerError::Fetch(format!(
                "GET {} returned {}",
                url,
                response.status()
            )));
        }

        let mut bytes: Vec<u8> = Vec::new();
        while let Some(piece) = response.chunk().await.map_err(map_reqwest_error)? {
            if bytes.len() + piece.len() > config.max_fetch_bytes {
                return Err(MaterializerError::TooLarge {
                    limit: config.max_fetch_bytes,
                });
            }
            bytes.extend_from_slice(&piece);
        }

        debug!(url, bytes = bytes.len(), "fetched binary");
        Ok(bytes)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> MaterializerError {
    if e.is_timeout() {
        MaterializerError::Timeout
    } else {
        MaterializerError::Fetch(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_object_store_without_fetcher_fails() {
        let fetcher = HttpFetcher::new();
        let source = SourceDescriptor::ObjectStore {
            bucket: "records".to_string(),
            path: "a.pdf".to_string(),
        };
        let err = fetcher
            .fetch(&source, &MaterializerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializerError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_unresolved_pointer_is_rejected() {
        let fetcher = HttpFetcher::new();
        let source = SourceDescriptor::Pointer {
            document_id: docket_domain::DocumentId::new(),
        };
        let err = fetcher
            .fetch(&source, &MaterializerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializerError::BrokenPointer(_)));
    }
}
