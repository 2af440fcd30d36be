//! Registry metadata probe — resolves the remote manifest digest for an
//! image tag with a HEAD request, no pull.

use anyhow::{Context, Result, anyhow};
use reqwest::header::{ACCEPT, HeaderValue};

use crate::application::ports::RegistryClient;
use crate::domain::{DEFAULT_REGISTRY, ImageRef};

/// Manifest media types accepted by the probe (Docker v2 and OCI, single
/// image and index).
const MANIFEST_ACCEPT: &str = "application/vnd.docker.distribution.manifest.v2+json, \
     application/vnd.docker.distribution.manifest.list.v2+json, \
     application/vnd.oci.image.manifest.v1+json, \
     application/vnd.oci.image.index.v1+json";

const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// Registry client performing manifest HEAD requests over HTTPS.
pub struct HttpRegistryClient {
    http: reqwest::Client,
}

impl HttpRegistryClient {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("building registry HTTP client")?;
        Ok(Self { http })
    }
}

impl RegistryClient for HttpRegistryClient {
    async fn remote_digest(&self, image: &ImageRef, auth_token: Option<&str>) -> Result<String> {
        let host = api_host(&image.canonical_registry());
        let url = format!(
            "https://{host}/v2/{}/manifests/{}",
            image.repository, image.tag
        );

        let mut request = self
            .http
            .head(&url)
            .header(ACCEPT, HeaderValue::from_static(MANIFEST_ACCEPT));
        if let Some(token) = auth_token.filter(|t| !t.is_empty()) {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("HEAD {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("registry returned {status} for {url}"));
        }

        response
            .headers()
            .get(DIGEST_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("registry response for {url} carried no digest header"))
    }
}

/// The default registry serves its v2 API from a dedicated host.
fn api_host(canonical_registry: &str) -> String {
    if canonical_registry == DEFAULT_REGISTRY {
        format!("registry-1.{DEFAULT_REGISTRY}")
    } else {
        canonical_registry.to_owned()
    }
}
