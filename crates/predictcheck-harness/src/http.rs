use std::time::Duration;

use bytes::Bytes;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::{CheckError, CheckResult};

/// HTTP access to one fixture directory on the fixture server.
#[derive(Clone, Debug)]
pub struct FixtureClient {
    http: Client,
    base: Url,
}

impl FixtureClient {
    pub fn new(server: &str, data_dir: &str, timeout: Duration) -> CheckResult<Self> {
        let raw = format!(
            "{}/{}/",
            server.trim_end_matches('/'),
            data_dir.trim_matches('/')
        );
        let base = Url::parse(&raw)
            .map_err(|e| CheckError::Config(format!("bad fixture server URL {raw}: {e}")))?;

        let http = Client::builder()
            .user_agent(concat!("predictcheck/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| CheckError::Config(format!("HTTP client initialization failed: {e}")))?;

        Ok(Self { http, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Resolves `path` against the fixture directory.
    pub fn url(&self, path: &str) -> CheckResult<Url> {
        self.base
            .join(path)
            .map_err(|e| CheckError::Config(format!("cannot resolve {path}: {e}")))
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: Url) -> CheckResult<T> {
        let response = self.send(&url).await?;
        response.json::<T>().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })
    }

    pub async fn get_bytes(&self, url: Url) -> CheckResult<Bytes> {
        let response = self.send(&url).await?;
        response.bytes().await.map_err(|source| CheckError::Http {
            url: url.to_string(),
            source,
        })
    }

    async fn send(&self, url: &Url) -> CheckResult<reqwest::Response> {
        debug!(%url, "fetching");
        self.http
            .get(url.clone())
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|source| CheckError::Http {
                url: url.to_string(),
                source,
            })
    }
}
