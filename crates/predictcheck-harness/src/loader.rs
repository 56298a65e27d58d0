use bytes::Bytes;
use predictcheck_core::{GraphArtifact, GraphManifest};
use tracing::debug;

use crate::{CheckError, CheckResult, FixtureClient};

/// Fetches `<model>/model.json` and the weight shards it lists.
#[derive(Clone, Debug)]
pub struct GraphModelLoader {
    client: FixtureClient,
}

impl GraphModelLoader {
    pub fn new(client: FixtureClient) -> Self {
        Self { client }
    }

    pub async fn load(&self, model: &str) -> CheckResult<GraphArtifact> {
        let url = self.client.url(&format!("{model}/model.json"))?;
        let load_error = |reason: String| CheckError::Load {
            url: url.to_string(),
            reason,
        };

        let raw = self.client.get_bytes(url.clone()).await?;
        let manifest = GraphManifest::from_slice(&raw).map_err(|e| load_error(format!("{e:#}")))?;

        let mut shards = Vec::new();
        for path in manifest.weight_paths() {
            let shard_url = url
                .join(path)
                .map_err(|e| load_error(format!("bad weight path {path}: {e}")))?;
            shards.push(self.client.get_bytes(shard_url).await?);
        }
        if shards.is_empty() {
            return Err(load_error("manifest lists no weight files".to_string()));
        }

        let weights = if shards.len() == 1 {
            shards.remove(0)
        } else {
            Bytes::from(shards.concat())
        };

        debug!(%url, shards = manifest.weight_paths().count(), bytes = weights.len(), "model loaded");
        Ok(GraphArtifact {
            url: url.to_string(),
            manifest,
            weights,
        })
    }
}
