use anyhow::{Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::DType;

#[derive(Clone, Debug)]
pub enum ModelArtifact {
    OnnxPath(std::path::PathBuf),
    Graph(GraphArtifact),
}

/// A converted model fetched from a `model.json` manifest.
#[derive(Clone, Debug)]
pub struct GraphArtifact {
    pub url: String,
    pub manifest: GraphManifest,
    /// Weight shards concatenated in manifest order.
    pub weights: Bytes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphFormat {
    Onnx,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphManifest {
    pub format: GraphFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_by: Option<String>,
    #[serde(default)]
    pub inputs: Vec<IoSignature>,
    #[serde(default)]
    pub outputs: Vec<IoSignature>,
    pub weights_manifest: Vec<WeightsGroup>,
}

impl GraphManifest {
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).context("malformed model.json")
    }

    /// Shard paths in load order.
    pub fn weight_paths(&self) -> impl Iterator<Item = &str> {
        self.weights_manifest
            .iter()
            .flat_map(|group| group.paths.iter().map(String::as_str))
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IoSignature {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    /// `-1` marks a dynamic dimension.
    #[serde(default)]
    pub shape: Vec<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WeightsGroup {
    pub paths: Vec<String>,
}
