#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use predictcheck_core::{
    Backend, BackendCapabilities, BackendModel, DType, Device, Engine, FloatPrecision,
    ModelArtifact, ModelSpec, Tensor,
};
use predictcheck_harness::{Fixtures, DEFAULT_DATA_DIR};
use serde::Deserialize;
use serde_json::json;

/// Weights understood by [`AffineBackend`]: output `i` is `x0 * scale + bias + i`.
#[derive(Debug, Deserialize)]
struct AffineWeights {
    scale: f64,
    bias: f64,
}

/// Test backend computing an affine map of the first input.
#[derive(Clone, Debug)]
pub struct AffineBackend {
    pub precision: FloatPrecision,
    /// Added to every output value, standing in for backend rounding.
    pub skew: f64,
    /// Returns at most this many outputs.
    pub max_outputs: Option<usize>,
    pub fail_activate: bool,
    pub fail_infer: bool,
}

impl Default for AffineBackend {
    fn default() -> Self {
        Self {
            precision: FloatPrecision::Single,
            skew: 0.0,
            max_outputs: None,
            fail_activate: false,
            fail_infer: false,
        }
    }
}

pub struct AffineModel {
    spec: ModelSpec,
    weights: AffineWeights,
    backend: AffineBackend,
}

impl Backend for AffineBackend {
    type Model = AffineModel;

    fn name(&self) -> &'static str {
        "affine"
    }

    fn load(&self, artifact: &ModelArtifact, _device: Device) -> Result<Self::Model> {
        let ModelArtifact::Graph(graph) = artifact else {
            bail!("affine backend expects a graph artifact");
        };
        let weights: AffineWeights =
            serde_json::from_slice(&graph.weights).context("affine weights")?;
        Ok(AffineModel {
            spec: ModelSpec::from_manifest(&graph.manifest),
            weights,
            backend: self.clone(),
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            float_precision: self.precision,
        }
    }

    fn activate(&self, _device: &Device) -> Result<()> {
        if self.fail_activate {
            bail!("no such device");
        }
        Ok(())
    }
}

impl BackendModel for AffineModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        if self.backend.fail_infer {
            bail!("kernel launch failed");
        }
        let x = inputs.first().context("missing input")?;
        let values = x.to_f64_vec()?;

        let count = self
            .spec
            .outputs
            .len()
            .min(self.backend.max_outputs.unwrap_or(usize::MAX));
        (0..count)
            .map(|i| {
                let ys: Vec<f64> = values
                    .iter()
                    .map(|v| v * self.weights.scale + self.weights.bias + i as f64 + self.backend.skew)
                    .collect();
                Tensor::from_f64(DType::F32, x.shape().clone(), &ys)
            })
            .collect()
    }
}

/// Engine with `cpu` (single precision) and `gpu` (half precision, slightly skewed).
pub fn engine_with(cpu: AffineBackend, gpu: AffineBackend) -> Arc<Engine> {
    let engine = Engine::new();
    engine.register("cpu", cpu, Device::Cpu);
    engine.register("gpu", gpu, Device::Cuda { device_id: 0 });
    Arc::new(engine)
}

pub fn default_engine() -> Arc<Engine> {
    engine_with(
        AffineBackend::default(),
        AffineBackend {
            precision: FloatPrecision::Half,
            skew: 0.01,
            ..AffineBackend::default()
        },
    )
}

/// An affine model plus reference data computed the same way the backend does.
pub struct AffineFixture {
    pub name: String,
    pub scale: f64,
    pub bias: f64,
    pub outputs: usize,
    pub fixtures: Fixtures,
    /// Input shape declared in `model.json`.
    pub declared_shape: Vec<usize>,
    /// Split `weights.json` across this many shards.
    pub shards: usize,
}

impl AffineFixture {
    pub fn new(name: &str, shape: &[usize], scale: f64, bias: f64, outputs: usize) -> Self {
        let numel = shape.iter().product::<usize>();
        let xs: Vec<f64> = (0..numel).map(|i| i as f64 / numel as f64).collect();
        let outputs_data = (0..outputs)
            .map(|o| xs.iter().map(|v| v * scale + bias + o as f64).collect())
            .collect();

        Self {
            name: name.to_string(),
            scale,
            bias,
            outputs,
            fixtures: Fixtures {
                inputs_data: vec![xs],
                inputs_shapes: vec![shape.to_vec()],
                outputs_data,
                outputs_shapes: vec![shape.to_vec(); outputs],
            },
            declared_shape: shape.to_vec(),
            shards: 1,
        }
    }

    fn manifest(&self, shard_names: &[String]) -> serde_json::Value {
        let shape = &self.declared_shape;
        let outputs: Vec<_> = (0..self.outputs)
            .map(|o| json!({"name": format!("y{o}"), "dtype": "float32", "shape": shape}))
            .collect();
        json!({
            "format": "onnx",
            "generatedBy": "predictcheck-tests",
            "inputs": [{"name": "x", "dtype": "float32", "shape": shape}],
            "outputs": outputs,
            "weightsManifest": [{"paths": shard_names}],
        })
    }

    fn files(&self, data_dir: &str) -> Vec<(String, Vec<u8>)> {
        let model = &self.name;
        let weights = serde_json::to_vec(&json!({"scale": self.scale, "bias": self.bias}))
            .unwrap_or_default();
        let chunk = weights.len().div_ceil(self.shards.max(1));
        let shard_names: Vec<String> = (0..self.shards.max(1))
            .map(|i| format!("group1-shard{}of{}.bin", i + 1, self.shards.max(1)))
            .collect();

        let mut files = vec![
            (
                format!("/{data_dir}/{model}/model.json"),
                self.manifest(&shard_names).to_string().into_bytes(),
            ),
            (
                format!("/{data_dir}/{model}.xs-data.json"),
                json!(self.fixtures.inputs_data).to_string().into_bytes(),
            ),
            (
                format!("/{data_dir}/{model}.xs-shapes.json"),
                json!(self.fixtures.inputs_shapes).to_string().into_bytes(),
            ),
            (
                format!("/{data_dir}/{model}.ys-data.json"),
                json!(self.fixtures.outputs_data).to_string().into_bytes(),
            ),
            (
                format!("/{data_dir}/{model}.ys-shapes.json"),
                json!(self.fixtures.outputs_shapes).to_string().into_bytes(),
            ),
        ];
        for (name, bytes) in shard_names.iter().zip(weights.chunks(chunk.max(1))) {
            files.push((format!("/{data_dir}/{model}/{name}"), bytes.to_vec()));
        }
        files
    }
}

/// Static fixture files served from an ephemeral local port.
pub struct FixtureServer {
    pub addr: SocketAddr,
}

impl FixtureServer {
    pub async fn start(models: &[AffineFixture]) -> Result<Self> {
        let mut files = HashMap::new();
        for model in models {
            files.extend(model.files(DEFAULT_DATA_DIR));
        }
        Self::serve(files).await
    }

    pub async fn serve(files: HashMap<String, Vec<u8>>) -> Result<Self> {
        let app = Router::new()
            .fallback(serve_file)
            .with_state(Arc::new(files));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("fixture server exited: {e}");
            }
        });
        Ok(Self { addr })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

async fn serve_file(State(files): State<Arc<HashMap<String, Vec<u8>>>>, uri: Uri) -> Response {
    match files.get(uri.path()) {
        Some(body) => (StatusCode::OK, body.clone()).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
