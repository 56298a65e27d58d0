use std::sync::Arc;

use predictcheck_core::{DType, Engine, IoSignature, ModelArtifact, Shape, Tensor, TensorSpec};
use tracing::{debug, warn};

use crate::compare::{expect_arrays_close, expect_shape};
use crate::{CheckError, CheckResult, Fixtures, GraphModelLoader};

/// Wraps each fixture buffer in a tensor counted by `engine`.
///
/// Inputs take their dtype from the model's declared signature, `float32`
/// when the model declares none.
pub fn create_input_tensors(
    engine: &Engine,
    fixtures: &Fixtures,
    declared: &[IoSignature],
) -> CheckResult<Vec<Tensor>> {
    if !declared.is_empty() && declared.len() != fixtures.inputs_data.len() {
        return Err(CheckError::Input {
            index: fixtures.inputs_data.len().min(declared.len()),
            reason: format!(
                "model declares {} inputs, fixtures provide {}",
                declared.len(),
                fixtures.inputs_data.len()
            ),
        });
    }

    let mut xs = Vec::with_capacity(fixtures.inputs_data.len());
    for (index, (values, shape)) in fixtures
        .inputs_data
        .iter()
        .zip(&fixtures.inputs_shapes)
        .enumerate()
    {
        let mut dtype = DType::F32;
        if let Some(sig) = declared.get(index) {
            let spec = TensorSpec::from(sig);
            if !sig.shape.is_empty() && !spec.accepts(shape) {
                return Err(CheckError::Input {
                    index,
                    reason: format!("shape {shape:?} does not fit declared {:?}", sig.shape),
                });
            }
            dtype = spec.dtype;
        }

        let tensor = engine
            .tensor_from_f64(dtype, Shape::from_slice(shape), values)
            .map_err(|e| CheckError::Input {
                index,
                reason: format!("{e:#}"),
            })?;
        xs.push(tensor);
    }
    Ok(xs)
}

/// Compares outputs positionally against the reference fixtures.
pub fn compare_outputs(ys: &[Tensor], fixtures: &Fixtures, epsilon: f64) -> CheckResult<()> {
    if ys.len() != fixtures.outputs_shapes.len() {
        return Err(CheckError::OutputCount {
            expected: fixtures.outputs_shapes.len(),
            actual: ys.len(),
        });
    }

    for (index, y) in ys.iter().enumerate() {
        expect_shape(index, y.shape().dims(), &fixtures.outputs_shapes[index])?;

        let actual = y.to_f64_vec().map_err(|e| CheckError::Output {
            index,
            reason: format!("{e:#}"),
        })?;
        expect_arrays_close(&actual, &fixtures.outputs_data[index], epsilon)
            .map_err(|detail| CheckError::DataMismatch { index, detail })?;
    }
    Ok(())
}

/// Runs one model on one backend and compares against its fixtures.
pub struct Checker {
    engine: Arc<Engine>,
    loader: GraphModelLoader,
    epsilon: Option<f64>,
}

impl Checker {
    pub fn new(engine: Arc<Engine>, loader: GraphModelLoader, epsilon: Option<f64>) -> Self {
        Self {
            engine,
            loader,
            epsilon,
        }
    }

    /// Every tensor this creates is released before it returns, pass or fail.
    pub async fn check(&self, model: &str, backend: &str, fixtures: &Fixtures) -> CheckResult<()> {
        let artifact = self.loader.load(model).await?;
        let url = artifact.url.clone();
        let declared_outputs = artifact.manifest.outputs.len();

        let xs = create_input_tensors(&self.engine, fixtures, &artifact.manifest.inputs)?;
        let artifact = ModelArtifact::Graph(artifact);

        self.engine
            .set_backend(backend)
            .map_err(|e| CheckError::Backend {
                backend: backend.to_string(),
                reason: format!("{e:#}"),
            })?;
        let epsilon = match self.epsilon {
            Some(epsilon) => epsilon,
            None => self
                .engine
                .capabilities()
                .map_err(|e| CheckError::Backend {
                    backend: backend.to_string(),
                    reason: format!("{e:#}"),
                })?
                .test_epsilon(),
        };

        let mut graph = self.engine.compile(&artifact).map_err(|e| CheckError::Load {
            url,
            reason: format!("{e:#}"),
        })?;

        let result = graph
            .execute(&xs)
            .await
            .map_err(|e| CheckError::Execution {
                backend: backend.to_string(),
                reason: format!("{e:#}"),
            })?;
        let ys = result.into_vec();

        let outcome = if declared_outputs > 1 && ys.len() != declared_outputs {
            Err(CheckError::OutputCount {
                expected: declared_outputs,
                actual: ys.len(),
            })
        } else {
            compare_outputs(&ys, fixtures, epsilon)
        };
        if let Err(err) = &outcome {
            warn!(model, backend, error = %err, "outputs differ from reference");
        }

        xs.into_iter().for_each(Tensor::dispose);
        ys.into_iter().for_each(Tensor::dispose);
        debug!(model, backend, memory = ?self.engine.memory(), "tensors released");

        outcome
    }
}
