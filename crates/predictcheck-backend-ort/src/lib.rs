use std::fmt;

use anyhow::{bail, ensure, Context, Result};
use bytes::Bytes;
use ort::{
    session::{
        builder::{GraphOptimizationLevel, SessionBuilder},
        Session, SessionInputValue,
    },
    tensor::{PrimitiveTensorElementType, TensorElementType},
    value::{DynValue, ValueRef, ValueType},
};
use predictcheck_core::{
    Backend, BackendCapabilities, BackendModel, DType, Device, FloatPrecision, GraphFormat,
    IOName, ModelArtifact, ModelSpec, Shape, Tensor, TensorSpec,
};
use tracing::debug;

/// ONNX Runtime on the host CPU or, with the `cuda` feature, an NVIDIA GPU.
pub struct OrtBackend;

impl OrtBackend {
    pub fn new() -> Self {
        Self
    }

    /// Whether the linked ONNX Runtime ships a usable CUDA execution provider.
    pub fn cuda_available() -> bool {
        #[cfg(feature = "cuda")]
        {
            use ort::execution_providers::{cuda::CUDAExecutionProvider, ExecutionProvider};
            CUDAExecutionProvider::default()
                .is_available()
                .unwrap_or(false)
        }
        #[cfg(not(feature = "cuda"))]
        {
            false
        }
    }
}

impl Default for OrtBackend {
    fn default() -> Self {
        Self::new()
    }
}

pub struct OrtModel {
    spec: ModelSpec,
    session: Session,
    input_names: Vec<String>,
}

impl Backend for OrtBackend {
    type Model = OrtModel;

    fn name(&self) -> &'static str {
        "onnxruntime"
    }

    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model> {
        let builder = session_builder(&device)?;

        let session = match artifact {
            ModelArtifact::OnnxPath(path) => builder
                .commit_from_file(path)
                .with_context(|| format!("failed to load ONNX model {}", path.display()))?,
            ModelArtifact::Graph(graph) => {
                ensure!(
                    graph.manifest.format == GraphFormat::Onnx,
                    "onnxruntime cannot run {:?} graphs",
                    graph.manifest.format
                );
                debug!(url = %graph.url, bytes = graph.weights.len(), %device, "loading ONNX graph from memory");
                builder
                    .commit_from_memory(&graph.weights)
                    .with_context(|| format!("failed to load ONNX model from {}", graph.url))?
            }
        };

        let input_names = session.inputs.iter().map(|i| i.name.clone()).collect();
        let spec = session_spec(&session)?;

        Ok(OrtModel {
            spec,
            session,
            input_names,
        })
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            float_precision: FloatPrecision::Single,
        }
    }

    /// A `cuda:N` backend only activates when the CUDA provider can actually
    /// be registered; ORT would otherwise run the graph on the CPU provider.
    fn activate(&self, device: &Device) -> Result<()> {
        match device {
            Device::Cpu => Ok(()),
            Device::Cuda { device_id } => {
                ensure!(
                    Self::cuda_available(),
                    "CUDA execution provider is not available for {device}"
                );
                with_cuda(new_builder()?, *device_id).map(|_| ())
            }
        }
    }
}

impl BackendModel for OrtModel {
    fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        ensure!(
            inputs.len() == self.input_names.len(),
            "expected {} inputs, got {}",
            self.input_names.len(),
            inputs.len()
        );

        let feeds = self
            .input_names
            .iter()
            .zip(inputs)
            .map(|(name, input)| Ok((name.clone(), SessionInputValue::from(to_ort_value(input)?))))
            .collect::<Result<Vec<_>>>()?;

        let outputs = self.session.run(feeds)?;
        outputs
            .iter()
            .map(|(_, value)| from_ort_value(&value))
            .collect()
    }
}

fn new_builder() -> Result<SessionBuilder> {
    Session::builder()
        .context("failed to create ORT session builder")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("failed to configure ORT session builder")
}

fn session_builder(device: &Device) -> Result<SessionBuilder> {
    let builder = new_builder()?;
    match device {
        Device::Cpu => Ok(builder),
        Device::Cuda { device_id } => with_cuda(builder, *device_id),
    }
}

/// Registers the CUDA provider, failing instead of falling back to the CPU.
fn with_cuda(builder: SessionBuilder, device_id: u32) -> Result<SessionBuilder> {
    #[cfg(feature = "cuda")]
    {
        use ort::execution_providers::cuda::CUDAExecutionProvider;
        let provider = CUDAExecutionProvider::default()
            .with_device_id(device_id as i32)
            .build()
            .error_on_failure();
        builder
            .with_execution_providers([provider])
            .with_context(|| format!("failed to register CUDA execution provider on cuda:{device_id}"))
    }
    #[cfg(not(feature = "cuda"))]
    {
        let _ = builder;
        bail!("cuda:{device_id} requested but predictcheck-backend-ort was built without the `cuda` feature")
    }
}

fn session_spec(session: &Session) -> Result<ModelSpec> {
    let inputs = session
        .inputs
        .iter()
        .map(|i| io_spec(&i.name, &i.input_type))
        .collect::<Result<Vec<_>>>()?;
    let outputs = session
        .outputs
        .iter()
        .map(|o| io_spec(&o.name, &o.output_type))
        .collect::<Result<Vec<_>>>()?;
    Ok(ModelSpec { inputs, outputs })
}

fn io_spec(name: &str, value_type: &ValueType) -> Result<TensorSpec> {
    let ValueType::Tensor { ty, shape, .. } = value_type else {
        bail!("{name}: only tensor inputs and outputs are supported");
    };

    let dims: Vec<Option<usize>> = shape.iter().map(|d| usize::try_from(*d).ok()).collect();
    Ok(TensorSpec {
        name: IOName(name.to_string()),
        dtype: element_dtype(*ty)?,
        rank: dims.len(),
        dims,
    })
}

fn element_dtype(ty: TensorElementType) -> Result<DType> {
    Ok(match ty {
        TensorElementType::Float32 => DType::F32,
        TensorElementType::Float16 => DType::F16,
        TensorElementType::Int64 => DType::I64,
        TensorElementType::Int32 => DType::I32,
        TensorElementType::Uint8 => DType::U8,
        TensorElementType::Bool => DType::Bool,
        _ => bail!("unsupported tensor element type: {ty}"),
    })
}

fn to_ort_value(tensor: &Tensor) -> Result<DynValue> {
    let shape = tensor.shape();
    let expected = shape
        .numel()
        .and_then(|n| n.checked_mul(tensor.dtype().byte_size()))
        .with_context(|| format!("input shape {shape} is too large"))?;
    ensure!(
        tensor.byte_len() == expected,
        "input holds {} bytes but {:?}{shape} needs {expected}",
        tensor.byte_len(),
        tensor.dtype()
    );

    match tensor.dtype() {
        DType::F32 => ort_input(tensor, f32::from_le_bytes),
        DType::I64 => ort_input(tensor, i64::from_le_bytes),
        DType::I32 => ort_input(tensor, i32::from_le_bytes),
        DType::U8 => ort_input(tensor, |[b]: [u8; 1]| b),
        DType::Bool => ort_input(tensor, |[b]: [u8; 1]| b != 0),
        DType::F16 => bail!("f16 inputs are not supported yet"),
    }
}

fn ort_input<T, const N: usize>(tensor: &Tensor, from_le: impl Fn([u8; N]) -> T) -> Result<DynValue>
where
    T: PrimitiveTensorElementType + fmt::Debug + Clone + 'static,
{
    let data: Vec<T> = tensor
        .bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut le = [0u8; N];
            le.copy_from_slice(chunk);
            from_le(le)
        })
        .collect();
    let dims = tensor.shape().dims().to_vec();
    Ok(ort::value::Tensor::from_array((dims, data))?.into_dyn())
}

fn from_ort_value(value: &ValueRef<'_>) -> Result<Tensor> {
    let ValueType::Tensor { ty, shape, .. } = value.dtype() else {
        bail!("non-tensor outputs are not supported");
    };

    let dims = shape
        .iter()
        .map(|d| usize::try_from(*d).context("output has an unresolved dimension"))
        .collect::<Result<Vec<_>>>()?;
    let shape = Shape::from_slice(&dims);

    match *ty {
        TensorElementType::Float32 => host_tensor(value, DType::F32, shape, f32::to_le_bytes),
        TensorElementType::Int64 => host_tensor(value, DType::I64, shape, i64::to_le_bytes),
        TensorElementType::Int32 => host_tensor(value, DType::I32, shape, i32::to_le_bytes),
        TensorElementType::Uint8 => host_tensor(value, DType::U8, shape, |b: u8| [b]),
        TensorElementType::Bool => host_tensor(value, DType::Bool, shape, |b: bool| [u8::from(b)]),
        TensorElementType::Float16 => bail!("f16 outputs are not supported yet"),
        _ => bail!("unsupported output tensor element type: {ty}"),
    }
}

/// Copies an output into host bytes in logical (row-major) order.
fn host_tensor<T, const N: usize>(
    value: &ValueRef<'_>,
    dtype: DType,
    shape: Shape,
    to_le: impl Fn(T) -> [u8; N],
) -> Result<Tensor>
where
    T: PrimitiveTensorElementType + fmt::Debug + Copy + 'static,
{
    let array = value.try_extract_array::<T>()?;
    let mut buf = Vec::with_capacity(array.len() * N);
    for v in array.iter() {
        buf.extend_from_slice(&to_le(*v));
    }
    Ok(Tensor::from_cpu_bytes(dtype, shape, Bytes::from(buf)))
}
