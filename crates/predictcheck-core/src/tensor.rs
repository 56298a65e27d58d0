use std::fmt;

use anyhow::{ensure, Context, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::Allocation;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Device {
    Cpu,
    Cuda { device_id: u32 },
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    #[serde(rename = "float32")]
    F32,
    #[serde(rename = "float16")]
    F16,
    #[serde(rename = "int64")]
    I64,
    #[serde(rename = "int32")]
    I32,
    #[serde(rename = "uint8")]
    U8,
    Bool,
}

impl DType {
    pub fn byte_size(self) -> usize {
        match self {
            DType::F32 | DType::I32 => 4,
            DType::F16 => 2,
            DType::I64 => 8,
            DType::U8 | DType::Bool => 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Shape(pub SmallVec<[usize; 6]>);

impl Shape {
    pub fn from_slice(d: &[usize]) -> Self {
        Self(d.iter().copied().collect())
    }
    pub fn rank(&self) -> usize {
        self.0.len()
    }
    /// Element count, or `None` when the product overflows `usize`.
    pub fn numel(&self) -> Option<usize> {
        self.0.iter().try_fold(1usize, |n, d| n.checked_mul(*d))
    }
    pub fn dims(&self) -> &[usize] {
        &self.0
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0.as_slice())
    }
}

#[derive(Clone, Debug)]
pub struct TensorDesc {
    pub dtype: DType,
    pub shape: Shape,
}

/// A dense little-endian tensor living in host memory.
///
/// Tensors created through an [`Engine`](crate::Engine) carry an
/// [`Allocation`] and are counted in the engine's memory accounting until
/// they are disposed or dropped.
#[derive(Clone, Debug)]
pub struct Tensor {
    pub desc: TensorDesc,
    pub bytes: Bytes,
    allocation: Option<Allocation>,
}

impl Tensor {
    pub fn from_cpu_bytes(dtype: DType, shape: Shape, bytes: Bytes) -> Self {
        Self {
            desc: TensorDesc { dtype, shape },
            bytes,
            allocation: None,
        }
    }

    /// Encodes `values` as `dtype`. Bools are any non-zero value.
    pub fn from_f64(dtype: DType, shape: Shape, values: &[f64]) -> Result<Self> {
        let numel = shape
            .numel()
            .with_context(|| format!("shape {shape} is too large"))?;
        ensure!(
            values.len() == numel,
            "{} values do not fill shape {shape}",
            values.len()
        );

        let mut buf = Vec::with_capacity(values.len() * dtype.byte_size());
        for &v in values {
            match dtype {
                DType::F32 => buf.extend_from_slice(&(v as f32).to_le_bytes()),
                DType::F16 => buf.extend_from_slice(&half::f16::from_f64(v).to_le_bytes()),
                DType::I64 => buf.extend_from_slice(&(v as i64).to_le_bytes()),
                DType::I32 => buf.extend_from_slice(&(v as i32).to_le_bytes()),
                DType::U8 => buf.push(v as u8),
                DType::Bool => buf.push(u8::from(v != 0.0)),
            }
        }

        Ok(Self::from_cpu_bytes(dtype, shape, Bytes::from(buf)))
    }

    pub fn dtype(&self) -> DType {
        self.desc.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.desc.shape
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_tracked(&self) -> bool {
        self.allocation.is_some()
    }

    pub(crate) fn with_allocation(mut self, allocation: Allocation) -> Self {
        self.allocation = Some(allocation);
        self
    }

    /// Decodes the buffer into `f64` values for comparison.
    #[allow(clippy::manual_is_multiple_of)]
    pub fn to_f64_vec(&self) -> Result<Vec<f64>> {
        let dtype = self.desc.dtype;
        let width = dtype.byte_size();
        ensure!(
            self.bytes.len() % width == 0,
            "{dtype:?} tensor has invalid byte length {}",
            self.bytes.len()
        );
        let shape = &self.desc.shape;
        let numel = shape
            .numel()
            .with_context(|| format!("shape {shape} is too large"))?;
        ensure!(
            self.bytes.len() / width == numel,
            "tensor holds {} elements but shape {shape} needs {numel}",
            self.bytes.len() / width
        );

        let values = self.bytes.chunks_exact(width);
        Ok(match dtype {
            DType::F32 => values
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            DType::F16 => values
                .map(|b| half::f16::from_le_bytes([b[0], b[1]]).to_f64())
                .collect(),
            DType::I64 => values
                .map(|b| i64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f64)
                .collect(),
            DType::I32 => values
                .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]) as f64)
                .collect(),
            DType::U8 => values.map(|b| b[0] as f64).collect(),
            DType::Bool => values.map(|b| if b[0] != 0 { 1.0 } else { 0.0 }).collect(),
        })
    }

    /// Releases the tensor, returning its bytes to the engine's accounting.
    pub fn dispose(self) {
        drop(self);
    }
}
