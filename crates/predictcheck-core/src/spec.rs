use crate::{DType, GraphManifest, IoSignature};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IOName(pub String);

#[derive(Clone, Debug)]
pub struct TensorSpec {
    pub name: IOName,
    pub dtype: DType,
    pub rank: usize,
    pub dims: Vec<Option<usize>>, // None = dynamic
}

impl TensorSpec {
    /// True when `shape` fits the declared rank and every static dim.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        shape.len() == self.rank
            && self
                .dims
                .iter()
                .zip(shape)
                .all(|(want, got)| want.map_or(true, |w| w == *got))
    }
}

impl From<&IoSignature> for TensorSpec {
    fn from(sig: &IoSignature) -> Self {
        let dims = sig
            .shape
            .iter()
            .map(|d| usize::try_from(*d).ok())
            .collect::<Vec<_>>();
        Self {
            name: IOName(sig.name.clone()),
            dtype: sig.dtype.unwrap_or(DType::F32),
            rank: dims.len(),
            dims,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub inputs: Vec<TensorSpec>,
    pub outputs: Vec<TensorSpec>,
}

impl ModelSpec {
    pub fn from_manifest(manifest: &GraphManifest) -> Self {
        Self {
            inputs: manifest.inputs.iter().map(TensorSpec::from).collect(),
            outputs: manifest.outputs.iter().map(TensorSpec::from).collect(),
        }
    }
}
