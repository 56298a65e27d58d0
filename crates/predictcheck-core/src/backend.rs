use anyhow::Result;

use crate::{Device, ModelArtifact, ModelSpec, Tensor};

pub const TEST_EPSILON_FLOAT32: f64 = 1e-3;
pub const TEST_EPSILON_FLOAT16: f64 = 1e-1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FloatPrecision {
    Half,
    Single,
}

#[derive(Clone, Copy, Debug)]
pub struct BackendCapabilities {
    pub float_precision: FloatPrecision,
}

impl BackendCapabilities {
    /// Comparison tolerance appropriate for results computed by this backend.
    pub fn test_epsilon(&self) -> f64 {
        match self.float_precision {
            FloatPrecision::Single => TEST_EPSILON_FLOAT32,
            FloatPrecision::Half => TEST_EPSILON_FLOAT16,
        }
    }
}

pub trait Backend: Send + Sync + 'static {
    type Model: BackendModel;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact, device: Device) -> Result<Self::Model>;
    fn capabilities(&self) -> BackendCapabilities;

    /// Called when the backend becomes the active one.
    fn activate(&self, _device: &Device) -> Result<()> {
        Ok(())
    }
}

pub trait BackendModel: Send + 'static {
    fn spec(&self) -> &ModelSpec;

    /// Inputs are positional and already on the right device.
    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;
}

/// Object-safe view of a [`Backend`], so differently typed backends can sit
/// in one registry.
pub trait DynBackend: Send + Sync {
    fn name(&self) -> &'static str;
    fn load_boxed(&self, artifact: &ModelArtifact, device: Device)
        -> Result<Box<dyn BackendModelAdapter>>;
    fn capabilities(&self) -> BackendCapabilities;
    fn activate(&self, device: &Device) -> Result<()>;
}

impl<B: Backend> DynBackend for B {
    fn name(&self) -> &'static str {
        Backend::name(self)
    }

    fn load_boxed(
        &self,
        artifact: &ModelArtifact,
        device: Device,
    ) -> Result<Box<dyn BackendModelAdapter>> {
        Ok(Box::new(Backend::load(self, artifact, device)?))
    }

    fn capabilities(&self) -> BackendCapabilities {
        Backend::capabilities(self)
    }

    fn activate(&self, device: &Device) -> Result<()> {
        Backend::activate(self, device)
    }
}

pub trait BackendModelAdapter: Send {
    fn spec(&self) -> &ModelSpec;
    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>>;
}

impl<T: BackendModel> BackendModelAdapter for T {
    fn spec(&self) -> &ModelSpec {
        BackendModel::spec(self)
    }

    fn infer(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        BackendModel::infer(self, inputs)
    }
}
