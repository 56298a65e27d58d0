use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info};

use crate::{
    Backend, BackendCapabilities, DType, Device, DynBackend, GraphModel, MemoryInfo,
    MemoryTracker, ModelArtifact, Shape, Tensor,
};

struct Registered {
    backend: Arc<dyn DynBackend>,
    device: Device,
}

/// Registered backends, the active backend selection, and tensor accounting.
///
/// The active selection is shared state: switching it affects every later
/// caller until it is switched again.
#[derive(Default)]
pub struct Engine {
    backends: RwLock<BTreeMap<String, Registered>>,
    active: Mutex<Option<String>>,
    memory: MemoryTracker,
}

static GLOBAL: OnceLock<Arc<Engine>> = OnceLock::new();

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide engine.
    pub fn global() -> Arc<Engine> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Engine::new())))
    }

    pub fn register<B: Backend>(&self, name: &str, backend: B, device: Device) {
        debug!(backend = name, kind = Backend::name(&backend), %device, "registering backend");
        let registered = Registered {
            backend: Arc::new(backend),
            device,
        };
        self.backends
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string(), registered);
    }

    pub fn backend_names(&self) -> Vec<String> {
        self.backends
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Makes `name` the active backend. The previous selection is kept if
    /// activation fails.
    pub fn set_backend(&self, name: &str) -> Result<()> {
        {
            let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
            let registered = backends
                .get(name)
                .ok_or_else(|| anyhow!("backend '{name}' is not registered"))?;
            registered
                .backend
                .activate(&registered.device)
                .with_context(|| format!("failed to activate backend '{name}'"))?;
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_deref() != Some(name) {
            info!(from = ?active.as_deref(), to = name, "switching backend");
        }
        *active = Some(name.to_string());
        Ok(())
    }

    pub fn active_backend(&self) -> Option<String> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn with_active<T>(
        &self,
        f: impl FnOnce(&str, &Registered) -> Result<T>,
    ) -> Result<T> {
        let name = self
            .active_backend()
            .ok_or_else(|| anyhow!("no backend is active"))?;
        let backends = self.backends.read().unwrap_or_else(PoisonError::into_inner);
        let registered = backends
            .get(&name)
            .ok_or_else(|| anyhow!("active backend '{name}' is no longer registered"))?;
        f(&name, registered)
    }

    pub fn capabilities(&self) -> Result<BackendCapabilities> {
        self.with_active(|_, registered| Ok(registered.backend.capabilities()))
    }

    /// Instantiates `artifact` on the active backend.
    pub fn compile(&self, artifact: &ModelArtifact) -> Result<GraphModel> {
        self.with_active(|name, registered| {
            let model = registered
                .backend
                .load_boxed(artifact, registered.device.clone())
                .with_context(|| format!("backend '{name}' failed to load model"))?;
            Ok(GraphModel::new(name.to_string(), model, self.memory.clone()))
        })
    }

    /// Counts `tensor` in this engine's accounting.
    pub fn track(&self, tensor: Tensor) -> Tensor {
        let allocation = self.memory.allocate(tensor.byte_len());
        tensor.with_allocation(allocation)
    }

    pub fn tensor_from_f64(&self, dtype: DType, shape: Shape, values: &[f64]) -> Result<Tensor> {
        Ok(self.track(Tensor::from_f64(dtype, shape, values)?))
    }

    pub fn memory(&self) -> MemoryInfo {
        self.memory.info()
    }
}
