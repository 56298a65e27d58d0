use anyhow::{ensure, Result};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::debug;

use crate::{BackendModelAdapter, MemoryTracker, ModelSpec, Tensor};

/// What a model run produced. Models that declare exactly one output yield
/// a bare tensor; everything else yields a list.
#[derive(Debug)]
pub enum Execution {
    Single(Tensor),
    Many(Vec<Tensor>),
}

impl Execution {
    pub fn into_vec(self) -> Vec<Tensor> {
        match self {
            Execution::Single(t) => vec![t],
            Execution::Many(ts) => ts,
        }
    }
}

/// A model instantiated on one backend.
pub struct GraphModel {
    backend: String,
    model: Box<dyn BackendModelAdapter>,
    memory: MemoryTracker,
}

impl GraphModel {
    pub(crate) fn new(
        backend: String,
        model: Box<dyn BackendModelAdapter>,
        memory: MemoryTracker,
    ) -> Self {
        Self {
            backend,
            model,
            memory,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn spec(&self) -> &ModelSpec {
        self.model.spec()
    }

    pub async fn execute(&mut self, inputs: &[Tensor]) -> Result<Execution> {
        let declared = self.model.spec().inputs.len();
        ensure!(
            declared == 0 || declared == inputs.len(),
            "model declares {declared} inputs, got {}",
            inputs.len()
        );

        debug!(backend = %self.backend, inputs = inputs.len(), "executing model");
        let model = &mut self.model;
        let outputs = match Handle::try_current().map(|h| h.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => {
                tokio::task::block_in_place(|| model.infer(inputs))?
            }
            _ => model.infer(inputs)?,
        };

        let mut outputs: Vec<Tensor> = outputs
            .into_iter()
            .map(|t| {
                let allocation = self.memory.allocate(t.byte_len());
                t.with_allocation(allocation)
            })
            .collect();

        if self.model.spec().outputs.len() == 1 {
            ensure!(
                outputs.len() == 1,
                "model declares one output, backend returned {}",
                outputs.len()
            );
            let single = outputs.remove(0);
            return Ok(Execution::Single(single));
        }
        Ok(Execution::Many(outputs))
    }
}
