//! Recorded inputs and reference outputs for one model.
//!
//! Each model has four JSON files next to its model directory:
//! `<model>.xs-data.json`, `<model>.xs-shapes.json`, `<model>.ys-data.json`
//! and `<model>.ys-shapes.json`. Data files hold one flat numeric array per
//! tensor; shape files hold the matching dimension lists, aligned by index.

use tracing::info;

use crate::{CheckError, CheckResult, FixtureClient};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Fixtures {
    pub inputs_data: Vec<Vec<f64>>,
    pub inputs_shapes: Vec<Vec<usize>>,
    pub outputs_data: Vec<Vec<f64>>,
    pub outputs_shapes: Vec<Vec<usize>>,
}

impl Fixtures {
    /// Checks that every buffer has a shape and fills it exactly.
    pub fn validate(&self, model: &str) -> CheckResult<()> {
        check_aligned(model, "xs", &self.inputs_data, &self.inputs_shapes)?;
        check_aligned(model, "ys", &self.outputs_data, &self.outputs_shapes)
    }
}

fn check_aligned(
    model: &str,
    which: &str,
    data: &[Vec<f64>],
    shapes: &[Vec<usize>],
) -> CheckResult<()> {
    let bad = |reason: String| CheckError::Fixture {
        model: model.to_string(),
        reason,
    };

    if data.len() != shapes.len() {
        return Err(bad(format!(
            "{which}-data has {} arrays but {which}-shapes has {}",
            data.len(),
            shapes.len()
        )));
    }
    for (i, (values, shape)) in data.iter().zip(shapes).enumerate() {
        let Some(numel) = shape.iter().try_fold(1usize, |n, d| n.checked_mul(*d)) else {
            return Err(bad(format!("{which}[{i}] shape {shape:?} is too large")));
        };
        if values.len() != numel {
            return Err(bad(format!(
                "{which}[{i}] has {} values but shape {shape:?} needs {numel}",
                values.len()
            )));
        }
    }
    Ok(())
}

/// Fetches the four fixture files of `model` concurrently.
pub async fn fetch_fixtures(client: &FixtureClient, model: &str) -> CheckResult<Fixtures> {
    let (inputs_data, inputs_shapes, outputs_data, outputs_shapes) = tokio::try_join!(
        client.get_json::<Vec<Vec<f64>>>(client.url(&format!("{model}.xs-data.json"))?),
        client.get_json::<Vec<Vec<usize>>>(client.url(&format!("{model}.xs-shapes.json"))?),
        client.get_json::<Vec<Vec<f64>>>(client.url(&format!("{model}.ys-data.json"))?),
        client.get_json::<Vec<Vec<usize>>>(client.url(&format!("{model}.ys-shapes.json"))?),
    )?;

    let fixtures = Fixtures {
        inputs_data,
        inputs_shapes,
        outputs_data,
        outputs_shapes,
    };
    fixtures.validate(model)?;

    info!(
        model,
        inputs = fixtures.inputs_data.len(),
        outputs = fixtures.outputs_data.len(),
        "fixtures loaded"
    );
    Ok(fixtures)
}
