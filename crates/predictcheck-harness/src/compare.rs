use std::fmt;

use crate::{CheckError, CheckResult};

/// How many leading values to print when reporting a mismatch.
const PREVIEW: usize = 10;

#[derive(Clone, Debug, PartialEq)]
pub enum ArrayMismatch {
    Length {
        actual: usize,
        expected: usize,
    },
    Value {
        index: usize,
        actual: f64,
        expected: f64,
        epsilon: f64,
        actual_preview: Vec<f64>,
        expected_preview: Vec<f64>,
    },
}

impl fmt::Display for ArrayMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayMismatch::Length { actual, expected } => write!(
                f,
                "arrays have different lengths actual: {actual} vs expected: {expected}"
            ),
            ArrayMismatch::Value {
                index,
                actual,
                expected,
                epsilon,
                actual_preview,
                expected_preview,
            } => write!(
                f,
                "arrays differ: actual[{index}] = {actual}, expected[{index}] = {expected} \
                 (epsilon {epsilon})\nactual:   {actual_preview:?}\nexpected: {expected_preview:?}"
            ),
        }
    }
}

/// Any two non-finite values are close to each other, whatever their sign or
/// NaN-ness; a non-finite value is never close to a finite one.
fn are_close(a: f64, e: f64, epsilon: f64) -> bool {
    if !a.is_finite() && !e.is_finite() {
        return true;
    }
    (a - e).abs() <= epsilon
}

/// Elementwise `|actual - expected| <= epsilon`. Non-finite values only
/// match other non-finite values.
pub fn expect_arrays_close(
    actual: &[f64],
    expected: &[f64],
    epsilon: f64,
) -> Result<(), ArrayMismatch> {
    if actual.len() != expected.len() {
        return Err(ArrayMismatch::Length {
            actual: actual.len(),
            expected: expected.len(),
        });
    }

    match actual
        .iter()
        .zip(expected)
        .position(|(a, e)| !are_close(*a, *e, epsilon))
    {
        None => Ok(()),
        Some(index) => Err(ArrayMismatch::Value {
            index,
            actual: actual[index],
            expected: expected[index],
            epsilon,
            actual_preview: actual.iter().take(PREVIEW).copied().collect(),
            expected_preview: expected.iter().take(PREVIEW).copied().collect(),
        }),
    }
}

pub fn expect_shape(index: usize, actual: &[usize], expected: &[usize]) -> CheckResult<()> {
    if actual != expected {
        return Err(CheckError::ShapeMismatch {
            index,
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        });
    }
    Ok(())
}
