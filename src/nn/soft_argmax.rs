//! Differentiable 1-D soft argmax
//!
//! SoftArgmax(x)_b = sum_k softmax(x_b)_k * (base_index + k * step_size)
//!
//! Replaces the hard argmax with an expectation over positions so gradients
//! reach the scores.

use crate::error::{Error, Result};
use numr::autograd::{Var, var_matmul, var_reshape, var_softmax};
use numr::dtype::DType;
use numr::ops::{ActivationOps, ReduceOps, ScalarOps, TensorOps, TypeConversionOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Soft argmax over the last dim of a `[batch, width]` input.
///
/// Position `k` is worth `base_index + k * step_size`. With `do_softmax`
/// disabled the input rows are used as weights directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct SoftArgmax1d {
    pub base_index: i64,
    pub step_size: i64,
    pub do_softmax: bool,
}

impl Default for SoftArgmax1d {
    fn default() -> Self {
        Self {
            base_index: 0,
            step_size: 1,
            do_softmax: true,
        }
    }
}

impl SoftArgmax1d {
    /// Softmax-normalizing soft argmax with the given index origin and stride.
    pub fn new(base_index: i64, step_size: i64) -> Self {
        Self {
            base_index,
            step_size,
            ..Self::default()
        }
    }

    /// Value assigned to position 0.
    pub fn with_base_index(mut self, base_index: i64) -> Self {
        self.base_index = base_index;
        self
    }

    /// Distance between the values of neighbouring positions. May be negative.
    pub fn with_step_size(mut self, step_size: i64) -> Self {
        self.step_size = step_size;
        self
    }

    /// Whether rows are softmax-normalized first. Disable when the input is
    /// already a distribution.
    pub fn with_softmax(mut self, do_softmax: bool) -> Self {
        self.do_softmax = do_softmax;
        self
    }

    /// Index values for a row of `width` positions.
    ///
    /// Computed in `f64`, so extreme `base_index`/`step_size` lose precision
    /// instead of overflowing.
    pub fn indices(&self, width: usize) -> Vec<f64> {
        let base = self.base_index as f64;
        let step = self.step_size as f64;
        (0..width).map(|k| base + k as f64 * step).collect()
    }

    /// Forward: `[batch, width]` -> `[batch]`
    ///
    /// Accepts any float dtype (F16, BF16, F32, F64). The index vector is built
    /// on the input's device and cast to the input's dtype.
    pub fn forward<R, C>(&self, client: &C, x: &Var<R>) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R>
            + TensorOps<R>
            + ActivationOps<R>
            + ReduceOps<R>
            + ScalarOps<R>
            + TypeConversionOps<R>,
        R::Client: TensorOps<R> + ActivationOps<R> + ReduceOps<R> + ScalarOps<R>,
    {
        let shape = x.shape();
        if shape.len() != 2 {
            return Err(Error::InvalidArgument {
                arg: "x",
                reason: format!("expected [batch, width], got {shape:?}"),
            });
        }
        let (batch, width) = (shape[0], shape[1]);

        let dtype = x.tensor().dtype();
        if !matches!(dtype, DType::F16 | DType::BF16 | DType::F32 | DType::F64) {
            return Err(Error::DTypeMismatch {
                expected: DType::F32,
                got: dtype,
            });
        }

        let probs = if self.do_softmax {
            var_softmax(x, -1, client).map_err(Error::Numr)?
        } else {
            x.clone()
        };

        let indices =
            Tensor::<R>::from_slice(&self.indices(width), &[width, 1], x.tensor().device());
        let indices = if dtype == DType::F64 {
            indices
        } else {
            client.cast(&indices, dtype).map_err(Error::Numr)?
        };
        let indices = Var::new(indices, false);

        // [batch, width] @ [width, 1] -> [batch, 1]
        let expected = var_matmul(&probs, &indices, client).map_err(Error::Numr)?;
        var_reshape(&expected, &[batch]).map_err(Error::Numr)
    }
}
