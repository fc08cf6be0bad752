//! Label smoothing for multi-label (multi-hot or soft) targets.
//!
//! Each row of the target is normalized into a distribution, blended with the
//! uniform distribution over classes, and scored against `log_softmax(logits)`:
//!
//! ```text
//! q_i   = (1 - smoothing) * y_i / sum_c(y_i) + smoothing / C
//! loss  = mean_i( -sum_c q_i[c] * log_p[i, c] )
//! ```
//!
//! A one-hot `y` gives the same value as
//! [`label_smoothing_loss`](super::label_smoothing_loss).

use super::{all_dims, confidence_for, rows_and_classes};
use crate::error::{Error, Result};
use numr::autograd::{
    Var, var_add_scalar, var_div, var_log_softmax, var_mean, var_mul, var_mul_scalar, var_neg,
    var_reshape, var_sum,
};
use numr::dtype::DType;
use numr::ops::{ActivationOps, BinaryOps, ReduceOps, ScalarOps, UnaryOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Keeps an all-zero target row finite; it then scores as pure uniform smoothing.
const ROW_SUM_EPS: f64 = 1e-12;

/// Multi-label smoothed cross-entropy.
///
/// - `logits`: `[..., C]` raw model output (pre-softmax)
/// - `targets`: `[..., C]` label weights in `[0, 1]`, same shape and dtype as `logits`
/// - `smoothing`: label smoothing factor in `[0, 1)`
pub fn multilabel_smoothing_loss<R, C>(
    client: &C,
    logits: &Var<R>,
    targets: &Tensor<R>,
    smoothing: f64,
) -> Result<Var<R>>
where
    R: Runtime<DType = DType>,
    C: RuntimeClient<R>
        + ActivationOps<R>
        + BinaryOps<R>
        + UnaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>,
    R::Client: ActivationOps<R> + BinaryOps<R> + UnaryOps<R> + ReduceOps<R> + ScalarOps<R>,
{
    MultiLabelSmoothing::new(smoothing).forward(client, logits, targets)
}

/// Multi-label smoothing criterion. Same `confidence`/`smoothing` pair as
/// [`LabelSmoothing`](super::LabelSmoothing), applied to per-class target weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiLabelSmoothing {
    confidence: f64,
    smoothing: f64,
}

impl Default for MultiLabelSmoothing {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl MultiLabelSmoothing {
    /// Criterion with `confidence = 1 - smoothing`.
    pub fn new(smoothing: f64) -> Self {
        Self {
            confidence: confidence_for(smoothing),
            smoothing,
        }
    }

    /// Weight on the normalized target row.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Mass spread uniformly over all classes.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Smoothed multi-label cross-entropy averaged over the batch. Returns a 0-d `Var`.
    pub fn forward<R, C>(&self, client: &C, logits: &Var<R>, targets: &Tensor<R>) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R>
            + ActivationOps<R>
            + BinaryOps<R>
            + UnaryOps<R>
            + ReduceOps<R>
            + ScalarOps<R>,
        R::Client: ActivationOps<R> + BinaryOps<R> + UnaryOps<R> + ReduceOps<R> + ScalarOps<R>,
    {
        if targets.shape() != logits.shape() {
            return Err(Error::InvalidArgument {
                arg: "targets",
                reason: format!(
                    "logits are {:?} but targets are {:?} (must match)",
                    logits.shape(),
                    targets.shape()
                ),
            });
        }
        let (n, num_classes) = rows_and_classes(logits.shape())?;

        let log_probs = var_log_softmax(logits, -1, client).map_err(Error::Numr)?;
        let log_probs_flat = var_reshape(&log_probs, &[n, num_classes]).map_err(Error::Numr)?;

        let y = Var::new(
            targets.reshape(&[n, num_classes]).map_err(Error::Numr)?,
            false,
        );

        // Normalize each row of y into a distribution: [N, C]
        let row_sum = var_sum(&y, &[1], true, client).map_err(Error::Numr)?;
        let denom = var_add_scalar(&row_sum, ROW_SUM_EPS, client).map_err(Error::Numr)?;
        let y_norm = var_div(&y, &denom, client).map_err(Error::Numr)?;

        // Blend with uniform: confidence * y_norm + smoothing / C
        let scaled = var_mul_scalar(&y_norm, self.confidence, client).map_err(Error::Numr)?;
        let smoothed = var_add_scalar(&scaled, self.smoothing / num_classes as f64, client)
            .map_err(Error::Numr)?;

        // Per-row cross-entropy: [N]
        let weighted = var_mul(&smoothed, &log_probs_flat, client).map_err(Error::Numr)?;
        let row_ce = var_sum(&weighted, &[1], false, client).map_err(Error::Numr)?;
        let per_row = var_neg(&row_ce, client).map_err(Error::Numr)?;

        var_mean(&per_row, &all_dims(per_row.shape().len()), false, client).map_err(Error::Numr)
    }
}
