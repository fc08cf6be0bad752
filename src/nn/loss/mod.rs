//! Loss functions for classification training.
//!
//! | Function | Use case |
//! |---|---|
//! | [`cross_entropy_loss`] | Single-label classification, no smoothing |
//! | [`soft_cross_entropy_loss`] | Class-probability / multi-hot targets, no smoothing |
//! | [`label_smoothing_loss`] | Single-label classification with label smoothing |
//! | [`multilabel_smoothing_loss`] | Multi-hot / soft targets with label smoothing |
//!
//! [`LabelSmoothing`] and [`MultiLabelSmoothing`] hold the smoothing factor
//! for callers that want a configured object instead of a free function.

pub mod cross_entropy;
pub mod multilabel;

pub use cross_entropy::{
    LabelSmoothing, cross_entropy_loss, label_smoothing_loss, soft_cross_entropy_loss,
};
pub use multilabel::{MultiLabelSmoothing, multilabel_smoothing_loss};

use crate::error::{Error, Result};
use numr::dtype::DType;
use numr::runtime::Runtime;
use numr::tensor::Tensor;

/// Flatten targets to [N, 1] for gather operations.
fn prepare_targets<R: Runtime<DType = DType>>(
    targets: &Tensor<R>,
    batch_size: usize,
) -> Result<Tensor<R>> {
    targets
        .reshape(&[batch_size])
        .and_then(|t| t.unsqueeze(1))
        .and_then(|t| t.broadcast_to(&[batch_size, 1]))
        .map_err(Error::Numr)
}

/// All dimension indices for a tensor (for full reductions).
fn all_dims(ndim: usize) -> Vec<usize> {
    (0..ndim).collect()
}

/// Split `[..., C]` logits into `(rows, classes)`, rejecting anything below 2-D.
fn rows_and_classes(shape: &[usize]) -> Result<(usize, usize)> {
    let ndim = shape.len();
    if ndim < 2 {
        return Err(Error::InvalidArgument {
            arg: "logits",
            reason: format!("expected at least 2 dims, got {ndim}"),
        });
    }
    let classes = shape[ndim - 1];
    let rows = shape[..ndim - 1].iter().product();
    Ok((rows, classes))
}

/// `1 - smoothing`, the weight left on the ground-truth distribution.
fn confidence_for(smoothing: f64) -> f64 {
    1.0 - smoothing
}
