pub mod criterion;
pub mod loss;
pub mod soft_argmax;

pub use criterion::{Criterion, CriterionConfig, Target, get_criterion};
pub use loss::{
    LabelSmoothing, MultiLabelSmoothing, cross_entropy_loss, label_smoothing_loss,
    multilabel_smoothing_loss, soft_cross_entropy_loss,
};
pub use soft_argmax::SoftArgmax1d;
