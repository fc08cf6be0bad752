//! Criterion selection for classification training.
//!
//! [`get_criterion`] turns `(smoothing, multilabel)` into a [`Criterion`] once,
//! at configuration time. The training loop then calls
//! [`Criterion::forward`] every step.
//!
//! ```text
//! smoothing > 0, !multilabel  -> SmoothedSingleLabel
//! smoothing > 0,  multilabel  -> SmoothedMultiLabel
//! otherwise                   -> Standard (plain cross-entropy, index or soft targets)
//! ```

use std::path::Path;

use crate::error::{Error, Result};
use crate::nn::loss::{
    LabelSmoothing, MultiLabelSmoothing, cross_entropy_loss, soft_cross_entropy_loss,
};
use numr::autograd::Var;
use numr::dtype::DType;
use numr::ops::{ActivationOps, BinaryOps, IndexingOps, ReduceOps, ScalarOps, UnaryOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Ground truth passed to [`Criterion::forward`].
pub enum Target<'a, R: Runtime> {
    /// `[batch]` integer class indices
    Indices(&'a Tensor<R>),
    /// `[batch, classes]` label weights in `[0, 1]`
    Soft(&'a Tensor<R>),
}

// Manual impls: derives would demand `R: Clone/Copy/Debug` of the runtime marker.
impl<R: Runtime> Clone for Target<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: Runtime> Copy for Target<'_, R> {}

impl<R: Runtime> std::fmt::Debug for Target<'_, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (name, t) = match self {
            Target::Indices(t) => ("Indices", t),
            Target::Soft(t) => ("Soft", t),
        };
        f.debug_struct(name).field("shape", &t.shape()).finish()
    }
}

impl<R: Runtime> Target<'_, R> {
    fn kind(&self) -> &'static str {
        match self {
            Target::Indices(_) => "index",
            Target::Soft(_) => "soft",
        }
    }
}

/// Loss strategy resolved from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Criterion {
    /// Plain cross-entropy over class indices or class-probability targets
    #[default]
    Standard,
    /// Label smoothing over class indices
    SmoothedSingleLabel(LabelSmoothing),
    /// Label smoothing over multi-hot / soft targets
    SmoothedMultiLabel(MultiLabelSmoothing),
}

/// Pick a criterion from a smoothing factor and a multi-label flag.
///
/// Never fails: a non-positive (or NaN) `smoothing` selects plain cross-entropy.
pub fn get_criterion(smoothing: f64, multilabel: bool) -> Criterion {
    let criterion = if smoothing > 0.0 {
        if multilabel {
            Criterion::SmoothedMultiLabel(MultiLabelSmoothing::new(smoothing))
        } else {
            Criterion::SmoothedSingleLabel(LabelSmoothing::new(smoothing))
        }
    } else {
        Criterion::Standard
    };
    tracing::debug!(%criterion, smoothing, multilabel, "selected criterion");
    criterion
}

impl Criterion {
    /// Smoothing factor in use (0 for [`Criterion::Standard`]).
    pub fn smoothing(&self) -> f64 {
        match self {
            Criterion::Standard => 0.0,
            Criterion::SmoothedSingleLabel(ls) => ls.smoothing(),
            Criterion::SmoothedMultiLabel(ls) => ls.smoothing(),
        }
    }

    /// True only for [`Criterion::SmoothedMultiLabel`].
    pub fn is_multilabel(&self) -> bool {
        matches!(self, Criterion::SmoothedMultiLabel(_))
    }

    /// Compute the scalar loss for `scores` (`[batch, classes]` logits).
    ///
    /// [`Criterion::Standard`] takes either target kind (soft targets are used
    /// unnormalized). [`Criterion::SmoothedSingleLabel`] takes
    /// [`Target::Indices`] and [`Criterion::SmoothedMultiLabel`] takes
    /// [`Target::Soft`]; the other pairings are [`Error::TargetMismatch`].
    pub fn forward<R, C>(
        &self,
        client: &C,
        scores: &Var<R>,
        target: Target<'_, R>,
    ) -> Result<Var<R>>
    where
        R: Runtime<DType = DType>,
        C: RuntimeClient<R>
            + ActivationOps<R>
            + BinaryOps<R>
            + UnaryOps<R>
            + ReduceOps<R>
            + ScalarOps<R>
            + IndexingOps<R>,
        R::Client: ActivationOps<R>
            + BinaryOps<R>
            + UnaryOps<R>
            + ReduceOps<R>
            + ScalarOps<R>
            + IndexingOps<R>,
    {
        match (self, target) {
            (Criterion::Standard, Target::Indices(t)) => cross_entropy_loss(client, scores, t),
            (Criterion::Standard, Target::Soft(y)) => soft_cross_entropy_loss(client, scores, y),
            (Criterion::SmoothedSingleLabel(ls), Target::Indices(t)) => {
                ls.forward(client, scores, t)
            }
            (Criterion::SmoothedMultiLabel(ls), Target::Soft(y)) => ls.forward(client, scores, y),
            (_, target) => Err(Error::TargetMismatch {
                criterion: self.to_string(),
                expected: if self.is_multilabel() { "soft" } else { "index" },
                got: target.kind(),
            }),
        }
    }
}

impl std::fmt::Display for Criterion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Criterion::Standard => write!(f, "cross_entropy"),
            Criterion::SmoothedSingleLabel(ls) => write!(f, "label_smoothing({})", ls.smoothing()),
            Criterion::SmoothedMultiLabel(ls) => {
                write!(f, "multilabel_smoothing({})", ls.smoothing())
            }
        }
    }
}

/// Serializable criterion settings, e.g. a `criterion:` block in a training YAML.
#[derive(Debug, Clone, Copy, PartialEq, serde::Deserialize, serde::Serialize)]
#[serde(default)]
pub struct CriterionConfig {
    pub smoothing: f64,
    pub multilabel: bool,
}

impl Default for CriterionConfig {
    fn default() -> Self {
        Self {
            smoothing: 0.0,
            multilabel: false,
        }
    }
}

impl CriterionConfig {
    /// Smoothing factor; `<= 0` selects plain cross-entropy.
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing;
        self
    }

    /// Whether targets are multi-hot / soft rather than class indices.
    pub fn with_multilabel(mut self, multilabel: bool) -> Self {
        self.multilabel = multilabel;
        self
    }

    /// Parse from a YAML string. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config {
            reason: format!("YAML parse error: {e}"),
        })
    }

    /// Read and parse a YAML file.
    pub fn load_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
            reason: format!("IO error: {e}"),
        })?;
        Self::from_yaml(&content)
    }

    /// Resolve into a [`Criterion`] via [`get_criterion`].
    pub fn build(&self) -> Criterion {
        get_criterion(self.smoothing, self.multilabel)
    }
}
