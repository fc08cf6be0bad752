//! Cross-entropy and single-label label smoothing.

use super::{all_dims, confidence_for, prepare_targets, rows_and_classes};
use crate::error::{Error, Result};
use numr::autograd::{
    Var, var_add, var_gather, var_log_softmax, var_mean, var_mul, var_mul_scalar, var_neg,
    var_reshape, var_sum,
};
use numr::dtype::DType;
use numr::ops::{ActivationOps, BinaryOps, IndexingOps, ReduceOps, ScalarOps, UnaryOps};
use numr::runtime::{Runtime, RuntimeClient};
use numr::tensor::Tensor;

/// Cross-entropy loss: -mean(log_softmax(logits, -1)[targets])
///
/// This is the standard loss for classification.
///
/// - `logits`: `[..., C]` raw model output (pre-softmax)
/// - `targets`: `[...]` integer class indices in `[0, C)`
///
/// Returns scalar loss.
pub fn cross_entropy_loss<R, C>(client: &C, logits: &Var<R>, targets: &Tensor<R>) -> Result<Var<R>>
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
    let (n, num_classes) = rows_and_classes(logits.shape())?;

    let log_probs = var_log_softmax(logits, -1, client).map_err(Error::Numr)?;
    let log_probs_flat = var_reshape(&log_probs, &[n, num_classes]).map_err(Error::Numr)?;

    let targets_expanded = prepare_targets(targets, n)?;
    let selected =
        var_gather(&log_probs_flat, 1, &targets_expanded, client).map_err(Error::Numr)?;

    let neg_selected = var_neg(&selected, client).map_err(Error::Numr)?;
    var_mean(
        &neg_selected,
        &all_dims(neg_selected.shape().len()),
        false,
        client,
    )
    .map_err(Error::Numr)
}

/// Cross-entropy against class-probability targets:
/// `mean_i(-sum_c targets[i, c] * log_softmax(logits)[i, c])`
///
/// Targets are used as given (no row renormalization), so a one-hot row gives
/// the same value as [`cross_entropy_loss`] with that index.
///
/// - `logits`: `[..., C]` raw model output (pre-softmax)
/// - `targets`: `[..., C]` class weights, same shape and dtype as `logits`
pub fn soft_cross_entropy_loss<R, C>(
    client: &C,
    logits: &Var<R>,
    targets: &Tensor<R>,
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

    let weighted = var_mul(&y, &log_probs_flat, client).map_err(Error::Numr)?;
    let row_ce = var_sum(&weighted, &[1], false, client).map_err(Error::Numr)?;
    let per_row = var_neg(&row_ce, client).map_err(Error::Numr)?;

    var_mean(&per_row, &[0], false, client).map_err(Error::Numr)
}

/// Cross-entropy with label smoothing for single-label targets.
///
/// Per row `i`:
///
/// ```text
/// loss_i = (1 - smoothing) * -log_p[i, t_i] + smoothing * -mean_c(log_p[i, c])
/// ```
///
/// and the result is `mean_i(loss_i)`. With `smoothing = 0.0` this is exactly
/// [`cross_entropy_loss`].
///
/// - `logits`: `[..., C]` raw model output (pre-softmax)
/// - `targets`: `[...]` integer class indices in `[0, C)`
/// - `smoothing`: label smoothing factor in `[0, 1)`
pub fn label_smoothing_loss<R, C>(
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
        + ScalarOps<R>
        + IndexingOps<R>,
    R::Client: ActivationOps<R>
        + BinaryOps<R>
        + UnaryOps<R>
        + ReduceOps<R>
        + ScalarOps<R>
        + IndexingOps<R>,
{
    LabelSmoothing::new(smoothing).forward(client, logits, targets)
}

/// Single-label smoothing criterion.
///
/// Holds `smoothing` and the derived `confidence = 1 - smoothing`; both are
/// fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelSmoothing {
    confidence: f64,
    smoothing: f64,
}

impl Default for LabelSmoothing {
    fn default() -> Self {
        Self::new(0.1)
    }
}

impl LabelSmoothing {
    /// Criterion with `confidence = 1 - smoothing`.
    pub fn new(smoothing: f64) -> Self {
        Self {
            confidence: confidence_for(smoothing),
            smoothing,
        }
    }

    /// Weight on the true-class term.
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Mass spread uniformly over all classes.
    pub fn smoothing(&self) -> f64 {
        self.smoothing
    }

    /// Smoothed NLL averaged over the batch. Returns a 0-d `Var`.
    pub fn forward<R, C>(&self, client: &C, logits: &Var<R>, targets: &Tensor<R>) -> Result<Var<R>>
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
        let (n, num_classes) = rows_and_classes(logits.shape())?;

        let log_probs = var_log_softmax(logits, -1, client).map_err(Error::Numr)?;
        let log_probs_flat = var_reshape(&log_probs, &[n, num_classes]).map_err(Error::Numr)?;

        // True-class term: [N]
        let targets_expanded = prepare_targets(targets, n)?;
        let selected =
            var_gather(&log_probs_flat, 1, &targets_expanded, client).map_err(Error::Numr)?;
        let selected = var_reshape(&selected, &[n]).map_err(Error::Numr)?;
        let nll = var_neg(&selected, client).map_err(Error::Numr)?;

        // Uniform term: [N]
        let row_mean = var_mean(&log_probs_flat, &[1], false, client).map_err(Error::Numr)?;
        let uniform = var_neg(&row_mean, client).map_err(Error::Numr)?;

        let nll_scaled = var_mul_scalar(&nll, self.confidence, client).map_err(Error::Numr)?;
        let uni_scaled = var_mul_scalar(&uniform, self.smoothing, client).map_err(Error::Numr)?;
        let per_row = var_add(&nll_scaled, &uni_scaled, client).map_err(Error::Numr)?;

        var_mean(&per_row, &[0], false, client).map_err(Error::Numr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::cpu_setup;
    use numr::runtime::cpu::CpuRuntime;

    fn scalar(v: &Var<CpuRuntime>) -> f32 {
        let vals: Vec<f32> = v.tensor().to_vec();
        vals[0]
    }

    #[test]
    fn test_cross_entropy_basic() {
        let (client, device) = cpu_setup();

        #[rustfmt::skip]
        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(
                &[2.0f32, 1.0, 0.1,   // sample 0: class 0 is highest
                  0.1, 2.0, 1.0],     // sample 1: class 1 is highest
                &[2, 3],
                &device,
            ),
            true,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64, 1], &[2], &device);

        let loss = cross_entropy_loss(&client, &logits, &targets).unwrap();
        assert_eq!(loss.shape(), &[] as &[usize]);
        assert!(
            scalar(&loss) < 1.0,
            "loss={} should be < 1.0 for correct predictions",
            scalar(&loss)
        );
    }

    #[test]
    fn test_cross_entropy_dominant_logit() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[10.0f32, 0.0, 0.0], &[1, 3], &device),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64], &[1], &device);

        let loss = label_smoothing_loss(&client, &logits, &targets, 0.0).unwrap();
        // ln(1 + 2e^-10)
        let expected = (1.0f64 + 2.0 * (-10.0f64).exp()).ln() as f32;
        assert!(
            (scalar(&loss) - expected).abs() < 1e-6,
            "loss={}, expected={}",
            scalar(&loss),
            expected
        );
    }

    #[test]
    fn test_soft_cross_entropy_closed_form() {
        let (client, device) = cpu_setup();

        let data = [1.0f32, 2.0, 3.0, 0.5, -1.0, 0.0];
        let logits = Var::new(Tensor::<CpuRuntime>::from_slice(&data, &[2, 3], &device), false);
        // Rows need not sum to 1: no renormalization.
        let y_data = [0.2f32, 0.0, 0.8, 1.0, 0.0, 1.0];
        let y = Tensor::<CpuRuntime>::from_slice(&y_data, &[2, 3], &device);

        let loss = soft_cross_entropy_loss(&client, &logits, &y).unwrap();

        let mut expected = 0.0f32;
        for (row, y_row) in data.chunks(3).zip(y_data.chunks(3)) {
            let lse = row.iter().map(|v| v.exp()).sum::<f32>().ln();
            expected -= row.iter().zip(y_row).map(|(x, t)| t * (x - lse)).sum::<f32>();
        }
        expected /= 2.0;
        assert!(
            (scalar(&loss) - expected).abs() < 1e-5,
            "loss={}, expected={}",
            scalar(&loss),
            expected
        );
    }

    #[test]
    fn test_soft_cross_entropy_one_hot_is_ce() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[2.0f32, 1.0, 0.1, 0.1, 2.0, 1.0], &[2, 3], &device),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64, 1], &[2], &device);
        let one_hot =
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 0.0, 0.0, 0.0, 1.0, 0.0], &[2, 3], &device);

        let ce = cross_entropy_loss(&client, &logits, &targets).unwrap();
        let soft = soft_cross_entropy_loss(&client, &logits, &one_hot).unwrap();
        assert!((scalar(&ce) - scalar(&soft)).abs() < 1e-6);
    }

    #[test]
    fn test_soft_cross_entropy_shape_mismatch() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[0.0f32; 6], &[2, 3], &device),
            false,
        );
        let y = Tensor::<CpuRuntime>::from_slice(&[1.0f32, 0.0, 0.0], &[1, 3], &device);

        let err = soft_cross_entropy_loss(&client, &logits, &y).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "targets", .. }));
    }

    #[test]
    fn test_label_smoothing_zero_is_ce() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[2.0f32, 1.0, 0.1, 0.1, 2.0, 1.0], &[2, 3], &device),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64, 1], &[2], &device);

        let ce = cross_entropy_loss(&client, &logits, &targets).unwrap();
        let smooth = label_smoothing_loss(&client, &logits, &targets, 0.0).unwrap();
        assert!(
            (scalar(&ce) - scalar(&smooth)).abs() < 1e-6,
            "smoothing=0 should match CE: {} vs {}",
            scalar(&ce),
            scalar(&smooth)
        );
    }

    #[test]
    fn test_label_smoothing_reduces_confidence() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[2.0f32, 1.0, 0.1, 0.1, 2.0, 1.0], &[2, 3], &device),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64, 1], &[2], &device);

        let ce = cross_entropy_loss(&client, &logits, &targets).unwrap();
        let smooth = LabelSmoothing::new(0.1)
            .forward(&client, &logits, &targets)
            .unwrap();
        assert!(
            scalar(&smooth) > scalar(&ce),
            "smoothed loss {} should be > unsmoothed {}",
            scalar(&smooth),
            scalar(&ce)
        );
    }

    #[test]
    fn test_label_smoothing_is_convex_combination() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(
                &[0.5f32, -1.0, 2.5, 0.0, 1.0, 1.5, -0.5, 0.2],
                &[2, 4],
                &device,
            ),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[2i64, 0], &[2], &device);

        let pure_nll = scalar(&label_smoothing_loss(&client, &logits, &targets, 0.0).unwrap());
        let pure_uniform = scalar(&label_smoothing_loss(&client, &logits, &targets, 1.0).unwrap());
        let (lo, hi) = (pure_nll.min(pure_uniform), pure_nll.max(pure_uniform));

        for s in [0.05, 0.1, 0.3, 0.5, 0.9] {
            let v = scalar(&label_smoothing_loss(&client, &logits, &targets, s).unwrap());
            assert!(
                v >= lo - 1e-6 && v <= hi + 1e-6,
                "s={s}: {v} not in [{lo}, {hi}]"
            );
            let expected = (1.0 - s as f32) * pure_nll + s as f32 * pure_uniform;
            assert!((v - expected).abs() < 1e-5, "s={s}: {v} vs {expected}");
        }
    }

    #[test]
    fn test_label_smoothing_flattens_leading_dims() {
        let (client, device) = cpu_setup();

        let data = [0.3f32, 1.2, -0.4, 2.0, 0.0, 0.7, 1.1, -1.3, 0.9, 0.4, 0.4, 0.4];
        let flat = Var::new(Tensor::<CpuRuntime>::from_slice(&data, &[4, 3], &device), false);
        let nested = Var::new(
            Tensor::<CpuRuntime>::from_slice(&data, &[2, 2, 3], &device),
            false,
        );
        let t_flat = Tensor::<CpuRuntime>::from_slice(&[1i64, 0, 2, 1], &[4], &device);
        let t_nested = Tensor::<CpuRuntime>::from_slice(&[1i64, 0, 2, 1], &[2, 2], &device);

        let a = label_smoothing_loss(&client, &flat, &t_flat, 0.2).unwrap();
        let b = label_smoothing_loss(&client, &nested, &t_nested, 0.2).unwrap();
        assert!((scalar(&a) - scalar(&b)).abs() < 1e-6);
    }

    #[test]
    fn test_label_smoothing_rejects_1d_logits() {
        let (client, device) = cpu_setup();

        let logits = Var::new(
            Tensor::<CpuRuntime>::from_slice(&[1.0f32, 2.0, 3.0], &[3], &device),
            false,
        );
        let targets = Tensor::<CpuRuntime>::from_slice(&[0i64], &[1], &device);

        let err = LabelSmoothing::default()
            .forward(&client, &logits, &targets)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { arg: "logits", .. }));
    }

    #[test]
    fn test_confidence_plus_smoothing_is_one() {
        for s in [0.0, 0.1, 0.2, 0.3, 0.25, 0.7] {
            let ls = LabelSmoothing::new(s);
            assert_eq!(ls.smoothing(), s);
            assert_eq!(ls.confidence() + ls.smoothing(), 1.0);
        }
        assert_eq!(LabelSmoothing::default().smoothing(), 0.1);
    }
}
