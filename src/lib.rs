//! # smoothr
//!
//! **Training criteria built on numr — label smoothing and soft argmax.**
//!
//! smoothr adds a handful of differentiable training helpers on top of numr's
//! autograd. Everything takes and returns `Var<R>`, so results plug straight
//! into `numr::autograd::backward`.
//!
//! ## Contents
//!
//! - [`nn::Criterion`]: loss strategy picked once from config
//!   (plain cross-entropy, single-label or multi-label label smoothing)
//! - [`nn::loss`]: the loss functions themselves
//! - [`nn::SoftArgmax1d`]: expected index under a row-wise distribution
//!
//! ## Design
//!
//! - **Composed from numr primitives**: no custom kernels, same on all backends
//! - **Resolve once**: [`nn::get_criterion`] returns a closed enum, the training
//!   loop calls [`nn::Criterion::forward`] every step without re-checking flags

pub mod error;
pub mod nn;

pub use error::{Error, Result};
pub use nn::{Criterion, CriterionConfig, SoftArgmax1d, Target, get_criterion};

// Re-export numr types that users will commonly need
pub use numr::dtype::DType;
pub use numr::error::{Error as NumrError, Result as NumrResult};
pub use numr::runtime::{Runtime, RuntimeClient};
pub use numr::tensor::Tensor;
