//! Columnar batch processing for the Habitat simulation core.
//!
//! Large populations are processed as structure-of-arrays buffers rather
//! than one record at a time. A [`BatchProcessor`] lays records out into a
//! [`ColumnSet`], runs decay, additive, and cross-effect kernels over whole
//! columns, and writes the results back to the owning store.
//!
//! The CPU kernels in [`kernels`] are the reference implementation. An
//! optional [`ComputeBackend`] can take over large batches; every backend op
//! runs against a scratch copy inside [`ScratchArena::transact`], so a
//! failing backend can never leave a live buffer half-mutated.
//!
//! # Modules
//!
//! - [`columns`] -- The [`ColumnSet`] buffer type
//! - [`kernels`] -- Reference CPU kernels and cross-effect rules
//! - [`backend`] -- The [`ComputeBackend`] trait and [`ComputeError`]
//! - [`scratch`] -- Transactional scratch buffers
//! - [`batch`] -- The [`BatchProcessor`] and the [`ColumnarStore`] seam

pub mod backend;
pub mod batch;
pub mod columns;
pub mod kernels;
pub mod scratch;

pub use backend::{ComputeBackend, ComputeError};
#[cfg(feature = "parallel")]
pub use backend::RayonBackend;
pub use batch::{BatchProcessor, BatchStats, ColumnarStore};
pub use columns::ColumnSet;
pub use kernels::{CpuKernels, CrossEffectRule};
pub use scratch::ScratchArena;
