//! Spatial index, identity registries, and zones for the Habitat core.
//!
//! The registries are the single owners of every entity, agent, and animal
//! record. They record changes in per-registry dirty sets, which the
//! spatial index and agent reconciliation consume once per tick to bring
//! their derived views up to date.
//!
//! # Modules
//!
//! - [`registry`] -- [`EntityRegistry`], [`AgentRegistry`], [`AnimalRegistry`]
//!   over a shared [`RecordStore`](registry::RecordStore), plus [`DirtySet`].
//! - [`spatial`] -- [`SpatialIndex`], a uniform grid with incremental and
//!   full rebuilds and pooled query buffers.
//! - [`reconcile`] -- Keeps a generic entity projection for every agent.
//! - [`zone`] -- [`ZoneMap`] lookups.
//! - [`error`] -- [`WorldError`].

pub mod error;
pub mod reconcile;
pub mod registry;
pub mod spatial;
pub mod zone;

pub use error::WorldError;
pub use reconcile::{ReconcileConfig, ReconcileReport, reconcile_agents};
pub use registry::{AgentRegistry, AnimalRegistry, DirtySet, EntityRegistry, Record, RecordStore};
pub use spatial::{QueryPool, RebuildKind, SpatialConfig, SpatialHit, SpatialIndex, SpatialStats};
pub use zone::ZoneMap;
