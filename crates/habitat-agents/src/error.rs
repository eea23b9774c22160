//! Error types for the habitat-agents crate.
//!
//! Engine updates never fail as a whole; these errors come from the
//! in-memory port implementations and from explicit reproduction calls.

use habitat_types::{EntityId, ResourceKind};

/// Errors that can occur during agent operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Adding resources would exceed carry capacity.
    #[error("inventory overflow: adding {attempted} of {resource:?} would exceed capacity (current load: {current_load}, capacity: {capacity})")]
    InventoryOverflow {
        /// The resource being added.
        resource: ResourceKind,
        /// The quantity the caller attempted to add.
        attempted: u32,
        /// The holder's current total load.
        current_load: u32,
        /// The holder's carry capacity.
        capacity: u32,
    },

    /// Removing more of a resource than is held.
    #[error("insufficient resource: wanted {requested} of {resource:?} but only have {available}")]
    InsufficientResource {
        /// The resource being removed.
        resource: ResourceKind,
        /// The quantity the caller attempted to remove.
        requested: u32,
        /// The quantity actually held.
        available: u32,
    },

    /// No agent with the given ID is registered, or it is dead.
    #[error("agent not found: {0}")]
    AgentNotFound(EntityId),

    /// Reproduction failed a precondition check.
    #[error("reproduction failed: {reason}")]
    ReproductionFailed {
        /// Why reproduction was rejected.
        reason: String,
    },
}
