//! Domain events and command queues for the Habitat simulation core.
//!
//! Engines never call each other's subscribers directly. Every observable
//! state change is pushed onto the [`EventBus`] as a [`SimEvent`] wrapped in
//! an [`EventEnvelope`], and the orchestrator drains the queue once per tick
//! in emission order. Commands from outside the core (an external hunter
//! killing an animal, a scripted kill) arrive through the inbound side of
//! the same bus and are drained at the start of the tick.
//!
//! # Modules
//!
//! - [`event`] -- The [`SimEvent`] and [`InboundCommand`] vocabularies
//! - [`bus`] -- The [`EventBus`] queue pair and envelope sequencing

pub mod bus;
pub mod event;

pub use bus::{EventBus, EventEnvelope};
pub use event::{InboundCommand, SimEvent};
