//! Capability ports the engines reach other subsystems through.
//!
//! Each port is a small trait so the engines never depend on a concrete
//! inventory, social, or housing system. [`PortSet`] bundles them as
//! optional boxes: a missing port degrades the feature that needs it and
//! never blocks the rest of a tick.

use std::collections::BTreeMap;

use habitat_types::{ActivityKind, EntityId, HouseholdId, LifeStage, Position, ResourceKind};

use crate::genealogy::GenealogyTracker;
use crate::household::HouseholdRegistry;
use crate::inventory::InventoryStore;
use crate::movement::MovementTable;
use crate::roles::RoleBoard;
use crate::social::SocialGraph;
use crate::tasks::{ActivityBoard, TaskBoard};

/// Carried resources.
pub trait InventoryPort: Send {
    /// Units of `kind` held by `holder`.
    fn quantity(&self, holder: EntityId, kind: ResourceKind) -> u32;

    /// Remove up to `wanted` units. Returns how many were removed.
    fn consume(&mut self, holder: EntityId, kind: ResourceKind, wanted: u32) -> u32;

    /// Add units, up to carry capacity. Returns how many were accepted.
    fn deposit(&mut self, holder: EntityId, kind: ResourceKind, amount: u32) -> u32;

    /// Create an empty inventory for a new holder.
    fn open(&mut self, holder: EntityId);

    /// Empty and delete an inventory, returning what it held.
    fn drain(&mut self, holder: EntityId) -> BTreeMap<ResourceKind, u32>;
}

/// Pairwise affinity between agents.
pub trait SocialPort: Send {
    /// Affinity from -1 (hostile) to 1 (close).
    fn affinity(&self, a: EntityId, b: EntityId) -> f32;

    /// Shift affinity, clamped.
    fn adjust_affinity(&mut self, a: EntityId, b: EntityId, delta: f32);

    /// Forget every relationship involving `agent`. Returns how many were
    /// dropped.
    fn remove(&mut self, agent: EntityId) -> usize;
}

/// Household placement.
pub trait HouseholdPort: Send {
    /// The household `agent` belongs to.
    fn household_of(&self, agent: EntityId) -> Option<HouseholdId>;

    /// Place `agent` in a household with room, creating one if needed.
    fn assign(&mut self, agent: EntityId) -> Option<HouseholdId>;

    /// Take `agent` out of its household.
    fn remove(&mut self, agent: EntityId) -> bool;
}

/// Movement state.
pub trait MovementPort: Send {
    /// Start tracking `agent` at `position`.
    fn register(&mut self, agent: EntityId, position: Position);

    /// Current movement target.
    fn target(&self, agent: EntityId) -> Option<Position>;

    /// Set or clear the movement target.
    fn set_target(&mut self, agent: EntityId, target: Option<Position>);

    /// Stop tracking `agent`.
    fn remove(&mut self, agent: EntityId) -> bool;
}

/// Role assignment.
pub trait RolePort: Send {
    /// Current role.
    fn role_of(&self, agent: EntityId) -> Option<&'static str>;

    /// Assign a role suited to `stage`.
    fn assign(&mut self, agent: EntityId, stage: LifeStage) -> &'static str;

    /// Drop the assignment.
    fn remove(&mut self, agent: EntityId) -> bool;
}

/// Queued AI tasks.
pub trait TaskPort: Send {
    /// Drop every queued task. Returns how many were dropped.
    fn clear(&mut self, agent: EntityId) -> usize;
}

/// What each agent is currently doing.
pub trait ActivityPort: Send {
    /// Current activity; unknown agents are idle.
    fn activity(&self, agent: EntityId) -> ActivityKind;

    /// Record what `agent` is doing now.
    fn set_activity(&mut self, agent: EntityId, activity: ActivityKind);
}

/// Lineage records.
pub trait GenealogyPort: Send {
    /// Record a founder with no known parents.
    fn record_founder(&mut self, agent: EntityId);

    /// Record a birth.
    fn record_birth(&mut self, child: EntityId, mother: EntityId, father: EntityId, generation: u32);

    /// Record a death.
    fn record_death(&mut self, agent: EntityId, at_ms: u64);

    /// Undo a recorded death for a respawned agent. Lineage is untouched.
    fn record_revival(&mut self, agent: EntityId);

    /// Whether the agent is currently counted among the living.
    fn is_living(&self, agent: EntityId) -> bool;
}

/// Every optional port, owned by the orchestrator and lent to engines.
#[derive(Default)]
pub struct PortSet {
    /// Carried resources.
    pub inventory: Option<Box<dyn InventoryPort>>,
    /// Affinity graph.
    pub social: Option<Box<dyn SocialPort>>,
    /// Housing.
    pub household: Option<Box<dyn HouseholdPort>>,
    /// Movement state.
    pub movement: Option<Box<dyn MovementPort>>,
    /// Roles.
    pub roles: Option<Box<dyn RolePort>>,
    /// AI task queues.
    pub tasks: Option<Box<dyn TaskPort>>,
    /// Current activities.
    pub activity: Option<Box<dyn ActivityPort>>,
    /// Lineage.
    pub genealogy: Option<Box<dyn GenealogyPort>>,
}

impl core::fmt::Debug for PortSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PortSet")
            .field("inventory", &self.inventory.is_some())
            .field("social", &self.social.is_some())
            .field("household", &self.household.is_some())
            .field("movement", &self.movement.is_some())
            .field("roles", &self.roles.is_some())
            .field("tasks", &self.tasks.is_some())
            .field("activity", &self.activity.is_some())
            .field("genealogy", &self.genealogy.is_some())
            .finish()
    }
}

impl PortSet {
    /// No ports at all.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every port backed by the in-memory implementations in this crate.
    pub fn in_memory(carry_capacity: u32, household_capacity: usize) -> Self {
        Self {
            inventory: Some(Box::new(InventoryStore::new(carry_capacity))),
            social: Some(Box::new(SocialGraph::new())),
            household: Some(Box::new(HouseholdRegistry::new(household_capacity))),
            movement: Some(Box::new(MovementTable::new())),
            roles: Some(Box::new(RoleBoard::new())),
            tasks: Some(Box::new(TaskBoard::new())),
            activity: Some(Box::new(ActivityBoard::new())),
            genealogy: Some(Box::new(GenealogyTracker::new())),
        }
    }
}
