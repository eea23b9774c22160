//! Core domain structs for the Habitat simulation core.
//!
//! Covers positions, needs, traits, genes, the three record types owned by
//! the registries (`Entity`, `Agent`, `Animal`), zones, and the alive-only
//! snapshot projections handed to external consumers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    AnimalState, Biome, DeathCause, EntityKind, LifeStage, NeedKind, ResourceKind, Sex, ZoneKind,
};
use crate::ids::{EntityId, ZoneId};

/// Upper bound of every need value.
pub const NEED_MAX: f32 = 100.0;

/// Lower bound of every gene multiplier.
pub const GENE_MIN: f32 = 0.5;

/// Upper bound of every gene multiplier.
pub const GENE_MAX: f32 = 1.5;

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// A 2D world-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f32,
    /// Vertical coordinate.
    pub y: f32,
}

impl Position {
    /// Create a position.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Squared distance to `other`. Use this for threshold checks to avoid
    /// the square root.
    pub fn distance_sq(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to `other`.
    pub fn distance(self, other: Self) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Move at most `max_step` units toward `target`. Lands exactly on the
    /// target when it is closer than `max_step`.
    pub fn step_toward(self, target: Self, max_step: f32) -> Self {
        let dist = self.distance(target);
        if dist <= max_step || dist <= f32::EPSILON {
            return target;
        }
        let ratio = max_step / dist;
        Self {
            x: (target.x - self.x).mul_add(ratio, self.x),
            y: (target.y - self.y).mul_add(ratio, self.y),
        }
    }

    /// Move `step` units directly away from `threat`. When both positions
    /// coincide the move goes along the positive x axis.
    pub fn step_away(self, threat: Self, step: f32) -> Self {
        let dx = self.x - threat.x;
        let dy = self.y - threat.y;
        let len = dx.hypot(dy);
        if len <= f32::EPSILON {
            return Self::new(self.x + step, self.y);
        }
        Self {
            x: (dx / len).mul_add(step, self.x),
            y: (dy / len).mul_add(step, self.y),
        }
    }

    /// Clamp into the rectangle `[0, width] x [0, height]`.
    pub const fn clamp_to(self, width: f32, height: f32) -> Self {
        Self {
            x: self.x.clamp(0.0, width),
            y: self.y.clamp(0.0, height),
        }
    }
}

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// Physiological needs of an agent. 100 is satisfied, 0 is fully deprived.
///
/// Every mutation goes through [`Needs::set`] or [`Needs::clamp_all`], so
/// values never leave `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Needs {
    /// Food satiation.
    pub hunger: f32,
    /// Hydration.
    pub thirst: f32,
    /// Rest and stamina.
    pub energy: f32,
    /// Cleanliness.
    pub hygiene: f32,
    /// Social contact.
    pub social: f32,
    /// Entertainment.
    pub fun: f32,
    /// Mental wellbeing.
    pub mental_health: f32,
}

impl Default for Needs {
    fn default() -> Self {
        Self::filled(NEED_MAX)
    }
}

impl Needs {
    /// A needs record with every value set to `value` (clamped).
    pub const fn filled(value: f32) -> Self {
        let v = clamp_need(value);
        Self {
            hunger: v,
            thirst: v,
            energy: v,
            hygiene: v,
            social: v,
            fun: v,
            mental_health: v,
        }
    }

    /// Read one need.
    pub const fn get(&self, need: NeedKind) -> f32 {
        match need {
            NeedKind::Hunger => self.hunger,
            NeedKind::Thirst => self.thirst,
            NeedKind::Energy => self.energy,
            NeedKind::Hygiene => self.hygiene,
            NeedKind::Social => self.social,
            NeedKind::Fun => self.fun,
            NeedKind::MentalHealth => self.mental_health,
        }
    }

    /// Write one need, clamped to `[0, 100]`.
    pub const fn set(&mut self, need: NeedKind, value: f32) {
        let v = clamp_need(value);
        match need {
            NeedKind::Hunger => self.hunger = v,
            NeedKind::Thirst => self.thirst = v,
            NeedKind::Energy => self.energy = v,
            NeedKind::Hygiene => self.hygiene = v,
            NeedKind::Social => self.social = v,
            NeedKind::Fun => self.fun = v,
            NeedKind::MentalHealth => self.mental_health = v,
        }
    }

    /// Add `delta` (possibly negative) to one need, clamped.
    pub fn add(&mut self, need: NeedKind, delta: f32) {
        self.set(need, self.get(need) + delta);
    }

    /// Values in column order (see [`NeedKind::index`]).
    pub const fn to_array(&self) -> [f32; NeedKind::COUNT] {
        [
            self.hunger,
            self.thirst,
            self.energy,
            self.hygiene,
            self.social,
            self.fun,
            self.mental_health,
        ]
    }

    /// Build from values in column order, clamping each.
    pub const fn from_array(values: [f32; NeedKind::COUNT]) -> Self {
        let [hunger, thirst, energy, hygiene, social, fun, mental_health] = values;
        let mut needs = Self {
            hunger,
            thirst,
            energy,
            hygiene,
            social,
            fun,
            mental_health,
        };
        needs.clamp_all();
        needs
    }

    /// Clamp every value into `[0, 100]`. NaN collapses to 0.
    pub const fn clamp_all(&mut self) {
        self.hunger = clamp_need(self.hunger);
        self.thirst = clamp_need(self.thirst);
        self.energy = clamp_need(self.energy);
        self.hygiene = clamp_need(self.hygiene);
        self.social = clamp_need(self.social);
        self.fun = clamp_need(self.fun);
        self.mental_health = clamp_need(self.mental_health);
    }
}

/// Clamp a need value into `[0, 100]`, mapping NaN to 0.
pub const fn clamp_need(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, NEED_MAX)
    }
}

/// Needs of an animal. Hunger and thirst fall over time (100 = sated);
/// fear and reproductive urge are pressures (100 = maximal).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AnimalNeeds {
    /// Food satiation.
    pub hunger: f32,
    /// Hydration.
    pub thirst: f32,
    /// Fear level.
    pub fear: f32,
    /// Drive to mate.
    pub reproductive_urge: f32,
}

impl Default for AnimalNeeds {
    fn default() -> Self {
        Self {
            hunger: NEED_MAX,
            thirst: NEED_MAX,
            fear: 0.0,
            reproductive_urge: 0.0,
        }
    }
}

impl AnimalNeeds {
    /// Clamp every value into `[0, 100]`.
    pub const fn clamp_all(&mut self) {
        self.hunger = clamp_need(self.hunger);
        self.thirst = clamp_need(self.thirst);
        self.fear = clamp_need(self.fear);
        self.reproductive_urge = clamp_need(self.reproductive_urge);
    }
}

// ---------------------------------------------------------------------------
// Traits, appearance, genes
// ---------------------------------------------------------------------------

/// Personality traits of an agent, each in `[0, 1]`.
///
/// The named fields cover everything the core reasons about; `extra` is a
/// narrow extension map for host-defined traits that are carried through
/// inheritance untouched by any engine logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Traits {
    /// Preference for collaboration.
    pub cooperation: f32,
    /// Tendency toward conflict.
    pub aggression: f32,
    /// Work ethic.
    pub diligence: f32,
    /// Drive to explore.
    pub curiosity: f32,
    /// Desire for company.
    pub sociability: f32,
    /// Host-defined extra traits.
    #[serde(default)]
    pub extra: BTreeMap<String, f32>,
}

impl Default for Traits {
    fn default() -> Self {
        Self {
            cooperation: 0.5,
            aggression: 0.5,
            diligence: 0.5,
            curiosity: 0.5,
            sociability: 0.5,
            extra: BTreeMap::new(),
        }
    }
}

impl Traits {
    /// The named traits in a fixed order.
    pub const fn named(&self) -> [f32; 5] {
        [
            self.cooperation,
            self.aggression,
            self.diligence,
            self.curiosity,
            self.sociability,
        ]
    }

    /// Build from named trait values in [`Traits::named`] order, clamping
    /// each to `[0, 1]`.
    pub fn from_named(values: [f32; 5], extra: BTreeMap<String, f32>) -> Self {
        let [cooperation, aggression, diligence, curiosity, sociability] =
            values.map(|v| v.clamp(0.0, 1.0));
        Self {
            cooperation,
            aggression,
            diligence,
            curiosity,
            sociability,
            extra,
        }
    }
}

/// Visual appearance of an agent, each value in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Appearance {
    /// Skin tone on a light-to-dark scale.
    pub skin_tone: f32,
    /// Hair tone on a light-to-dark scale.
    pub hair_tone: f32,
    /// Relative height.
    pub height: f32,
}

impl Default for Appearance {
    fn default() -> Self {
        Self {
            skin_tone: 0.5,
            hair_tone: 0.5,
            height: 0.5,
        }
    }
}

/// Heritable multipliers of an animal, each in `[GENE_MIN, GENE_MAX]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Genes {
    /// Coat color shift.
    pub color: f32,
    /// Body size.
    pub size: f32,
    /// Movement speed.
    pub speed: f32,
    /// Maximum health.
    pub health: f32,
    /// Reproductive drive.
    pub fertility: f32,
}

impl Default for Genes {
    fn default() -> Self {
        Self {
            color: 1.0,
            size: 1.0,
            speed: 1.0,
            health: 1.0,
            fertility: 1.0,
        }
    }
}

impl Genes {
    /// The genes in a fixed order.
    pub const fn to_array(&self) -> [f32; 5] {
        [self.color, self.size, self.speed, self.health, self.fertility]
    }

    /// Build from values in [`Genes::to_array`] order, clamping each.
    pub fn from_array(values: [f32; 5]) -> Self {
        let [color, size, speed, health, fertility] =
            values.map(|v| if v.is_nan() { 1.0 } else { v.clamp(GENE_MIN, GENE_MAX) });
        Self {
            color,
            size,
            speed,
            health,
            fertility,
        }
    }
}

// ---------------------------------------------------------------------------
// Registry records
// ---------------------------------------------------------------------------

/// Named stats of a generic entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntityStats {
    /// Hit points for destructible entities.
    pub health: f32,
    /// Units held (for resource nodes).
    pub amount: f32,
    /// Maximum units held (for resource nodes and buildings).
    pub capacity: f32,
    /// Host-defined extra stats.
    #[serde(default)]
    pub extra: BTreeMap<String, f32>,
}

/// A generic spatially placed record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Entity {
    /// Unique identifier.
    pub id: EntityId,
    /// Kind tag.
    pub kind: EntityKind,
    /// World-space position.
    pub position: Position,
    /// Whether the entity is alive / present.
    pub alive: bool,
    /// Named stats.
    pub stats: EntityStats,
    /// What a resource node yields, if this is one.
    pub resource: Option<ResourceKind>,
}

impl Entity {
    /// Create a live entity with empty stats.
    pub fn new(id: EntityId, kind: EntityKind, position: Position) -> Self {
        Self {
            id,
            kind,
            position,
            alive: true,
            stats: EntityStats::default(),
            resource: None,
        }
    }

    /// Create a live resource node holding `amount` units.
    pub fn resource_node(id: EntityId, resource: ResourceKind, position: Position, amount: f32) -> Self {
        Self {
            id,
            kind: EntityKind::Resource,
            position,
            alive: true,
            stats: EntityStats {
                amount,
                capacity: amount,
                ..EntityStats::default()
            },
            resource: Some(resource),
        }
    }
}

/// A populated agent.
///
/// Parent links are IDs only; an agent never owns or points at another
/// agent, so removing a parent can never leave a dangling reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Unique identifier.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// World-space position.
    pub position: Position,
    /// Whether the agent is alive.
    pub alive: bool,
    /// Biological sex.
    pub sex: Sex,
    /// Age in simulated years.
    pub age_years: f32,
    /// Life stage derived from age.
    pub life_stage: LifeStage,
    /// Generation number (0 for seed agents).
    pub generation: u32,
    /// First parent, if born in the simulation.
    pub parent_a: Option<EntityId>,
    /// Second parent, if born in the simulation.
    pub parent_b: Option<EntityId>,
    /// Personality traits.
    pub traits: Traits,
    /// Appearance.
    pub appearance: Appearance,
    /// Social standing in `[0, 1]`.
    pub social_status: f32,
    /// Immortal agents never die from needs or age.
    pub immortal: bool,
    /// Simulation time of death, if dead.
    pub died_at_ms: Option<u64>,
    /// Cause of death, if dead.
    pub cause_of_death: Option<DeathCause>,
}

/// A simulated animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Animal {
    /// Unique identifier.
    pub id: EntityId,
    /// Species name, a key into the species table.
    pub species: String,
    /// World-space position.
    pub position: Position,
    /// Current behavior state.
    pub state: AnimalState,
    /// Current needs.
    pub needs: AnimalNeeds,
    /// Heritable multipliers.
    pub genes: Genes,
    /// Hit points.
    pub health: f32,
    /// Age in simulated years.
    pub age_years: f32,
    /// Generation number (0 for spawned animals).
    pub generation: u32,
    /// First parent, if born in the simulation.
    pub parent_a: Option<EntityId>,
    /// Second parent, if born in the simulation.
    pub parent_b: Option<EntityId>,
    /// Where the animal is heading, if anywhere.
    pub target_position: Option<Position>,
    /// What the animal is heading for (prey, mate, resource node).
    pub target_id: Option<EntityId>,
    /// What the animal is fleeing from.
    pub flee_from: Option<EntityId>,
    /// Biome tag.
    pub biome: Biome,
    /// Whether the animal is dead.
    pub dead: bool,
    /// Milliseconds spent in the current state.
    pub state_timer_ms: u64,
    /// Simulation time before which the animal cannot mate again.
    pub mate_ready_at_ms: u64,
    /// Simulation time of death, if dead.
    pub died_at_ms: Option<u64>,
    /// Cause of death, if dead.
    pub cause_of_death: Option<DeathCause>,
}

impl Animal {
    /// Whether the animal is alive.
    pub const fn is_alive(&self) -> bool {
        !self.dead
    }
}

/// A tagged spatial region granting presence bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Zone {
    /// Unique identifier.
    pub id: ZoneId,
    /// Zone tag.
    pub kind: ZoneKind,
    /// Centre of the zone.
    pub center: Position,
    /// Radius of the zone.
    pub radius: f32,
}

impl Zone {
    /// Whether `position` lies inside the zone.
    pub fn contains(&self, position: Position) -> bool {
        self.center.distance_sq(position) <= self.radius * self.radius
    }
}

// ---------------------------------------------------------------------------
// Snapshots and statistics
// ---------------------------------------------------------------------------

/// Alive-only projection of a generic entity for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct EntitySnapshot {
    /// Entity ID.
    pub id: EntityId,
    /// Kind tag.
    pub kind: EntityKind,
    /// Position.
    pub position: Position,
    /// What a resource node yields, if this is one.
    pub resource: Option<ResourceKind>,
    /// Units held (resource nodes).
    pub amount: f32,
}

/// Alive-only projection of an agent for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentSnapshot {
    /// Agent ID.
    pub id: EntityId,
    /// Display name.
    pub name: String,
    /// Position.
    pub position: Position,
    /// Sex.
    pub sex: Sex,
    /// Age in years.
    pub age_years: f32,
    /// Life stage.
    pub life_stage: LifeStage,
    /// Generation.
    pub generation: u32,
}

/// Alive-only projection of an animal for external consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AnimalSnapshot {
    /// Animal ID.
    pub id: EntityId,
    /// Species name.
    pub species: String,
    /// Position.
    pub position: Position,
    /// Behavior state.
    pub state: AnimalState,
    /// Biome tag.
    pub biome: Biome,
    /// Hunger value.
    pub hunger: f32,
    /// Thirst value.
    pub thirst: f32,
}

/// Cached aggregate counts of a registry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RegistryStats {
    /// Records held, alive or dead.
    pub total: u32,
    /// Alive records.
    pub alive: u32,
    /// Dead records awaiting the cleanup sweep.
    pub dead: u32,
    /// Alive records by a registry-specific grouping key (entity kind,
    /// life stage, or species).
    pub groups: BTreeMap<String, u32>,
}

/// Population summary written back to the host each tick.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PopulationStats {
    /// Living agents.
    pub agents_alive: u32,
    /// Living children.
    pub children: u32,
    /// Living adults.
    pub adults: u32,
    /// Living elders.
    pub elders: u32,
    /// Living animals.
    pub animals_alive: u32,
    /// Living animals by species.
    pub animals_by_species: BTreeMap<String, u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    #[test]
    fn needs_set_clamps() {
        let mut needs = Needs::default();
        needs.set(NeedKind::Hunger, 140.0);
        assert!((needs.hunger - 100.0).abs() < EPS);
        needs.add(NeedKind::Thirst, -250.0);
        assert!(needs.thirst.abs() < EPS);
    }

    #[test]
    fn needs_array_roundtrip_preserves_order() {
        let needs = Needs {
            hunger: 1.0,
            thirst: 2.0,
            energy: 3.0,
            hygiene: 4.0,
            social: 5.0,
            fun: 6.0,
            mental_health: 7.0,
        };
        assert_eq!(Needs::from_array(needs.to_array()), needs);
        for need in NeedKind::ALL {
            let idx = need.index();
            let arr = needs.to_array();
            assert!((arr.get(idx).copied().unwrap_or(-1.0) - needs.get(need)).abs() < EPS);
        }
    }

    #[test]
    fn nan_need_collapses_to_zero() {
        let mut needs = Needs::default();
        needs.energy = f32::NAN;
        needs.clamp_all();
        assert!(needs.energy.abs() < EPS);
    }

    #[test]
    fn genes_clamped_to_range() {
        let genes = Genes::from_array([0.1, 2.0, 1.0, f32::NAN, 1.2]);
        assert!((genes.color - GENE_MIN).abs() < EPS);
        assert!((genes.size - GENE_MAX).abs() < EPS);
        assert!((genes.health - 1.0).abs() < EPS);
    }

    #[test]
    fn step_toward_lands_on_close_target() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(1.0, 0.0);
        assert_eq!(a.step_toward(b, 5.0), b);
        let c = a.step_toward(Position::new(10.0, 0.0), 2.0);
        assert!((c.x - 2.0).abs() < EPS);
    }

    #[test]
    fn step_away_increases_distance() {
        let me = Position::new(5.0, 5.0);
        let threat = Position::new(4.0, 5.0);
        let moved = me.step_away(threat, 3.0);
        assert!(moved.distance(threat) > me.distance(threat));
        assert!((moved.x - 8.0).abs() < EPS);
    }

    #[test]
    fn zone_contains_uses_radius() {
        let zone = Zone {
            id: ZoneId::new(),
            kind: ZoneKind::Temple,
            center: Position::new(10.0, 10.0),
            radius: 5.0,
        };
        assert!(zone.contains(Position::new(13.0, 14.0)));
        assert!(!zone.contains(Position::new(16.0, 10.0)));
    }
}
