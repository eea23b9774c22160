//! Enumeration types for the Habitat simulation core.
//!
//! Kind tags, life stages, behavior states, and the closed sets of needs,
//! activities, zones, and resources the engines reason about.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Entity kind
// ---------------------------------------------------------------------------

/// The kind of a spatially placed record.
///
/// The spatial index stores only a position plus this tag; ownership of the
/// record stays with the registry that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum EntityKind {
    /// A populated agent (human-equivalent).
    Agent,
    /// A simulated animal.
    Animal,
    /// A placed building.
    Building,
    /// A zone marker (shelter, market, temple, ...).
    Zone,
    /// A harvestable resource node.
    Resource,
}

impl EntityKind {
    /// Every entity kind, in declaration order.
    pub const ALL: [Self; 5] = [
        Self::Agent,
        Self::Animal,
        Self::Building,
        Self::Zone,
        Self::Resource,
    ];

    /// Snake-case name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Animal => "animal",
            Self::Building => "building",
            Self::Zone => "zone",
            Self::Resource => "resource",
        }
    }
}

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

/// Biological sex of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Sex {
    /// Male.
    Male,
    /// Female.
    Female,
}

impl Sex {
    /// Return the opposite sex.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Male => Self::Female,
            Self::Female => Self::Male,
        }
    }
}

/// Life stage derived from an agent's age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum LifeStage {
    /// Below the adult age threshold.
    Child,
    /// Between the adult and elder thresholds.
    Adult,
    /// At or above the elder threshold.
    Elder,
}

impl LifeStage {
    /// Snake-case name, matching the serde representation.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Adult => "adult",
            Self::Elder => "elder",
        }
    }
}

/// What an agent is currently doing, as reported by the AI layer.
///
/// The needs engine keys energy recovery or consumption on this value
/// instead of applying a flat energy decay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ActivityKind {
    /// Standing around with no task.
    Idle,
    /// Asleep.
    Sleeping,
    /// Resting while awake.
    Resting,
    /// Eating a meal.
    Eating,
    /// Talking with other agents.
    Socializing,
    /// Walking toward a movement target.
    Moving,
    /// Performing a work task.
    Working,
}

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// A physiological need tracked per agent.
///
/// Values run from 0 (fully deprived) to 100 (fully satisfied).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NeedKind {
    /// Food satiation.
    Hunger,
    /// Hydration.
    Thirst,
    /// Rest and stamina.
    Energy,
    /// Cleanliness.
    Hygiene,
    /// Social contact.
    Social,
    /// Entertainment.
    Fun,
    /// Mental wellbeing.
    MentalHealth,
}

impl NeedKind {
    /// Number of tracked needs (and columns in a needs batch buffer).
    pub const COUNT: usize = 7;

    /// Every need, in column order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Hunger,
        Self::Thirst,
        Self::Energy,
        Self::Hygiene,
        Self::Social,
        Self::Fun,
        Self::MentalHealth,
    ];

    /// Column index of this need in a needs batch buffer.
    pub const fn index(self) -> usize {
        match self {
            Self::Hunger => 0,
            Self::Thirst => 1,
            Self::Energy => 2,
            Self::Hygiene => 3,
            Self::Social => 4,
            Self::Fun => 5,
            Self::MentalHealth => 6,
        }
    }
}

impl core::fmt::Display for NeedKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Hunger => "hunger",
            Self::Thirst => "thirst",
            Self::Energy => "energy",
            Self::Hygiene => "hygiene",
            Self::Social => "social",
            Self::Fun => "fun",
            Self::MentalHealth => "mental_health",
        };
        f.write_str(name)
    }
}

/// Cached classification of a need value, used for threshold-crossing
/// notifications only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum NeedLevel {
    /// Below the critical threshold.
    Critical,
    /// Below the consumption threshold.
    Low,
    /// Between the consumption and satisfied thresholds.
    Normal,
    /// At or above the satisfied threshold.
    Satisfied,
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The tag of a zone that grants presence bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ZoneKind {
    /// Housing and shelter.
    Shelter,
    /// Trading square.
    Market,
    /// Place of worship.
    Temple,
    /// Drinking hall.
    Tavern,
    /// Washing place.
    Bath,
    /// Water well.
    Well,
    /// Cultivated field.
    Farm,
}

/// A resource carried in inventories or held by a resource node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceKind {
    /// Edible food.
    Food,
    /// Drinkable water.
    Water,
    /// Timber.
    Wood,
    /// Stone.
    Stone,
}

/// Ground cover at a world position, as reported by the host terrain port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TerrainKind {
    /// Open grassland.
    Grass,
    /// Woodland.
    Forest,
    /// Open water (river, lake).
    Water,
    /// Sand or dry soil.
    Sand,
    /// Bare rock.
    Rock,
    /// Snow cover.
    Snow,
}

impl TerrainKind {
    /// Whether grazing animals can eat directly from this terrain.
    pub const fn yields_food(self) -> bool {
        matches!(self, Self::Grass | Self::Forest)
    }

    /// Whether animals can drink directly from this terrain.
    pub const fn yields_water(self) -> bool {
        matches!(self, Self::Water)
    }
}

/// Biome an animal belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Biome {
    /// Grassland.
    Grassland,
    /// Forest.
    Forest,
    /// Desert.
    Desert,
    /// Tundra.
    Tundra,
    /// Wetland.
    Wetland,
    /// Mountain.
    Mountain,
}

// ---------------------------------------------------------------------------
// Animals
// ---------------------------------------------------------------------------

/// Discrete behavior state of an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AnimalState {
    /// Standing still.
    Idle,
    /// Drifting toward a random nearby point.
    Wandering,
    /// Moving toward food.
    SeekingFood,
    /// Moving toward water.
    SeekingWater,
    /// Consuming food.
    Eating,
    /// Consuming water.
    Drinking,
    /// Running away from a threat.
    Fleeing,
    /// Pursuing prey.
    Hunting,
    /// Pairing with a mate.
    Mating,
    /// Dead; awaiting cleanup.
    Dead,
}

impl AnimalState {
    /// Whether an animal in this state may skip ticks under staggering.
    ///
    /// Only idle and wandering animals are staggered; fleeing, hunting and
    /// mating always update every tick.
    pub const fn is_staggerable(self) -> bool {
        matches!(self, Self::Idle | Self::Wandering)
    }
}

/// What an animal species eats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Diet {
    /// Eats vegetation (food resources or grazing terrain).
    Herbivore,
    /// Eats other animals.
    Carnivore,
    /// Hunts when prey is near, otherwise forages.
    Omnivore,
}

// ---------------------------------------------------------------------------
// Death
// ---------------------------------------------------------------------------

/// Why an agent or animal died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum DeathCause {
    /// Hunger crossed its death threshold.
    Starvation,
    /// Thirst crossed its death threshold.
    Dehydration,
    /// Energy crossed its death threshold.
    Exhaustion,
    /// Age exceeded the maximum.
    OldAge,
    /// Killed by a predator inside the simulation core.
    Predation,
    /// Hunted by an external actor (reported through an inbound command).
    Hunted,
    /// Killed by an external system (combat, scripted removal).
    Killed,
}

impl core::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Starvation => "starvation",
            Self::Dehydration => "dehydration",
            Self::Exhaustion => "exhaustion",
            Self::OldAge => "old_age",
            Self::Predation => "predation",
            Self::Hunted => "hunted",
            Self::Killed => "killed",
        };
        f.write_str(name)
    }
}
