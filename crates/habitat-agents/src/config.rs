//! Tunables for the needs and lifecycle engines.
//!
//! Both structs deserialize from the `needs` and `lifecycle` sections of
//! `habitat-config.yaml`. Every field falls back to its default when the
//! section omits it, so an empty section yields [`NeedsConfig::default`].
//! Values are not range-checked.

use habitat_compute::CrossEffectRule;
use habitat_types::{ActivityKind, LifeStage, NeedKind, ZoneKind};
use serde::Deserialize;

/// Per-second decay rate for each need.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DecayRates {
    /// Hunger lost per second.
    pub hunger: f32,
    /// Thirst lost per second.
    pub thirst: f32,
    /// Hygiene lost per second.
    pub hygiene: f32,
    /// Social lost per second.
    pub social: f32,
    /// Fun lost per second.
    pub fun: f32,
    /// Mental health lost per second.
    pub mental_health: f32,
}

impl Default for DecayRates {
    fn default() -> Self {
        Self {
            hunger: 0.05,
            thirst: 0.08,
            hygiene: 0.03,
            social: 0.03,
            fun: 0.04,
            mental_health: 0.01,
        }
    }
}

impl DecayRates {
    /// Rates in [`NeedKind::index`] order. Energy is zero because its
    /// decay is replaced by the activity rate.
    pub const fn to_array(&self) -> [f32; NeedKind::COUNT] {
        [
            self.hunger,
            self.thirst,
            0.0,
            self.hygiene,
            self.social,
            self.fun,
            self.mental_health,
        ]
    }
}

/// Decay multipliers per life stage.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct StageMultipliers {
    /// Children decay slower.
    pub child: f32,
    /// Baseline.
    pub adult: f32,
    /// Elders decay faster.
    pub elder: f32,
}

impl Default for StageMultipliers {
    fn default() -> Self {
        Self {
            child: 0.7,
            adult: 1.0,
            elder: 1.3,
        }
    }
}

impl StageMultipliers {
    /// Multiplier for one stage.
    pub const fn for_stage(&self, stage: LifeStage) -> f32 {
        match stage {
            LifeStage::Child => self.child,
            LifeStage::Adult => self.adult,
            LifeStage::Elder => self.elder,
        }
    }
}

/// Per-second energy change for each activity. Positive values recover.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ActivityEnergy {
    /// Sleeping.
    pub sleeping: f32,
    /// Resting.
    pub resting: f32,
    /// Idle.
    pub idle: f32,
    /// Eating.
    pub eating: f32,
    /// Socializing.
    pub socializing: f32,
    /// Moving.
    pub moving: f32,
    /// Working.
    pub working: f32,
}

impl Default for ActivityEnergy {
    fn default() -> Self {
        Self {
            sleeping: 0.5,
            resting: 0.25,
            idle: 0.1,
            eating: 0.05,
            socializing: -0.05,
            moving: -0.15,
            working: -0.25,
        }
    }
}

impl ActivityEnergy {
    /// Energy change per second for `activity`.
    pub const fn rate(&self, activity: ActivityKind) -> f32 {
        match activity {
            ActivityKind::Sleeping => self.sleeping,
            ActivityKind::Resting => self.resting,
            ActivityKind::Idle => self.idle,
            ActivityKind::Eating => self.eating,
            ActivityKind::Socializing => self.socializing,
            ActivityKind::Moving => self.moving,
            ActivityKind::Working => self.working,
        }
    }
}

/// A per-second bonus to one need while inside or near a zone.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ZoneBonus {
    /// Zone kind granting the bonus.
    pub zone: ZoneKind,
    /// Need receiving it.
    pub need: NeedKind,
    /// Amount per second.
    pub per_second: f32,
}

/// A penalty on `target` while `source` sits below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CrossEffect {
    /// Need whose low value triggers the penalty.
    pub source: NeedKind,
    /// Trigger threshold (strictly below).
    pub below: f32,
    /// Need that takes the penalty.
    pub target: NeedKind,
    /// Penalty per second.
    pub per_second: f32,
}

impl CrossEffect {
    /// The column-indexed form the batch kernels use.
    pub const fn to_rule(self) -> CrossEffectRule {
        CrossEffectRule {
            source: self.source.index(),
            below: self.below,
            target: self.target.index(),
            penalty_per_unit: self.per_second,
        }
    }
}

/// Death thresholds, checked in the order hunger, thirst, energy.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeathThresholds {
    /// At or below this hunger, the agent starves.
    pub hunger: f32,
    /// At or below this thirst, the agent dies of dehydration.
    pub thirst: f32,
    /// At or below this energy, the agent dies of exhaustion.
    pub energy: f32,
}

impl Default for DeathThresholds {
    fn default() -> Self {
        Self {
            hunger: 0.0,
            thirst: 0.0,
            energy: 0.0,
        }
    }
}

/// Configuration for the needs engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct NeedsConfig {
    /// At or above this many records, the batch path runs.
    pub batch_threshold: usize,
    /// Rows at which the batch processor hands work to the backend.
    pub backend_threshold: usize,
    /// Longest tick honoured; longer deltas are clamped.
    pub max_delta_ms: u64,
    /// Per-second decay rates.
    pub decay: DecayRates,
    /// Life-stage decay multipliers.
    pub stage_multipliers: StageMultipliers,
    /// Activity energy rates.
    pub activity_energy: ActivityEnergy,
    /// Hunger or thirst below this consume from inventory.
    pub consume_threshold: f32,
    /// Below this a need is critical.
    pub critical_threshold: f32,
    /// At or above this a need is satisfied.
    pub satisfied_threshold: f32,
    /// Need restored per consumed unit.
    pub restore_per_unit: f32,
    /// Units consumed per need per tick.
    pub consume_cap: u32,
    /// Units consumed per need per tick while critical.
    pub critical_consume_cap: u32,
    /// Zone presence bonuses.
    pub zone_bonuses: Vec<ZoneBonus>,
    /// Distance outside a zone's radius that still counts as present.
    pub zone_margin: f32,
    /// Side of a zone lookup cache bucket.
    pub zone_cache_bucket: f32,
    /// Lifetime of a zone lookup cache entry.
    pub zone_cache_ttl_ms: u64,
    /// Cross-effect penalties, applied in order.
    pub cross_effects: Vec<CrossEffect>,
    /// Death thresholds.
    pub death: DeathThresholds,
    /// Needs of an immortal agent never drop below this.
    pub immortal_floor: f32,
    /// Whether dead agents come back after `respawn_delay_ms`.
    pub respawn_enabled: bool,
    /// Wait between death and respawn.
    pub respawn_delay_ms: u64,
    /// A record with at least this many pinned needs is corrupted.
    pub corruption_min_pinned: usize,
    /// A need at or below this value counts as pinned.
    pub corruption_epsilon: f32,
}

impl Default for NeedsConfig {
    fn default() -> Self {
        Self {
            batch_threshold: 100,
            backend_threshold: 1_000,
            max_delta_ms: 5_000,
            decay: DecayRates::default(),
            stage_multipliers: StageMultipliers::default(),
            activity_energy: ActivityEnergy::default(),
            consume_threshold: 40.0,
            critical_threshold: 15.0,
            satisfied_threshold: 80.0,
            restore_per_unit: 20.0,
            consume_cap: 1,
            critical_consume_cap: 3,
            zone_bonuses: default_zone_bonuses(),
            zone_margin: 4.0,
            zone_cache_bucket: 16.0,
            zone_cache_ttl_ms: 5_000,
            cross_effects: default_cross_effects(),
            death: DeathThresholds::default(),
            immortal_floor: 10.0,
            respawn_enabled: false,
            respawn_delay_ms: 30_000,
            corruption_min_pinned: 4,
            corruption_epsilon: 0.01,
        }
    }
}

impl NeedsConfig {
    /// Cross-effects in the batch kernels' column form.
    pub fn cross_effect_rules(&self) -> Vec<CrossEffectRule> {
        self.cross_effects.iter().map(|c| c.to_rule()).collect()
    }
}

fn default_zone_bonuses() -> Vec<ZoneBonus> {
    let bonus = |zone, need, per_second| ZoneBonus {
        zone,
        need,
        per_second,
    };
    vec![
        bonus(ZoneKind::Shelter, NeedKind::Energy, 0.2),
        bonus(ZoneKind::Market, NeedKind::Social, 0.1),
        bonus(ZoneKind::Temple, NeedKind::MentalHealth, 0.15),
        bonus(ZoneKind::Tavern, NeedKind::Fun, 0.15),
        bonus(ZoneKind::Tavern, NeedKind::Social, 0.1),
        bonus(ZoneKind::Bath, NeedKind::Hygiene, 0.3),
        bonus(ZoneKind::Well, NeedKind::Thirst, 0.2),
    ]
}

fn default_cross_effects() -> Vec<CrossEffect> {
    let effect = |source, target, per_second| CrossEffect {
        source,
        below: 20.0,
        target,
        per_second,
    };
    vec![
        effect(NeedKind::Energy, NeedKind::Social, 0.05),
        effect(NeedKind::Energy, NeedKind::Fun, 0.05),
        effect(NeedKind::Hunger, NeedKind::Energy, 0.05),
        effect(NeedKind::Hunger, NeedKind::MentalHealth, 0.03),
        effect(NeedKind::Thirst, NeedKind::Energy, 0.05),
        effect(NeedKind::Thirst, NeedKind::MentalHealth, 0.03),
        effect(NeedKind::Social, NeedKind::MentalHealth, 0.02),
    ]
}

/// Configuration for the lifecycle engine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Simulated seconds per year of age.
    pub seconds_per_year: f32,
    /// Age at which a child becomes an adult.
    pub adult_age: f32,
    /// Age at which an adult becomes an elder.
    pub elder_age: f32,
    /// Older than this, a mortal agent dies.
    pub max_age: f32,
    /// Newly adult agents housed per tick.
    pub housing_per_tick: usize,
    /// Gap between breeding checks.
    pub breeding_interval_ms: u64,
    /// Gap before the same pair may breed again.
    pub pair_cooldown_ms: u64,
    /// Both parents need at least this hunger.
    pub min_hunger: f32,
    /// Both parents need at least this energy.
    pub min_energy: f32,
    /// No births once this many agents are alive.
    pub population_cap: usize,
    /// Chance an attempt produces a child.
    pub success_chance: f64,
    /// Largest trait deviation from the parent average.
    pub trait_mutation: f32,
    /// Largest appearance deviation from the parent average.
    pub appearance_mutation: f32,
    /// Largest distance between mother and newborn.
    pub spawn_offset: f32,
    /// Seed for pairing and inheritance rolls.
    pub seed: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            seconds_per_year: 120.0,
            adult_age: 18.0,
            elder_age: 60.0,
            max_age: 90.0,
            housing_per_tick: 2,
            breeding_interval_ms: 10_000,
            pair_cooldown_ms: 60_000,
            min_hunger: 50.0,
            min_energy: 50.0,
            population_cap: 200,
            success_chance: 0.5,
            trait_mutation: 0.1,
            appearance_mutation: 0.05,
            spawn_offset: 3.0,
            seed: 42,
        }
    }
}

impl LifecycleConfig {
    /// Stage for an age, from the fixed thresholds.
    pub fn stage_for_age(&self, age_years: f32) -> LifeStage {
        if age_years >= self.elder_age {
            LifeStage::Elder
        } else if age_years >= self.adult_age {
            LifeStage::Adult
        } else {
            LifeStage::Child
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn energy_slot_has_no_decay() {
        let rates = DecayRates::default().to_array();
        assert!(rates.get(NeedKind::Energy.index()).is_some_and(|r| r.abs() < f32::EPSILON));
        assert!(rates.get(NeedKind::Hunger.index()).is_some_and(|r| *r > 0.0));
    }

    #[test]
    fn activity_rates_order() {
        let energy = ActivityEnergy::default();
        assert!(energy.rate(ActivityKind::Sleeping) > energy.rate(ActivityKind::Idle));
        assert!(energy.rate(ActivityKind::Working) < energy.rate(ActivityKind::Moving));
    }

    #[test]
    fn stage_thresholds() {
        let cfg = LifecycleConfig::default();
        assert_eq!(cfg.stage_for_age(5.0), LifeStage::Child);
        assert_eq!(cfg.stage_for_age(18.0), LifeStage::Adult);
        assert_eq!(cfg.stage_for_age(75.0), LifeStage::Elder);
    }

    #[test]
    fn cross_effect_rules_use_need_columns() {
        let rules = NeedsConfig::default().cross_effect_rules();
        let first = rules.first().copied();
        assert_eq!(first.map(|r| r.source), Some(NeedKind::Energy.index()));
        assert_eq!(first.map(|r| r.target), Some(NeedKind::Social.index()));
    }
}
