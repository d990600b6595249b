//! Two-phase attack presentation.
//!
//! An attack is first *staged*: the choreographer asks the presentation layer
//! where the two endpoints are and wraps the real commit action in an
//! `InitiateAnimation` envelope. The reducer parks that commit in the single
//! [`AnimationSlot`] and applies it only when `EndAnimation` arrives with the
//! matching ticket.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::combat::{is_valid_target, strike_damage};
use super::rules::{Action, RuleError};
use super::state::{GameState, HeroPowerEffect, InstanceId, PlayerId, TargetRef, UnitType};

/// Screen-space box of a card or hero portrait, in CSS pixels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Projectile {
    Stone,
    Arrow,
    Spark,
}

impl From<UnitType> for Projectile {
    fn from(unit: UnitType) -> Self {
        match unit {
            UnitType::Warrior => Projectile::Stone,
            UnitType::Archer => Projectile::Arrow,
            UnitType::Cleric => Projectile::Spark,
        }
    }
}

/// Opaque parameters for the presentation layer. The engine stores them but
/// never reads them back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VisualHint {
    pub from: Rect,
    pub to: Rect,
    pub projectile: Projectile,
    pub duration_ms: u32,
    pub amount: i16,
}

/// Payload of `InitiateAnimation`: what to show, and what to apply afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnimationRequest {
    pub visual: VisualHint,
    pub commit: Box<Action>,
}

/// The one pending-animation slot of a match.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state")]
pub enum AnimationSlot {
    #[default]
    Idle,
    Pending {
        ticket: u64,
        visual: VisualHint,
        commit: Box<Action>,
    },
}

impl AnimationSlot {
    pub fn is_pending(&self) -> bool {
        matches!(self, AnimationSlot::Pending { .. })
    }

    pub fn ticket(&self) -> Option<u64> {
        match self {
            AnimationSlot::Pending { ticket, .. } => Some(*ticket),
            AnimationSlot::Idle => None,
        }
    }

    /// Parks `request` under `ticket`. Overlapping animations are refused.
    pub fn begin(&mut self, ticket: u64, request: AnimationRequest) -> Result<(), RuleError> {
        if let AnimationSlot::Pending { ticket: pending, .. } = self {
            return Err(RuleError::AnimationInProgress { ticket: *pending });
        }
        *self = AnimationSlot::Pending {
            ticket,
            visual: request.visual,
            commit: request.commit,
        };
        Ok(())
    }

    /// Empties the slot and hands back the parked commit, provided `ticket`
    /// is the one that is pending.
    pub fn complete(&mut self, ticket: u64) -> Result<Action, RuleError> {
        let pending = self.ticket().ok_or(RuleError::NoPendingAnimation)?;
        if pending != ticket {
            return Err(RuleError::StaleAnimation {
                expected: pending,
                actual: ticket,
            });
        }
        match std::mem::take(self) {
            AnimationSlot::Pending { commit, .. } => Ok(*commit),
            AnimationSlot::Idle => Err(RuleError::NoPendingAnimation),
        }
    }
}

/// Where things are on screen. Supplied by the presentation layer.
pub trait GeometryProvider {
    fn card_rect(&self, card_id: InstanceId) -> Option<Rect>;
    fn hero_rect(&self, player: PlayerId) -> Option<Rect>;

    fn target_rect(&self, target: TargetRef) -> Option<Rect> {
        match target {
            TargetRef::Hero { player } => self.hero_rect(player),
            TargetRef::Card { card_id, .. } => self.card_rect(card_id),
        }
    }
}

impl<G: GeometryProvider + ?Sized> GeometryProvider for &G {
    fn card_rect(&self, card_id: InstanceId) -> Option<Rect> {
        (**self).card_rect(card_id)
    }

    fn hero_rect(&self, player: PlayerId) -> Option<Rect> {
        (**self).hero_rect(player)
    }
}

/// A measured frame of the board, e.g. sent over from the DOM as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeometrySnapshot {
    #[serde(default)]
    pub cards: HashMap<InstanceId, Rect>,
    #[serde(default)]
    pub heroes: HashMap<PlayerId, Rect>,
}

impl GeometryProvider for GeometrySnapshot {
    fn card_rect(&self, card_id: InstanceId) -> Option<Rect> {
        self.cards.get(&card_id).copied()
    }

    fn hero_rect(&self, player: PlayerId) -> Option<Rect> {
        self.heroes.get(&player).copied()
    }
}

pub struct Choreographer<G> {
    geometry: G,
}

impl<G: GeometryProvider> Choreographer<G> {
    pub fn new(geometry: G) -> Self {
        Self { geometry }
    }

    /// Builds the action that carries out an attack.
    ///
    /// Returns `InitiateAnimation` wrapping the commit when both endpoints are
    /// on screen, otherwise the bare `ApplyAttackDamage` so the attack still
    /// happens, just without a visual.
    pub fn stage_attack(
        &self,
        state: &GameState,
        player: PlayerId,
        attacker_id: InstanceId,
        target: TargetRef,
    ) -> Result<Action, RuleError> {
        let attacker = state
            .find_field_card(player, attacker_id)
            .ok_or(RuleError::AttackerNotFound {
                card_id: attacker_id,
            })?;
        if !is_valid_target(state, player, attacker_id, target) {
            return Err(RuleError::InvalidAttackTarget);
        }

        let damage = strike_damage(attacker);
        let commit = Action::attack(player, attacker_id, target, damage);

        let endpoints = self
            .geometry
            .card_rect(attacker_id)
            .zip(self.geometry.target_rect(target));
        let Some((from, to)) = endpoints else {
            tracing::debug!(attacker_id, ?target, "no geometry for attack, committing immediately");
            return Ok(commit);
        };

        Ok(Action::InitiateAnimation {
            request: AnimationRequest {
                visual: VisualHint {
                    from,
                    to,
                    projectile: attacker.card.unit.into(),
                    duration_ms: state.rules.attack_animation_ms,
                    amount: damage,
                },
                commit: Box::new(commit),
            },
        })
    }

    /// Same envelope for the second half of a targeted hero power: the bolt
    /// travels from the caster's portrait to `target`.
    pub fn stage_power_target(
        &self,
        state: &GameState,
        target: TargetRef,
    ) -> Result<Action, RuleError> {
        let targeting = state.targeting.as_ref().ok_or(RuleError::NoTargetingActive)?;
        let power = state
            .get_player(targeting.player)
            .and_then(|player| player.find_hero_power(&targeting.power_id))
            .ok_or_else(|| RuleError::HeroPowerNotFound {
                power_id: targeting.power_id.clone(),
            })?;

        let commit = Action::ApplyHeroPowerWithTarget { target };
        let endpoints = self
            .geometry
            .hero_rect(targeting.player)
            .zip(self.geometry.target_rect(target));
        let Some((from, to)) = endpoints else {
            return Ok(commit);
        };

        let projectile = match power.effect {
            HeroPowerEffect::Damage => Projectile::Stone,
            _ => Projectile::Spark,
        };
        Ok(Action::InitiateAnimation {
            request: AnimationRequest {
                visual: VisualHint {
                    from,
                    to,
                    projectile,
                    duration_ms: state.rules.attack_animation_ms,
                    amount: power.amount,
                },
                commit: Box::new(commit),
            },
        })
    }
}
