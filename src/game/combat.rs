//! Pure combat evaluation: who may hit whom, and for how much.
//!
//! Nothing here mutates state. The rule engine asks these functions before
//! accepting an attack and then applies the resulting [`StrikePlan`].

use serde::{Deserialize, Serialize};

use super::effects::PassiveTrait;
use super::state::{CardInstance, GameState, InstanceId, Lane, Player, PlayerId, TargetRef};

/// Targets allowed by lane rules alone.
///
/// Melee attackers must go through the enemy melee lane while it holds any
/// card; ranged attackers reach everything.
pub fn reachable_targets(attacker_lane: Lane, enemy: &Player) -> Vec<TargetRef> {
    let card_ref = |card: &CardInstance| TargetRef::Card {
        player: enemy.id,
        card_id: card.id,
    };
    let hero = TargetRef::Hero { player: enemy.id };

    match attacker_lane {
        Lane::Melee if !enemy.field.melee.is_empty() => {
            enemy.field.melee.iter().map(card_ref).collect()
        }
        Lane::Melee | Lane::Ranged => {
            let mut targets: Vec<TargetRef> = enemy.field.iter().map(card_ref).collect();
            targets.push(hero);
            targets
        }
    }
}

/// Reachable targets narrowed by Taunt: when any reachable card has Taunt,
/// only Taunt cards may be attacked. Applies to melee and ranged alike.
pub fn legal_targets(attacker: &CardInstance, enemy: &Player) -> Vec<TargetRef> {
    let reachable = reachable_targets(attacker.lane(), enemy);
    let taunting: Vec<TargetRef> = reachable
        .iter()
        .copied()
        .filter(|target| match target {
            TargetRef::Card { card_id, .. } => enemy
                .field
                .find(*card_id)
                .is_some_and(|card| card.has_passive(PassiveTrait::Taunt)),
            TargetRef::Hero { .. } => false,
        })
        .collect();

    if taunting.is_empty() {
        reachable
    } else {
        taunting
    }
}

/// Whether the card `attacker_id` controlled by `attacker_owner` may strike `target`.
/// Never true for the attacker's own hero or cards.
pub fn is_valid_target(
    state: &GameState,
    attacker_owner: PlayerId,
    attacker_id: InstanceId,
    target: TargetRef,
) -> bool {
    if target.owner() == attacker_owner {
        return false;
    }
    let Some(attacker) = state.find_field_card(attacker_owner, attacker_id) else {
        return false;
    };
    let Some(enemy) = state.get_player(target.owner()) else {
        return false;
    };
    legal_targets(attacker, enemy).contains(&target)
}

/// Damage a card deals when it attacks. Zero-attack units still chip for one.
pub fn strike_damage(attacker: &CardInstance) -> i16 {
    attacker.attack().max(1)
}

/// Numeric consequences of one attack, before immunity is applied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrikePlan {
    pub damage_to_target: i16,
    /// Damage the attacker takes back; only melee hitting melee.
    pub counter_damage: i16,
    pub lifesteal: bool,
}

pub fn plan_strike(
    attacker: &CardInstance,
    defender: Option<&CardInstance>,
    damage: i16,
) -> StrikePlan {
    let counter_damage = match defender {
        Some(defender) if attacker.lane() == Lane::Melee && defender.lane() == Lane::Melee => {
            defender.attack().max(0)
        }
        _ => 0,
    };
    StrikePlan {
        damage_to_target: damage.max(0),
        counter_damage,
        lifesteal: attacker.has_passive(PassiveTrait::Lifesteal),
    }
}
