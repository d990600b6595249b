use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::state::{opponent, GameEvent, GameState, InstanceId, PlayerId, TargetRef};
use crate::utils::pick_index;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum BattlecryEffect {
    DamageAllEnemies { amount: i16 },
    HealTarget { amount: i16 },
    DrawCard { count: u8 },
    BuffAllAllies { amount: i16 },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PassiveTrait {
    Taunt,
    Charge,
    ImmuneFirstTurn,
    Lifesteal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum DeathrattleEffect {
    DamageRandomEnemy { amount: i16 },
}

/// Effect printed on a card.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum CardEffect {
    Battlecry { effect: BattlecryEffect },
    Passive { passive: PassiveTrait },
    Deathrattle { effect: DeathrattleEffect },
}

impl CardEffect {
    pub const fn battlecry(effect: BattlecryEffect) -> Self {
        CardEffect::Battlecry { effect }
    }

    pub const fn passive(passive: PassiveTrait) -> Self {
        CardEffect::Passive { passive }
    }

    pub const fn deathrattle(effect: DeathrattleEffect) -> Self {
        CardEffect::Deathrattle { effect }
    }

    /// Passives are static and never trigger.
    pub fn trigger(&self) -> Option<EffectTrigger> {
        match self {
            CardEffect::Battlecry { .. } => Some(EffectTrigger::OnPlay),
            CardEffect::Deathrattle { .. } => Some(EffectTrigger::OnDeath),
            CardEffect::Passive { .. } => None,
        }
    }

    fn priority(&self) -> i8 {
        match self {
            CardEffect::Battlecry { .. } => 1,
            _ => 0,
        }
    }

    fn apply(&self, ctx: &EffectContext, state: &mut GameState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        match self {
            CardEffect::Battlecry { effect } => match *effect {
                BattlecryEffect::DamageAllEnemies { amount } => {
                    let enemy = opponent(ctx.source_player);
                    let targets: Vec<InstanceId> = state
                        .get_player(enemy)
                        .map(|player| player.field.iter().map(|card| card.id).collect())
                        .unwrap_or_default();
                    for card_id in targets {
                        state.damage_card(ctx.source_card, enemy, card_id, amount, &mut events);
                    }
                    events.extend(state.damage_hero(ctx.source_card, enemy, amount));
                }
                BattlecryEffect::HealTarget { amount } => {
                    events.extend(state.heal_hero(ctx.source_player, amount));
                }
                BattlecryEffect::DrawCard { count } => {
                    events.extend(state.draw_cards(ctx.source_player, count));
                }
                BattlecryEffect::BuffAllAllies { amount } => {
                    let source_player = ctx.source_player;
                    if let Some(player) = state.get_player_mut(source_player) {
                        for card in player.field.iter_mut() {
                            if Some(card.id) == ctx.source_card {
                                continue;
                            }
                            card.card.attack += amount;
                            card.card.defense += amount;
                            events.push(GameEvent::CardBuffed {
                                player_id: source_player,
                                card_id: card.id,
                                attack: amount,
                                defense: amount,
                            });
                        }
                    }
                }
            },
            CardEffect::Deathrattle { effect } => match *effect {
                DeathrattleEffect::DamageRandomEnemy { amount } => {
                    let enemy = opponent(ctx.source_player);
                    let mut targets: Vec<TargetRef> = state
                        .get_player(enemy)
                        .map(|player| {
                            player
                                .field
                                .iter()
                                .map(|card| TargetRef::Card {
                                    player: enemy,
                                    card_id: card.id,
                                })
                                .collect()
                        })
                        .unwrap_or_default();
                    targets.push(TargetRef::Hero { player: enemy });

                    if let Some(index) = pick_index(targets.len(), &mut state.rng_state) {
                        match targets[index] {
                            TargetRef::Card { player, card_id } => {
                                let source = ctx.source_card;
                                state.damage_card(source, player, card_id, amount, &mut events);
                            }
                            TargetRef::Hero { player } => {
                                events.extend(state.damage_hero(ctx.source_card, player, amount));
                            }
                        }
                    }
                }
            },
            CardEffect::Passive { .. } => {}
        }
        events
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum EffectTrigger {
    OnPlay,
    OnDeath,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectContext {
    pub trigger: EffectTrigger,
    pub source_player: PlayerId,
    pub source_card: Option<InstanceId>,
}

impl EffectContext {
    pub fn new(trigger: EffectTrigger, source_player: PlayerId) -> Self {
        Self {
            trigger,
            source_player,
            source_card: None,
        }
    }

    pub fn with_source_card(mut self, card_id: InstanceId) -> Self {
        self.source_card = Some(card_id);
        self
    }
}

#[derive(Debug, Clone)]
struct StackItem {
    priority: i8,
    order: u64,
    effect: CardEffect,
    context: EffectContext,
}

impl PartialEq for StackItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.order == other.order
    }
}

impl Eq for StackItem {}

impl PartialOrd for StackItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StackItem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// Pending triggered effects. Higher priority first, then FIFO.
#[derive(Default)]
pub struct EffectStack {
    heap: BinaryHeap<StackItem>,
    order: u64,
}

impl EffectStack {
    pub fn push(&mut self, effect: CardEffect, context: EffectContext) {
        self.order += 1;
        self.heap.push(StackItem {
            priority: effect.priority(),
            order: self.order,
            effect,
            context,
        });
    }

    fn pop(&mut self) -> Option<StackItem> {
        self.heap.pop()
    }

    fn clear(&mut self) {
        self.heap.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Resolves battlecries and deathrattles until nothing is left to trigger.
///
/// Battlecries of one play resolve in printed order before any deathrattle
/// they cause; deathrattles may kill further cards and chain.
#[derive(Default)]
pub struct EffectEngine {
    stack: EffectStack,
}

impl EffectEngine {
    pub fn queue_card_effects(&mut self, effects: &[CardEffect], context: EffectContext) {
        for effect in effects {
            if effect.trigger() == Some(context.trigger) {
                self.stack.push(*effect, context.clone());
            }
        }
    }

    /// Clears dead cards off both fields and queues their deathrattles.
    pub fn reap(&mut self, state: &mut GameState, events: &mut Vec<GameEvent>) {
        for (owner, card) in state.remove_dead_cards() {
            tracing::debug!(owner, card_id = card.id, name = %card.card.name, "card destroyed");
            let ctx = EffectContext::new(EffectTrigger::OnDeath, owner).with_source_card(card.id);
            self.queue_card_effects(&card.card.effects, ctx);
            events.push(GameEvent::CardDestroyed {
                player_id: owner,
                card,
            });
        }
    }

    pub fn resolve_all(&mut self, state: &mut GameState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        while let Some(item) = self.stack.pop() {
            if state.is_finished() {
                self.stack.clear();
                break;
            }
            tracing::trace!(
                effect = ?item.effect,
                source = ?item.context.source_card,
                "resolving effect"
            );
            events.extend(item.effect.apply(&item.context, state));
            self.reap(state, &mut events);
        }
        events
    }

    pub fn stack(&self) -> &EffectStack {
        &self.stack
    }

    /// Drops anything queued by an action that was then rejected.
    pub fn reset(&mut self) {
        self.stack.clear();
    }
}
