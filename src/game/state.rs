use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::choreography::AnimationSlot;
use super::config::MatchRules;
use super::effects::{CardEffect, PassiveTrait};

/// Runtime identity of a card instance. Never reused within a match.
pub type InstanceId = u32;
/// Player identifier, `1` or `2`.
pub type PlayerId = u8;

pub const PLAYER_ONE: PlayerId = 1;
pub const PLAYER_TWO: PlayerId = 2;

/// Returns the other seat. Callers validate `player` first.
pub fn opponent(player: PlayerId) -> PlayerId {
    if player == PLAYER_ONE {
        PLAYER_TWO
    } else {
        PLAYER_ONE
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    Melee,
    Ranged,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UnitType {
    Warrior,
    Archer,
    Cleric,
}

impl UnitType {
    pub fn lane(self) -> Lane {
        match self {
            UnitType::Warrior => Lane::Melee,
            UnitType::Archer | UnitType::Cleric => Lane::Ranged,
        }
    }
}

/// Immutable catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardDefinition {
    pub card_id: String,
    pub name: String,
    pub unit: UnitType,
    pub cost: u8,
    pub attack: i16,
    pub defense: i16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heal_value: Option<i16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub effects: Vec<CardEffect>,
}

impl CardDefinition {
    pub fn new(
        card_id: impl Into<String>,
        name: impl Into<String>,
        unit: UnitType,
        cost: u8,
        attack: i16,
        defense: i16,
    ) -> Self {
        Self {
            card_id: card_id.into(),
            name: name.into(),
            unit,
            cost,
            attack,
            defense,
            heal_value: None,
            effects: Vec::new(),
        }
    }

    pub fn with_heal(mut self, heal_value: i16) -> Self {
        self.heal_value = Some(heal_value);
        self
    }

    pub fn with_effects(mut self, effects: Vec<CardEffect>) -> Self {
        self.effects = effects;
        self
    }

    pub fn lane(&self) -> Lane {
        self.unit.lane()
    }

    pub fn has_passive(&self, passive: PassiveTrait) -> bool {
        self.effects
            .iter()
            .any(|effect| matches!(effect, CardEffect::Passive { passive: p } if *p == passive))
    }
}

/// A drawn or played card. `card.attack` / `card.defense` hold current values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CardInstance {
    pub id: InstanceId,
    pub card: CardDefinition,
    #[serde(default)]
    pub can_attack: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_played: Option<u32>,
    #[serde(default)]
    pub immune_first_turn: bool,
}

impl CardInstance {
    pub fn new(id: InstanceId, card: CardDefinition) -> Self {
        Self {
            id,
            card,
            can_attack: false,
            turn_played: None,
            immune_first_turn: false,
        }
    }

    pub fn attack(&self) -> i16 {
        self.card.attack
    }

    pub fn defense(&self) -> i16 {
        self.card.defense
    }

    pub fn lane(&self) -> Lane {
        self.card.lane()
    }

    pub fn has_passive(&self, passive: PassiveTrait) -> bool {
        self.card.has_passive(passive)
    }

    pub fn is_dead(&self) -> bool {
        self.card.defense <= 0
    }

    /// Immune while the match is still on the turn this card was played.
    pub fn is_immune(&self, turn_count: u32) -> bool {
        self.immune_first_turn && self.turn_played == Some(turn_count)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HeroPowerEffect {
    Damage,
    Heal,
    Armor,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HeroPower {
    pub id: String,
    pub name: String,
    pub cost: u8,
    pub effect: HeroPowerEffect,
    pub amount: i16,
    pub requires_target: bool,
}

/// Stat change granted by a passive skill for the whole match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "stat", content = "value")]
pub enum StatModifier {
    Defense(i16),
    Attack(i16),
    MaxMana(u8),
    StartingHand(u8),
    StartingArmor(u8),
    StartingHp(i16),
    MinionCost(u8),
    MeleeCharge,
    RangedAttack(i16),
    HeroPowerCost(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PassiveSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    pub modifier: StatModifier,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    #[serde(default)]
    pub melee: Vec<CardInstance>,
    #[serde(default)]
    pub ranged: Vec<CardInstance>,
}

impl Field {
    pub fn lane(&self, lane: Lane) -> &[CardInstance] {
        match lane {
            Lane::Melee => &self.melee,
            Lane::Ranged => &self.ranged,
        }
    }

    fn lane_mut(&mut self, lane: Lane) -> &mut Vec<CardInstance> {
        match lane {
            Lane::Melee => &mut self.melee,
            Lane::Ranged => &mut self.ranged,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardInstance> {
        self.melee.iter().chain(self.ranged.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut CardInstance> {
        self.melee.iter_mut().chain(self.ranged.iter_mut())
    }

    pub fn is_empty(&self) -> bool {
        self.melee.is_empty() && self.ranged.is_empty()
    }

    pub fn len(&self) -> usize {
        self.melee.len() + self.ranged.len()
    }

    pub fn find(&self, id: InstanceId) -> Option<&CardInstance> {
        self.iter().find(|card| card.id == id)
    }

    pub fn find_mut(&mut self, id: InstanceId) -> Option<&mut CardInstance> {
        self.iter_mut().find(|card| card.id == id)
    }

    pub fn insert(&mut self, card: CardInstance) {
        let lane = card.lane();
        self.lane_mut(lane).push(card);
    }

    /// Takes every card at or below zero defense out of both lanes, in lane order.
    pub fn remove_dead(&mut self) -> Vec<CardInstance> {
        let mut dead = Vec::new();
        for lane in [Lane::Melee, Lane::Ranged] {
            let cards = self.lane_mut(lane);
            let (gone, alive): (Vec<_>, Vec<_>) = cards.drain(..).partition(CardInstance::is_dead);
            *cards = alive;
            dead.extend(gone);
        }
        dead
    }
}

/// Per-player state. `hand` and `deck` are both in draw order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub hp: i16,
    #[serde(default)]
    pub armor: u8,
    pub mana: u8,
    pub max_mana: u8,
    #[serde(default)]
    pub hand: Vec<CardInstance>,
    #[serde(default)]
    pub deck: Vec<CardDefinition>,
    #[serde(default)]
    pub field: Field,
    #[serde(default)]
    pub hero_powers: Vec<HeroPower>,
    #[serde(default)]
    pub has_used_hero_power: bool,
    #[serde(default)]
    pub passive_skills: Vec<PassiveSkill>,
}

impl Player {
    pub fn new(id: PlayerId, rules: &MatchRules) -> Self {
        Self {
            id,
            hp: rules.starting_hp,
            armor: 0,
            mana: rules.starting_mana,
            max_mana: rules.starting_mana,
            hand: Vec::new(),
            deck: Vec::new(),
            field: Field::default(),
            hero_powers: Vec::new(),
            has_used_hero_power: false,
            passive_skills: Vec::new(),
        }
    }

    pub fn find_card_in_hand_index(&self, id: InstanceId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == id)
    }

    pub fn find_hero_power(&self, power_id: &str) -> Option<&HeroPower> {
        self.hero_powers.iter().find(|power| power.id == power_id)
    }

    pub fn modifiers(&self) -> impl Iterator<Item = StatModifier> + '_ {
        self.passive_skills.iter().map(|skill| skill.modifier)
    }

    pub fn minion_cost(&self, card: &CardDefinition, rules: &MatchRules) -> u8 {
        let discount: u8 = self
            .modifiers()
            .filter_map(|m| match m {
                StatModifier::MinionCost(value) => Some(value),
                _ => None,
            })
            .sum();
        card.cost
            .saturating_sub(discount)
            .max(rules.min_minion_cost.min(card.cost))
    }

    pub fn hero_power_cost(&self, power: &HeroPower, rules: &MatchRules) -> u8 {
        let discount: u8 = self
            .modifiers()
            .filter_map(|m| match m {
                StatModifier::HeroPowerCost(value) => Some(value),
                _ => None,
            })
            .sum();
        power.cost.saturating_sub(discount).max(rules.min_hero_power_cost)
    }

    pub fn grants_melee_charge(&self) -> bool {
        self.modifiers().any(|m| matches!(m, StatModifier::MeleeCharge))
    }

    pub fn ready_field(&mut self) {
        for card in self.field.iter_mut() {
            card.can_attack = true;
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    StartMenu,
    PassiveSkills,
    Setup,
    HeroPowerOptions,
    Playing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum VictoryReason {
    HealthDepleted { loser: PlayerId },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VictoryState {
    pub winner: PlayerId,
    pub reason: VictoryReason,
}

/// Something an attack, power or effect can be aimed at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type")]
pub enum TargetRef {
    Hero { player: PlayerId },
    Card { player: PlayerId, card_id: InstanceId },
}

impl TargetRef {
    pub fn owner(&self) -> PlayerId {
        match self {
            TargetRef::Hero { player } | TargetRef::Card { player, .. } => *player,
        }
    }
}

/// A hero power waiting for its target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetingState {
    pub player: PlayerId,
    pub power_id: String,
}

/// Selections made on the setup screens, by catalog id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerSelection {
    #[serde(default)]
    pub deck: Vec<String>,
    #[serde(default)]
    pub hero_powers: Vec<String>,
    #[serde(default)]
    pub passive_skills: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SetupSelections {
    #[serde(default)]
    pub player_one: PlayerSelection,
    #[serde(default)]
    pub player_two: PlayerSelection,
}

impl SetupSelections {
    pub fn for_player(&self, player: PlayerId) -> &PlayerSelection {
        if player == PLAYER_ONE {
            &self.player_one
        } else {
            &self.player_two
        }
    }

    pub fn for_player_mut(&mut self, player: PlayerId) -> &mut PlayerSelection {
        if player == PLAYER_ONE {
            &mut self.player_one
        } else {
            &mut self.player_two
        }
    }
}

/// Everything observable that happened while applying an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    PhaseChanged {
        phase: GamePhase,
    },
    GameStarted {
        first_player: PlayerId,
    },
    CardDrawn {
        player_id: PlayerId,
        card_id: InstanceId,
    },
    CardPlayed {
        player_id: PlayerId,
        card_id: InstanceId,
        lane: Lane,
        cost: u8,
    },
    AttackerSelected {
        #[serde(skip_serializing_if = "Option::is_none")]
        card_id: Option<InstanceId>,
    },
    AttackResolved {
        player_id: PlayerId,
        attacker_id: InstanceId,
        target: TargetRef,
    },
    DamageDealt {
        #[serde(skip_serializing_if = "Option::is_none")]
        source_card: Option<InstanceId>,
        target: TargetRef,
        amount: i16,
    },
    DamagePrevented {
        card_id: InstanceId,
    },
    Healed {
        target: TargetRef,
        amount: i16,
    },
    ArmorGained {
        player_id: PlayerId,
        amount: u8,
    },
    CardBuffed {
        player_id: PlayerId,
        card_id: InstanceId,
        attack: i16,
        defense: i16,
    },
    CardDestroyed {
        player_id: PlayerId,
        card: CardInstance,
    },
    HeroPowerUsed {
        player_id: PlayerId,
        power_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        target: Option<TargetRef>,
    },
    TargetingStarted {
        player_id: PlayerId,
        power_id: String,
    },
    TargetingCancelled {
        player_id: PlayerId,
    },
    AnimationStarted {
        ticket: u64,
    },
    AnimationCommitted {
        ticket: u64,
    },
    CommitRejected {
        ticket: u64,
        reason: String,
    },
    TurnEnded {
        player_id: PlayerId,
        next_player: PlayerId,
        turn_count: u32,
    },
    GameWon {
        winner: PlayerId,
        reason: VictoryReason,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    InvalidPlayerIndex { player_id: PlayerId },
    DuplicateInstanceId { card_id: InstanceId },
    DeadCardOnField { card_id: InstanceId },
    CardInWrongLane { card_id: InstanceId },
    NegativeHealth { player_id: PlayerId, value: i16 },
    ManaOutOfRange { player_id: PlayerId, value: u8 },
    ConflictingSelection,
}

/// Authoritative match state. Mutated only by [`super::rules::RuleEngine`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    #[serde(default)]
    pub players: Vec<Player>,
    /// Whose turn it is.
    pub turn: PlayerId,
    /// Monotonic turn counter, starts at 1.
    pub turn_count: u32,
    pub phase: GamePhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_card: Option<InstanceId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targeting: Option<TargetingState>,
    #[serde(default)]
    pub animation: AnimationSlot,
    #[serde(default)]
    pub ai_turn_processing: bool,
    #[serde(default)]
    pub setup: SetupSelections,
    #[serde(default)]
    pub rules: MatchRules,
    pub next_instance_id: InstanceId,
    pub next_animation_ticket: u64,
    pub rng_state: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<VictoryState>,
}

impl GameState {
    pub fn new(rules: MatchRules, seed: u64) -> Self {
        let players = vec![Player::new(PLAYER_ONE, &rules), Player::new(PLAYER_TWO, &rules)];
        Self {
            players,
            turn: PLAYER_ONE,
            turn_count: 1,
            phase: GamePhase::default(),
            selected_card: None,
            targeting: None,
            animation: AnimationSlot::default(),
            ai_turn_processing: false,
            setup: SetupSelections::default(),
            rules,
            next_instance_id: 1,
            next_animation_ticket: 1,
            rng_state: seed,
            event_log: Vec::new(),
            outcome: None,
        }
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn get_player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|player| player.id == id)
    }

    pub fn get_player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|player| player.id == id)
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn find_field_card(&self, player: PlayerId, id: InstanceId) -> Option<&CardInstance> {
        self.get_player(player)?.field.find(id)
    }

    /// Clones a definition into a fresh instance with the next unused id.
    pub fn mint_instance(&mut self, card: CardDefinition) -> CardInstance {
        let id = self.next_instance_id;
        self.next_instance_id += 1;
        CardInstance::new(id, card)
    }

    /// Moves up to `count` cards from the deck front to the hand back.
    pub fn draw_cards(&mut self, player_id: PlayerId, count: u8) -> Vec<GameEvent> {
        let mut events = Vec::new();
        for _ in 0..count {
            let Some(player) = self.get_player_mut(player_id) else {
                break;
            };
            if player.deck.is_empty() {
                break;
            }
            let definition = player.deck.remove(0);
            let instance = self.mint_instance(definition);
            let card_id = instance.id;
            if let Some(player) = self.get_player_mut(player_id) {
                player.hand.push(instance);
            }
            events.push(GameEvent::CardDrawn { player_id, card_id });
        }
        events
    }

    /// Armor absorbs first, then hp, which never drops below zero.
    pub fn damage_hero(
        &mut self,
        source_card: Option<InstanceId>,
        target_player: PlayerId,
        amount: i16,
    ) -> Vec<GameEvent> {
        let mut events = Vec::new();
        if amount <= 0 {
            return events;
        }
        let Some(player) = self.get_player_mut(target_player) else {
            return events;
        };

        let mut remaining = amount;
        if player.armor > 0 {
            let absorbed = remaining.min(player.armor as i16);
            player.armor -= absorbed as u8;
            remaining -= absorbed;
        }
        if remaining > 0 {
            player.hp = (player.hp - remaining).max(0);
        }
        let defeated = player.hp == 0;

        events.push(GameEvent::DamageDealt {
            source_card,
            target: TargetRef::Hero {
                player: target_player,
            },
            amount,
        });

        if defeated {
            if let Some(event) = self.declare_victory(
                opponent(target_player),
                VictoryReason::HealthDepleted {
                    loser: target_player,
                },
            ) {
                events.push(event);
            }
        }
        events
    }

    /// Lowers a field card's defense. Dead cards stay in place until
    /// [`GameState::remove_dead_cards`] runs. Returns the damage actually dealt.
    pub fn damage_card(
        &mut self,
        source_card: Option<InstanceId>,
        target_player: PlayerId,
        card_id: InstanceId,
        amount: i16,
        events: &mut Vec<GameEvent>,
    ) -> i16 {
        if amount <= 0 {
            return 0;
        }
        let turn_count = self.turn_count;
        let Some(card) = self
            .get_player_mut(target_player)
            .and_then(|player| player.field.find_mut(card_id))
        else {
            return 0;
        };

        if card.is_immune(turn_count) {
            events.push(GameEvent::DamagePrevented { card_id });
            return 0;
        }

        card.card.defense -= amount;
        events.push(GameEvent::DamageDealt {
            source_card,
            target: TargetRef::Card {
                player: target_player,
                card_id,
            },
            amount,
        });
        amount
    }

    /// Heals are uncapped: there is no maximum hp to clamp against.
    pub fn heal_hero(&mut self, player_id: PlayerId, amount: i16) -> Option<GameEvent> {
        if amount <= 0 {
            return None;
        }
        let player = self.get_player_mut(player_id)?;
        player.hp = player.hp.saturating_add(amount);
        Some(GameEvent::Healed {
            target: TargetRef::Hero { player: player_id },
            amount,
        })
    }

    pub fn heal_card(
        &mut self,
        player_id: PlayerId,
        card_id: InstanceId,
        amount: i16,
    ) -> Option<GameEvent> {
        if amount <= 0 {
            return None;
        }
        let card = self.get_player_mut(player_id)?.field.find_mut(card_id)?;
        card.card.defense = card.card.defense.saturating_add(amount);
        Some(GameEvent::Healed {
            target: TargetRef::Card {
                player: player_id,
                card_id,
            },
            amount,
        })
    }

    pub fn gain_armor(&mut self, player_id: PlayerId, amount: u8) -> Option<GameEvent> {
        if amount == 0 {
            return None;
        }
        let player = self.get_player_mut(player_id)?;
        player.armor = player.armor.saturating_add(amount);
        Some(GameEvent::ArmorGained { player_id, amount })
    }

    /// Removes every dead card from both fields, returning them with their owner.
    pub fn remove_dead_cards(&mut self) -> Vec<(PlayerId, CardInstance)> {
        let mut removed = Vec::new();
        for player in &mut self.players {
            let owner = player.id;
            removed.extend(player.field.remove_dead().into_iter().map(|card| (owner, card)));
        }
        if let Some(selected) = self.selected_card {
            if !self.players.iter().any(|p| p.field.find(selected).is_some()) {
                self.selected_card = None;
            }
        }
        removed
    }

    /// First victory wins; later calls are ignored.
    pub fn declare_victory(
        &mut self,
        winner: PlayerId,
        reason: VictoryReason,
    ) -> Option<GameEvent> {
        if self.outcome.is_some() {
            return None;
        }
        tracing::info!(winner, ?reason, "match decided");
        self.outcome = Some(VictoryState {
            winner,
            reason: reason.clone(),
        });
        self.selected_card = None;
        self.targeting = None;
        Some(GameEvent::GameWon { winner, reason })
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.get_player(self.turn).is_none() {
            return Err(IntegrityError::InvalidPlayerIndex {
                player_id: self.turn,
            });
        }
        if self.selected_card.is_some() && self.targeting.is_some() {
            return Err(IntegrityError::ConflictingSelection);
        }

        let mut seen = HashSet::new();
        for player in &self.players {
            if player.hp < 0 {
                return Err(IntegrityError::NegativeHealth {
                    player_id: player.id,
                    value: player.hp,
                });
            }
            if player.mana > player.max_mana || player.max_mana > self.rules.max_mana {
                return Err(IntegrityError::ManaOutOfRange {
                    player_id: player.id,
                    value: player.mana,
                });
            }
            for lane in [Lane::Melee, Lane::Ranged] {
                for card in player.field.lane(lane) {
                    if card.is_dead() {
                        return Err(IntegrityError::DeadCardOnField { card_id: card.id });
                    }
                    if card.lane() != lane {
                        return Err(IntegrityError::CardInWrongLane { card_id: card.id });
                    }
                }
            }
            for card in player.hand.iter().chain(player.field.iter()) {
                if !seen.insert(card.id) {
                    return Err(IntegrityError::DuplicateInstanceId { card_id: card.id });
                }
            }
        }

        Ok(())
    }
}

impl Default for GameState {
    fn default() -> Self {
        Self::new(MatchRules::default(), 0)
    }
}
