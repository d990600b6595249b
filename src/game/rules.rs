use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    choreography::AnimationRequest,
    combat::{is_valid_target, plan_strike, strike_damage},
    effects::{EffectContext, EffectEngine, EffectTrigger, PassiveTrait},
    setup::{self, SelectionKind},
    state::{
        opponent, GameEvent, GamePhase, GameState, HeroPower, HeroPowerEffect, InstanceId,
        IntegrityError, Lane, PlayerId, TargetRef, TargetingState, VictoryState,
    },
};

/// Everything that can be asked of a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    PlayCard {
        player: PlayerId,
        card_id: InstanceId,
    },
    /// `None`, or the already selected card, clears the selection.
    SelectAttacker {
        player: PlayerId,
        #[serde(default)]
        card_id: Option<InstanceId>,
    },
    ApplyAttackDamage {
        player: PlayerId,
        attacker_id: InstanceId,
        #[serde(default)]
        target_id: Option<InstanceId>,
        #[serde(default)]
        target_is_hero: bool,
        damage: i16,
    },
    HeroPowerClick {
        player: PlayerId,
        power_id: String,
    },
    ApplyHeroPowerWithTarget {
        target: TargetRef,
    },
    CancelTargeting,
    DrawCard {
        player: PlayerId,
        count: u8,
    },
    EndTurn,
    InitiateAnimation {
        request: AnimationRequest,
    },
    EndAnimation {
        ticket: u64,
    },
    SetSelectedDeckCards {
        player: PlayerId,
        card_ids: Vec<String>,
    },
    SetSelectedHeroPowers {
        player: PlayerId,
        power_ids: Vec<String>,
    },
    SetSelectedPassiveSkills {
        player: PlayerId,
        skill_ids: Vec<String>,
    },
    GoToStartMenu,
    GoToPassiveSkills,
    GoToSetup,
    GoToHeroPowerOptions,
    StartGame {
        seed: u64,
    },
    RestartGame {
        seed: u64,
    },
    SetAiProcessing {
        active: bool,
    },
}

impl Action {
    /// Attack on `target` by `attacker_id`, in wire form.
    pub fn attack(
        player: PlayerId,
        attacker_id: InstanceId,
        target: TargetRef,
        damage: i16,
    ) -> Self {
        let (target_id, target_is_hero) = match target {
            TargetRef::Hero { .. } => (None, true),
            TargetRef::Card { card_id, .. } => (Some(card_id), false),
        };
        Action::ApplyAttackDamage {
            player,
            attacker_id,
            target_id,
            target_is_hero,
            damage,
        }
    }

    /// Actions that touch the board. These wait for a pending animation to commit.
    fn is_gameplay(&self) -> bool {
        matches!(
            self,
            Action::PlayCard { .. }
                | Action::SelectAttacker { .. }
                | Action::ApplyAttackDamage { .. }
                | Action::HeroPowerClick { .. }
                | Action::ApplyHeroPowerWithTarget { .. }
                | Action::DrawCard { .. }
                | Action::EndTurn
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the match is already decided")]
    GameFinished,
    #[error("it is player {expected}'s turn, not player {actual}'s")]
    NotPlayerTurn { expected: PlayerId, actual: PlayerId },
    #[error("no player {player_id}")]
    PlayerNotFound { player_id: PlayerId },
    #[error("action needs phase {expected:?}, match is in {actual:?}")]
    InvalidPhase {
        expected: GamePhase,
        actual: GamePhase,
    },
    #[error("card {card_id} not found")]
    CardNotFound { card_id: InstanceId },
    #[error("not enough mana: need {required}, have {available}")]
    InsufficientMana { required: u8, available: u8 },
    #[error("card {card_id} cannot attack right now")]
    UnitExhausted { card_id: InstanceId },
    #[error("attacker {card_id} is not on the field")]
    AttackerNotFound { card_id: InstanceId },
    #[error("target is not attackable")]
    InvalidAttackTarget,
    #[error("attack carries {actual} damage, attacker deals {expected}")]
    DamageMismatch { expected: i16, actual: i16 },
    #[error("hero power {power_id} not found")]
    HeroPowerNotFound { power_id: String },
    #[error("hero power already used this turn")]
    HeroPowerAlreadyUsed,
    #[error("a hero power is waiting for its target")]
    TargetingActive,
    #[error("no hero power is waiting for a target")]
    NoTargetingActive,
    #[error("hero power cannot target that")]
    InvalidHeroPowerTarget,
    #[error("animation {ticket} has not finished")]
    AnimationInProgress { ticket: u64 },
    #[error("no animation is pending")]
    NoPendingAnimation,
    #[error("animation {actual} is stale, {expected} is pending")]
    StaleAnimation { expected: u64, actual: u64 },
    #[error("an animation cannot commit another animation")]
    NestedAnimation,
    #[error("opponent turn already running")]
    AiAlreadyRunning,
    #[error("{selection:?}: need {required}, selected {selected}")]
    SetupIncomplete {
        selection: SelectionKind,
        required: usize,
        selected: usize,
    },
    #[error("{selection:?}: too many selected ({selected} > {max})")]
    TooManySelected {
        selection: SelectionKind,
        max: usize,
        selected: usize,
    },
    #[error("{selection:?}: unknown id {id}")]
    UnknownSelection { selection: SelectionKind, id: String },
    #[error("{selection:?}: {id} selected twice")]
    DuplicateSelection { selection: SelectionKind, id: String },
    #[error("state integrity violated: {error:?}")]
    IntegrityViolation { error: IntegrityError },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: GameState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub victory: Option<VictoryState>,
}

impl RuleResolution {
    pub fn new(state: GameState, events: Vec<GameEvent>) -> Self {
        let victory = state.outcome.clone();
        Self {
            state,
            events,
            victory,
        }
    }
}

/// The only way a [`GameState`] changes once created.
#[derive(Default)]
pub struct RuleEngine {
    effect_engine: EffectEngine,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            effect_engine: EffectEngine::default(),
        }
    }

    /// Applies `action` to `state` atomically.
    ///
    /// On success the emitted events are appended to the event log and
    /// returned. On rejection `state` is left exactly as it was.
    pub fn apply(
        &mut self,
        state: &mut GameState,
        action: Action,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let mut scratch = state.clone();
        let outcome = self
            .dispatch(&mut scratch, action)
            .and_then(|events| Self::ensure_integrity(&scratch).map(|_| events));

        match outcome {
            Ok(events) => {
                for event in &events {
                    scratch.record_event(event.clone());
                }
                *state = scratch;
                Ok(events)
            }
            Err(error) => {
                self.effect_engine.reset();
                tracing::debug!(%error, "action rejected");
                Err(error)
            }
        }
    }

    /// Like [`RuleEngine::apply`], but leaves `state` alone and returns the
    /// successor together with what happened.
    pub fn resolve(
        &mut self,
        state: &GameState,
        action: Action,
    ) -> Result<RuleResolution, RuleError> {
        let mut next = state.clone();
        let events = self.apply(&mut next, action)?;
        Ok(RuleResolution::new(next, events))
    }

    fn dispatch(
        &mut self,
        state: &mut GameState,
        action: Action,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if action.is_gameplay() {
            if let Some(ticket) = state.animation.ticket() {
                return Err(RuleError::AnimationInProgress { ticket });
            }
        }

        match action {
            Action::PlayCard { player, card_id } => self.play_card(state, player, card_id),
            Action::SelectAttacker { player, card_id } => {
                Self::select_attacker(state, player, card_id)
            }
            Action::ApplyAttackDamage {
                player,
                attacker_id,
                target_id,
                target_is_hero,
                damage,
            } => {
                let enemy = opponent(player);
                let target = if target_is_hero {
                    TargetRef::Hero { player: enemy }
                } else {
                    TargetRef::Card {
                        player: enemy,
                        card_id: target_id.ok_or(RuleError::InvalidAttackTarget)?,
                    }
                };
                self.attack(state, player, attacker_id, target, damage)
            }
            Action::HeroPowerClick { player, power_id } => {
                self.hero_power_click(state, player, &power_id)
            }
            Action::ApplyHeroPowerWithTarget { target } => {
                self.hero_power_with_target(state, target)
            }
            Action::CancelTargeting => Self::cancel_targeting(state),
            Action::DrawCard { player, count } => Self::draw(state, player, count),
            Action::EndTurn => Self::end_turn(state),
            Action::InitiateAnimation { request } => self.initiate_animation(state, request),
            Action::EndAnimation { ticket } => self.end_animation(state, ticket),
            Action::SetSelectedDeckCards { player, card_ids } => {
                setup::set_selection(state, player, SelectionKind::Deck, card_ids)
                    .map(|_| Vec::new())
            }
            Action::SetSelectedHeroPowers { player, power_ids } => {
                setup::set_selection(state, player, SelectionKind::HeroPowers, power_ids)
                    .map(|_| Vec::new())
            }
            Action::SetSelectedPassiveSkills { player, skill_ids } => {
                setup::set_selection(state, player, SelectionKind::PassiveSkills, skill_ids)
                    .map(|_| Vec::new())
            }
            Action::GoToStartMenu => setup::go_to(state, GamePhase::StartMenu),
            Action::GoToPassiveSkills => setup::go_to(state, GamePhase::PassiveSkills),
            Action::GoToSetup => setup::go_to(state, GamePhase::Setup),
            Action::GoToHeroPowerOptions => setup::go_to(state, GamePhase::HeroPowerOptions),
            Action::StartGame { seed } => setup::start_match(state, seed),
            Action::RestartGame { seed } => setup::restart_match(state, seed),
            Action::SetAiProcessing { active } => Self::set_ai_processing(state, active),
        }
    }

    fn ensure_playing(state: &GameState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::GameFinished);
        }
        if state.phase != GamePhase::Playing {
            return Err(RuleError::InvalidPhase {
                expected: GamePhase::Playing,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_turn_owner(state: &GameState, player: PlayerId) -> Result<(), RuleError> {
        if state.get_player(player).is_none() {
            return Err(RuleError::PlayerNotFound { player_id: player });
        }
        if state.turn != player {
            return Err(RuleError::NotPlayerTurn {
                expected: state.turn,
                actual: player,
            });
        }
        Ok(())
    }

    fn ensure_not_targeting(state: &GameState) -> Result<(), RuleError> {
        if state.targeting.is_some() {
            return Err(RuleError::TargetingActive);
        }
        Ok(())
    }

    fn ensure_integrity(state: &GameState) -> Result<(), RuleError> {
        state
            .integrity_check()
            .map_err(|error| RuleError::IntegrityViolation { error })
    }

    fn play_card(
        &mut self,
        state: &mut GameState,
        player_id: PlayerId,
        card_id: InstanceId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        Self::ensure_turn_owner(state, player_id)?;
        Self::ensure_not_targeting(state)?;

        let turn_count = state.turn_count;
        let rules = state.rules.clone();
        let player = state
            .get_player_mut(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })?;
        let hand_index = player
            .find_card_in_hand_index(card_id)
            .ok_or(RuleError::CardNotFound { card_id })?;

        let cost = player.minion_cost(&player.hand[hand_index].card, &rules);
        if player.mana < cost {
            return Err(RuleError::InsufficientMana {
                required: cost,
                available: player.mana,
            });
        }

        let melee_charge = player.grants_melee_charge();
        let mut card = player.hand.remove(hand_index);
        player.mana -= cost;
        card.turn_played = Some(turn_count);
        card.immune_first_turn = card.has_passive(PassiveTrait::ImmuneFirstTurn);
        card.can_attack =
            card.has_passive(PassiveTrait::Charge) || (melee_charge && card.lane() == Lane::Melee);

        let lane = card.lane();
        let effects = card.card.effects.clone();
        tracing::debug!(player_id, card_id, name = %card.card.name, cost, "card played");
        player.field.insert(card);

        let mut events = vec![GameEvent::CardPlayed {
            player_id,
            card_id,
            lane,
            cost,
        }];
        let context =
            EffectContext::new(EffectTrigger::OnPlay, player_id).with_source_card(card_id);
        self.effect_engine.queue_card_effects(&effects, context);
        events.extend(self.effect_engine.resolve_all(state));
        Ok(events)
    }

    fn select_attacker(
        state: &mut GameState,
        player_id: PlayerId,
        card_id: Option<InstanceId>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        Self::ensure_turn_owner(state, player_id)?;
        Self::ensure_not_targeting(state)?;

        state.selected_card = match card_id {
            None => None,
            Some(id) => {
                let card = state
                    .find_field_card(player_id, id)
                    .ok_or(RuleError::CardNotFound { card_id: id })?;
                if !card.can_attack {
                    return Err(RuleError::UnitExhausted { card_id: id });
                }
                if state.selected_card == Some(id) {
                    None
                } else {
                    Some(id)
                }
            }
        };

        Ok(vec![GameEvent::AttackerSelected {
            card_id: state.selected_card,
        }])
    }

    fn attack(
        &mut self,
        state: &mut GameState,
        player_id: PlayerId,
        attacker_id: InstanceId,
        target: TargetRef,
        damage: i16,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        Self::ensure_turn_owner(state, player_id)?;
        Self::ensure_not_targeting(state)?;

        let attacker = state
            .find_field_card(player_id, attacker_id)
            .cloned()
            .ok_or(RuleError::AttackerNotFound {
                card_id: attacker_id,
            })?;
        if !attacker.can_attack {
            return Err(RuleError::UnitExhausted {
                card_id: attacker_id,
            });
        }
        if !is_valid_target(state, player_id, attacker_id, target) {
            return Err(RuleError::InvalidAttackTarget);
        }
        let expected = strike_damage(&attacker);
        if damage != expected {
            return Err(RuleError::DamageMismatch {
                expected,
                actual: damage,
            });
        }

        let defender = match target {
            TargetRef::Card { player, card_id } => state.find_field_card(player, card_id).cloned(),
            TargetRef::Hero { .. } => None,
        };
        let plan = plan_strike(&attacker, defender.as_ref(), damage);

        if let Some(card) = state
            .get_player_mut(player_id)
            .and_then(|player| player.field.find_mut(attacker_id))
        {
            card.can_attack = false;
        }
        if state.selected_card == Some(attacker_id) {
            state.selected_card = None;
        }

        let mut events = vec![GameEvent::AttackResolved {
            player_id,
            attacker_id,
            target,
        }];

        let dealt = match target {
            TargetRef::Hero { player } => {
                events.extend(state.damage_hero(Some(attacker_id), player, plan.damage_to_target));
                plan.damage_to_target
            }
            TargetRef::Card { player, card_id } => {
                let dealt = state.damage_card(
                    Some(attacker_id),
                    player,
                    card_id,
                    plan.damage_to_target,
                    &mut events,
                );
                state.damage_card(
                    Some(card_id),
                    player_id,
                    attacker_id,
                    plan.counter_damage,
                    &mut events,
                );
                dealt
            }
        };
        if plan.lifesteal {
            events.extend(state.heal_hero(player_id, dealt));
        }

        self.effect_engine.reap(state, &mut events);
        events.extend(self.effect_engine.resolve_all(state));
        Ok(events)
    }

    fn usable_power(
        state: &GameState,
        player_id: PlayerId,
        power_id: &str,
    ) -> Result<(HeroPower, u8), RuleError> {
        let player = state
            .get_player(player_id)
            .ok_or(RuleError::PlayerNotFound { player_id })?;
        if player.has_used_hero_power {
            return Err(RuleError::HeroPowerAlreadyUsed);
        }
        let power = player
            .find_hero_power(power_id)
            .cloned()
            .ok_or_else(|| RuleError::HeroPowerNotFound {
                power_id: power_id.to_string(),
            })?;
        let cost = player.hero_power_cost(&power, &state.rules);
        if player.mana < cost {
            return Err(RuleError::InsufficientMana {
                required: cost,
                available: player.mana,
            });
        }
        Ok((power, cost))
    }

    fn hero_power_click(
        &mut self,
        state: &mut GameState,
        player_id: PlayerId,
        power_id: &str,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        Self::ensure_turn_owner(state, player_id)?;
        Self::ensure_not_targeting(state)?;

        let (power, cost) = Self::usable_power(state, player_id, power_id)?;
        if power.requires_target {
            state.selected_card = None;
            state.targeting = Some(TargetingState {
                player: player_id,
                power_id: power.id.clone(),
            });
            return Ok(vec![GameEvent::TargetingStarted {
                player_id,
                power_id: power.id,
            }]);
        }

        Ok(self.use_hero_power(state, player_id, &power, cost, None))
    }

    fn hero_power_with_target(
        &mut self,
        state: &mut GameState,
        target: TargetRef,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        let targeting = state.targeting.clone().ok_or(RuleError::NoTargetingActive)?;
        let player_id = targeting.player;
        Self::ensure_turn_owner(state, player_id)?;

        let (power, cost) = Self::usable_power(state, player_id, &targeting.power_id)?;

        let exists = match target {
            TargetRef::Hero { player } => state.get_player(player).is_some(),
            TargetRef::Card { player, card_id } => state.find_field_card(player, card_id).is_some(),
        };
        let side_ok = match power.effect {
            HeroPowerEffect::Damage => target.owner() != player_id,
            HeroPowerEffect::Heal => target.owner() == player_id,
            HeroPowerEffect::Armor | HeroPowerEffect::Draw => true,
        };
        if !exists || !side_ok {
            return Err(RuleError::InvalidHeroPowerTarget);
        }

        state.targeting = None;
        Ok(self.use_hero_power(state, player_id, &power, cost, Some(target)))
    }

    fn use_hero_power(
        &mut self,
        state: &mut GameState,
        player_id: PlayerId,
        power: &HeroPower,
        cost: u8,
        target: Option<TargetRef>,
    ) -> Vec<GameEvent> {
        if let Some(player) = state.get_player_mut(player_id) {
            player.mana -= cost;
            player.has_used_hero_power = true;
        }
        tracing::debug!(player_id, power = %power.id, ?target, "hero power used");

        let mut events = vec![GameEvent::HeroPowerUsed {
            player_id,
            power_id: power.id.clone(),
            target,
        }];
        let amount = power.amount;
        let count = u8::try_from(amount.max(0)).unwrap_or(u8::MAX);

        match power.effect {
            HeroPowerEffect::Damage => match target {
                Some(TargetRef::Card { player, card_id }) => {
                    state.damage_card(None, player, card_id, amount, &mut events);
                }
                Some(TargetRef::Hero { player }) => {
                    events.extend(state.damage_hero(None, player, amount))
                }
                None => events.extend(state.damage_hero(None, opponent(player_id), amount)),
            },
            HeroPowerEffect::Heal => match target {
                Some(TargetRef::Card { player, card_id }) => {
                    events.extend(state.heal_card(player, card_id, amount))
                }
                _ => events.extend(state.heal_hero(player_id, amount)),
            },
            HeroPowerEffect::Armor => events.extend(state.gain_armor(player_id, count)),
            HeroPowerEffect::Draw => events.extend(state.draw_cards(player_id, count)),
        }

        self.effect_engine.reap(state, &mut events);
        events.extend(self.effect_engine.resolve_all(state));
        events
    }

    fn cancel_targeting(state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        let targeting = state.targeting.take().ok_or(RuleError::NoTargetingActive)?;
        Ok(vec![GameEvent::TargetingCancelled {
            player_id: targeting.player,
        }])
    }

    fn draw(
        state: &mut GameState,
        player_id: PlayerId,
        count: u8,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        if state.get_player(player_id).is_none() {
            return Err(RuleError::PlayerNotFound { player_id });
        }
        Ok(state.draw_cards(player_id, count))
    }

    /// Hands the turn over: the next player gains a mana crystal (capped),
    /// refills, may use a hero power again, readies every field card and
    /// draws one card.
    fn end_turn(state: &mut GameState) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;

        let current = state.turn;
        let next = opponent(current);
        let max_mana = state.rules.max_mana;

        state.turn = next;
        state.turn_count += 1;
        state.selected_card = None;
        state.targeting = None;

        let player = state
            .get_player_mut(next)
            .ok_or(RuleError::PlayerNotFound { player_id: next })?;
        player.max_mana = player.max_mana.saturating_add(1).min(max_mana);
        player.mana = player.max_mana;
        player.has_used_hero_power = false;
        player.ready_field();

        tracing::debug!(from = current, to = next, turn_count = state.turn_count, "turn ended");
        let mut events = vec![GameEvent::TurnEnded {
            player_id: current,
            next_player: next,
            turn_count: state.turn_count,
        }];
        events.extend(state.draw_cards(next, 1));
        Ok(events)
    }

    /// Parks an action behind an animation. The parked action is tried on a
    /// copy first, so only commits that would currently succeed are accepted.
    fn initiate_animation(
        &mut self,
        state: &mut GameState,
        request: AnimationRequest,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_playing(state)?;
        if let Some(ticket) = state.animation.ticket() {
            return Err(RuleError::AnimationInProgress { ticket });
        }
        if matches!(
            *request.commit,
            Action::InitiateAnimation { .. } | Action::EndAnimation { .. }
        ) {
            return Err(RuleError::NestedAnimation);
        }

        let mut dry_run = state.clone();
        self.dispatch(&mut dry_run, (*request.commit).clone())?;

        let ticket = state.next_animation_ticket;
        state.next_animation_ticket += 1;
        state.animation.begin(ticket, request)?;
        Ok(vec![GameEvent::AnimationStarted { ticket }])
    }

    /// Commits the parked action. The slot is freed even when the commit is
    /// refused; the refusal is reported as a `CommitRejected` event.
    fn end_animation(
        &mut self,
        state: &mut GameState,
        ticket: u64,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let commit = state.animation.complete(ticket)?;
        let mut events = vec![GameEvent::AnimationCommitted { ticket }];

        let mut scratch = state.clone();
        match self.dispatch(&mut scratch, commit) {
            Ok(committed) => {
                *state = scratch;
                events.extend(committed);
            }
            Err(error) => {
                self.effect_engine.reset();
                tracing::debug!(ticket, %error, "animation commit rejected");
                events.push(GameEvent::CommitRejected {
                    ticket,
                    reason: error.to_string(),
                });
            }
        }
        Ok(events)
    }

    fn set_ai_processing(state: &mut GameState, active: bool) -> Result<Vec<GameEvent>, RuleError> {
        if active {
            Self::ensure_playing(state)?;
            if state.ai_turn_processing {
                return Err(RuleError::AiAlreadyRunning);
            }
        }
        state.ai_turn_processing = active;
        Ok(Vec::new())
    }
}

/// Total form of [`RuleEngine::apply`]: a rejected action yields `state` unchanged.
pub fn reduce(state: &GameState, action: Action) -> GameState {
    let mut next = state.clone();
    match RuleEngine::new().apply(&mut next, action) {
        Ok(_) => next,
        Err(_) => state.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::choreography::{Projectile, Rect, VisualHint};
    use crate::game::effects::{BattlecryEffect, CardEffect};
    use crate::game::state::{CardDefinition, UnitType, PLAYER_ONE, PLAYER_TWO};

    fn playing_state() -> GameState {
        let mut state = GameState::default();
        state.phase = GamePhase::Playing;
        state
    }

    fn unit(
        unit: UnitType,
        cost: u8,
        attack: i16,
        defense: i16,
        effects: Vec<CardEffect>,
    ) -> CardDefinition {
        CardDefinition::new("t_unit", "Test Unit", unit, cost, attack, defense)
            .with_effects(effects)
    }

    fn in_hand(state: &mut GameState, player: PlayerId, def: CardDefinition) -> InstanceId {
        let card = state.mint_instance(def);
        let id = card.id;
        state.get_player_mut(player).expect("player").hand.push(card);
        id
    }

    fn on_field(state: &mut GameState, player: PlayerId, def: CardDefinition) -> InstanceId {
        let mut card = state.mint_instance(def);
        card.can_attack = true;
        let id = card.id;
        state.get_player_mut(player).expect("player").field.insert(card);
        id
    }

    fn hero(player: PlayerId) -> TargetRef {
        TargetRef::Hero { player }
    }

    fn card(player: PlayerId, card_id: InstanceId) -> TargetRef {
        TargetRef::Card { player, card_id }
    }

    fn select(card_id: InstanceId) -> Action {
        Action::SelectAttacker {
            player: PLAYER_ONE,
            card_id: Some(card_id),
        }
    }

    fn click(power_id: &str) -> Action {
        Action::HeroPowerClick {
            player: PLAYER_ONE,
            power_id: power_id.into(),
        }
    }

    #[test]
    fn charge_card_hits_empty_board_hero() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let charger = in_hand(
            &mut state,
            PLAYER_ONE,
            unit(UnitType::Warrior, 1, 3, 2, vec![CardEffect::passive(PassiveTrait::Charge)]),
        );

        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: charger })
            .expect("affordable card");
        let played = state.find_field_card(PLAYER_ONE, charger).expect("on field");
        assert_eq!(played.lane(), Lane::Melee);
        assert!(played.can_attack);
        assert_eq!(state.players[0].mana, 0);

        engine
            .apply(&mut state, Action::attack(PLAYER_ONE, charger, hero(PLAYER_TWO), 3))
            .expect("hero is open");
        assert_eq!(state.players[1].hp, 27);
        assert!(!state.find_field_card(PLAYER_ONE, charger).expect("alive").can_attack);
        assert_eq!(state.players[0].mana, 0);
    }

    #[test]
    fn played_card_without_charge_waits_a_turn() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let squire = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 1, 1, 3, vec![]));
        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: squire })
            .expect("play");
        assert_eq!(
            engine.apply(&mut state, Action::attack(PLAYER_ONE, squire, hero(PLAYER_TWO), 1)),
            Err(RuleError::UnitExhausted { card_id: squire })
        );

        engine.apply(&mut state, Action::EndTurn).expect("p1 ends");
        engine.apply(&mut state, Action::EndTurn).expect("p2 ends");
        engine
            .apply(&mut state, Action::attack(PLAYER_ONE, squire, hero(PLAYER_TWO), 1))
            .expect("ready after its controller's next turn starts");
    }

    #[test]
    fn ranged_attacker_takes_no_counter_damage() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        let warrior = on_field(&mut state, PLAYER_TWO, unit(UnitType::Warrior, 3, 5, 3, vec![]));

        let events = engine
            .apply(&mut state, Action::attack(PLAYER_ONE, archer, card(PLAYER_TWO, warrior), 4))
            .expect("ranged reaches melee");

        assert!(state.players[1].field.is_empty());
        assert_eq!(state.find_field_card(PLAYER_ONE, archer).map(|c| c.defense()), Some(2));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::CardDestroyed { card, .. } if card.id == warrior)));
    }

    #[test]
    fn melee_trade_damages_both_sides_in_one_action() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let attacker = on_field(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 2, 2, 5, vec![]));
        let defender = on_field(&mut state, PLAYER_TWO, unit(UnitType::Warrior, 2, 3, 4, vec![]));

        engine
            .apply(&mut state, Action::attack(PLAYER_ONE, attacker, card(PLAYER_TWO, defender), 2))
            .expect("melee on melee");

        assert_eq!(state.find_field_card(PLAYER_ONE, attacker).map(|c| c.defense()), Some(2));
        assert_eq!(state.find_field_card(PLAYER_TWO, defender).map(|c| c.defense()), Some(2));
    }

    #[test]
    fn lifesteal_heals_own_hero_by_damage_dealt() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        state.players[0].hp = 20;
        let hunter = on_field(
            &mut state,
            PLAYER_ONE,
            unit(UnitType::Archer, 4, 5, 3, vec![CardEffect::passive(PassiveTrait::Lifesteal)]),
        );

        engine
            .apply(&mut state, Action::attack(PLAYER_ONE, hunter, hero(PLAYER_TWO), 5))
            .expect("attack");
        assert_eq!(state.players[0].hp, 25);
        assert_eq!(state.players[1].hp, 25);
    }

    #[test]
    fn lethal_attack_ends_the_match() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        state.players[1].hp = 2;
        state.players[1].armor = 1;
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));

        let resolution = engine
            .resolve(&state, Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4))
            .expect("attack");
        assert_eq!(resolution.state.players[1].hp, 0);
        assert_eq!(resolution.state.players[1].armor, 0);
        assert_eq!(resolution.victory.map(|v| v.winner), Some(PLAYER_ONE));

        let mut finished = resolution.state;
        assert_eq!(engine.apply(&mut finished, Action::EndTurn), Err(RuleError::GameFinished));
    }

    #[test]
    fn melee_attacker_cannot_skip_enemy_melee_or_taunt() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let attacker = on_field(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 2, 2, 5, vec![]));
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 2, 2, 5, vec![]));
        on_field(&mut state, PLAYER_TWO, unit(UnitType::Warrior, 2, 1, 1, vec![]));
        on_field(
            &mut state,
            PLAYER_TWO,
            unit(UnitType::Cleric, 2, 0, 4, vec![CardEffect::passive(PassiveTrait::Taunt)]),
        );
        let before = state.clone();

        assert_eq!(
            engine.apply(&mut state, Action::attack(PLAYER_ONE, attacker, hero(PLAYER_TWO), 2)),
            Err(RuleError::InvalidAttackTarget)
        );
        assert_eq!(
            engine.apply(&mut state, Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 2)),
            Err(RuleError::InvalidAttackTarget)
        );
        assert_eq!(state, before);
    }

    #[test]
    fn end_turn_flips_turn_and_refills_mana() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        state.players[1].deck = vec![unit(UnitType::Warrior, 1, 1, 1, vec![])];
        let p2_card = on_field(&mut state, PLAYER_TWO, unit(UnitType::Warrior, 1, 1, 1, vec![]));
        if let Some(card) = state.players[1].field.find_mut(p2_card) {
            card.can_attack = false;
        }

        engine.apply(&mut state, Action::EndTurn).expect("first");
        assert_eq!((state.turn, state.turn_count), (PLAYER_TWO, 2));
        let p2 = state.get_player(PLAYER_TWO).expect("p2");
        assert_eq!((p2.mana, p2.max_mana), (2, 2));
        assert_eq!(p2.hand.len(), 1);
        assert!(p2.field.find(p2_card).is_some_and(|c| c.can_attack));

        engine.apply(&mut state, Action::EndTurn).expect("second");
        assert_eq!((state.turn, state.turn_count), (PLAYER_ONE, 3));
    }

    #[test]
    fn mana_caps_at_ten() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        for _ in 0..30 {
            engine.apply(&mut state, Action::EndTurn).expect("end turn");
        }
        assert!(state.players.iter().all(|p| p.max_mana == 10 && p.mana <= 10));
    }

    #[test]
    fn rejected_actions_leave_state_untouched() {
        let mut state = playing_state();
        let pricey = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 5, 5, 5, vec![]));
        let theirs = in_hand(&mut state, PLAYER_TWO, unit(UnitType::Warrior, 1, 1, 1, vec![]));

        let mut engine = RuleEngine::new();
        let mut untouched = state.clone();
        assert_eq!(
            engine.apply(&mut untouched, Action::PlayCard { player: PLAYER_ONE, card_id: pricey }),
            Err(RuleError::InsufficientMana { required: 5, available: 1 })
        );
        assert_eq!(
            engine.apply(&mut untouched, Action::PlayCard { player: PLAYER_TWO, card_id: theirs }),
            Err(RuleError::NotPlayerTurn { expected: PLAYER_ONE, actual: PLAYER_TWO })
        );
        assert_eq!(
            engine.apply(&mut untouched, Action::PlayCard { player: PLAYER_ONE, card_id: 999 }),
            Err(RuleError::CardNotFound { card_id: 999 })
        );
        assert_eq!(untouched, state);
        assert_eq!(reduce(&state, Action::CancelTargeting), state);
    }

    #[test]
    fn attacker_selection_toggles() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let first = on_field(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 1, 1, 1, vec![]));
        let second = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 1, 1, 1, vec![]));

        engine.apply(&mut state, select(first)).expect("select");
        assert_eq!(state.selected_card, Some(first));
        engine.apply(&mut state, select(second)).expect("replace");
        assert_eq!(state.selected_card, Some(second));
        engine.apply(&mut state, select(second)).expect("toggle off");
        assert_eq!(state.selected_card, None);
    }

    #[test]
    fn targeted_hero_power_goes_through_targeting() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        state.players[0].hero_powers = crate::game::catalog::hero_power_pool(PLAYER_ONE).to_vec();
        let attacker = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 1, 1, 1, vec![]));
        engine
            .apply(&mut state, select(attacker))
            .expect("select");

        engine
            .apply(&mut state, click("p1_fireblast"))
            .expect("click");
        assert!(state.targeting.is_some());
        assert_eq!(state.selected_card, None);
        assert_eq!(
            engine.apply(&mut state, select(attacker)),
            Err(RuleError::TargetingActive)
        );
        assert_eq!(
            engine.apply(&mut state, Action::ApplyHeroPowerWithTarget { target: hero(PLAYER_ONE) }),
            Err(RuleError::InvalidHeroPowerTarget)
        );

        engine
            .apply(&mut state, Action::ApplyHeroPowerWithTarget { target: hero(PLAYER_TWO) })
            .expect("enemy hero");
        assert_eq!(state.players[1].hp, 28);
        assert_eq!(state.players[0].mana, 0);
        assert!(state.targeting.is_none());
        assert_eq!(
            engine.apply(&mut state, click("p1_armor")),
            Err(RuleError::HeroPowerAlreadyUsed)
        );
    }

    #[test]
    fn untargeted_hero_power_applies_at_once() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        state.players[0].hero_powers = crate::game::catalog::hero_power_pool(PLAYER_ONE).to_vec();
        engine
            .apply(&mut state, click("p1_armor"))
            .expect("armor");
        assert_eq!(state.players[0].armor, 2);
        assert!(state.players[0].has_used_hero_power);
    }

    fn envelope(commit: Action) -> Action {
        Action::InitiateAnimation {
            request: AnimationRequest {
                visual: VisualHint {
                    from: Rect::new(0, 0, 10, 10),
                    to: Rect::new(0, 100, 10, 10),
                    projectile: Projectile::Arrow,
                    duration_ms: 700,
                    amount: 4,
                },
                commit: Box::new(commit),
            },
        }
    }

    #[test]
    fn animation_defers_damage_until_matching_ticket() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        let strike = Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4);

        let events = engine.apply(&mut state, envelope(strike.clone())).expect("init");
        assert_eq!(events, vec![GameEvent::AnimationStarted { ticket: 1 }]);
        assert_eq!(state.players[1].hp, 30);

        assert_eq!(
            engine.apply(&mut state, envelope(strike.clone())),
            Err(RuleError::AnimationInProgress { ticket: 1 })
        );
        assert_eq!(
            engine.apply(&mut state, Action::EndTurn),
            Err(RuleError::AnimationInProgress { ticket: 1 })
        );
        assert_eq!(
            engine.apply(&mut state, Action::EndAnimation { ticket: 2 }),
            Err(RuleError::StaleAnimation { expected: 1, actual: 2 })
        );

        engine.apply(&mut state, Action::EndAnimation { ticket: 1 }).expect("commit");
        assert_eq!(state.players[1].hp, 26);
        assert!(!state.animation.is_pending());
        assert_eq!(
            engine.apply(&mut state, Action::EndAnimation { ticket: 1 }),
            Err(RuleError::NoPendingAnimation)
        );
    }

    #[test]
    fn refused_commit_still_frees_the_slot() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        engine
            .apply(&mut state, envelope(Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4)))
            .expect("init");

        if let Some(card) = state.players[0].field.find_mut(archer) {
            card.can_attack = false;
        }
        let events = engine
            .apply(&mut state, Action::EndAnimation { ticket: 1 })
            .expect("slot freed");
        assert!(events.iter().any(|e| matches!(e, GameEvent::CommitRejected { ticket: 1, .. })));
        assert!(!state.animation.is_pending());
        assert_eq!(state.players[1].hp, 30);
    }

    #[test]
    fn illegal_commit_is_refused_up_front() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        assert_eq!(
            engine.apply(
                &mut state,
                envelope(Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 9))
            ),
            Err(RuleError::DamageMismatch { expected: 4, actual: 9 })
        );
        assert!(!state.animation.is_pending());
    }

    #[test]
    fn ai_processing_flag_guards_reentry() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        engine.apply(&mut state, Action::SetAiProcessing { active: true }).expect("first run");
        assert_eq!(
            engine.apply(&mut state, Action::SetAiProcessing { active: true }),
            Err(RuleError::AiAlreadyRunning)
        );
        engine.apply(&mut state, Action::SetAiProcessing { active: false }).expect("done");
        assert!(!state.ai_turn_processing);
    }

    fn full_setup(engine: &mut RuleEngine, state: &mut GameState) {
        let actions = vec![
            Action::GoToPassiveSkills,
            Action::SetSelectedPassiveSkills {
                player: PLAYER_ONE,
                skill_ids: vec![
                    "passive_atk_boost".into(),
                    "passive_hp_hero".into(),
                    "passive_mana_regen".into(),
                ],
            },
            Action::GoToSetup,
            Action::SetSelectedDeckCards {
                player: PLAYER_ONE,
                card_ids: crate::game::catalog::card_pool(PLAYER_ONE)
                    .iter()
                    .take(15)
                    .map(|c| c.card_id.clone())
                    .collect(),
            },
            Action::GoToHeroPowerOptions,
            Action::SetSelectedHeroPowers {
                player: PLAYER_ONE,
                power_ids: vec!["p1_fireblast".into(), "p1_draw".into()],
            },
            Action::StartGame { seed: 2024 },
        ];
        for action in actions {
            engine.apply(state, action).expect("setup step");
        }
    }

    fn play_a_few_turns(engine: &mut RuleEngine, state: &mut GameState) {
        for _ in 0..4 {
            let player = state.turn;
            let playable: Vec<InstanceId> = state
                .get_player(player)
                .map(|p| p.hand.iter().map(|c| c.id).collect())
                .unwrap_or_default();
            for card_id in playable {
                let _ = engine.apply(state, Action::PlayCard { player, card_id });
            }
            engine.apply(state, Action::EndTurn).expect("end turn");
        }
    }

    #[test]
    fn setup_flow_reaches_playing_with_passives_applied() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::default();
        full_setup(&mut engine, &mut state);

        assert_eq!(state.phase, GamePhase::Playing);
        let human = state.get_player(PLAYER_ONE).expect("p1");
        assert_eq!(human.hp, 40);
        assert_eq!((human.mana, human.max_mana), (2, 2));
        assert_eq!(human.hand.len(), 3);
        assert_eq!(human.hero_powers.len(), 2);
    }

    #[test]
    fn restart_and_replay_is_deterministic() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::default();
        full_setup(&mut engine, &mut state);
        play_a_few_turns(&mut engine, &mut state);
        let first_run = state.clone();

        engine.apply(&mut state, Action::RestartGame { seed: 2024 }).expect("restart");
        assert_eq!(state.turn_count, 1);
        assert!(state.players.iter().all(|p| p.field.is_empty()));
        play_a_few_turns(&mut engine, &mut state);

        assert_eq!(state.players, first_run.players);
        assert_eq!(state.turn_count, first_run.turn_count);
        assert_eq!(state.rng_state, first_run.rng_state);
    }

    #[test]
    fn actions_parse_from_tagged_json() {
        let action: Action = serde_json::from_str(r#"{"type":"PLAY_CARD","player":1,"card_id":4}"#)
            .expect("valid json");
        assert_eq!(action, Action::PlayCard { player: PLAYER_ONE, card_id: 4 });

        let attack: Action = serde_json::from_str(
            r#"{"type":"APPLY_ATTACK_DAMAGE","player":2,"attacker_id":9,
                "target_is_hero":true,"damage":3}"#,
        )
        .expect("valid json");
        assert_eq!(attack, Action::attack(PLAYER_TWO, 9, hero(PLAYER_ONE), 3));
    }

    fn grant_passive(state: &mut GameState, player: PlayerId, passive_id: &str) {
        let skill =
            crate::game::catalog::find_passive(player, passive_id).expect("catalog passive");
        state.get_player_mut(player).expect("player").passive_skills.push(skill.clone());
    }

    #[test]
    fn restart_keeps_old_animation_tickets_stale() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::default();
        full_setup(&mut engine, &mut state);
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        engine
            .apply(&mut state, envelope(Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4)))
            .expect("first match animation");

        engine.apply(&mut state, Action::RestartGame { seed: 2024 }).expect("restart");
        assert!(!state.animation.is_pending());
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        let events = engine
            .apply(&mut state, envelope(Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4)))
            .expect("second match animation");
        assert_eq!(events, vec![GameEvent::AnimationStarted { ticket: 2 }]);

        let hp_before = state.players[1].hp;
        assert_eq!(
            engine.apply(&mut state, Action::EndAnimation { ticket: 1 }),
            Err(RuleError::StaleAnimation { expected: 2, actual: 1 })
        );
        assert_eq!(state.players[1].hp, hp_before);
        assert!(state.animation.is_pending());

        engine.apply(&mut state, Action::EndAnimation { ticket: 2 }).expect("current ticket");
        assert_eq!(state.players[1].hp, hp_before - 4);
    }

    #[test]
    fn going_to_start_menu_abandons_match_but_keeps_selections() {
        let mut engine = RuleEngine::new();
        let mut state = GameState::default();
        full_setup(&mut engine, &mut state);
        let selections = state.setup.clone();
        let archer = on_field(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 4, 2, vec![]));
        engine
            .apply(&mut state, envelope(Action::attack(PLAYER_ONE, archer, hero(PLAYER_TWO), 4)))
            .expect("pending animation");

        engine.apply(&mut state, Action::GoToStartMenu).expect("back to menu");
        assert_eq!(state.phase, GamePhase::StartMenu);
        assert_eq!(state.setup, selections);
        assert!(state.players.iter().all(|p| p.field.is_empty() && p.hand.is_empty()));
        assert!(!state.animation.is_pending());
        assert_eq!(
            engine.apply(&mut state, Action::EndAnimation { ticket: 1 }),
            Err(RuleError::NoPendingAnimation)
        );
        assert_eq!(state.next_animation_ticket, 2);

        engine.apply(&mut state, Action::RestartGame { seed: 2024 }).expect("replay selections");
        assert_eq!(state.phase, GamePhase::Playing);
        assert_eq!(state.get_player(PLAYER_ONE).expect("p1").hp, 40);
    }

    #[test]
    fn melee_charge_passive_readies_melee_units_only() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        grant_passive(&mut state, PLAYER_ONE, "passive_charge_melee");
        state.players[0].mana = 4;
        let squire = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 1, 2, 2, vec![]));
        let archer = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Archer, 3, 3, 1, vec![]));

        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: squire })
            .expect("play squire");
        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: archer })
            .expect("play archer");
        assert!(state.find_field_card(PLAYER_ONE, squire).expect("squire").can_attack);
        assert!(!state.find_field_card(PLAYER_ONE, archer).expect("archer").can_attack);

        engine
            .apply(&mut state, Action::attack(PLAYER_ONE, squire, hero(PLAYER_TWO), 2))
            .expect("melee charge");
        assert_eq!(state.players[1].hp, 28);
    }

    #[test]
    fn cheaper_minions_passive_discounts_down_to_one_mana() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        grant_passive(&mut state, PLAYER_ONE, "passive_cheaper_minions");
        state.players[0].mana = 3;
        let knight = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 3, 3, 3, vec![]));
        let squire = in_hand(&mut state, PLAYER_ONE, unit(UnitType::Warrior, 1, 1, 1, vec![]));

        let events = engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: knight })
            .expect("discounted knight");
        assert!(events.iter().any(|e| matches!(e, GameEvent::CardPlayed { cost: 2, .. })));
        assert_eq!(state.players[0].mana, 1);

        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: squire })
            .expect("one-cost card stays at one");
        assert_eq!(state.players[0].mana, 0);
    }

    #[test]
    fn hero_power_discount_floors_at_zero() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        grant_passive(&mut state, PLAYER_ONE, "passive_hero_power_cheap");
        state.players[0].hero_powers = crate::game::catalog::hero_power_pool(PLAYER_ONE).to_vec();
        state.players[0].mana = 0;

        engine
            .apply(&mut state, click("p1_armor"))
            .expect("free armor");
        assert_eq!(state.players[0].armor, 2);
        assert_eq!(state.players[0].mana, 0);
    }

    #[test]
    fn immune_first_turn_shields_only_the_turn_played() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let guard = in_hand(
            &mut state,
            PLAYER_ONE,
            unit(
                UnitType::Cleric,
                1,
                1,
                4,
                vec![CardEffect::passive(PassiveTrait::ImmuneFirstTurn)],
            ),
        );
        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: guard })
            .expect("play guard");
        let played = state.find_field_card(PLAYER_ONE, guard).expect("on field");
        assert_eq!(played.turn_played, Some(1));
        assert!(played.immune_first_turn);

        let mut events = Vec::new();
        assert_eq!(state.damage_card(None, PLAYER_ONE, guard, 3, &mut events), 0);
        assert_eq!(events, vec![GameEvent::DamagePrevented { card_id: guard }]);

        engine.apply(&mut state, Action::EndTurn).expect("p1 ends");
        let mut events = Vec::new();
        assert_eq!(state.damage_card(None, PLAYER_ONE, guard, 3, &mut events), 3);
        assert_eq!(state.find_field_card(PLAYER_ONE, guard).expect("alive").defense(), 1);
    }

    #[test]
    fn heal_battlecry_can_exceed_starting_hp() {
        let mut engine = RuleEngine::new();
        let mut state = playing_state();
        let healer = in_hand(
            &mut state,
            PLAYER_ONE,
            unit(
                UnitType::Archer,
                1,
                1,
                1,
                vec![CardEffect::battlecry(BattlecryEffect::HealTarget { amount: 3 })],
            ),
        );
        engine
            .apply(&mut state, Action::PlayCard { player: PLAYER_ONE, card_id: healer })
            .expect("play healer");
        assert_eq!(state.players[0].hp, 33);
    }
}
