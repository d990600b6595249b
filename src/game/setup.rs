//! Pre-match flow: selection screens, validation and the opening deal.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::catalog;
use super::config::MatchRules;
use super::rules::RuleError;
use super::state::{
    CardDefinition, GameEvent, GamePhase, GameState, HeroPower, Lane, PassiveSkill, Player,
    PlayerId, PlayerSelection, StatModifier, PLAYER_ONE, PLAYER_TWO,
};
use crate::utils::shuffle_seeded;

/// Which setup screen a selection belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SelectionKind {
    Deck,
    HeroPowers,
    PassiveSkills,
}

/// Everything a player brings into a match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loadout {
    pub deck: Vec<CardDefinition>,
    pub hero_powers: Vec<HeroPower>,
    pub passive_skills: Vec<PassiveSkill>,
}

fn ensure_pre_match(state: &GameState) -> Result<(), RuleError> {
    if state.phase == GamePhase::Playing {
        return Err(RuleError::InvalidPhase {
            expected: GamePhase::HeroPowerOptions,
            actual: state.phase,
        });
    }
    Ok(())
}

fn ensure_known(player: PlayerId, kind: SelectionKind, id: &str) -> Result<(), RuleError> {
    let known = match kind {
        SelectionKind::Deck => catalog::find_card(player, id).is_some(),
        SelectionKind::HeroPowers => catalog::find_hero_power(player, id).is_some(),
        SelectionKind::PassiveSkills => catalog::find_passive(player, id).is_some(),
    };
    if known {
        Ok(())
    } else {
        Err(RuleError::UnknownSelection {
            selection: kind,
            id: id.to_string(),
        })
    }
}

/// Replaces one of `player`'s selections. Ids must exist in that player's
/// pools; hero powers and passives may not repeat, deck cards may.
pub fn set_selection(
    state: &mut GameState,
    player: PlayerId,
    kind: SelectionKind,
    ids: Vec<String>,
) -> Result<(), RuleError> {
    ensure_pre_match(state)?;
    if state.get_player(player).is_none() {
        return Err(RuleError::PlayerNotFound { player_id: player });
    }

    let mut seen = HashSet::new();
    for id in &ids {
        ensure_known(player, kind, id)?;
        if kind != SelectionKind::Deck && !seen.insert(id.as_str()) {
            return Err(RuleError::DuplicateSelection {
                selection: kind,
                id: id.clone(),
            });
        }
    }

    let limit = match kind {
        SelectionKind::Deck => state.rules.deck_size,
        SelectionKind::HeroPowers => state.rules.max_hero_powers,
        SelectionKind::PassiveSkills => state.rules.passive_skill_count,
    };
    if ids.len() > limit {
        return Err(RuleError::TooManySelected {
            selection: kind,
            max: limit,
            selected: ids.len(),
        });
    }

    let selection = state.setup.for_player_mut(player);
    match kind {
        SelectionKind::Deck => selection.deck = ids,
        SelectionKind::HeroPowers => selection.hero_powers = ids,
        SelectionKind::PassiveSkills => selection.passive_skills = ids,
    }
    Ok(())
}

fn ensure_count(
    kind: SelectionKind,
    selected: usize,
    min: usize,
    max: usize,
) -> Result<(), RuleError> {
    if selected < min || selected > max {
        return Err(RuleError::SetupIncomplete {
            selection: kind,
            required: min,
            selected,
        });
    }
    Ok(())
}

fn check_passives(selection: &PlayerSelection, rules: &MatchRules) -> Result<(), RuleError> {
    let count = rules.passive_skill_count;
    ensure_count(SelectionKind::PassiveSkills, selection.passive_skills.len(), count, count)
}

fn check_deck(selection: &PlayerSelection, rules: &MatchRules) -> Result<(), RuleError> {
    ensure_count(SelectionKind::Deck, selection.deck.len(), rules.deck_size, rules.deck_size)
}

fn check_hero_powers(selection: &PlayerSelection, rules: &MatchRules) -> Result<(), RuleError> {
    ensure_count(
        SelectionKind::HeroPowers,
        selection.hero_powers.len(),
        rules.min_hero_powers,
        rules.max_hero_powers,
    )
}

/// Moves between setup screens. Moving forward requires the human player's
/// selections for every screen being left behind; moving back is free.
/// Going to the start menu from a match abandons it.
pub fn go_to(state: &mut GameState, target: GamePhase) -> Result<Vec<GameEvent>, RuleError> {
    match target {
        GamePhase::StartMenu => {
            if state.phase == GamePhase::Playing {
                let mut fresh = GameState::new(state.rules.clone(), state.rng_state);
                fresh.setup = std::mem::take(&mut state.setup);
                fresh.next_animation_ticket = state.next_animation_ticket;
                *state = fresh;
            }
        }
        GamePhase::PassiveSkills => ensure_pre_match(state)?,
        GamePhase::Setup => {
            ensure_pre_match(state)?;
            check_passives(&state.setup.player_one, &state.rules)?;
        }
        GamePhase::HeroPowerOptions => {
            ensure_pre_match(state)?;
            check_passives(&state.setup.player_one, &state.rules)?;
            check_deck(&state.setup.player_one, &state.rules)?;
        }
        GamePhase::Playing => {
            return Err(RuleError::InvalidPhase {
                expected: GamePhase::HeroPowerOptions,
                actual: state.phase,
            })
        }
    }

    tracing::debug!(from = ?state.phase, to = ?target, "setup phase change");
    state.phase = target;
    Ok(vec![GameEvent::PhaseChanged { phase: target }])
}

fn resolve<T>(
    ids: &[String],
    kind: SelectionKind,
    lookup: impl Fn(&str) -> Option<&'static T>,
) -> Result<Vec<T>, RuleError>
where
    T: Clone + 'static,
{
    ids.iter()
        .map(|id| {
            lookup(id).cloned().ok_or_else(|| RuleError::UnknownSelection {
                selection: kind,
                id: id.clone(),
            })
        })
        .collect()
}

/// Turns a validated selection into concrete catalog entries.
pub fn loadout_from_selection(
    player: PlayerId,
    selection: &PlayerSelection,
    rules: &MatchRules,
) -> Result<Loadout, RuleError> {
    check_passives(selection, rules)?;
    check_deck(selection, rules)?;
    check_hero_powers(selection, rules)?;

    Ok(Loadout {
        deck: resolve(&selection.deck, SelectionKind::Deck, |id| catalog::find_card(player, id))?,
        hero_powers: resolve(&selection.hero_powers, SelectionKind::HeroPowers, |id| {
            catalog::find_hero_power(player, id)
        })?,
        passive_skills: resolve(&selection.passive_skills, SelectionKind::PassiveSkills, |id| {
            catalog::find_passive(player, id)
        })?,
    })
}

/// Loadout for a seat nobody configured: the pool cycled up to deck size,
/// the first hero powers of the pool and no passives.
pub fn default_loadout(player: PlayerId, rules: &MatchRules) -> Loadout {
    let pool = catalog::card_pool(player);
    let deck = pool.iter().cycle().take(rules.deck_size).cloned().collect();
    let hero_powers = catalog::hero_power_pool(player)
        .iter()
        .take(rules.min_hero_powers)
        .cloned()
        .collect();
    Loadout {
        deck,
        hero_powers,
        passive_skills: Vec::new(),
    }
}

/// The opponent seat takes the default for every screen left empty.
fn opponent_loadout(selection: &PlayerSelection, rules: &MatchRules) -> Result<Loadout, RuleError> {
    let fallback = default_loadout(PLAYER_TWO, rules);

    let deck = if selection.deck.is_empty() {
        fallback.deck
    } else {
        check_deck(selection, rules)?;
        resolve(&selection.deck, SelectionKind::Deck, |id| catalog::find_card(PLAYER_TWO, id))?
    };
    let hero_powers = if selection.hero_powers.is_empty() {
        fallback.hero_powers
    } else {
        check_hero_powers(selection, rules)?;
        resolve(&selection.hero_powers, SelectionKind::HeroPowers, |id| {
            catalog::find_hero_power(PLAYER_TWO, id)
        })?
    };
    let passive_skills = if selection.passive_skills.is_empty() {
        fallback.passive_skills
    } else {
        check_passives(selection, rules)?;
        resolve(&selection.passive_skills, SelectionKind::PassiveSkills, |id| {
            catalog::find_passive(PLAYER_TWO, id)
        })?
    };

    Ok(Loadout {
        deck,
        hero_powers,
        passive_skills,
    })
}

/// Bakes unit stat passives into the deck so every drawn copy carries them.
pub fn bake_passives(deck: &mut [CardDefinition], passives: &[PassiveSkill]) {
    for skill in passives {
        for card in deck.iter_mut() {
            match skill.modifier {
                StatModifier::Defense(amount) => card.defense += amount,
                StatModifier::Attack(amount) => card.attack += amount,
                StatModifier::RangedAttack(amount) if card.lane() == Lane::Ranged => {
                    card.attack += amount
                }
                _ => {}
            }
        }
    }
}

fn seat_player(
    id: PlayerId,
    loadout: Loadout,
    rules: &MatchRules,
    shuffle: bool,
    rng: &mut u64,
) -> Player {
    let Loadout {
        mut deck,
        hero_powers,
        passive_skills,
    } = loadout;
    bake_passives(&mut deck, &passive_skills);
    if shuffle {
        shuffle_seeded(&mut deck, rng);
    }

    let mut player = Player::new(id, rules);
    for modifier in passive_skills.iter().map(|skill| skill.modifier) {
        match modifier {
            StatModifier::StartingHp(amount) => player.hp = player.hp.saturating_add(amount),
            StatModifier::StartingArmor(amount) => {
                player.armor = player.armor.saturating_add(amount)
            }
            StatModifier::MaxMana(amount) => {
                player.max_mana = player.max_mana.saturating_add(amount).min(rules.max_mana)
            }
            _ => {}
        }
    }
    player.mana = player.max_mana;
    player.deck = deck;
    player.hero_powers = hero_powers;
    player.passive_skills = passive_skills;
    player
}

fn opening_hand_size(player: &Player, rules: &MatchRules) -> u8 {
    let bonus: u8 = player
        .modifiers()
        .filter_map(|modifier| match modifier {
            StatModifier::StartingHand(amount) => Some(amount),
            _ => None,
        })
        .sum();
    rules.opening_hand.saturating_add(bonus)
}

/// Seats both players from the current selections and deals opening hands.
/// Player one always moves first.
pub fn start_match(state: &mut GameState, seed: u64) -> Result<Vec<GameEvent>, RuleError> {
    if state.phase != GamePhase::HeroPowerOptions {
        return Err(RuleError::InvalidPhase {
            expected: GamePhase::HeroPowerOptions,
            actual: state.phase,
        });
    }
    deal(state, seed)
}

/// Same selections, fresh match. Valid from any phase once the selections
/// are complete.
pub fn restart_match(state: &mut GameState, seed: u64) -> Result<Vec<GameEvent>, RuleError> {
    deal(state, seed)
}

fn deal(state: &mut GameState, seed: u64) -> Result<Vec<GameEvent>, RuleError> {
    let rules = state.rules.clone();
    let human = loadout_from_selection(PLAYER_ONE, &state.setup.player_one, &rules)?;
    let computer = opponent_loadout(&state.setup.player_two, &rules)?;

    let mut fresh = GameState::new(rules.clone(), seed);
    fresh.setup = state.setup.clone();
    // tickets stay monotonic across matches
    fresh.next_animation_ticket = state.next_animation_ticket;
    let mut rng = fresh.rng_state;
    fresh.players = vec![
        seat_player(PLAYER_ONE, human, &rules, rules.shuffle_selected_deck, &mut rng),
        seat_player(PLAYER_TWO, computer, &rules, true, &mut rng),
    ];
    fresh.rng_state = rng;
    fresh.phase = GamePhase::Playing;

    let mut events = vec![
        GameEvent::PhaseChanged {
            phase: GamePhase::Playing,
        },
        GameEvent::GameStarted {
            first_player: PLAYER_ONE,
        },
    ];
    for id in [PLAYER_ONE, PLAYER_TWO] {
        let count = fresh
            .get_player(id)
            .map(|player| opening_hand_size(player, &rules))
            .unwrap_or(rules.opening_hand);
        events.extend(fresh.draw_cards(id, count));
    }

    tracing::info!(seed, "match started");
    *state = fresh;
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn complete_selection(state: &mut GameState) {
        set_selection(
            state,
            PLAYER_ONE,
            SelectionKind::PassiveSkills,
            ids(&["passive_hp_boost", "passive_armor_start", "passive_card_draw"]),
        )
        .expect("passives");
        let deck = vec!["p1_001".to_string(); 15];
        set_selection(state, PLAYER_ONE, SelectionKind::Deck, deck).expect("deck");
        let powers = ids(&["p1_fireblast", "p1_armor"]);
        set_selection(state, PLAYER_ONE, SelectionKind::HeroPowers, powers).expect("powers");
    }

    #[test]
    fn forward_moves_require_finished_screens() {
        let mut state = GameState::default();
        go_to(&mut state, GamePhase::PassiveSkills).expect("menu to passives");
        assert!(matches!(
            go_to(&mut state, GamePhase::Setup),
            Err(RuleError::SetupIncomplete {
                selection: SelectionKind::PassiveSkills,
                required: 3,
                selected: 0,
            })
        ));

        complete_selection(&mut state);
        go_to(&mut state, GamePhase::Setup).expect("passives chosen");
        go_to(&mut state, GamePhase::HeroPowerOptions).expect("deck chosen");
        assert_eq!(state.phase, GamePhase::HeroPowerOptions);
        go_to(&mut state, GamePhase::PassiveSkills).expect("going back is free");
    }

    #[test]
    fn rejects_unknown_and_repeated_selections() {
        let mut state = GameState::default();
        assert!(matches!(
            set_selection(&mut state, PLAYER_ONE, SelectionKind::Deck, ids(&["p2_001"])),
            Err(RuleError::UnknownSelection { .. })
        ));
        assert!(matches!(
            set_selection(
                &mut state,
                PLAYER_ONE,
                SelectionKind::HeroPowers,
                ids(&["p1_heal", "p1_heal"])
            ),
            Err(RuleError::DuplicateSelection { .. })
        ));
        assert!(state.setup.player_one.hero_powers.is_empty());
    }

    #[test]
    fn start_applies_passives_and_deals_opening_hands() {
        let mut state = GameState::default();
        complete_selection(&mut state);
        state.phase = GamePhase::HeroPowerOptions;

        let events = start_match(&mut state, 7).expect("complete selections");
        assert_eq!(state.phase, GamePhase::Playing);
        assert!(events.contains(&GameEvent::GameStarted { first_player: PLAYER_ONE }));

        let human = state.get_player(PLAYER_ONE).expect("player one");
        assert_eq!(human.armor, 10);
        assert_eq!(human.hand.len(), 6);
        assert_eq!(human.deck.len(), 9);
        assert!(human.hand.iter().all(|card| card.defense() == 5));
        assert_eq!(human.hero_powers.len(), 2);

        let computer = state.get_player(PLAYER_TWO).expect("player two");
        assert_eq!(computer.hand.len(), 3);
        assert_eq!(computer.deck.len(), 12);
        assert_eq!(computer.hero_powers.len(), 2);
        assert!(computer.passive_skills.is_empty());
        assert!(state.integrity_check().is_ok());
    }

    #[test]
    fn same_seed_deals_the_same_cards() {
        let mut first = GameState::default();
        complete_selection(&mut first);
        let mut second = first.clone();

        restart_match(&mut first, 99).expect("restart");
        restart_match(&mut second, 99).expect("restart");
        assert_eq!(first, second);
    }

    #[test]
    fn default_loadout_cycles_the_pool() {
        let rules = MatchRules {
            deck_size: 35,
            ..MatchRules::default()
        };
        let loadout = default_loadout(PLAYER_TWO, &rules);
        assert_eq!(loadout.deck.len(), 35);
        assert_eq!(loadout.deck[30].card_id, loadout.deck[0].card_id);
        assert_eq!(loadout.hero_powers.len(), rules.min_hero_powers);
    }
}
