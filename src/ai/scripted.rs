use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::{
    legal_targets, opponent, Action, GamePhase, GameState, InstanceId, PlayerId, RuleEngine,
    RuleError, TargetRef, PLAYER_TWO,
};
use crate::utils::CancellationToken;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" | "medium" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// Pacing and greed of the scripted opponent. Each delay is how long the
/// script pauses after the step it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptConfig {
    pub max_plays: usize,
    pub opening_delay: Duration,
    pub play_delay: Duration,
    pub pre_attack_delay: Duration,
    pub attack_delay: Duration,
    pub end_turn_delay: Duration,
}

impl ScriptConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        match difficulty {
            AiDifficulty::Easy => Self {
                max_plays: 1,
                opening_delay: Duration::from_millis(1000),
                play_delay: Duration::from_millis(800),
                pre_attack_delay: Duration::from_millis(700),
                attack_delay: Duration::from_millis(500),
                end_turn_delay: Duration::from_millis(800),
            },
            AiDifficulty::Normal => Self {
                max_plays: 2,
                opening_delay: Duration::from_millis(800),
                play_delay: Duration::from_millis(600),
                pre_attack_delay: Duration::from_millis(500),
                attack_delay: Duration::from_millis(400),
                end_turn_delay: Duration::from_millis(600),
            },
            AiDifficulty::Hard => Self {
                max_plays: 3,
                opening_delay: Duration::from_millis(500),
                play_delay: Duration::from_millis(400),
                pre_attack_delay: Duration::from_millis(300),
                attack_delay: Duration::from_millis(300),
                end_turn_delay: Duration::from_millis(400),
            },
        }
    }
}

impl Default for ScriptConfig {
    fn default() -> Self {
        ScriptConfig::from_difficulty(AiDifficulty::Normal)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Nothing to do yet; ask again after the pause.
    Wait(Duration),
    /// Dispatch `action` now, then pause for `delay`.
    Dispatch { delay: Duration, action: Action },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Claim,
    Play { played: usize },
    Attack,
    EndTurn,
    Release,
    Done,
}

/// One scripted turn: claim the turn, play the priciest affordable cards,
/// attack with everything that can, end the turn.
///
/// The script never caches board state. Each call to [`OpponentScript::next_step`]
/// looks at the state as it is now, so actions that were rejected or that
/// changed the board are accounted for on the next step.
pub struct OpponentScript {
    player: PlayerId,
    config: ScriptConfig,
    cancel: CancellationToken,
    stage: Stage,
    attacked: HashSet<InstanceId>,
}

impl OpponentScript {
    pub fn new(player: PlayerId, config: ScriptConfig, cancel: CancellationToken) -> Self {
        Self {
            player,
            config,
            cancel,
            stage: Stage::Claim,
            attacked: HashSet::new(),
        }
    }

    /// Whether a run should start for `player` now. False while another run
    /// holds the turn.
    pub fn should_run(state: &GameState, player: PlayerId) -> bool {
        state.phase == GamePhase::Playing
            && state.turn == player
            && !state.ai_turn_processing
            && !state.is_finished()
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    pub fn next_step(&mut self, state: &GameState) -> Option<ScriptStep> {
        if self.cancel.is_cancelled() {
            self.stage = Stage::Done;
            return None;
        }

        if matches!(self.stage, Stage::Play { .. } | Stage::Attack | Stage::EndTurn)
            && (state.is_finished() || state.turn != self.player)
        {
            self.stage = Stage::Release;
        }

        match self.stage {
            Stage::Claim => {
                self.stage = Stage::Play { played: 0 };
                Some(ScriptStep::Dispatch {
                    delay: self.config.opening_delay,
                    action: Action::SetAiProcessing { active: true },
                })
            }
            Stage::Play { played } => {
                if let Some(ticket) = state.animation.ticket() {
                    tracing::trace!(ticket, "opponent waiting for animation");
                    return Some(ScriptStep::Wait(self.config.attack_delay));
                }
                let choice = if played < self.config.max_plays {
                    self.choose_card(state)
                } else {
                    None
                };
                match choice {
                    Some(card_id) => {
                        self.stage = Stage::Play { played: played + 1 };
                        Some(ScriptStep::Dispatch {
                            delay: self.config.play_delay,
                            action: Action::PlayCard {
                                player: self.player,
                                card_id,
                            },
                        })
                    }
                    None => {
                        self.stage = Stage::Attack;
                        Some(ScriptStep::Wait(self.config.pre_attack_delay))
                    }
                }
            }
            Stage::Attack => {
                if state.animation.is_pending() {
                    return Some(ScriptStep::Wait(self.config.attack_delay));
                }
                match self.choose_attack(state) {
                    Some(action) => Some(ScriptStep::Dispatch {
                        delay: self.config.attack_delay,
                        action,
                    }),
                    None => {
                        self.stage = Stage::EndTurn;
                        Some(ScriptStep::Wait(self.config.end_turn_delay))
                    }
                }
            }
            Stage::EndTurn => {
                if state.animation.is_pending() {
                    return Some(ScriptStep::Wait(self.config.attack_delay));
                }
                self.stage = Stage::Release;
                Some(ScriptStep::Dispatch {
                    delay: Duration::ZERO,
                    action: Action::EndTurn,
                })
            }
            Stage::Release => {
                self.stage = Stage::Done;
                Some(ScriptStep::Dispatch {
                    delay: Duration::ZERO,
                    action: Action::SetAiProcessing { active: false },
                })
            }
            Stage::Done => None,
        }
    }

    /// Most expensive affordable card, earliest in hand on ties.
    fn choose_card(&self, state: &GameState) -> Option<InstanceId> {
        let player = state.get_player(self.player)?;
        player
            .hand
            .iter()
            .map(|card| (card.id, player.minion_cost(&card.card, &state.rules)))
            .filter(|(_, cost)| *cost <= player.mana)
            .fold(None, |best: Option<(InstanceId, u8)>, (id, cost)| match best {
                Some((_, best_cost)) if best_cost >= cost => best,
                _ => Some((id, cost)),
            })
            .map(|(id, _)| id)
    }

    /// Next ready attacker against the weakest card it may legally hit, or
    /// the hero when no card is reachable.
    fn choose_attack(&mut self, state: &GameState) -> Option<Action> {
        let me = state.get_player(self.player)?;
        let enemy = state.get_player(opponent(self.player))?;

        loop {
            let attacker = me
                .field
                .iter()
                .find(|card| card.can_attack && !self.attacked.contains(&card.id))?;
            self.attacked.insert(attacker.id);

            let targets = legal_targets(attacker, enemy);
            let weakest = targets
                .iter()
                .filter_map(|target| match target {
                    TargetRef::Card { card_id, .. } => enemy.field.find(*card_id),
                    TargetRef::Hero { .. } => None,
                })
                .min_by_key(|card| card.defense())
                .map(|card| TargetRef::Card {
                    player: enemy.id,
                    card_id: card.id,
                });
            let hero = TargetRef::Hero { player: enemy.id };
            let target = weakest.or_else(|| targets.contains(&hero).then_some(hero));

            if let Some(target) = target {
                let damage = crate::game::strike_damage(attacker);
                return Some(Action::attack(self.player, attacker.id, target, damage));
            }
        }
    }

    /// Runs the whole script against `state` without pausing. Stops early if
    /// the script would wait on an animation nobody is going to finish.
    pub fn run_immediately(
        &mut self,
        engine: &mut RuleEngine,
        state: &mut GameState,
    ) -> Vec<Result<Action, RuleError>> {
        let mut log = Vec::new();
        while let Some(step) = self.next_step(state) {
            match step {
                ScriptStep::Dispatch { action, .. } => {
                    let result = engine.apply(state, action.clone()).map(|_| action);
                    log.push(result);
                }
                ScriptStep::Wait(_) if state.animation.is_pending() => break,
                ScriptStep::Wait(_) => {}
            }
        }
        log
    }
}

impl Default for OpponentScript {
    fn default() -> Self {
        OpponentScript::new(PLAYER_TWO, ScriptConfig::default(), CancellationToken::new())
    }
}
