pub mod ai;
pub mod game;
pub mod utils;

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{AiDifficulty, OpponentScript, ScriptConfig, ScriptStep};
pub use game::{
    reduce, Action, AnimationRequest, CardDefinition, CardInstance, Choreographer, GameEvent,
    GamePhase, GameState, GeometryProvider, GeometrySnapshot, HeroPower, InstanceId,
    IntegrityError, MatchRules, PassiveSkill, Player, PlayerId, RuleEngine, RuleError,
    RuleResolution, TargetRef, VictoryReason, VictoryState, PLAYER_ONE, PLAYER_TWO,
};
use utils::{split_seed, CancellationToken};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    set_panic_hook();
}

fn to_js_error(error: RuleError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn make_resolution_json(resolution: &RuleResolution) -> Result<String, JsValue> {
    serde_json::to_string(resolution).map_err(serde_to_js_error)
}

fn entropy_seed() -> u64 {
    let mut buf = [0u8; 8];
    match getrandom::getrandom(&mut buf) {
        Ok(()) => u64::from_le_bytes(buf),
        Err(error) => {
            web_sys::console::warn_1(&format!("getrandom 不可用，改用时间作为种子: {error}").into());
            web_sys::js_sys::Date::now() as u64
        }
    }
}

fn millis(delay: Duration) -> u32 {
    u32::try_from(delay.as_millis()).unwrap_or(u32::MAX)
}

/// Puts a scripted attack through the choreographer so the opponent's strikes
/// are animated just like the player's. Anything else passes through.
fn stage_script_action(action: Action, state: &GameState, geometry: &GeometrySnapshot) -> Action {
    let (player, attacker_id, target) = match &action {
        Action::ApplyAttackDamage {
            player,
            attacker_id,
            target_id,
            target_is_hero,
            ..
        } => {
            let enemy = game::opponent(*player);
            let target = match target_id {
                Some(card_id) if !*target_is_hero => TargetRef::Card {
                    player: enemy,
                    card_id: *card_id,
                },
                _ => TargetRef::Hero { player: enemy },
            };
            (*player, *attacker_id, target)
        }
        _ => return action,
    };

    match Choreographer::new(geometry).stage_attack(state, player, attacker_id, target) {
        Ok(staged) => staged,
        Err(error) => {
            tracing::debug!(%error, "scripted attack could not be staged");
            action
        }
    }
}

#[derive(Serialize)]
struct OpponentRunReport {
    dispatched: usize,
    rejected: Vec<RuleError>,
    cancelled: bool,
}

/// One scheduled opponent turn. `claimed` is set while this run, and not
/// some other one, holds the processing flag.
struct OpponentRun {
    token: CancellationToken,
    claimed: Rc<Cell<bool>>,
}

impl OpponentRun {
    fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            claimed: Rc::new(Cell::new(false)),
        }
    }

    /// Stops the run and hands back the turn if this run still holds it.
    fn stop(self, engine: &RefCell<RuleEngine>, state: &RefCell<GameState>) {
        self.token.cancel();
        if !self.claimed.replace(false) || !state.borrow().ai_turn_processing {
            return;
        }
        let release = Action::SetAiProcessing { active: false };
        if let Err(error) = engine.borrow_mut().apply(&mut state.borrow_mut(), release) {
            tracing::debug!(%error, "could not release cancelled opponent run");
        }
    }
}

#[wasm_bindgen]
pub struct GameEngine {
    state: Rc<RefCell<GameState>>,
    engine: Rc<RefCell<RuleEngine>>,
    geometry: Rc<RefCell<GeometrySnapshot>>,
    seed_source: u64,
    opponent_run: Option<OpponentRun>,
}

#[wasm_bindgen]
impl GameEngine {
    /// `rules_json` overrides individual [`MatchRules`] fields; anything
    /// missing keeps its default.
    #[wasm_bindgen(constructor)]
    pub fn new(rules_json: Option<String>) -> Result<GameEngine, JsValue> {
        let rules = match rules_json {
            Some(json) => MatchRules::from_json(&json).map_err(serde_to_js_error)?,
            None => MatchRules::default(),
        };
        let mut seed_source = entropy_seed();
        let state = GameState::new(rules, split_seed(&mut seed_source));
        Ok(GameEngine {
            state: Rc::new(RefCell::new(state)),
            engine: Rc::new(RefCell::new(RuleEngine::new())),
            geometry: Rc::new(RefCell::new(GeometrySnapshot::default())),
            seed_source,
            opponent_run: None,
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&*self.state.borrow()).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        let state: GameState = serde_json::from_str(json).map_err(serde_to_js_error)?;
        state
            .integrity_check()
            .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
        self.cancel_opponent();
        *self.state.borrow_mut() = state;
        Ok(())
    }

    /// Applies one JSON-encoded action and returns the resulting snapshot
    /// plus the events it produced.
    pub fn dispatch_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: Action = serde_json::from_str(action_json).map_err(serde_to_js_error)?;
        self.dispatch(action)
    }

    pub fn dispatch_value(&mut self, action: JsValue) -> Result<JsValue, JsValue> {
        let action: Action = from_value(action).map_err(JsValue::from)?;
        let resolution = self.apply(action)?;
        to_value(&resolution).map_err(JsValue::from)
    }

    /// Starts a match from the hero power screen. Without an explicit seed
    /// one is drawn from the engine's entropy.
    pub fn start_game(&mut self, seed: Option<u64>) -> Result<String, JsValue> {
        let seed = seed.unwrap_or_else(|| split_seed(&mut self.seed_source));
        self.dispatch(Action::StartGame { seed })
    }

    pub fn restart_game(&mut self, seed: Option<u64>) -> Result<String, JsValue> {
        self.cancel_opponent();
        let seed = seed.unwrap_or_else(|| split_seed(&mut self.seed_source));
        self.dispatch(Action::RestartGame { seed })
    }

    /// Replaces the measured board layout used for staging attacks.
    pub fn update_geometry_json(&mut self, json: &str) -> Result<(), JsValue> {
        let snapshot: GeometrySnapshot = serde_json::from_str(json).map_err(serde_to_js_error)?;
        *self.geometry.borrow_mut() = snapshot;
        Ok(())
    }

    /// Returns the action that carries out the attack, as JSON, without
    /// applying it: an `INITIATE_ANIMATION` envelope when both endpoints are
    /// on screen, otherwise the bare `APPLY_ATTACK_DAMAGE`.
    pub fn stage_attack_json(
        &self,
        player: PlayerId,
        attacker_id: InstanceId,
        target_json: &str,
    ) -> Result<String, JsValue> {
        let target: TargetRef = serde_json::from_str(target_json).map_err(serde_to_js_error)?;
        let geometry = self.geometry.borrow();
        let action = Choreographer::new(&*geometry)
            .stage_attack(&self.state.borrow(), player, attacker_id, target)
            .map_err(to_js_error)?;
        serde_json::to_string(&action).map_err(serde_to_js_error)
    }

    pub fn stage_power_target_json(&self, target_json: &str) -> Result<String, JsValue> {
        let target: TargetRef = serde_json::from_str(target_json).map_err(serde_to_js_error)?;
        let geometry = self.geometry.borrow();
        let action = Choreographer::new(&*geometry)
            .stage_power_target(&self.state.borrow(), target)
            .map_err(to_js_error)?;
        serde_json::to_string(&action).map_err(serde_to_js_error)
    }

    /// Plays player two's turn on a timer. Resolves to a run report, or to
    /// `null` when no run was started because it is not the opponent's turn
    /// or another run already holds it.
    pub fn run_opponent_turn(&mut self, difficulty: Option<String>) -> Promise {
        if !OpponentScript::should_run(&self.state.borrow(), PLAYER_TWO) {
            return Promise::resolve(&JsValue::NULL);
        }
        self.cancel_opponent();

        let difficulty = difficulty
            .as_deref()
            .and_then(|value| AiDifficulty::from_str(value).ok())
            .unwrap_or(AiDifficulty::Normal);
        let run = OpponentRun::new();
        let token = run.token.clone();
        let claimed = Rc::clone(&run.claimed);
        self.opponent_run = Some(run);

        let config = ScriptConfig::from_difficulty(difficulty);
        let mut script = OpponentScript::new(PLAYER_TWO, config, token.clone());
        let state = Rc::clone(&self.state);
        let engine = Rc::clone(&self.engine);
        let geometry = Rc::clone(&self.geometry);

        future_to_promise(async move {
            let mut report = OpponentRunReport {
                dispatched: 0,
                rejected: Vec::new(),
                cancelled: false,
            };
            loop {
                let step = script.next_step(&state.borrow());
                let pause = match step {
                    None => break,
                    Some(ScriptStep::Wait(delay)) => delay,
                    Some(ScriptStep::Dispatch { delay, action }) => {
                        let action =
                            stage_script_action(action, &state.borrow(), &geometry.borrow());
                        let claim = match &action {
                            Action::SetAiProcessing { active } => Some(*active),
                            _ => None,
                        };
                        let result = engine.borrow_mut().apply(&mut state.borrow_mut(), action);
                        match result {
                            Ok(_) => {
                                if let Some(active) = claim {
                                    claimed.set(active);
                                }
                                report.dispatched += 1;
                            }
                            Err(error) => {
                                web_sys::console::warn_1(&format!("电脑对手的行动被拒绝: {error}").into());
                                report.rejected.push(error);
                            }
                        }
                        delay
                    }
                };
                TimeoutFuture::new(millis(pause)).await;
            }

            report.cancelled = token.is_cancelled();
            to_value(&report).map_err(JsValue::from)
        })
    }

    pub fn cancel_opponent(&mut self) {
        if let Some(run) = self.opponent_run.take() {
            run.stop(&self.engine, &self.state);
        }
    }
}

impl GameEngine {
    fn apply(&mut self, action: Action) -> Result<RuleResolution, JsValue> {
        let mut engine = self.engine.borrow_mut();
        let mut state = self.state.borrow_mut();
        let events = engine.apply(&mut state, action).map_err(to_js_error)?;
        Ok(RuleResolution::new(state.clone(), events))
    }

    fn dispatch(&mut self, action: Action) -> Result<String, JsValue> {
        let resolution = self.apply(action)?;
        if let Some(victory) = &resolution.victory {
            let message = format!("玩家 {} 获胜 ({:?})", victory.winner, victory.reason);
            web_sys::console::log_1(&message.into());
        }
        make_resolution_json(&resolution)
    }
}

impl Drop for GameEngine {
    fn drop(&mut self) {
        self.cancel_opponent();
    }
}

/// Returns a fresh state in the start menu, for debugging or initialisation.
#[wasm_bindgen(js_name = "createGameState")]
pub fn create_game_state(seed: u64) -> Result<JsValue, JsValue> {
    to_value(&GameState::new(MatchRules::default(), seed)).map_err(JsValue::from)
}

/// Total reducer over `JsValue`s: a rejected action yields the input state.
#[wasm_bindgen(js_name = "reduce")]
pub fn reduce_value(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: Action = from_value(action).map_err(JsValue::from)?;
    to_value(&reduce(&state, action)).map_err(JsValue::from)
}

/// Strict reducer: returns the resolution or the rejection reason.
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    let action: Action = from_value(action).map_err(JsValue::from)?;
    let mut engine = RuleEngine::new();
    match engine.resolve(&state, action) {
        Ok(resolution) => to_value(&resolution).map_err(JsValue::from),
        Err(error) => Err(to_js_error(error)),
    }
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: GameState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_js_error(RuleError::IntegrityViolation { error }))?;
    Ok(())
}

#[derive(Serialize)]
struct CatalogView {
    cards: &'static [CardDefinition],
    hero_powers: &'static [HeroPower],
    passive_skills: &'static [PassiveSkill],
}

/// Everything `player` can pick from on the setup screens.
#[wasm_bindgen(js_name = "catalog")]
pub fn catalog(player: PlayerId) -> Result<JsValue, JsValue> {
    let view = CatalogView {
        cards: game::catalog::card_pool(player),
        hero_powers: game::catalog::hero_power_pool(player),
        passive_skills: game::catalog::passive_skill_pool(player),
    };
    to_value(&view).map_err(JsValue::from)
}

#[cfg(feature = "console_error_panic_hook")]
fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
fn set_panic_hook() {}


#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn phase_of(json: &str) -> serde_json::Value {
        let value: serde_json::Value = serde_json::from_str(json).expect("resolution json");
        value["state"]["phase"].clone()
    }

    #[wasm_bindgen_test]
    fn dispatch_json_walks_the_setup_screens() {
        let mut engine = GameEngine::new(None).expect("default rules");
        let resolution = engine
            .dispatch_json(r#"{"type":"GO_TO_PASSIVE_SKILLS"}"#)
            .expect("menu to passives");
        assert_eq!(phase_of(&resolution), "PassiveSkills");

        let resolution = engine
            .dispatch_json(r#"{"type":"GO_TO_START_MENU"}"#)
            .expect("back to menu");
        assert_eq!(phase_of(&resolution), "StartMenu");
    }

    #[wasm_bindgen_test]
    fn dispatch_json_rejects_gameplay_in_the_menu() {
        let mut engine = GameEngine::new(None).expect("default rules");
        let before = engine.state_json().expect("state");
        assert!(engine.dispatch_json(r#"{"type":"END_TURN"}"#).is_err());
        assert!(engine.dispatch_json("not json").is_err());
        assert_eq!(engine.state_json().expect("state"), before);
    }
}
