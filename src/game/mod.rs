//! 游戏核心逻辑模块（状态机、规则引擎、战斗判定、动画编排等）。

pub mod catalog;
pub mod choreography;
pub mod combat;
pub mod config;
pub mod effects;
pub mod rules;
pub mod setup;
pub mod state;

pub use choreography::{
    AnimationRequest,
    AnimationSlot,
    Choreographer,
    GeometryProvider,
    GeometrySnapshot,
    Projectile,
    Rect,
    VisualHint,
};
pub use combat::{is_valid_target, legal_targets, plan_strike, strike_damage, StrikePlan};
pub use config::MatchRules;
pub use effects::{
    BattlecryEffect,
    CardEffect,
    DeathrattleEffect,
    EffectContext,
    EffectEngine,
    EffectStack,
    EffectTrigger,
    PassiveTrait,
};
pub use rules::{reduce, Action, RuleEngine, RuleError, RuleResolution};
pub use setup::{Loadout, SelectionKind};
pub use state::{
    opponent,
    CardDefinition,
    CardInstance,
    GameEvent,
    GamePhase,
    GameState,
    HeroPower,
    HeroPowerEffect,
    InstanceId,
    IntegrityError,
    Field,
    Lane,
    PassiveSkill,
    PlayerSelection,
    Player,
    PlayerId,
    SetupSelections,
    StatModifier,
    TargetRef,
    TargetingState,
    UnitType,
    VictoryReason,
    VictoryState,
    PLAYER_ONE,
    PLAYER_TWO,
};
