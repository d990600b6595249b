//! AI 模块：按固定脚本行动的电脑对手。

pub mod scripted;

pub use scripted::{AiDifficulty, OpponentScript, ScriptConfig, ScriptStep};
