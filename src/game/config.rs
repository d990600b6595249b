use serde::{Deserialize, Serialize};

/// Tunable constants for one match.
///
/// Every field has a default, so a partial JSON document only overrides what
/// it names.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MatchRules {
    pub starting_hp: i16,
    pub starting_mana: u8,
    pub max_mana: u8,
    pub opening_hand: u8,
    pub deck_size: usize,
    pub min_hero_powers: usize,
    pub max_hero_powers: usize,
    pub passive_skill_count: usize,
    /// Shuffle a player-chosen deck at game start instead of keeping pick order.
    pub shuffle_selected_deck: bool,
    pub min_minion_cost: u8,
    pub min_hero_power_cost: u8,
    pub attack_animation_ms: u32,
}

impl Default for MatchRules {
    fn default() -> Self {
        Self {
            starting_hp: 30,
            starting_mana: 1,
            max_mana: 10,
            opening_hand: 3,
            deck_size: 15,
            min_hero_powers: 2,
            max_hero_powers: 4,
            passive_skill_count: 3,
            shuffle_selected_deck: true,
            min_minion_cost: 1,
            min_hero_power_cost: 0,
            attack_animation_ms: 700,
        }
    }
}

impl MatchRules {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
