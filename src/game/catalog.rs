//! Static card, hero power and passive skill definitions.

use once_cell::sync::Lazy;

use super::effects::{BattlecryEffect, CardEffect, DeathrattleEffect, PassiveTrait};
use super::state::{
    CardDefinition, HeroPower, HeroPowerEffect, PassiveSkill, PlayerId, StatModifier, UnitType,
    PLAYER_ONE,
};

const DAMAGE_ALL: CardEffect =
    CardEffect::battlecry(BattlecryEffect::DamageAllEnemies { amount: 1 });
const HEAL: CardEffect = CardEffect::battlecry(BattlecryEffect::HealTarget { amount: 3 });
const DRAW: CardEffect = CardEffect::battlecry(BattlecryEffect::DrawCard { count: 1 });
const BUFF: CardEffect = CardEffect::battlecry(BattlecryEffect::BuffAllAllies { amount: 1 });
const SHIELD: CardEffect = CardEffect::passive(PassiveTrait::ImmuneFirstTurn);
const TAUNT: CardEffect = CardEffect::passive(PassiveTrait::Taunt);
const CHARGE: CardEffect = CardEffect::passive(PassiveTrait::Charge);
const LIFESTEAL: CardEffect = CardEffect::passive(PassiveTrait::Lifesteal);
const DEATHRATTLE: CardEffect =
    CardEffect::deathrattle(DeathrattleEffect::DamageRandomEnemy { amount: 2 });

#[allow(clippy::too_many_arguments)]
fn card(
    id: &str,
    name: &str,
    unit: UnitType,
    cost: u8,
    attack: i16,
    defense: i16,
    heal_value: Option<i16>,
    effects: &[CardEffect],
) -> CardDefinition {
    let mut def =
        CardDefinition::new(id, name, unit, cost, attack, defense).with_effects(effects.to_vec());
    def.heal_value = heal_value;
    def
}

static PLAYER_ONE_CARDS: Lazy<Vec<CardDefinition>> = Lazy::new(|| {
    vec![
        card("p1_001", "Squire", UnitType::Warrior, 1, 1, 3, None, &[]),
        card("p1_002", "Novice Archer", UnitType::Archer, 1, 2, 1, None, &[]),
        card("p1_003", "Acolyte", UnitType::Cleric, 1, 0, 2, Some(2), &[HEAL]),
        card("p1_004", "Pikeman", UnitType::Warrior, 2, 3, 2, None, &[]),
        card("p1_005", "Crossbowman", UnitType::Archer, 2, 3, 2, None, &[]),
        card("p1_006", "Knight", UnitType::Warrior, 3, 3, 4, None, &[CHARGE]),
        card("p1_007", "Warden", UnitType::Warrior, 3, 2, 5, None, &[TAUNT]),
        card("p1_008", "Elite Marksman", UnitType::Archer, 3, 4, 2, None, &[DAMAGE_ALL]),
        card("p1_009", "Healer", UnitType::Cleric, 3, 0, 4, Some(3), &[HEAL]),
        card("p1_010", "Paladin", UnitType::Warrior, 4, 4, 5, None, &[SHIELD]),
        card("p1_011", "Hunter", UnitType::Archer, 4, 5, 3, None, &[LIFESTEAL]),
        card("p1_012", "Priest", UnitType::Cleric, 4, 0, 5, Some(4), &[DRAW]),
        card("p1_013", "Captain", UnitType::Warrior, 5, 4, 6, None, &[BUFF]),
        card("p1_014", "War Mage", UnitType::Archer, 5, 6, 4, None, &[DEATHRATTLE]),
        card("p1_015", "Bishop", UnitType::Cleric, 5, 0, 6, Some(4), &[TAUNT]),
        card("p1_016", "Champion", UnitType::Warrior, 6, 6, 6, None, &[CHARGE]),
        card("p1_017", "Archmage", UnitType::Archer, 6, 7, 5, None, &[SHIELD]),
        card("p1_018", "High Priest", UnitType::Cleric, 6, 0, 7, Some(5), &[HEAL]),
        card("p1_019", "General", UnitType::Warrior, 7, 7, 7, None, &[TAUNT, BUFF]),
        card("p1_020", "Summoner", UnitType::Archer, 7, 6, 6, None, &[DRAW]),
        card("p1_021", "Archcleric", UnitType::Cleric, 7, 0, 8, Some(6), &[SHIELD]),
        card("p1_022", "Commander", UnitType::Warrior, 8, 8, 7, None, &[CHARGE, LIFESTEAL]),
        card("p1_023", "Dragon", UnitType::Archer, 8, 9, 8, None, &[DAMAGE_ALL]),
        card("p1_024", "Golden Titan", UnitType::Warrior, 9, 9, 9, None, &[TAUNT, SHIELD]),
        card("p1_025", "Phoenix", UnitType::Archer, 9, 10, 7, None, &[DEATHRATTLE, LIFESTEAL]),
        card("p1_026", "Guardian Angel", UnitType::Cleric, 9, 0, 10, Some(8), &[TAUNT, HEAL]),
        card(
            "p1_027",
            "Legendary King",
            UnitType::Warrior,
            10,
            10,
            10,
            None,
            &[CHARGE, TAUNT, BUFF],
        ),
        card("p1_028", "Divine Archer", UnitType::Archer, 10, 12, 8, None, &[CHARGE, DAMAGE_ALL]),
        card("p1_029", "Oracle", UnitType::Cleric, 8, 0, 8, Some(7), &[DRAW, HEAL]),
        card("p1_030", "Berserker", UnitType::Warrior, 5, 7, 3, None, &[CHARGE, DEATHRATTLE]),
    ]
});

static PLAYER_TWO_CARDS: Lazy<Vec<CardDefinition>> = Lazy::new(|| {
    vec![
        card("p2_001", "Skeleton", UnitType::Warrior, 1, 1, 2, None, &[]),
        card("p2_002", "Dart Thrower", UnitType::Archer, 1, 2, 1, None, &[]),
        card("p2_003", "Vampire", UnitType::Cleric, 1, 0, 2, Some(2), &[HEAL]),
        card("p2_004", "Zombie", UnitType::Warrior, 2, 2, 3, None, &[]),
        card("p2_005", "Giant Spider", UnitType::Archer, 2, 3, 2, None, &[]),
        card("p2_006", "Orc Warrior", UnitType::Warrior, 3, 3, 4, None, &[CHARGE]),
        card("p2_007", "Golem", UnitType::Warrior, 3, 2, 5, None, &[TAUNT]),
        card("p2_008", "Necromancer", UnitType::Cleric, 3, 0, 4, Some(3), &[HEAL]),
        card("p2_009", "Lich", UnitType::Cleric, 4, 0, 5, Some(4), &[HEAL]),
        card("p2_010", "Dark Knight", UnitType::Warrior, 4, 4, 5, None, &[SHIELD]),
        card("p2_011", "Sorcerer", UnitType::Archer, 4, 5, 3, None, &[LIFESTEAL]),
        card("p2_012", "Warlock", UnitType::Cleric, 4, 0, 5, Some(4), &[DRAW]),
        card("p2_013", "Orc Lord", UnitType::Warrior, 5, 4, 6, None, &[BUFF]),
        card("p2_014", "Devourer", UnitType::Archer, 5, 6, 4, None, &[DEATHRATTLE]),
        card("p2_015", "High Warlock", UnitType::Cleric, 5, 0, 6, Some(4), &[TAUNT]),
        card("p2_016", "Abomination", UnitType::Warrior, 6, 6, 6, None, &[CHARGE]),
        card("p2_017", "Demon", UnitType::Archer, 6, 7, 5, None, &[SHIELD]),
        card("p2_018", "Arch-Lich", UnitType::Cleric, 6, 0, 7, Some(5), &[HEAL]),
        card("p2_019", "Undead General", UnitType::Warrior, 7, 7, 7, None, &[TAUNT, BUFF]),
        card("p2_020", "Shadow Summoner", UnitType::Archer, 7, 6, 6, None, &[DRAW]),
        card("p2_021", "Gargoyle", UnitType::Warrior, 7, 6, 8, None, &[SHIELD]),
        card("p2_022", "Shadow Lord", UnitType::Warrior, 8, 8, 7, None, &[CHARGE, LIFESTEAL]),
        card("p2_023", "Black Dragon", UnitType::Archer, 8, 9, 8, None, &[DAMAGE_ALL]),
        card("p2_024", "Titan of Darkness", UnitType::Warrior, 9, 9, 9, None, &[TAUNT, SHIELD]),
        card("p2_025", "Hydra", UnitType::Archer, 9, 10, 7, None, &[DEATHRATTLE, LIFESTEAL]),
        card("p2_026", "Fallen Angel", UnitType::Cleric, 9, 0, 10, Some(8), &[TAUNT, HEAL]),
        card("p2_027", "Lich King", UnitType::Warrior, 10, 10, 10, None, &[CHARGE, TAUNT, BUFF]),
        card(
            "p2_028",
            "Archer of Darkness",
            UnitType::Archer,
            10,
            12,
            8,
            None,
            &[CHARGE, DAMAGE_ALL],
        ),
        card("p2_029", "Dark Oracle", UnitType::Cleric, 8, 0, 8, Some(7), &[DRAW, HEAL]),
        card("p2_030", "Destroyer", UnitType::Warrior, 5, 7, 3, None, &[CHARGE, DEATHRATTLE]),
    ]
});

fn power(
    id: &str,
    name: &str,
    cost: u8,
    effect: HeroPowerEffect,
    amount: i16,
    requires_target: bool,
) -> HeroPower {
    HeroPower {
        id: id.into(),
        name: name.into(),
        cost,
        effect,
        amount,
        requires_target,
    }
}

static PLAYER_ONE_POWERS: Lazy<Vec<HeroPower>> = Lazy::new(|| {
    vec![
        power("p1_fireblast", "Fireblast", 1, HeroPowerEffect::Damage, 2, true),
        power("p1_heal", "Divine Heal", 1, HeroPowerEffect::Heal, 2, false),
        power("p1_armor", "Fortify", 1, HeroPowerEffect::Armor, 2, false),
        power("p1_draw", "Focus", 1, HeroPowerEffect::Draw, 1, false),
    ]
});

static PLAYER_TWO_POWERS: Lazy<Vec<HeroPower>> = Lazy::new(|| {
    vec![
        power("p2_shadow", "Shadow Bolt", 2, HeroPowerEffect::Damage, 2, true),
        power("p2_lifedrain", "Life Drain", 3, HeroPowerEffect::Heal, 3, false),
        power("p2_curse", "Curse", 1, HeroPowerEffect::Damage, 1, true),
        power("p2_summon", "Summon", 2, HeroPowerEffect::Draw, 1, false),
    ]
});

fn passive(id: &str, name: &str, description: &str, modifier: StatModifier) -> PassiveSkill {
    PassiveSkill {
        id: id.into(),
        name: name.into(),
        description: description.into(),
        modifier,
    }
}

fn passive_pool(suffix: &str, names: [&str; 10]) -> Vec<PassiveSkill> {
    let entries: [(&str, &str, StatModifier); 10] = [
        ("passive_hp_boost", "Your units have +2 defense", StatModifier::Defense(2)),
        ("passive_atk_boost", "Your units have +2 attack", StatModifier::Attack(2)),
        ("passive_mana_regen", "Start with +1 max mana", StatModifier::MaxMana(1)),
        ("passive_card_draw", "Draw 3 extra cards at the start", StatModifier::StartingHand(3)),
        ("passive_armor_start", "Start with 10 armor", StatModifier::StartingArmor(10)),
        ("passive_hp_hero", "Start with +10 health", StatModifier::StartingHp(10)),
        ("passive_cheaper_minions", "Your units cost 1 less (min. 1)", StatModifier::MinionCost(1)),
        ("passive_charge_melee", "Your melee units have Charge", StatModifier::MeleeCharge),
        (
            "passive_ranged_damage",
            "Your ranged units have +3 attack",
            StatModifier::RangedAttack(3),
        ),
        (
            "passive_hero_power_cheap",
            "Your hero powers cost 1 less (min. 0)",
            StatModifier::HeroPowerCost(1),
        ),
    ];
    entries
        .iter()
        .zip(names)
        .map(|((id, description, modifier), name)| {
            passive(&format!("{id}{suffix}"), name, description, *modifier)
        })
        .collect()
}

static PLAYER_ONE_PASSIVES: Lazy<Vec<PassiveSkill>> = Lazy::new(|| {
    passive_pool(
        "",
        [
            "Unshakable Vigor",
            "Battle Fury",
            "Arcane Mastery",
            "Ancient Wisdom",
            "Celestial Armor",
            "Supreme Vitality",
            "Tactical Efficiency",
            "Warrior's Momentum",
            "Lethal Precision",
            "Divine Power",
        ],
    )
});

static PLAYER_TWO_PASSIVES: Lazy<Vec<PassiveSkill>> = Lazy::new(|| {
    passive_pool(
        "_p2",
        [
            "Vigor of Darkness",
            "Shadow Fury",
            "Black Magic",
            "Profane Knowledge",
            "Shadow Shield",
            "Undead Endurance",
            "Dark Pact",
            "Profane Momentum",
            "Lethal Curse",
            "Power of Darkness",
        ],
    )
});

/// Card pool a player builds their deck from.
pub fn card_pool(player: PlayerId) -> &'static [CardDefinition] {
    if player == PLAYER_ONE {
        &PLAYER_ONE_CARDS
    } else {
        &PLAYER_TWO_CARDS
    }
}

pub fn hero_power_pool(player: PlayerId) -> &'static [HeroPower] {
    if player == PLAYER_ONE {
        &PLAYER_ONE_POWERS
    } else {
        &PLAYER_TWO_POWERS
    }
}

pub fn passive_skill_pool(player: PlayerId) -> &'static [PassiveSkill] {
    if player == PLAYER_ONE {
        &PLAYER_ONE_PASSIVES
    } else {
        &PLAYER_TWO_PASSIVES
    }
}

pub fn find_card(player: PlayerId, card_id: &str) -> Option<&'static CardDefinition> {
    card_pool(player).iter().find(|card| card.card_id == card_id)
}

pub fn find_hero_power(player: PlayerId, power_id: &str) -> Option<&'static HeroPower> {
    hero_power_pool(player).iter().find(|power| power.id == power_id)
}

pub fn find_passive(player: PlayerId, passive_id: &str) -> Option<&'static PassiveSkill> {
    passive_skill_pool(player)
        .iter()
        .find(|skill| skill.id == passive_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::{Lane, PLAYER_TWO};
    use std::collections::HashSet;

    #[test]
    fn pools_have_unique_ids_and_expected_sizes() {
        for player in [PLAYER_ONE, PLAYER_TWO] {
            let cards = card_pool(player);
            assert_eq!(cards.len(), 30);
            let ids: HashSet<_> = cards.iter().map(|c| c.card_id.as_str()).collect();
            assert_eq!(ids.len(), cards.len());
            assert_eq!(hero_power_pool(player).len(), 4);
            assert_eq!(passive_skill_pool(player).len(), 10);
        }
    }

    #[test]
    fn unit_types_map_to_lanes() {
        let squire = find_card(PLAYER_ONE, "p1_001").expect("squire");
        assert_eq!(squire.lane(), Lane::Melee);
        let acolyte = find_card(PLAYER_ONE, "p1_003").expect("acolyte");
        assert_eq!(acolyte.lane(), Lane::Ranged);
        assert_eq!(acolyte.heal_value, Some(2));
    }

    #[test]
    fn lookups_are_scoped_per_player() {
        assert!(find_card(PLAYER_TWO, "p1_001").is_none());
        assert!(find_hero_power(PLAYER_TWO, "p2_shadow").is_some_and(|p| p.requires_target));
        assert!(find_passive(PLAYER_TWO, "passive_charge_melee_p2").is_some());
        assert!(find_passive(PLAYER_ONE, "passive_charge_melee").is_some());
    }
}
