//! Game-wide mutable state: characters, inventory, score, interaction
//! variables, script timers, and the transient overlay/message counters the
//! blocking predicates read.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Result};

use ags_script::{GameDef, GameOptions, InteractionVariable};

/// Script timer slots the original exposes. Slot semantics: 0 = off,
/// 1 = expired and waiting to be observed, above 1 = counting down.
pub const MAX_TIMERS: usize = 21;

/// Runtime state for one character.
#[derive(Debug, Clone)]
pub struct Character {
    pub name: String,
    pub script_name: String,
    pub room: i32,
    pub prev_room: i32,
    pub x: i32,
    pub y: i32,
    pub walking: u32,
    pub turning: u32,
    pub animating: u32,
    pub following: Option<usize>,
    pub on: bool,
    pub inventory: BTreeMap<usize, u32>,
    pub view_override: Option<u32>,
}

impl Character {
    pub fn stop_moving(&mut self) {
        self.walking = 0;
        self.turning = 0;
    }

    pub fn is_walking(&self) -> bool {
        self.walking > 0
    }

    pub fn has_inventory(&self, item: usize) -> bool {
        self.inventory.get(&item).copied().unwrap_or(0) > 0
    }

    pub fn add_inventory(&mut self, item: usize) {
        *self.inventory.entry(item).or_insert(0) += 1;
    }

    pub fn lose_inventory(&mut self, item: usize) {
        if let Some(count) = self.inventory.get_mut(&item) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.inventory.remove(&item);
            }
        }
    }

    /// One frame of movement/animation countdown. Turning resolves before
    /// the walk itself continues.
    pub fn advance(&mut self) {
        if self.turning > 0 {
            self.turning -= 1;
        } else if self.walking > 0 {
            self.walking -= 1;
        }
        if self.animating > 0 {
            self.animating -= 1;
        }
    }
}

/// Identity of a give-score-once command that has already fired. The
/// interaction data itself stays immutable after load; this set carries the
/// "times run" memory instead.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ScoreOnceKey {
    pub owner: String,
    pub event: u32,
    pub path: Vec<u32>,
}

#[derive(Debug)]
pub struct World {
    pub characters: Vec<Character>,
    pub player: usize,
    pub score: i32,
    pub used_inventory: Option<usize>,
    pub global_variables: Vec<InteractionVariable>,
    pub global_messages: Vec<String>,
    pub timers: [i32; MAX_TIMERS],
    pub wait_counter: i32,
    pub shake_length: i32,
    pub text_overlay_count: u32,
    pub message_time: i32,
    pub options: GameOptions,
    pub ground_interactions_disabled: bool,
    pub scores_given: BTreeSet<ScoreOnceKey>,
}

impl World {
    pub fn from_game(game: &GameDef) -> Self {
        let characters = game
            .characters
            .iter()
            .map(|def| Character {
                name: def.name.clone(),
                script_name: def.script_name.clone(),
                room: def.starting_room as i32,
                prev_room: -1,
                x: def.x,
                y: def.y,
                walking: 0,
                turning: 0,
                animating: 0,
                following: None,
                on: true,
                inventory: BTreeMap::new(),
                view_override: None,
            })
            .collect();

        World {
            characters,
            player: game.player_character,
            score: 0,
            used_inventory: None,
            global_variables: game.global_variables.clone(),
            global_messages: game.global_messages.clone(),
            timers: [0; MAX_TIMERS],
            wait_counter: 0,
            shake_length: 0,
            text_overlay_count: 0,
            message_time: -1,
            options: game.options,
            ground_interactions_disabled: false,
            scores_given: BTreeSet::new(),
        }
    }

    pub fn player(&self) -> &Character {
        &self.characters[self.player]
    }

    pub fn player_mut(&mut self) -> &mut Character {
        let index = self.player;
        &mut self.characters[index]
    }

    pub fn character(&self, id: usize) -> Result<&Character> {
        match self.characters.get(id) {
            Some(character) => Ok(character),
            None => bail!("character id {id} out of range ({} exist)", self.characters.len()),
        }
    }

    pub fn character_mut(&mut self, id: usize) -> Result<&mut Character> {
        let len = self.characters.len();
        match self.characters.get_mut(id) {
            Some(character) => Ok(character),
            None => bail!("character id {id} out of range ({len} exist)"),
        }
    }

    pub fn set_timer(&mut self, timer: usize, ticks: i32) -> Result<()> {
        if timer >= MAX_TIMERS {
            bail!("script timer {timer} out of range (0..{MAX_TIMERS})");
        }
        self.timers[timer] = ticks;
        Ok(())
    }

    /// One-shot expiry latch: reports true exactly once per expiry.
    pub fn is_timer_expired(&mut self, timer: usize) -> Result<bool> {
        if timer >= MAX_TIMERS {
            bail!("script timer {timer} out of range (0..{MAX_TIMERS})");
        }
        if self.timers[timer] == 1 {
            self.timers[timer] = 0;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn advance_timers(&mut self) {
        for slot in self.timers.iter_mut() {
            if *slot > 1 {
                *slot -= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ags_script::CharacterDef;

    fn world_with_one_character() -> World {
        let game = GameDef {
            characters: vec![CharacterDef {
                name: "Roger".into(),
                script_name: "cRoger".into(),
                starting_room: 1,
                ..CharacterDef::default()
            }],
            ..GameDef::default()
        };
        World::from_game(&game)
    }

    #[test]
    fn timer_latch_reports_expiry_once() {
        let mut world = world_with_one_character();
        world.set_timer(3, 3).unwrap();

        world.advance_timers();
        world.advance_timers();
        assert_eq!(world.timers[3], 1);
        assert!(!world.is_timer_expired(2).unwrap());
        assert!(world.is_timer_expired(3).unwrap());
        assert!(!world.is_timer_expired(3).unwrap());
    }

    #[test]
    fn timer_out_of_range_is_fatal() {
        let mut world = world_with_one_character();
        assert!(world.set_timer(MAX_TIMERS, 5).is_err());
    }

    #[test]
    fn turning_resolves_before_walking() {
        let mut world = world_with_one_character();
        let character = world.player_mut();
        character.walking = 2;
        character.turning = 1;

        character.advance();
        assert_eq!((character.turning, character.walking), (0, 2));
        character.advance();
        assert_eq!((character.turning, character.walking), (0, 1));
    }

    #[test]
    fn inventory_counts_drop_to_absent() {
        let mut world = world_with_one_character();
        let character = world.player_mut();
        character.add_inventory(4);
        character.add_inventory(4);
        assert!(character.has_inventory(4));
        character.lose_inventory(4);
        character.lose_inventory(4);
        assert!(!character.has_inventory(4));
        character.lose_inventory(4);
    }
}
