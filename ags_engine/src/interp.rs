//! The legacy interaction interpreter and the version-gated dispatch that
//! chooses between it and named script handlers. Interaction data is
//! read-only after load; every run works on a cloned command list so a
//! mid-list room change can discard the room without invalidating the walk.

use anyhow::{bail, Result};
use log::debug;

use ags_script::events::hotspot_event;
use ags_script::interaction::{
    resolve_variable, resolve_variable_mut, CommandList, Interaction, InteractionCommand,
    InteractionScripts, InteractionValue, InteractionVariable, NewInteraction, ValueKind,
};

use crate::engine::Engine;
use crate::script::{on_event, ScriptTarget};
use crate::world::ScoreOnceKey;

/// Which entity's interaction table an event is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InteractionOwner {
    Room,
    Hotspot(usize),
    Region(usize),
    Object(usize),
    Character(usize),
    InventoryItem(usize),
}

impl InteractionOwner {
    fn is_inventory(&self) -> bool {
        matches!(self, InteractionOwner::InventoryItem(_))
    }
}

/// How a command list finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListOutcome {
    /// Ran to the end.
    Completed,
    /// A stop command ended it early; counts as handled.
    Stopped,
    /// A room change or quit voided the remainder.
    Invalidated,
}

impl Engine {
    fn interaction_for(&self, owner: InteractionOwner) -> Result<Interaction> {
        match owner {
            InteractionOwner::Room => Ok(self.current_room()?.def.interaction.clone()),
            InteractionOwner::Hotspot(index) => {
                let room = self.current_room()?;
                match room.def.hotspots.get(index) {
                    Some(hotspot) => Ok(hotspot.interaction.clone()),
                    None => bail!("hotspot {index} out of range in room {}", room.number),
                }
            }
            InteractionOwner::Region(index) => {
                let room = self.current_room()?;
                match room.def.regions.get(index) {
                    Some(region) => Ok(region.interaction.clone()),
                    None => bail!("region {index} out of range in room {}", room.number),
                }
            }
            InteractionOwner::Object(index) => {
                let room = self.current_room()?;
                match room.def.objects.get(index) {
                    Some(object) => Ok(object.interaction.clone()),
                    None => bail!("object {index} out of range in room {}", room.number),
                }
            }
            InteractionOwner::Character(id) => match self.game.characters.get(id) {
                Some(character) => Ok(character.interaction.clone()),
                None => bail!("character {id} has no definition"),
            },
            InteractionOwner::InventoryItem(item) => match self.game.inventory.get(item) {
                Some(def) => Ok(def.interaction.clone()),
                None => bail!("inventory item {item} has no definition"),
            },
        }
    }

    fn describe_owner(&self, owner: InteractionOwner) -> String {
        let room = self.room.as_ref().map(|room| room.number).unwrap_or(0);
        match owner {
            InteractionOwner::Room => format!("room{room}"),
            InteractionOwner::Hotspot(index) => format!("room{room}.hotspot{index}"),
            InteractionOwner::Region(index) => format!("room{room}.region{index}"),
            InteractionOwner::Object(index) => format!("room{room}.object{index}"),
            InteractionOwner::Character(id) => format!("character{id}"),
            InteractionOwner::InventoryItem(item) => format!("inventory{item}"),
        }
    }

    /// Script handlers for character and inventory interactions live in the
    /// game script; everything else is the current room script's business.
    fn interaction_target(&self) -> ScriptTarget {
        let name = self.event_block_base_name.as_str();
        if name.contains("character") || name.contains("inventory") {
            ScriptTarget::Game
        } else {
            ScriptTarget::Room
        }
    }

    /// Dispatches an event to whichever interaction encoding the owner
    /// carries. With `check_only` set, reports whether a response exists
    /// without running anything. Returns whether the room changed under us.
    pub fn run_interaction(
        &mut self,
        owner: InteractionOwner,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        match self.interaction_for(owner)? {
            Interaction::None => {
                if !check_only {
                    self.run_unhandled_event(owner, event)?;
                }
                Ok(false)
            }
            Interaction::Script(scripts) => {
                self.run_interaction_script(owner, &scripts, event, fallback, check_only)
            }
            Interaction::Legacy(legacy) => {
                self.run_interaction_event(owner, &legacy, event, fallback, check_only)
            }
        }
    }

    /// Named-handler encoding: look up the handler for the event and run it
    /// through the script adapter. A registered fallback suppresses the
    /// unhandled hook without running.
    pub fn run_interaction_script(
        &mut self,
        owner: InteractionOwner,
        scripts: &InteractionScripts,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        let Some(handler) = scripts.handler(event).map(str::to_string) else {
            if let Some(fallback) = fallback {
                if scripts.has_handler(fallback) {
                    return Ok(false);
                }
            }
            if !check_only {
                self.run_unhandled_event(owner, event)?;
            }
            return Ok(false);
        };
        if check_only {
            return Ok(true);
        }
        debug!("running interaction handler {handler}");
        let room_was = self.room_changes;
        let target = self.interaction_target();
        self.queue_or_run_text_script(target, &handler, &[])?;
        Ok(self.room_changes != room_was)
    }

    /// Legacy command-tree encoding.
    pub fn run_interaction_event(
        &mut self,
        owner: InteractionOwner,
        interaction: &NewInteraction,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        let Some(list) = interaction.response(event).cloned() else {
            if let Some(fallback) = fallback {
                if interaction.has_response(fallback) {
                    return Ok(false);
                }
            }
            if !check_only {
                self.run_unhandled_event(owner, event)?;
            }
            return Ok(false);
        };
        if check_only {
            return Ok(true);
        }
        let room_was = self.room_changes;
        let mut commands_run = 0u32;
        let mut path = Vec::new();
        self.run_interaction_command_list(owner, event, &list, &mut commands_run, &mut path)?;
        if commands_run == 0 && owner.is_inventory() {
            // Every conditional missed; an inventory response that did
            // nothing still reaches the unhandled hook.
            self.run_unhandled_event(owner, event)?;
        }
        Ok(self.room_changes != room_was)
    }

    /// Runs one command list in order. `commands_run` counts every command
    /// reached, including conditionals whose test failed; `path` is the
    /// nested-index trail identifying the command being executed.
    pub(crate) fn run_interaction_command_list(
        &mut self,
        owner: InteractionOwner,
        event: u32,
        list: &CommandList,
        commands_run: &mut u32,
        path: &mut Vec<u32>,
    ) -> Result<ListOutcome> {
        let room_was = self.room_changes;
        for (index, command) in list.commands.iter().enumerate() {
            *commands_run += 1;
            path.push(index as u32);
            let outcome = self.run_interaction_command(owner, event, command, commands_run, path)?;
            path.pop();
            if outcome != ListOutcome::Completed {
                return Ok(outcome);
            }
            if self.quit_requested || self.room_changes != room_was {
                return Ok(ListOutcome::Invalidated);
            }
        }
        Ok(ListOutcome::Completed)
    }

    fn run_interaction_command(
        &mut self,
        owner: InteractionOwner,
        event: u32,
        command: &InteractionCommand,
        commands_run: &mut u32,
        path: &mut Vec<u32>,
    ) -> Result<ListOutcome> {
        use InteractionCommand::*;
        match command {
            DoNothing => {}
            RunScript { name } => {
                let target = self.interaction_target();
                self.queue_or_run_text_script(target, name, &[])?;
            }
            AddScore { points } => {
                let points = self.eval_value(points)?;
                self.give_score(points)?;
            }
            AddScoreOnce { points } => {
                let key = ScoreOnceKey {
                    owner: self.describe_owner(owner),
                    event,
                    path: path.clone(),
                };
                if self.world.scores_given.insert(key) {
                    let points = self.eval_value(points)?;
                    self.give_score(points)?;
                }
            }
            DisplayMessage { message } => self.display_message(*message)?,
            PlaySound { sound } => {
                let sound = self.eval_value(sound)?;
                self.audio.play_sound(sound);
            }
            NewRoom { room } => {
                let room = self.eval_value(room)?;
                self.schedule_new_room(room)?;
            }
            NewRoomAtCoords { room, x, y } => {
                let room = self.eval_value(room)?;
                self.schedule_new_room_at(room, *x, *y)?;
            }
            AddInventory { item } => {
                let item = self.inventory_index(item)?;
                self.world.player_mut().add_inventory(item);
                self.run_on_event(on_event::ADD_INVENTORY, item as i32)?;
            }
            LoseInventory { item } => {
                let item = self.inventory_index(item)?;
                self.world.player_mut().lose_inventory(item);
                self.run_on_event(on_event::LOSE_INVENTORY, item as i32)?;
            }
            SetVariable { variable, value } => {
                let value = self.eval_value(value)?;
                self.set_variable(*variable, value)?;
            }
            StopCharacterWalking { character } => {
                let id = self.character_index(character)?;
                self.world.character_mut(id)?.stop_moving();
            }
            ObjectOn { object } => self.set_object_visible(object, true)?,
            ObjectOff { object } => self.set_object_visible(object, false)?,
            EnableHotspot { hotspot } => self.set_hotspot_enabled(hotspot, true)?,
            DisableHotspot { hotspot } => self.set_hotspot_enabled(hotspot, false)?,
            RunDialog { topic } => {
                let topic = self.eval_value(topic)?;
                self.run_dialog(topic)?;
            }
            StopRunning => return Ok(ListOutcome::Stopped),
            IfInvItemWasUsed { item, then_run } => {
                let item = self.eval_value(item)?;
                if item >= 0 && self.world.used_inventory == Some(item as usize) {
                    return self.run_interaction_command_list(
                        owner,
                        event,
                        then_run,
                        commands_run,
                        path,
                    );
                }
            }
            IfHasInvItem { item, then_run } => {
                let item = self.inventory_index(item)?;
                if self.world.player().has_inventory(item) {
                    return self.run_interaction_command_list(
                        owner,
                        event,
                        then_run,
                        commands_run,
                        path,
                    );
                }
            }
            IfCharacterMoving {
                character,
                then_run,
            } => {
                let id = self.character_index(character)?;
                if self.world.character(id)?.is_walking() {
                    return self.run_interaction_command_list(
                        owner,
                        event,
                        then_run,
                        commands_run,
                        path,
                    );
                }
            }
            IfVariablesEqual {
                variable,
                value,
                then_run,
            } => {
                let value = self.eval_value(value)?;
                if self.variable_value(*variable)? == value {
                    return self.run_interaction_command_list(
                        owner,
                        event,
                        then_run,
                        commands_run,
                        path,
                    );
                }
            }
            Unsupported { opcode } => bail!(
                "interaction command opcode {opcode} is not implemented (event {event} on {})",
                self.describe_owner(owner)
            ),
        }
        Ok(ListOutcome::Completed)
    }

    pub(crate) fn eval_value(&self, value: &InteractionValue) -> Result<i32> {
        match value.kind {
            ValueKind::Literal | ValueKind::CharacterId => Ok(value.value),
            ValueKind::Boolean => Ok((value.value != 0) as i32),
            ValueKind::Variable => {
                if value.value < 0 {
                    bail!("negative variable slot {} in interaction data", value.value);
                }
                self.variable_value(value.value as u32)
            }
        }
    }

    pub(crate) fn variable_value(&self, slot: u32) -> Result<i32> {
        let locals = self
            .room
            .as_ref()
            .map(|room| room.local_variables.as_slice())
            .unwrap_or(&[]);
        Ok(resolve_variable(slot, &self.world.global_variables, locals)?)
    }

    pub(crate) fn set_variable(&mut self, slot: u32, value: i32) -> Result<()> {
        let mut no_locals: [InteractionVariable; 0] = [];
        let globals = &mut self.world.global_variables;
        let locals = match self.room.as_mut() {
            Some(room) => &mut room.local_variables[..],
            None => &mut no_locals[..],
        };
        *resolve_variable_mut(slot, globals, locals)? = value;
        Ok(())
    }

    fn inventory_index(&self, value: &InteractionValue) -> Result<usize> {
        let item = self.eval_value(value)?;
        if item < 0 || item as usize >= self.game.inventory.len() {
            bail!(
                "inventory item {item} out of range ({} defined)",
                self.game.inventory.len()
            );
        }
        Ok(item as usize)
    }

    /// Negative ids in interaction data mean "the player, whoever that is".
    fn character_index(&self, value: &InteractionValue) -> Result<usize> {
        let id = self.eval_value(value)?;
        if id < 0 {
            return Ok(self.world.player);
        }
        let id = id as usize;
        if id >= self.world.characters.len() {
            bail!(
                "character id {id} out of range ({} exist)",
                self.world.characters.len()
            );
        }
        Ok(id)
    }

    fn set_object_visible(&mut self, object: &InteractionValue, visible: bool) -> Result<()> {
        let index = self.eval_value(object)?;
        if index < 0 {
            bail!("negative object index {index}");
        }
        let room = self.current_room_mut()?;
        let count = room.objects.len();
        match room.objects.get_mut(index as usize) {
            Some(object) => {
                object.visible = visible;
                Ok(())
            }
            None => bail!("object {index} out of range ({count} in room)"),
        }
    }

    fn set_hotspot_enabled(&mut self, hotspot: &InteractionValue, enabled: bool) -> Result<()> {
        let index = self.eval_value(hotspot)?;
        if index < 0 {
            bail!("negative hotspot index {index}");
        }
        let room = self.current_room_mut()?;
        let count = room.hotspots_enabled.len();
        match room.hotspots_enabled.get_mut(index as usize) {
            Some(slot) => {
                *slot = enabled;
                Ok(())
            }
            None => bail!("hotspot {index} out of range ({count} in room)"),
        }
    }

    pub fn give_score(&mut self, points: i32) -> Result<()> {
        self.world.score += points;
        if points != 0 {
            self.run_on_event(on_event::GOT_SCORE, points)?;
        }
        Ok(())
    }

    /// Offers an event nobody responded to the game script's
    /// `unhandled_event` hook. Ambient events (room ticks, region
    /// stand-ons, hotspot stand-ons) never reach the hook.
    fn run_unhandled_event(&mut self, owner: InteractionOwner, event: u32) -> Result<()> {
        let what = match owner {
            InteractionOwner::Room | InteractionOwner::Region(_) => return Ok(()),
            InteractionOwner::Hotspot(_) if event == hotspot_event::STANDS_ON => return Ok(()),
            InteractionOwner::Hotspot(_) => 1,
            InteractionOwner::Object(_) => 2,
            InteractionOwner::Character(_) => 3,
            InteractionOwner::InventoryItem(_) => 5,
        };
        self.queue_or_run_text_script(
            ScriptTarget::Game,
            "unhandled_event",
            &[what, event as i32],
        )
    }

    /// Entry point for character interactions (clicks on characters and
    /// inventory used on them).
    pub fn run_character_interaction(
        &mut self,
        id: usize,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        self.event_block_base_name = format!("character{id}");
        self.run_interaction(InteractionOwner::Character(id), event, fallback, check_only)
    }

    /// Entry point for inventory item interactions.
    pub fn run_inventory_interaction(
        &mut self,
        item: usize,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        self.event_block_base_name = format!("inventory{item}");
        self.run_interaction(InteractionOwner::InventoryItem(item), event, fallback, check_only)
    }

    pub fn run_object_interaction(
        &mut self,
        object: usize,
        event: u32,
        fallback: Option<u32>,
        check_only: bool,
    ) -> Result<bool> {
        self.event_block_base_name = format!("object{object}");
        self.run_interaction(InteractionOwner::Object(object), event, fallback, check_only)
    }

    pub(crate) fn run_region_interaction(&mut self, region: usize, event: u32) -> Result<bool> {
        self.event_block_base_name = format!("region{region}");
        self.run_interaction(InteractionOwner::Region(region), event, None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::{build_demo_engine, test_engine};
    use ags_script::interaction::InteractionValue as V;

    fn run_list(engine: &mut Engine, list: &CommandList) -> (ListOutcome, u32) {
        let mut commands_run = 0;
        let mut path = Vec::new();
        let outcome = engine
            .run_interaction_command_list(
                InteractionOwner::Room,
                0,
                list,
                &mut commands_run,
                &mut path,
            )
            .unwrap();
        (outcome, commands_run)
    }

    #[test]
    fn stop_running_ends_the_list_early() {
        let mut engine = test_engine();
        let list = CommandList::new(vec![
            InteractionCommand::AddScore {
                points: V::literal(5),
            },
            InteractionCommand::StopRunning,
            InteractionCommand::AddScore {
                points: V::literal(100),
            },
        ]);
        let (outcome, commands_run) = run_list(&mut engine, &list);
        assert_eq!(outcome, ListOutcome::Stopped);
        assert_eq!(commands_run, 2);
        assert_eq!(engine.world.score, 5);
    }

    #[test]
    fn stop_inside_a_conditional_stops_the_whole_run() {
        let mut engine = test_engine();
        engine.world.player_mut().add_inventory(0);
        let list = CommandList::new(vec![
            InteractionCommand::IfHasInvItem {
                item: V::literal(0),
                then_run: CommandList::new(vec![InteractionCommand::StopRunning]),
            },
            InteractionCommand::AddScore {
                points: V::literal(100),
            },
        ]);
        let (outcome, _) = run_list(&mut engine, &list);
        assert_eq!(outcome, ListOutcome::Stopped);
        assert_eq!(engine.world.score, 0);
    }

    #[test]
    fn failed_conditional_still_counts_as_a_command() {
        let mut engine = test_engine();
        let list = CommandList::new(vec![InteractionCommand::IfHasInvItem {
            item: V::literal(0),
            then_run: CommandList::new(vec![InteractionCommand::AddScore {
                points: V::literal(9),
            }]),
        }]);
        let (outcome, commands_run) = run_list(&mut engine, &list);
        assert_eq!(outcome, ListOutcome::Completed);
        assert_eq!(commands_run, 1);
        assert_eq!(engine.world.score, 0);
    }

    #[test]
    fn score_once_fires_a_single_time_per_command_site() {
        let mut engine = test_engine();
        let list = CommandList::new(vec![InteractionCommand::AddScoreOnce {
            points: V::literal(7),
        }]);
        run_list(&mut engine, &list);
        run_list(&mut engine, &list);
        assert_eq!(engine.world.score, 7);
    }

    #[test]
    fn room_change_invalidates_the_remainder() {
        let mut engine = test_engine();
        let list = CommandList::new(vec![
            InteractionCommand::NewRoom {
                room: V::literal(2),
            },
            InteractionCommand::AddScore {
                points: V::literal(100),
            },
        ]);
        let (outcome, commands_run) = run_list(&mut engine, &list);
        assert_eq!(outcome, ListOutcome::Invalidated);
        assert_eq!(commands_run, 1);
        assert_eq!(engine.world.score, 0);
        assert_eq!(engine.displayed_room(), Some(2));
    }

    #[test]
    fn unsupported_opcode_is_fatal() {
        let mut engine = test_engine();
        let list = CommandList::new(vec![InteractionCommand::Unsupported { opcode: 48 }]);
        let mut commands_run = 0;
        let mut path = Vec::new();
        assert!(engine
            .run_interaction_command_list(
                InteractionOwner::Room,
                0,
                &list,
                &mut commands_run,
                &mut path,
            )
            .is_err());
    }

    #[test]
    fn set_variable_targets_room_locals_above_the_offset() {
        use ags_script::LOCAL_VARIABLE_OFFSET;
        let mut engine = test_engine();
        engine.set_variable(0, 11).unwrap();
        engine.set_variable(LOCAL_VARIABLE_OFFSET, 22).unwrap();
        assert_eq!(engine.variable_value(0).unwrap(), 11);
        assert_eq!(engine.variable_value(LOCAL_VARIABLE_OFFSET).unwrap(), 22);
        assert_eq!(engine.world.global_variables[0].value, 11);
    }

    #[test]
    fn check_only_reports_a_response_without_running_it() {
        use ags_script::events::hotspot_event;
        let mut engine = test_engine();
        let has_response = engine
            .run_interaction(
                InteractionOwner::Hotspot(0),
                hotspot_event::ANY_CLICK,
                None,
                true,
            )
            .unwrap();
        assert!(has_response);
        assert_eq!(engine.world.score, 0);
        assert_eq!(engine.displayed_room(), Some(1));
    }

    #[test]
    fn a_registered_fallback_suppresses_a_legacy_event_without_running_anything() {
        let mut fixture = build_demo_engine();
        fixture.engine.set_fast_forward(true);
        fixture.engine.start().unwrap();

        // The demo door only answers any-click; asking for event 1 with
        // any-click as the fallback must do nothing at all.
        let ran = fixture
            .engine
            .run_interaction(
                InteractionOwner::Hotspot(0),
                1,
                Some(hotspot_event::ANY_CLICK),
                false,
            )
            .unwrap();

        assert!(!ran);
        assert_eq!(fixture.engine.world.score, 0);
        assert!(!fixture.log_contains("audio.sound"));
        assert!(!fixture.log_contains("unhandled_event"));
    }

    #[test]
    fn a_registered_fallback_suppresses_a_named_handler_event_too() {
        use ags_script::events::room_event;

        let mut fixture = build_demo_engine();
        fixture.engine.set_fast_forward(true);
        fixture.engine.start().unwrap();
        fixture.engine.schedule_new_room(2).unwrap();
        fixture.engine.run_frames(1).unwrap();
        assert_eq!(fixture.engine.displayed_room(), Some(2));

        let ran = fixture
            .engine
            .run_interaction(
                InteractionOwner::Room,
                room_event::EDGE_TOP,
                Some(room_event::EDGE_LEFT),
                false,
            )
            .unwrap();

        assert!(!ran);
        assert_eq!(fixture.engine.displayed_room(), Some(2));
        assert!(!fixture.log_contains("room_leave_left"));
    }

    #[test]
    fn inventory_commands_move_items_and_fire_hooks() {
        let mut engine = test_engine();
        let add = CommandList::new(vec![InteractionCommand::AddInventory {
            item: V::literal(0),
        }]);
        run_list(&mut engine, &add);
        assert!(engine.world.player().has_inventory(0));

        let lose = CommandList::new(vec![InteractionCommand::LoseInventory {
            item: V::literal(0),
        }]);
        run_list(&mut engine, &lose);
        assert!(!engine.world.player().has_inventory(0));
    }
}
