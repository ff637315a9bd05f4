//! The room transition state machine: leaving the current room, unloading
//! and reloading room resource state, and entering the new room. At most one
//! room is current at a time, and a transition always passes through an
//! explicit unload of the old room before the new one becomes current.

use anyhow::{bail, Context, Result};
use log::debug;

use ags_script::events::room_event;
use ags_script::{
    EdgeDefs, EventBlockKind, GameEvent, GameEventKind, InteractionVariable, NewRoomState,
    RoomDef, MAX_ROOM_NUMBER, ROOM_CACHE_LIMIT,
};

use crate::engine::{DialogPending, Engine};
use crate::hosts::{ScriptInstanceRef, ScriptState, AMBIENT_CHANNELS};
use crate::interp::InteractionOwner;
use crate::script::{on_event, PostScriptAction};

/// Which room edge a position sits against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEdge {
    Left,
    Right,
    Top,
    Bottom,
}

pub(crate) fn edge_at(edges: &EdgeDefs, x: i32, y: i32) -> Option<RoomEdge> {
    if x <= edges.left {
        Some(RoomEdge::Left)
    } else if x >= edges.right {
        Some(RoomEdge::Right)
    } else if y <= edges.top {
        Some(RoomEdge::Top)
    } else if y >= edges.bottom {
        Some(RoomEdge::Bottom)
    } else {
        None
    }
}

/// Runtime state for one room object.
#[derive(Debug, Clone)]
pub struct RoomObject {
    pub visible: bool,
    pub x: i32,
    pub y: i32,
    pub moving: u32,
    pub cycling: u32,
}

/// The current room: the loaded definition plus the mutable state layered
/// on top of it.
pub struct Room {
    pub number: u32,
    pub def: RoomDef,
    pub objects: Vec<RoomObject>,
    pub hotspots_enabled: Vec<bool>,
    pub walk_areas_enabled: Vec<bool>,
    pub local_variables: Vec<InteractionVariable>,
    pub script: Option<ScriptInstanceRef>,
}

impl Room {
    pub(crate) fn from_def(def: RoomDef) -> Self {
        let objects = def
            .objects
            .iter()
            .map(|obj| RoomObject {
                visible: obj.visible,
                x: obj.x,
                y: obj.y,
                moving: 0,
                cycling: 0,
            })
            .collect();
        let hotspots_enabled = vec![true; def.hotspots.len()];
        let walk_areas_enabled = vec![true; def.walkable_areas];
        let local_variables = def.local_variables.clone();
        Room {
            number: def.number,
            def,
            objects,
            hotspots_enabled,
            walk_areas_enabled,
            local_variables,
            script: None,
        }
    }

    pub fn hotspot_at(&self, x: i32, y: i32) -> Option<usize> {
        self.def.hotspots.iter().enumerate().find_map(|(index, hotspot)| {
            let enabled = self.hotspots_enabled.get(index).copied().unwrap_or(false);
            let hit = hotspot.area.map(|area| area.contains(x, y)).unwrap_or(false);
            (enabled && hit).then_some(index)
        })
    }

    pub fn region_at(&self, x: i32, y: i32) -> Option<usize> {
        self.def.regions.iter().enumerate().find_map(|(index, region)| {
            let hit = region.area.map(|area| area.contains(x, y)).unwrap_or(false);
            hit.then_some(index)
        })
    }

    pub fn object_at(&self, x: i32, y: i32) -> Option<usize> {
        self.objects.iter().enumerate().find_map(|(index, object)| {
            let def = &self.def.objects[index];
            (object.visible && def.x == x && def.y == y).then_some(index)
        })
    }
}

/// Per-room state preserved across visits for cacheable rooms. Room data is
/// still reloaded from disk on revisit; only this survives in memory.
pub(crate) struct CachedRoom {
    pub(crate) script_state: Option<ScriptState>,
    pub(crate) local_variables: Vec<InteractionVariable>,
    pub(crate) objects: Vec<RoomObject>,
    pub(crate) hotspots_enabled: Vec<bool>,
}

impl Engine {
    pub(crate) fn current_room(&self) -> Result<&Room> {
        self.room.as_ref().context("no room is loaded")
    }

    pub(crate) fn current_room_mut(&mut self) -> Result<&mut Room> {
        self.room.as_mut().context("no room is loaded")
    }

    pub(crate) fn room_object(&self, index: usize) -> Result<&RoomObject> {
        let room = self.current_room()?;
        match room.objects.get(index) {
            Some(object) => Ok(object),
            None => bail!("object {index} out of range in room {}", room.number),
        }
    }

    /// Requests a transition to `room`, deferring or folding the request as
    /// the current engine context demands. Scripts call this; the actual
    /// transition may run now, at script unwind, or on the next event pass.
    pub fn schedule_new_room(&mut self, room: i32) -> Result<()> {
        if room < 0 || room as u32 > MAX_ROOM_NUMBER {
            bail!("NewRoom: invalid room number {room}");
        }
        if !self.started {
            // The deferred startup sequence will load it.
            self.world.player_mut().room = room;
            return Ok(());
        }
        if self.dialog_resolving {
            // The dialog system owns sequencing once engaged.
            self.dialog_pending = DialogPending::GoToRoom(room);
            return Ok(());
        }
        if let Some(destination) = self.in_leaves_screen.as_mut() {
            *destination = room as u32;
            return Ok(());
        }
        if self.in_enters_screen > 0 {
            // Transition-during-transition is illegal; defer one event pass.
            return self.queue_game_event(GameEventKind::NewRoom, room, 0, 0);
        }
        if self.script_stack.is_empty() {
            return self.new_room(room);
        }
        self.note(format!("room.schedule {room}"));
        let frame = self
            .script_stack
            .last_mut()
            .expect("script stack checked non-empty");
        frame.pending_actions.push(PostScriptAction::NewRoom(room));
        let player = self.world.player_mut();
        if player.walking > 0 && player.turning == 0 {
            player.stop_moving();
        }
        Ok(())
    }

    /// Like [`Engine::schedule_new_room`], with an explicit entry position
    /// staged for the destination.
    pub fn schedule_new_room_at(&mut self, room: i32, x: i32, y: i32) -> Result<()> {
        self.staged_entry = Some((x, y));
        self.schedule_new_room(room)
    }

    /// Performs a transition right now: Player-Leaves-Screen interactions,
    /// the global leave hook, unload, then load.
    pub fn new_room(&mut self, room: i32) -> Result<()> {
        if room < 0 || room as u32 > MAX_ROOM_NUMBER {
            bail!("new_room: invalid room number {room}");
        }
        let leaving = match self.room.as_ref() {
            Some(current) => current.number,
            None => bail!("new_room called before the first room was loaded"),
        };
        debug!("transitioning from room {leaving} to {room}");
        self.note(format!("room.transition {leaving} -> {room}"));

        // The player may be reassigned by the leave handlers; the captured
        // character is the one the transition carries.
        let player = self.world.player;

        self.in_leaves_screen = Some(room as u32);
        self.event_block_base_name = "room".to_string();
        self.run_interaction(InteractionOwner::Room, room_event::PLAYER_LEAVES, None, false)?;
        self.run_on_event(on_event::LEAVE_ROOM, leaving as i32)?;

        // Leave handlers may have redirected the transition.
        let destination = self.in_leaves_screen.take().unwrap_or(room as u32);

        if let Some(target) = self.world.characters[player].following {
            let target_present = self
                .world
                .characters
                .get(target)
                .map(|ch| ch.room == destination as i32)
                .unwrap_or(false);
            if !target_present {
                self.world.characters[player].following = None;
            }
        }

        self.unload_old_room()?;
        self.load_new_room(destination, Some(player))
    }

    pub(crate) fn unload_old_room(&mut self) -> Result<()> {
        let Some(mut room) = self.room.take() else {
            return Ok(());
        };
        debug!("unloading room {}", room.number);
        self.note(format!("room.unload {}", room.number));

        // Script-name bindings into the old room must not dangle.
        self.exported_room_names.clear();

        if !self.world.options.ambient_sounds_persist {
            for channel in 0..AMBIENT_CHANNELS {
                self.audio.stop_ambient(channel);
            }
        }

        // Anything that snuck in during the transition is void.
        self.script_stack.clear();
        self.events.clear();
        self.cancel_blocking_for_room_change();

        self.world.text_overlay_count = 0;
        self.world.message_time = -1;
        self.draw.clear_message();
        self.last_region = None;
        self.entry_edge = None;

        if let Some(index) = self.player_hidden_by_room.take() {
            self.world.characters[index].on = true;
        }

        if room.number < ROOM_CACHE_LIMIT {
            let script_state = room
                .script
                .take()
                .map(|script| script.borrow_mut().save_state());
            self.room_cache.insert(
                room.number,
                CachedRoom {
                    script_state,
                    local_variables: std::mem::take(&mut room.local_variables),
                    objects: std::mem::take(&mut room.objects),
                    hotspots_enabled: std::mem::take(&mut room.hotspots_enabled),
                },
            );
        }
        Ok(())
    }

    pub(crate) fn load_new_room(&mut self, number: u32, for_char: Option<usize>) -> Result<()> {
        if let Some(current) = self.room.as_ref() {
            bail!(
                "load_new_room: room {} is still loaded; unload it first",
                current.number
            );
        }
        if number > MAX_ROOM_NUMBER {
            bail!("load_new_room: room number {number} out of range");
        }
        debug!("loading room {number}");

        // Reload from disk even on a cache hit; volatile room content may
        // have changed, only script state persists.
        let def = self
            .room_source
            .load_room(number)
            .with_context(|| format!("loading room {number} data"))?;
        if def.number != number {
            bail!("room data mismatch: asked for {number}, got {}", def.number);
        }

        let cached = self.room_cache.remove(&number);
        let mut room = Room::from_def(def);
        let mut saved_script_state = None;
        if let Some(cached) = cached {
            saved_script_state = cached.script_state;
            room.local_variables = cached.local_variables;
            if cached.objects.len() == room.objects.len() {
                room.objects = cached.objects;
            }
            if cached.hotspots_enabled.len() == room.hotspots_enabled.len() {
                room.hotspots_enabled = cached.hotspots_enabled;
            }
        }

        self.new_room_state = if self.visited_rooms.insert(number) {
            NewRoomState::FirstTime
        } else {
            NewRoomState::New
        };

        self.exported_room_names = room
            .def
            .hotspots
            .iter()
            .map(|hotspot| hotspot.script_name.clone())
            .chain(room.def.objects.iter().map(|object| object.script_name.clone()))
            .filter(|name| !name.is_empty())
            .collect();

        if let Some(index) = for_char {
            let target_room = number as i32;
            for id in 0..self.world.characters.len() {
                if id == index {
                    continue;
                }
                match self.world.characters[id].following {
                    Some(followed) if followed == index => {
                        let character = &mut self.world.characters[id];
                        character.prev_room = character.room;
                        character.room = target_room;
                    }
                    Some(followed) => {
                        let followed_room =
                            self.world.characters.get(followed).map(|ch| ch.room);
                        if let Some(followed_room) = followed_room {
                            let character = &mut self.world.characters[id];
                            if character.room != followed_room {
                                character.prev_room = character.room;
                                character.room = followed_room;
                            }
                        }
                    }
                    None => {}
                }
            }

            self.draw.set_viewport(0, 0);
            let character = &mut self.world.characters[index];
            character.prev_room = character.room;
            character.room = target_room;
            for character in &mut self.world.characters {
                character.stop_moving();
            }
        }

        let script = self
            .room_source
            .compile_room_script(number)
            .with_context(|| format!("compiling room {number} script"))?;
        if let (Some(script), Some(state)) = (script.as_ref(), saved_script_state) {
            script.borrow_mut().restore_state(state);
        }
        room.script = script;

        if let Some(index) = for_char {
            if let Some((x, y)) = self.staged_entry.take() {
                let character = &mut self.world.characters[index];
                character.x = x;
                character.y = y;
            }
            let character = &self.world.characters[index];
            self.entry_edge = edge_at(&room.def.edges, character.x, character.y);

            if room.def.options.hide_player {
                self.world.characters[index].on = false;
                self.player_hidden_by_room = Some(index);
            }
            if let Some(view) = room.def.options.player_view {
                self.world.characters[index].view_override = Some(view);
            }
        }

        self.room = Some(room);
        self.started = true;
        self.room_changes += 1;
        self.gui.invalidate();
        self.note(format!("room.load {number}"));
        Ok(())
    }

    /// Per-frame guard that fires the Enters-Screen interaction before any
    /// gameplay logic runs. The sub-state is cleared around the handler so
    /// it cannot re-trigger itself, and restored afterward.
    pub fn check_new_room(&mut self) -> Result<()> {
        if matches!(
            self.new_room_state,
            NewRoomState::None | NewRoomState::SavedGame
        ) {
            return Ok(());
        }
        let state_was = self.new_room_state;
        self.new_room_state = NewRoomState::None;
        self.ui_disabled += 1;
        self.in_enters_screen += 1;

        let event = GameEvent {
            kind: GameEventKind::RunEventBlock,
            data1: EventBlockKind::Room as i32,
            data2: 0,
            data3: room_event::ENTERS_BEFORE_FADE_IN as i32,
            player: self.world.player as i32,
        };
        let result = self.process_game_event(&event);

        self.in_enters_screen -= 1;
        self.ui_disabled = self.ui_disabled.saturating_sub(1);
        self.new_room_state = state_was;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_detection_prefers_horizontal() {
        let edges = EdgeDefs {
            left: 10,
            right: 300,
            top: 5,
            bottom: 190,
        };
        assert_eq!(edge_at(&edges, 10, 100), Some(RoomEdge::Left));
        assert_eq!(edge_at(&edges, 300, 100), Some(RoomEdge::Right));
        assert_eq!(edge_at(&edges, 150, 5), Some(RoomEdge::Top));
        assert_eq!(edge_at(&edges, 150, 190), Some(RoomEdge::Bottom));
        assert_eq!(edge_at(&edges, 150, 100), None);
    }

    #[test]
    fn loading_over_a_current_room_is_fatal() {
        let mut engine = crate::demo::test_engine();
        assert!(engine.load_new_room(2, None).is_err());
    }

    #[test]
    fn disabled_hotspots_do_not_match() {
        use ags_script::{HotspotDef, Rect};
        let def = RoomDef {
            number: 1,
            hotspots: vec![HotspotDef {
                name: "Door".into(),
                script_name: "hDoor".into(),
                area: Some(Rect::new(0, 0, 50, 50)),
                interaction: Default::default(),
            }],
            ..RoomDef::default()
        };
        let mut room = Room::from_def(def);
        assert_eq!(room.hotspot_at(10, 10), Some(0));
        room.hotspots_enabled[0] = false;
        assert_eq!(room.hotspot_at(10, 10), None);
    }
}
