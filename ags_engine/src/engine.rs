//! The engine singleton: owns the world, the current room, the event queue,
//! the running-scripts stack, and the collaborator handles. The per-concern
//! `impl Engine` blocks live beside their state in the sibling modules.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{bail, Context, Result};
use log::debug;

use ags_script::{GameDef, GameEvent, NewRoomState};

use crate::blocking::{BlockedOn, BlockedOnKind};
use crate::diag::DiagEvent;
use crate::hosts::{
    AudioSink, DialogRequest, DrawSurface, GuiHost, InputSource, RoomSource, ScriptInstanceRef,
};
use crate::rooms::{CachedRoom, Room, RoomEdge};
use crate::script::{PostScriptAction, RunningScriptFrame};
use crate::world::World;

/// Collaborator bundle handed to [`Engine::new`].
pub struct Hosts {
    pub room_source: Box<dyn RoomSource>,
    pub game_script: Option<ScriptInstanceRef>,
    pub module_scripts: Vec<ScriptInstanceRef>,
    pub draw: Box<dyn DrawSurface>,
    pub audio: Box<dyn AudioSink>,
    pub input: Box<dyn InputSource>,
    pub gui: Box<dyn GuiHost>,
}

/// Room-change sequencing once a dialog's stop-at-end flag is resolving.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DialogPending {
    #[default]
    None,
    Stop,
    GoToRoom(i32),
}

pub struct Engine {
    pub(crate) game: GameDef,
    pub world: World,

    pub(crate) room_source: Box<dyn RoomSource>,
    pub(crate) game_script: Option<ScriptInstanceRef>,
    pub(crate) module_scripts: Vec<ScriptInstanceRef>,
    pub(crate) draw: Box<dyn DrawSurface>,
    pub(crate) audio: Box<dyn AudioSink>,
    pub(crate) input: Box<dyn InputSource>,
    pub(crate) gui: Box<dyn GuiHost>,

    pub(crate) room: Option<Room>,
    pub(crate) room_cache: BTreeMap<u32, CachedRoom>,
    pub(crate) visited_rooms: BTreeSet<u32>,
    pub(crate) new_room_state: NewRoomState,
    pub(crate) room_changes: u32,
    pub(crate) in_leaves_screen: Option<u32>,
    pub(crate) in_enters_screen: u32,
    pub(crate) staged_entry: Option<(i32, i32)>,
    pub(crate) entry_edge: Option<RoomEdge>,
    pub(crate) last_region: Option<usize>,
    pub(crate) player_hidden_by_room: Option<usize>,
    pub(crate) exported_room_names: BTreeSet<String>,
    pub(crate) started: bool,

    pub(crate) events: Vec<GameEvent>,
    pub(crate) processing_events: bool,
    pub(crate) event_block_base_name: String,

    pub(crate) blocking: BlockedOn,
    pub(crate) ui_disabled: u32,
    pub(crate) cursor_overridden: bool,
    pub(crate) current_cursor: i32,

    pub(crate) script_stack: Vec<RunningScriptFrame>,
    pub(crate) in_claimable: u32,
    pub(crate) event_claimed: bool,

    pub(crate) dialog_resolving: bool,
    pub(crate) dialog_pending: DialogPending,

    pub(crate) frame: u64,
    pub(crate) frames_per_second: u32,
    pub(crate) last_frame_time: Option<std::time::Instant>,
    pub(crate) fast_forward: bool,
    pub(crate) paused: bool,
    pub(crate) quit_requested: bool,
    pub(crate) gui_under_mouse: Option<u32>,

    pub(crate) diag: Vec<DiagEvent>,
}

impl Engine {
    pub fn new(game: GameDef, hosts: Hosts) -> Self {
        let world = World::from_game(&game);
        Engine {
            game,
            world,
            room_source: hosts.room_source,
            game_script: hosts.game_script,
            module_scripts: hosts.module_scripts,
            draw: hosts.draw,
            audio: hosts.audio,
            input: hosts.input,
            gui: hosts.gui,
            room: None,
            room_cache: BTreeMap::new(),
            visited_rooms: BTreeSet::new(),
            new_room_state: NewRoomState::None,
            room_changes: 0,
            in_leaves_screen: None,
            in_enters_screen: 0,
            staged_entry: None,
            entry_edge: None,
            last_region: None,
            player_hidden_by_room: None,
            exported_room_names: BTreeSet::new(),
            started: false,
            events: Vec::new(),
            processing_events: false,
            event_block_base_name: String::new(),
            blocking: BlockedOn::NOTHING,
            ui_disabled: 0,
            cursor_overridden: false,
            current_cursor: 0,
            script_stack: Vec::new(),
            in_claimable: 0,
            event_claimed: false,
            dialog_resolving: false,
            dialog_pending: DialogPending::None,
            frame: 0,
            frames_per_second: crate::tick::DEFAULT_FPS,
            last_frame_time: None,
            fast_forward: false,
            paused: false,
            quit_requested: false,
            gui_under_mouse: None,
            diag: Vec::new(),
        }
    }

    /// Loads the player character's starting room and marks the game as
    /// running. Must be called exactly once before the first tick.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            bail!("start called twice");
        }
        let player = self.world.player;
        let destination = self.world.player().room;
        if destination < 0 {
            bail!("player character has no starting room");
        }
        debug!("starting game in room {destination}");
        self.load_new_room(destination as u32, Some(player))
            .context("loading the starting room")
    }

    pub fn request_quit(&mut self) {
        self.quit_requested = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit_requested
    }

    pub fn displayed_room(&self) -> Option<u32> {
        self.room.as_ref().map(|room| room.number)
    }

    /// Monotonic count of completed room transitions; every loop in this
    /// core polls it to detect that its batch has been invalidated.
    pub fn room_change_counter(&self) -> u32 {
        self.room_changes
    }

    pub fn new_room_state(&self) -> NewRoomState {
        self.new_room_state
    }

    /// The GUI the mouse was last reported over, if any.
    pub fn gui_under_mouse(&self) -> Option<u32> {
        self.gui_under_mouse
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn set_fast_forward(&mut self, on: bool) {
        self.fast_forward = on;
    }

    pub fn set_cursor(&mut self, cursor: i32, overridden: bool) {
        self.current_cursor = cursor;
        self.cursor_overridden = overridden;
        self.draw.set_mouse_cursor(cursor);
    }

    /// Marks the current claimable event as handled, stopping the dispatch
    /// chain. Only valid from inside a claimable-event handler.
    pub fn claim_event(&mut self) -> Result<()> {
        if self.in_claimable == 0 {
            bail!("ClaimEvent called outside a claimable event handler");
        }
        self.event_claimed = true;
        Ok(())
    }

    /// Script-facing wait: spins the tick loop for `ticks` frames.
    pub fn wait(&mut self, ticks: i32) -> Result<()> {
        if ticks < 1 {
            bail!("Wait: time to wait must be positive, got {ticks}");
        }
        self.world.wait_counter = ticks;
        self.block_until(BlockedOnKind::WaitDone, 0)
    }

    /// Shows a message overlay and blocks until its timer runs out.
    pub fn display_message(&mut self, message: u32) -> Result<()> {
        let text = self.message_text(message)?.to_string();
        self.world.text_overlay_count += 1;
        self.world.message_time = 40 + text.chars().count() as i32;
        self.draw.show_message(&text);
        self.note(format!("message.show {message}"));
        self.block_until(BlockedOnKind::MessageDone, 0)
    }

    fn message_text(&self, message: u32) -> Result<&str> {
        // Numbers at or above 500 index the global message table.
        if message >= 500 {
            let index = (message - 500) as usize;
            match self.world.global_messages.get(index) {
                Some(text) => Ok(text),
                None => bail!("global message {message} does not exist"),
            }
        } else {
            let room = self
                .room
                .as_ref()
                .context("displaying a room message with no room loaded")?;
            match room.def.messages.get(message as usize) {
                Some(text) => Ok(text),
                None => bail!("room {} has no message {message}", room.number),
            }
        }
    }

    /// Runs a dialog topic, or defers it if scripts are mid-flight.
    pub fn run_dialog(&mut self, topic: i32) -> Result<()> {
        if let Some(frame) = self.script_stack.last_mut() {
            frame.pending_actions.push(PostScriptAction::RunDialog(topic));
            return Ok(());
        }
        self.do_run_dialog(topic)
    }

    pub(crate) fn do_run_dialog(&mut self, topic: i32) -> Result<()> {
        self.note(format!("dialog.run {topic}"));
        self.dialog_resolving = true;
        let request = self.gui.run_dialog(topic);
        self.dialog_resolving = false;

        let pending = std::mem::take(&mut self.dialog_pending);
        if let DialogPending::GoToRoom(room) = pending {
            return self.new_room(room);
        }
        match request {
            DialogRequest::GoToRoom(room) => self.new_room(room),
            DialogRequest::Stop | DialogRequest::Continue => Ok(()),
        }
    }
}
