//! A small three-room fixture game plus recording collaborator
//! implementations. The unit tests drive the engine through it, and the
//! demo binary plays it for a fixed number of frames.

use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use anyhow::{Context, Result};

use ags_script::events::{hotspot_event, room_event};
use ags_script::interaction::InteractionValue as V;
use ags_script::{
    CharacterDef, CommandList, EdgeDefs, GameDef, HotspotDef, Interaction, InteractionCommand,
    InteractionVariable, InventoryItemDef, Rect, RoomDef,
};

use crate::engine::{Engine, Hosts};
use crate::hosts::{
    AudioSink, DialogRequest, DrawSurface, GuiClick, GuiHost, InputEvent, InputSource, RoomSource,
    ScriptInstance, ScriptInstanceRef, ScriptState,
};

/// Shared append-only log the fixture collaborators write into.
pub type CallLog = Rc<RefCell<Vec<String>>>;

pub fn new_call_log() -> CallLog {
    Rc::new(RefCell::new(Vec::new()))
}

type Handler = Box<dyn FnMut(&mut Engine, &[i32]) -> Result<()>>;

/// A script instance driven by registered closures. Every call is recorded,
/// handled or not, so tests can assert on dispatch order.
pub struct ScriptedInstance {
    name: String,
    log: CallLog,
    handlers: BTreeMap<String, Handler>,
    running: bool,
    state: Rc<RefCell<Vec<u8>>>,
}

impl ScriptedInstance {
    pub fn new(name: &str, log: CallLog) -> Self {
        ScriptedInstance {
            name: name.to_string(),
            log,
            handlers: BTreeMap::new(),
            running: false,
            state: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn on(
        mut self,
        name: &str,
        handler: impl FnMut(&mut Engine, &[i32]) -> Result<()> + 'static,
    ) -> Self {
        self.handlers.insert(name.to_string(), Box::new(handler));
        self
    }

    /// Handle to the instance's persistent state, for closures that want to
    /// survive a save/restore cycle.
    pub fn state_cell(&self) -> Rc<RefCell<Vec<u8>>> {
        self.state.clone()
    }

    pub fn into_ref(self) -> ScriptInstanceRef {
        Rc::new(RefCell::new(self))
    }
}

impl ScriptInstance for ScriptedInstance {
    fn name(&self) -> &str {
        &self.name
    }

    fn exports_symbol(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn call(&mut self, engine: &mut Engine, name: &str, params: &[i32]) -> Result<()> {
        if params.is_empty() {
            self.log.borrow_mut().push(format!("{}.{name}", self.name));
        } else {
            self.log
                .borrow_mut()
                .push(format!("{}.{name}{params:?}", self.name));
        }
        self.running = true;
        let outcome = match self.handlers.get_mut(name) {
            Some(handler) => handler(engine, params),
            None => Ok(()),
        };
        self.running = false;
        outcome
    }

    fn save_state(&mut self) -> ScriptState {
        ScriptState(self.state.borrow().clone())
    }

    fn restore_state(&mut self, state: ScriptState) {
        *self.state.borrow_mut() = state.0;
    }
}

pub struct RecordingDraw {
    pub log: CallLog,
}

impl DrawSurface for RecordingDraw {
    fn render_frame(&mut self, frame: u64) {
        self.log.borrow_mut().push(format!("draw.frame {frame}"));
    }

    fn set_mouse_cursor(&mut self, cursor: i32) {
        self.log.borrow_mut().push(format!("draw.cursor {cursor}"));
    }

    fn set_viewport(&mut self, x: i32, y: i32) {
        self.log.borrow_mut().push(format!("draw.viewport {x},{y}"));
    }

    fn fade_in(&mut self) {
        self.log.borrow_mut().push("draw.fade_in".to_string());
    }

    fn show_message(&mut self, text: &str) {
        self.log.borrow_mut().push(format!("draw.message {text}"));
    }

    fn clear_message(&mut self) {}
}

pub struct RecordingAudio {
    pub log: CallLog,
}

impl AudioSink for RecordingAudio {
    fn stop_ambient(&mut self, channel: usize) {
        self.log
            .borrow_mut()
            .push(format!("audio.stop_ambient {channel}"));
    }

    fn play_sound(&mut self, sound: i32) {
        self.log.borrow_mut().push(format!("audio.sound {sound}"));
    }

    fn periodic_update(&mut self, _frame: u64) {}
}

/// Pre-scripted input: each poll pops one frame's worth of events.
#[derive(Default)]
pub struct ScriptedInput {
    pub frames: Rc<RefCell<VecDeque<Vec<InputEvent>>>>,
}

impl ScriptedInput {
    pub fn feed(&self, events: Vec<InputEvent>) {
        self.frames.borrow_mut().push_back(events);
    }
}

impl InputSource for ScriptedInput {
    fn poll(&mut self) -> Vec<InputEvent> {
        self.frames.borrow_mut().pop_front().unwrap_or_default()
    }
}

pub struct ScriptedGui {
    pub log: CallLog,
    pub dialog_result: Rc<RefCell<DialogRequest>>,
}

impl GuiHost for ScriptedGui {
    fn on_mouse_move(&mut self, _x: i32, _y: i32) -> Option<u32> {
        None
    }

    fn on_mouse_down(&mut self, _x: i32, _y: i32, _button: i32) -> GuiClick {
        GuiClick::NotOnGui
    }

    fn on_mouse_up(&mut self, _x: i32, _y: i32, _button: i32) {}

    fn run_dialog(&mut self, topic: i32) -> DialogRequest {
        self.log.borrow_mut().push(format!("gui.dialog {topic}"));
        *self.dialog_result.borrow()
    }

    fn invalidate(&mut self) {}
}

/// In-memory room data plus a forked script instance for room 2.
pub struct DemoRooms {
    pub defs: BTreeMap<u32, RoomDef>,
    pub log: CallLog,
}

impl RoomSource for DemoRooms {
    fn load_room(&mut self, number: u32) -> Result<RoomDef> {
        self.defs
            .get(&number)
            .cloned()
            .with_context(|| format!("no room {number} in demo data"))
    }

    fn compile_room_script(&mut self, number: u32) -> Result<Option<ScriptInstanceRef>> {
        if number != 2 {
            return Ok(None);
        }
        // A fresh fork per load; only the saved state survives revisits.
        let instance = ScriptedInstance::new("room2_script", self.log.clone());
        let state = instance.state_cell();
        let log = self.log.clone();
        let instance = instance
            .on("room_entered", move |_engine, _params| {
                let mut cell = state.borrow_mut();
                if cell.is_empty() {
                    cell.push(0);
                }
                cell[0] += 1;
                log.borrow_mut().push(format!("room2.visits {}", cell[0]));
                Ok(())
            })
            .on("room_leave_left", |engine, _params| {
                engine.schedule_new_room(1)
            });
        Ok(Some(instance.into_ref()))
    }
}

pub fn demo_game() -> GameDef {
    GameDef {
        title: "Demo Quest".to_string(),
        characters: vec![CharacterDef {
            name: "Ego".to_string(),
            script_name: "cEgo".to_string(),
            starting_room: 1,
            x: 160,
            y: 100,
            interaction: Interaction::default(),
        }],
        inventory: vec![
            InventoryItemDef {
                name: "Brass key".to_string(),
                interaction: Interaction::default(),
            },
            InventoryItemDef {
                name: "Rusty coin".to_string(),
                interaction: Interaction::default(),
            },
        ],
        player_character: 0,
        global_variables: vec![
            InteractionVariable::new("door_unlocked", 0),
            InteractionVariable::new("met_guard", 0),
        ],
        global_messages: vec!["Welcome to the demo.".to_string()],
        options: Default::default(),
    }
}

pub fn demo_rooms() -> BTreeMap<u32, RoomDef> {
    let mut defs = BTreeMap::new();

    // Room 1: legacy command-tree interactions. Clicking the door scores
    // once and walks through; the right edge also leads to room 2.
    defs.insert(
        1,
        RoomDef {
            number: 1,
            hotspots: vec![HotspotDef {
                name: "Door".to_string(),
                script_name: "hDoor".to_string(),
                area: Some(Rect::new(200, 60, 240, 140)),
                interaction: Interaction::legacy([(
                    hotspot_event::ANY_CLICK,
                    CommandList::new(vec![
                        InteractionCommand::AddScoreOnce {
                            points: V::literal(5),
                        },
                        InteractionCommand::PlaySound {
                            sound: V::literal(3),
                        },
                        InteractionCommand::NewRoom {
                            room: V::literal(2),
                        },
                    ]),
                )]),
            }],
            edges: EdgeDefs {
                left: 10,
                right: 310,
                top: 10,
                bottom: 190,
            },
            interaction: Interaction::legacy([(
                room_event::EDGE_RIGHT,
                CommandList::new(vec![InteractionCommand::NewRoom {
                    room: V::literal(2),
                }]),
            )]),
            local_variables: vec![InteractionVariable::new("lever_pulled", 0)],
            messages: vec![
                "The door is locked.".to_string(),
                "You hear distant machinery.".to_string(),
            ],
            ..RoomDef::default()
        },
    );

    // Room 2: named-handler interactions backed by a forked room script.
    defs.insert(
        2,
        RoomDef {
            number: 2,
            edges: EdgeDefs {
                left: 10,
                right: 310,
                top: 10,
                bottom: 190,
            },
            interaction: Interaction::scripts([
                (
                    room_event::ENTERS_AFTER_FADE_IN,
                    "room_entered".to_string(),
                ),
                (room_event::EDGE_LEFT, "room_leave_left".to_string()),
            ]),
            ..RoomDef::default()
        },
    );

    defs.insert(
        3,
        RoomDef {
            number: 3,
            ..RoomDef::default()
        },
    );

    defs
}

/// The full fixture: engine wired to recording collaborators, plus handles
/// to the shared log and the scripted input queue.
pub struct DemoFixture {
    pub engine: Engine,
    pub log: CallLog,
    pub input: Rc<RefCell<VecDeque<Vec<InputEvent>>>>,
    pub dialog_result: Rc<RefCell<DialogRequest>>,
}

impl DemoFixture {
    pub fn feed(&self, events: Vec<InputEvent>) {
        self.input.borrow_mut().push_back(events);
    }

    pub fn log_contains(&self, needle: &str) -> bool {
        self.log.borrow().iter().any(|line| line.contains(needle))
    }

    pub fn log_count(&self, needle: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

pub fn build_demo_engine() -> DemoFixture {
    let log = new_call_log();
    let input = ScriptedInput::default();
    let input_frames = input.frames.clone();
    let dialog_result = Rc::new(RefCell::new(DialogRequest::Stop));

    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("on_event", |_engine, _params| Ok(()))
        .on("unhandled_event", |_engine, _params| Ok(()))
        .on("repeatedly_execute", |_engine, _params| Ok(()))
        .into_ref();

    let hosts = Hosts {
        room_source: Box::new(DemoRooms {
            defs: demo_rooms(),
            log: log.clone(),
        }),
        game_script: Some(game_script),
        module_scripts: Vec::new(),
        draw: Box::new(RecordingDraw { log: log.clone() }),
        audio: Box::new(RecordingAudio { log: log.clone() }),
        input: Box::new(input),
        gui: Box::new(ScriptedGui {
            log: log.clone(),
            dialog_result: dialog_result.clone(),
        }),
    };

    let engine = Engine::new(demo_game(), hosts);
    DemoFixture {
        engine,
        log,
        input: input_frames,
        dialog_result,
    }
}

/// A started engine in room 1, fast-forwarded so tests never sleep.
#[cfg(test)]
pub(crate) fn test_engine() -> Engine {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().expect("demo game starts");
    fixture.engine
}
