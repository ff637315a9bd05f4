use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use ags_engine::blocking::BlockedOnKind;
use ags_engine::demo::{
    build_demo_engine, demo_game, demo_rooms, new_call_log, CallLog, DemoRooms, RecordingAudio,
    RecordingDraw, ScriptedGui, ScriptedInput, ScriptedInstance,
};
use ags_engine::hosts::{DialogRequest, GuiClick, GuiHost, InputEvent};
use ags_engine::{Engine, Hosts};
use ags_script::GameEventKind;

struct Fixture {
    engine: Engine,
    log: CallLog,
    input: Rc<RefCell<VecDeque<Vec<InputEvent>>>>,
}

impl Fixture {
    fn feed(&self, events: Vec<InputEvent>) {
        self.input.borrow_mut().push_back(events);
    }

    fn log_contains(&self, needle: &str) -> bool {
        self.log.borrow().iter().any(|line| line.contains(needle))
    }

    fn log_count(&self, needle: &str) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }
}

fn start_with_scripts(
    log: CallLog,
    game_script: ScriptedInstance,
    modules: Vec<ScriptedInstance>,
    gui: Option<Box<dyn GuiHost>>,
) -> Fixture {
    let input = ScriptedInput::default();
    let input_frames = input.frames.clone();
    let gui = gui.unwrap_or_else(|| {
        Box::new(ScriptedGui {
            log: log.clone(),
            dialog_result: Rc::new(RefCell::new(DialogRequest::Stop)),
        })
    });
    let hosts = Hosts {
        room_source: Box::new(DemoRooms {
            defs: demo_rooms(),
            log: log.clone(),
        }),
        game_script: Some(game_script.into_ref()),
        module_scripts: modules
            .into_iter()
            .map(ScriptedInstance::into_ref)
            .collect(),
        draw: Box::new(RecordingDraw { log: log.clone() }),
        audio: Box::new(RecordingAudio { log: log.clone() }),
        input: Box::new(input),
        gui,
    };
    let mut engine = Engine::new(demo_game(), hosts);
    engine.set_fast_forward(true);
    engine.start().expect("demo game starts");
    Fixture {
        engine,
        log,
        input: input_frames,
    }
}

#[test]
fn mouse_click_reaches_the_game_script() {
    let log = new_call_log();
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("on_mouse_click", |_engine, _params| Ok(()));
    let mut fixture = start_with_scripts(log, game_script, Vec::new(), None);

    fixture.feed(vec![InputEvent::MouseDown {
        button: 1,
        x: 50,
        y: 50,
    }]);
    fixture.engine.run_frames(2).unwrap();

    assert!(fixture.log_contains("globalscript.on_mouse_click[1]"));
}

#[test]
fn module_can_claim_a_key_press_before_the_game_script() {
    let log = new_call_log();
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("on_key_press", |_engine, _params| Ok(()));
    let module = ScriptedInstance::new("module1", log.clone())
        .on("on_key_press", |engine, _params| engine.claim_event());
    let mut fixture = start_with_scripts(log, game_script, vec![module], None);

    fixture.feed(vec![InputEvent::KeyPress(65)]);
    fixture.engine.run_frames(2).unwrap();

    assert!(fixture.log_contains("module1.on_key_press[65]"));
    assert!(!fixture.log_contains("globalscript.on_key_press"));
}

#[test]
fn scheduled_room_change_applies_only_after_the_script_returns() {
    let log = new_call_log();
    let observed = log.clone();
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("on_key_press", move |engine, _params| {
            engine.schedule_new_room(2)?;
            observed
                .borrow_mut()
                .push(format!("after-schedule room={:?}", engine.displayed_room()));
            Ok(())
        });
    let mut fixture = start_with_scripts(log, game_script, Vec::new(), None);

    fixture.feed(vec![InputEvent::KeyPress(13)]);
    fixture.engine.run_frames(2).unwrap();

    // The handler kept running in the old room; the transition waited.
    assert!(fixture.log_contains("after-schedule room=Some(1)"));
    assert_eq!(fixture.engine.displayed_room(), Some(2));
}

#[test]
fn revisiting_a_cached_room_restores_its_script_state() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();

    fixture.engine.schedule_new_room(2).unwrap();
    fixture.engine.run_frames(2).unwrap();
    fixture.engine.schedule_new_room(1).unwrap();
    fixture.engine.run_frames(2).unwrap();
    fixture.engine.schedule_new_room(2).unwrap();
    fixture.engine.run_frames(2).unwrap();

    let log = fixture.log.borrow();
    assert!(log.iter().any(|line| line == "room2.visits 1"));
    assert!(log.iter().any(|line| line == "room2.visits 2"));
}

#[test]
fn room_change_during_a_blocking_wait_cancels_it() {
    let log = new_call_log();
    let calls = Cell::new(0u32);
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("repeatedly_execute_always", move |engine, _params| {
            calls.set(calls.get() + 1);
            if calls.get() == 3 {
                engine.schedule_new_room(2)?;
            }
            Ok(())
        });
    let mut fixture = start_with_scripts(log, game_script, Vec::new(), None);

    let player = fixture.engine.world.player;
    fixture.engine.world.player_mut().walking = 1000;
    fixture
        .engine
        .block_until(BlockedOnKind::CharWalkDone, player as u32)
        .unwrap();

    assert_eq!(fixture.engine.displayed_room(), Some(2));
    assert_eq!(fixture.engine.world.player().walking, 0);
}

#[test]
fn wait_resumes_after_the_requested_ticks() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();

    let room_was = fixture.engine.room_change_counter();
    fixture.engine.wait(6).unwrap();
    assert_eq!(fixture.engine.room_change_counter(), room_was);
    assert_eq!(fixture.engine.world.wait_counter, 0);
}

#[test]
fn display_message_blocks_until_the_overlay_expires() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();

    fixture.engine.display_message(500).unwrap();

    assert!(fixture.log_contains("draw.message Welcome to the demo."));
    assert_eq!(fixture.engine.world.text_overlay_count, 0);
    assert!(fixture.engine.world.message_time < 0);
}

#[test]
fn walking_off_the_edge_changes_rooms() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();

    fixture.engine.world.player_mut().x = 315;
    fixture.engine.run_frames(1).unwrap();

    assert_eq!(fixture.engine.displayed_room(), Some(2));
}

#[test]
fn events_enqueued_during_a_drain_run_on_the_next_pass() {
    let log = new_call_log();
    let queued = Cell::new(false);
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("repeatedly_execute", move |engine, _params| {
            if !queued.get() {
                queued.set(true);
                engine.queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)?;
            }
            Ok(())
        });
    let mut fixture = start_with_scripts(log, game_script, Vec::new(), None);

    // Frame 1 runs the entry sequence (one fade). Frame 2 runs the handler,
    // whose event must wait for the pass after it.
    fixture.engine.run_frames(2).unwrap();
    assert_eq!(fixture.log_count("draw.fade_in"), 1);

    fixture.engine.run_frames(1).unwrap();
    assert_eq!(fixture.log_count("draw.fade_in"), 2);
}

#[test]
fn a_room_change_flushes_the_remaining_event_queue() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();
    fixture.engine.run_frames(1).unwrap();

    fixture
        .engine
        .queue_game_event(GameEventKind::NewRoom, 3, 0, 0)
        .unwrap();
    fixture
        .engine
        .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
        .unwrap();
    let fades_before = fixture.log_count("draw.fade_in");

    fixture.engine.process_all_game_events().unwrap();

    assert_eq!(fixture.engine.displayed_room(), Some(3));
    // The fade queued behind the transition was discarded with the old room.
    assert_eq!(fixture.log_count("draw.fade_in"), fades_before);
    assert_eq!(fixture.engine.pending_event_count(), 0);
}

#[test]
fn dialog_result_can_redirect_to_a_new_room() {
    let mut fixture = build_demo_engine();
    fixture.engine.set_fast_forward(true);
    fixture.engine.start().unwrap();
    *fixture.dialog_result.borrow_mut() = DialogRequest::GoToRoom(3);

    fixture.engine.run_dialog(7).unwrap();

    assert!(fixture.log.borrow().iter().any(|line| line == "gui.dialog 7"));
    assert_eq!(fixture.engine.displayed_room(), Some(3));
}

struct InterfaceGui;

impl GuiHost for InterfaceGui {
    fn on_mouse_move(&mut self, _x: i32, _y: i32) -> Option<u32> {
        Some(0)
    }

    fn on_mouse_down(&mut self, _x: i32, _y: i32, _button: i32) -> GuiClick {
        GuiClick::Interface {
            interface: 2,
            control: 7,
        }
    }

    fn on_mouse_up(&mut self, _x: i32, _y: i32, _button: i32) {}

    fn run_dialog(&mut self, _topic: i32) -> DialogRequest {
        DialogRequest::Stop
    }

    fn invalidate(&mut self) {}
}

#[test]
fn clicks_on_an_interface_reach_interface_click() {
    let log = new_call_log();
    let game_script = ScriptedInstance::new("globalscript", log.clone())
        .on("interface_click", |_engine, _params| Ok(()));
    let mut fixture =
        start_with_scripts(log, game_script, Vec::new(), Some(Box::new(InterfaceGui)));

    fixture.feed(vec![InputEvent::MouseDown {
        button: 1,
        x: 10,
        y: 10,
    }]);
    fixture.engine.run_frames(2).unwrap();

    assert!(fixture.log_contains("globalscript.interface_click[2, 7]"));
}
