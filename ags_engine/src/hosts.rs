//! Collaborator interfaces. Everything this core does not own — the bytecode
//! VM, the renderer, the mixer, the GUI widget layer, the game-data parser —
//! sits behind one of these traits.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;

use ags_script::RoomDef;

use crate::engine::Engine;

/// Ambient sound channels the original mixer exposes.
pub const AMBIENT_CHANNELS: usize = 8;

/// Cursor shape forced during a blocking wait.
pub const CURSOR_WAIT: i32 = 6;

/// Opaque suspended-VM snapshot, produced when a cacheable room is unloaded
/// and handed back when the room is revisited.
#[derive(Debug, Default, Clone)]
pub struct ScriptState(pub Vec<u8>);

/// One compiled script instance (the game script, a script module, or a
/// room script). The engine never executes bytecode itself; it only calls
/// named entry points and reacts to what the script asked for via the
/// `Engine` handle passed back in.
pub trait ScriptInstance {
    fn name(&self) -> &str;

    /// Whether the named entry point exists on this instance.
    fn exports_symbol(&self, name: &str) -> bool;

    /// Whether the instance is already mid-call. Re-entering a running
    /// instance is tolerated as a warning, not an error.
    fn is_running(&self) -> bool {
        false
    }

    /// Run a named entry point. A failure here is fatal to the process.
    fn call(&mut self, engine: &mut Engine, name: &str, params: &[i32]) -> Result<()>;

    fn save_state(&mut self) -> ScriptState {
        ScriptState::default()
    }

    fn restore_state(&mut self, _state: ScriptState) {}
}

pub type ScriptInstanceRef = Rc<RefCell<dyn ScriptInstance>>;

/// The game-data parser collaborator: loads room definitions from disk and
/// forks room-script instances off the loaded bytecode.
pub trait RoomSource {
    fn load_room(&mut self, number: u32) -> Result<RoomDef>;

    fn compile_room_script(&mut self, number: u32) -> Result<Option<ScriptInstanceRef>>;
}

/// The rasterizer collaborator. Invoked, never introspected.
pub trait DrawSurface {
    fn render_frame(&mut self, frame: u64);
    fn set_mouse_cursor(&mut self, cursor: i32);
    fn set_viewport(&mut self, x: i32, y: i32);
    fn fade_in(&mut self);
    fn show_message(&mut self, text: &str);
    fn clear_message(&mut self);
}

/// The audio mixer collaborator. No state is read back into this core.
pub trait AudioSink {
    fn stop_ambient(&mut self, channel: usize);
    fn play_sound(&mut self, sound: i32);

    /// Volume/directional refresh, called on a frame-count cadence.
    fn periodic_update(&mut self, frame: u64);
}

/// Raw input pulled once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    KeyPress(i32),
    MouseMove { x: i32, y: i32 },
    MouseDown { button: i32, x: i32, y: i32 },
    MouseUp { button: i32, x: i32, y: i32 },
}

pub trait InputSource {
    fn poll(&mut self) -> Vec<InputEvent>;
}

/// Result of offering a mouse press to the GUI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuiClick {
    NotOnGui,
    Interface { interface: i32, control: i32 },
}

/// What the dialog system wants done once a topic finishes resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogRequest {
    Continue,
    Stop,
    GoToRoom(i32),
}

/// The GUI widget and dialog-tree collaborator: click/hover dispatch plus
/// the dialog runner. Rendering stays on the other side of this trait.
pub trait GuiHost {
    /// Returns the id of the GUI now under the mouse, if any.
    fn on_mouse_move(&mut self, x: i32, y: i32) -> Option<u32>;
    fn on_mouse_down(&mut self, x: i32, y: i32, button: i32) -> GuiClick;
    fn on_mouse_up(&mut self, x: i32, y: i32, button: i32);
    fn run_dialog(&mut self, topic: i32) -> DialogRequest;
    fn invalidate(&mut self);
}
