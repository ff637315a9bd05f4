//! Behavioral-compatibility runtime core for games authored against the
//! original closed interpreter: the per-frame tick loop, the room transition
//! state machine, the queued game-event dispatcher, the blocking/resume
//! model, and the legacy interaction-command interpreter.
//!
//! The bytecode VM, rasterizer, audio mixer, game-data parser, and GUI
//! renderer are collaborators behind the traits in [`hosts`]; this crate
//! reproduces the control flow that sits between them.

pub mod blocking;
pub mod demo;
pub mod diag;
pub mod engine;
pub mod events;
pub mod hosts;
pub mod interp;
pub mod rooms;
pub mod script;
pub mod tick;
pub mod world;

pub use blocking::{BlockedOn, BlockedOnKind};
pub use engine::{DialogPending, Engine, Hosts};
pub use hosts::{
    AudioSink, DialogRequest, DrawSurface, GuiClick, GuiHost, InputEvent, InputSource, RoomSource,
    ScriptInstance, ScriptState,
};
pub use interp::InteractionOwner;
pub use script::{PostScriptAction, ScriptTarget};
pub use tick::DEFAULT_FPS;
