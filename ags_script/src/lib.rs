//! Shared data model for the AGS-compatible runtime.
//!
//! Games authored against the original interpreter describe their behavior
//! through two generations of interaction data: the legacy command-tree
//! encoding and the newer named-handler encoding. Exactly one of the two is
//! populated per entity, decided once at load time by the game-data version.
//! This crate keeps those records, the queued game-event types, and the
//! load-time definition structs in one place so the engine and its hosts
//! stay interoperable.

pub mod defs;
pub mod events;
pub mod interaction;

pub use defs::{
    CharacterDef, EdgeDefs, GameDef, GameOptions, HotspotDef, InventoryItemDef, ObjectDef, Rect,
    RegionDef, RoomDef, RoomOptions, MAX_ROOM_NUMBER, ROOM_CACHE_LIMIT,
};
pub use events::{
    EventBlockKind, GameEvent, GameEventKind, NewRoomState, TextScriptKind, MAX_QUEUED_EVENTS,
};
pub use interaction::{
    CommandList, Interaction, InteractionCommand, InteractionScripts, InteractionValue,
    InteractionVariable, NewInteraction, ValueKind, VariableError, LOCAL_VARIABLE_OFFSET,
};
