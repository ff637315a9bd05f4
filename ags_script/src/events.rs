use serde::{Deserialize, Serialize};

/// Hard cap on queued events per frame. Overflowing it means an event storm
/// (usually a handler enqueueing from a nested wait loop) and is fatal.
pub const MAX_QUEUED_EVENTS: usize = 60;

/// Kinds of queued game events, drained once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameEventKind {
    TextScript,
    RunEventBlock,
    AfterFadeIn,
    InterfaceClick,
    NewRoom,
}

/// A pending game event. Immutable once enqueued; consumed exactly once per
/// processing pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: GameEventKind,
    pub data1: i32,
    pub data2: i32,
    pub data3: i32,
    pub player: i32,
}

/// Sub-kinds carried in `data1` of a `TextScript` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextScriptKind {
    RepeatedlyExecute = 1,
    OnKeyPress = 2,
    OnMouseClick = 3,
}

impl TextScriptKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::RepeatedlyExecute),
            2 => Some(Self::OnKeyPress),
            3 => Some(Self::OnMouseClick),
            _ => None,
        }
    }

    /// Script entry point dispatched for this sub-kind.
    pub fn function_name(self) -> &'static str {
        match self {
            Self::RepeatedlyExecute => "repeatedly_execute",
            Self::OnKeyPress => "on_key_press",
            Self::OnMouseClick => "on_mouse_click",
        }
    }
}

/// Entity class carried in `data1` of a `RunEventBlock` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventBlockKind {
    Hotspot = 1,
    Room = 2,
}

impl EventBlockKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Hotspot),
            2 => Some(Self::Room),
            _ => None,
        }
    }
}

/// Room event-block slots (legacy numbering preserved from the game data).
pub mod room_event {
    pub const EDGE_LEFT: u32 = 0;
    pub const EDGE_RIGHT: u32 = 1;
    pub const EDGE_BOTTOM: u32 = 2;
    pub const EDGE_TOP: u32 = 3;
    pub const FIRST_TIME_ENTERS: u32 = 4;
    pub const ENTERS_BEFORE_FADE_IN: u32 = 5;
    pub const REP_EXEC: u32 = 6;
    pub const ENTERS_AFTER_FADE_IN: u32 = 7;
    pub const PLAYER_LEAVES: u32 = 8;
}

/// Hotspot event-block slots.
pub mod hotspot_event {
    pub const STANDS_ON: u32 = 0;
    pub const ANY_CLICK: u32 = 4;
}

/// Region event-block slots.
pub mod region_event {
    pub const STANDS_ON: u32 = 0;
    pub const WALKS_ONTO: u32 = 1;
    pub const WALKS_OFF: u32 = 2;
}

/// Gate for what gameplay logic may run on the frame(s) around a room
/// transition. Reset to `None` exactly once per frame after event processing.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewRoomState {
    #[default]
    None,
    New,
    FirstTime,
    SavedGame,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_script_codes_round_trip() {
        for kind in [
            TextScriptKind::RepeatedlyExecute,
            TextScriptKind::OnKeyPress,
            TextScriptKind::OnMouseClick,
        ] {
            assert_eq!(TextScriptKind::from_code(kind as i32), Some(kind));
        }
        assert_eq!(TextScriptKind::from_code(99), None);
    }

    #[test]
    fn event_block_codes_round_trip() {
        assert_eq!(EventBlockKind::from_code(1), Some(EventBlockKind::Hotspot));
        assert_eq!(EventBlockKind::from_code(2), Some(EventBlockKind::Room));
        assert_eq!(EventBlockKind::from_code(0), None);
    }
}
