use serde::{Deserialize, Serialize};

use crate::interaction::{Interaction, InteractionVariable};

/// Highest room number a game may reference. Anything above this is corrupt
/// data.
pub const MAX_ROOM_NUMBER: u32 = 999;

/// Rooms numbered below this keep their script state cached across visits;
/// rooms at or above it are never revisited and are destroyed on leave.
pub const ROOM_CACHE_LIMIT: u32 = 300;

/// Axis-aligned area in room coordinates, inclusive on all edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }
}

/// Load-time hotspot record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HotspotDef {
    pub name: String,
    pub script_name: String,
    pub area: Option<Rect>,
    pub interaction: Interaction,
}

/// Load-time region record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionDef {
    pub area: Option<Rect>,
    pub interaction: Interaction,
}

/// Load-time room object record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub script_name: String,
    pub x: i32,
    pub y: i32,
    pub visible: bool,
    pub interaction: Interaction,
}

/// Screen-edge thresholds used by the walk-off checks.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EdgeDefs {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Default for EdgeDefs {
    fn default() -> Self {
        Self {
            left: 0,
            right: 320,
            top: 0,
            bottom: 200,
        }
    }
}

/// Room-mandated player overrides applied on entry.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RoomOptions {
    pub hide_player: bool,
    pub player_view: Option<u32>,
}

/// Everything the engine needs about a room, as produced by the game-data
/// parser collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomDef {
    pub number: u32,
    pub hotspots: Vec<HotspotDef>,
    pub regions: Vec<RegionDef>,
    pub objects: Vec<ObjectDef>,
    pub edges: EdgeDefs,
    pub walkable_areas: usize,
    pub interaction: Interaction,
    pub local_variables: Vec<InteractionVariable>,
    pub messages: Vec<String>,
    pub options: RoomOptions,
}

/// Load-time character record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterDef {
    pub name: String,
    pub script_name: String,
    pub starting_room: u32,
    pub x: i32,
    pub y: i32,
    pub interaction: Interaction,
}

/// Load-time inventory item record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryItemDef {
    pub name: String,
    pub interaction: Interaction,
}

/// Game-wide option flags that this core consults.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GameOptions {
    pub ambient_sounds_persist: bool,
}

/// The pre-authored game definition handed to the engine at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameDef {
    pub title: String,
    pub characters: Vec<CharacterDef>,
    pub inventory: Vec<InventoryItemDef>,
    pub player_character: usize,
    pub global_variables: Vec<InteractionVariable>,
    pub global_messages: Vec<String>,
    pub options: GameOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_contains_is_inclusive() {
        let rect = Rect::new(10, 10, 20, 20);
        assert!(rect.contains(10, 10));
        assert!(rect.contains(20, 20));
        assert!(!rect.contains(21, 20));
        assert!(!rect.contains(9, 15));
    }

    #[test]
    fn room_def_serializes_round_trip() {
        let def = RoomDef {
            number: 3,
            hotspots: vec![HotspotDef {
                name: "Door".into(),
                script_name: "hDoor".into(),
                area: Some(Rect::new(0, 0, 40, 40)),
                interaction: Interaction::default(),
            }],
            ..RoomDef::default()
        };
        let json = serde_json::to_string(&def).expect("room def serializes");
        let back: RoomDef = serde_json::from_str(&json).expect("room def deserializes");
        assert_eq!(back.number, 3);
        assert_eq!(back.hotspots[0].script_name, "hDoor");
    }
}
