use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Variable slots at or above this offset index into the room-local table;
/// slots below it index into the global table.
pub const LOCAL_VARIABLE_OFFSET: u32 = 10_000;

/// How a command argument resolves to a concrete integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    Literal,
    Variable,
    Boolean,
    CharacterId,
}

/// One typed command argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionValue {
    pub kind: ValueKind,
    pub value: i32,
}

impl InteractionValue {
    pub fn literal(value: i32) -> Self {
        Self {
            kind: ValueKind::Literal,
            value,
        }
    }

    pub fn variable(slot: u32) -> Self {
        Self {
            kind: ValueKind::Variable,
            value: slot as i32,
        }
    }

    pub fn character(id: i32) -> Self {
        Self {
            kind: ValueKind::CharacterId,
            value: id,
        }
    }
}

/// A named interaction variable. Globals live in the game definition,
/// locals in each room definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionVariable {
    pub name: String,
    pub value: i32,
}

impl InteractionVariable {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Errors from resolving a variable slot against the split tables. An
/// out-of-range slot means corrupt game data and is fatal to the caller.
#[derive(Debug, Error)]
pub enum VariableError {
    #[error("local variable slot {slot} out of range (room has {len} locals)")]
    LocalOutOfRange { slot: u32, len: usize },
    #[error("global variable slot {slot} out of range (game has {len} globals)")]
    GlobalOutOfRange { slot: u32, len: usize },
}

/// Resolve a variable slot to its current value.
pub fn resolve_variable(
    slot: u32,
    globals: &[InteractionVariable],
    locals: &[InteractionVariable],
) -> Result<i32, VariableError> {
    if slot >= LOCAL_VARIABLE_OFFSET {
        let index = (slot - LOCAL_VARIABLE_OFFSET) as usize;
        locals
            .get(index)
            .map(|var| var.value)
            .ok_or(VariableError::LocalOutOfRange {
                slot,
                len: locals.len(),
            })
    } else {
        globals
            .get(slot as usize)
            .map(|var| var.value)
            .ok_or(VariableError::GlobalOutOfRange {
                slot,
                len: globals.len(),
            })
    }
}

/// Resolve a variable slot to a mutable reference for assignment.
pub fn resolve_variable_mut<'a>(
    slot: u32,
    globals: &'a mut [InteractionVariable],
    locals: &'a mut [InteractionVariable],
) -> Result<&'a mut i32, VariableError> {
    if slot >= LOCAL_VARIABLE_OFFSET {
        let index = (slot - LOCAL_VARIABLE_OFFSET) as usize;
        let len = locals.len();
        locals
            .get_mut(index)
            .map(|var| &mut var.value)
            .ok_or(VariableError::LocalOutOfRange { slot, len })
    } else {
        let len = globals.len();
        globals
            .get_mut(slot as usize)
            .map(|var| &mut var.value)
            .ok_or(VariableError::GlobalOutOfRange { slot, len })
    }
}

/// One legacy interaction command. Conditional kinds own a nested child list
/// that runs only when the condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InteractionCommand {
    DoNothing,
    RunScript {
        name: String,
    },
    AddScore {
        points: InteractionValue,
    },
    AddScoreOnce {
        points: InteractionValue,
    },
    DisplayMessage {
        message: u32,
    },
    PlaySound {
        sound: InteractionValue,
    },
    NewRoom {
        room: InteractionValue,
    },
    NewRoomAtCoords {
        room: InteractionValue,
        x: i32,
        y: i32,
    },
    AddInventory {
        item: InteractionValue,
    },
    LoseInventory {
        item: InteractionValue,
    },
    SetVariable {
        variable: u32,
        value: InteractionValue,
    },
    StopCharacterWalking {
        character: InteractionValue,
    },
    ObjectOn {
        object: InteractionValue,
    },
    ObjectOff {
        object: InteractionValue,
    },
    EnableHotspot {
        hotspot: InteractionValue,
    },
    DisableHotspot {
        hotspot: InteractionValue,
    },
    RunDialog {
        topic: InteractionValue,
    },
    StopRunning,
    IfInvItemWasUsed {
        item: InteractionValue,
        then_run: CommandList,
    },
    IfHasInvItem {
        item: InteractionValue,
        then_run: CommandList,
    },
    IfCharacterMoving {
        character: InteractionValue,
        then_run: CommandList,
    },
    IfVariablesEqual {
        variable: u32,
        value: InteractionValue,
        then_run: CommandList,
    },
    /// A command opcode this port does not execute. Carried through loading
    /// so the interpreter can fail loudly instead of silently skipping it.
    Unsupported {
        opcode: u32,
    },
}

/// An ordered command sequence attached to one interaction response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommandList {
    pub commands: Vec<InteractionCommand>,
}

impl CommandList {
    pub fn new(commands: Vec<InteractionCommand>) -> Self {
        Self { commands }
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Legacy interaction encoding: event slot to command list. Read-only after
/// game-data load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewInteraction {
    pub responses: BTreeMap<u32, CommandList>,
}

impl NewInteraction {
    /// The response registered for an event, if it carries any commands.
    /// A response node with zero commands counts as no response, matching
    /// the original loader.
    pub fn response(&self, event: u32) -> Option<&CommandList> {
        self.responses.get(&event).filter(|list| !list.is_empty())
    }

    pub fn has_response(&self, event: u32) -> bool {
        self.response(event).is_some()
    }
}

/// Newer interaction encoding: event slot to named script entry point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionScripts {
    pub handlers: BTreeMap<u32, String>,
}

impl InteractionScripts {
    pub fn handler(&self, event: u32) -> Option<&str> {
        self.handlers
            .get(&event)
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }

    pub fn has_handler(&self, event: u32) -> bool {
        self.handler(event).is_some()
    }
}

/// The per-entity interaction payload. Exactly one encoding is populated,
/// chosen once by the game-data file version; the two are never mixed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Interaction {
    #[default]
    None,
    Legacy(NewInteraction),
    Script(InteractionScripts),
}

impl Interaction {
    pub fn legacy(responses: impl IntoIterator<Item = (u32, CommandList)>) -> Self {
        Self::Legacy(NewInteraction {
            responses: responses.into_iter().collect(),
        })
    }

    pub fn scripts(handlers: impl IntoIterator<Item = (u32, String)>) -> Self {
        Self::Script(InteractionScripts {
            handlers: handlers.into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variable_resolution_splits_tables_at_offset() {
        let globals = vec![InteractionVariable::new("score_gate", 3)];
        let locals = vec![InteractionVariable::new("door_open", 1)];

        assert_eq!(resolve_variable(0, &globals, &locals).unwrap(), 3);
        assert_eq!(
            resolve_variable(LOCAL_VARIABLE_OFFSET, &globals, &locals).unwrap(),
            1
        );
    }

    #[test]
    fn out_of_range_slots_are_errors() {
        let globals = vec![InteractionVariable::new("only", 0)];
        let locals: Vec<InteractionVariable> = Vec::new();

        assert!(matches!(
            resolve_variable(5, &globals, &locals),
            Err(VariableError::GlobalOutOfRange { slot: 5, .. })
        ));
        assert!(matches!(
            resolve_variable(LOCAL_VARIABLE_OFFSET + 2, &globals, &locals),
            Err(VariableError::LocalOutOfRange { .. })
        ));
    }

    #[test]
    fn assignment_targets_the_right_table() {
        let mut globals = vec![InteractionVariable::new("g", 0)];
        let mut locals = vec![InteractionVariable::new("l", 0)];

        *resolve_variable_mut(0, &mut globals, &mut locals).unwrap() = 7;
        *resolve_variable_mut(LOCAL_VARIABLE_OFFSET, &mut globals, &mut locals).unwrap() = 9;

        assert_eq!(globals[0].value, 7);
        assert_eq!(locals[0].value, 9);
    }

    #[test]
    fn empty_response_counts_as_no_response() {
        let interaction = NewInteraction {
            responses: [(4, CommandList::default())].into_iter().collect(),
        };
        assert!(!interaction.has_response(4));

        let interaction = NewInteraction {
            responses: [(4, CommandList::new(vec![InteractionCommand::DoNothing]))]
                .into_iter()
                .collect(),
        };
        assert!(interaction.has_response(4));
    }

    #[test]
    fn blank_handler_counts_as_no_handler() {
        let scripts = InteractionScripts {
            handlers: [(2, String::new()), (3, "hotspot2_Look".to_string())]
                .into_iter()
                .collect(),
        };
        assert!(!scripts.has_handler(2));
        assert_eq!(scripts.handler(3), Some("hotspot2_Look"));
    }
}
