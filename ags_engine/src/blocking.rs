//! The blocking/resume model: one "what are we waiting for" condition at a
//! time, satisfied by spinning the full tick loop. Nested waits save and
//! restore the outer condition around their own.

use anyhow::{bail, Result};
use log::{trace, warn};

use crate::engine::Engine;
use crate::hosts::CURSOR_WAIT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockedOnKind {
    Nothing,
    NoTextOverlay,
    MessageDone,
    WaitDone,
    CharAnimDone,
    CharWalkDone,
    ObjMoveDone,
    ObjCycleDone,
}

/// The active blocking condition plus its target id (character or object
/// index, ignored by the untargeted kinds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockedOn {
    pub kind: BlockedOnKind,
    pub id: u32,
}

impl BlockedOn {
    pub const NOTHING: BlockedOn = BlockedOn {
        kind: BlockedOnKind::Nothing,
        id: 0,
    };

    pub fn is_blocked(&self) -> bool {
        self.kind != BlockedOnKind::Nothing
    }
}

impl Engine {
    /// Spins the tick loop until the condition is satisfied or the game is
    /// asked to quit. The tick loop performs the satisfied-wait cleanup
    /// frame itself; a room change mid-wait clears the condition, which
    /// exits this loop the same way.
    pub fn block_until(&mut self, kind: BlockedOnKind, id: u32) -> Result<()> {
        if kind == BlockedOnKind::Nothing {
            bail!("block_until called with nothing to wait for");
        }
        if self.in_enters_screen > 0 {
            // Scripts are meant to use the after-fade-in event for this.
            if self.frame <= 1 {
                bail!("cannot block the game inside an enters-screen event on the first frame");
            }
            warn!("blocking call inside an enters-screen event");
        }
        trace!("blocking on {kind:?} (id {id})");
        let saved = self.blocking;
        self.blocking = BlockedOn { kind, id };
        self.ui_disabled += 1;
        if !self.cursor_overridden {
            self.draw.set_mouse_cursor(CURSOR_WAIT);
        }
        while !self.quit_requested {
            self.tick_game()?;
            if !self.blocking.is_blocked() {
                break;
            }
        }
        self.blocking = saved;
        Ok(())
    }

    /// Pure read of collaborator state: reports `Nothing` once the active
    /// condition is satisfied, the condition itself otherwise. Calling this
    /// while not blocking is a programmer error.
    pub fn check_blocking_until(&self) -> Result<BlockedOnKind> {
        let BlockedOn { kind, id } = self.blocking;
        let satisfied = match kind {
            BlockedOnKind::Nothing => {
                bail!("check_blocking_until called while nothing is blocking")
            }
            BlockedOnKind::NoTextOverlay => self.world.text_overlay_count == 0,
            BlockedOnKind::MessageDone => self.world.message_time < 0,
            BlockedOnKind::WaitDone => self.world.wait_counter == 0,
            BlockedOnKind::CharAnimDone => self.world.character(id as usize)?.animating == 0,
            BlockedOnKind::CharWalkDone => self.world.character(id as usize)?.walking == 0,
            BlockedOnKind::ObjMoveDone => self.room_object(id as usize)?.moving == 0,
            BlockedOnKind::ObjCycleDone => self.room_object(id as usize)?.cycling == 0,
        };
        Ok(if satisfied { BlockedOnKind::Nothing } else { kind })
    }

    /// The cleanup frame for a wait that just resolved: lower the
    /// UI-disabled counter and put the cursor back.
    pub(crate) fn resolve_blocking(&mut self) {
        self.blocking = BlockedOn::NOTHING;
        self.ui_disabled = self.ui_disabled.saturating_sub(1);
        if !self.cursor_overridden {
            let cursor = self.current_cursor;
            self.draw.set_mouse_cursor(cursor);
        }
    }

    /// A room change invalidates any wait in flight.
    pub(crate) fn cancel_blocking_for_room_change(&mut self) {
        if self.blocking.is_blocked() {
            self.resolve_blocking();
        }
    }
}
