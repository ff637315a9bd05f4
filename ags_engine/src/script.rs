//! The script call adapter: queuing semantics around the VM collaborator,
//! the nested running-scripts stack, and the two-phase drain of deferred
//! actions and queued scripts once a call unwinds. This is how a script can
//! request "change the room" or "run this other script" from deep inside a
//! call stack without the request executing before the frame has returned.

use std::rc::Rc;

use anyhow::{bail, Context, Result};
use log::{debug, warn};

use crate::engine::{DialogPending, Engine};
use crate::hosts::ScriptInstanceRef;

pub const REP_EXEC_NAME: &str = "repeatedly_execute";
pub const REP_EXEC_ALWAYS_NAME: &str = "repeatedly_execute_always";

/// Entry points that use the claimable-event protocol: the room script gets
/// first refusal, then each module in turn, then the game script.
const CLAIMABLE_FUNCTIONS: [&str; 3] = ["on_key_press", "on_mouse_click", "on_event"];

/// Codes passed to the global `on_event` hook.
pub mod on_event {
    pub const GOT_SCORE: i32 = 0;
    pub const LOSE_INVENTORY: i32 = 1;
    pub const ADD_INVENTORY: i32 = 2;
    pub const ENTER_ROOM: i32 = 3;
    pub const LEAVE_ROOM: i32 = 4;
    pub const RESTORE_GAME: i32 = 5;
}

/// Which VM instance a queued call is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptTarget {
    Game,
    Room,
}

/// A script call deferred until the current frame unwinds.
#[derive(Debug, Clone)]
pub struct QueuedScript {
    pub name: String,
    pub target: ScriptTarget,
    pub params: Vec<i32>,
}

/// An engine action deferred until the current frame unwinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScriptAction {
    NewRoom(i32),
    RunDialog(i32),
    StopDialog,
    RestartGame,
    SaveGame(i32),
    RestoreGame(i32),
    QuitGame,
}

/// One entry on the running-scripts stack.
pub struct RunningScriptFrame {
    pub(crate) instance: ScriptInstanceRef,
    pub(crate) pending_actions: Vec<PostScriptAction>,
    pub(crate) pending_scripts: Vec<QueuedScript>,
}

impl RunningScriptFrame {
    fn new(instance: ScriptInstanceRef) -> Self {
        RunningScriptFrame {
            instance,
            pending_actions: Vec::new(),
            pending_scripts: Vec::new(),
        }
    }
}

impl Engine {
    fn instance_for(&self, target: ScriptTarget) -> Option<ScriptInstanceRef> {
        match target {
            ScriptTarget::Game => self.game_script.clone(),
            ScriptTarget::Room => self.room.as_ref().and_then(|room| room.script.clone()),
        }
    }

    pub fn running_script_depth(&self) -> usize {
        self.script_stack.len()
    }

    /// Queues a deferred action on the innermost running frame, or applies
    /// it now if no script is mid-flight.
    pub fn defer_post_script_action(&mut self, action: PostScriptAction) -> Result<()> {
        if let Some(frame) = self.script_stack.last_mut() {
            frame.pending_actions.push(action);
            return Ok(());
        }
        self.apply_post_script_action(action)
    }

    /// A script already executing must not be re-entered synchronously by a
    /// side effect of its own partial execution, so calls made while any
    /// script is running are parked on the innermost frame instead.
    pub fn queue_or_run_text_script(
        &mut self,
        target: ScriptTarget,
        name: &str,
        params: &[i32],
    ) -> Result<()> {
        if let Some(frame) = self.script_stack.last_mut() {
            frame.pending_scripts.push(QueuedScript {
                name: name.to_string(),
                target,
                params: params.to_vec(),
            });
            return Ok(());
        }
        self.run_text_script(target, name, params)
    }

    pub fn run_text_script(
        &mut self,
        target: ScriptTarget,
        name: &str,
        params: &[i32],
    ) -> Result<()> {
        if name == REP_EXEC_NAME && params.is_empty() {
            return self.run_repeatedly_execute();
        }
        if !params.is_empty() && CLAIMABLE_FUNCTIONS.contains(&name) {
            return self.run_claimable_event(name, params);
        }
        let Some(instance) = self.instance_for(target) else {
            if target == ScriptTarget::Room {
                bail!("no room script instance to run {name}");
            }
            return Ok(());
        };
        // Room scripts are assumed complete; gaps elsewhere are tolerated.
        let must_exist = target == ScriptTarget::Room;
        self.run_script_function(&instance, name, params, must_exist)
    }

    fn run_repeatedly_execute(&mut self) -> Result<()> {
        let room_was = self.room_changes;
        for module in self.module_scripts.clone() {
            self.run_script_function(&module, REP_EXEC_NAME, &[], false)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }
        if let Some(game) = self.game_script.clone() {
            self.run_script_function(&game, REP_EXEC_NAME, &[], false)?;
        }
        Ok(())
    }

    /// The always-variant runs even while blocked, and also visits the room
    /// script.
    pub(crate) fn run_repeatedly_execute_always(&mut self) -> Result<()> {
        let room_was = self.room_changes;
        for module in self.module_scripts.clone() {
            self.run_script_function(&module, REP_EXEC_ALWAYS_NAME, &[], false)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }
        if let Some(game) = self.game_script.clone() {
            self.run_script_function(&game, REP_EXEC_ALWAYS_NAME, &[], false)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }
        if let Some(room_script) = self.room.as_ref().and_then(|room| room.script.clone()) {
            self.run_script_function(&room_script, REP_EXEC_ALWAYS_NAME, &[], false)?;
        }
        Ok(())
    }

    fn run_claimable_event(&mut self, name: &str, params: &[i32]) -> Result<()> {
        self.event_claimed = false;
        self.in_claimable += 1;
        let chain_result = self.dispatch_claimable(name, params);
        self.in_claimable -= 1;
        let claimed = std::mem::replace(&mut self.event_claimed, false);
        if chain_result? || claimed {
            return Ok(());
        }
        if let Some(game) = self.game_script.clone() {
            self.run_script_function(&game, name, params, false)?;
        }
        Ok(())
    }

    /// Returns true when the chain should stop before reaching the game
    /// script: someone claimed the event, the room changed, or a quit was
    /// requested.
    fn dispatch_claimable(&mut self, name: &str, params: &[i32]) -> Result<bool> {
        let room_was = self.room_changes;
        let mut chain: Vec<ScriptInstanceRef> = Vec::new();
        if let Some(room_script) = self.room.as_ref().and_then(|room| room.script.clone()) {
            chain.push(room_script);
        }
        chain.extend(self.module_scripts.iter().cloned());
        for instance in chain {
            self.run_script_function(&instance, name, params, false)?;
            if self.event_claimed || self.quit_requested || self.room_changes != room_was {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Prepares a frame, delegates the call to the VM, and drains what the
    /// call left behind.
    pub fn run_script_function(
        &mut self,
        instance: &ScriptInstanceRef,
        name: &str,
        params: &[i32],
        must_exist: bool,
    ) -> Result<()> {
        {
            let callable = match instance.try_borrow() {
                Ok(guard) => {
                    if !guard.exports_symbol(name) {
                        if must_exist {
                            bail!("script function {name} missing from {}", guard.name());
                        }
                        return Ok(());
                    }
                    !guard.is_running()
                }
                Err(_) => false,
            };
            if !callable {
                warn!("script function {name} called while its instance is already running; ignored");
                return Ok(());
            }
        }

        debug!("running script function {name}");
        self.script_stack.push(RunningScriptFrame::new(instance.clone()));
        {
            let mut guard = instance.borrow_mut();
            let outcome = guard.call(self, name, params);
            outcome.with_context(|| format!("running script function {name} on {}", guard.name()))?;
        }
        self.post_script_cleanup(instance)
    }

    /// Pops this call's frame and drains it: deferred actions first, queued
    /// scripts second, both in insertion order, both abandoned the moment a
    /// room change or quit voids the rest.
    fn post_script_cleanup(&mut self, instance: &ScriptInstanceRef) -> Result<()> {
        let top_matches = self
            .script_stack
            .last()
            .map(|frame| Rc::ptr_eq(&frame.instance, instance))
            .unwrap_or(false);
        if !top_matches {
            // A transition discarded the stack while this call was unwinding.
            return Ok(());
        }
        let frame = self.script_stack.pop().expect("top frame checked above");

        let room_was = self.room_changes;
        for action in frame.pending_actions {
            self.apply_post_script_action(action)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }
        for queued in frame.pending_scripts {
            self.run_text_script(queued.target, &queued.name, &queued.params)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }
        Ok(())
    }

    fn apply_post_script_action(&mut self, action: PostScriptAction) -> Result<()> {
        match action {
            PostScriptAction::NewRoom(room) => self.new_room(room),
            PostScriptAction::RunDialog(topic) => self.do_run_dialog(topic),
            PostScriptAction::StopDialog => {
                self.dialog_pending = DialogPending::Stop;
                Ok(())
            }
            PostScriptAction::QuitGame => {
                self.request_quit();
                Ok(())
            }
            PostScriptAction::RestartGame => {
                bail!("RestartGame requested but no session collaborator is wired")
            }
            PostScriptAction::SaveGame(slot) => {
                bail!("SaveGame({slot}) requested but persistence is not wired")
            }
            PostScriptAction::RestoreGame(slot) => {
                bail!("RestoreGame({slot}) requested but persistence is not wired")
            }
        }
    }

    pub(crate) fn run_on_event(&mut self, code: i32, data: i32) -> Result<()> {
        self.run_text_script(ScriptTarget::Game, "on_event", &[code, data])
    }
}
