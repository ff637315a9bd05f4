//! The queued game-event dispatcher: an ordered, append-only list of pending
//! events drained once per frame. Anything enqueued during a drain pass is
//! deferred to the next pass, and a room change or quit aborts the remainder
//! of the current pass.

use anyhow::{bail, Result};
use log::trace;

use ags_script::{
    EventBlockKind, GameEvent, GameEventKind, TextScriptKind, MAX_QUEUED_EVENTS,
};

use crate::engine::Engine;
use crate::interp::InteractionOwner;
use crate::script::ScriptTarget;

impl Engine {
    /// Appends an event tagged with the current player id. Never executes
    /// anything.
    pub fn queue_game_event(
        &mut self,
        kind: GameEventKind,
        data1: i32,
        data2: i32,
        data3: i32,
    ) -> Result<()> {
        if self.events.len() >= MAX_QUEUED_EVENTS {
            bail!(
                "too many game events queued ({} pending); a handler is flooding the queue",
                self.events.len()
            );
        }
        self.events.push(GameEvent {
            kind,
            data1,
            data2,
            data3,
            player: self.world.player as i32,
        });
        Ok(())
    }

    pub fn pending_event_count(&self) -> usize {
        self.events.len()
    }

    /// Drains the queue once. Re-entrant calls (a handler pumping the tick
    /// loop, which reaches event processing again) are no-ops.
    pub fn process_all_game_events(&mut self) -> Result<()> {
        if self.processing_events {
            return Ok(());
        }
        self.processing_events = true;
        let result = self.run_event_pass();
        self.processing_events = false;
        result
    }

    fn run_event_pass(&mut self) -> Result<()> {
        // Snapshot-and-clear up front: handlers that enqueue during this
        // pass feed the next pass, never this one.
        let snapshot = std::mem::take(&mut self.events);
        let room_was = self.room_changes;
        for (index, event) in snapshot.iter().enumerate() {
            self.process_game_event(event)?;
            if self.quit_requested || self.room_changes != room_was {
                let remaining = snapshot.len() - index - 1;
                trace!("event pass aborted with {remaining} events unprocessed");
                if remaining > 0 {
                    self.note(format!("events.dropped {remaining}"));
                }
                break;
            }
        }
        Ok(())
    }

    /// Dispatches one event synchronously. An unrecognized kind or sub-kind
    /// means corrupt game data or an engine/data version mismatch: fatal.
    pub fn process_game_event(&mut self, event: &GameEvent) -> Result<()> {
        match event.kind {
            GameEventKind::TextScript => {
                let Some(kind) = TextScriptKind::from_code(event.data1) else {
                    bail!("unknown text-script event sub-type {}", event.data1);
                };
                let name = kind.function_name();
                match kind {
                    TextScriptKind::RepeatedlyExecute => {
                        self.run_text_script(ScriptTarget::Game, name, &[])
                    }
                    TextScriptKind::OnKeyPress | TextScriptKind::OnMouseClick => {
                        self.run_text_script(ScriptTarget::Game, name, &[event.data2])
                    }
                }
            }
            GameEventKind::RunEventBlock => {
                let Some(block) = EventBlockKind::from_code(event.data1) else {
                    bail!("unknown event-block kind {}", event.data1);
                };
                if event.data3 < 0 {
                    bail!("negative event id {} in event block", event.data3);
                }
                let event_id = event.data3 as u32;
                match block {
                    EventBlockKind::Hotspot => {
                        let index = event.data2 as usize;
                        self.event_block_base_name = format!("hotspot{index}");
                        self.run_interaction(
                            InteractionOwner::Hotspot(index),
                            event_id,
                            None,
                            false,
                        )?;
                    }
                    EventBlockKind::Room => {
                        self.event_block_base_name = "room".to_string();
                        self.run_interaction(InteractionOwner::Room, event_id, None, false)?;
                    }
                }
                Ok(())
            }
            GameEventKind::AfterFadeIn => {
                self.draw.fade_in();
                Ok(())
            }
            GameEventKind::InterfaceClick => self.run_text_script(
                ScriptTarget::Game,
                "interface_click",
                &[event.data1, event.data2],
            ),
            GameEventKind::NewRoom => self.new_room(event.data1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo::test_engine;

    #[test]
    fn enqueue_tags_current_player() {
        let mut engine = test_engine();
        engine
            .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
            .unwrap();
        assert_eq!(engine.events[0].player, engine.world.player as i32);
    }

    #[test]
    fn queue_overflow_is_fatal() {
        let mut engine = test_engine();
        for _ in 0..MAX_QUEUED_EVENTS {
            engine
                .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
                .unwrap();
        }
        assert!(engine
            .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
            .is_err());
    }

    #[test]
    fn re_entrant_processing_is_a_no_op() {
        let mut engine = test_engine();
        engine.processing_events = true;
        engine
            .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
            .unwrap();
        engine.process_all_game_events().unwrap();
        assert_eq!(engine.pending_event_count(), 1);
    }

    #[test]
    fn an_aborted_pass_reports_the_events_left_behind() {
        let mut engine = test_engine();
        engine
            .queue_game_event(GameEventKind::NewRoom, 2, 0, 0)
            .unwrap();
        engine
            .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
            .unwrap();
        engine
            .queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)
            .unwrap();

        engine.process_all_game_events().unwrap();

        assert!(engine
            .diag_events()
            .iter()
            .any(|event| event.label == "events.dropped 2"));
    }

    #[test]
    fn unknown_sub_type_is_fatal() {
        let mut engine = test_engine();
        let event = GameEvent {
            kind: GameEventKind::TextScript,
            data1: 42,
            data2: 0,
            data3: 0,
            player: 0,
        };
        assert!(engine.process_game_event(&event).is_err());
    }
}
