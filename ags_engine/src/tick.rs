//! The per-frame tick: room-entry sequencing, ground checks, input, state
//! countdowns, the always-hooks, and the event-queue drain, paced to a fixed
//! frame rate. Blocking waits spin this same function, so a blocked frame
//! takes a reduced path that keeps animating without draining gameplay
//! events.

use std::time::{Duration, Instant};

use anyhow::{bail, Result};

use ags_script::events::{hotspot_event, region_event, room_event};
use ags_script::{EventBlockKind, GameEventKind, NewRoomState, TextScriptKind};

use crate::blocking::BlockedOnKind;
use crate::engine::Engine;
use crate::hosts::{GuiClick, InputEvent};
use crate::interp::InteractionOwner;
use crate::rooms::{edge_at, RoomEdge};

/// Frame rate of the original runtime.
pub const DEFAULT_FPS: u32 = 40;

impl Engine {
    /// Runs the loop until something requests a quit.
    pub fn run(&mut self) -> Result<()> {
        if !self.started {
            bail!("run called before start");
        }
        while !self.quit_requested {
            self.tick_game()?;
        }
        Ok(())
    }

    /// Runs at most `frames` ticks, stopping early on quit.
    pub fn run_frames(&mut self, frames: u64) -> Result<()> {
        if !self.started {
            bail!("run_frames called before start");
        }
        for _ in 0..frames {
            if self.quit_requested {
                break;
            }
            self.tick_game()?;
        }
        Ok(())
    }

    /// One frame of the game. Re-entered by [`Engine::block_until`] while a
    /// wait condition is outstanding.
    pub fn tick_game(&mut self) -> Result<()> {
        if self.quit_requested {
            return Ok(());
        }
        self.frame += 1;
        let events_at_start = self.events.len();

        if self.blocking.is_blocked() {
            // A blocked frame advances time and the always-hooks only.
            // Whatever it queued waits, and is dropped once the wait
            // resolves: those events belong to a frame that never finished.
            if !self.paused {
                self.update_stuff();
                self.run_repeatedly_execute_always()?;
            }
            if self.blocking.is_blocked()
                && self.check_blocking_until()? == BlockedOnKind::Nothing
            {
                self.resolve_blocking();
                self.events.truncate(events_at_start);
            }
            self.finish_frame();
            return Ok(());
        }

        if !self.paused {
            if self.new_room_state == NewRoomState::None && !self.processing_events {
                self.queue_game_event(
                    GameEventKind::TextScript,
                    TextScriptKind::RepeatedlyExecute as i32,
                    0,
                    0,
                )?;
                self.queue_game_event(
                    GameEventKind::RunEventBlock,
                    EventBlockKind::Room as i32,
                    0,
                    room_event::REP_EXEC as i32,
                )?;
            }
            // The enters-screen interaction must fire before anything else
            // touches the new room; every handler below that can change the
            // room re-runs the guard for the room it landed in. The
            // transition sub-state itself stays set until just before the
            // drain, so the steps in between still see "mid-transition".
            self.check_new_room()?;
            let mut room_checked = self.room_changes;

            self.run_ground_checks()?;
            if self.quit_requested {
                self.finish_frame();
                return Ok(());
            }
            if self.room_changes != room_checked {
                self.check_new_room()?;
                room_checked = self.room_changes;
            }

            // The cache only lives for one frame's worth of dispatch.
            self.gui_under_mouse = None;
            if self.new_room_state == NewRoomState::None {
                self.poll_input()?;
                if self.room_changes != room_checked {
                    self.check_new_room()?;
                    room_checked = self.room_changes;
                }
            }

            self.update_stuff();
            self.run_repeatedly_execute_always()?;
            if self.room_changes != room_checked {
                self.check_new_room()?;
            }
            self.queue_room_entry_events()?;
            self.process_all_game_events()?;
        }

        self.finish_frame();
        Ok(())
    }

    fn finish_frame(&mut self) {
        if !self.fast_forward {
            self.draw.render_frame(self.frame);
        }
        self.update_countdowns();
        if self.frame % 5 == 0 {
            self.audio.periodic_update(self.frame);
        }
        self.pace_frame();
    }

    /// Countdowns that advance on every frame, paused or blocked or not:
    /// the wait counter, script timers, and screen shake. A `wait()` issued
    /// by a handler that also paused the game still has to resolve.
    fn update_countdowns(&mut self) {
        if self.world.wait_counter > 0 {
            self.world.wait_counter -= 1;
        }
        self.world.advance_timers();
        if self.world.shake_length > 0 {
            self.world.shake_length -= 1;
        }
    }

    /// Queues the deferred part of the room entry sequence. The
    /// before-fade-in interaction has already run synchronously; what
    /// follows goes through the queue so handlers observe ordinary event
    /// ordering.
    fn queue_room_entry_events(&mut self) -> Result<()> {
        match self.new_room_state {
            NewRoomState::None => return Ok(()),
            NewRoomState::FirstTime => {
                self.queue_game_event(
                    GameEventKind::RunEventBlock,
                    EventBlockKind::Room as i32,
                    0,
                    room_event::FIRST_TIME_ENTERS as i32,
                )?;
            }
            NewRoomState::New | NewRoomState::SavedGame => {}
        }
        self.queue_game_event(GameEventKind::AfterFadeIn, 0, 0, 0)?;
        self.queue_game_event(
            GameEventKind::RunEventBlock,
            EventBlockKind::Room as i32,
            0,
            room_event::ENTERS_AFTER_FADE_IN as i32,
        )?;
        self.new_room_state = NewRoomState::None;
        Ok(())
    }

    fn poll_input(&mut self) -> Result<()> {
        for event in self.input.poll() {
            match event {
                InputEvent::KeyPress(key) => {
                    if self.ui_disabled == 0 {
                        self.queue_game_event(
                            GameEventKind::TextScript,
                            TextScriptKind::OnKeyPress as i32,
                            key,
                            0,
                        )?;
                    }
                }
                InputEvent::MouseMove { x, y } => {
                    self.gui_under_mouse = self.gui.on_mouse_move(x, y);
                }
                InputEvent::MouseDown { button, x, y } => {
                    if self.ui_disabled > 0 {
                        continue;
                    }
                    match self.gui.on_mouse_down(x, y, button) {
                        GuiClick::Interface { interface, control } => {
                            self.queue_game_event(
                                GameEventKind::InterfaceClick,
                                interface,
                                control,
                                0,
                            )?;
                        }
                        GuiClick::NotOnGui => {
                            self.queue_game_event(
                                GameEventKind::TextScript,
                                TextScriptKind::OnMouseClick as i32,
                                button,
                                0,
                            )?;
                        }
                    }
                }
                InputEvent::MouseUp { button, x, y } => {
                    self.gui.on_mouse_up(x, y, button);
                }
            }
        }
        Ok(())
    }

    /// Where-is-the-player-standing checks: edge walk-offs, region
    /// enter/leave/stand, hotspot stand-ons. Any handler here may change the
    /// room, which ends the sweep.
    fn run_ground_checks(&mut self) -> Result<()> {
        if self.world.ground_interactions_disabled || self.room.is_none() {
            return Ok(());
        }
        let room_was = self.room_changes;
        let (x, y, on_screen) = {
            let player = self.world.player();
            (player.x, player.y, player.on)
        };
        if !on_screen {
            return Ok(());
        }

        // An edge fires once on arrival; the edge the player entered the
        // room on stays quiet until they step off it.
        let edge = self
            .room
            .as_ref()
            .and_then(|room| edge_at(&room.def.edges, x, y));
        if edge != self.entry_edge {
            self.entry_edge = edge;
            if let Some(edge) = edge {
                let event = match edge {
                    RoomEdge::Left => room_event::EDGE_LEFT,
                    RoomEdge::Right => room_event::EDGE_RIGHT,
                    RoomEdge::Top => room_event::EDGE_TOP,
                    RoomEdge::Bottom => room_event::EDGE_BOTTOM,
                };
                self.event_block_base_name = "room".to_string();
                self.run_interaction(InteractionOwner::Room, event, None, false)?;
                if self.quit_requested || self.room_changes != room_was {
                    return Ok(());
                }
            }
        }

        let region = self.room.as_ref().and_then(|room| room.region_at(x, y));
        if region != self.last_region {
            let previous = self.last_region;
            self.last_region = region;
            if let Some(previous) = previous {
                self.run_region_interaction(previous, region_event::WALKS_OFF)?;
                if self.quit_requested || self.room_changes != room_was {
                    return Ok(());
                }
            }
            if let Some(region) = region {
                self.run_region_interaction(region, region_event::WALKS_ONTO)?;
                if self.quit_requested || self.room_changes != room_was {
                    return Ok(());
                }
            }
        }
        if let Some(region) = region {
            self.run_region_interaction(region, region_event::STANDS_ON)?;
            if self.quit_requested || self.room_changes != room_was {
                return Ok(());
            }
        }

        // Unlike the region checks above, the hotspot tick goes through the
        // queue and runs with this frame's other drained events.
        let hotspot = self.room.as_ref().and_then(|room| room.hotspot_at(x, y));
        if let Some(hotspot) = hotspot {
            self.queue_game_event(
                GameEventKind::RunEventBlock,
                EventBlockKind::Hotspot as i32,
                hotspot as i32,
                hotspot_event::STANDS_ON as i32,
            )?;
        }
        Ok(())
    }

    /// Per-frame gameplay advancement: character movement, object movement,
    /// the message overlay. Skipped entirely while the game is paused.
    fn update_stuff(&mut self) {
        for character in &mut self.world.characters {
            if character.on {
                character.advance();
            }
        }
        if let Some(room) = self.room.as_mut() {
            for object in &mut room.objects {
                if object.moving > 0 {
                    object.moving -= 1;
                }
                if object.cycling > 0 {
                    object.cycling -= 1;
                }
            }
        }
        if self.world.message_time >= 0 {
            self.world.message_time -= 1;
            if self.world.message_time < 0 {
                if self.world.text_overlay_count > 0 {
                    self.world.text_overlay_count -= 1;
                }
                self.draw.clear_message();
            }
        }
    }

    fn pace_frame(&mut self) {
        if self.fast_forward {
            self.last_frame_time = None;
            return;
        }
        let frame_len =
            Duration::from_micros(1_000_000 / u64::from(self.frames_per_second.max(1)));
        if let Some(last) = self.last_frame_time {
            let elapsed = last.elapsed();
            if elapsed < frame_len {
                std::thread::sleep(frame_len - elapsed);
            }
        }
        self.last_frame_time = Some(Instant::now());
    }
}
