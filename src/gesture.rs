// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Per-pad gesture tracking. Turns press, drag and release events into triggers and
//! stops on the playback engine.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::notes::NoteKey;
use crate::playback::{Articulation, PlaybackEngine, PlaybackHandle};

/// How far the pointer must travel upward during a press to retrigger the note.
pub const DRAG_THRESHOLD: f32 = 20.0;

/// Where a pad is in its press cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    /// Pressed on a one-shot articulation.
    Pressed,
    /// Pressed on an articulation that sounds until released.
    Sustaining,
}

/// The musical meaning of a gesture event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    Attack,
    Retrigger,
    Release,
}

/// Tracks presses on a single pad. Holds at most one playback handle at a time.
pub struct GestureTracker {
    note: NoteKey,
    engine: Arc<PlaybackEngine>,
    state: GestureState,
    /// Vertical coordinate the press started at. Cleared once the drag has fired.
    drag_origin: Option<f32>,
    handle: Option<PlaybackHandle>,
}

impl GestureTracker {
    pub fn new(note: NoteKey, engine: Arc<PlaybackEngine>) -> GestureTracker {
        GestureTracker {
            note,
            engine,
            state: GestureState::Idle,
            drag_origin: None,
            handle: None,
        }
    }

    pub fn note(&self) -> NoteKey {
        self.note
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn is_pressed(&self) -> bool {
        self.state != GestureState::Idle
    }

    /// The handle of the note this pad is currently holding.
    pub fn handle(&self) -> Option<&PlaybackHandle> {
        self.handle.as_ref()
    }

    /// Starts a press at `y` and attacks the note.
    pub fn press_start(&mut self, y: f32, articulation: Articulation) -> Intent {
        if self.handle.is_some() {
            debug!(note = %self.note, "Releasing stale handle before new press");
            self.release_handle();
        }

        self.drag_origin = Some(y);
        self.attack(articulation);
        Intent::Attack
    }

    /// Tracks pointer movement during a press. An upward drag past the threshold
    /// retriggers the note once per press.
    pub fn press_move(&mut self, y: f32, articulation: Articulation) -> Option<Intent> {
        if !self.is_pressed() {
            return None;
        }
        let origin = self.drag_origin?;
        if origin - y <= DRAG_THRESHOLD {
            return None;
        }

        self.drag_origin = None;
        debug!(note = %self.note, %articulation, "Drag retrigger");
        if let Some(handle) = self.handle.take() {
            self.engine.stop(&handle);
        }
        self.attack(articulation);
        Some(Intent::Retrigger)
    }

    /// Ends the press. Held notes are stopped; plucks ring out.
    pub fn press_end(&mut self) -> Option<Intent> {
        if !self.is_pressed() {
            return None;
        }

        self.release_handle();
        self.state = GestureState::Idle;
        self.drag_origin = None;
        Some(Intent::Release)
    }

    /// The pointer left the pad or the press was cancelled. Same as releasing.
    pub fn cancel(&mut self) -> Option<Intent> {
        self.press_end()
    }

    fn attack(&mut self, articulation: Articulation) {
        self.handle = Some(self.engine.trigger(self.note, articulation));
        self.state = if articulation.loops() {
            GestureState::Sustaining
        } else {
            GestureState::Pressed
        };
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.articulation().loops() {
                self.engine.stop(&handle);
            }
        }
    }
}

impl fmt::Debug for GestureTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GestureTracker")
            .field("note", &self.note)
            .field("state", &self.state)
            .field("drag_origin", &self.drag_origin)
            .field("handle", &self.handle)
            .finish()
    }
}
