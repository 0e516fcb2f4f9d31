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
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::{Settings, SettingsStore};
use crate::gesture::{GestureTracker, Intent};
use crate::notes::{self, NoteKey, PitchClass, ViolinString, POSITIONS};
use crate::playback::{Articulation, PlaybackEngine};

/// One pressable position on the fingerboard.
pub struct Pad {
    row: usize,
    col: usize,
    tracker: GestureTracker,
}

impl Pad {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn col(&self) -> usize {
        self.col
    }

    pub fn note(&self) -> NoteKey {
        self.tracker.note()
    }

    pub fn string(&self) -> ViolinString {
        self.note().string()
    }

    pub fn pitch(&self) -> PitchClass {
        self.note().pitch()
    }

    /// The first column of each row is the open string.
    pub fn is_open_string(&self) -> bool {
        self.col == 0
    }

    pub fn is_pressed(&self) -> bool {
        self.tracker.is_pressed()
    }

    pub fn tracker(&self) -> &GestureTracker {
        &self.tracker
    }

    /// The pad's color under the active preset.
    pub fn color(&self, settings: &Settings) -> String {
        settings.color(self.pitch())
    }

    /// The note name to print on the pad, if names are shown.
    pub fn label(&self, show_note_names: bool) -> Option<&'static str> {
        show_note_names.then(|| self.pitch().label())
    }
}

impl fmt::Debug for Pad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pad")
            .field("row", &self.row)
            .field("col", &self.col)
            .field("note", &self.note())
            .field("state", &self.tracker.state())
            .finish()
    }
}

/// The grid of pads: one row per string, open string first. Routes pointer events to
/// the pad's tracker using the currently selected articulation.
pub struct Fingerboard {
    settings: SettingsStore,
    articulation: Articulation,
    pads: Vec<Vec<Pad>>,
}

impl Fingerboard {
    pub fn new(engine: Arc<PlaybackEngine>) -> Fingerboard {
        let pads = (0..notes::FINGERBOARD.len())
            .map(|row| {
                (0..POSITIONS)
                    .filter_map(|col| {
                        notes::note_at(row, col).map(|note| Pad {
                            row,
                            col,
                            tracker: GestureTracker::new(note, engine.clone()),
                        })
                    })
                    .collect()
            })
            .collect();

        Fingerboard {
            settings: engine.settings().clone(),
            articulation: Articulation::default(),
            pads,
        }
    }

    pub fn articulation(&self) -> Articulation {
        self.articulation
    }

    /// Selects the articulation used by subsequent presses and drags. Notes already
    /// sounding are not affected.
    pub fn set_articulation(&mut self, articulation: Articulation) {
        debug!(%articulation, "Articulation selected");
        self.articulation = articulation;
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn pad(&self, row: usize, col: usize) -> Option<&Pad> {
        self.pads.get(row).and_then(|pads| pads.get(col))
    }

    pub fn pads(&self) -> impl Iterator<Item = &Pad> {
        self.pads.iter().flatten()
    }

    /// The row of pads for a string.
    pub fn string_pads(&self, string: ViolinString) -> &[Pad] {
        &self.pads[string.row()]
    }

    /// The color of every pad under the current settings, row by row.
    pub fn colors(&self) -> Vec<Vec<String>> {
        let settings = self.settings.read();
        self.pads
            .iter()
            .map(|row| row.iter().map(|pad| pad.color(&settings)).collect())
            .collect()
    }

    pub fn press(&mut self, row: usize, col: usize, y: f32) -> Option<Intent> {
        let articulation = self.articulation;
        self.pad_mut(row, col)
            .map(|pad| pad.tracker.press_start(y, articulation))
    }

    pub fn drag(&mut self, row: usize, col: usize, y: f32) -> Option<Intent> {
        let articulation = self.articulation;
        self.pad_mut(row, col)
            .and_then(|pad| pad.tracker.press_move(y, articulation))
    }

    pub fn release(&mut self, row: usize, col: usize) -> Option<Intent> {
        self.pad_mut(row, col)
            .and_then(|pad| pad.tracker.press_end())
    }

    /// The pointer left the pad while pressed.
    pub fn leave(&mut self, row: usize, col: usize) -> Option<Intent> {
        self.pad_mut(row, col).and_then(|pad| pad.tracker.cancel())
    }

    /// Releases every pad that is still pressed.
    pub fn release_all(&mut self) {
        for pad in self.pads.iter_mut().flatten() {
            pad.tracker.press_end();
        }
    }

    fn pad_mut(&mut self, row: usize, col: usize) -> Option<&mut Pad> {
        let pad = self.pads.get_mut(row).and_then(|pads| pads.get_mut(col));
        if pad.is_none() {
            warn!(row, col, "Ignoring event for a pad off the fingerboard");
        }
        pad
    }
}

impl fmt::Debug for Fingerboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerboard")
            .field("articulation", &self.articulation)
            .field("pads", &self.pads().count())
            .finish()
    }
}
