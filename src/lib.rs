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

//! A violin fingerboard you can play: pads trigger pre-recorded notes, held notes loop
//! and fade out on release, plucks ring out.

pub mod audio;
pub mod config;
pub mod fingerboard;
pub mod gesture;
pub mod notes;
pub mod playback;

#[cfg(test)]
mod testutil;

pub use fingerboard::{Fingerboard, Pad};
pub use gesture::{GestureState, GestureTracker, Intent};
pub use notes::{NoteKey, PitchClass, ViolinString};
pub use playback::{Articulation, FrameDriver, PlaybackEngine, PlaybackHandle};
