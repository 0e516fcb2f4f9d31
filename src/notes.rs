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

//! Strings, pitch classes and the fingerboard layout.
//!
//! Note labels come in three spellings:
//! - display labels, e.g. `F#/Gb`, shown on the pads
//! - storage keys, e.g. `FsGb`, used by the persisted color settings
//! - file tokens, e.g. `Fs_Gb`, used to address sample files

use std::fmt;
use std::str::FromStr;

/// Number of pads on each string, including the open string.
pub const POSITIONS: usize = 8;

/// Errors produced when parsing externally supplied note names.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum NoteError {
    #[error("unknown string '{0}'")]
    UnknownString(String),

    #[error("unknown note label '{0}'")]
    UnknownNote(String),
}

/// One of the four violin strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ViolinString {
    E,
    A,
    D,
    G,
}

impl ViolinString {
    /// All strings, highest first. This is also the row order of the fingerboard.
    pub const ALL: [ViolinString; 4] = [
        ViolinString::E,
        ViolinString::A,
        ViolinString::D,
        ViolinString::G,
    ];

    /// The string name used in sample file names.
    pub fn name(&self) -> &'static str {
        match self {
            ViolinString::E => "E",
            ViolinString::A => "A",
            ViolinString::D => "D",
            ViolinString::G => "G",
        }
    }

    /// The fingerboard row for this string.
    pub fn row(&self) -> usize {
        match self {
            ViolinString::E => 0,
            ViolinString::A => 1,
            ViolinString::D => 2,
            ViolinString::G => 3,
        }
    }
}

impl fmt::Display for ViolinString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ViolinString {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "E" => Ok(ViolinString::E),
            "A" => Ok(ViolinString::A),
            "D" => Ok(ViolinString::D),
            "G" => Ok(ViolinString::G),
            other => Err(NoteError::UnknownString(other.to_string())),
        }
    }
}

/// The twelve chromatic pitch classes. Accidentals carry both enharmonic spellings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    CsDb,
    D,
    DsEb,
    E,
    F,
    FsGb,
    G,
    GsAb,
    A,
    AsBb,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CsDb,
        PitchClass::D,
        PitchClass::DsEb,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FsGb,
        PitchClass::G,
        PitchClass::GsAb,
        PitchClass::A,
        PitchClass::AsBb,
        PitchClass::B,
    ];

    /// The label shown on a pad.
    pub fn label(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CsDb => "C#/Db",
            PitchClass::D => "D",
            PitchClass::DsEb => "D#/Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FsGb => "F#/Gb",
            PitchClass::G => "G",
            PitchClass::GsAb => "G#/Ab",
            PitchClass::A => "A",
            PitchClass::AsBb => "A#/Bb",
            PitchClass::B => "B",
        }
    }

    /// The key used for this pitch class in persisted color settings.
    pub fn storage_key(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CsDb => "CsDb",
            PitchClass::D => "D",
            PitchClass::DsEb => "DsEb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FsGb => "FsGb",
            PitchClass::G => "G",
            PitchClass::GsAb => "GsAb",
            PitchClass::A => "A",
            PitchClass::AsBb => "AsBb",
            PitchClass::B => "B",
        }
    }

    /// The filesystem-safe token used in sample file names. Always equal to
    /// `normalize_note_label(self.label())`.
    pub fn token(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CsDb => "Cs_Db",
            PitchClass::D => "D",
            PitchClass::DsEb => "Ds_Eb",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FsGb => "Fs_Gb",
            PitchClass::G => "G",
            PitchClass::GsAb => "Gs_Ab",
            PitchClass::A => "A",
            PitchClass::AsBb => "As_Bb",
            PitchClass::B => "B",
        }
    }

    /// Parses any of the three spellings of a pitch class.
    pub fn from_label(label: &str) -> Result<PitchClass, NoteError> {
        let label = label.trim();
        PitchClass::ALL
            .into_iter()
            .find(|pitch| {
                pitch.label() == label || pitch.storage_key() == label || pitch.token() == label
            })
            .ok_or_else(|| NoteError::UnknownNote(label.to_string()))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for PitchClass {
    type Err = NoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PitchClass::from_label(s)
    }
}

/// Converts a display label into the token used in sample file names.
/// Sharps become `s` and the enharmonic separator becomes `_`, so `F#/Gb` is `Fs_Gb`.
pub fn normalize_note_label(label: &str) -> String {
    label.replace('#', "s").replace('/', "_")
}

/// A pitch on a specific string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NoteKey {
    string: ViolinString,
    pitch: PitchClass,
}

impl NoteKey {
    pub fn new(string: ViolinString, pitch: PitchClass) -> NoteKey {
        NoteKey { string, pitch }
    }

    /// Parses a string name and a note label, e.g. `("A", "C#/Db")`.
    pub fn parse(string: &str, label: &str) -> Result<NoteKey, NoteError> {
        Ok(NoteKey {
            string: string.parse()?,
            pitch: label.parse()?,
        })
    }

    pub fn string(&self) -> ViolinString {
        self.string
    }

    pub fn pitch(&self) -> PitchClass {
        self.pitch
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} string {}", self.string, self.pitch)
    }
}

/// The pad layout, one row per string (E, A, D, G). Column 0 is the open string and each
/// following column is one semitone higher.
pub const FINGERBOARD: [[PitchClass; POSITIONS]; 4] = [
    [
        PitchClass::E,
        PitchClass::F,
        PitchClass::FsGb,
        PitchClass::G,
        PitchClass::GsAb,
        PitchClass::A,
        PitchClass::AsBb,
        PitchClass::B,
    ],
    [
        PitchClass::A,
        PitchClass::AsBb,
        PitchClass::B,
        PitchClass::C,
        PitchClass::CsDb,
        PitchClass::D,
        PitchClass::DsEb,
        PitchClass::E,
    ],
    [
        PitchClass::D,
        PitchClass::DsEb,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FsGb,
        PitchClass::G,
        PitchClass::GsAb,
        PitchClass::A,
    ],
    [
        PitchClass::G,
        PitchClass::GsAb,
        PitchClass::A,
        PitchClass::AsBb,
        PitchClass::B,
        PitchClass::C,
        PitchClass::CsDb,
        PitchClass::D,
    ],
];

/// Returns the note at the given fingerboard position, if it exists.
pub fn note_at(row: usize, col: usize) -> Option<NoteKey> {
    let string = *ViolinString::ALL.get(row)?;
    let pitch = *FINGERBOARD[row].get(col)?;
    Some(NoteKey::new(string, pitch))
}
