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

//! Pad color presets.

use serde::{Deserialize, Serialize};

use crate::notes::PitchClass;

/// Color used for labels that don't map to a pitch class.
pub const FALLBACK_COLOR: &str = "#9ca3af";

/// The selectable color presets.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColorPreset {
    #[default]
    Default,
    Monochrome,
    /// Uses the user's custom colors from the settings.
    Custom,
}

/// One color per pitch class. Serialized with the storage keys (`C`, `CsDb`, ...).
/// Missing keys take the rainbow color.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct NoteColors {
    #[serde(rename = "C")]
    c: String,
    #[serde(rename = "CsDb")]
    cs_db: String,
    #[serde(rename = "D")]
    d: String,
    #[serde(rename = "DsEb")]
    ds_eb: String,
    #[serde(rename = "E")]
    e: String,
    #[serde(rename = "F")]
    f: String,
    #[serde(rename = "FsGb")]
    fs_gb: String,
    #[serde(rename = "G")]
    g: String,
    #[serde(rename = "GsAb")]
    gs_ab: String,
    #[serde(rename = "A")]
    a: String,
    #[serde(rename = "AsBb")]
    as_bb: String,
    #[serde(rename = "B")]
    b: String,
}

impl NoteColors {
    /// The rainbow palette used unless another preset is selected.
    pub fn rainbow() -> NoteColors {
        NoteColors {
            c: "#f87171".into(),
            cs_db: "#fb923c".into(),
            d: "#fbbf24".into(),
            ds_eb: "#a3e635".into(),
            e: "#34d399".into(),
            f: "#22d3ee".into(),
            fs_gb: "#60a5fa".into(),
            g: "#818cf8".into(),
            gs_ab: "#c084fc".into(),
            a: "#e879f9".into(),
            as_bb: "#fca5a5".into(),
            b: "#fde68a".into(),
        }
    }

    /// Every pitch class in the same color.
    pub fn uniform(color: &str) -> NoteColors {
        NoteColors {
            c: color.into(),
            cs_db: color.into(),
            d: color.into(),
            ds_eb: color.into(),
            e: color.into(),
            f: color.into(),
            fs_gb: color.into(),
            g: color.into(),
            gs_ab: color.into(),
            a: color.into(),
            as_bb: color.into(),
            b: color.into(),
        }
    }

    pub fn monochrome() -> NoteColors {
        NoteColors::uniform("#000000")
    }

    /// Gets the color for the given pitch class.
    pub fn get(&self, pitch: PitchClass) -> &str {
        self.slot(pitch)
    }

    /// Sets the color for the given pitch class.
    pub fn set(&mut self, pitch: PitchClass, color: &str) {
        *self.slot_mut(pitch) = color.to_string();
    }

    fn slot(&self, pitch: PitchClass) -> &String {
        match pitch {
            PitchClass::C => &self.c,
            PitchClass::CsDb => &self.cs_db,
            PitchClass::D => &self.d,
            PitchClass::DsEb => &self.ds_eb,
            PitchClass::E => &self.e,
            PitchClass::F => &self.f,
            PitchClass::FsGb => &self.fs_gb,
            PitchClass::G => &self.g,
            PitchClass::GsAb => &self.gs_ab,
            PitchClass::A => &self.a,
            PitchClass::AsBb => &self.as_bb,
            PitchClass::B => &self.b,
        }
    }

    fn slot_mut(&mut self, pitch: PitchClass) -> &mut String {
        match pitch {
            PitchClass::C => &mut self.c,
            PitchClass::CsDb => &mut self.cs_db,
            PitchClass::D => &mut self.d,
            PitchClass::DsEb => &mut self.ds_eb,
            PitchClass::E => &mut self.e,
            PitchClass::F => &mut self.f,
            PitchClass::FsGb => &mut self.fs_gb,
            PitchClass::G => &mut self.g,
            PitchClass::GsAb => &mut self.gs_ab,
            PitchClass::A => &mut self.a,
            PitchClass::AsBb => &mut self.as_bb,
            PitchClass::B => &mut self.b,
        }
    }
}

impl Default for NoteColors {
    fn default() -> Self {
        NoteColors::rainbow()
    }
}
