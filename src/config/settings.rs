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
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{RwLock, RwLockReadGuard};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ConfigError;
use super::palette::{ColorPreset, NoteColors, FALLBACK_COLOR};
use crate::notes::PitchClass;

/// Default sustain release fade, in milliseconds.
pub const DEFAULT_FADE_DURATION_MS: u32 = 100;

/// Longest allowed sustain release fade, in milliseconds.
pub const MAX_FADE_DURATION_MS: u32 = 500;

/// Fade durations must be a multiple of this many milliseconds.
pub const FADE_DURATION_STEP_MS: u32 = 10;

/// The persisted user settings. Missing fields take their defaults, so a partially
/// saved record merges over the defaults.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// The active color preset.
    selected_preset: ColorPreset,

    /// The sustain release fade in milliseconds.
    fade_duration: u32,

    /// Colors used by the custom preset.
    custom_colors: NoteColors,

    /// Whether pads show their note names.
    show_note_names: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            selected_preset: ColorPreset::Default,
            fade_duration: DEFAULT_FADE_DURATION_MS,
            custom_colors: NoteColors::rainbow(),
            show_note_names: true,
        }
    }
}

impl Settings {
    /// Loads settings from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        if !path.exists() {
            debug!(path = ?path, "No saved settings, using defaults");
            return Ok(Settings::default());
        }

        let mut settings: Settings = serde_json::from_str(&fs::read_to_string(path)?)?;
        if let Err(e) = validate_fade_duration(settings.fade_duration) {
            warn!(err = %e, "Saved fade duration is invalid, using the default");
            settings.fade_duration = DEFAULT_FADE_DURATION_MS;
        }

        info!(path = ?path, "Settings loaded");
        Ok(settings)
    }

    /// Saves the settings to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = ?path, "Settings saved");
        Ok(())
    }

    pub fn selected_preset(&self) -> ColorPreset {
        self.selected_preset
    }

    pub fn set_selected_preset(&mut self, preset: ColorPreset) {
        self.selected_preset = preset;
    }

    /// Gets the fade duration.
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_duration.into())
    }

    /// Sets the fade duration in milliseconds. Must be 0..=500 in steps of 10.
    pub fn set_fade_duration(&mut self, millis: u32) -> Result<(), ConfigError> {
        validate_fade_duration(millis)?;
        self.fade_duration = millis;
        Ok(())
    }

    pub fn custom_colors(&self) -> &NoteColors {
        &self.custom_colors
    }

    /// Sets a custom color. The note may be a display label ("F#/Gb") or a storage key ("FsGb").
    pub fn set_custom_color(&mut self, note: &str, color: &str) -> Result<(), ConfigError> {
        let pitch = PitchClass::from_label(note)?;
        self.custom_colors.set(pitch, color);
        Ok(())
    }

    pub fn show_note_names(&self) -> bool {
        self.show_note_names
    }

    pub fn set_show_note_names(&mut self, show: bool) {
        self.show_note_names = show;
    }

    /// Gets the color for a pitch class under the active preset.
    pub fn color(&self, pitch: PitchClass) -> String {
        match self.selected_preset {
            ColorPreset::Default => NoteColors::rainbow().get(pitch).to_string(),
            ColorPreset::Monochrome => NoteColors::monochrome().get(pitch).to_string(),
            ColorPreset::Custom => self.custom_colors.get(pitch).to_string(),
        }
    }

    /// Gets the color for a note label under the active preset. Unknown labels fall back
    /// to a neutral color.
    pub fn color_for(&self, label: &str) -> String {
        match PitchClass::from_label(label) {
            Ok(pitch) => self.color(pitch),
            Err(e) => {
                warn!(err = %e, fallback = FALLBACK_COLOR, "No color for note label");
                FALLBACK_COLOR.to_string()
            }
        }
    }
}

fn validate_fade_duration(millis: u32) -> Result<(), ConfigError> {
    if millis > MAX_FADE_DURATION_MS || millis % FADE_DURATION_STEP_MS != 0 {
        return Err(ConfigError::FadeDuration(millis));
    }
    Ok(())
}

/// The process-wide settings shared between the settings collaborator and the
/// playback engine. Writers publish through `update`; readers always see the latest value.
#[derive(Clone, Default, Debug)]
pub struct SettingsStore {
    settings: Arc<RwLock<Settings>>,
}

impl SettingsStore {
    pub fn new(settings: Settings) -> SettingsStore {
        SettingsStore {
            settings: Arc::new(RwLock::new(settings)),
        }
    }

    /// Read access to the current settings.
    pub fn read(&self) -> RwLockReadGuard<'_, Settings> {
        self.settings.read()
    }

    /// Applies a change to the settings.
    pub fn update<F, T>(&self, change: F) -> T
    where
        F: FnOnce(&mut Settings) -> T,
    {
        change(&mut self.settings.write())
    }

    /// The current fade duration.
    pub fn fade_duration(&self) -> Duration {
        self.settings.read().fade_duration()
    }

    /// A copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        self.settings.read().clone()
    }
}
