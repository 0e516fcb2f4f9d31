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
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;

use super::error::ConfigError;

const DEFAULT_DEVICE: &str = "default";
const DEFAULT_SAMPLE_ROOT: &str = "public";
const DEFAULT_EXTENSION: &str = "mp3";

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct AudioConfig {
    /// The output device. Names starting with "mock" select the mock device and
    /// "default" selects the host's default output.
    device: Option<String>,

    /// The directory that contains the `notes/` sample tree.
    sample_root: Option<PathBuf>,

    /// The file extension of the sample files (default: mp3).
    extension: Option<String>,
}

impl AudioConfig {
    /// New will create a new audio configuration for the given device.
    pub fn new(device: &str) -> AudioConfig {
        AudioConfig {
            device: Some(device.to_string()),
            sample_root: None,
            extension: None,
        }
    }

    /// Sets the sample root directory.
    pub fn with_sample_root(mut self, sample_root: &Path) -> AudioConfig {
        self.sample_root = Some(sample_root.to_path_buf());
        self
    }

    /// Parse an audio configuration from a YAML or JSON file.
    pub fn deserialize(path: &Path) -> Result<AudioConfig, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<AudioConfig>()?)
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the directory containing the `notes/` sample tree.
    pub fn sample_root(&self) -> &Path {
        self.sample_root
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_SAMPLE_ROOT))
    }

    /// Returns the sample file extension (default: mp3).
    pub fn extension(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        AudioConfig::new(DEFAULT_DEVICE)
    }
}
