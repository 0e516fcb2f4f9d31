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
use std::{any::Any, error::Error, fmt, sync::Arc, time::Duration};

use crate::config::AudioConfig;
use crate::playback::SampleAddress;

pub mod cpal;
pub mod loader;
pub mod mixer;
pub mod mock;

/// Errors reported synchronously when a voice refuses to start.
#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback of {address} was rejected: {reason}")]
    Rejected { address: String, reason: String },

    #[error("the output stream of {0} is not running")]
    StreamUnavailable(String),
}

/// An output device that can open voices for sample files.
pub trait Device: Any + fmt::Display + Send + Sync {
    /// Opens a voice for the sample at the given address. Opening never fails: a missing
    /// or unreadable file only surfaces when the voice is played.
    fn open(&self, address: &SampleAddress) -> Box<dyn Voice>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// A single playable sample on a device.
pub trait Voice: Send {
    /// Requests playback from the current position. Returns once the request has been
    /// handed to the device; whether audio actually starts is not awaited.
    fn play(&mut self) -> Result<(), PlaybackError>;

    /// Pauses playback, keeping the current position.
    fn pause(&mut self);

    /// Moves the play position back to the start.
    fn rewind(&mut self);

    fn set_volume(&mut self, volume: f32);

    fn set_looping(&mut self, looping: bool);

    fn set_muted(&mut self, muted: bool);

    /// Returns true if the voice has been started and has neither been paused nor
    /// reached its end.
    fn is_playing(&self) -> bool;

    /// The current play position.
    fn position(&self) -> Duration;
}

/// Gets the device described by the given configuration.
pub fn get_device(config: &AudioConfig) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device)));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_get_mock_device() -> Result<(), Box<dyn Error>> {
        let device = get_device(&AudioConfig::new("mock-output"))?;
        assert_eq!("mock-output (Mock)", device.to_string());
        assert_eq!(0, device.to_mock()?.opened());
        Ok(())
    }
}
