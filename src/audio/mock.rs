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
use std::{collections::HashMap, fmt, sync::Arc, time::Duration};

#[cfg(test)]
use std::error::Error;

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::PlaybackError;
use crate::playback::SampleAddress;

/// The observable state of a mock voice.
#[derive(Debug, Default)]
struct VoiceState {
    playing: bool,
    looping: bool,
    volume: f32,
    muted: bool,
    position: Duration,
    play_count: usize,
    reject_next: bool,
}

/// A mock voice. Doesn't produce audio, but records every state change so tests can
/// inspect it and drive it (advance the position, finish the sample, refuse to play).
#[derive(Clone)]
pub struct Voice {
    url: String,
    state: Arc<Mutex<VoiceState>>,
}

impl Voice {
    fn new(url: String) -> Voice {
        Voice {
            url,
            state: Arc::new(Mutex::new(VoiceState {
                volume: 1.0,
                ..Default::default()
            })),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub fn is_looping(&self) -> bool {
        self.state.lock().looping
    }

    pub fn is_muted(&self) -> bool {
        self.state.lock().muted
    }

    /// Number of accepted play requests.
    pub fn play_count(&self) -> usize {
        self.state.lock().play_count
    }

    /// Moves the play position forward if the voice is playing.
    pub fn advance(&self, elapsed: Duration) {
        let mut state = self.state.lock();
        if state.playing {
            state.position += elapsed;
        }
    }

    /// Simulates the sample reaching its end.
    pub fn finish(&self) {
        self.state.lock().playing = false;
    }

    /// Makes the next play request fail, as a device without permission to start would.
    pub fn reject_next_play(&self) {
        self.state.lock().reject_next = true;
    }
}

impl crate::audio::Voice for Voice {
    fn play(&mut self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock();
        if state.reject_next {
            state.reject_next = false;
            return Err(PlaybackError::Rejected {
                address: self.url.clone(),
                reason: "mock rejection".to_string(),
            });
        }
        state.playing = true;
        state.play_count += 1;
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
    }

    fn rewind(&mut self) {
        self.state.lock().position = Duration::ZERO;
    }

    fn set_volume(&mut self, volume: f32) {
        self.state.lock().volume = volume;
    }

    fn set_looping(&mut self, looping: bool) {
        self.state.lock().looping = looping;
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.lock().muted = muted;
    }

    fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    fn position(&self) -> Duration {
        self.state.lock().position
    }
}

/// A mock device. Doesn't actually play anything.
#[derive(Clone)]
pub struct Device {
    name: String,
    voices: Arc<Mutex<HashMap<String, Voice>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            voices: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Gets the most recently opened voice for the given address URL.
    pub fn voice(&self, url: &str) -> Option<Voice> {
        self.voices.lock().get(url).cloned()
    }

    /// Number of distinct voices opened on this device.
    pub fn opened(&self) -> usize {
        self.voices.lock().len()
    }
}

impl crate::audio::Device for Device {
    fn open(&self, address: &SampleAddress) -> Box<dyn crate::audio::Voice> {
        let voice = Voice::new(address.url());
        debug!(device = self.name, url = voice.url(), "Opened mock voice");
        self.voices.lock().insert(voice.url.clone(), voice.clone());
        Box::new(voice)
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
