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
// Sums the voices of the cpal output stream into one interleaved block.
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::loader::LoadedSample;

/// The playback state of one voice as seen by the mixer.
#[derive(Debug)]
pub struct MixerVoice {
    /// The decoded sample, once loading has finished.
    pub sample: Option<LoadedSample>,
    /// Whether a load is currently in flight.
    pub loading: bool,
    /// Current position in frames.
    pub frame: usize,
    /// Whether the voice has been started and not paused or finished.
    pub playing: bool,
    pub looping: bool,
    pub volume: f32,
    pub muted: bool,
}

impl Default for MixerVoice {
    fn default() -> Self {
        MixerVoice {
            sample: None,
            loading: false,
            frame: 0,
            playing: false,
            looping: false,
            volume: 1.0,
            muted: false,
        }
    }
}

impl MixerVoice {
    /// Mixes this voice into an interleaved output block, advancing its position.
    /// Sample channels beyond the output's are dropped; missing ones repeat the last
    /// sample channel, so mono samples play on every output channel.
    fn mix_into(&mut self, output: &mut [f32], num_channels: usize) {
        let sample = match (&self.sample, self.playing) {
            (Some(sample), true) => sample,
            _ => return,
        };
        let total_frames = sample.frames();
        if total_frames == 0 {
            self.playing = false;
            return;
        }

        let gain = if self.muted { 0.0 } else { self.volume };
        let last_channel = sample.channel_count() as usize - 1;

        for out_frame in output.chunks_mut(num_channels) {
            if self.frame >= total_frames {
                if self.looping {
                    self.frame = 0;
                } else {
                    self.playing = false;
                    return;
                }
            }

            let source_frame = sample.frame(self.frame);
            for (channel, out) in out_frame.iter_mut().enumerate() {
                *out += source_frame[channel.min(last_channel)] * gain;
            }
            self.frame += 1;
        }

        // A non-looping voice that ends exactly on a block boundary is finished.
        if self.frame >= total_frames && !self.looping {
            self.playing = false;
        }
    }
}

pub type SharedVoice = Arc<Mutex<MixerVoice>>;

/// Mixes every voice opened on an output device. Holds no device state itself.
#[derive(Clone)]
pub struct AudioMixer {
    /// Every voice opened on the device. Voices are never removed; idle ones are skipped.
    voices: Arc<RwLock<Vec<SharedVoice>>>,
    /// Number of output channels
    num_channels: u16,
    /// Sample rate
    sample_rate: u32,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16, sample_rate: u32) -> Self {
        Self {
            voices: Arc::new(RwLock::new(Vec::new())),
            num_channels: num_channels.max(1),
            sample_rate,
        }
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Adds a voice to the mixer.
    pub fn add_voice(&self, voice: SharedVoice) {
        self.voices.write().push(voice);
    }

    pub fn voice_count(&self) -> usize {
        self.voices.read().len()
    }

    /// Mixes all playing voices into the interleaved output buffer.
    pub fn process_into_output(&self, output: &mut [f32]) {
        output.fill(0.0);

        let num_channels = self.num_channels as usize;
        for voice in self.voices.read().iter() {
            voice.lock().mix_into(output, num_channels);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice(data: Vec<f32>, channels: u16) -> SharedVoice {
        Arc::new(Mutex::new(MixerVoice {
            sample: Some(LoadedSample::new(data, channels, 44100)),
            playing: true,
            ..Default::default()
        }))
    }

    #[test]
    fn test_mono_voice_fills_all_channels() {
        let mixer = AudioMixer::new(2, 44100);
        mixer.add_voice(voice(vec![0.5, 0.25], 1));

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output);
        assert_eq!(vec![0.5, 0.5, 0.25, 0.25], output);
    }

    #[test]
    fn test_volume_and_mute() {
        let mixer = AudioMixer::new(1, 44100);
        let v = voice(vec![1.0; 8], 1);
        v.lock().volume = 0.5;
        mixer.add_voice(v.clone());

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output);
        assert_eq!(vec![0.5, 0.5], output);

        v.lock().muted = true;
        mixer.process_into_output(&mut output);
        assert_eq!(vec![0.0, 0.0], output);
        assert_eq!(4, v.lock().frame);
    }

    #[test]
    fn test_non_looping_voice_finishes() {
        let mixer = AudioMixer::new(1, 44100);
        let v = voice(vec![1.0, 1.0, 1.0], 1);
        mixer.add_voice(v.clone());

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output);
        assert_eq!(vec![1.0, 1.0, 1.0, 0.0], output);
        assert!(!v.lock().playing);
    }

    #[test]
    fn test_looping_voice_wraps() {
        let mixer = AudioMixer::new(1, 44100);
        let v = voice(vec![1.0, 2.0], 1);
        v.lock().looping = true;
        mixer.add_voice(v.clone());

        let mut output = vec![0.0; 5];
        mixer.process_into_output(&mut output);
        assert_eq!(vec![1.0, 2.0, 1.0, 2.0, 1.0], output);
        assert!(v.lock().playing);
    }

    #[test]
    fn test_voices_are_summed() {
        let mixer = AudioMixer::new(1, 44100);
        mixer.add_voice(voice(vec![0.25, 0.25], 1));
        mixer.add_voice(voice(vec![0.5, 0.5], 1));

        let paused = voice(vec![1.0, 1.0], 1);
        paused.lock().playing = false;
        mixer.add_voice(paused);

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output);
        assert_eq!(vec![0.75, 0.75], output);
        assert_eq!(3, mixer.voice_count());
    }
}
