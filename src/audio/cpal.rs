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
use std::{
    error::Error,
    fmt,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level};

use super::loader::SampleLoader;
use super::mixer::{AudioMixer, MixerVoice, SharedVoice};
use super::PlaybackError;
use crate::config::AudioConfig;
use crate::playback::SampleAddress;

/// A voice playing through a cpal output stream. Samples are decoded lazily on the
/// first play request.
pub struct Voice {
    /// The sample file backing this voice.
    path: PathBuf,
    /// The state shared with the mixer.
    state: SharedVoice,
    /// Shared sample cache.
    loader: Arc<Mutex<SampleLoader>>,
    /// Whether the device's output stream is running.
    stream_running: Arc<AtomicBool>,
    sample_rate: u32,
}

impl Voice {
    /// Decodes the sample on the rayon pool. Playback begins once decoding finishes if
    /// the voice hasn't been paused in the meantime. Failures leave the voice stopped.
    fn load_in_background(&self) {
        let path = self.path.clone();
        let state = self.state.clone();
        let loader = self.loader.clone();
        rayon::spawn(move || {
            let result = loader.lock().load(&path);
            let mut state = state.lock();
            state.loading = false;
            match result {
                Ok(sample) => {
                    debug!(path = ?path, playing = state.playing, "Sample ready");
                    state.sample = Some(sample);
                }
                Err(e) => {
                    warn!(err = %e, "Unable to load sample, playback is silent");
                    state.playing = false;
                }
            }
        });
    }
}

impl crate::audio::Voice for Voice {
    fn play(&mut self) -> Result<(), PlaybackError> {
        if !self.stream_running.load(Ordering::Relaxed) {
            return Err(PlaybackError::StreamUnavailable(
                self.path.display().to_string(),
            ));
        }

        let needs_load = {
            let mut state = self.state.lock();
            state.playing = true;
            let needs_load = state.sample.is_none() && !state.loading;
            if needs_load {
                state.loading = true;
            }
            needs_load
        };

        if needs_load {
            self.load_in_background();
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.state.lock().playing = false;
    }

    fn rewind(&mut self) {
        self.state.lock().frame = 0;
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
        let frames = self.state.lock().frame;
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

/// A small wrapper around a cpal::Device. Owns one output stream that mixes every
/// voice opened on the device.
pub struct Device {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The directory containing the `notes/` sample tree.
    sample_root: PathBuf,
    /// The mixer feeding the output stream.
    mixer: AudioMixer,
    /// Shared sample cache.
    loader: Arc<Mutex<SampleLoader>>,
    /// Set while the output stream is running.
    stream_running: Arc<AtomicBool>,
    /// Channel for handing new voices to the output thread.
    voice_tx: crossbeam_channel::Sender<SharedVoice>,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.mixer.num_channels(),
            self.host_id.name()
        )
    }
}

/// Creates a mixer matching the stream's channel count and sample rate.
fn mixer_for(stream_config: &cpal::StreamConfig) -> AudioMixer {
    AudioMixer::new(stream_config.channels, stream_config.sample_rate)
}

/// Builds an output callback that mixes straight into the cpal buffer.
fn create_callback<T>(
    mixer: AudioMixer,
    voice_rx: crossbeam_channel::Receiver<SharedVoice>,
) -> impl FnMut(&mut [T], &cpal::OutputCallbackInfo) + Send + 'static
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();
    move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
        while let Ok(voice) = voice_rx.try_recv() {
            mixer.add_voice(voice);
        }

        scratch.resize(data.len(), 0.0);
        mixer.process_into_output(&mut scratch);
        for (dst, &src) in data.iter_mut().zip(scratch.iter()) {
            *dst = T::from_sample(src);
        }
    }
}

impl Device {
    /// Gets the cpal device named in the configuration. "default" selects the host's
    /// default output device.
    pub fn get(config: &AudioConfig) -> Result<Device, Box<dyn Error>> {
        let host = cpal::default_host();
        let name = config.device();
        let device = if name == "default" {
            host.default_output_device()
                .ok_or("no default output device available")?
        } else {
            host.output_devices()?
                .find(|device| device.name().is_ok_and(|n| n.trim() == name))
                .ok_or_else(|| format!("no device found with name {}", name))?
        };

        let supported = device.default_output_config()?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.config();
        let mixer = mixer_for(&stream_config);
        let sample_rate = mixer.sample_rate();
        let (voice_tx, voice_rx) = crossbeam_channel::unbounded();
        let stream_running = Arc::new(AtomicBool::new(false));

        Self::start_output_thread(
            device.clone(),
            stream_config,
            sample_format,
            mixer.clone(),
            voice_rx,
            stream_running.clone(),
        );

        let device = Device {
            name: device.name()?,
            host_id: host.id(),
            sample_root: config.sample_root().to_path_buf(),
            mixer,
            loader: Arc::new(Mutex::new(SampleLoader::new(sample_rate))),
            stream_running,
            voice_tx,
        };
        info!(device = %device, "Audio device ready");
        Ok(device)
    }

    /// Starts the output thread that creates and owns the cpal stream.
    fn start_output_thread(
        device: cpal::Device,
        stream_config: cpal::StreamConfig,
        sample_format: cpal::SampleFormat,
        mixer: AudioMixer,
        voice_rx: crossbeam_channel::Receiver<SharedVoice>,
        stream_running: Arc<AtomicBool>,
    ) {
        thread::spawn(move || {
            let span = span!(Level::INFO, "audio output");
            let _enter = span.enter();

            let on_error = |err: cpal::StreamError| error!("CPAL output stream error: {}", err);
            let stream_result = match sample_format {
                cpal::SampleFormat::F32 => device.build_output_stream(
                    &stream_config,
                    create_callback::<f32>(mixer, voice_rx),
                    on_error,
                    None,
                ),
                cpal::SampleFormat::I16 => device.build_output_stream(
                    &stream_config,
                    create_callback::<i16>(mixer, voice_rx),
                    on_error,
                    None,
                ),
                cpal::SampleFormat::I32 => device.build_output_stream(
                    &stream_config,
                    create_callback::<i32>(mixer, voice_rx),
                    on_error,
                    None,
                ),
                cpal::SampleFormat::U16 => device.build_output_stream(
                    &stream_config,
                    create_callback::<u16>(mixer, voice_rx),
                    on_error,
                    None,
                ),
                other => {
                    error!(format = ?other, "Unsupported output sample format");
                    return;
                }
            };

            let stream = match stream_result {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Failed to create CPAL stream: {}", e);
                    return;
                }
            };
            if let Err(e) = stream.play() {
                error!("Failed to start CPAL stream: {}", e);
                return;
            }
            stream_running.store(true, Ordering::Relaxed);
            info!("CPAL output stream started successfully");

            // Keep the stream alive.
            loop {
                thread::sleep(Duration::from_millis(100));
            }
        });
    }

    /// The sample root voices resolve their addresses against.
    pub fn sample_root(&self) -> &Path {
        &self.sample_root
    }
}

impl crate::audio::Device for Device {
    fn open(&self, address: &SampleAddress) -> Box<dyn crate::audio::Voice> {
        let state: SharedVoice = Arc::new(Mutex::new(MixerVoice::default()));
        if let Err(e) = self.voice_tx.send(state.clone()) {
            error!(err = %e, "Failed to hand voice to the output stream");
        }

        Box::new(Voice {
            path: address.resolve(&self.sample_root),
            state,
            loader: self.loader.clone(),
            stream_running: self.stream_running.clone(),
            sample_rate: self.mixer.sample_rate(),
        })
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<super::mock::Device>, Box<dyn Error>> {
        Err("not a mock".into())
    }
}
