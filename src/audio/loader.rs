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

//! Sample loading and caching for note samples.
//!
//! Samples are decoded entirely into memory the first time they're played.

use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Errors produced while loading a sample file.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: SymphoniaError,
    },

    #[error("{0}: no audio track found")]
    NoTrack(PathBuf),

    #[error("{0}: sample rate not specified")]
    NoSampleRate(PathBuf),
}

/// A loaded sample that can be played back.
/// The sample data is stored in an Arc for efficient sharing between voices.
#[derive(Clone, Debug)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> LoadedSample {
        LoadedSample {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    /// The samples of one frame, one per channel.
    pub fn frame(&self, index: usize) -> &[f32] {
        let channels = self.channel_count as usize;
        let start = index * channels;
        &self.data[start..start + channels]
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Manages loading and caching of sample data.
pub struct SampleLoader {
    /// Cache of loaded samples by file path.
    cache: HashMap<PathBuf, LoadedSample>,
    /// Target sample rate for transcoding (matches audio output).
    target_sample_rate: u32,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(target_sample_rate: u32) -> Self {
        Self {
            cache: HashMap::new(),
            target_sample_rate,
        }
    }

    /// Loads a sample from a file into memory.
    /// Returns a cached version if already loaded.
    pub fn load(&mut self, path: &Path) -> Result<LoadedSample, LoadError> {
        if let Some(sample) = self.cache.get(path) {
            debug!(path = ?path, "Using cached sample");
            return Ok(sample.clone());
        }

        info!(path = ?path, "Loading sample into memory");

        let (samples, channel_count, source_sample_rate) = decode_file(path)?;

        // Transcode if sample rate doesn't match
        let (final_samples, final_sample_rate) = if source_sample_rate != self.target_sample_rate {
            debug!(
                source_rate = source_sample_rate,
                target_rate = self.target_sample_rate,
                "Transcoding sample"
            );
            let transcoded = self.transcode_samples(
                &samples,
                channel_count,
                source_sample_rate,
                self.target_sample_rate,
            );
            (transcoded, self.target_sample_rate)
        } else {
            (samples, source_sample_rate)
        };

        let loaded = LoadedSample::new(final_samples, channel_count, final_sample_rate);

        info!(
            path = ?path,
            channels = channel_count,
            sample_rate = final_sample_rate,
            duration_ms = loaded.duration().as_millis(),
            memory_kb = loaded.memory_size() / 1024,
            "Sample loaded"
        );

        self.cache.insert(path.to_path_buf(), loaded.clone());

        Ok(loaded)
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.cache.values().map(|s| s.memory_size()).sum()
    }

    /// Number of cached samples.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Transcodes samples from one sample rate to another using linear interpolation,
    /// which is sufficient for short instrument samples.
    fn transcode_samples(
        &self,
        samples: &[f32],
        channel_count: u16,
        source_rate: u32,
        target_rate: u32,
    ) -> Vec<f32> {
        let ratio = target_rate as f64 / source_rate as f64;
        let channels = channel_count.max(1) as usize;
        let source_frames = samples.len() / channels;
        let target_frames = (source_frames as f64 * ratio).ceil() as usize;

        let mut output = Vec::with_capacity(target_frames * channels);

        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let idx0 = source_frame * channels + channel;
                let idx1 = (source_frame + 1) * channels + channel;

                let s0 = samples.get(idx0).copied().unwrap_or(0.0);
                let s1 = samples.get(idx1).copied().unwrap_or(s0);

                output.push(s0 + (s1 - s0) * frac);
            }
        }

        output
    }
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleLoader")
            .field("cached_samples", &self.cache.len())
            .field("target_sample_rate", &self.target_sample_rate)
            .field("total_memory_kb", &(self.total_memory_usage() / 1024))
            .finish()
    }
}

/// Decodes an entire audio file (WAV, MP3, FLAC, OGG, ...) into interleaved f32 samples.
/// Returns the samples, the channel count and the sample rate.
fn decode_file(path: &Path) -> Result<(Vec<f32>, u16, u32), LoadError> {
    let decode_err = |source: SymphoniaError| LoadError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?;
    let mut format_reader = detected.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| LoadError::NoTrack(path.to_path_buf()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| LoadError::NoSampleRate(path.to_path_buf()))?;
    let mut channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut samples = Vec::new();
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                // Some containers only report the channel layout once decoding starts.
                if channels == 0 {
                    channels = decoded.spec().channels.count() as u16;
                }
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
                buffer.copy_interleaved_ref(decoded);
                samples.extend_from_slice(buffer.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "Skipping undecodable packet");
            }
            Err(e) => return Err(decode_err(e)),
        }
    }

    Ok((samples, channels.max(1), sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::write_wav;

    #[test]
    fn test_transcode_interpolates_between_frames() {
        let loader = SampleLoader::new(48000);

        // A short pluck envelope recorded at half the output rate.
        let pluck = [0.0f32, 0.5, 1.0, 0.5];
        let result = loader.transcode_samples(&pluck, 1, 24000, 48000);

        assert_eq!(8, result.len());
        let expected = [0.0f32, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.5];
        for (got, want) in result.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{} != {}", got, want);
        }
    }

    #[test]
    fn test_transcode_downsample_keeps_channels_apart() {
        let loader = SampleLoader::new(48000);

        // Stereo sustain loop with mirrored channels at 96 kHz.
        let sustain = [1.0f32, -1.0, 0.5, -0.5, 0.0, 0.0, -0.5, 0.5];
        let result = loader.transcode_samples(&sustain, 2, 96000, 48000);

        assert_eq!(vec![1.0, -1.0, 0.0, 0.0], result);
    }

    #[test]
    fn test_load_and_cache() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("E_A_pluck.wav");
        write_wav(&path, &[0.5; 4410], 1, 44100)?;

        let mut loader = SampleLoader::new(44100);
        let sample = loader.load(&path)?;
        assert_eq!(1, sample.channel_count());
        assert_eq!(44100, sample.sample_rate());
        assert_eq!(4410, sample.frames());
        assert!((sample.frame(100)[0] - 0.5).abs() < 0.01);
        assert_eq!(100, sample.duration().as_millis());

        // The second load comes from the cache.
        std::fs::remove_file(&path)?;
        assert_eq!(4410, loader.load(&path)?.frames());
        assert_eq!(1, loader.cached());
        Ok(())
    }

    #[test]
    fn test_load_resamples_to_target_rate() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("A_Cs_Db_sustain.wav");
        write_wav(&path, &[0.25; 2 * 2205], 2, 22050)?;

        let mut loader = SampleLoader::new(44100);
        let sample = loader.load(&path)?;
        assert_eq!(2, sample.channel_count());
        assert_eq!(44100, sample.sample_rate());
        assert_eq!(4410, sample.frames());
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let mut loader = SampleLoader::new(44100);
        let result = loader.load(Path::new("/nonexistent/notes/pluck/E_A_pluck.mp3"));
        assert!(matches!(result, Err(LoadError::Io { .. })));
        assert_eq!(0, loader.cached());
    }
}
