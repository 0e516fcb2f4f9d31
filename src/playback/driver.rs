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
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, span, Instrument, Level};

use super::engine::PlaybackEngine;

/// Roughly one display frame at 60 Hz.
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

/// Ticks the engine once per frame on the tokio runtime so fades progress.
pub struct FrameDriver {
    task: JoinHandle<()>,
}

impl FrameDriver {
    /// Spawns the frame task. Must be called from within a tokio runtime.
    pub fn spawn(engine: Arc<PlaybackEngine>, frame_interval: Duration) -> FrameDriver {
        let span = span!(Level::INFO, "frame driver");
        let task = tokio::spawn(
            async move {
                info!(
                    interval_ms = frame_interval.as_millis() as u64,
                    "Frame driver started"
                );
                let mut interval = tokio::time::interval(frame_interval);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    interval.tick().await;
                    engine.tick();
                }
            }
            .instrument(span),
        );

        FrameDriver { task }
    }

    /// Stops ticking. Fades in progress stay where they are until the engine is ticked again.
    pub fn stop(&self) {
        debug!("Stopping frame driver");
        self.task.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::mock;
    use crate::config::{Settings, SettingsStore};
    use crate::notes::{NoteKey, PitchClass, ViolinString};
    use crate::playback::Articulation;
    use crate::testutil::eventually_async;

    #[tokio::test]
    async fn test_driver_completes_fades() {
        let device = Arc::new(mock::Device::get("mock-driver"));
        let mut settings = Settings::default();
        settings
            .set_fade_duration(50)
            .expect("valid fade duration");
        let engine = Arc::new(PlaybackEngine::new(
            device,
            SettingsStore::new(settings),
            "mp3",
        ));
        let driver = FrameDriver::spawn(engine.clone(), Duration::from_millis(5));

        let handle = engine.trigger(
            NoteKey::new(ViolinString::D, PitchClass::B),
            Articulation::Sustain,
        );
        engine.stop(&handle);
        assert_eq!(1, engine.active_fades());

        eventually_async(
            || {
                let engine = engine.clone();
                async move { engine.active_fades() == 0 }
            },
            "Fade never completed",
        )
        .await;
        assert!(handle.resource().is_paused());
        assert_eq!(1.0, handle.resource().volume());

        driver.stop();
        eventually_async(
            || {
                let running = driver.is_running();
                async move { !running }
            },
            "Frame driver never stopped",
        )
        .await;
    }
}
