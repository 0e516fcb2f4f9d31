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
use std::time::{Duration, Instant};

/// The result of advancing a fade to a point in time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FadeStep {
    /// The fade is still running; apply this volume.
    Volume(f32),
    /// The fade has finished; pause and restore the volume.
    Complete { restore_volume: f32 },
}

/// An in-flight linear fade-out attached to a resource.
#[derive(Clone, Copy, Debug)]
pub struct FadeState {
    started_at: Instant,
    start_volume: f32,
    /// The volume to restore once the fade completes.
    restore_volume: f32,
    duration: Duration,
}

impl FadeState {
    pub fn new(started_at: Instant, start_volume: f32, duration: Duration) -> FadeState {
        FadeState {
            started_at,
            start_volume,
            restore_volume: start_volume,
            duration,
        }
    }

    /// Starts a fade that supersedes `previous`. The ramp begins at the current volume,
    /// but completion restores the volume from before the first fade.
    pub fn superseding(
        previous: &FadeState,
        started_at: Instant,
        start_volume: f32,
        duration: Duration,
    ) -> FadeState {
        FadeState {
            restore_volume: previous.restore_volume,
            ..FadeState::new(started_at, start_volume, duration)
        }
    }

    pub fn start_volume(&self) -> f32 {
        self.start_volume
    }

    pub fn restore_volume(&self) -> f32 {
        self.restore_volume
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Computes the fade at `now`: `start_volume * (1 - elapsed / duration)` until the
    /// duration has elapsed.
    pub fn step(&self, now: Instant) -> FadeStep {
        let elapsed = now.saturating_duration_since(self.started_at);
        if elapsed >= self.duration {
            return FadeStep::Complete {
                restore_volume: self.restore_volume,
            };
        }

        let progress = elapsed.as_secs_f32() / self.duration.as_secs_f32();
        FadeStep::Volume(self.start_volume * (1.0 - progress))
    }
}
