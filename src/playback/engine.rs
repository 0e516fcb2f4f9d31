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

//! The playback engine: resolves cached resources, starts them and stops them with the
//! per-articulation policy (plucks halt, held notes fade out).

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::fade::{FadeState, FadeStep};
use super::resource::{
    Articulation, AudioResource, PlaybackHandle, ResourceKey, SampleAddress, SharedResource,
};
use crate::audio::{self, Device};
use crate::config::{AudioConfig, SettingsStore};
use crate::notes::{self, NoteKey};

/// Owns the resource cache and the playback policy. All methods take `&self`; the cache
/// and each resource are individually locked, so the engine can be shared between the
/// gesture handlers and the frame driver.
pub struct PlaybackEngine {
    /// The device resources are opened on.
    device: Arc<dyn Device>,
    /// Settings shared with the rest of the application. Read on every stop.
    settings: SettingsStore,
    /// Times fades.
    clock: Arc<dyn Clock>,
    /// File extension of the sample files.
    extension: String,
    /// One resource per string, note and articulation. Never evicted.
    resources: RwLock<HashMap<ResourceKey, SharedResource>>,
}

impl PlaybackEngine {
    /// Creates a new engine on the given device using the system clock.
    pub fn new(device: Arc<dyn Device>, settings: SettingsStore, extension: &str) -> Self {
        Self::with_clock(device, settings, Arc::new(SystemClock), extension)
    }

    /// Creates a new engine with an explicit clock.
    pub fn with_clock(
        device: Arc<dyn Device>,
        settings: SettingsStore,
        clock: Arc<dyn Clock>,
        extension: &str,
    ) -> Self {
        PlaybackEngine {
            device,
            settings,
            clock,
            extension: extension.to_string(),
            resources: RwLock::new(HashMap::new()),
        }
    }

    /// Creates an engine on the device named in the audio configuration.
    pub fn from_config(
        config: &AudioConfig,
        settings: SettingsStore,
    ) -> Result<Self, Box<dyn Error>> {
        let device = audio::get_device(config)?;
        info!(device = %device, extension = config.extension(), "Playback engine ready");
        Ok(Self::new(device, settings, config.extension()))
    }

    /// Starts the given note from the top and returns a handle to its resource.
    ///
    /// Any fade on the resource is cancelled, the loop flag is set from the articulation,
    /// and a pluck that is still sounding is cut off and restarted. A device that refuses
    /// to start is logged; the handle is returned regardless and the resource stays stopped.
    pub fn trigger(&self, note: NoteKey, articulation: Articulation) -> PlaybackHandle {
        let key = ResourceKey::new(note, articulation);
        let shared = self.resolve(key);

        {
            let mut resource = shared.lock();
            if resource.cancel_fade().is_some() {
                debug!(resource = %resource.address(), "Fade cancelled by retrigger");
            }
            resource.set_looping(articulation.loops());

            if !articulation.loops() && resource.is_playing() {
                debug!(resource = %resource.address(), "Preempting pluck");
                resource.pause();
            }
            resource.rewind();
            resource.set_volume(1.0);
            resource.set_muted(false);

            match resource.start() {
                Ok(()) => debug!(resource = %resource.address(), "Triggered"),
                Err(e) => {
                    warn!(
                        resource = %resource.address(),
                        err = %e,
                        "Playback did not start"
                    );
                    resource.pause();
                }
            }
        }

        PlaybackHandle::new(key, shared)
    }

    /// Triggers a note given by its external string name and note label ("F#/Gb").
    /// Labels that don't name a known note are logged and ignored.
    pub fn trigger_label(
        &self,
        string: &str,
        label: &str,
        articulation: Articulation,
    ) -> Option<PlaybackHandle> {
        match NoteKey::parse(string, &notes::normalize_note_label(label)) {
            Ok(note) => Some(self.trigger(note, articulation)),
            Err(e) => {
                warn!(string, label, err = %e, "Ignoring trigger for unknown note");
                None
            }
        }
    }

    /// Stops the resource behind the handle.
    ///
    /// Plucks that are still sounding halt and rewind immediately. Held notes fade out
    /// over the fade duration configured at this moment; the first fade step is applied
    /// before returning. Stopping something that isn't playing does nothing.
    pub fn stop(&self, handle: &PlaybackHandle) {
        let mut resource = handle.shared().lock();

        if !resource.articulation().loops() {
            if resource.is_playing() {
                resource.pause();
                resource.rewind();
                debug!(resource = %resource.address(), "Pluck stopped");
            }
            return;
        }

        if resource.is_paused() {
            return;
        }

        let now = self.clock.now();
        let duration = self.settings.fade_duration();
        let volume = resource.volume();
        let fade = match resource.fade() {
            Some(previous) => FadeState::superseding(previous, now, volume, duration),
            None => FadeState::new(now, volume, duration),
        };
        resource.begin_fade(fade);
        debug!(
            resource = %resource.address(),
            duration_ms = duration.as_millis() as u64,
            "Fade started"
        );

        Self::advance_fade(&mut resource, now);
    }

    /// Advances every fade in progress to the current time. Called once per frame.
    pub fn tick(&self) {
        let now = self.clock.now();
        let resources: Vec<SharedResource> = self.resources.read().values().cloned().collect();
        for shared in resources {
            let mut resource = shared.lock();
            if resource.is_fading() {
                Self::advance_fade(&mut resource, now);
            }
        }
    }

    fn advance_fade(resource: &mut AudioResource, now: Instant) {
        let step = match resource.fade() {
            Some(fade) => fade.step(now),
            None => return,
        };

        match step {
            FadeStep::Volume(volume) => resource.set_volume(volume),
            FadeStep::Complete { restore_volume } => {
                resource.cancel_fade();
                resource.pause();
                resource.set_volume(restore_volume);
                debug!(resource = %resource.address(), "Fade complete");
            }
        }
    }

    /// Looks up the resource for the key, opening it on first use.
    fn resolve(&self, key: ResourceKey) -> SharedResource {
        if let Some(resource) = self.resources.read().get(&key) {
            return resource.clone();
        }

        let mut resources = self.resources.write();
        resources
            .entry(key)
            .or_insert_with(|| {
                let address = SampleAddress::new(&key, &self.extension);
                let voice = self.device.open(&address);
                debug!(resource = %address, "Resource created");
                Arc::new(parking_lot::Mutex::new(AudioResource::new(
                    key, address, voice,
                )))
            })
            .clone()
    }

    /// Returns a handle to the cached resource for the key without starting it.
    pub fn resource(&self, key: &ResourceKey) -> Option<PlaybackHandle> {
        self.resources
            .read()
            .get(key)
            .map(|resource| PlaybackHandle::new(*key, resource.clone()))
    }

    /// The number of resources created so far.
    pub fn resource_count(&self) -> usize {
        self.resources.read().len()
    }

    /// The number of fades currently in progress.
    pub fn active_fades(&self) -> usize {
        self.resources
            .read()
            .values()
            .filter(|resource| resource.lock().is_fading())
            .count()
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }
}

impl fmt::Debug for PlaybackEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackEngine")
            .field("device", &self.device.to_string())
            .field("extension", &self.extension)
            .field("resources", &self.resource_count())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;
    use crate::audio::mock;
    use crate::audio::Voice as _;
    use crate::config::Settings;
    use crate::notes::{PitchClass, ViolinString};
    use crate::playback::ManualClock;

    struct Fixture {
        device: Arc<mock::Device>,
        clock: ManualClock,
        settings: SettingsStore,
        engine: PlaybackEngine,
    }

    fn fixture(fade_ms: u32) -> Fixture {
        let device = Arc::new(mock::Device::get("mock-output"));
        let clock = ManualClock::new();
        let mut settings = Settings::default();
        settings
            .set_fade_duration(fade_ms)
            .expect("valid fade duration");
        let settings = SettingsStore::new(settings);
        let engine = PlaybackEngine::with_clock(
            device.clone(),
            settings.clone(),
            Arc::new(clock.clone()),
            "mp3",
        );
        Fixture {
            device,
            clock,
            settings,
            engine,
        }
    }

    fn note(string: ViolinString, pitch: PitchClass) -> NoteKey {
        NoteKey::new(string, pitch)
    }

    #[test]
    fn test_resource_identity() {
        let f = fixture(100);
        for articulation in Articulation::ALL {
            let first = f
                .engine
                .trigger(note(ViolinString::D, PitchClass::FsGb), articulation);
            let second = f
                .engine
                .trigger(note(ViolinString::D, PitchClass::FsGb), articulation);
            assert!(first.same_resource(&second));
        }

        let pluck = f
            .engine
            .trigger(note(ViolinString::D, PitchClass::FsGb), Articulation::Pluck);
        let sustain = f
            .engine
            .trigger(note(ViolinString::D, PitchClass::FsGb), Articulation::Sustain);
        assert!(!pluck.same_resource(&sustain));

        assert_eq!(3, f.engine.resource_count());
        assert_eq!(3, f.device.opened());
    }

    #[test]
    fn test_labels_normalize_to_same_resource() {
        let f = fixture(100);
        let from_label = f
            .engine
            .trigger_label("G", "F#/Gb", Articulation::Vibrato)
            .expect("known note");
        let from_token = f
            .engine
            .trigger_label("G", "Fs_Gb", Articulation::Vibrato)
            .expect("known note");
        assert!(from_label.same_resource(&from_token));
        assert_eq!(
            "/notes/vibrato/G_Fs_Gb_vibrato.mp3",
            from_label.resource().address().url()
        );

        assert!(f
            .engine
            .trigger_label("G", "H", Articulation::Vibrato)
            .is_none());
        assert!(f
            .engine
            .trigger_label("C", "A", Articulation::Vibrato)
            .is_none());
        assert_eq!(1, f.engine.resource_count());
    }

    #[test]
    fn test_loop_flag_follows_articulation() {
        let f = fixture(100);
        let a = note(ViolinString::A, PitchClass::B);

        // Alternate articulations so every trigger follows a different one.
        for articulation in [
            Articulation::Sustain,
            Articulation::Pluck,
            Articulation::Vibrato,
            Articulation::Pluck,
            Articulation::Sustain,
        ] {
            let handle = f.engine.trigger(a, articulation);
            assert_eq!(articulation.loops(), handle.resource().is_looping());

            let voice = f
                .device
                .voice(&handle.resource().address().url())
                .expect("voice opened");
            assert_eq!(articulation.loops(), voice.is_looping());
        }
    }

    #[test]
    fn test_fade_completes_and_restores_volume() {
        let f = fixture(100);
        let handle = f
            .engine
            .trigger(note(ViolinString::A, PitchClass::CsDb), Articulation::Sustain);
        let voice = f
            .device
            .voice("/notes/sustain/A_Cs_Db_sustain.mp3")
            .expect("voice opened");

        f.engine.stop(&handle);
        assert!(handle.resource().is_fading());
        assert!(handle.resource().is_playing());
        assert_eq!(1, f.engine.active_fades());

        f.clock.advance(Duration::from_millis(50));
        f.engine.tick();
        assert!((voice.volume() - 0.5).abs() < 1e-4);
        assert!(handle.resource().is_playing());

        f.clock.advance(Duration::from_millis(50));
        f.engine.tick();
        let status = handle.status();
        assert!(!status.playing);
        assert!(!status.fading);
        assert_eq!(1.0, status.volume);
        assert_eq!(1.0, voice.volume());

        // The snapshot holds no lock, so the engine can still be queried.
        assert_eq!(0, f.engine.active_fades());
        f.engine.tick();
        assert_eq!(status, handle.status());
    }

    #[test]
    fn test_zero_fade_pauses_immediately() {
        let f = fixture(0);
        let handle = f
            .engine
            .trigger(note(ViolinString::E, PitchClass::F), Articulation::Vibrato);

        f.engine.stop(&handle);
        let resource = handle.resource();
        assert!(resource.is_paused());
        assert!(!resource.is_fading());
        assert_eq!(1.0, resource.volume());
    }

    #[test]
    fn test_retrigger_cancels_fade() {
        let f = fixture(100);
        let g = note(ViolinString::G, PitchClass::A);
        let handle = f.engine.trigger(g, Articulation::Sustain);

        f.engine.stop(&handle);
        f.clock.advance(Duration::from_millis(40));
        f.engine.tick();
        assert!(handle.resource().volume() < 1.0);

        let retriggered = f.engine.trigger(g, Articulation::Sustain);
        assert!(retriggered.same_resource(&handle));
        {
            let resource = retriggered.resource();
            assert_eq!(1.0, resource.volume());
            assert!(resource.is_playing());
            assert!(!resource.is_fading());
        }

        // Well past the old fade's end: nothing left to pause the note.
        f.clock.advance(Duration::from_millis(500));
        f.engine.tick();
        let resource = retriggered.resource();
        assert!(resource.is_playing());
        assert_eq!(1.0, resource.volume());
    }

    #[test]
    fn test_pluck_preemption_rewinds() {
        let f = fixture(100);
        let e = note(ViolinString::E, PitchClass::A);
        let handle = f.engine.trigger(e, Articulation::Pluck);
        let voice = f
            .device
            .voice("/notes/pluck/E_A_pluck.mp3")
            .expect("voice opened");

        voice.advance(Duration::from_millis(250));
        assert_eq!(Duration::from_millis(250), handle.resource().position());

        let again = f.engine.trigger(e, Articulation::Pluck);
        assert!(again.same_resource(&handle));
        let resource = again.resource();
        assert_eq!(Duration::ZERO, resource.position());
        assert!(resource.is_playing());
        assert_eq!(2, voice.play_count());
    }

    #[test]
    fn test_stop_pluck_halts_without_fade() {
        let f = fixture(300);
        let handle = f
            .engine
            .trigger(note(ViolinString::D, PitchClass::E), Articulation::Pluck);
        let voice = f
            .device
            .voice("/notes/pluck/D_E_pluck.mp3")
            .expect("voice opened");
        voice.advance(Duration::from_millis(30));

        f.engine.stop(&handle);
        let resource = handle.resource();
        assert!(resource.is_paused());
        assert!(!resource.is_fading());
        assert_eq!(Duration::ZERO, resource.position());
        assert_eq!(1.0, resource.volume());
    }

    #[test]
    fn test_stop_on_stopped_resource_is_noop() {
        let f = fixture(100);
        let handle = f
            .engine
            .trigger(note(ViolinString::A, PitchClass::D), Articulation::Sustain);
        f.engine.stop(&handle);
        f.clock.advance(Duration::from_millis(100));
        f.engine.tick();
        assert!(handle.resource().is_paused());

        f.engine.stop(&handle);
        assert!(!handle.resource().is_fading());
        assert_eq!(0, f.engine.active_fades());

        // A pluck that finished on its own is left alone.
        let pluck = f
            .engine
            .trigger(note(ViolinString::A, PitchClass::D), Articulation::Pluck);
        let voice = f
            .device
            .voice("/notes/pluck/A_D_pluck.mp3")
            .expect("voice opened");
        voice.advance(Duration::from_millis(80));
        voice.finish();
        f.engine.stop(&pluck);
        assert_eq!(Duration::from_millis(80), pluck.resource().position());
    }

    #[test]
    fn test_second_stop_restarts_fade_from_current_volume() {
        let f = fixture(100);
        let handle = f
            .engine
            .trigger(note(ViolinString::G, PitchClass::C), Articulation::Vibrato);

        f.engine.stop(&handle);
        f.clock.advance(Duration::from_millis(50));
        f.engine.tick();

        f.engine.stop(&handle);
        assert_eq!(1, f.engine.active_fades());
        assert!((handle.resource().volume() - 0.5).abs() < 1e-4);

        f.clock.advance(Duration::from_millis(50));
        f.engine.tick();
        assert!((handle.resource().volume() - 0.25).abs() < 1e-4);

        f.clock.advance(Duration::from_millis(50));
        f.engine.tick();
        let resource = handle.resource();
        assert!(resource.is_paused());
        assert_eq!(1.0, resource.volume());
    }

    #[test]
    fn test_fade_duration_read_at_stop() {
        let f = fixture(100);
        let first = f
            .engine
            .trigger(note(ViolinString::E, PitchClass::B), Articulation::Sustain);
        f.engine.stop(&first);

        f.settings
            .update(|settings| settings.set_fade_duration(400))
            .expect("valid fade duration");

        // The fade in progress keeps its original duration.
        f.clock.advance(Duration::from_millis(100));
        f.engine.tick();
        assert!(first.resource().is_paused());

        // The next stop picks up the new one.
        let second = f
            .engine
            .trigger(note(ViolinString::E, PitchClass::B), Articulation::Sustain);
        f.engine.stop(&second);
        f.clock.advance(Duration::from_millis(200));
        f.engine.tick();
        assert!(second.resource().is_playing());
        assert!((second.resource().volume() - 0.5).abs() < 1e-4);

        f.clock.advance(Duration::from_millis(200));
        f.engine.tick();
        assert!(second.resource().is_paused());
    }

    #[test]
    fn test_rejected_play_returns_stopped_handle() {
        let f = fixture(100);
        let a = note(ViolinString::A, PitchClass::A);
        let handle = f.engine.trigger(a, Articulation::Sustain);
        f.engine.stop(&handle);
        f.clock.advance(Duration::from_millis(100));
        f.engine.tick();

        let voice = f
            .device
            .voice("/notes/sustain/A_A_sustain.mp3")
            .expect("voice opened");
        voice.reject_next_play();

        let rejected = f.engine.trigger(a, Articulation::Sustain);
        {
            let resource = rejected.resource();
            assert!(resource.is_paused());
            assert!(resource.is_looping());
            assert_eq!(1.0, resource.volume());
        }

        // Stopping the rejected note is harmless and the next trigger retries.
        f.engine.stop(&rejected);
        assert_eq!(0, f.engine.active_fades());
        let retried = f.engine.trigger(a, Articulation::Sustain);
        assert!(retried.resource().is_playing());
        assert_eq!(2, voice.play_count());
    }

    #[test]
    fn test_rejected_retrigger_of_playing_note_stops_it() {
        let f = fixture(100);
        let a = note(ViolinString::A, PitchClass::A);
        let handle = f.engine.trigger(a, Articulation::Vibrato);
        assert!(handle.status().playing);

        let voice = f
            .device
            .voice("/notes/vibrato/A_A_vibrato.mp3")
            .expect("voice opened");
        voice.reject_next_play();

        let rejected = f.engine.trigger(a, Articulation::Vibrato);
        let status = rejected.status();
        assert!(!status.playing);
        assert!(!voice.is_playing());
        assert_eq!(Duration::ZERO, status.position);
        assert_eq!(1.0, status.volume);

        // Nothing to fade: the note is already silent.
        f.engine.stop(&rejected);
        assert_eq!(0, f.engine.active_fades());
    }

    #[test]
    fn test_trigger_unmutes() {
        let f = fixture(100);
        let d = note(ViolinString::D, PitchClass::DsEb);
        let handle = f.engine.trigger(d, Articulation::Sustain);
        handle.resource().set_muted(true);

        let voice = f
            .device
            .voice("/notes/sustain/D_Ds_Eb_sustain.mp3")
            .expect("voice opened");
        assert!(voice.is_muted());

        let retriggered = f.engine.trigger(d, Articulation::Sustain);
        assert!(!retriggered.status().muted);
        assert!(!voice.is_muted());
    }

    #[test]
    fn test_lookup_without_trigger() {
        let f = fixture(100);
        let key = ResourceKey::new(note(ViolinString::D, PitchClass::G), Articulation::Pluck);
        assert!(f.engine.resource(&key).is_none());

        let handle = f.engine.trigger(key.note(), key.articulation());
        let looked_up = f.engine.resource(&key).expect("resource cached");
        assert!(looked_up.same_resource(&handle));
        assert_eq!(key, looked_up.key());
    }

    #[test]
    fn test_from_config_uses_mock_device() -> Result<(), Box<dyn Error>> {
        let engine = PlaybackEngine::from_config(
            &AudioConfig::new("mock-engine"),
            SettingsStore::default(),
        )?;
        let handle = engine.trigger(note(ViolinString::E, PitchClass::E), Articulation::Pluck);
        assert_eq!("/notes/pluck/E_E_pluck.mp3", handle.resource().address().url());
        assert_eq!(1, engine.device().to_mock()?.opened());
        Ok(())
    }
}
