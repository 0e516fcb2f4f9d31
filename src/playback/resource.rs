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

//! Cached audio resources and the handles that refer to them.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};

use super::fade::FadeState;
use crate::audio::{PlaybackError, Voice};
use crate::notes::{NoteKey, PitchClass, ViolinString};

/// The playback style of a note.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Articulation {
    /// A one-shot plucked note that plays to completion.
    #[default]
    Pluck,
    /// A bowed note that loops while held.
    Sustain,
    /// A bowed note with vibrato that loops while held.
    Vibrato,
}

impl Articulation {
    pub const ALL: [Articulation; 3] = [
        Articulation::Pluck,
        Articulation::Sustain,
        Articulation::Vibrato,
    ];

    /// The name used for the sample directory and file suffix.
    pub fn name(&self) -> &'static str {
        match self {
            Articulation::Pluck => "pluck",
            Articulation::Sustain => "sustain",
            Articulation::Vibrato => "vibrato",
        }
    }

    /// Held articulations loop until released; plucks play once.
    pub fn loops(&self) -> bool {
        !matches!(self, Articulation::Pluck)
    }
}

impl fmt::Display for Articulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Articulation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Articulation::ALL
            .into_iter()
            .find(|articulation| articulation.name() == s.trim())
            .ok_or_else(|| format!("unknown articulation '{}'", s))
    }
}

/// The identity of a cached resource: one per string, note and articulation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    note: NoteKey,
    articulation: Articulation,
}

impl ResourceKey {
    pub fn new(note: NoteKey, articulation: Articulation) -> ResourceKey {
        ResourceKey { note, articulation }
    }

    pub fn note(&self) -> NoteKey {
        self.note
    }

    pub fn string(&self) -> ViolinString {
        self.note.string()
    }

    pub fn pitch(&self) -> PitchClass {
        self.note.pitch()
    }

    pub fn articulation(&self) -> Articulation {
        self.articulation
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.note, self.articulation)
    }
}

/// Where the sample for a resource lives:
/// `/notes/{articulation}/{string}_{token}_{articulation}.{extension}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleAddress {
    articulation: Articulation,
    file_name: String,
}

impl SampleAddress {
    pub fn new(key: &ResourceKey, extension: &str) -> SampleAddress {
        let articulation = key.articulation();
        SampleAddress {
            articulation,
            file_name: format!(
                "{}_{}_{}.{}",
                key.string().name(),
                key.pitch().token(),
                articulation.name(),
                extension
            ),
        }
    }

    /// The articulation directory this sample belongs to.
    pub fn articulation(&self) -> Articulation {
        self.articulation
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The rooted address, e.g. `/notes/pluck/E_A_pluck.mp3`.
    pub fn url(&self) -> String {
        format!("/notes/{}/{}", self.articulation.name(), self.file_name)
    }

    /// The sample file under the given root directory.
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join("notes")
            .join(self.articulation.name())
            .join(&self.file_name)
    }
}

impl fmt::Display for SampleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

/// A cached, reusable playback unit bound to one string, note and articulation.
/// The articulation tag decides looping and stop behavior.
pub struct AudioResource {
    key: ResourceKey,
    address: SampleAddress,
    voice: Box<dyn Voice>,
    looping: bool,
    volume: f32,
    muted: bool,
    fade: Option<FadeState>,
}

impl AudioResource {
    pub(crate) fn new(key: ResourceKey, address: SampleAddress, voice: Box<dyn Voice>) -> Self {
        AudioResource {
            key,
            address,
            voice,
            looping: false,
            volume: 1.0,
            muted: false,
            fade: None,
        }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn articulation(&self) -> Articulation {
        self.key.articulation()
    }

    pub fn address(&self) -> &SampleAddress {
        &self.address
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_playing(&self) -> bool {
        self.voice.is_playing()
    }

    /// A paused resource is one that is not currently producing sound.
    pub fn is_paused(&self) -> bool {
        !self.voice.is_playing()
    }

    pub fn position(&self) -> Duration {
        self.voice.position()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub(crate) fn fade(&self) -> Option<&FadeState> {
        self.fade.as_ref()
    }

    pub(crate) fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        self.voice.set_looping(looping);
    }

    pub(crate) fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        self.voice.set_volume(volume);
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
        self.voice.set_muted(muted);
    }

    pub(crate) fn rewind(&mut self) {
        self.voice.rewind();
    }

    pub(crate) fn pause(&mut self) {
        self.voice.pause();
    }

    pub(crate) fn start(&mut self) -> Result<(), PlaybackError> {
        self.voice.play()
    }

    /// Attaches a fade, replacing any fade already in progress.
    pub(crate) fn begin_fade(&mut self, fade: FadeState) -> Option<FadeState> {
        self.fade.replace(fade)
    }

    /// Detaches the fade in progress, if any.
    pub(crate) fn cancel_fade(&mut self) -> Option<FadeState> {
        self.fade.take()
    }
}

impl fmt::Debug for AudioResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioResource")
            .field("address", &self.address.url())
            .field("looping", &self.looping)
            .field("volume", &self.volume)
            .field("muted", &self.muted)
            .field("playing", &self.is_playing())
            .field("fading", &self.fade.is_some())
            .finish()
    }
}

/// A point-in-time copy of a resource's playback state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResourceStatus {
    pub playing: bool,
    pub looping: bool,
    pub volume: f32,
    pub muted: bool,
    pub fading: bool,
    pub position: Duration,
}

pub(crate) type SharedResource = Arc<Mutex<AudioResource>>;

/// A live reference to a cached resource, returned by a trigger and used to stop it later.
/// Not `Clone`: each handle is held by one gesture tracker at a time.
pub struct PlaybackHandle {
    key: ResourceKey,
    resource: SharedResource,
}

impl PlaybackHandle {
    pub(crate) fn new(key: ResourceKey, resource: SharedResource) -> PlaybackHandle {
        PlaybackHandle { key, resource }
    }

    pub fn key(&self) -> ResourceKey {
        self.key
    }

    pub fn articulation(&self) -> Articulation {
        self.key.articulation()
    }

    /// Locks the backing resource for inspection.
    ///
    /// The lock is not reentrant: drop the guard before calling back into the engine
    /// (`trigger`, `stop`, `tick`, `active_fades`) or it will deadlock. Prefer
    /// [`PlaybackHandle::status`] when a copy of the state is enough.
    pub fn resource(&self) -> MutexGuard<'_, AudioResource> {
        self.resource.lock()
    }

    /// A copy of the resource's current state. Holds no lock once it returns.
    pub fn status(&self) -> ResourceStatus {
        let resource = self.resource.lock();
        ResourceStatus {
            playing: resource.is_playing(),
            looping: resource.is_looping(),
            volume: resource.volume(),
            muted: resource.is_muted(),
            fading: resource.is_fading(),
            position: resource.position(),
        }
    }

    /// Returns true if both handles refer to the same cached resource instance.
    pub fn same_resource(&self, other: &PlaybackHandle) -> bool {
        Arc::ptr_eq(&self.resource, &other.resource)
    }

    pub(crate) fn shared(&self) -> &SharedResource {
        &self.resource
    }
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("key", &self.key)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn key(string: ViolinString, pitch: PitchClass, articulation: Articulation) -> ResourceKey {
        ResourceKey::new(NoteKey::new(string, pitch), articulation)
    }

    #[test]
    fn test_articulation_loops() {
        assert!(!Articulation::Pluck.loops());
        assert!(Articulation::Sustain.loops());
        assert!(Articulation::Vibrato.loops());
        assert_eq!(Ok(Articulation::Vibrato), "vibrato".parse());
        assert!("tremolo".parse::<Articulation>().is_err());
    }

    #[test]
    fn test_sample_address() {
        let address = SampleAddress::new(
            &key(ViolinString::E, PitchClass::A, Articulation::Pluck),
            "mp3",
        );
        assert_eq!("/notes/pluck/E_A_pluck.mp3", address.url());

        let address = SampleAddress::new(
            &key(ViolinString::A, PitchClass::CsDb, Articulation::Sustain),
            "mp3",
        );
        assert_eq!("/notes/sustain/A_Cs_Db_sustain.mp3", address.url());
        assert_eq!(Articulation::Sustain, address.articulation());
        assert_eq!(
            PathBuf::from("/srv/public/notes/sustain/A_Cs_Db_sustain.mp3"),
            address.resolve(Path::new("/srv/public"))
        );

        let address = SampleAddress::new(
            &key(ViolinString::G, PitchClass::FsGb, Articulation::Vibrato),
            "wav",
        );
        assert_eq!("/notes/vibrato/G_Fs_Gb_vibrato.wav", address.to_string());
    }
}
