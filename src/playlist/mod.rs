// src/playlist/mod.rs
//
// The timeline engine.
//
// A Playlist owns the track collection, the transport and the view state,
// and applies every command from the host. Notifications go out on a channel
// created alongside it and are drained on the host's UI loop. The host
// drives everything from one loop: `dispatch` for user actions,
// `process_block` from the audio side, `tick` once per display frame and
// `poll_workers` to collect background results.

mod dispatch;
mod edit;
mod project;
mod record;
mod render;
mod transport;

pub use transport::PlayHandle;

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, info, warn};
use serde::Serialize;

use crate::audio_buffer::AudioData;
use crate::clock::AudioContext;
use crate::effects::EffectChain;
use crate::error::{ConfigError, EditError, EditResult, LoadError};
use crate::fade::FadeShape;
use crate::gesture::{InteractionMode, PixelScale};
use crate::loader::{Loader, TrackSource, TrackSpec};
use crate::playout::{MasterBus, Playout, PlayoutTicket};
use crate::recorder::{MediaRecorder, RecordingPipeline};
use crate::state::{BLOB_SCHEME, Notification, PlaylistConfig, ProjectLink, RenderFormat};
use crate::track::{Track, TrackId, TrackInfo};
use crate::transport::{TimeSelection, Transport};
use crate::worker::{EncoderWorker, PeakWorker};

/// Name given to tracks loaded without one.
pub const DEFAULT_TRACK_NAME: &str = "Untitled";

/// Snapshot of the whole playlist for hosts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistInfo {
    pub tracks: Vec<TrackInfo>,
    pub duration: f64,
    pub samples_per_pixel: usize,
    pub master_gain: f32,
    pub effects: Vec<String>,
}

pub struct Playlist {
    config: PlaylistConfig,
    context: AudioContext,
    loader: Box<dyn Loader>,
    notify: Sender<Notification>,

    tracks: Vec<Track>,
    next_track_id: TrackId,
    muted: BTreeSet<TrackId>,
    soloed: BTreeSet<TrackId>,
    collapsed: BTreeSet<TrackId>,
    /// Looked up by id on use; removal clears it.
    active_track: Option<TrackId>,

    selection: TimeSelection,
    transport: Transport,
    samples_per_pixel: usize,
    fade_type: FadeShape,
    master_gain: f32,
    master: MasterBus,
    mode: InteractionMode,
    duration: f64,
    scroll_left: f64,
    view_duration: f64,
    is_automatic_scroll: bool,
    duration_format: String,

    animating: bool,
    tickets: Vec<PlayoutTicket>,

    recorder: Option<Box<dyn MediaRecorder>>,
    recording_track: Option<TrackId>,
    pipeline: RecordingPipeline,
    peak_worker: Option<PeakWorker>,
    /// Cleared the first time a worker thread cannot be spawned.
    threads_available: bool,

    is_rendering: bool,
    /// Format of a render waiting on the encoder.
    pending_render: Option<RenderFormat>,
    encoder: Option<EncoderWorker>,
    offline_contexts: usize,

    project: Option<ProjectLink>,
    media: HashMap<String, Arc<Vec<u8>>>,
    next_blob: u64,
}

/// Create a playlist bound to `context`, and the receiver its notifications
/// arrive on.
pub fn create_playlist(
    config: PlaylistConfig,
    context: AudioContext,
    loader: Box<dyn Loader>,
) -> Result<(Playlist, Receiver<Notification>), ConfigError> {
    config.validate()?;
    let (notify, notifications) = unbounded();

    info!(
        "playlist created: {} Hz, {} samples per pixel",
        config.sample_rate, config.samples_per_pixel
    );

    let playlist = Playlist {
        samples_per_pixel: config.samples_per_pixel,
        fade_type: config.fade_type,
        mode: config.state,
        is_automatic_scroll: config.is_automatic_scroll,
        duration_format: config.duration_format.clone(),
        master: MasterBus::new(context.sample_rate(), EffectChain::new()),
        context,
        loader,
        notify,
        tracks: Vec::new(),
        next_track_id: 1,
        muted: BTreeSet::new(),
        soloed: BTreeSet::new(),
        collapsed: BTreeSet::new(),
        active_track: None,
        selection: TimeSelection::default(),
        transport: Transport::new(),
        master_gain: 1.0,
        duration: 0.0,
        scroll_left: 0.0,
        view_duration: 0.0,
        animating: false,
        tickets: Vec::new(),
        recorder: None,
        recording_track: None,
        pipeline: RecordingPipeline::new(),
        peak_worker: None,
        threads_available: true,
        is_rendering: false,
        pending_render: None,
        encoder: None,
        offline_contexts: 0,
        project: None,
        media: HashMap::new(),
        next_blob: 0,
        config,
    };
    Ok((playlist, notifications))
}

impl Playlist {
    // -------------------------------
    // MARK: Accessors
    // -------------------------------

    pub fn config(&self) -> &PlaylistConfig {
        &self.config
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub(crate) fn track_mut(&mut self, id: TrackId) -> EditResult<&mut Track> {
        self.tracks
            .iter_mut()
            .find(|t| t.id() == id)
            .ok_or(EditError::UnknownTrack(id))
    }

    pub fn active_track(&self) -> Option<TrackId> {
        self.active_track.filter(|id| self.track(*id).is_some())
    }

    pub fn selection(&self) -> TimeSelection {
        self.selection
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cursor(&self) -> f64 {
        self.transport.cursor
    }

    pub fn playback_seconds(&self) -> f64 {
        self.transport.playback_seconds
    }

    /// End of the last track, in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn samples_per_pixel(&self) -> usize {
        self.samples_per_pixel
    }

    pub fn sample_rate(&self) -> f64 {
        self.config.sample_rate
    }

    pub fn fade_type(&self) -> FadeShape {
        self.fade_type
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn is_muted(&self, id: TrackId) -> bool {
        self.muted.contains(&id)
    }

    pub fn is_soloed(&self, id: TrackId) -> bool {
        self.soloed.contains(&id)
    }

    pub fn is_collapsed(&self, id: TrackId) -> bool {
        self.collapsed.contains(&id)
    }

    pub fn scroll_left(&self) -> f64 {
        self.scroll_left
    }

    pub fn view_duration(&self) -> f64 {
        self.view_duration
    }

    pub fn is_automatic_scroll(&self) -> bool {
        self.is_automatic_scroll
    }

    pub fn duration_format(&self) -> &str {
        &self.duration_format
    }

    pub fn scale(&self) -> PixelScale {
        PixelScale {
            samples_per_pixel: self.samples_per_pixel,
            sample_rate: self.config.sample_rate,
        }
    }

    /// Media held in memory under a `blob:` path.
    pub fn media(&self, path: &str) -> Option<&Arc<Vec<u8>>> {
        self.media.get(path)
    }

    /// Width of the visible timeline, in pixels.
    pub fn set_view_width(&mut self, pixels: f64) {
        self.view_duration = self.scale().seconds(pixels.max(0.0));
    }

    pub fn set_master_effects(&mut self, effects: EffectChain) {
        self.master.set_effects(effects, self.context.sample_rate());
    }

    pub fn info(&self) -> PlaylistInfo {
        PlaylistInfo {
            tracks: self
                .tracks
                .iter()
                .map(|t| t.info(self.is_muted(t.id()), self.is_soloed(t.id())))
                .collect(),
            duration: self.duration,
            samples_per_pixel: self.samples_per_pixel,
            master_gain: self.master_gain,
            effects: self.master.effects().names().map(str::to_string).collect(),
        }
    }

    // -------------------------------
    // MARK: Loading
    // -------------------------------

    /// Decode and append a batch of tracks.
    ///
    /// The batch commits as a unit: if any source fails, no track is added
    /// and `AudioSourcesError` is reported.
    pub fn load(&mut self, specs: Vec<TrackSpec>) -> Result<Vec<TrackId>, LoadError> {
        let decoded = match self.decode_batch(&specs, &HashMap::new()) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!("load failed: {}", e);
                self.emit(Notification::AudioSourcesError {
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        self.emit(Notification::AudioSourcesLoaded);

        let ids = self.add_tracks(specs, decoded);
        info!("loaded {} tracks", ids.len());
        self.emit(Notification::AudioSourcesRendered);
        Ok(ids)
    }

    /// Decode every source of a batch, stopping at the first failure.
    /// `extra` resolves `blob:` paths not yet in the media store.
    fn decode_batch(
        &self,
        specs: &[TrackSpec],
        extra: &HashMap<String, Vec<u8>>,
    ) -> Result<Vec<AudioData>, LoadError> {
        specs
            .iter()
            .map(|spec| {
                let source = self.resolve_source(&spec.source, extra);
                let data = self.loader.load(&source)?;
                debug!(
                    "decoded {}: {} frames at {} Hz",
                    source.display_name(),
                    data.frames(),
                    data.sample_rate()
                );
                Ok(self.conform_rate(data))
            })
            .collect()
    }

    fn resolve_source(
        &self,
        source: &TrackSource,
        extra: &HashMap<String, Vec<u8>>,
    ) -> TrackSource {
        match source {
            TrackSource::Url(path) if path.starts_with(BLOB_SCHEME) => {
                let data = self
                    .media
                    .get(path)
                    .cloned()
                    .or_else(|| extra.get(path).map(|b| Arc::new(b.clone())));
                match data {
                    Some(data) => TrackSource::Bytes {
                        name: path.clone(),
                        data,
                    },
                    None => source.clone(),
                }
            }
            _ => source.clone(),
        }
    }

    /// Resample to the playlist rate when the decoded rate differs.
    fn conform_rate(&self, data: AudioData) -> AudioData {
        if (data.sample_rate() - self.config.sample_rate).abs() > f64::EPSILON {
            debug!("resampling {} Hz -> {} Hz", data.sample_rate(), self.config.sample_rate);
            data.resample(self.config.sample_rate)
        } else {
            data
        }
    }

    /// Build tracks from decoded specs and append them.
    fn add_tracks(&mut self, specs: Vec<TrackSpec>, decoded: Vec<AudioData>) -> Vec<TrackId> {
        let (spp, mono) = (self.samples_per_pixel, self.config.mono);
        let mut ids = Vec::with_capacity(specs.len());

        for (spec, data) in specs.into_iter().zip(decoded) {
            let id = self.allocate_id();
            let buffer = Arc::new(data);
            let fades = spec.fades(self.fade_type);
            let name = spec.name.unwrap_or_else(|| DEFAULT_TRACK_NAME.to_string());
            let mut track = Track::new(id, name, spec.source, Arc::clone(&buffer));

            let length = buffer.duration();
            let cue_in = spec.cue_in.unwrap_or(0.0).clamp(0.0, length);
            let cue_out = spec.cue_out.unwrap_or(length).clamp(0.0, length);
            if let Err(e) = track.set_cues(cue_in, cue_out) {
                warn!("track {}: {}; keeping the whole buffer", id, e);
            }
            track.set_start_time(spec.start.unwrap_or(0.0));
            track.set_gain_level(spec.gain.unwrap_or(1.0));
            track.set_stereo_pan_value(spec.stereo_pan.unwrap_or(0.0));
            for fade in fades {
                track.set_fade(fade.edge, fade.duration, fade.shape);
            }
            track.set_effects(spec.effects);
            track.custom_class = spec.custom_class;
            track.wave_outline_color = spec.wave_outline_color;
            track.set_enabled_states(spec.enabled_states);
            track.set_state(self.mode);
            track.set_playout(Playout::new(self.context.clone(), Arc::clone(&buffer)));
            track.set_master_gain_level(self.master_gain);

            match spec.peaks.filter(|p| p.samples_per_pixel == spp) {
                Some(peaks) => track.set_peaks(peaks),
                None => track.calculate_peaks(spp, mono),
            }

            if spec.muted {
                self.muted.insert(id);
            }
            if spec.soloed {
                self.soloed.insert(id);
            }
            if let Some(selected) = spec.selected {
                self.active_track = Some(id);
                self.set_time_selection(selected.start, selected.end);
            }

            self.tracks.push(track);
            ids.push(id);
        }

        self.adjust_duration();
        self.apply_should_play();
        ids
    }

    /// Drop every track and load a replacement batch in its place.
    fn replace_tracks(&mut self, specs: Vec<TrackSpec>, decoded: Vec<AudioData>) -> Vec<TrackId> {
        self.stop();
        self.tracks.clear();
        self.muted.clear();
        self.soloed.clear();
        self.collapsed.clear();
        self.active_track = None;
        self.recording_track = None;
        self.add_tracks(specs, decoded)
    }

    // -------------------------------
    // MARK: Helpers
    // -------------------------------

    pub(crate) fn emit(&self, notification: Notification) {
        let name = notification.name();
        if self.notify.send(notification).is_err() {
            debug!("{} dropped: no receiver", name);
        }
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = self.next_track_id;
        self.next_track_id += 1;
        id
    }

    pub(crate) fn set_time_selection(&mut self, start: f64, end: f64) {
        self.selection = TimeSelection::new(start, end);
        self.transport.cursor = self.selection.start;
    }

    pub(crate) fn adjust_duration(&mut self) {
        self.duration = self.tracks.iter().map(Track::end_time).fold(0.0, f64::max);
    }

    /// Solo/mute resolution: with any soloed track only soloed tracks play,
    /// otherwise everything but muted tracks plays.
    pub fn should_track_play(&self, id: TrackId) -> bool {
        if self.soloed.is_empty() {
            !self.muted.contains(&id)
        } else {
            self.soloed.contains(&id)
        }
    }

    fn audibility(&self) -> Vec<bool> {
        self.tracks.iter().map(|t| self.should_track_play(t.id())).collect()
    }

    /// Push the solo/mute resolution to every live playout.
    pub(crate) fn apply_should_play(&mut self) {
        let audible = self.audibility();
        for (track, play) in self.tracks.iter_mut().zip(audible) {
            track.set_should_play(play);
        }
    }

    /// Put every track back into the playlist's interaction mode.
    pub(crate) fn restore_track_states(&mut self) {
        let mode = self.mode;
        for track in &mut self.tracks {
            track.set_state(mode);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing_at(self.context.current_time())
    }

    pub(crate) fn is_playing_at(&self, now: f64) -> bool {
        self.tracks
            .iter()
            .any(|t| t.playout().is_some_and(|p| p.is_playing_at(now)))
    }

    /// Playlist time of the playhead.
    pub fn current_time(&self) -> f64 {
        self.transport.current_time(self.context.current_time())
    }

    // -------------------------------
    // MARK: Workers
    // -------------------------------

    /// Drain recorder events and background worker results.
    pub fn poll_workers(&mut self) {
        self.poll_recorder();
        self.poll_peaks();
        self.poll_encoder();
    }

    /// Poll until no background result is outstanding or `timeout` passes.
    /// Returns false on timeout.
    pub fn wait_for_workers(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll_workers();
            if !self.has_pending_work() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn has_pending_work(&self) -> bool {
        self.pipeline.is_working() || self.pending_render.is_some()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::clock::ClockHandle;
    use crate::loader::MemoryLoader;

    /// Test sample rate: one frame per 10 ms keeps the numbers readable.
    pub const SR: f64 = 100.0;

    pub fn config() -> PlaylistConfig {
        PlaylistConfig {
            sample_rate: SR,
            render_sample_rate: SR,
            samples_per_pixel: 10,
            zoom_levels: vec![5, 10, 20],
            ..Default::default()
        }
    }

    pub fn tone(seconds: f64, level: f32) -> AudioData {
        let frames = (seconds * SR).round() as usize;
        AudioData::new(SR, vec![vec![level; frames]])
    }

    /// Playlist over a loader serving `a.wav` .. `d.wav` (10, 5, 3, 2 s).
    pub fn playlist() -> (Playlist, Receiver<Notification>, ClockHandle) {
        let loader = MemoryLoader::new()
            .with("a.wav", tone(10.0, 0.5))
            .with("b.wav", tone(5.0, 0.25))
            .with("c.wav", tone(3.0, 0.1))
            .with("d.wav", tone(2.0, 0.2));
        let (ctx, clock) = AudioContext::realtime(SR);
        let (playlist, rx) = create_playlist(config(), ctx, Box::new(loader)).unwrap();
        (playlist, rx, clock)
    }

    pub fn drain(rx: &Receiver<Notification>) -> Vec<Notification> {
        rx.try_iter().collect()
    }

    pub fn names(rx: &Receiver<Notification>) -> Vec<&'static str> {
        drain(rx).iter().map(Notification::name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::fade::FadeEdge;
    use crate::loader::{FadeSpec, MemoryLoader};

    #[test]
    fn test_invalid_config_blocks_construction() {
        let (ctx, _clock) = AudioContext::realtime(SR);
        let config = PlaylistConfig {
            samples_per_pixel: 7,
            ..config()
        };
        let result = create_playlist(config, ctx, Box::new(MemoryLoader::new()));
        assert!(matches!(result, Err(ConfigError::InvalidZoom(7))));
    }

    #[test]
    fn test_load_fills_defaults_and_appends() {
        let (mut playlist, rx, _clock) = playlist();
        let ids = playlist.load(vec![TrackSpec::url("a.wav")]).unwrap();
        let track = playlist.track(ids[0]).unwrap();
        assert_eq!(track.name(), DEFAULT_TRACK_NAME);
        assert_eq!(track.start_time(), 0.0);
        assert_eq!(track.cue_out(), 10.0);
        assert_eq!(track.gain(), 1.0);
        assert_eq!(track.peaks().length, 100);
        assert!(track.playout().is_some());

        playlist
            .load(vec![TrackSpec::url("b.wav").named("bass").starting_at(12.0)])
            .unwrap();
        assert_eq!(playlist.tracks().len(), 2);
        assert_eq!(playlist.duration(), 17.0);
        assert_eq!(
            names(&rx),
            vec![
                "audiosourcesloaded",
                "audiosourcesrendered",
                "audiosourcesloaded",
                "audiosourcesrendered"
            ]
        );
    }

    #[test]
    fn test_failed_batch_adds_nothing() {
        let (mut playlist, rx, _clock) = playlist();
        playlist.load(vec![TrackSpec::url("a.wav")]).unwrap();
        drain(&rx);

        let err = playlist
            .load(vec![TrackSpec::url("b.wav"), TrackSpec::url("missing.wav")])
            .unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
        assert_eq!(playlist.tracks().len(), 1);
        assert_eq!(names(&rx), vec!["audiosourceserror"]);
    }

    #[test]
    fn test_load_applies_spec_fields() {
        let (mut playlist, _rx, _clock) = playlist();
        let mut spec = TrackSpec::url("a.wav").with_cues(2.0, 6.0).starting_at(1.0);
        spec.gain = Some(0.5);
        spec.fade_in = Some(FadeSpec {
            duration: 1.0,
            shape: None,
        });
        spec.muted = true;
        spec.selected = Some(TimeSelection::new(2.0, 3.0));

        let id = playlist.load(vec![spec]).unwrap()[0];
        let track = playlist.track(id).unwrap();
        assert_eq!(track.end_time(), 5.0);
        assert_eq!(track.gain(), 0.5);
        assert_eq!(
            track.fade(FadeEdge::In).map(|f| f.shape),
            Some(playlist.fade_type())
        );
        assert!(playlist.is_muted(id));
        assert_eq!(playlist.active_track(), Some(id));
        assert_eq!(playlist.selection(), TimeSelection::new(2.0, 3.0));
    }

    #[test]
    fn test_load_resamples_to_playlist_rate() {
        let loader = MemoryLoader::new().with("hi.wav", AudioData::silent(1, 400, 200.0));
        let (ctx, _clock) = AudioContext::realtime(SR);
        let (mut playlist, _rx) = create_playlist(config(), ctx, Box::new(loader)).unwrap();
        let id = playlist.load(vec![TrackSpec::url("hi.wav")]).unwrap()[0];

        let buffer = playlist.track(id).unwrap().buffer();
        assert_eq!(buffer.sample_rate(), SR);
        assert!((buffer.duration() - 2.0).abs() < 0.02);
    }

    #[test]
    fn test_info_snapshot() {
        let (mut playlist, _rx, _clock) = playlist();
        playlist
            .load(vec![TrackSpec::url("a.wav"), TrackSpec::url("b.wav")])
            .unwrap();
        let info = playlist.info();
        assert_eq!(info.tracks.len(), 2);
        assert_eq!(info.duration, 10.0);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["samplesPerPixel"], 10);
        assert_eq!(json["tracks"][1]["end"], 5.0);
    }
}
