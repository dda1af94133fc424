// src/playlist/project.rs
//
// Two-way sync with a versioned project.
//
// The playlist holds only a weak link to the project; the host owns it.
// Commit projects every track into one clip, copy-back flattens every clip
// into one track. In-memory sources are stored as `blob:` media so they
// survive the trip and can be embedded in an archive.

use std::collections::HashMap;
use std::sync::{Arc, MutexGuard, PoisonError};

use log::{debug, info, warn};
use serde_json::Value;

use crate::audio_buffer::AudioData;
use crate::error::{ProjectError, ProjectResult};
use crate::fade::{FadeEdge, FadeShape};
use crate::loader::{FadeSpec, TrackSource, TrackSpec};
use crate::state::{
    BLOB_SCHEME, Clip, ClipEffect, EFFECT_FADE_IN, EFFECT_FADE_OUT, EFFECT_GAIN,
    EFFECT_STEREO_PAN, Notification, ProjectArchive, ProjectTrack, SharedProject,
    VersionedProject, media_file_name,
};
use crate::track::{Track, TrackId};
use crate::worker::encode_wav;

use super::Playlist;

/// Namespace of media references the playlist creates.
const MEDIA_PREFIX: &str = "waveline/";

fn lock(project: &SharedProject) -> MutexGuard<'_, dyn VersionedProject + 'static> {
    project.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Media file names end up in archive entry names; keep them flat.
fn flat_file_name(name: &str) -> String {
    media_file_name(name)
        .chars()
        .map(|c| if c == ':' || c == '\\' { '_' } else { c })
        .collect()
}

fn clip_from_track(track: &Track, path: String) -> Clip {
    let mut effects = Vec::new();
    for (edge, name) in [(FadeEdge::In, EFFECT_FADE_IN), (FadeEdge::Out, EFFECT_FADE_OUT)] {
        if let Some(fade) = track.fade(edge) {
            let mut effect = ClipEffect::with_param(name, "duration", fade.duration);
            effect
                .params
                .insert("shape".to_string(), Value::from(fade.shape.as_str()));
            effects.push(effect);
        }
    }
    effects.push(ClipEffect::with_param(EFFECT_GAIN, "value", f64::from(track.gain())));
    effects.push(ClipEffect::with_param(
        EFFECT_STEREO_PAN,
        "value",
        f64::from(track.stereo_pan()),
    ));

    Clip {
        path,
        starts_at: track.start_time(),
        offset: track.cue_in(),
        duration: track.cue_out() - track.cue_in(),
        effects,
    }
}

fn fade_from_effect(effect: &ClipEffect) -> Option<FadeSpec> {
    let duration = effect.param("duration")?;
    let shape = effect
        .params
        .get("shape")
        .and_then(|v| serde_json::from_value::<FadeShape>(v.clone()).ok());
    Some(FadeSpec { duration, shape })
}

fn spec_from_clip(track: &ProjectTrack, clip: &Clip) -> TrackSpec {
    let name = if track.name.is_empty() {
        media_file_name(&clip.path).to_string()
    } else {
        track.name.clone()
    };
    let mut spec = TrackSpec::url(clip.path.clone())
        .named(name)
        .starting_at(clip.starts_at)
        .with_cues(clip.offset, clip.offset + clip.duration);

    spec.fade_in = clip.effect(EFFECT_FADE_IN).and_then(fade_from_effect);
    spec.fade_out = clip.effect(EFFECT_FADE_OUT).and_then(fade_from_effect);
    spec.gain = clip
        .effect(EFFECT_GAIN)
        .and_then(|e| e.param("value"))
        .map(|v| v as f32);
    spec.stereo_pan = clip
        .effect(EFFECT_STEREO_PAN)
        .and_then(|e| e.param("value"))
        .map(|v| v as f32);
    spec
}

impl Playlist {
    /// Link a project. Only a weak reference is kept.
    pub fn attach_project(&mut self, project: &SharedProject) {
        self.project = Some(Arc::downgrade(project));
    }

    pub fn detach_project(&mut self) {
        self.project = None;
    }

    fn linked_project(&self) -> ProjectResult<SharedProject> {
        self.project
            .as_ref()
            .and_then(|link| link.upgrade())
            .ok_or(ProjectError::NoProject)
    }

    // -------------------------------
    // MARK: Commit
    // -------------------------------

    /// Write the track collection into the project and record a version.
    pub fn commit(&mut self) -> ProjectResult<()> {
        let project = self.linked_project()?;
        let tracks = self.project_tracks()?;
        let count = tracks.len();
        let mut project = lock(&project);
        project.set_tracks(tracks);
        project.commit();
        debug!(
            "committed {} tracks (version {})",
            count,
            project.history().current_index
        );
        Ok(())
    }

    fn project_tracks(&mut self) -> ProjectResult<Vec<ProjectTrack>> {
        let mut out = Vec::with_capacity(self.tracks.len());
        for index in 0..self.tracks.len() {
            let path = self.media_path(index)?;
            let track = &self.tracks[index];
            out.push(ProjectTrack {
                name: track.name().to_string(),
                clips: vec![clip_from_track(track, path)],
            });
        }
        Ok(out)
    }

    /// Path the project should reference for a track's media. In-memory
    /// sources are stored under a fresh `blob:` path and the track is
    /// repointed at it.
    fn media_path(&mut self, index: usize) -> ProjectResult<String> {
        let track = &self.tracks[index];
        let (file, bytes) = match track.source() {
            TrackSource::Url(path) => return Ok(path.clone()),
            TrackSource::Bytes { name, data } => (flat_file_name(name), Arc::clone(data)),
            TrackSource::Buffer(data) => {
                let bytes = encode_wav(data).map_err(|e| ProjectError::Media(e.to_string()))?;
                (format!("{}.wav", flat_file_name(track.name())), Arc::new(bytes))
            }
        };

        self.next_blob += 1;
        let path = format!("{}{}{}-{}", BLOB_SCHEME, MEDIA_PREFIX, self.next_blob, file);
        debug!("storing {} bytes of media at {}", bytes.len(), path);
        self.media.insert(path.clone(), bytes);
        self.tracks[index].set_source(TrackSource::Url(path.clone()));
        Ok(path)
    }

    // -------------------------------
    // MARK: Copy-back
    // -------------------------------

    /// Decode every clip of `tracks`, one track spec per clip.
    fn prepare_copy(
        &self,
        tracks: &[ProjectTrack],
        extra: &HashMap<String, Vec<u8>>,
    ) -> ProjectResult<(Vec<TrackSpec>, Vec<AudioData>)> {
        let specs: Vec<TrackSpec> = tracks
            .iter()
            .flat_map(|t| t.clips.iter().map(move |c| spec_from_clip(t, c)))
            .collect();
        let decoded = self.decode_batch(&specs, extra)?;
        Ok((specs, decoded))
    }

    /// Rebuild the track collection from the project's current tracks.
    pub fn sync_from_project(&mut self) -> ProjectResult<Vec<TrackId>> {
        let project = self.linked_project()?;
        self.copy_back(&project)
    }

    fn copy_back(&mut self, project: &SharedProject) -> ProjectResult<Vec<TrackId>> {
        let tracks = lock(project).tracks().to_vec();
        let (specs, decoded) = self.prepare_copy(&tracks, &HashMap::new())?;
        let ids = self.replace_tracks(specs, decoded);
        self.emit(Notification::AudioSourcesRendered);
        Ok(ids)
    }

    /// Step the project back one version and rebuild from it. Refused at
    /// the first version. A version that fails to load is stepped over
    /// again so the project and the playlist stay in agreement.
    pub fn undo(&mut self) -> ProjectResult<()> {
        let project = self.linked_project()?;
        {
            let mut p = lock(&project);
            if p.history().current_index <= 1 {
                return Err(ProjectError::NothingToUndo);
            }
            p.undo();
        }
        if let Err(e) = self.copy_back(&project) {
            warn!("undo failed, restoring version: {}", e);
            lock(&project).redo();
            return Err(e);
        }
        Ok(())
    }

    pub fn redo(&mut self) -> ProjectResult<()> {
        let project = self.linked_project()?;
        {
            let mut p = lock(&project);
            if p.is_in_last_version() {
                return Err(ProjectError::NothingToRedo);
            }
            p.redo();
        }
        if let Err(e) = self.copy_back(&project) {
            warn!("redo failed, restoring version: {}", e);
            lock(&project).undo();
            return Err(e);
        }
        Ok(())
    }

    // -------------------------------
    // MARK: Archives
    // -------------------------------

    /// Replace the project and the tracks with an archive's contents.
    ///
    /// Everything is decoded before anything is replaced, so a bad archive
    /// leaves both untouched.
    pub fn import_project(&mut self, archive: &ProjectArchive) -> ProjectResult<Vec<TrackId>> {
        let project = self.linked_project()?;
        let imported =
            archive.import(|file| format!("{}{}import/{}", BLOB_SCHEME, MEDIA_PREFIX, file))?;
        let (specs, decoded) = self.prepare_copy(&imported.manifest.tracks, &imported.media)?;

        self.media
            .extend(imported.media.into_iter().map(|(path, bytes)| (path, Arc::new(bytes))));
        lock(&project).restore(imported.manifest);
        let ids = self.replace_tracks(specs, decoded);
        info!("imported project with {} tracks", ids.len());
        self.emit(Notification::AudioSourcesRendered);
        Ok(ids)
    }

    /// Pack the project and its in-memory media into an archive.
    pub fn export_project(&mut self) -> ProjectResult<ProjectArchive> {
        let project = self.linked_project()?;
        let manifest = lock(&project).manifest();
        let archive = ProjectArchive::export(&manifest, |path| {
            self.media.get(path).map(|bytes| bytes.to_vec())
        })?;
        info!("exported project archive ({} entries)", archive.names().count());
        self.emit(Notification::ZipProjectExported {
            archive: archive.clone(),
        });
        Ok(archive)
    }
}
