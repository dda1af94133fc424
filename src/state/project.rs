// src/state/project.rs
//
// Versioned project snapshots.
//
// A project is an ordered list of tracks, each holding clips, plus an
// undo/redo history of earlier versions. The playlist only ever syncs with a
// project through the VersionedProject trait: it projects its tracks into
// clips on commit and rebuilds its tracks from clips after a load, undo, or
// redo. It never owns the project.

use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};

use crate::error::{ProjectError, ProjectResult};

/// Effect names understood by the clip sync.
pub const EFFECT_FADE_IN: &str = "fade-in";
pub const EFFECT_FADE_OUT: &str = "fade-out";
pub const EFFECT_GAIN: &str = "gain";
pub const EFFECT_STEREO_PAN: &str = "stereo-pan";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClipEffect {
    pub name: String,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl ClipEffect {
    /// An effect with a single numeric parameter.
    pub fn with_param(name: &str, key: &str, value: f64) -> Self {
        let mut params = serde_json::Map::new();
        params.insert(key.to_string(), serde_json::Value::from(value));
        Self {
            name: name.to_string(),
            params,
        }
    }

    pub fn param(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// A placed region of a media file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    pub path: String,
    /// Timeline position in seconds.
    pub starts_at: f64,
    /// Offset into the media in seconds.
    pub offset: f64,
    /// Audible length in seconds.
    pub duration: f64,
    #[serde(default)]
    pub effects: Vec<ClipEffect>,
}

impl Clip {
    pub fn effect(&self, name: &str) -> Option<&ClipEffect> {
        self.effects.iter().find(|e| e.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub clips: Vec<Clip>,
}

/// Undo/redo history.
///
/// `current_index` counts versions from 1; 0 means nothing was committed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct History {
    pub stack: Vec<Vec<ProjectTrack>>,
    pub current_index: usize,
    /// While set, commits replace the newest version instead of stacking.
    #[serde(default)]
    pub cooldown: bool,
}

impl History {
    pub fn validate(&self) -> ProjectResult<()> {
        if self.current_index > self.stack.len() {
            return Err(ProjectError::MalformedHistory(format!(
                "current index {} past {} versions",
                self.current_index,
                self.stack.len()
            )));
        }
        if self.current_index == 0 && !self.stack.is_empty() {
            return Err(ProjectError::MalformedHistory(
                "versions present but no current version".to_string(),
            ));
        }
        Ok(())
    }
}

/// The persisted project document (`project.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub tracks: Vec<ProjectTrack>,
    #[serde(default)]
    pub history: History,
}

//
// ===============================
// MARK: Versioned project
// ===============================
//

/// An external project with undo/redo history.
pub trait VersionedProject: Send {
    fn tracks(&self) -> &[ProjectTrack];

    fn set_tracks(&mut self, tracks: Vec<ProjectTrack>);

    /// Record the current tracks as a new version.
    fn commit(&mut self);

    fn undo(&mut self);

    fn redo(&mut self);

    fn history(&self) -> &History;

    fn is_in_last_version(&self) -> bool {
        let h = self.history();
        h.current_index >= h.stack.len()
    }

    /// Replace tracks and history wholesale.
    fn restore(&mut self, manifest: ProjectManifest);

    fn manifest(&self) -> ProjectManifest {
        ProjectManifest {
            tracks: self.tracks().to_vec(),
            history: self.history().clone(),
        }
    }
}

/// Shared handle to a project. The playlist keeps only a `ProjectLink`.
pub type SharedProject = Arc<Mutex<dyn VersionedProject>>;

/// Non-owning reference from the playlist to its project.
pub type ProjectLink = Weak<Mutex<dyn VersionedProject>>;

/// In-memory project.
#[derive(Debug, Clone, Default)]
pub struct MemoryProject {
    tracks: Vec<ProjectTrack>,
    history: History,
}

impl MemoryProject {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedProject {
        Arc::new(Mutex::new(self))
    }

    pub fn set_cooldown(&mut self, cooldown: bool) {
        self.history.cooldown = cooldown;
    }

    fn load_current(&mut self) {
        if let Some(version) = self
            .history
            .current_index
            .checked_sub(1)
            .and_then(|i| self.history.stack.get(i))
        {
            self.tracks = version.clone();
        }
    }
}

impl VersionedProject for MemoryProject {
    fn tracks(&self) -> &[ProjectTrack] {
        &self.tracks
    }

    fn set_tracks(&mut self, tracks: Vec<ProjectTrack>) {
        self.tracks = tracks;
    }

    fn commit(&mut self) {
        let h = &mut self.history;
        h.stack.truncate(h.current_index);
        if h.cooldown && !h.stack.is_empty() {
            if let Some(top) = h.stack.last_mut() {
                *top = self.tracks.clone();
            }
        } else {
            h.stack.push(self.tracks.clone());
        }
        h.current_index = h.stack.len();
    }

    fn undo(&mut self) {
        if self.history.current_index > 1 {
            self.history.current_index -= 1;
            self.load_current();
        }
    }

    fn redo(&mut self) {
        if !self.is_in_last_version() {
            self.history.current_index += 1;
            self.load_current();
        }
    }

    fn history(&self) -> &History {
        &self.history
    }

    fn restore(&mut self, manifest: ProjectManifest) {
        self.tracks = manifest.tracks;
        self.history = manifest.history;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(path: &str) -> ProjectTrack {
        ProjectTrack {
            name: path.to_string(),
            clips: vec![Clip {
                path: path.to_string(),
                starts_at: 0.0,
                offset: 0.0,
                duration: 1.0,
                effects: vec![ClipEffect::with_param(EFFECT_FADE_IN, "duration", 0.5)],
            }],
        }
    }

    #[test]
    fn test_commit_undo_redo() {
        let mut p = MemoryProject::new();
        p.set_tracks(vec![track("a")]);
        p.commit();
        p.set_tracks(vec![track("a"), track("b")]);
        p.commit();
        assert_eq!(p.history().current_index, 2);
        assert!(p.is_in_last_version());

        p.undo();
        assert_eq!(p.tracks().len(), 1);
        // index 1 is the floor
        p.undo();
        assert_eq!(p.history().current_index, 1);

        p.redo();
        assert_eq!(p.tracks().len(), 2);
    }

    #[test]
    fn test_commit_after_undo_drops_redo_branch() {
        let mut p = MemoryProject::new();
        for n in 1..=3 {
            p.set_tracks((0..n).map(|_| track("x")).collect());
            p.commit();
        }
        p.undo();
        p.undo();
        p.set_tracks(vec![]);
        p.commit();
        assert_eq!(p.history().stack.len(), 2);
        assert!(p.is_in_last_version());
    }

    #[test]
    fn test_cooldown_coalesces_commits() {
        let mut p = MemoryProject::new();
        p.commit();
        p.set_cooldown(true);
        p.set_tracks(vec![track("a")]);
        p.commit();
        assert_eq!(p.history().stack.len(), 1);
        assert_eq!(p.history().stack[0].len(), 1);
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = ProjectManifest {
            tracks: vec![track("media/a.wav")],
            history: History::default(),
        };
        let json = serde_json::to_value(&manifest).unwrap();
        let clip = &json["tracks"][0]["clips"][0];
        assert_eq!(clip["startsAt"], 0.0);
        assert_eq!(clip["effects"][0]["name"], "fade-in");
        assert_eq!(json["history"]["currentIndex"], 0);
    }

    #[test]
    fn test_history_validation() {
        let bad = History {
            stack: vec![],
            current_index: 2,
            cooldown: false,
        };
        assert!(matches!(bad.validate(), Err(ProjectError::MalformedHistory(_))));
        assert!(History::default().validate().is_ok());
    }
}
