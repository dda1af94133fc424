// src/state/archive.rs
//
// Project archives.
//
// An archive is a flat set of named entries: `project.json` (the manifest),
// a `README.txt`, and one `blob.<file>` entry per in-memory medium the
// project references. The host packs entries into whatever container it
// ships (zip in the browser editor).

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{ProjectError, ProjectResult};
use crate::state::project::ProjectManifest;

pub const MANIFEST_ENTRY: &str = "project.json";
pub const README_ENTRY: &str = "README.txt";

/// Prefix of paths that refer to media held in memory.
pub const BLOB_SCHEME: &str = "blob:";

/// Prefix of archive entries holding embedded media.
pub const BLOB_ENTRY_PREFIX: &str = "blob.";

const README_TEXT: &str = "Project archive. project.json holds the tracks and history; \
blob.* entries hold recorded or imported media.\n";

/// File name part of a media path.
pub fn media_file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn blob_entry(path: &str) -> String {
    format!("{}{}", BLOB_ENTRY_PREFIX, media_file_name(path))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectArchive {
    entries: BTreeMap<String, Vec<u8>>,
}

/// Result of reading an archive: the manifest with media paths rewritten to
/// local references, and the media keyed by those references.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedProject {
    pub manifest: ProjectManifest,
    pub media: HashMap<String, Vec<u8>>,
}

impl ProjectArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(name.into(), bytes);
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn into_entries(self) -> BTreeMap<String, Vec<u8>> {
        self.entries
    }

    /// Build an archive from a manifest. `media` resolves `blob:` paths to
    /// bytes; every such path must resolve.
    pub fn export<F>(manifest: &ProjectManifest, media: F) -> ProjectResult<Self>
    where
        F: Fn(&str) -> Option<Vec<u8>>,
    {
        let mut archive = Self::new();
        archive.insert(MANIFEST_ENTRY, serde_json::to_vec(manifest)?);
        archive.insert(README_ENTRY, README_TEXT.as_bytes().to_vec());

        let versions = manifest.history.stack.iter().flatten();
        for clip in manifest.tracks.iter().chain(versions).flat_map(|t| &t.clips) {
            let entry = blob_entry(&clip.path);
            if !clip.path.starts_with(BLOB_SCHEME) || archive.get(&entry).is_some() {
                continue;
            }
            let bytes = media(&clip.path)
                .ok_or_else(|| ProjectError::MediaNotFound(clip.path.clone()))?;
            archive.insert(blob_entry(&clip.path), bytes);
        }
        Ok(archive)
    }

    /// Read the manifest and embedded media.
    ///
    /// `local_ref` maps an embedded file name to the local reference clips
    /// should use. Nothing is returned unless every `blob:` clip resolves.
    pub fn import<F>(&self, local_ref: F) -> ProjectResult<ImportedProject>
    where
        F: Fn(&str) -> String,
    {
        let raw = self
            .get(MANIFEST_ENTRY)
            .ok_or(ProjectError::MissingManifest(MANIFEST_ENTRY))?;
        let mut manifest: ProjectManifest = serde_json::from_slice(raw)?;
        manifest.history.validate()?;

        let mut media = HashMap::new();
        let clips = manifest
            .tracks
            .iter_mut()
            .flat_map(|t| t.clips.iter_mut())
            .chain(
                manifest
                    .history
                    .stack
                    .iter_mut()
                    .flat_map(|v| v.iter_mut())
                    .flat_map(|t| t.clips.iter_mut()),
            );

        for clip in clips {
            if !clip.path.starts_with(BLOB_SCHEME) {
                continue;
            }
            let file = media_file_name(&clip.path).to_string();
            let entry = blob_entry(&clip.path);
            let bytes = self
                .get(&entry)
                .ok_or_else(|| ProjectError::MediaNotFound(entry.clone()))?;
            let local = local_ref(&file);
            media.entry(local.clone()).or_insert_with(|| bytes.to_vec());
            clip.path = local;
        }

        Ok(ImportedProject { manifest, media })
    }
}
