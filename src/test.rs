// src/test.rs
//
// End-to-end scenarios driving the playlist the way a host does: through
// the command bus, the audio callback, and the animation tick.

use serde_json::json;

use crate::fade::FadeEdge;
use crate::loader::TrackSpec;
use crate::playlist::testing::{self, drain, names};
use crate::render_tree::RenderTree;
use crate::state::{
    Command, MemoryProject, Notification, RenderFormat, RenderOutput, VersionedProject,
};

fn bus(name: &str, args: serde_json::Value) -> Command {
    Command::from_event(name, &args).unwrap()
}

#[test]
fn test_edit_play_render_and_version_session() {
    // --------------------------------
    // Playlist with a project
    // --------------------------------
    let (mut playlist, rx, _clock) = testing::playlist();
    let project = MemoryProject::new().shared();
    playlist.attach_project(&project);

    let ids = playlist
        .load(vec![TrackSpec::url("a.wav"), TrackSpec::url("b.wav").starting_at(2.0)])
        .unwrap();
    assert_eq!(names(&rx), vec!["audiosourcesloaded", "audiosourcesrendered"]);
    assert_eq!(playlist.duration(), 10.0);
    playlist.dispatch(Command::Commit).unwrap();

    // --------------------------------
    // Edit through the bus
    // --------------------------------
    playlist
        .dispatch(bus("select", json!({"start": 2.0, "end": 5.0, "track": ids[0]})))
        .unwrap();
    playlist.dispatch(Command::Cut).unwrap();
    playlist
        .dispatch(bus("fadeout", json!({"track": ids[1], "duration": 1.0})))
        .unwrap();
    assert_eq!(names(&rx), vec!["timeupdate", "cutfinished"]);
    assert!((playlist.duration() - 7.0).abs() < 1e-9);
    playlist.dispatch(Command::Commit).unwrap();
    assert_eq!(project.lock().unwrap().history().current_index, 2);

    // --------------------------------
    // Play a block and animate
    // --------------------------------
    playlist.dispatch(bus("play", json!({"start": 0.0}))).unwrap();
    let mut l = vec![0.0; 50];
    let mut r = vec![0.0; 50];
    playlist.process_block(&mut l, &mut r);
    assert!(l[10] > 0.0);
    assert!(playlist.tick());
    assert!(matches!(
        drain(&rx)[..],
        [Notification::TimeUpdate { playback_seconds }] if (playback_seconds - 0.5).abs() < 1e-9
    ));
    playlist.dispatch(Command::Stop).unwrap();

    // --------------------------------
    // Offline mixdown
    // --------------------------------
    playlist
        .dispatch(bus("startaudiorendering", json!({"format": "buffer"})))
        .unwrap();
    let rendered = drain(&rx).into_iter().find_map(|n| match n {
        Notification::AudioRenderingFinished {
            output: RenderOutput::Buffer(buffer),
            format: RenderFormat::Buffer,
        } => Some(buffer),
        _ => None,
    });
    assert_eq!(rendered.map(|b| b.frames()), Some(700));

    // --------------------------------
    // Undo and redo
    // --------------------------------
    playlist.dispatch(Command::Undo).unwrap();
    assert_eq!(playlist.tracks().len(), 2);
    assert_eq!(playlist.tracks()[0].duration(), 10.0);
    assert!(playlist.tracks()[1].fade(FadeEdge::Out).is_none());

    playlist.dispatch(Command::Redo).unwrap();
    assert!((playlist.tracks()[0].duration() - 7.0).abs() < 1e-6);
    assert_eq!(playlist.tracks()[1].fade(FadeEdge::Out).map(|f| f.duration), Some(1.0));

    let tree = RenderTree::build(&playlist);
    assert_eq!(tree.tracks.len(), 2);
}

#[test]
fn test_exported_session_reopens_elsewhere() {
    let (mut playlist, rx, _clock) = testing::playlist();
    let project = MemoryProject::new().shared();
    playlist.attach_project(&project);

    let ids = playlist.load(vec![TrackSpec::url("a.wav").named("keys")]).unwrap();
    playlist.seek(0.0, Some(4.0), Some(ids[0]));
    playlist.cut().unwrap();
    playlist.commit().unwrap();
    drain(&rx);

    playlist.dispatch(Command::ExportZipProject).unwrap();
    let archive = drain(&rx).into_iter().find_map(|n| match n {
        Notification::ZipProjectExported { archive } => Some(archive),
        _ => None,
    });
    let archive = archive.unwrap();

    let (mut other, other_rx, _clock) = testing::playlist();
    let other_project = MemoryProject::new().shared();
    other.attach_project(&other_project);
    other
        .dispatch(Command::ImportZipProject {
            archive: Box::new(archive),
        })
        .unwrap();

    assert_eq!(names(&other_rx), vec!["audiosourcesrendered"]);
    assert_eq!(other.tracks().len(), 1);
    assert_eq!(other.tracks()[0].name(), "keys");
    assert!((other.duration() - 6.0).abs() < 1e-6);
    assert_eq!(other_project.lock().unwrap().history().current_index, 1);
}
