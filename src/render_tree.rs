// src/render_tree.rs
//
// Declarative view of the playlist.
//
// The tree is plain serializable data: a time ruler, one row per track and
// an optional annotation layer, all positioned in pixels at the current
// zoom. Painting and diffing belong to the host; rebuilding the tree after
// every state change is cheap enough that nothing here is incremental.

use serde::Serialize;

use crate::fade::{FadeEdge, FadeShape};
use crate::gesture::PixelScale;
use crate::peaks::Peak;
use crate::playlist::Playlist;
use crate::track::{Track, TrackId};

/// Minimum distance between labelled ruler marks.
const MIN_LABEL_SPACING_PX: f64 = 80.0;

/// Candidate label steps, in seconds.
const LABEL_STEPS: [f64; 14] = [
    0.1, 0.2, 0.5, 1.0, 2.0, 5.0, 10.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0,
];

/// Unlabelled ticks between two labels.
const TICKS_PER_LABEL: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderTree {
    pub time_scale: Option<TimeScale>,
    pub tracks: Vec<TrackRow>,
    pub annotations: Option<AnnotationLayer>,
    /// Width of the timeline, in pixels.
    pub width: f64,
}

// -------------------------------
// MARK: Ruler
// -------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeScale {
    /// Left offset taken by track controls.
    pub offset: f64,
    pub color: String,
    pub marks: Vec<TimeMark>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeMark {
    pub pixel: f64,
    /// Set on labelled marks only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TimeScale {
    /// Marks across `[0, duration]`, labelled at the smallest step that keeps
    /// labels readable.
    pub fn build(duration: f64, scale: PixelScale, offset: f64, color: &str) -> Self {
        let step = label_step(scale);
        let tick = step / TICKS_PER_LABEL as f64;
        let count = (duration / tick).floor() as usize;

        let marks = (0..=count)
            .map(|i| {
                let seconds = i as f64 * tick;
                let label = (i % TICKS_PER_LABEL == 0).then(|| ruler_label(seconds, step));
                TimeMark {
                    pixel: scale.pixels(seconds),
                    label,
                }
            })
            .collect();

        Self {
            offset,
            color: color.to_string(),
            marks,
        }
    }
}

fn label_step(scale: PixelScale) -> f64 {
    LABEL_STEPS
        .iter()
        .copied()
        .find(|step| scale.pixels(*step) >= MIN_LABEL_SPACING_PX)
        .unwrap_or(LABEL_STEPS[LABEL_STEPS.len() - 1])
}

fn ruler_label(seconds: f64, step: f64) -> String {
    if step < 1.0 {
        let tenths = (seconds * 10.0).round() as u64;
        format!("{}:{:02}.{}", tenths / 600, (tenths / 10) % 60, tenths % 10)
    } else {
        let secs = seconds.round() as u64;
        format!("{}:{:02}", secs / 60, secs % 60)
    }
}

/// Format a time for display in one of the clock formats: `hh:mm:ss`,
/// `hh:mm:ss.u`, `hh:mm:ss.uuu`, `seconds` or `thousandths`. Unknown
/// formats use `hh:mm:ss.uuu`.
pub fn format_time(seconds: f64, format: &str) -> String {
    let seconds = seconds.max(0.0);
    match format {
        "seconds" => format!("{:.0}", seconds),
        "thousandths" => format!("{:.3}", seconds),
        "hh:mm:ss" => clock_format(seconds, 0),
        "hh:mm:ss.u" => clock_format(seconds, 1),
        _ => clock_format(seconds, 3),
    }
}

fn clock_format(seconds: f64, decimals: u32) -> String {
    let unit = 10u64.pow(decimals);
    let total = (seconds * unit as f64).round() as u64;
    let whole = total / unit;
    let (hours, minutes, secs) = (whole / 3600, (whole / 60) % 60, whole % 60);
    if decimals == 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        let frac = total % unit;
        format!(
            "{:02}:{:02}:{:02}.{:0width$}",
            hours,
            minutes,
            secs,
            frac,
            width = decimals as usize
        )
    }
}

// -------------------------------
// MARK: Tracks
// -------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRow {
    pub id: TrackId,
    pub name: String,
    pub class_name: String,
    pub height: u32,
    pub collapsed: bool,
    pub active: bool,
    pub should_play: bool,
    /// A select or shift drag is in progress on this row.
    pub dragging: bool,
    pub controls: Option<TrackControls>,
    /// Left edge of the waveform.
    pub offset: f64,
    pub waveform: Waveform,
    pub fades: Vec<FadeOverlay>,
    pub selection: Option<Span>,
    pub cursor: f64,
    /// Filled progress, when the seek style or playback calls for it.
    pub progress: Option<f64>,
    pub razor_marks: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackControls {
    pub width: u32,
    pub muted: bool,
    pub soloed: bool,
    /// 0..100
    pub volume: f32,
    pub stereo_pan: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Waveform {
    pub width: f64,
    pub bar_width: u32,
    pub bar_gap: u32,
    pub outline_color: String,
    pub channels: Vec<Vec<Peak>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FadeOverlay {
    pub edge: FadeEdge,
    pub shape: FadeShape,
    pub span: Span,
}

/// Horizontal pixel range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Span {
    pub left: f64,
    pub width: f64,
}

impl Span {
    fn between(scale: PixelScale, start: f64, end: f64) -> Self {
        let left = scale.pixels(start);
        Self {
            left,
            width: (scale.pixels(end) - left).max(0.0),
        }
    }
}

// -------------------------------
// MARK: Annotations
// -------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationLayer {
    pub editable: bool,
    pub link_endpoints: bool,
    pub is_continuous_play: bool,
    pub items: Vec<AnnotationBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationBox {
    pub id: String,
    pub span: Span,
    pub start_label: String,
    pub end_label: String,
    pub lines: Vec<String>,
    pub lang: Option<String>,
    /// Under the playhead.
    pub active: bool,
}

// -------------------------------
// MARK: Builder
// -------------------------------

impl RenderTree {
    pub fn build(playlist: &Playlist) -> Self {
        let config = playlist.config();
        let scale = playlist.scale();
        let controls_width = if config.controls.show {
            config.controls.width
        } else {
            0
        };

        let time_scale = config.timescale.then(|| {
            TimeScale::build(
                playlist.duration(),
                scale,
                f64::from(controls_width),
                &config.colors.time_color,
            )
        });

        let tracks = playlist
            .tracks()
            .iter()
            .map(|track| track_row(playlist, track, scale))
            .collect();

        let annotations = &config.annotations;
        let annotations = (!annotations.annotations.is_empty()).then(|| {
            let now = playlist.playback_seconds();
            AnnotationLayer {
                editable: annotations.editable,
                link_endpoints: annotations.link_endpoints,
                is_continuous_play: annotations.is_continuous_play,
                items: annotations
                    .annotations
                    .iter()
                    .map(|a| AnnotationBox {
                        id: a.id.clone(),
                        span: Span::between(scale, a.start, a.end),
                        start_label: format_time(a.start, playlist.duration_format()),
                        end_label: format_time(a.end, playlist.duration_format()),
                        lines: a.lines.clone(),
                        lang: a.lang.clone(),
                        active: playlist.is_playing() && now >= a.start && now < a.end,
                    })
                    .collect(),
            }
        });

        Self {
            time_scale,
            tracks,
            annotations,
            width: scale.pixels(playlist.duration()),
        }
    }
}

/// With a segment selected only the active track shows it; otherwise every
/// track shows the cursor.
fn is_active(playlist: &Playlist, id: TrackId) -> bool {
    !playlist.selection().is_segment() || playlist.active_track() == Some(id)
}

fn track_row(playlist: &Playlist, track: &Track, scale: PixelScale) -> TrackRow {
    let config = playlist.config();
    let id = track.id();
    let collapsed = playlist.is_collapsed(id);
    let active = is_active(playlist, id);
    let selection = playlist.selection();
    let start = track.start_time();

    let fades = [FadeEdge::In, FadeEdge::Out]
        .into_iter()
        .filter_map(|edge| track.fade(edge))
        .map(|fade| {
            let (from, to) = match fade.edge {
                FadeEdge::In => (start, start + fade.duration),
                FadeEdge::Out => (track.end_time() - fade.duration, track.end_time()),
            };
            FadeOverlay {
                edge: fade.edge,
                shape: fade.shape,
                span: Span::between(scale, from, to),
            }
        })
        .collect();

    let show_progress = playlist.is_playing() || playlist.playback_seconds() > 0.0;
    let progress = show_progress.then(|| scale.pixels(playlist.playback_seconds()));

    let mut class_name = format!("channel-wrapper {}", track.state().class_name());
    if let Some(custom) = &track.custom_class {
        class_name.push(' ');
        class_name.push_str(custom);
    }

    TrackRow {
        id,
        name: track.name().to_string(),
        class_name,
        height: if collapsed {
            config.collapsed_wave_height
        } else {
            config.wave_height
        },
        collapsed,
        active,
        should_play: playlist.should_track_play(id),
        dragging: track.is_gesture_active(),
        controls: config.controls.show.then(|| TrackControls {
            width: config.controls.width,
            muted: playlist.is_muted(id),
            soloed: playlist.is_soloed(id),
            volume: track.gain() * 100.0,
            stereo_pan: track.stereo_pan(),
        }),
        offset: scale.pixels(start),
        waveform: Waveform {
            width: scale.pixels(track.duration()),
            bar_width: config.bar_width,
            bar_gap: config.bar_gap,
            outline_color: track
                .wave_outline_color
                .clone()
                .unwrap_or_else(|| config.colors.wave_outline_color.clone()),
            channels: if collapsed {
                Vec::new()
            } else {
                track.peaks().data.clone()
            },
        },
        fades,
        selection: (active && selection.is_segment())
            .then(|| Span::between(scale, selection.start, selection.end)),
        cursor: scale.pixels(playlist.cursor()),
        progress,
        razor_marks: track
            .razor_marks()
            .iter()
            .map(|mark| scale.pixels(start + mark - track.cue_in()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::AudioContext;
    use crate::gesture::{InteractionMode, PointerEvent};
    use crate::loader::{MemoryLoader, TrackSpec};
    use crate::audio_buffer::AudioData;
    use crate::playlist::create_playlist;
    use crate::state::{Annotation, PlaylistConfig};

    const SCALE: PixelScale = PixelScale {
        samples_per_pixel: 10,
        sample_rate: 100.0,
    };

    fn playlist(config: PlaylistConfig) -> Playlist {
        let loader = MemoryLoader::new()
            .with("a.wav", AudioData::new(100.0, vec![vec![0.5; 1000]]))
            .with("b.wav", AudioData::new(100.0, vec![vec![0.25; 500]]));
        let (ctx, _clock) = AudioContext::realtime(100.0);
        let config = PlaylistConfig {
            sample_rate: 100.0,
            samples_per_pixel: 10,
            zoom_levels: vec![10],
            ..config
        };
        let (mut playlist, _rx) = create_playlist(config, ctx, Box::new(loader)).unwrap();
        playlist
            .load(vec![TrackSpec::url("a.wav"), TrackSpec::url("b.wav").starting_at(2.0)])
            .unwrap();
        playlist
    }

    #[test]
    fn test_clock_formats() {
        assert_eq!(format_time(3725.5, "hh:mm:ss"), "01:02:06");
        assert_eq!(format_time(3725.25, "hh:mm:ss.u"), "01:02:05.3");
        assert_eq!(format_time(65.0106, "hh:mm:ss.uuu"), "00:01:05.011");
        assert_eq!(format_time(59.9999, "hh:mm:ss.uuu"), "00:01:00.000");
        assert_eq!(format_time(12.4, "seconds"), "12");
        assert_eq!(format_time(1.23456, "thousandths"), "1.235");
        assert_eq!(format_time(-1.0, "bogus"), "00:00:00.000");
    }

    #[test]
    fn test_ruler_labels_keep_their_distance() {
        // 10 px per second: labels every 10 s
        let scale = TimeScale::build(25.0, SCALE, 0.0, "grey");
        let labels: Vec<_> = scale.marks.iter().filter_map(|m| m.label.clone()).collect();
        assert_eq!(labels, vec!["0:00", "0:10", "0:20"]);
        assert_eq!(scale.marks.len(), 13);
        assert_eq!(scale.marks[1].pixel, 20.0);

        let fine = PixelScale {
            samples_per_pixel: 1,
            sample_rate: 1000.0,
        };
        let scale = TimeScale::build(0.25, fine, 0.0, "grey");
        assert_eq!(scale.marks[5].label.as_deref(), Some("0:00.1"));
    }

    #[test]
    fn test_rows_follow_track_state() {
        let mut playlist = playlist(PlaylistConfig {
            controls: crate::state::Controls {
                show: true,
                width: 150,
            },
            ..Default::default()
        });
        let ids: Vec<_> = playlist.tracks().iter().map(Track::id).collect();
        playlist.collapse_track(ids[0], true).unwrap();
        playlist.mute_track(ids[1]).unwrap();
        playlist.set_fade_out(ids[1], 1.0).unwrap();
        playlist.seek(3.0, Some(4.0), Some(ids[1]));

        let tree = RenderTree::build(&playlist);
        assert!(tree.time_scale.is_none());
        assert!(tree.annotations.is_none());
        assert_eq!(tree.width, 100.0);

        let (a, b) = (&tree.tracks[0], &tree.tracks[1]);
        assert!(a.collapsed && a.waveform.channels.is_empty());
        assert_eq!(a.height, 30);
        assert!(!a.active && a.selection.is_none());

        assert_eq!(b.offset, 20.0);
        assert_eq!(b.waveform.width, 50.0);
        assert!(!b.should_play);
        assert!(b.controls.as_ref().is_some_and(|c| c.muted));
        assert_eq!(b.selection, Some(Span { left: 30.0, width: 10.0 }));
        assert_eq!(b.fades[0].span, Span { left: 60.0, width: 10.0 });
        assert_eq!(b.cursor, 30.0);
    }

    #[test]
    fn test_row_reports_drag_in_progress() {
        let mut playlist = playlist(PlaylistConfig::default());
        let id = playlist.tracks()[0].id();
        playlist.set_state(InteractionMode::Shift);

        playlist.handle_pointer(id, PointerEvent::Down(Some(10.0)));
        assert!(RenderTree::build(&playlist).tracks[0].dragging);

        playlist.handle_pointer(id, PointerEvent::Up(Some(10.0)));
        assert!(!RenderTree::build(&playlist).tracks[0].dragging);
    }

    #[test]
    fn test_annotation_layer() {
        let mut config = PlaylistConfig {
            timescale: true,
            ..Default::default()
        };
        config.annotations.annotations = vec![Annotation {
            id: "intro".into(),
            start: 0.5,
            end: 2.0,
            lines: vec!["hello".into()],
            lang: None,
        }];
        let playlist = playlist(config);
        let tree = RenderTree::build(&playlist);

        assert!(tree.time_scale.is_some());
        let layer = tree.annotations.unwrap();
        assert_eq!(layer.items[0].span, Span { left: 5.0, width: 15.0 });
        assert_eq!(layer.items[0].start_label, "00:00:00.500");
        assert!(!layer.items[0].active);

        let json = serde_json::to_value(&RenderTree::build(&playlist)).unwrap();
        assert_eq!(json["tracks"][0]["className"], "channel-wrapper state-cursor");
    }
}
