// src/main.rs
//
// Offline mixdown of WAV files.
//
//     waveline-mixdown out.wav drums.wav bass.wav@2.5
//
// Each input may carry `@seconds` to place it on the timeline.

use std::process::ExitCode;
use std::time::Duration;

use log::{error, info};

use waveline::{
    AudioContext, Notification, PlaylistConfig, RenderFormat, RenderOutput, TrackSpec, WavLoader,
    create_playlist,
};

const RENDER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
enum MixdownError {
    #[error("usage: waveline-mixdown <out.wav> <in.wav[@seconds]>...")]
    Usage,

    #[error("bad start time in '{0}'")]
    BadStart(String),

    #[error(transparent)]
    Command(#[from] waveline::CommandError),

    #[error("render failed: {0}")]
    Render(String),

    #[error("render did not finish in time")]
    Timeout,

    #[error("cannot write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

fn parse_input(arg: &str) -> Result<TrackSpec, MixdownError> {
    match arg.rsplit_once('@') {
        Some((path, start)) => {
            let start: f64 = start
                .parse()
                .map_err(|_| MixdownError::BadStart(arg.to_string()))?;
            Ok(TrackSpec::url(path).starting_at(start))
        }
        None => Ok(TrackSpec::url(arg)),
    }
}

fn run(args: &[String]) -> Result<(), MixdownError> {
    let (out_path, inputs) = args.split_first().ok_or(MixdownError::Usage)?;
    if inputs.is_empty() {
        return Err(MixdownError::Usage);
    }
    let specs = inputs
        .iter()
        .map(|a| parse_input(a))
        .collect::<Result<Vec<_>, _>>()?;

    // --------------------------------
    // Playlist
    // --------------------------------
    let config = PlaylistConfig::default();
    let (context, _clock) = AudioContext::realtime(config.sample_rate);
    let (mut playlist, events) = create_playlist(config, context, Box::new(WavLoader::new()))
        .map_err(waveline::CommandError::from)?;

    let ids = playlist.load(specs).map_err(waveline::CommandError::from)?;
    info!("loaded {} tracks, {:.2}s", ids.len(), playlist.duration());

    // --------------------------------
    // Render
    // --------------------------------
    playlist
        .start_offline_render(RenderFormat::Wav)
        .map_err(waveline::CommandError::from)?;
    if !playlist.wait_for_workers(RENDER_TIMEOUT) {
        return Err(MixdownError::Timeout);
    }

    for event in events.try_iter() {
        match event {
            Notification::AudioRenderingFinished {
                output: RenderOutput::Encoded { bytes, .. },
                ..
            } => {
                std::fs::write(out_path, &bytes).map_err(|source| MixdownError::Write {
                    path: out_path.clone(),
                    source,
                })?;
                info!("wrote {} ({} bytes)", out_path, bytes.len());
                return Ok(());
            }
            Notification::AudioRenderingFailed { message } => {
                return Err(MixdownError::Render(message));
            }
            _ => {}
        }
    }
    Err(MixdownError::Timeout)
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
