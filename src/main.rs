use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use glyphdeck::error_codes::{
    envelope_for, exit_code_for, CodedError, ARG_INVALID, FONT_REQUIRED, OUTPUT_UNWRITABLE,
};
use glyphdeck::renderer::Surface;
use glyphdeck::scene::{load_and_validate_scene_with_options, SceneLoadOptions};
use glyphdeck::schema::Scene;
use glyphdeck::stage::{FrameInfo, Stage};
use glyphdeck::surface::{read_verified_font_bytes, PixmapSurface, TextSurface};

const LOG_ENV_VAR: &str = "GLYPHDECK_LOG";

#[derive(Debug, Parser)]
#[command(name = "glyphdeck")]
#[command(about = "Section-snapping presentation stage with a procedural glyph-field backdrop")]
struct Cli {
    /// Print results and errors as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate a scene file.
    Check {
        scene: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Replay a scene and write its frames.
    Render {
        scene: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        #[arg(long, value_enum, default_value_t = FrameFormat::Text)]
        format: FrameFormat,
        #[arg(long)]
        seed: Option<u64>,
        /// Write every Nth frame.
        #[arg(long, default_value_t = 1)]
        every: u64,
    },
    /// Replay a scene's tape and print the section changes it produces.
    Events {
        scene: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FrameFormat {
    Text,
    Png,
}

fn main() {
    init_tracing();
    let cli = parse_cli();
    let json = cli.json;

    if let Err(error) = run(cli) {
        if json {
            match serde_json::to_string(&envelope_for(&error)) {
                Ok(line) => println!("{line}"),
                Err(_) => eprintln!("error: {error:#}"),
            }
        } else {
            eprintln!("error: {error:#}");
        }
        std::process::exit(exit_code_for(&error));
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_cli() -> Cli {
    let version: &'static str = match option_env!("GLYPHDECK_GIT_HASH") {
        Some(hash) => Box::leak(format!("{} ({hash})", env!("CARGO_PKG_VERSION")).into_boxed_str()),
        None => env!("CARGO_PKG_VERSION"),
    };
    let matches = Cli::command().version(version).get_matches();
    Cli::from_arg_matches(&matches).unwrap_or_else(|error| error.exit())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Check { scene, seed } => run_check(&scene, seed, cli.json),
        Commands::Render {
            scene,
            output,
            format,
            seed,
            every,
        } => run_render(&scene, &output, format, seed, every, cli.json),
        Commands::Events { scene, seed } => run_events(&scene, seed, cli.json),
    }
}

fn load_scene(path: &Path, seed: Option<u64>) -> Result<Scene> {
    let options = SceneLoadOptions::from_env(seed);
    load_and_validate_scene_with_options(path, &options)
        .map_err(|error| anyhow::Error::new(CodedError::scene(format!("{error:#}"))))
}

fn run_check(scene_path: &Path, seed: Option<u64>, json: bool) -> Result<()> {
    let scene = load_scene(scene_path, seed)?;

    if json {
        let summary = json!({
            "ok": true,
            "scene": scene_path.display().to_string(),
            "viewport": { "width": scene.viewport.width, "height": scene.viewport.height },
            "fps": scene.fps,
            "frames": scene.total_frames(),
            "seed": scene.seed,
            "sections": scene.sections.iter().map(|s| s.id.as_str()).collect::<Vec<_>>(),
            "tape": scene.tape.len(),
        });
        println!("{summary}");
        return Ok(());
    }

    println!(
        "OK: {} ({}x{}, {} fps, {} frames, seed {})",
        scene_path.display(),
        scene.viewport.width,
        scene.viewport.height,
        scene.fps,
        scene.total_frames(),
        scene.seed
    );
    println!("Sections: {}", scene.sections.len());
    println!("Tape events: {}", scene.tape.len());
    Ok(())
}

fn run_render(
    scene_path: &Path,
    output: &Path,
    format: FrameFormat,
    seed: Option<u64>,
    every: u64,
    json: bool,
) -> Result<()> {
    if every == 0 {
        return Err(CodedError::usage(ARG_INVALID, "--every must be > 0").into());
    }
    let scene = load_scene(scene_path, seed)?;
    fs::create_dir_all(output).map_err(|error| {
        CodedError::usage(
            OUTPUT_UNWRITABLE,
            format!("cannot create {}: {error}", output.display()),
        )
    })?;

    let written = match format {
        FrameFormat::Text => {
            let mut stage = Stage::mount(&scene, Some(TextSurface::new()));
            replay(&mut stage, &scene, every, |info, surface: &TextSurface| {
                let Some(frame) = surface.frame() else {
                    return Ok(());
                };
                let path = output.join(format!("frame_{:05}.txt", info.index));
                fs::write(&path, frame.to_text())
                    .with_context(|| format!("failed to write {}", path.display()))
            })?
        }
        FrameFormat::Png => {
            let font_path = scene.font.as_deref().ok_or_else(|| {
                CodedError::usage(FONT_REQUIRED, "png output needs `font` in the scene")
            })?;
            let font_bytes = read_verified_font_bytes(font_path, scene.font_sha256.as_deref())?;
            let surface = PixmapSurface::open(font_bytes, scene.viewport);
            if surface.is_none() {
                warn!("render: raster surface unavailable, no frames will be painted");
            }
            let mut stage = Stage::mount(&scene, surface);
            replay(&mut stage, &scene, every, |info, surface: &PixmapSurface| {
                surface.save_png(&output.join(format!("frame_{:05}.png", info.index)))
            })?
        }
    };

    if json {
        println!(
            "{}",
            json!({ "ok": true, "frames": written, "output": output.display().to_string() })
        );
    } else {
        println!("Wrote {} frame(s) to {}", written, output.display());
    }
    Ok(())
}

/// Plays the whole scene, handing every `every`th painted frame to `write`.
fn replay<S, F>(stage: &mut Stage<S>, scene: &Scene, every: u64, mut write: F) -> Result<u64>
where
    S: Surface,
    F: FnMut(&FrameInfo, &S) -> Result<()>,
{
    let total_frames = u64::from(scene.total_frames());
    let last_frame_ms = stage.frame_time_ms(total_frames.saturating_sub(1));
    let mut written = 0;

    stage.advance_to(last_frame_ms, |info, renderer| {
        if !info.painted || info.index % every != 0 {
            return Ok(());
        }
        let Some(surface) = renderer.surface() else {
            return Ok(());
        };
        write(info, surface)?;
        written += 1;
        if info.index % u64::from(scene.fps) == 0 {
            info!(
                frame = info.index + 1,
                total = total_frames,
                section = info.active_section.as_deref().unwrap_or("-"),
                "rendered frame"
            );
        }
        Ok(())
    })?;
    stage.teardown();
    Ok(written)
}

fn run_events(scene_path: &Path, seed: Option<u64>, json: bool) -> Result<()> {
    let scene = load_scene(scene_path, seed)?;
    let mut stage: Stage<TextSurface> = Stage::mount(&scene, None);
    stage.advance_to(scene.duration_ms(), |_, _| Ok(()))?;
    let published = stage.published();
    stage.teardown();

    if json {
        let line = serde_json::to_string(&json!({ "ok": true, "events": published }))
            .context("failed to serialize events")?;
        println!("{line}");
        return Ok(());
    }

    for event in &published {
        println!("{:>8} ms  {}  {}", event.at_ms, event.id, event.side.as_str());
    }
    Ok(())
}
