// crates/clipforge-media/src/main.rs
//
// `clipforge` command line: render, inspect and preview project files with
// the in-process FFmpeg backend.
//
//   clipforge render  project.json -o out.mp4 [--quality high] [--width W --height H]
//   clipforge info    project.json
//   clipforge preview project.json --at 12.5 -o frame.png
//
// Logging goes through env_logger; set RUST_LOG=debug for per-stage detail.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use clipforge_core::helpers::time::{format_duration, format_time};
use clipforge_core::preview::preview_frame;
use clipforge_core::{OverlapPolicy, ProjectFile, QualityProfile, Timeline};
use clipforge_media::backend::{self, FfmpegEncoder, FfmpegMedia};
use clipforge_media::snapshot::save_png;
use clipforge_media::{ExportEvent, ExportWorker};

#[derive(Parser, Debug)]
#[command(name = "clipforge")]
#[command(version)]
#[command(about = "Render and inspect clipforge video projects")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export a project to a video file
    Render {
        /// Project file (.json)
        project: PathBuf,

        /// Output file path; the extension picks the container
        #[arg(short, long)]
        output: PathBuf,

        /// Quality profile (low, medium, high, ultra)
        #[arg(short, long, default_value = "high")]
        quality: String,

        /// Output width; requires --height
        #[arg(long, requires = "height")]
        width: Option<u32>,

        /// Output height; requires --width
        #[arg(long, requires = "width")]
        height: Option<u32>,
    },

    /// Print the clips and total duration of a project
    Info {
        /// Project file (.json)
        project: PathBuf,
    },

    /// Save the frame shown at a timeline position as PNG
    Preview {
        /// Project file (.json)
        project: PathBuf,

        /// Timeline position in seconds
        #[arg(long)]
        at: f64,

        /// Destination PNG
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    backend::init().context("FFmpeg init failed")?;

    match Args::parse().command {
        Command::Render { project, output, quality, width, height } => {
            render(project, output, &quality, width.zip(height))
        }
        Command::Info { project }                => info(project),
        Command::Preview { project, at, output } => preview(project, at, output),
    }
}

fn load_timeline(path: &Path) -> Result<(ProjectFile, Timeline)> {
    let project  = ProjectFile::load(path)?;
    let timeline = project.into_timeline(&FfmpegMedia, OverlapPolicy::Allow)?;
    Ok((project, timeline))
}

fn render(project: PathBuf, output: PathBuf, quality: &str, size: Option<(u32, u32)>) -> Result<()> {
    let (_, timeline) = load_timeline(&project)?;

    let mut params = QualityProfile::from_name(quality).params();
    if let Some((w, h)) = size {
        params = params.with_size(w, h);
    }

    let worker = ExportWorker::new(Arc::new(FfmpegMedia), Arc::new(FfmpegEncoder));
    let job_id = worker.start(timeline.export_snapshot(), output, params)?;

    for event in worker.rx.iter() {
        if event.job_id() != job_id { continue; }
        match event {
            ExportEvent::Progress { percent, .. } => {
                eprintln!("  {percent:>3}%");
            }
            ExportEvent::Done { path, .. } => {
                println!("{}", path.display());
                return Ok(());
            }
            ExportEvent::Failed { msg, cancelled, .. } => {
                if cancelled { bail!("export cancelled"); }
                bail!(msg);
            }
        }
    }
    bail!("export worker stopped without a result")
}

fn info(project: PathBuf) -> Result<()> {
    let (file, timeline) = load_timeline(&project)?;

    println!("{}  (format {})", file.metadata.name, file.version);
    println!("created {}  modified {}", file.metadata.created, file.metadata.modified);
    for clip in &timeline {
        let fx = clip.effects();
        println!(
            "  {}  {:<24} {} → {}  [{}]  speed {:.2}  vol {:.2}",
            clip.id(),
            clip.name(),
            format_time(clip.start_time()),
            format_time(clip.end_time()),
            format_duration(clip.duration()),
            fx.speed,
            fx.volume,
        );
    }
    println!("{} clips, total {}", timeline.len(), format_duration(timeline.total_duration()));
    Ok(())
}

fn preview(project: PathBuf, at: f64, output: PathBuf) -> Result<()> {
    let (_, timeline) = load_timeline(&project)?;
    match preview_frame(&timeline, at, &FfmpegMedia)? {
        Some(frame) => save_png(&frame, &output),
        None        => bail!("no clip at {}", format_time(at)),
    }
}
