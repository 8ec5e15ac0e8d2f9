//! Run synthetic participants through the mixer.
//!
//! Every participant contributes a solid colour on its own producer thread and
//! receives its personalized composite on a mixer thread. The report lists
//! what each participant's loop delivered.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use vidmix_common::config::VidmixConfig;
use vidmix_frame::{PixelFormat, Rgb, Size, VideoFrame};
use vidmix_mixer::{Mixer, Source};

const PALETTE: [Rgb; 6] = [
    Rgb::new(220, 50, 47),
    Rgb::new(38, 139, 210),
    Rgb::new(133, 153, 0),
    Rgb::new(181, 137, 0),
    Rgb::new(211, 54, 130),
    Rgb::new(42, 161, 152),
];

/// Settings for one simulation run.
pub struct SimulateOptions {
    pub participants: u32,
    /// Frame rates, assigned to participants round-robin.
    pub fps: Vec<u32>,
    pub width: u32,
    pub height: u32,
    pub duration_secs: f64,
    pub format: Option<String>,
    pub selfview: bool,
    pub content: bool,
    pub content_hide: bool,
    pub focus: Option<u32>,
    pub focus_full: bool,
}

#[derive(Default)]
struct Tally {
    frames: AtomicU64,
    last_ts: AtomicU64,
}

struct Participant {
    source: Arc<Source>,
    tally: Arc<Tally>,
    color: Rgb,
    fps: u32,
}

#[derive(Serialize)]
struct SourceReport {
    pidx: u32,
    content: bool,
    fps: u32,
    frames: u64,
    idle_deadlines: u64,
    effective_fps: f64,
    last_timestamp_usec: u64,
}

pub async fn run(
    config: &VidmixConfig,
    options: SimulateOptions,
    json: bool,
) -> anyhow::Result<()> {
    if options.participants == 0 {
        anyhow::bail!("At least one participant is required");
    }
    if options.fps.is_empty() || options.fps.contains(&0) {
        anyhow::bail!("Frame rates must be positive");
    }
    let duration = run_duration(options.duration_secs)?;

    let mixer = Mixer::with_config(&config.mixer);
    if let Some(name) = &options.format {
        let format: PixelFormat = name.parse()?;
        mixer.set_format(format);
    }

    let size = Size::new(options.width, options.height);

    println!("Simulating {} participant(s)", options.participants);
    println!("  Output: {size} {} @ {:?}fps", mixer.format(), options.fps);
    println!("  Selfview: {}", options.selfview);
    println!("  Content: {}", options.content);
    if let Some(target) = options.focus {
        println!("  Focus: {target} (full: {})", options.focus_full);
    }
    println!();

    let mut participants = Vec::new();
    for i in 0..options.participants {
        let color = PALETTE[i as usize % PALETTE.len()];
        let fps = options.fps[i as usize % options.fps.len()];
        participants.push(allocate(&mixer, Some(size), fps, false, color)?);
    }
    if options.content {
        participants.push(allocate(&mixer, None, options.fps[0], true, Rgb::WHITE)?);
    }

    for p in &participants {
        p.source.enable(true);
        if options.selfview {
            p.source.toggle_selfview();
        }
        p.source.set_content_hide(options.content_hide);
    }

    // Focus needs the target enabled, so it is set after everyone joined
    if let Some(target) = options.focus {
        for p in participants.iter().filter(|p| !p.source.is_content()) {
            p.source.set_focus_idx(target);
            if options.focus_full {
                p.source.set_focus_idx(target);
            }
        }
    }

    let done = Arc::new(AtomicBool::new(false));
    let producers: Vec<_> = participants
        .iter()
        .map(|p| {
            let frame = VideoFrame::filled(mixer.format(), size, p.color)?;
            spawn_producer(Arc::clone(&p.source), frame, p.fps, Arc::clone(&done))
        })
        .collect::<anyhow::Result<_>>()?;

    for p in &participants {
        p.source.start()?;
    }

    let started = Instant::now();
    println!("Running for {:.1}s, press Ctrl+C to stop early...", options.duration_secs);

    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            println!();
            println!("Interrupted");
        }
    }

    for p in &participants {
        p.source.stop();
    }
    done.store(true, Ordering::Relaxed);
    for producer in producers {
        if producer.join().is_err() {
            tracing::warn!("Producer thread panicked");
        }
    }
    let elapsed = started.elapsed().as_secs_f64();

    let reports: Vec<SourceReport> = participants
        .iter()
        .map(|p| {
            let stats = p.source.stats();
            SourceReport {
                pidx: p.source.pidx(),
                content: p.source.is_content(),
                fps: p.fps,
                frames: p.tally.frames.load(Ordering::Relaxed),
                idle_deadlines: stats.idle_deadlines,
                effective_fps: stats.frames_delivered as f64 / elapsed,
                last_timestamp_usec: p.tally.last_ts.load(Ordering::Relaxed),
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        println!();
        println!(
            "{:>5}  {:<7}  {:>6}  {:>8}  {:>6}  {:>8}",
            "pidx", "kind", "target", "frames", "idle", "fps"
        );
        for r in &reports {
            println!(
                "{:>5}  {:<7}  {:>6}  {:>8}  {:>6}  {:>8.1}",
                r.pidx,
                if r.content { "content" } else { "camera" },
                r.fps,
                r.frames,
                r.idle_deadlines,
                r.effective_fps
            );
        }
    }

    tracing::info!(
        participants = reports.len(),
        elapsed_secs = elapsed,
        "Simulation finished"
    );

    Ok(())
}

fn allocate(
    mixer: &Mixer,
    size: Option<Size>,
    fps: u32,
    content: bool,
    color: Rgb,
) -> anyhow::Result<Participant> {
    let tally = Arc::new(Tally::default());
    let sink = Arc::clone(&tally);

    let source = mixer.allocate_source(size, fps, content, move |ts, _frame| {
        sink.frames.fetch_add(1, Ordering::Relaxed);
        sink.last_ts.store(ts, Ordering::Relaxed);
    })?;

    Ok(Participant {
        source: Arc::new(source),
        tally,
        color,
        fps,
    })
}

/// Validate the requested run time.
fn run_duration(secs: f64) -> anyhow::Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(duration) if !duration.is_zero() => Ok(duration),
        _ => anyhow::bail!("Duration must be a positive number of seconds, got {secs}"),
    }
}

/// Time between two frames of a producer at `fps`.
fn producer_period(fps: u32) -> Duration {
    (Duration::from_secs(1) / fps.max(1)).max(Duration::from_millis(1))
}

/// Feed `frame` into `source` at `fps` until `done` is set.
///
/// `put` copies under the registry lock, so producers run on plain threads
/// rather than on the async runtime.
fn spawn_producer(
    source: Arc<Source>,
    frame: VideoFrame,
    fps: u32,
    done: Arc<AtomicBool>,
) -> anyhow::Result<JoinHandle<()>> {
    let period = producer_period(fps);
    let handle = thread::Builder::new()
        .name(format!("vidmix-producer-{}", source.pidx()))
        .spawn(move || {
            while !done.load(Ordering::Relaxed) {
                source.put(&frame);
                thread::sleep(period);
            }
        })?;
    Ok(handle)
}
