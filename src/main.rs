use anyhow::{Context, Result};
use clap::Parser;
use posebooth::capture::{CaptureSource, WebcamCapture};
use posebooth::output::{OutputSink, PhotoSink, PngDirectorySink, V4L2Output};
use posebooth::segmentation::{self, Preprocessor, SegmentationModel};
use posebooth::{
    Backdrop, BackgroundSpec, BoothConfig, CaptureEvent, CaptureMode, FrameInput, Pipeline,
    PersonDescriptor, SessionState, TickOutcome,
};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input webcam device index
    #[arg(short, long, default_value_t = 0)]
    input_device: u32,

    /// Output v4l2loopback device path
    #[arg(short, long, default_value = "/dev/video10")]
    output_device: String,

    /// Capture resolution width
    #[arg(long, default_value_t = 1280)]
    capture_width: u32,

    /// Capture resolution height
    #[arg(long, default_value_t = 720)]
    capture_height: u32,

    /// Output (canvas) resolution width
    #[arg(long, default_value_t = 1280)]
    output_width: u32,

    /// Output (canvas) resolution height
    #[arg(long, default_value_t = 720)]
    output_height: u32,

    /// Target frames per second
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    /// Path to segmentation model (ONNX file)
    /// Without it every frame is treated as having no subject
    #[arg(long)]
    model: Option<String>,

    /// Reference pose image to match
    #[arg(long)]
    reference: Option<PathBuf>,

    /// Background: "none", "blur" or an image path
    #[arg(long, default_value = "none")]
    background: BackgroundSpec,

    /// Directory captured photos are written to
    #[arg(long, default_value = "captures")]
    photo_dir: PathBuf,

    /// Wait for Enter after the countdown instead of capturing automatically
    #[arg(long)]
    manual: bool,

    /// Mirror the displayed output (photos are never mirrored)
    #[arg(long)]
    mirror: bool,

    /// Ignore the reference pose; countdowns only start from Enter
    #[arg(long)]
    no_pose_matching: bool,

    /// Show matte visualization (grayscale silhouette) instead of the composite
    #[arg(long)]
    show_matte: bool,
}

/// Operator input read from stdin.
enum Command {
    /// Enter: start a countdown, or take the photo when ready.
    Press,
    Background(BackgroundSpec),
    Quit,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .init();

    tracing::info!("Posebooth starting");
    tracing::info!("Capture: {}x{}", args.capture_width, args.capture_height);
    tracing::info!("Canvas: {}x{}", args.output_width, args.output_height);
    tracing::info!("Target FPS: {}", args.fps);

    let config = BoothConfig {
        canvas_width: args.output_width,
        canvas_height: args.output_height,
        enable_pose_matching: !args.no_pose_matching,
        mirror_output: args.mirror,
        capture_mode: if args.manual {
            CaptureMode::Manual
        } else {
            CaptureMode::Auto
        },
        ..Default::default()
    };
    let pipeline = Pipeline::new(config).context("Invalid booth configuration")?;

    let mut capture = WebcamCapture::new(
        args.input_device,
        args.capture_width,
        args.capture_height,
        args.fps,
    )
    .context("Failed to initialize webcam capture")?;
    let (camera_width, camera_height) = capture.resolution();
    if (camera_width, camera_height) != (args.capture_width, args.capture_height) {
        tracing::warn!(
            "Camera delivers {}x{} instead of {}x{}; frames are rescaled to the canvas",
            camera_width,
            camera_height,
            args.capture_width,
            args.capture_height
        );
    }

    let mut output = V4L2Output::new(&args.output_device, args.output_width, args.output_height)
        .context("Failed to initialize v4l2loopback output")?;
    let (out_width, out_height) = output.resolution();
    tracing::info!("Writing {}x{} frames to {}", out_width, out_height, args.output_device);

    let mut model: Option<Box<dyn SegmentationModel>> = match &args.model {
        Some(model_path) => {
            tracing::info!("Loading segmentation model from {}", model_path);
            let model = segmentation::create_default_model(model_path)
                .context("Failed to load segmentation model")?;
            let (input_width, input_height) = model.input_size();
            tracing::info!(
                "Segmentation model loaded successfully (input {}x{})",
                input_width,
                input_height
            );
            Some(model)
        }
        None => {
            tracing::warn!("No segmentation model; running without subject detection");
            None
        }
    };

    let reference = match (&args.reference, model.as_mut()) {
        (Some(path), Some(model)) => analyze_reference(path, &mut **model, &pipeline)?,
        (Some(_), None) => {
            tracing::warn!("Reference pose needs --model; pose matching disabled");
            None
        }
        (None, _) => None,
    };
    let state = SessionState::new().with_reference(reference);

    let backdrop = resolve_background(&args.background, &pipeline);

    let mut photos =
        PngDirectorySink::new(&args.photo_dir).context("Failed to prepare photo directory")?;

    tracing::info!("Press Enter to start a countdown or take a ready photo");
    tracing::info!("Type 'bg <none|blur|path>' to switch backgrounds, 'q' to quit");
    let commands = spawn_command_reader();

    run_booth(
        &mut capture,
        &mut output,
        model,
        &pipeline,
        state,
        backdrop,
        &mut photos,
        &commands,
        args.fps,
        args.show_matte,
    )?;

    tracing::info!("Posebooth stopped");
    Ok(())
}

/// Segment and analyze the reference pose image.
fn analyze_reference(
    path: &Path,
    model: &mut dyn SegmentationModel,
    pipeline: &Pipeline,
) -> Result<Option<PersonDescriptor>> {
    let image = image::open(path)
        .with_context(|| format!("Failed to open reference image {}", path.display()))?
        .to_rgb8();

    // A still image must not inherit or leave behind video state.
    model.reset_state();
    let matte = model
        .segment(&image)
        .context("Failed to segment reference image")?;
    model.reset_state();

    let descriptor = pipeline.analyze_reference(&matte);
    match &descriptor {
        Some(d) => tracing::info!(
            "Reference pose: aspect={:.2}, center=({:.2}, {:.2}), area={:.2}",
            d.aspect_ratio,
            d.relative_center_x,
            d.relative_center_y,
            d.area_ratio
        ),
        None => tracing::warn!("No person found in reference image {}", path.display()),
    }
    Ok(descriptor)
}

/// Load a background at canvas size, reporting why it fell back to none.
fn resolve_background(spec: &BackgroundSpec, pipeline: &Pipeline) -> Backdrop {
    let (width, height) = pipeline.compositor().canvas_size();
    match Backdrop::load_or_none(spec, width, height) {
        (backdrop, None) => {
            tracing::info!("Background: {}", backdrop.spec());
            backdrop
        }
        (backdrop, Some(err)) => {
            tracing::warn!("Background {} unavailable, drawing without one: {}", spec, err);
            backdrop
        }
    }
}

fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            let command = if line.is_empty() || line == "c" {
                Command::Press
            } else if line == "q" {
                Command::Quit
            } else if let Some(spec) = line.strip_prefix("bg ") {
                match spec.parse() {
                    Ok(spec) => Command::Background(spec),
                    Err(never) => match never {},
                }
            } else {
                tracing::warn!("Unknown command: {}", line);
                continue;
            };
            if tx.send(command).is_err() {
                break;
            }
        }
    });
    rx
}

#[allow(clippy::too_many_arguments)]
fn run_booth<C, O>(
    capture: &mut C,
    output: &mut O,
    mut model: Option<Box<dyn SegmentationModel>>,
    pipeline: &Pipeline,
    mut state: SessionState,
    mut backdrop: Backdrop,
    photos: &mut dyn PhotoSink,
    commands: &Receiver<Command>,
    target_fps: u32,
    show_matte: bool,
) -> Result<()>
where
    C: CaptureSource,
    O: OutputSink,
{
    let frame_duration = Duration::from_secs_f32(1.0 / target_fps.max(1) as f32);
    let mut frame_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_segment_time = Duration::ZERO;
    let mut total_tick_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;
    let mut last_good: Option<image::RgbImage> = None;

    tracing::info!("Starting booth loop");

    loop {
        let loop_start = Instant::now();

        let mut manual_trigger = false;
        let mut capture_requested = false;
        for command in commands.try_iter() {
            match command {
                Command::Press if state.capture.ready_to_capture => capture_requested = true,
                Command::Press => manual_trigger = true,
                Command::Background(spec) => backdrop = resolve_background(&spec, pipeline),
                Command::Quit => return Ok(()),
            }
        }

        let capture_start = Instant::now();
        let frame = capture
            .capture_frame()
            .context("Failed to capture frame")?;
        total_capture_time += capture_start.elapsed();

        let segment_start = Instant::now();
        let matte = model.as_mut().and_then(|model| match model.segment(&frame) {
            Ok(matte) => Some(matte),
            Err(err) => {
                tracing::warn!("Segmentation failed, treating frame as empty: {:#}", err);
                None
            }
        });
        total_segment_time += segment_start.elapsed();

        let tick_start = Instant::now();
        let input = FrameInput {
            frame: &frame,
            matte: matte.as_ref(),
            manual_trigger,
            capture_requested,
        };
        let outcome = pipeline.process_contained(state, input, &backdrop, last_good.as_ref());
        total_tick_time += tick_start.elapsed();

        let display = match outcome {
            TickOutcome::Completed(next, tick) => {
                state = next;

                for event in &tick.events {
                    match event {
                        CaptureEvent::CountdownStarted { remaining, mode } => {
                            tracing::info!("Countdown started at {} ({:?})", remaining, mode)
                        }
                        CaptureEvent::ReadyToCapture => {
                            tracing::info!("Ready! Press Enter to take the photo")
                        }
                        other => tracing::debug!("Capture event: {:?}", other),
                    }
                }

                if let Some(photo) = &tick.captured {
                    if let Err(err) = photos.save_photo(photo) {
                        tracing::warn!("Failed to save photo: {}", err);
                    }
                }

                if frame_count % 30 == 0 {
                    tracing::info!(
                        "Distance {:.1}m ({}), similarity {:.0}%, state {:?}{}",
                        tick.distance.smoothed_m,
                        if tick.distance.in_range { "in range" } else { "too far" },
                        tick.similarity * 100.0,
                        tick.capture.state,
                        if tick.ready_to_capture() { ", ready" } else { "" }
                    );
                }

                let display = match (&matte, show_matte) {
                    (Some(matte), true) => Preprocessor::matte_to_rgb(matte),
                    _ => tick.composite,
                };
                last_good = Some(display.clone());
                display
            }
            TickOutcome::Recovered {
                state: previous,
                display,
            } => {
                state = previous;
                display
            }
        };

        let output_start = Instant::now();
        output
            .write_frame(&display)
            .context("Failed to write frame")?;
        total_output_time += output_start.elapsed();

        frame_count += 1;

        if frame_count % 30 == 0 {
            let per_frame = |total: Duration| total.as_secs_f64() * 1000.0 / frame_count as f64;
            let capture_ms = per_frame(total_capture_time);
            let segment_ms = per_frame(total_segment_time);
            let tick_ms = per_frame(total_tick_time);
            let output_ms = per_frame(total_output_time);
            let total_ms = capture_ms + segment_ms + tick_ms + output_ms;

            tracing::info!(
                "Frame {}: capture={:.1}ms, segment={:.1}ms, tick={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
                frame_count,
                capture_ms,
                segment_ms,
                tick_ms,
                output_ms,
                total_ms,
                1000.0 / total_ms
            );
        }

        let elapsed = loop_start.elapsed();
        if elapsed < frame_duration {
            std::thread::sleep(frame_duration - elapsed);
        }
    }
}
