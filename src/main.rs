use anyhow::{bail, Context, Result};
use backdrop::capture::{self, CaptureSource, ImageSequence, Mirrored};
use backdrop::output::{ImageFileOutput, OutputSink};
use backdrop::params::{ParameterSource, ParamsFile};
use backdrop::{BinarizePolicy, CompositingParameters, Session};
use clap::{Parser, ValueEnum};
use image::DynamicImage;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replacement background image
    #[arg(short = 'b', long)]
    virtual_background: PathBuf,

    /// Photo of the empty scene; the first live frame is used when omitted
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Live frames: an image file or a directory of frames
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Webcam device index to capture from instead of --input
    #[cfg(feature = "webcam")]
    #[arg(short, long, conflicts_with = "input")]
    device: Option<u32>,

    /// Output image path; `{frame}` is replaced by the frame number
    #[arg(short, long)]
    output: Option<String>,

    /// v4l2loopback device to stream composites to
    #[cfg(feature = "webcam")]
    #[arg(long)]
    loopback: Option<String>,

    /// Mean channel difference above which a pixel is foreground
    #[arg(short, long, default_value_t = backdrop::compositor::types::DEFAULT_THRESHOLD)]
    threshold: u32,

    /// Opening element size (speck removal)
    #[arg(long, default_value_t = backdrop::compositor::types::DEFAULT_OPENING_SIZE)]
    opening_size: u32,

    /// Closing element size (hole filling)
    #[arg(long, default_value_t = backdrop::compositor::types::DEFAULT_CLOSING_SIZE)]
    closing_size: u32,

    /// JSON file with threshold/opening_size/closing_size, re-read while running
    #[arg(long)]
    params_file: Option<PathBuf>,

    /// How channel differences are reduced to a foreground decision
    #[arg(long, value_enum, default_value_t = PolicyArg::MeanThenThreshold)]
    policy: PolicyArg,

    /// Flip live frames horizontally
    #[arg(long)]
    mirror: bool,

    /// Target frames per second, 0 for unthrottled
    #[arg(long, default_value_t = 30)]
    fps: u32,

    /// Stop after this many frames
    #[arg(long)]
    max_frames: Option<u64>,

    /// Output the cleaned foreground mask instead of the composite
    #[arg(long)]
    show_mask: bool,

    /// Write 4-channel (RGBA) image files
    #[arg(long)]
    rgba: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PolicyArg {
    MeanThenThreshold,
    ThresholdThenMean,
}

impl From<PolicyArg> for BinarizePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::MeanThenThreshold => BinarizePolicy::MeanThenThreshold,
            PolicyArg::ThresholdThenMean => BinarizePolicy::ThresholdThenMean,
        }
    }
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

    tracing::info!("Backdrop starting");

    let mut source = open_source(&args)?;
    tracing::info!(
        "Source resolution: {}x{}",
        source.resolution().0,
        source.resolution().1
    );

    let mut session = Session::new().with_policy(args.policy.into());

    let virtual_background = capture::load_image(&args.virtual_background)
        .context("Failed to load virtual background")?;
    session.set_virtual_background(virtual_background)?;

    let reference = match &args.reference {
        Some(path) => capture::load_image(path).context("Failed to load reference background")?,
        None => {
            tracing::info!("Capturing reference background from the first frame");
            let frame = source
                .capture_frame()
                .context("Failed to capture reference background")?
                .context("Source ended before a reference background was captured")?;
            DynamicImage::ImageRgb8(frame)
        }
    };
    session
        .capture_reference(reference)
        .context("Failed to set up compositor")?;

    let mut sinks = open_sinks(&args, &session)?;

    let initial = CompositingParameters::new(args.threshold, args.opening_size, args.closing_size);
    let mut params: Box<dyn ParameterSource> = match &args.params_file {
        Some(path) => Box::new(ParamsFile::new(path, initial)),
        None => Box::new(initial),
    };

    run_pipeline(
        &session,
        &mut source,
        &mut sinks,
        params.as_mut(),
        PipelineOptions {
            target_fps: args.fps,
            max_frames: args.max_frames,
            show_mask: args.show_mask,
        },
    )
}

fn open_source(args: &Args) -> Result<Box<dyn CaptureSource>> {
    let source: Box<dyn CaptureSource> = if let Some(input) = &args.input {
        Box::new(ImageSequence::open(input).context("Failed to open input frames")?)
    } else {
        open_device(args)?
    };

    Ok(if args.mirror {
        Box::new(Mirrored::new(source))
    } else {
        source
    })
}

#[cfg(feature = "webcam")]
fn open_device(args: &Args) -> Result<Box<dyn CaptureSource>> {
    let Some(device) = args.device else {
        bail!("Either --input or --device is required");
    };
    let capture = capture::WebcamCapture::new(device)
        .context("Failed to initialize webcam capture")?;
    Ok(Box::new(capture))
}

#[cfg(not(feature = "webcam"))]
fn open_device(_args: &Args) -> Result<Box<dyn CaptureSource>> {
    bail!("--input is required (webcam capture needs the `webcam` feature)")
}

fn open_sinks(args: &Args, session: &Session) -> Result<Vec<Box<dyn OutputSink>>> {
    let mut sinks: Vec<Box<dyn OutputSink>> = Vec::new();

    if let Some(pattern) = &args.output {
        sinks.push(Box::new(ImageFileOutput::new(pattern.as_str()).with_alpha(args.rgba)));
    }

    #[cfg(feature = "webcam")]
    if let Some(device) = &args.loopback {
        let (width, height) = session
            .compositor()
            .map(|compositor| compositor.dimensions())
            .context("Compositor is not ready")?;
        let loopback = backdrop::output::V4L2Output::new(device, width, height)
            .context("Failed to initialize v4l2loopback output")?;
        sinks.push(Box::new(loopback));
    }
    #[cfg(not(feature = "webcam"))]
    let _ = session;

    if sinks.is_empty() {
        bail!("No output configured; pass --output");
    }
    Ok(sinks)
}

struct PipelineOptions {
    target_fps: u32,
    max_frames: Option<u64>,
    show_mask: bool,
}

fn run_pipeline<C>(
    session: &Session,
    capture: &mut C,
    sinks: &mut [Box<dyn OutputSink>],
    params: &mut dyn ParameterSource,
    options: PipelineOptions,
) -> Result<()>
where
    C: CaptureSource + ?Sized,
{
    let compositor = session.compositor().context("Compositor is not ready")?;

    let frame_duration = (options.target_fps > 0)
        .then(|| Duration::from_secs_f32(1.0 / options.target_fps as f32));
    let mut frame_count = 0u64;
    let mut total_capture_time = Duration::ZERO;
    let mut total_composite_time = Duration::ZERO;
    let mut total_output_time = Duration::ZERO;

    tracing::info!("Starting main pipeline loop, show_mask={}", options.show_mask);

    loop {
        if options.max_frames.is_some_and(|max| frame_count >= max) {
            tracing::info!("Reached frame limit");
            break;
        }

        let loop_start = Instant::now();

        let capture_start = Instant::now();
        let Some(frame) = capture.capture_frame().context("Failed to capture frame")? else {
            tracing::info!("Source exhausted");
            break;
        };
        total_capture_time += capture_start.elapsed();

        // Parameters are re-read every frame so they can change mid-stream
        let current = params.current();

        let composite_start = Instant::now();
        let output_frame = if options.show_mask {
            compositor
                .foreground_mask(&frame, &current)
                .context("Failed to compute foreground mask")?
                .to_luma_rgb()
        } else {
            compositor
                .composite(&frame, &current)
                .context("Failed to composite frame")?
        };
        total_composite_time += composite_start.elapsed();

        let output_start = Instant::now();
        for sink in sinks.iter_mut() {
            sink.write_frame(&output_frame)
                .context("Failed to write frame")?;
        }
        total_output_time += output_start.elapsed();

        frame_count += 1;

        if frame_count % 30 == 0 {
            log_stats(
                frame_count,
                total_capture_time,
                total_composite_time,
                total_output_time,
            );
        }

        if let Some(frame_duration) = frame_duration {
            let elapsed = loop_start.elapsed();
            if elapsed < frame_duration {
                std::thread::sleep(frame_duration - elapsed);
            }
        }
    }

    tracing::info!("Processed {} frame(s)", frame_count);
    if frame_count > 0 {
        log_stats(
            frame_count,
            total_capture_time,
            total_composite_time,
            total_output_time,
        );
    }
    Ok(())
}

fn log_stats(frame_count: u64, capture: Duration, composite: Duration, output: Duration) {
    let avg_capture_ms = capture.as_secs_f64() * 1000.0 / frame_count as f64;
    let avg_composite_ms = composite.as_secs_f64() * 1000.0 / frame_count as f64;
    let avg_output_ms = output.as_secs_f64() * 1000.0 / frame_count as f64;
    let total_ms = avg_capture_ms + avg_composite_ms + avg_output_ms;
    let actual_fps = if total_ms > 0.0 { 1000.0 / total_ms } else { 0.0 };

    tracing::info!(
        "Frame {}: capture={:.1}ms, composite={:.1}ms, output={:.1}ms, total={:.1}ms, fps={:.1}",
        frame_count,
        avg_capture_ms,
        avg_composite_ms,
        avg_output_ms,
        total_ms,
        actual_fps
    );
}
