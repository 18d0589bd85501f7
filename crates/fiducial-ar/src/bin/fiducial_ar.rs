//! fiducial-ar CLI: calibrate a camera from a board capture, then overlay
//! marker poses on a frame stream.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fiducial_ar::{
    spawn_stdin_listener, CalibrationAccumulator, CalibrationSession, CalibrationStore,
    DirectorySink, FrameSink, ImageSequence, NullSink, PacingPolicy, PoseSession, RenderMode,
    SessionConfig, SessionError,
};
use fiducial_ar_charuco::NativeToolkit;
use log::LevelFilter;

#[derive(Parser)]
#[command(name = "fiducial-ar")]
#[command(about = "ChArUco camera calibration and live marker pose overlay")]
#[command(version)]
struct Cli {
    /// Log verbosity.
    #[arg(long, value_enum, default_value_t = LogLevel::Info, global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture board views from an image sequence and solve the intrinsics.
    Calibrate(CalibrateArgs),
    /// Draw an axis frame or a cube on every detected marker.
    Pose(PoseArgs),
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Session config (JSON). Defaults are used if omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with `<NAME>_CODES.json` dictionary files.
    #[arg(long)]
    dictionaries: Option<PathBuf>,

    /// Write presented frames as PNG files into this directory.
    #[arg(long)]
    display_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Image file or directory of frames.
    #[arg(long)]
    video: PathBuf,

    /// Number of valid captures to collect (and require).
    #[arg(long)]
    captures: usize,

    /// Where to write the calibration (JSON).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Do not wait for Enter after each accepted capture.
    #[arg(long)]
    no_confirm: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Clone, Args)]
struct PoseArgs {
    /// Overlay drawn on each marker.
    #[arg(value_enum, default_value_t = ModeArg::Axis)]
    mode: ModeArg,

    /// Image file or directory of frames.
    #[arg(long)]
    frames: PathBuf,

    /// Calibration produced by `calibrate`.
    #[arg(long)]
    calibration: Option<PathBuf>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    Axis,
    Cube,
}

impl From<ModeArg> for RenderMode {
    fn from(m: ModeArg) -> Self {
        match m {
            ModeArg::Axis => RenderMode::Axis,
            ModeArg::Cube => RenderMode::Cube,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    let res = match cli.command {
        Commands::Calibrate(args) => run_calibrate(args),
        Commands::Pose(args) => run_pose(args),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            if let SessionError::Calibration(c) = &err {
                eprintln!("{}", c.guidance());
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "tracing")]
fn init_logging(level: LogLevel) {
    fiducial_ar::core::init_tracing(false, level.into());
}

#[cfg(not(feature = "tracing"))]
fn init_logging(level: LogLevel) {
    if let Err(err) = fiducial_ar::core::init_with_level(level.into()) {
        eprintln!("logger unavailable: {err}");
    }
}

fn load_config(common: &CommonArgs) -> Result<SessionConfig, SessionError> {
    let mut cfg = match &common.config {
        Some(path) => SessionConfig::load_json(path)?,
        None => SessionConfig::default(),
    };
    if let Some(dir) = &common.dictionaries {
        cfg.dictionary_dir = dir.clone();
    }
    Ok(cfg)
}

fn make_sink(common: &CommonArgs, prefix: &str) -> Result<Box<dyn FrameSink>, SessionError> {
    Ok(match &common.display_dir {
        Some(dir) => Box::new(DirectorySink::create(dir, prefix)?),
        None => Box::new(NullSink),
    })
}

fn run_calibrate(args: CalibrateArgs) -> Result<(), SessionError> {
    let mut cfg = load_config(&args.common)?;
    if let Some(out) = &args.output {
        cfg.calibration_path = out.clone();
    }

    let board = cfg.calibration_board()?;
    let toolkit = NativeToolkit::load(
        &cfg.dictionary_dir,
        &[board.dictionary()],
        cfg.detector.clone(),
    )?;
    let mut source = ImageSequence::open(&args.video)?;
    let mut sink = make_sink(&args.common, "capture")?;
    let mut pacing = if args.no_confirm {
        PacingPolicy::AutoContinue
    } else {
        eprintln!("After each capture: Enter to continue, q + Enter to stop capturing.");
        PacingPolicy::blocking(spawn_stdin_listener())
    };

    let accumulator = CalibrationAccumulator::new(board, cfg.min_corners);
    let store = CalibrationStore::new(&cfg.calibration_path);
    let mut session = CalibrationSession::new(accumulator, store, args.captures)
        .with_display_max_side(cfg.display_max_side);

    let res = session.run(&toolkit, &mut source, &mut sink, &mut pacing);
    println!("{} valid captures", session.stats().accepted);
    let result = res?;

    println!("Camera intrinsic parameters matrix:");
    for row in result.camera_matrix {
        println!("  [{:12.4} {:12.4} {:12.4}]", row[0], row[1], row[2]);
    }
    println!("Camera distortion coefficients:");
    println!("  {:?}", result.distortion_coefficients);
    println!("Reprojection RMS: {:.4} px", result.rms_reprojection_error);
    println!(
        "Calibration successful. Calibration file created: {}",
        cfg.calibration_path.display()
    );
    Ok(())
}

fn run_pose(args: PoseArgs) -> Result<(), SessionError> {
    let mut cfg = load_config(&args.common)?;
    if let Some(path) = &args.calibration {
        cfg.calibration_path = path.clone();
    }

    let store = CalibrationStore::new(&cfg.calibration_path);
    let board = cfg.pose_board()?;
    let dictionary = board.dictionary();
    let mut session = PoseSession::open(
        &store,
        board,
        args.mode.into(),
        cfg.marker_length,
        cfg.axis_length,
    )?;

    let toolkit =
        NativeToolkit::load(&cfg.dictionary_dir, &[dictionary], cfg.detector.clone())?;
    let mut source = ImageSequence::open(&args.frames)?;
    let mut sink = make_sink(&args.common, "pose")?;
    let mut pacing = PacingPolicy::polling(
        spawn_stdin_listener(),
        Duration::from_millis(cfg.poll_timeout_ms),
    );

    let stop = session.run(&toolkit, &mut source, &mut sink, &mut pacing);
    log::info!(
        "pose session ended ({stop:?}) after {} frames",
        session.frames_processed()
    );
    Ok(())
}
