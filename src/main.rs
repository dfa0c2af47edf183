use dualsub::config::{PlayerConfig, WindowArgs, DEFAULT_DATA_FILE};
use dualsub::controller::{Phase, SessionController, Tick};
use dualsub::engine::{ClockEngine, PlaybackEngine};
use dualsub::extract::{self, MediaInfo};
use dualsub::parser::load_track;
use dualsub::session::{self, SessionStore};
use dualsub::timefmt::{self, clock};
use dualsub::window::{next_entry, select_window, PanelUpdate, Side, WindowSpan};

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use clap::{Parser as ClapParser, Subcommand};
use log::{error, info, warn};

fn main() {
    match run() {
        Ok(()) => (),
        Err(err) => {
            eprintln!("An error occurred: {}", err);
            for cause in err.chain().skip(1) {
                eprintln!("    {}", cause);
            }
            std::process::exit(1);
        }
    }
}

#[derive(ClapParser)]
#[command(about = "Extract subtitle streams and follow two subtitle tracks alongside playback")]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "DUALSUB_DATA_FILE",
        default_value = DEFAULT_DATA_FILE,
        help = "The file in which playback state is kept for every video."
    )]
    data_file: PathBuf,
    #[arg(
        long,
        global = true,
        value_name = "FILE",
        env = "DUALSUB_LOG_FILE",
        help = "Append log output to the specified file instead of standard error."
    )]
    log_file: Option<PathBuf>,
    #[arg(short, long, global = true, help = "Log debug output.")]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write every subtitle stream of a video to its own SRT file.
    Extract {
        #[arg(value_name = "VIDEO")]
        video: PathBuf,
        #[arg(long, help = "Replace SRT files that already exist.")]
        overwrite: bool,
    },
    /// Show the caption active at a given time, with its neighbours.
    Window {
        #[arg(value_name = "SRT")]
        subtitles: PathBuf,
        #[arg(long, value_name = "TIME", value_parser = timefmt::parse_instant)]
        at: Duration,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Show the first caption starting after a given time.
    Next {
        #[arg(value_name = "SRT")]
        subtitles: PathBuf,
        #[arg(long, value_name = "TIME", value_parser = timefmt::parse_instant)]
        at: Duration,
    },
    /// Follow two subtitle tracks against a clock, resuming where the video was left.
    Play {
        #[arg(value_name = "MEDIA")]
        media: PathBuf,
        #[arg(long, value_name = "SRT", help = "Subtitles for the left panel.")]
        left: Option<PathBuf>,
        #[arg(long, value_name = "SRT", help = "Subtitles for the right panel.")]
        right: Option<PathBuf>,
        #[arg(
            long,
            value_name = "TIME",
            value_parser = timefmt::parse_instant,
            help = "Media length. If not supplied, it is read with ffprobe."
        )]
        duration: Option<Duration>,
        #[arg(
            long,
            value_name = "TIME",
            value_parser = timefmt::parse_instant,
            help = "Stop and save the session after this much wall-clock time."
        )]
        run_for: Option<Duration>,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Inspect persisted playback state.
    Sessions {
        #[command(subcommand)]
        action: SessionsCommand,
    },
}

#[derive(Subcommand)]
enum SessionsCommand {
    /// List every video with saved state.
    List,
    /// Print the saved state of one video.
    Show {
        #[arg(value_name = "MEDIA")]
        media: PathBuf,
    },
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("Failed to open log file: '{}'", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;

    match &cli.command {
        Command::Extract { video, overwrite } => run_extract(video, *overwrite),
        Command::Window {
            subtitles,
            at,
            window,
        } => run_window(subtitles, *at, window.into()),
        Command::Next { subtitles, at } => run_next(subtitles, *at),
        Command::Play {
            media,
            left,
            right,
            duration,
            run_for,
            window,
        } => {
            let opts = PlayOpts {
                left: left.as_deref(),
                right: right.as_deref(),
                duration: *duration,
                run_for: *run_for,
                span: window.into(),
            };
            run_play(&cli.data_file, media, opts)
        }
        Command::Sessions { action } => run_sessions(&cli.data_file, action),
    }
}

fn run_extract(video: &Path, overwrite: bool) -> Result<()> {
    extract::check_ffmpeg().context("Please install FFmpeg and ensure it's accessible from the command line")?;
    if !video.exists() {
        return Err(anyhow!("File '{}' not found.", video.display()));
    }

    let report = extract::extract_subtitles(video, overwrite)
        .context(format!("Failed to extract subtitles from '{}'", video.display()))?;
    for path in &report.written {
        println!("{}", path.display());
    }
    if !report.failed.is_empty() {
        warn!(
            "{} of {} subtitle stream(s) could not be extracted",
            report.failed.len(),
            report.failed.len() + report.written.len()
        );
    }
    Ok(())
}

fn run_window(subtitles: &Path, at: Duration, span: WindowSpan) -> Result<()> {
    let track = load_track(subtitles)
        .context(format!("Failed to load subtitles: '{}'", subtitles.display()))?;

    match select_window(&track, at, span) {
        Some(window) => {
            for e in window.before {
                println!("  {}  {}\n", clock(e.start), e.text.replace('\n', "\n  "));
            }
            println!("> {}  {}\n", clock(window.current.start), window.current.text.replace('\n', "\n> "));
            for e in window.after {
                println!("  {}  {}\n", clock(e.start), e.text.replace('\n', "\n  "));
            }
        }
        None => println!("No subtitle at {}", clock(at)),
    }
    Ok(())
}

fn run_next(subtitles: &Path, at: Duration) -> Result<()> {
    let track = load_track(subtitles)
        .context(format!("Failed to load subtitles: '{}'", subtitles.display()))?;

    match next_entry(&track, at) {
        Some(entry) => println!(
            "{} {:.3}\n{}",
            entry.sequence_hint,
            entry.start_secs(),
            entry.text
        ),
        None => println!("No subtitle after {}", clock(at)),
    }
    Ok(())
}

struct PlayOpts<'a> {
    left: Option<&'a Path>,
    right: Option<&'a Path>,
    duration: Option<Duration>,
    run_for: Option<Duration>,
    span: WindowSpan,
}

fn run_play(data_file: &Path, media: &Path, opts: PlayOpts) -> Result<()> {
    let info = match opts.duration {
        Some(duration) => MediaInfo {
            duration: Some(duration),
            ..Default::default()
        },
        None => extract::probe_media(media)
            .context("Failed to probe media; pass --duration to play without ffprobe")?,
    };
    let length = info
        .duration
        .ok_or_else(|| anyhow!("No length known for '{}'", media.display()))?;

    let engine = ClockEngine::new(length, info.audio, info.subtitles);
    let store = SessionStore::load(data_file);
    let config = PlayerConfig::default().with_span(opts.span);
    let mut controller = SessionController::new(engine, store, config);

    controller
        .open(media)
        .context(format!("Failed to load video: '{}'", media.display()))?;

    for (side, path) in [(Side::Left, opts.left), (Side::Right, opts.right)] {
        if let Some(path) = path {
            if let Err(err) = controller.load_subtitles(side, path) {
                error!("Failed to load {} subtitles: {}", side.label(), err);
            }
        }
    }
    print_panels(&controller)?;

    let start = Instant::now();
    let stop_at = opts.run_for.map(|d| start + d);
    let mut sched = controller.schedule(start);
    let stdout = io::stdout();

    loop {
        print_notices(&mut controller);

        let now = Instant::now();
        if stop_at.is_some_and(|t| now >= t) {
            info!("Run time elapsed");
            break;
        }
        if controller.phase() == Phase::Ready && !controller.engine().is_playing() {
            info!("End of media");
            break;
        }

        for tick in sched.due(now) {
            match tick {
                Tick::LengthPoll => {
                    if controller.poll_length() || controller.phase() != Phase::AwaitingLength {
                        sched.cancel(Tick::LengthPoll);
                    }
                }
                Tick::Subtitles => {
                    if let Some(refresh) = controller.refresh_subtitles() {
                        let changed = |u: PanelUpdate| matches!(u, PanelUpdate::Changed(_));
                        if changed(refresh.left) || changed(refresh.right) {
                            print_panels(&controller)?;
                        }
                    }
                }
                Tick::Position => {
                    if let Some(status) = controller.refresh_position() {
                        let mut out = stdout.lock();
                        write!(out, "\r[{}] {:>4}/1000 ", status.label, status.slider)?;
                        out.flush()?;
                    }
                }
            }
        }

        let mut wake = sched.next_deadline().unwrap_or(now + Duration::from_millis(100));
        if let Some(stop_at) = stop_at {
            wake = wake.min(stop_at);
        }
        std::thread::sleep(wake.saturating_duration_since(Instant::now()));
    }
    println!();

    if controller.close().is_err() {
        warn!("Playback state for '{}' was not saved", media.display());
    }
    print_notices(&mut controller);
    Ok(())
}

fn print_notices<E: PlaybackEngine>(controller: &mut SessionController<E>) {
    for notice in controller.take_notices() {
        eprintln!("{:?}: {}", notice.level, notice.message);
    }
}

fn print_panels<E: PlaybackEngine>(controller: &SessionController<E>) -> Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out)?;
    for side in [Side::Left, Side::Right] {
        let panel = controller.panel(side);
        if panel.track().is_empty() {
            continue;
        }
        writeln!(out, "--- {} ---", side.label())?;
        write!(out, "{}", panel.render())?;
    }
    out.flush()?;
    Ok(())
}

fn run_sessions(data_file: &Path, action: &SessionsCommand) -> Result<()> {
    let store = SessionStore::load(data_file);
    match action {
        SessionsCommand::List => {
            for (media, record) in store.iter() {
                println!("{}  {}", clock(record.position), media);
            }
        }
        SessionsCommand::Show { media } => {
            let media = session::absolute_path(media)?;
            let record = store
                .get(&media)
                .ok_or_else(|| anyhow!("No saved state for '{}'", media.display()))?;
            println!("{}", serde_json::to_string_pretty(record)?);
        }
    }
    Ok(())
}
