use std::cell::RefCell;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser as ClapParser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vttcue::cache::TrackCache;
use vttcue::caption::{render_html, CaptionSurface};
use vttcue::deeplink::{parse_hash, JumpController, Player, PlayerRegistry};
use vttcue::events::{PlayerReady, ReadyBus};
use vttcue::parser::{timestamp_to_seconds, Parser};
use vttcue::{serialiser, CueList};

fn main() {
    init_logging();

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

fn init_logging() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "vttcue=warn".into()))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

#[derive(ClapParser)]
#[command(about = "Inspect WebVTT caption tracks", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the cues of a track.
    Cues {
        #[command(flatten)]
        track: TrackArgs,
        #[arg(short, long, value_enum, default_value_t = Format::Vtt)]
        format: Format,
    },
    /// Print the caption showing at a point in time.
    At {
        #[command(flatten)]
        track: TrackArgs,
        #[arg(
            value_name = "TIME",
            help = "Seconds (e.g. 12.5) or a timestamp (e.g. 00:12.500)."
        )]
        time: String,
    },
    /// Step through playback and print every caption change.
    Play {
        #[command(flatten)]
        track: TrackArgs,
        #[arg(long, value_name = "SECONDS", default_value_t = 0.25, help = "Interval between time updates.")]
        step: f64,
        #[arg(long, value_name = "SECONDS", help = "Stop here instead of at the end of the last cue.")]
        until: Option<f64>,
        #[arg(long, help = "Print captions as markup with <br> line breaks.")]
        html: bool,
    },
    /// Resolve a deep link such as '#intro&t=01:23'.
    Jump {
        #[arg(value_name = "HASH")]
        hash: String,
        #[arg(short, long, value_name = "ID", help = "Player to register. Defaults to the id in the link.")]
        player: Option<String>,
        #[arg(short, long, value_name = "URL", help = "Caption track of the player, relative to --root.")]
        track: Option<String>,
        #[arg(short, long, value_name = "DIR", default_value = ".")]
        root: PathBuf,
    },
}

#[derive(Args)]
struct TrackArgs {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "The track to read from. If not supplied, it will be read from standard input.",
        default_value = "-"
    )]
    input: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// Normalised WebVTT.
    Vtt,
    /// One line per cue.
    List,
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Cues { track, format } => {
            let cues = load_track(&track)?;
            match format {
                Format::Vtt => serialiser::serialise(&cues, io::stdout())?,
                Format::List => print_list(&cues)?,
            }
        }
        Command::At { track, time } => {
            let cues = load_track(&track)?;
            let time = parse_time(&time)?;
            println!("{}", cues.active_text(time));
        }
        Command::Play {
            track,
            step,
            until,
            html,
        } => {
            let cues = load_track(&track)?;
            play(cues, step, until, html)?;
        }
        Command::Jump {
            hash,
            player,
            track,
            root,
        } => jump(&hash, player, track.as_deref(), root)?,
    }

    Ok(())
}

fn load_track(args: &TrackArgs) -> Result<CueList> {
    let data = if args.input == "-" {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(&args.input)
            .context(format!("Failed to open input file: '{}'", args.input))?
    };

    let cues = Parser::new().parse(&data);
    if cues.is_empty() {
        warn!(input = %args.input, "track contains no cues");
    }
    Ok(cues)
}

fn parse_time(input: &str) -> Result<f64> {
    if let Ok(seconds) = input.parse::<f64>() {
        if seconds.is_finite() {
            return Ok(seconds);
        }
    }
    if input.contains(':') {
        return Ok(timestamp_to_seconds(input));
    }
    Err(anyhow!("Invalid time: '{}'", input))
}

fn print_list(cues: &CueList) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for cue in cues {
        writeln!(
            out,
            "{:>10.3} {:>10.3}  {}",
            cue.start,
            cue.end,
            cue.text.replace('\n', " / ")
        )?;
    }
    Ok(())
}

fn play(cues: CueList, step: f64, until: Option<f64>, html: bool) -> Result<()> {
    if !(step > 0.0 && step.is_finite()) {
        bail!("Step must be a positive number of seconds, got {}", step);
    }
    let until = until.unwrap_or_else(|| cues.iter().map(|c| c.end).fold(0.0, f64::max));

    let mut surface = CaptionSurface::new(cues);
    if surface.is_hidden() {
        info!("no cues, captions stay hidden");
        return Ok(());
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let ticks = (until / step).ceil().max(0.0) as u64;
    for tick in 0..=ticks {
        let time = tick as f64 * step;
        if let Some(text) = surface.update(time) {
            let shown = if html {
                render_html(text)
            } else {
                text.replace('\n', " / ")
            };
            writeln!(out, "{:>10.3}  {}", time, shown)?;
        }
    }
    Ok(())
}

fn jump(hash: &str, player: Option<String>, track: Option<&str>, root: PathBuf) -> Result<()> {
    let link = parse_hash(hash).ok_or_else(|| anyhow!("Not a deep link: '{}'", hash))?;
    let player_id = player.unwrap_or_else(|| link.id.clone());

    let registry = Rc::new(RefCell::new(PlayerRegistry::new()));
    registry.borrow_mut().register(Player::new(player_id.clone()));

    // Players are not ready on page load, so the jump starts out pending.
    let jumps = Rc::new(RefCell::new(JumpController::new()));
    let immediate = jumps.borrow_mut().restore(hash, &mut registry.borrow_mut());
    debug_assert!(immediate.is_none());

    let applied = Rc::new(RefCell::new(None));
    let mut bus = ReadyBus::new();
    {
        let registry = Rc::clone(&registry);
        let jumps = Rc::clone(&jumps);
        let applied = Rc::clone(&applied);
        bus.subscribe(move |event: &PlayerReady| {
            let mut registry = registry.borrow_mut();
            registry.mark_ready(&event.player_id);
            if let Some(seek) = jumps.borrow_mut().on_player_ready(&mut registry) {
                *applied.borrow_mut() = Some(seek);
            }
        });
    }
    bus.publish(PlayerReady::new(player_id.clone()));

    let seek = applied.borrow_mut().take();
    let seek = match seek {
        Some(seek) => seek,
        None => {
            println!("{}: jump to '{}' still pending", link.id, link.time);
            return Ok(());
        }
    };
    println!("{} -> {:.3}s", seek.player_id, seek.seconds);

    let mut cache = TrackCache::from_dir(&root);
    let mut surface = CaptionSurface::load(&mut cache, track);
    if let Some(text) = surface.update(seek.seconds) {
        println!("{}", text);
    }
    Ok(())
}
