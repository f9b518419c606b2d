use anyhow::Result;
use clap::Parser;
use devlog_core::{Config, LogKind, LogLevel, Subscription, Watched};
use devlog_dispatch::{log, log_assertion, log_error, log_exception, log_warning, LogSource};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// devlog - multi-sink diagnostic logger demo host
#[derive(Parser, Debug)]
#[command(name = "devlog")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of scheduler ticks to run
    #[arg(short, long, default_value_t = 60)]
    ticks: u32,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = 100)]
    tick_ms: u64,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Print the default configuration and exit
    #[arg(long)]
    print_config: bool,
}

/// Scripted gameplay stand-in that logs under its own type
struct SwordController;

impl LogSource for SwordController {
    const LOG_LEVEL: Option<i32> = Some(2);
}

#[derive(Debug)]
struct AttackInterrupted {
    tick: u32,
}

impl std::fmt::Display for AttackInterrupted {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attack interrupted at tick {}", self.tick)
    }
}

impl std::error::Error for AttackInterrupted {}

/// Player stats whose changes are reported through the logger
struct PlayerStats {
    sword_skill: Watched<i32>,
    subscription: Option<Subscription<i32>>,
}

impl PlayerStats {
    fn new() -> Self {
        let sword_skill = Watched::new(0);
        let subscription = sword_skill.subscribe(|old, new| {
            log!(context = "PlayerStats", "Sword skill changed {} -> {}", old, new);
        });
        Self {
            sword_skill,
            subscription: Some(subscription),
        }
    }

    fn increase_sword_skill(&self, amount: i32) {
        let next = (self.sword_skill.get() + amount).clamp(0, 999);
        self.sword_skill.set(next);
    }

    fn despawn(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.sword_skill.unsubscribe(subscription);
        }
    }
}

fn run_tick(tick: u32, stats: &PlayerStats) {
    let Some(dispatcher) = devlog_dispatch::dispatcher() else {
        return;
    };

    match tick % 10 {
        0 => {
            log!("Tick {}", tick);
        }
        2 => {
            dispatcher.log_from::<SwordController>(
                "Sword hit",
                Some("Sword"),
                LogKind::Info,
                LogLevel::Common.as_i32(),
            );
            stats.increase_sword_skill(1);
        }
        4 => {
            log_warning!(level = 1, "Stamina low at tick {}", tick);
        }
        6 => {
            log!(level = LogLevel::Verbose.as_i32(), "Camera position sampled");
        }
        8 if tick % 20 == 8 => {
            log_error!(context = "NetworkUI", "Host not reachable");
            log_assertion!("Session should exist before spawning players");
        }
        8 => {
            log_exception!(AttackInterrupted { tick });
        }
        _ => {}
    }

    devlog_dispatch::tick();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Handle --print-config
    if args.print_config {
        let config = Config::default();
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Load configuration
    let config = match args.config {
        Some(ref path) => Config::load_or_default(path)?,
        None => Config::default(),
    };

    info!(
        directory = %config.log_directory().display(),
        ticks = args.ticks,
        "Starting devlog demo"
    );

    devlog_dispatch::init(config)?;

    let mut stats = PlayerStats::new();
    let mut interval = tokio::time::interval(Duration::from_millis(args.tick_ms));
    for tick in 0..args.ticks {
        interval.tick().await;
        run_tick(tick, &stats);
    }

    if let Some(dispatcher) = devlog_dispatch::dispatcher() {
        info!(
            visible = dispatcher.screen().visible().len(),
            written = dispatcher.file_sink().entries_written(),
            sword_skill = stats.sword_skill.get(),
            "Demo finished"
        );
    }

    stats.despawn();
    devlog_dispatch::shutdown()?;
    Ok(())
}
