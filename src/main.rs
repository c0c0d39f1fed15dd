use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use snake_openness_rl::pacing::FramePacer;
use snake_openness_rl::{Agent, AppConfig, Game, Policy, QTablePolicy, SpatialScoreTable, TrainingSummary};

#[derive(Parser)]
#[command(name = "snake-openness-rl")]
#[command(version, about = "Snake self-play trainer with openness-shaped rewards")]
struct Cli {
    /// JSON config file; defaults are used for anything it leaves out
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Precompute the spatial score table for the configured board
    BuildTable {
        /// Output path (`.bin` writes the binary cache)
        #[arg(long, default_value = "smoothness_graphs.txt")]
        out: PathBuf,
    },
    /// Train a policy by self-play
    Train {
        /// Spatial score table (text or `.bin`)
        #[arg(long, default_value = "smoothness_graphs.txt")]
        table: PathBuf,

        /// Episodes to play (per block when interactive)
        #[arg(long)]
        episodes: Option<usize>,

        #[arg(long)]
        seed: Option<u64>,

        /// Frames per second, for watching a run
        #[arg(long)]
        fps: Option<u32>,

        #[arg(long, value_enum, default_value = "q-table")]
        policy: PolicyKind,

        /// Ask whether to continue after each block of episodes
        #[arg(long)]
        interactive: bool,

        /// Write the final summary here as JSON
        #[arg(long)]
        summary: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyKind {
    QTable,
    /// Candle MLP, needs the `dqn-gpu` feature
    Dqn,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("snake_openness_rl=info,warn"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn ask_continue() -> Result<bool> {
    print!("continue? [y/N] ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn train<P: Policy>(
    policy: P,
    config: &AppConfig,
    table: Arc<SpatialScoreTable>,
    interactive: bool,
) -> Result<TrainingSummary> {
    let seed = config.train.seed.unwrap_or_else(rand::random);
    tracing::info!("Seed {}", seed);
    let mut game = Game::new(&config.game, table, seed)?;
    let mut agent = Agent::new(policy, config.train.clone(), seed.wrapping_add(1))?;
    let mut pacer = FramePacer::from_fps(config.train.fps);

    loop {
        agent.run(&mut game, config.train.episodes, &mut pacer)?;
        if !interactive || !ask_continue()? {
            break;
        }
    }
    Ok(agent.summary(&game))
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => AppConfig::default(),
    };

    match cli.command {
        Command::BuildTable { out } => {
            config.game.validate()?;
            let table = SpatialScoreTable::build(config.game.grid());
            table.save(&out).with_context(|| format!("writing {}", out.display()))?;
        }
        Command::Train { table, episodes, seed, fps, policy, interactive, summary } => {
            if let Some(n) = episodes {
                config.train.episodes = n;
            }
            if seed.is_some() {
                config.train.seed = seed;
            }
            if fps.is_some() {
                config.train.fps = fps;
            }
            config.game.validate()?;
            config.train.validate()?;

            let spatial = SpatialScoreTable::load(&table)
                .with_context(|| format!("loading spatial table {}", table.display()))?;
            let spatial = Arc::new(spatial);

            let result = match policy {
                PolicyKind::QTable => {
                    let q = QTablePolicy::new(config.train.alpha, config.train.gamma);
                    train(q, &config, spatial, interactive)?
                }
                #[cfg(feature = "dqn-gpu")]
                PolicyKind::Dqn => {
                    use snake_openness_rl::dqn::{DqnPolicy, preferred_device};
                    let device = preferred_device();
                    let net = DqnPolicy::new(256, config.train.learning_rate as f64, config.train.gamma, &device)?;
                    train(net, &config, spatial, interactive)?
                }
                #[cfg(not(feature = "dqn-gpu"))]
                PolicyKind::Dqn => anyhow::bail!("built without the dqn-gpu feature"),
            };

            println!("Games:       {}", result.episodes);
            println!("Record:      {}", result.record);
            println!("Mean score:  {:.3}", result.mean_score);
            println!("Max steps:   {}", result.max_steps);
            println!("Mean steps:  {:.1}", result.mean_steps);

            if let Some(path) = summary {
                let json = serde_json::to_string_pretty(&result)?;
                std::fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
            }
        }
    }
    Ok(())
}
