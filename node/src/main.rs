//! TIDEMARK Node Binary

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tidemark_core::{
    Clock, FixtureOracle, Hash, ManualClock, NodeConfig, OracleFixture, SystemClock,
};
use tidemark_crypto::keys::{KeyPair, ValidatorKeyFile};
use tidemark_node::{App, AppGenesis, Query, Transaction, TxResult};
use tidemark_state::PersistentStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "config.json";
const GENESIS_FILE: &str = "genesis.json";
const KEY_FILE: &str = "validator_key.json";
const ORACLE_FILE: &str = "oracle.json";

#[derive(Parser)]
#[command(name = "tidemark-node")]
#[command(about = "TIDEMARK - validator rotation and root-chain checkpointing")]
#[command(version)]
struct Cli {
    /// Node home directory
    #[arg(long, global = true, default_value = "./tidemark")]
    home: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a validator key, a single-validator genesis and a default config
    Init {
        /// Voting power of the genesis validator
        #[arg(long, default_value = "10")]
        power: i64,

        /// Node name
        #[arg(long, default_value = "tidemark-node")]
        name: String,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },

    /// Deliver a JSON array of transactions as one block
    Apply {
        /// Transaction batch file
        #[arg(short, long)]
        txs: PathBuf,

        /// Fix the node clock to this unix time
        #[arg(long)]
        now: Option<u64>,
    },

    /// Answer a JSON query, e.g. '{"module":"checkpoint","query":"ack_count"}'
    Query {
        query: String,
    },

    /// Print the current state as a genesis document
    Export,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init { power, name, force } => {
            init_logging("info");
            init_home(&cli.home, power, name, force)?;
        }

        Commands::Apply { txs, now } => {
            let config = load_config(&cli.home)?;
            init_logging(&config.log_level);

            let clock: Arc<dyn Clock> = match now {
                Some(secs) => Arc::new(ManualClock::new(secs)),
                None => Arc::new(SystemClock),
            };
            let mut app = open_app(&cli.home, &config, clock)?;

            if app.version().0 == 0 {
                let genesis = AppGenesis::load(cli.home.join(GENESIS_FILE))
                    .context("failed to read genesis")?;
                app.init_chain(&genesis).context("invalid genesis")?;
            }

            let content = std::fs::read_to_string(&txs)
                .with_context(|| format!("failed to read {}", txs.display()))?;
            let batch = Transaction::batch_from_json(&content)?;
            info!(txs = batch.len(), file = %txs.display(), "Delivering block");

            let (outcomes, updates) = app.deliver_block(&batch)?;
            for (index, (tx, outcome)) in batch.iter().zip(outcomes.iter()).enumerate() {
                println!("{}", serde_json::to_string(&TxResult::new(index, tx, outcome))?);
            }

            let summary = serde_json::json!({
                "version": app.version().0,
                "state_root": app.state_root()?.to_hex(),
                "validator_updates": updates
                    .iter()
                    .map(|u| serde_json::json!({ "pub_key": u.pub_key.to_hex(), "power": u.power }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Commands::Query { query } => {
            let config = load_config(&cli.home)?;
            init_logging(&config.log_level);

            let query: Query = serde_json::from_str(&query).context("malformed query")?;
            let app = open_app(&cli.home, &config, Arc::new(SystemClock))?;
            println!("{}", serde_json::to_string_pretty(&app.query(&query)?)?);
        }

        Commands::Export => {
            let config = load_config(&cli.home)?;
            init_logging(&config.log_level);

            let app = open_app(&cli.home, &config, Arc::new(SystemClock))?;
            println!("{}", app.export_genesis()?.to_json()?);
        }
    }

    Ok(())
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn init_home(home: &Path, power: i64, name: String, force: bool) -> anyhow::Result<()> {
    let genesis_path = home.join(GENESIS_FILE);
    if genesis_path.exists() && !force {
        bail!("{} already exists, pass --force to overwrite", genesis_path.display());
    }
    std::fs::create_dir_all(home)?;

    let keypair = KeyPair::generate();
    let key_file = ValidatorKeyFile::from_keypair(&keypair);
    std::fs::write(home.join(KEY_FILE), serde_json::to_string_pretty(&key_file)?)?;

    AppGenesis::single_validator(&keypair, power).save(&genesis_path)?;

    let config = NodeConfig {
        name,
        data_dir: home.join("data"),
        ..Default::default()
    };
    config.save(&home.join(CONFIG_FILE))?;

    let fixture = serde_json::to_string_pretty(&OracleFixture::default())?;
    std::fs::write(home.join(ORACLE_FILE), fixture)?;

    info!(
        home = %home.display(),
        validator = %keypair.address(),
        power,
        "Initialized node home"
    );
    Ok(())
}

fn load_config(home: &Path) -> anyhow::Result<NodeConfig> {
    let path = home.join(CONFIG_FILE);
    NodeConfig::load(&path).with_context(|| format!("failed to load {}", path.display()))
}

fn open_app(
    home: &Path,
    config: &NodeConfig,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<App<PersistentStore>> {
    let store = PersistentStore::open(&config.data_dir)
        .with_context(|| format!("failed to open store at {}", config.data_dir.display()))?;

    let oracle_path = home.join(ORACLE_FILE);
    let oracle = if oracle_path.exists() {
        FixtureOracle::load(&oracle_path)?
    } else {
        warn!(path = %oracle_path.display(), "No oracle fixture, root chain is empty");
        FixtureOracle::default()
    };

    // no child chain is attached to the binary
    let accept_all = |_start: u64, _end: u64, _root: &Hash| true;

    let app = App::new(
        store,
        config.checkpoint.clone(),
        Arc::new(oracle),
        Arc::new(accept_all),
        clock,
    );
    let root = app.state_root()?;
    info!(name = %config.name, version = app.version().0, %root, "Opened application");
    Ok(app)
}
