use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use meshnode_config::NodeConfig;
use meshnode_crypto::PrivateKey;
use meshnode_node::run_node;
use tokio::runtime::Runtime;

#[derive(Parser)]
#[command(name = "meshnode", version, about = "meshnode P2P blockchain node CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 validator key
    Keygen,
    /// Node operations
    Node {
        #[command(subcommand)]
        cmd: NodeCmd,
    },
}

#[derive(Subcommand)]
enum NodeCmd {
    /// Write a default config file
    Init {
        #[arg(long, default_value = "config/meshnode.toml")]
        config: PathBuf,
    },
    /// Start the node
    Start {
        #[arg(long, default_value = "config/meshnode.toml")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Keygen => {
            let priv_key = PrivateKey::generate();
            println!("private_key = \"{}\"", hex::encode(&priv_key.to_bytes()[..32]));
            println!("address = \"{}\"", priv_key.public().address().to_hex());
        }
        Commands::Node { cmd } => match cmd {
            NodeCmd::Init { config } => init_config(config)?,
            NodeCmd::Start { config } => {
                let rt = Runtime::new()?;
                rt.block_on(async move { run_node(config).await })?;
            }
        },
    }
    Ok(())
}

fn init_config(path: PathBuf) -> Result<()> {
    if path.exists() {
        println!("config already exists at {path:?}");
        return Ok(());
    }
    let cfg = NodeConfig::example();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, toml::to_string_pretty(&cfg)?)?;
    println!("wrote config to {path:?}");
    Ok(())
}
