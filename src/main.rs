//! `dendro` command line: run the clustering server or query one.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use dendro::protocol::{Client, Server};
use dendro::{Linkage, ServerConfig};

#[derive(Parser, Debug)]
#[command(name = "dendro", version, about = "Hierarchical clustering server")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server until interrupted.
    Serve {
        /// TOML configuration file (defaults to ./dendro.toml if present).
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Listen address, overriding the configuration.
        #[arg(short, long)]
        listen: Option<String>,

        /// Directory of CSV tables, overriding the configuration.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Directory of stored dendrograms, overriding the configuration.
        #[arg(long)]
        dendrogram_dir: Option<PathBuf>,

        /// Print the effective configuration and exit.
        #[arg(long)]
        print_config: bool,
    },

    /// Cluster a table on a running server and print the dendrogram.
    Mine {
        /// Server address.
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        addr: String,

        /// Table to load.
        #[arg(short, long)]
        table: String,

        /// Number of levels; defaults to the full hierarchy.
        #[arg(short, long)]
        depth: Option<usize>,

        /// Distance method id (see `dendro linkages`).
        #[arg(short = 'm', long, default_value_t = 0)]
        linkage: i32,

        /// Store the dendrogram on the server under this name.
        #[arg(long)]
        save: Option<String>,
    },

    /// List the supported distance methods.
    Linkages,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Command::Serve {
            config,
            listen,
            data_dir,
            dendrogram_dir,
            print_config,
        } => {
            let mut cfg = ServerConfig::load(config.as_deref())
                .context("Failed to load configuration")?;
            if let Some(listen) = listen {
                cfg.listen = listen;
            }
            if let Some(dir) = data_dir {
                cfg.data_dir = dir;
            }
            if let Some(dir) = dendrogram_dir {
                cfg.dendrogram_dir = dir;
            }
            if print_config {
                print!("{}", cfg.to_toml());
                return Ok(());
            }

            info!(
                data_dir = %cfg.data_dir.display(),
                dendrogram_dir = %cfg.dendrogram_dir.display(),
                "starting server"
            );
            let server = Server::from_config(&cfg)
                .await
                .with_context(|| format!("Failed to bind {}", cfg.listen))?;
            server
                .run_until(async {
                    tokio::signal::ctrl_c().await.ok();
                })
                .await
                .context("Server error")?;
        }

        Command::Mine {
            addr,
            table,
            depth,
            linkage,
            save,
        } => {
            let linkage = Linkage::from_id(linkage)?;
            let dendrogram = tokio::task::spawn_blocking(move || -> Result<_> {
                let mut client =
                    Client::connect(&addr).with_context(|| format!("Failed to connect to {addr}"))?;
                let n = client.load_dataset(&table)?;
                let dendrogram = client.mine(depth.unwrap_or(n), linkage)?;
                if let Some(name) = save {
                    client.save_dendrogram(&name)?;
                }
                client.close()?;
                Ok(dendrogram)
            })
            .await??;
            print!("{dendrogram}");
        }

        Command::Linkages => {
            for l in Linkage::ALL {
                println!("{}\t{}", l.id(), l.name());
            }
        }
    }

    Ok(())
}
