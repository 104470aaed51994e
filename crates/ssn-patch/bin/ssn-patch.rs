//! ssn-patch command-line entry point.
//!
//! Thin wrapper around the ssn-patch library that:
//! 1. Parses command-line arguments
//! 2. Initializes logging
//! 3. Builds the patch configuration from the environment and flags
//! 4. Runs the requested command

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ssn_patch::{PatchConfig, Patcher, Product, resolve};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "ssn-patch",
    about = "Resolve, inspect and install Solid State Networks client patches",
    version
)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

/// Overrides for values read from `SSN_PATCH_*`
#[derive(Debug, Args)]
struct Settings {
    /// Patch CDN host
    #[arg(long, global = true)]
    host: Option<String>,

    /// Host serving .patchmanifest files
    #[arg(long, global = true)]
    manifest_host: Option<String>,

    /// Directory for downloaded disk files
    #[arg(long, global = true)]
    cache_dir: Option<PathBuf>,

    /// Concurrent disk downloads
    #[arg(long, global = true)]
    fetch_concurrency: Option<usize>,

    /// Concurrent file installs
    #[arg(long, global = true)]
    install_concurrency: Option<usize>,

    /// External installer helper
    #[arg(long, global = true)]
    installer: Option<PathBuf>,

    /// Remove disk files after each clean hop
    #[arg(long, global = true)]
    cleanup: bool,
}

impl Settings {
    fn apply(self, config: &mut PatchConfig) {
        if let Some(host) = self.host {
            config.patch_host = host;
        }
        if let Some(host) = self.manifest_host {
            config.manifest_host = host;
        }
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if let Some(n) = self.fetch_concurrency {
            config.fetch_concurrency = n;
        }
        if let Some(n) = self.install_concurrency {
            config.install_concurrency = n;
        }
        if self.installer.is_some() {
            config.installer = self.installer;
        }
        config.cleanup_disks |= self.cleanup;
    }
}

#[derive(Debug, Args)]
struct Hop {
    /// Product name, e.g. assets_swtor_main
    product: Product,

    /// Installed release, -1 for none
    #[arg(allow_negative_numbers = true)]
    from: i32,

    /// Wanted release
    to: i32,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current release and the published releases of a product
    Manifest {
        /// Product name, e.g. assets_swtor_main
        product: Product,
    },

    /// Print the chain of hops between two releases
    Path(Hop),

    /// Print the entries of a single hop
    List(Hop),

    /// Download and install every hop between two releases
    Install {
        #[command(flatten)]
        hop: Hop,

        /// Installation to patch; required unless FROM is -1
        #[arg(long)]
        source: Option<PathBuf>,

        /// Where the patched installation is written
        #[arg(long)]
        target: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = PatchConfig::from_env().context("reading SSN_PATCH_* environment")?;
    cli.settings.apply(&mut config);
    config.validate()?;

    match cli.command {
        Command::Manifest { product } => {
            let patcher = Patcher::from_config(config)?;
            let manifest = patcher.manifest(product).await?;
            println!("current release: {}", manifest.current);
            for (id, release) in &manifest.releases {
                let from: Vec<String> = release.from.iter().map(ToString::to_string).collect();
                println!("{id:>5} {} from [{}]", release.sha1, from.join(", "));
            }
        }
        Command::Path(hop) => {
            let path = resolve(hop.product, hop.from, hop.to)?;
            if path.is_empty() {
                anyhow::bail!(
                    "no known release path for {} from {} to {}",
                    hop.product,
                    hop.from,
                    hop.to
                );
            }
            for edge in path {
                println!("{edge}");
            }
        }
        Command::List(hop) => {
            let patcher = Patcher::from_config(config)?;
            let entries = patcher.patch_zip(hop.product, hop.from, hop.to).await?;
            for entry in entries {
                let diff = entry
                    .diff_type
                    .map_or_else(|| "-".to_string(), |d| d.to_string());
                println!(
                    "{diff:<9} {:>12} {:>12} {}",
                    entry.size, entry.compressed_size, entry.name
                );
            }
        }
        Command::Install {
            hop,
            source,
            target,
        } => {
            let patcher = Patcher::from_config(config)?;
            let token = patcher.cancellation_token();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupted, finishing running work");
                    token.cancel();
                }
            });

            let report = patcher
                .install_path(hop.product, hop.from, hop.to, source.as_deref(), &target)
                .await?;
            tracing::info!(
                extracted = report.extracted,
                patched = report.patched,
                deleted = report.deleted,
                copied = report.copied,
                skipped = report.skipped,
                "installation complete"
            );
        }
    }

    Ok(())
}
