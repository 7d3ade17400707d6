// Main binary that starts the daemon
use clap::{Parser, Subcommand};
use color_eyre::eyre::{eyre, Result};
use std::io::stderr;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

use wild_central_server::{build_service, run as run_server, ServerOptions};

#[derive(Parser, Debug)]
#[command(author, version, about = "Wild Cloud central provisioning daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    /// Keep all state under this directory instead of the detected location
    #[arg(long, global = true, env = "WILD_CENTRAL_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Runs the HTTP API server (default action)
    Serve(ServeArgs),
    /// Prints the dnsmasq config for the current configuration
    Render,
    /// Downloads the PXE boot assets once and exits
    Provision,
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Directory the web UI is served from
    #[arg(long, default_value = "static")]
    static_dir: PathBuf,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("static"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // RUST_LOG wins over the built-in directives
    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "wild_central={level},wild_central_server={level},wild_central_dnsmasq={level},tower_http=warn,hyper=warn,reqwest=warn",
        level = level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();
    debug!("Global logger initialized.");

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            info!(version = env!("CARGO_PKG_VERSION"), "Starting wild-central");
            run_server(ServerOptions {
                data_dir: cli.data_dir,
                static_dir: args.static_dir,
            })
            .await
            .map_err(|e| eyre!("{:#}", e))?;
        }
        Commands::Render => {
            let service = build_service(cli.data_dir).await.map_err(|e| eyre!("{:#}", e))?;
            let rendered = service.render_service_config().await?;
            print!("{}", rendered);
        }
        Commands::Provision => {
            let service = build_service(cli.data_dir).await.map_err(|e| eyre!("{:#}", e))?;
            let assets = service.provision_boot_assets().await?;
            println!("Schematic: {}", assets.schematic_id);
            println!("Kernel: {}", assets.kernel.display());
            println!("Initramfs: {}", assets.initramfs.display());
            println!("Boot script: {}", assets.boot_script.display());
            for loader in &assets.loaders {
                println!("Loader: {}", loader.display());
            }
        }
    }

    Ok(())
}
