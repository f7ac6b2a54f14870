//! Binary entrypoint for the batproxy CLI.
//!
//! Commands:
//! - `start [--listen-port N] [--dump FILE]` - run the proxy
//! - `init` - create a starter `config.toml`
//! - `status` - print map store statistics
//! - `filter` - decode server-protocol bytes from stdin to stdout (no network)
//!
//! See the library crate docs for module-level details: `batproxy::`.
use std::io::{Read, Write};

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

use batproxy::config::Config;
use batproxy::proto::scanner::TagScanner;
use batproxy::proto::session::{RenderConfig, Session};
use batproxy::proxy::ProxyServer;
use batproxy::storage::{MemoryMapStore, SledMapStore};

#[derive(Parser)]
#[command(name = "batproxy")]
#[command(about = "A BatMUD batclient-protocol proxy for plain terminal clients")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server
    Start {
        /// Listening port (overrides the config file)
        #[arg(short, long)]
        listen_port: Option<u16>,

        /// Append raw server-side protocol bytes to this file
        #[arg(short, long)]
        dump: Option<String>,
    },
    /// Initialize a new configuration file
    Init,
    /// Show map store statistics
    Status,
    /// Decode server protocol from stdin to stdout, without any network
    Filter,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Start { listen_port, dump } => {
            let mut config = Config::load(&cli.config).await?;
            if let Some(port) = listen_port {
                config.proxy.listen_port = port;
            }
            if dump.is_some() {
                config.proxy.dump_file = dump;
            }
            init_logging(&Some(config.clone()), cli.verbose);
            info!("Starting batproxy v{}", env!("CARGO_PKG_VERSION"));
            let server = ProxyServer::new(config)?;
            server.run().await?;
        }
        Commands::Status => {
            let config = Config::load(&cli.config).await?;
            init_logging(&Some(config.clone()), cli.verbose);
            let store = SledMapStore::open(&config.storage.data_dir)?;
            println!("map store: {}", config.storage.data_dir);
            println!("rooms: {}", store.room_count());
            println!("exits: {}", store.exit_count());
        }
        Commands::Filter => {
            // Works without a config file; logging goes to stderr so the
            // decoded stream on stdout stays clean.
            let config = match Config::load(&cli.config).await {
                Ok(config) => config,
                Err(_) => Config::default(),
            };
            init_logging(&None, cli.verbose);
            // The loop blocks on stdin; keep it off the runtime workers.
            tokio::task::spawn_blocking(move || {
                let mut stdin = std::io::stdin().lock();
                let mut stdout = std::io::stdout().lock();
                run_filter(&config, &mut stdin, &mut stdout)
            })
            .await??;
        }
    }

    Ok(())
}

/// Offline decoder: the protocol engine fed from stdin, rooms collected in
/// memory and discarded on exit.
fn run_filter(config: &Config, input: &mut impl Read, output: &mut impl Write) -> Result<()> {
    let mut scanner = TagScanner::new();
    let mut session = Session::new(
        RenderConfig {
            color_mode: config.color.mode,
            full_status: config.color.full_status,
        },
        MemoryMapStore::new(),
    );

    let mut buf = [0u8; 2048];
    loop {
        let n = input.read(&mut buf)?;
        if n == 0 {
            break;
        }
        for event in scanner.scan(&buf[..n]) {
            session.handle(event);
        }
        output.write_all(&session.take_output())?;
        output.flush()?;
    }
    Ok(())
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    let mut builder = env_logger::Builder::new();
    // Base level from CLI verbosity overrides config
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    if let Some(cfg) = config {
        if let Some(ref file) = cfg.logging.file {
            if let Ok(f) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(file)
            {
                let writer = std::sync::Arc::new(std::sync::Mutex::new(f));

                // If stdout is a terminal, echo log lines there as well;
                // under a service manager only the file is written.
                let is_tty = atty::is(atty::Stream::Stdout);

                builder.format(move |fmt, record| {
                    let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
                    let line = format!("{} [{}] {}", ts, record.level(), record.args());
                    if let Ok(mut guard) = writer.lock() {
                        let _ = writeln!(guard, "{}", line);
                    }
                    if is_tty {
                        writeln!(fmt, "{}", line)
                    } else {
                        Ok(())
                    }
                });
                let _ = builder.try_init();
                return;
            }
        }
    }

    builder.format(|fmt, record| {
        writeln!(
            fmt,
            "{} [{}] {}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            record.level(),
            record.args()
        )
    });
    let _ = builder.try_init();
}
