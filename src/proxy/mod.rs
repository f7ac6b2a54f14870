//! # TCP plumbing
//!
//! Accept loop and per-connection byte pump. Each accepted client gets its
//! own task, its own upstream connection and its own protocol state
//! ([`TagScanner`] + [`Session`] + [`InputRecoder`]); only the sled map store
//! is shared, behind an `Arc`. The pump moves bytes between the two sockets
//! and the pure transducers and does nothing else - no retry management, no
//! authentication, no throttling.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use crate::config::Config;
use crate::proto::recode::InputRecoder;
use crate::proto::scanner::TagScanner;
use crate::proto::session::{RenderConfig, Session};
use crate::storage::SledMapStore;

/// Sent to the game server right after connecting; switches the session into
/// batclient protocol mode.
const BC_ENABLE: &[u8] = b"\x1bbc 1\n";

const READ_BUF: usize = 2048;

/// The proxy server: owns the configuration and the shared map store.
pub struct ProxyServer {
    config: Config,
    store: Arc<SledMapStore>,
}

impl ProxyServer {
    pub fn new(config: Config) -> Result<Self> {
        let store = SledMapStore::open(&config.storage.data_dir)
            .with_context(|| format!("opening map store in {}", config.storage.data_dir))?;
        Ok(Self {
            config,
            store: Arc::new(store),
        })
    }

    /// Accept clients until Ctrl-C.
    pub async fn run(&self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.config.proxy.listen_host, self.config.proxy.listen_port
        );
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding {}", addr))?;
        info!("listening on {}", addr);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (client, peer) = accepted.context("accept")?;
                    info!("client connected from {}", peer);
                    let config = self.config.clone();
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        match handle_connection(client, config, store).await {
                            Ok(()) => info!("connection from {} closed", peer),
                            Err(e) => warn!("connection from {}: {:#}", peer, e),
                        }
                    });
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("shutdown requested");
                    break;
                }
            }
        }
        Ok(())
    }
}

/// Pump one client session until either side disconnects. Teardown simply
/// drops the per-connection state.
async fn handle_connection(
    client: TcpStream,
    config: Config,
    store: Arc<SledMapStore>,
) -> Result<()> {
    let upstream_addr = format!("{}:{}", config.upstream.host, config.upstream.port);
    let server = TcpStream::connect(&upstream_addr)
        .await
        .with_context(|| format!("connecting to {}", upstream_addr))?;
    info!("connected to {}", upstream_addr);

    let mut dump = match &config.proxy.dump_file {
        Some(path) => Some(
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await
                .with_context(|| format!("opening dump file {}", path))?,
        ),
        None => None,
    };

    let (mut client_rd, mut client_wr) = client.into_split();
    let (mut server_rd, mut server_wr) = server.into_split();
    server_wr.write_all(BC_ENABLE).await?;

    let mut scanner = TagScanner::new();
    let mut session = Session::new(
        RenderConfig {
            color_mode: config.color.mode,
            full_status: config.color.full_status,
        },
        store,
    );
    let mut recoder = InputRecoder::new();

    let mut server_buf = [0u8; READ_BUF];
    let mut client_buf = [0u8; READ_BUF];
    loop {
        tokio::select! {
            read = server_rd.read(&mut server_buf) => {
                let n = read.context("reading from server")?;
                if n == 0 {
                    info!("server disconnect");
                    break;
                }
                if let Some(f) = dump.as_mut() {
                    f.write_all(&server_buf[..n]).await.context("writing dump file")?;
                }
                for event in scanner.scan(&server_buf[..n]) {
                    session.handle(event);
                }
                let out = session.take_output();
                if !out.is_empty() {
                    client_wr.write_all(&out).await.context("writing to client")?;
                }
            }
            read = client_rd.read(&mut client_buf) => {
                let n = read.context("reading from client")?;
                if n == 0 {
                    info!("client disconnect");
                    break;
                }
                let out = recoder.recode(&client_buf[..n]);
                if !out.is_empty() {
                    server_wr.write_all(&out).await.context("writing to server")?;
                }
            }
        }
    }
    Ok(())
}
