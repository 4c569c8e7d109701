//! HTTPS listener.
//!
//! Loads a PEM certificate chain and private key and builds a rustls server
//! config limited to TLS 1.2 and 1.3 with the provider's default suites (AEAD
//! only, forward secret). [`TlsListener`] runs handshakes off the accept path
//! and hands finished streams to `axum::serve`.

use anyhow::{Context, Result, anyhow};
use axum::serve::Listener;
use rustls::{
    ServerConfig,
    crypto::aws_lc_rs,
    pki_types::{CertificateDer, PrivateKeyDer},
    version::{TLS12, TLS13},
};
use rustls_pemfile::{certs, private_key};
use std::{
    fs::File,
    io::{self, BufReader},
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc,
    task::JoinHandle,
    time::{Duration, sleep, timeout},
};
use tokio_rustls::{TlsAcceptor, server::TlsStream};
use tracing::{debug, error};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    cert: PathBuf,
    key: PathBuf,
}

impl TlsPaths {
    #[must_use]
    pub fn new(cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: key.into(),
        }
    }

    #[must_use]
    pub fn cert_path(&self) -> &Path {
        &self.cert
    }

    #[must_use]
    pub fn key_path(&self) -> &Path {
        &self.key
    }
}

/// Build the server config from the files in `paths`.
///
/// # Errors
/// Returns an error if the certificate or key cannot be read, parsed, or do
/// not belong together.
pub fn load_server_config(paths: &TlsPaths) -> Result<ServerConfig> {
    let cert_chain = load_cert_chain(paths.cert_path())?;
    let key = load_private_key(paths.key_path())?;

    let mut config = ServerConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_protocol_versions(&[&TLS13, &TLS12])
        .context("Failed to select TLS versions")?
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("TLS certificate and key do not match")?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(config)
}

fn load_cert_chain(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open TLS certificate: {}", path.display()))?;
    let certs = certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read TLS certificate: {}", path.display()))?;
    if certs.is_empty() {
        return Err(anyhow!("TLS certificate is empty: {}", path.display()));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open TLS key: {}", path.display()))?;
    private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to read TLS key: {}", path.display()))?
        .ok_or_else(|| anyhow!("TLS private key not found: {}", path.display()))
}

/// A [`Listener`] yielding TLS streams.
///
/// A background task accepts TCP connections and runs each handshake in its
/// own task, so a slow or failing client never blocks the others.
#[derive(Debug)]
pub struct TlsListener {
    local_addr: SocketAddr,
    streams: mpsc::Receiver<(TlsStream<TcpStream>, SocketAddr)>,
    accept_task: JoinHandle<()>,
}

impl TlsListener {
    /// # Errors
    /// Returns an error if the local address of `tcp` cannot be read.
    pub fn new(tcp: TcpListener, config: Arc<ServerConfig>) -> io::Result<Self> {
        let local_addr = tcp.local_addr()?;
        let (tx, streams) = mpsc::channel(64);
        let accept_task = tokio::spawn(accept_loop(tcp, TlsAcceptor::from(config), tx));

        Ok(Self {
            local_addr,
            streams,
            accept_task,
        })
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl Listener for TlsListener {
    type Io = TlsStream<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        match self.streams.recv().await {
            Some(accepted) => accepted,
            None => {
                error!("TLS accept loop stopped");
                std::future::pending().await
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        Ok(self.local_addr)
    }
}

async fn accept_loop(
    tcp: TcpListener,
    acceptor: TlsAcceptor,
    tx: mpsc::Sender<(TlsStream<TcpStream>, SocketAddr)>,
) {
    while !tx.is_closed() {
        let (stream, peer) = match tcp.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                debug!("TCP accept failed: {}", err);
                sleep(Duration::from_millis(100)).await;
                continue;
            }
        };

        let acceptor = acceptor.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            match timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(tls)) => {
                    let _ = tx.send((tls, peer)).await;
                }
                Ok(Err(err)) => debug!(%peer, "TLS handshake failed: {}", err),
                Err(_) => debug!(%peer, "TLS handshake timed out"),
            }
        });
    }
}
