//! Session bootstrap over a Unix-domain rendezvous socket.
//!
//! The acceptor binds the rendezvous path, accepts exactly one connection and
//! runs the acceptor role on it. The initiator connects to the same path and
//! runs the initiator role. Each side closes its channel on every exit path,
//! and the acceptor removes the socket file when it is done.

use std::fs;
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::UnixListener;
use std::path::{Path, PathBuf};

use crate::channel::{Channel, UnixChannel};
use crate::config::SessionConfig;
use crate::engine::SecurityEngine;
use crate::error::{Error, Result};
use crate::negotiate::{AcceptorDriver, InitiatorDriver, NegotiationOutcome, Role};

/// A listening Unix socket that is unlinked when the endpoint goes away.
#[derive(Debug)]
pub struct RendezvousEndpoint {
    listener: Option<UnixListener>,
    path: PathBuf,
}

impl RendezvousEndpoint {
    /// Bind and listen at `path`, replacing a stale socket left by an earlier run.
    ///
    /// Anything at `path` that is not a socket is left alone and binding fails.
    pub fn bind(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        remove_stale_socket(&path)?;

        let listener = UnixListener::bind(&path).map_err(|e| Error::transport("bind", e))?;
        tracing::info!("Listening on {}", path.display());

        Ok(Self {
            listener: Some(listener),
            path,
        })
    }

    /// Rendezvous path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until one peer connects.
    pub fn accept_one(&self) -> Result<UnixChannel> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            Error::transport(
                "accept",
                io::Error::new(io::ErrorKind::NotConnected, "endpoint already closed"),
            )
        })?;
        let (stream, _) = listener.accept().map_err(|e| Error::transport("accept", e))?;
        tracing::info!("Accepted connection on {}", self.path.display());
        Ok(UnixChannel::new(stream))
    }

    /// Stop listening and unlink the socket file. Calling it again is a no-op.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.listener.take().is_none() {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::transport("unlink", e)),
        }
    }
}

impl Drop for RendezvousEndpoint {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::transport("stat", e)),
        Ok(meta) if meta.file_type().is_socket() => {
            fs::remove_file(path).map_err(|e| Error::transport("unlink", e))?;
            tracing::debug!("Removed stale socket {}", path.display());
            Ok(())
        }
        Ok(_) => Err(Error::config(format!(
            "{} exists and is not a socket",
            path.display()
        ))),
    }
}

fn close_channel(channel: &mut UnixChannel) {
    if let Err(e) = channel.close() {
        tracing::warn!("Failed to close channel: {}", e);
    }
}

fn apply_timeout(channel: &UnixChannel, config: &SessionConfig) -> Result<()> {
    channel
        .set_timeout(config.options.io_timeout)
        .map_err(|e| Error::transport("set timeout", e))
}

/// Run the acceptor role once on a fresh endpoint at the configured path.
///
/// The local identity and its credential are settled before the socket is bound.
pub fn serve<E: SecurityEngine>(config: &SessionConfig, engine: &E) -> Result<NegotiationOutcome> {
    config.validate()?;
    let driver = AcceptorDriver::new(engine, config.name.as_deref())?;
    let mut endpoint = RendezvousEndpoint::bind(&config.socket_path)?;

    let result = accept_and_run(&endpoint, driver, config, engine);
    if let Err(e) = endpoint.cleanup() {
        tracing::warn!("Failed to remove {}: {}", endpoint.path().display(), e);
    }
    result
}

/// Accept one connection on `endpoint` and run the acceptor role on it.
///
/// Identity or credential failures are reported without waiting for a peer.
pub fn serve_on<E: SecurityEngine>(
    endpoint: &RendezvousEndpoint,
    config: &SessionConfig,
    engine: &E,
) -> Result<NegotiationOutcome> {
    let driver = AcceptorDriver::new(engine, config.name.as_deref())?;
    accept_and_run(endpoint, driver, config, engine)
}

fn accept_and_run<E: SecurityEngine>(
    endpoint: &RendezvousEndpoint,
    driver: AcceptorDriver<E>,
    config: &SessionConfig,
    engine: &E,
) -> Result<NegotiationOutcome> {
    let mut channel = endpoint.accept_one()?;

    let result = apply_timeout(&channel, config)
        .and_then(|()| driver.run(engine, &mut channel, &config.options));
    close_channel(&mut channel);
    result
}

/// Connect to the configured path and run the initiator role.
///
/// A bad target name or a missing endpoint fails before any connection attempt.
pub fn connect<E: SecurityEngine>(
    config: &SessionConfig,
    engine: &E,
) -> Result<NegotiationOutcome> {
    config.validate()?;
    let driver = InitiatorDriver::new(engine, config.name.as_deref())?;

    let path = &config.socket_path;
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NoSuchEndpoint(path.clone()));
        }
        Err(e) => return Err(Error::transport("stat", e)),
        Ok(_) => {}
    }

    tracing::info!("Connecting..");
    let mut channel = UnixChannel::connect(path).map_err(|e| Error::transport("connect", e))?;
    tracing::info!("Connected.");

    let result = apply_timeout(&channel, config)
        .and_then(|()| driver.run(engine, &mut channel, &config.options));
    close_channel(&mut channel);
    result
}

/// Run whichever role `config` names.
pub fn run<E: SecurityEngine>(config: &SessionConfig, engine: &E) -> Result<NegotiationOutcome> {
    match config.role {
        Role::Acceptor => serve(config, engine),
        Role::Initiator => connect(config, engine),
    }
}
