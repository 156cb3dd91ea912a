// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for accepting agent connections.
//!
//! Runs in a spawned task, accepting TCP and Unix connections and
//! handling each in its own session task without blocking the engine.

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::session::{run_session, ConnectionSource};
use crate::transport::Transport;
use convoy_core::Clock;
use std::sync::Arc;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;

/// Accepts agent connections for a [`Transport`].
pub struct Listener<C: Clock> {
    transport: Transport<C>,
    tcp: TcpListener,
    unix: Option<UnixListener>,
}

impl<C: Clock + 'static> Listener<C> {
    /// Bind per the transport's configuration. Refuses non-loopback
    /// binds without TLS termination or an explicit override.
    pub async fn bind(transport: Transport<C>) -> Result<Self, TransportError> {
        let config: &TransportConfig = &transport.inner.config;
        config.validate().map_err(TransportError::Config)?;

        let tcp = TcpListener::bind(&config.bind_addr).await?;
        tracing::info!(addr = %config.bind_addr, "agent transport listening");

        let unix = match &config.unix_socket_path {
            Some(path) => {
                // A stale socket file from a previous run blocks binding.
                let _ = std::fs::remove_file(path);
                let listener = UnixListener::bind(path)?;
                tracing::info!(path = %path.display(), "agent transport listening (unix)");
                Some(listener)
            }
            None => None,
        };
        Ok(Self { transport, tcp, unix })
    }

    /// Accept until cancelled, spawning a session task per connection.
    pub async fn run(self, cancel: CancellationToken) {
        let inner = Arc::clone(&self.transport.inner);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("agent transport draining");
                    return;
                }
                accepted = self.tcp.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            tracing::debug!(%addr, "agent connection");
                            let inner = Arc::clone(&inner);
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                run_session(inner, stream, ConnectionSource::Tcp, cancel).await;
                            });
                        }
                        Err(e) => tracing::error!(error = %e, "tcp accept error"),
                    }
                }
                accepted = accept_unix(self.unix.as_ref()) => {
                    match accepted {
                        Ok(stream) => {
                            let inner = Arc::clone(&inner);
                            let cancel = cancel.clone();
                            tokio::spawn(async move {
                                run_session(inner, stream, ConnectionSource::Unix, cancel).await;
                            });
                        }
                        Err(e) => tracing::error!(error = %e, "unix accept error"),
                    }
                }
            }
        }
    }
}

/// Accept from the Unix socket when configured; pend forever otherwise
/// so the select stays balanced.
async fn accept_unix(
    listener: Option<&UnixListener>,
) -> Result<tokio::net::UnixStream, std::io::Error> {
    match listener {
        Some(listener) => listener.accept().await.map(|(stream, _)| stream),
        None => std::future::pending().await,
    }
}
