// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Deployment package streaming: chunked download to the agent with
//! progress frames back.

use crate::error::TransportError;
use crate::transport::Transport;
use convoy_core::{AgentId, Clock};
use convoy_wire::{encode_chunk_bytes, CoordinatorFrame, DeployStatus, DeploymentProgress};
use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::sync::mpsc;

impl<C: Clock + 'static> Transport<C> {
    /// Stream a package to an agent and follow its progress to a
    /// terminal phase.
    ///
    /// The package is verified against the content-addressed reference
    /// before a single chunk leaves the coordinator; the agent verifies
    /// the assembled bytes again on its side.
    pub async fn deploy_service(
        &self,
        agent: AgentId,
        service: &str,
        version: &str,
        package_path: &Path,
        sha256: &str,
    ) -> Result<DeploymentProgress, TransportError> {
        if self.inner.registry.get(&agent).is_none() {
            return Err(TransportError::NotRegistered(agent));
        }
        let session = self
            .inner
            .sessions
            .lock()
            .get(&agent)
            .cloned()
            .ok_or(TransportError::NotConnected(agent))?;

        let bytes = tokio::fs::read(package_path).await?;
        let digest = format!("{:x}", Sha256::digest(&bytes));
        if digest != sha256.to_lowercase() {
            return Err(TransportError::Package(format!(
                "package {} does not match its reference checksum",
                package_path.display()
            )));
        }

        let (tx, mut rx) = mpsc::channel::<DeploymentProgress>(32);
        let key = (agent, service.to_string());
        self.inner.deploy_waiters.lock().insert(key.clone(), tx);
        let result = self
            .stream_and_follow(&session, agent, service, version, &bytes, sha256, &mut rx)
            .await;
        self.inner.deploy_waiters.lock().remove(&key);
        result
    }

    async fn stream_and_follow(
        &self,
        session: &mpsc::Sender<CoordinatorFrame>,
        agent: AgentId,
        service: &str,
        version: &str,
        bytes: &[u8],
        sha256: &str,
        progress_rx: &mut mpsc::Receiver<DeploymentProgress>,
    ) -> Result<DeploymentProgress, TransportError> {
        let total_size = bytes.len() as u64;
        let chunk_size = self.inner.config.deploy_chunk_bytes.max(1);
        for (index, chunk) in bytes.chunks(chunk_size).enumerate() {
            let frame = CoordinatorFrame::DeployChunk {
                service_name: service.to_string(),
                version: version.to_string(),
                offset: (index * chunk_size) as u64,
                total_size,
                bytes: encode_chunk_bytes(chunk),
                sha256: sha256.to_string(),
            };
            if session.send(frame).await.is_err() {
                return Err(TransportError::NotConnected(agent));
            }
        }
        tracing::info!(
            %agent,
            service,
            version,
            bytes = total_size,
            "package streamed, awaiting progress"
        );

        let deadline = tokio::time::Instant::now() + self.inner.config.deploy_timeout();
        loop {
            let progress = tokio::time::timeout_at(deadline, progress_rx.recv()).await;
            match progress {
                Ok(Some(progress)) => {
                    tracing::debug!(%agent, service, status = %progress.status, "deploy progress");
                    if matches!(progress.status, DeployStatus::HealthOk | DeployStatus::Failed) {
                        return Ok(progress);
                    }
                }
                Ok(None) => return Err(TransportError::NotConnected(agent)),
                Err(_) => {
                    let abort = CoordinatorFrame::DeployAbort {
                        service_name: service.to_string(),
                        reason: "deploy deadline exceeded".to_string(),
                    };
                    let _ = session.send(abort).await;
                    return Err(TransportError::Timeout);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "deploy_tests.rs"]
mod tests;
