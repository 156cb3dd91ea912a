// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection session: handshake, frame dispatch, outbound push.

use crate::transport::TransportInner;
use convoy_core::{AgentId, AgentInfo, AgentStatus, Clock, ServiceRecord};
use convoy_fabric::MessageProps;
use convoy_wire::{
    read_frame, write_frame, AgentRequest, CoordinatorFrame, DiscoveredService, ErrorCode,
    HeartbeatResponse, MetricsSummary, ProtocolError, RegistrationResponse,
    ServiceDiscoveryResponse, PROTOCOL_VERSION,
};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Where a connection came from; local sockets are trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionSource {
    Unix,
    Tcp,
}

/// Drive one agent connection until it closes or is cancelled.
///
/// The first frame must be `Hello`; auth or protocol failures terminate
/// the connection with a typed error frame and mutate nothing.
pub(crate) async fn run_session<C, S>(
    inner: Arc<TransportInner<C>>,
    stream: S,
    source: ConnectionSource,
    cancel: CancellationToken,
) where
    C: Clock + 'static,
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let read_timeout = inner.config.read_timeout();

    // Handshake.
    let hello: AgentRequest = match read_frame(&mut reader, read_timeout).await {
        Ok(frame) => frame,
        Err(e) => {
            log_session_error(e);
            return;
        }
    };
    match hello {
        AgentRequest::Hello { token, protocol_version } => {
            if protocol_version != PROTOCOL_VERSION {
                let _ = write_frame(
                    &mut writer,
                    &CoordinatorFrame::error(
                        ErrorCode::Unsupported,
                        format!("protocol {protocol_version} unsupported"),
                    ),
                )
                .await;
                return;
            }
            if !authorized(&inner, source, &token) {
                let _ = write_frame(
                    &mut writer,
                    &CoordinatorFrame::error(ErrorCode::Unauthorized, "bad token"),
                )
                .await;
                return;
            }
        }
        other => {
            tracing::warn!(frame = other.name(), "connection opened without hello");
            let _ = write_frame(
                &mut writer,
                &CoordinatorFrame::error(ErrorCode::Malformed, "hello required"),
            )
            .await;
            return;
        }
    }
    if write_frame(&mut writer, &CoordinatorFrame::HelloOk { settings: Default::default() })
        .await
        .is_err()
    {
        return;
    }

    // Session proper. A dedicated writer task owns the write half so the
    // read loop never races a partially read frame against outbound
    // pushes; responses and pushes all flow through `out_tx`.
    let (out_tx, mut out_rx) = mpsc::channel::<CoordinatorFrame>(64);
    let writer_task = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    });
    let mut agent_id: Option<AgentId> = None;
    let mut metrics_batches: u64 = 0;
    let mut metrics_accepted: u64 = 0;

    loop {
        let frame = tokio::select! {
            _ = cancel.cancelled() => break,
            frame = read_frame::<_, AgentRequest>(&mut reader, read_timeout) => frame,
        };
        let request = match frame {
            Ok(request) => request,
            Err(e) => {
                log_session_error(e);
                break;
            }
        };

        let response = match request {
            AgentRequest::Hello { .. } => {
                Some(CoordinatorFrame::error(ErrorCode::Malformed, "duplicate hello"))
            }
            AgentRequest::Register(registration) => {
                let info = AgentInfo {
                    id: AgentId::issue(),
                    hostname: registration.hostname.clone(),
                    ip_address: registration.ip_address,
                    os_type: registration.os_type,
                    os_version: registration.os_version,
                    agent_version: registration.agent_version,
                    cpu_cores: registration.cpu_cores,
                    total_memory_mb: registration.total_memory_mb,
                    location: registration.location,
                    environment: registration.environment,
                    tags: registration.tags,
                    status: AgentStatus::Unknown,
                    last_heartbeat_ms: 0,
                };
                let id = inner.registry.upsert(info);
                agent_id = Some(id);
                inner.sessions.lock().insert(id, out_tx.clone());
                tracing::info!(hostname = %registration.hostname, agent = %id, "agent registered");
                Some(CoordinatorFrame::Registered(RegistrationResponse {
                    success: true,
                    server_id: Some(id),
                    message: "registered".to_string(),
                    settings: Default::default(),
                }))
            }
            AgentRequest::Heartbeat(heartbeat) => {
                match inner.registry.mark_heartbeat(&heartbeat.server_id) {
                    Ok(()) => {
                        let pending = {
                            let mut piggyback = inner.piggyback.lock();
                            let queue = piggyback.entry(heartbeat.server_id).or_default();
                            let take = queue.len().min(inner.config.max_piggyback_commands);
                            queue.drain(..take).collect()
                        };
                        Some(CoordinatorFrame::HeartbeatAck(HeartbeatResponse {
                            success: true,
                            message: "ok".to_string(),
                            pending_commands: pending,
                        }))
                    }
                    Err(_) => Some(CoordinatorFrame::error(
                        ErrorCode::NotRegistered,
                        heartbeat.server_id.to_string(),
                    )),
                }
            }
            AgentRequest::ReportServices(discovery) => {
                let services: Vec<ServiceRecord> =
                    discovery.services.into_iter().map(to_service_record).collect();
                match inner.registry.report_services(&discovery.server_id, services) {
                    Ok(()) => Some(CoordinatorFrame::ServicesAck(ServiceDiscoveryResponse {
                        success: true,
                        message: "snapshot applied".to_string(),
                    })),
                    Err(_) => Some(CoordinatorFrame::error(
                        ErrorCode::NotRegistered,
                        discovery.server_id.to_string(),
                    )),
                }
            }
            AgentRequest::Metrics(batch) => {
                if inner.registry.get(&batch.server_id).is_none() {
                    Some(CoordinatorFrame::error(
                        ErrorCode::NotRegistered,
                        batch.server_id.to_string(),
                    ))
                } else {
                    metrics_batches += 1;
                    metrics_accepted += batch.metrics.len() as u64;
                    let routing_key = format!("metrics.{}", batch.server_id);
                    match serde_json::to_vec(&batch) {
                        Ok(payload) => {
                            if let Err(e) = inner
                                .fabric
                                .publish(&routing_key, payload, MessageProps::default())
                                .await
                            {
                                tracing::warn!(error = %e, "metrics publish failed");
                            }
                        }
                        Err(e) => tracing::error!(error = %e, "metrics serialization failed"),
                    }
                    Some(CoordinatorFrame::MetricsAck(MetricsSummary {
                        accepted: metrics_accepted,
                        batches: metrics_batches,
                    }))
                }
            }
            AgentRequest::CommandResult(result) => {
                let waiter = inner.command_waiters.lock().remove(&result.command_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => {
                        tracing::debug!(command = %result.command_id, "result without waiter")
                    }
                }
                None
            }
            AgentRequest::DeployProgress { service_name, progress } => {
                if let Some(id) = agent_id {
                    let route = inner.deploy_waiters.lock().get(&(id, service_name)).cloned();
                    if let Some(route) = route {
                        let _ = route.send(progress).await;
                    }
                }
                None
            }
            AgentRequest::RollbackResult(result) => {
                if let Some(id) = agent_id {
                    if let Some(tx) = inner.rollback_waiters.lock().remove(&id) {
                        let _ = tx.send(result);
                    }
                }
                None
            }
            AgentRequest::Bye => break,
        };

        if let Some(frame) = response {
            if out_tx.send(frame).await.is_err() {
                break;
            }
        }
    }

    if let Some(id) = agent_id {
        inner.sessions.lock().remove(&id);
        tracing::info!(agent = %id, "agent session closed");
    }
    drop(out_tx);
    writer_task.abort();
}

fn log_session_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => tracing::debug!("agent disconnected"),
        ProtocolError::Timeout => tracing::warn!("agent connection timed out"),
        other => tracing::error!(error = %other, "session error"),
    }
}

fn authorized<C: Clock>(
    inner: &TransportInner<C>,
    source: ConnectionSource,
    token: &str,
) -> bool {
    match (&inner.config.auth_token, source) {
        // Local Unix socket is trusted.
        (_, ConnectionSource::Unix) => true,
        (Some(expected), ConnectionSource::Tcp) => token == expected,
        (None, ConnectionSource::Tcp) => true,
    }
}

fn to_service_record(service: DiscoveredService) -> ServiceRecord {
    ServiceRecord {
        name: service.name,
        display_name: service.display_name,
        version: service.version,
        status: service.status,
        process_id: service.process_id,
        port: service.port,
        executable_path: service.executable_path,
        working_directory: service.working_directory,
        config_file_path: service.config_file_path,
        startup_type: service.startup_type,
        service_account: service.service_account,
        last_start_time_ms: service.last_start_time_ms,
        is_active: service.is_active,
        missed_reports: 0,
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
