// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted per-command entries.

use convoy_core::{AgentId, CommandId, ServerStepState};
use serde::{Deserialize, Serialize};

/// One issued command, persisted under `workflow:{id}:pending:{command}`
/// until it reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommand {
    pub command_id: CommandId,
    pub agent_id: AgentId,
    pub phase_index: usize,
    pub step_index: usize,
    pub state: ServerStepState,
    pub issued_at_ms: u64,
    pub attempt: u32,
}

impl PendingCommand {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
