//! Bounded, per-tenant conversation history.
//!
//! History is an in-memory hint for the planner, not a durable log. Each
//! tenant gets its own ring buffer of at most [`MAX_TURNS`] turns so that
//! answers about one project never appear in another project's prompt.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tracing::warn;

use crate::models::{ConversationTurn, TenantId};

/// Hard upper bound on remembered turns per tenant.
pub const MAX_TURNS: usize = 10;

/// Process-wide store of per-tenant conversation turns.
pub struct ConversationContext {
    capacity: usize,
    turns: Mutex<HashMap<TenantId, VecDeque<ConversationTurn>>>,
}

impl ConversationContext {
    /// Creates a context keeping `capacity` turns per tenant, clamped to `1..=MAX_TURNS`.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.clamp(1, MAX_TURNS),
            turns: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Locks the turn map. A poisoned lock is recovered with its turns discarded.
    fn lock(&self) -> MutexGuard<'_, HashMap<TenantId, VecDeque<ConversationTurn>>> {
        self.turns.lock().unwrap_or_else(|poisoned| {
            warn!("conversation history lock poisoned; discarding remembered turns");
            self.turns.clear_poison();
            let mut turns = poisoned.into_inner();
            turns.clear();
            turns
        })
    }

    /// Oldest-first snapshot of a tenant's turns.
    pub fn snapshot(&self, tenant: &TenantId) -> Vec<ConversationTurn> {
        self.lock()
            .get(tenant)
            .map(|t| t.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Appends a turn, evicting the oldest ones beyond capacity.
    pub fn record(&self, tenant: &TenantId, turn: ConversationTurn) {
        let mut turns = self.lock();
        let entry = turns.entry(tenant.clone()).or_default();
        entry.push_back(turn);
        while entry.len() > self.capacity {
            entry.pop_front();
        }
    }

    pub fn len(&self, tenant: &TenantId) -> usize {
        self.lock().get(tenant).map_or(0, VecDeque::len)
    }

    pub fn clear(&self, tenant: &TenantId) {
        self.lock().remove(tenant);
    }
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new(MAX_TURNS)
    }
}

/// Renders turns for the planner prompt, or `None yet.` when empty.
pub fn render(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "None yet.".to_string();
    }
    turns
        .iter()
        .map(|t| format!("Q: {}\nA: {}", t.question, t.answer))
        .collect::<Vec<_>>()
        .join("\n")
}
