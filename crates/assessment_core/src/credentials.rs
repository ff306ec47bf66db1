//! crates/assessment_core/src/credentials.rs
//!
//! The process-wide pool of provider credentials and its rotation cursor.

use chrono::{DateTime, Duration, Utc};
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// A single provider credential. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub id: String,
    pub api_key: String,
}

impl Credential {
    pub fn new(id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            api_key: api_key.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("id", &self.id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("A credential pool needs at least one credential")]
pub struct EmptyPoolError;

/// The credential a caller should use for its next attempt.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    pub slot: usize,
    pub credential: Credential,
}

#[derive(Debug)]
struct CredentialSlot {
    credential: Credential,
    exhausted_until: Option<DateTime<Utc>>,
    last_used_at: Option<DateTime<Utc>>,
}

impl CredentialSlot {
    fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        self.exhausted_until.is_some_and(|until| until > now)
    }
}

#[derive(Debug)]
struct PoolState {
    slots: Vec<CredentialSlot>,
    cursor: usize,
}

/// Round-robin pool of credentials. The cursor and slot state sit behind a
/// single mutex so `current` and `rotate` always observe the same cursor.
#[derive(Debug)]
pub struct CredentialPool {
    state: Mutex<PoolState>,
}

impl CredentialPool {
    pub fn new(credentials: Vec<Credential>) -> Result<Self, EmptyPoolError> {
        if credentials.is_empty() {
            return Err(EmptyPoolError);
        }
        let slots = credentials
            .into_iter()
            .map(|credential| CredentialSlot {
                credential,
                exhausted_until: None,
                last_used_at: None,
            })
            .collect();
        Ok(Self {
            state: Mutex::new(PoolState { slots, cursor: 0 }),
        })
    }

    /// Number of credentials, fixed at construction.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    /// Returns the credential at the rotation cursor and stamps its last use.
    pub fn current(&self) -> CredentialLease {
        let mut state = self.lock();
        let slot = state.cursor;
        let entry = &mut state.slots[slot];
        entry.last_used_at = Some(Utc::now());
        CredentialLease {
            slot,
            credential: entry.credential.clone(),
        }
    }

    /// Marks `failed_slot` as exhausted for `cooldown` and advances the cursor past it.
    ///
    /// The cursor only moves if it still points at `failed_slot`; a concurrent
    /// request that already rotated away from the same credential wins.
    pub fn rotate(&self, failed_slot: usize, cooldown: Duration) {
        let now = Utc::now();
        let mut state = self.lock();
        let len = state.slots.len();
        if let Some(slot) = state.slots.get_mut(failed_slot) {
            slot.exhausted_until = Some(now + cooldown);
        }
        if state.cursor != failed_slot {
            return;
        }

        let next = (1..=len)
            .map(|step| (failed_slot + step) % len)
            .find(|&idx| !state.slots[idx].is_cooling_down(now))
            .unwrap_or((failed_slot + 1) % len);
        state.cursor = next;

        warn!(
            from = %state.slots[failed_slot].credential.id,
            to = %state.slots[next].credential.id,
            "Rotated generation credential after quota exhaustion"
        );
    }

    /// Last time each credential was handed out, in pool order.
    pub fn last_used(&self) -> Vec<(String, Option<DateTime<Utc>>)> {
        self.lock()
            .slots
            .iter()
            .map(|s| (s.credential.id.clone(), s.last_used_at))
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // The state is always left consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
