//! Account records and the `AccountStore` boundary (§6 "Persisted state").
//!
//! The HTTP auth surface and the real database backends are external
//! collaborators (spec §1); `AccountStore` is the trait boundary the room
//! runtime consumes, with an in-memory implementation for tests and small
//! deployments standing in for "two interchangeable backends."

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::AccountError;

pub const TRACKER_COUNT: usize = 12;

/// Spec §6: `{username, xp, trackers{12 numeric counters}, achievements[],
/// infractions[[reason, count]...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub xp: u64,
    pub trackers: [u64; TRACKER_COUNT],
    pub achievements: Vec<String>,
    pub infractions: Vec<(String, u32)>,
}

impl Account {
    pub fn new(username: impl Into<String>) -> Self {
        Account {
            username: username.into(),
            xp: 0,
            trackers: [0; TRACKER_COUNT],
            achievements: Vec::new(),
            infractions: Vec::new(),
        }
    }

    /// Record a kick reason in this account's infraction list: increment
    /// the existing entry's count, or push a new one (spec §4.4 Kick).
    pub fn record_infraction(&mut self, reason: &str) {
        match self.infractions.iter_mut().find(|(r, _)| r == reason) {
            Some((_, count)) => *count += 1,
            None => self.infractions.push((reason.to_string(), 1)),
        }
    }
}

/// The core never mutates trackers during play (spec §9 Open Questions:
/// write policy undefined); this exists so a future feature can opt in
/// explicitly rather than the core guessing a policy.
pub fn bump_tracker(account: &mut Account, index: usize, amount: u64) {
    if let Some(slot) = account.trackers.get_mut(index) {
        *slot = slot.saturating_add(amount);
    }
}

/// The account database is one of the two external, interchangeable
/// backends spec §1 places out of scope; this trait is the boundary the
/// room runtime calls through. Kept synchronous rather than `async fn` in
/// trait so it stays object-safe for a `dyn AccountStore` — a real backend
/// would still do its own blocking I/O behind `tokio::task::spawn_blocking`
/// or an internal async client.
pub trait AccountStore: Send + Sync {
    fn load(&self, username: &str) -> Result<Account, AccountError>;
    fn save(&self, account: &Account) -> Result<(), AccountError>;
}

/// In-memory account store. Accounts auto-vivify on first load so the room
/// runtime and its tests don't need a seeded database.
#[derive(Default)]
pub struct InMemoryAccountStore {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&mut self, account: Account) {
        self.accounts.get_mut().expect("account store lock poisoned").insert(account.username.clone(), account);
    }
}

impl AccountStore for InMemoryAccountStore {
    fn load(&self, username: &str) -> Result<Account, AccountError> {
        let accounts = self.accounts.read().expect("account store lock poisoned");
        Ok(accounts.get(username).cloned().unwrap_or_else(|| Account::new(username)))
    }

    fn save(&self, account: &Account) -> Result<(), AccountError> {
        let mut accounts = self.accounts.write().expect("account store lock poisoned");
        accounts.insert(account.username.clone(), account.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_auto_vivifies_unknown_account() {
        let store = InMemoryAccountStore::new();
        let account = store.load("newplayer").unwrap();
        assert_eq!(account.username, "newplayer");
        assert_eq!(account.xp, 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = InMemoryAccountStore::new();
        let mut account = store.load("alice").unwrap();
        account.xp = 500;
        account.record_infraction("client_too_fast");
        store.save(&account).unwrap();

        let reloaded = store.load("alice").unwrap();
        assert_eq!(reloaded.xp, 500);
        assert_eq!(reloaded.infractions, vec![("client_too_fast".to_string(), 1)]);
    }

    #[test]
    fn record_infraction_increments_existing_reason() {
        let mut account = Account::new("bob");
        account.record_infraction("bad_modifiers");
        account.record_infraction("bad_modifiers");
        assert_eq!(account.infractions, vec![("bad_modifiers".to_string(), 2)]);
    }
}
