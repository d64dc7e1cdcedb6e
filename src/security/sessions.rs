//! Session tokens.
//!
//! A session maps a random token to a snapshot of the user it was issued
//! for. Sessions expire after a period without use; every successful
//! lookup restarts that period.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::users::User;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20 * 60);


/// Who is making a request. Taken from the user store at login and never
/// changed afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub name: String,
    pub roles: Vec<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Principal {
            id: user.id,
            name: user.name.clone(),
            roles: user.roles.clone(),
        }
    }
}


struct Entry {
    principal: Principal,
    last_access: Instant,
}

pub struct SessionCache {
    timeout: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for SessionCache {
    fn default() -> Self {
        SessionCache::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl SessionCache {
    pub fn with_timeout(timeout: Duration) -> Self {
        SessionCache {
            timeout,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Starts a session and returns its token.
    pub fn create(&self, principal: Principal) -> String {
        self.create_at(principal, Instant::now())
    }

    pub fn create_at(&self, principal: Principal, now: Instant) -> String {
        let token = new_token();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        let timeout = self.timeout;
        let before = entries.len();
        entries.retain(|_, entry| !is_expired(entry, now, timeout));
        if entries.len() < before {
            log::debug!("Purged {} expired sessions", before - entries.len());
        }

        log::debug!("Starting session for {}", principal.name);
        entries.insert(token.clone(), Entry { principal, last_access: now });
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Principal> {
        self.resolve_at(token, Instant::now())
    }

    pub fn resolve_at(&self, token: &str, now: Instant) -> Option<Principal> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());

        match entries.get_mut(token) {
            None => return None,
            Some(entry) if !is_expired(entry, now, self.timeout) => {
                entry.last_access = now;
                return Some(entry.principal.clone());
            }
            Some(_) => {}
        }

        if let Some(entry) = entries.remove(token) {
            log::debug!("Session for {} expired", entry.principal.name);
        }
        None
    }

    pub fn invalidate(&self, token: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.remove(token) {
            log::debug!("Ended session for {}", entry.principal.name);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn is_expired(entry: &Entry, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(entry.last_access) > timeout
}

/// 128 random bits as lowercase hex.
fn new_token() -> String {
    format!("{:032x}", rand::random::<u128>())
}
