//! Latest-request-wins staleness tracking.
//!
//! Each logical request key (e.g. "load week 12") remembers the token of
//! its most recent request. A response whose token is no longer current
//! was superseded and must not be applied.

use parking_lot::Mutex;
use std::collections::HashMap;
use uuid::Uuid;

/// Token identifying one issued request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    key: String,
    id: Uuid,
}

impl RequestToken {
    /// Logical request key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Tracks the current request per key.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: Mutex<HashMap<String, Uuid>>,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a new request for `key`, superseding any earlier one.
    pub fn begin(&self, key: impl Into<String>) -> RequestToken {
        let token = RequestToken {
            key: key.into(),
            id: Uuid::new_v4(),
        };
        self.latest.lock().insert(token.key.clone(), token.id);
        token
    }

    /// Whether `token` is still the latest request of its key.
    pub fn is_current(&self, token: &RequestToken) -> bool {
        self.latest.lock().get(&token.key) == Some(&token.id)
    }

    /// Retires `token` if current. Returns whether it was current.
    pub fn finish(&self, token: &RequestToken) -> bool {
        let mut latest = self.latest.lock();
        if latest.get(&token.key) == Some(&token.id) {
            latest.remove(&token.key);
            true
        } else {
            false
        }
    }
}
