//! In-memory revocation list keyed by token id (`jti`)
//!
//! Entries only need to live until the token would have expired anyway, so
//! the periodic cleanup drops them once their expiry has passed.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use once_cell::sync::Lazy;
use tracing::{debug, info, warn};

/// Process-wide blacklist shared by the auth middleware and the logout handler
static TOKEN_BLACKLIST: Lazy<TokenBlacklist> = Lazy::new(TokenBlacklist::new);

/// Expiry and revocation time of one revoked token
#[derive(Debug, Clone, Copy)]
struct RevokedEntry {
    expires_at: SystemTime,
    revoked_at: SystemTime,
}

/// Thread-safe set of revoked token ids with a size bound
pub struct TokenBlacklist {
    revoked_tokens: Mutex<HashMap<String, RevokedEntry>>,
    max_size: usize,
}

impl Default for TokenBlacklist {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenBlacklist {
    /// Blacklist holding at most 10,000 tokens
    pub fn new() -> Self {
        Self::with_max_size(10_000)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            revoked_tokens: Mutex::new(HashMap::new()),
            max_size: max_size.max(1),
        }
    }

    // A panic while holding the lock leaves the map itself consistent.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, RevokedEntry>> {
        self.revoked_tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Revoke `token_id` until `expiration`.
    ///
    /// At capacity, expired entries are dropped first; if that is not enough
    /// the oldest half of the revocations is evicted.
    pub fn revoke_token(&self, token_id: &str, expiration: SystemTime) {
        let mut tokens = self.entries();

        if tokens.len() >= self.max_size && !tokens.contains_key(token_id) {
            warn!(
                "Token blacklist reached max size ({}), performing aggressive cleanup",
                self.max_size
            );
            purge_expired(&mut tokens, SystemTime::now());

            if tokens.len() >= self.max_size {
                evict_oldest(&mut tokens, (self.max_size / 2).max(1));
            }
        }

        tokens.insert(
            token_id.to_string(),
            RevokedEntry {
                expires_at: expiration,
                revoked_at: SystemTime::now(),
            },
        );
        info!("Token revoked: {}", token_id);
    }

    pub fn is_revoked(&self, token_id: &str) -> bool {
        self.entries().contains_key(token_id)
    }

    pub fn size(&self) -> usize {
        self.entries().len()
    }

    /// Remove entries whose token has expired, returning how many were removed
    pub fn cleanup_expired_tokens(&self) -> usize {
        purge_expired(&mut self.entries(), SystemTime::now())
    }
}

fn purge_expired(tokens: &mut HashMap<String, RevokedEntry>, now: SystemTime) -> usize {
    let before = tokens.len();
    tokens.retain(|_, entry| entry.expires_at > now);

    let removed = before - tokens.len();
    if removed > 0 {
        debug!("Removed {} expired tokens from blacklist", removed);
    }
    removed
}

fn evict_oldest(tokens: &mut HashMap<String, RevokedEntry>, count: usize) {
    let mut by_age: Vec<(String, SystemTime)> = tokens
        .iter()
        .map(|(id, entry)| (id.clone(), entry.revoked_at))
        .collect();
    by_age.sort_by_key(|(_, revoked_at)| *revoked_at);

    for (id, _) in by_age.into_iter().take(count) {
        tokens.remove(&id);
    }
    debug!("Removed {} oldest entries from token blacklist", count);
}

/// The global token blacklist
pub fn blacklist() -> &'static TokenBlacklist {
    &TOKEN_BLACKLIST
}

/// Spawn the hourly cleanup of the global blacklist
pub fn start_cleanup_task() -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));

        loop {
            interval.tick().await;
            let removed = blacklist().cleanup_expired_tokens();
            debug!(
                "Removed {} expired tokens, {} remain in blacklist",
                removed,
                blacklist().size()
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_revoke_and_check_token() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke_token("jti-1", SystemTime::now() + Duration::from_secs(60));

        assert!(blacklist.is_revoked("jti-1"));
        assert!(!blacklist.is_revoked("jti-2"));
    }

    #[test]
    fn test_cleanup_expired_tokens() {
        let blacklist = TokenBlacklist::new();
        blacklist.revoke_token("expired", SystemTime::now() - Duration::from_secs(1));
        blacklist.revoke_token("live", SystemTime::now() + Duration::from_secs(60));
        assert_eq!(blacklist.size(), 2);

        assert_eq!(blacklist.cleanup_expired_tokens(), 1);
        assert!(!blacklist.is_revoked("expired"));
        assert!(blacklist.is_revoked("live"));
    }

    #[test]
    fn test_full_blacklist_evicts_oldest_half() {
        let blacklist = TokenBlacklist::with_max_size(4);
        for i in 0..4 {
            blacklist.revoke_token(&format!("jti-{}", i), SystemTime::now() + Duration::from_secs(300));
            sleep(Duration::from_millis(5));
        }

        blacklist.revoke_token("newest", SystemTime::now() + Duration::from_secs(300));

        assert_eq!(blacklist.size(), 3);
        assert!(!blacklist.is_revoked("jti-0"));
        assert!(!blacklist.is_revoked("jti-1"));
        assert!(blacklist.is_revoked("jti-3"));
        assert!(blacklist.is_revoked("newest"));
    }

    #[test]
    fn test_full_blacklist_prefers_dropping_expired() {
        let blacklist = TokenBlacklist::with_max_size(2);
        blacklist.revoke_token("stale", SystemTime::now() - Duration::from_secs(5));
        blacklist.revoke_token("fresh", SystemTime::now() + Duration::from_secs(300));

        blacklist.revoke_token("another", SystemTime::now() + Duration::from_secs(300));

        assert!(!blacklist.is_revoked("stale"));
        assert!(blacklist.is_revoked("fresh"));
        assert!(blacklist.is_revoked("another"));
    }
}
