use std::collections::HashSet;
use std::sync::Mutex;

use tracing::info;

/// Process-wide set of redeemed token strings, guarding against replays.
///
/// The whole signed token is stored, not just an id, since tokens are
/// single-use bearer credentials. Memory is bounded by clearing the entire set
/// once it crosses `capacity`; a clear can re-admit a recently redeemed,
/// still-unexpired token, so the exposure window is at most the token TTL.
///
/// Injected as explicit state rather than a global so tests run in isolation.
/// Correct for a single instance only; multi-instance deployments need a
/// shared backing store.
pub struct ReplayGuard {
    tokens: Mutex<HashSet<String>>,
    capacity: usize,
}

impl ReplayGuard {
    pub fn new(capacity: usize) -> ReplayGuard {
        ReplayGuard {
            tokens: Mutex::new(HashSet::new()),
            capacity,
        }
    }

    pub fn seen(&self, token: &str) -> bool {
        self.lock().contains(token)
    }

    /// Atomic check-and-insert: returns true iff this call consumed the token.
    /// Two concurrent redemptions of the same token cannot both win.
    pub fn try_consume(&self, token: &str) -> bool {
        let mut tokens = self.lock();
        let consumed = tokens.insert(token.to_string());
        if consumed {
            Self::enforce_capacity(&mut tokens, self.capacity);
        }
        consumed
    }

    /// Un-consumes a token after a failed persist so a client retry is not
    /// falsely rejected as a duplicate.
    pub fn release(&self, token: &str) {
        self.lock().remove(token);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn enforce_capacity(tokens: &mut HashSet<String>, capacity: usize) {
        if tokens.len() > capacity {
            info!(count = tokens.len(), "clearing replay guard token set");
            tokens.clear();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A poisoned lock must not take down the tracking path.
        self.tokens.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumes_each_token_once() {
        let guard = ReplayGuard::new(100);

        assert!(!guard.seen("token-a"));
        assert!(guard.try_consume("token-a"));
        assert!(guard.seen("token-a"));
        assert!(!guard.try_consume("token-a"));
    }

    #[test]
    fn released_tokens_can_be_consumed_again() {
        let guard = ReplayGuard::new(100);

        assert!(guard.try_consume("token-a"));
        guard.release("token-a");
        assert!(!guard.seen("token-a"));
        assert!(guard.try_consume("token-a"));
    }

    #[test]
    fn clears_everything_past_capacity() {
        let guard = ReplayGuard::new(3);

        for i in 0..3 {
            assert!(guard.try_consume(&format!("token-{}", i)));
        }
        assert_eq!(guard.len(), 3);

        // The insert that crosses the high-water mark wipes the whole set,
        // including itself.
        assert!(guard.try_consume("token-3"));
        assert_eq!(guard.len(), 0);
        assert!(!guard.seen("token-0"));
        assert!(!guard.seen("token-3"));
    }

    #[test]
    fn concurrent_consumers_race_to_a_single_winner() {
        use std::sync::Arc;

        let guard = Arc::new(ReplayGuard::new(100));
        let mut handles = vec![];
        for _ in 0..8 {
            let guard = Arc::clone(&guard);
            handles.push(std::thread::spawn(move || guard.try_consume("token-a")));
        }

        let winners: usize = handles
            .into_iter()
            .map(|handle| handle.join().unwrap() as usize)
            .sum();

        assert_eq!(winners, 1);
    }
}
