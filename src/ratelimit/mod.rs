use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub mod middleware;

#[derive(Copy, Clone, Debug)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

/// Per-path request quotas. Lookups try an exact path match first, then the
/// longest configured prefix, then fall back to the default rule.
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    rules: Vec<(String, RateLimitRule)>,
    default_rule: RateLimitRule,
}

impl RateLimitConfig {
    pub fn new(rules: Vec<(String, RateLimitRule)>, default_rule: RateLimitRule) -> RateLimitConfig {
        RateLimitConfig {
            rules,
            default_rule,
        }
    }

    pub fn rule_for(&self, path: &str) -> RateLimitRule {
        if let Some((_, rule)) = self.rules.iter().find(|(p, _)| p == path) {
            return *rule;
        }
        self.rules
            .iter()
            .filter(|(p, _)| path.starts_with(p.as_str()))
            .max_by_key(|(p, _)| p.len())
            .map(|(_, rule)| *rule)
            .unwrap_or(self.default_rule)
    }
}

impl Default for RateLimitConfig {
    fn default() -> RateLimitConfig {
        let minute = Duration::from_secs(60);
        RateLimitConfig {
            rules: vec![
                (
                    "/ads/request".to_string(),
                    RateLimitRule {
                        max_requests: 100,
                        window: minute,
                    },
                ),
                (
                    "/ads/tracking/impression".to_string(),
                    RateLimitRule {
                        max_requests: 200,
                        window: minute,
                    },
                ),
                (
                    "/ads/tracking/click".to_string(),
                    RateLimitRule {
                        max_requests: 200,
                        window: minute,
                    },
                ),
            ],
            default_rule: RateLimitRule {
                max_requests: 1000,
                window: minute,
            },
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub retry_after_seconds: u64,
}

struct WindowCounter {
    count: u32,
    window_start: Instant,
}

/// Fixed-window counters keyed by client and path. A window admits up to the
/// rule's quota, then rejects until the window rolls over; the first request
/// after rollover starts a fresh window. State is per process.
pub struct RateLimiter {
    config: RateLimitConfig,
    counters: Mutex<HashMap<(String, String), WindowCounter>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> RateLimiter {
        RateLimiter {
            config,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn allow(&self, client: &str, path: &str) -> RateLimitDecision {
        let rule = self.config.rule_for(path);
        let now = Instant::now();

        let mut counters = self.lock();
        let counter = counters
            .entry((client.to_string(), path.to_string()))
            .or_insert(WindowCounter {
                count: 0,
                window_start: now,
            });

        if now.duration_since(counter.window_start) >= rule.window {
            counter.count = 0;
            counter.window_start = now;
        }

        if counter.count >= rule.max_requests {
            let elapsed = now.duration_since(counter.window_start);
            let retry_after = rule.window.saturating_sub(elapsed).as_secs().max(1);
            return RateLimitDecision {
                allowed: false,
                limit: rule.max_requests,
                remaining: 0,
                retry_after_seconds: retry_after,
            };
        }

        counter.count += 1;
        RateLimitDecision {
            allowed: true,
            limit: rule.max_requests,
            remaining: rule.max_requests - counter.count,
            retry_after_seconds: 0,
        }
    }

    /// Drops counters idle for more than twice their window. Run periodically
    /// so abandoned clients do not accumulate forever.
    pub fn sweep(&self) -> usize {
        let mut counters = self.lock();
        let before = counters.len();
        let config = &self.config;
        counters.retain(|(_, path), counter| {
            counter.window_start.elapsed() <= config.rule_for(path).window * 2
        });
        let removed = before - counters.len();
        if removed > 0 {
            debug!(removed, "swept stale rate limit counters");
        }
        removed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), WindowCounter>> {
        // Favor availability over a poisoned counter map.
        self.counters
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    fn limiter(max_requests: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(
            vec![(
                "/ads/request".to_string(),
                RateLimitRule {
                    max_requests,
                    window,
                },
            )],
            RateLimitRule {
                max_requests: 1000,
                window: Duration::from_secs(60),
            },
        ))
    }

    #[test]
    fn counts_down_the_remaining_quota() {
        let limiter = limiter(3, Duration::from_secs(60));

        assert_eq!(limiter.allow("1.2.3.4", "/ads/request").remaining, 2);
        assert_eq!(limiter.allow("1.2.3.4", "/ads/request").remaining, 1);
        assert_eq!(limiter.allow("1.2.3.4", "/ads/request").remaining, 0);
    }

    #[test]
    fn rejects_past_the_quota_with_a_retry_hint() {
        let limiter = limiter(2, Duration::from_secs(60));
        limiter.allow("1.2.3.4", "/ads/request");
        limiter.allow("1.2.3.4", "/ads/request");

        let decision = limiter.allow("1.2.3.4", "/ads/request");

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        assert!(decision.retry_after_seconds >= 1);
        assert!(decision.retry_after_seconds <= 60);
    }

    #[test]
    fn clients_do_not_share_quotas() {
        let limiter = limiter(1, Duration::from_secs(60));
        assert!(limiter.allow("1.2.3.4", "/ads/request").allowed);

        assert!(!limiter.allow("1.2.3.4", "/ads/request").allowed);
        assert!(limiter.allow("5.6.7.8", "/ads/request").allowed);
    }

    #[test]
    fn quota_resets_when_the_window_rolls_over() {
        let limiter = limiter(1, Duration::from_millis(20));
        assert!(limiter.allow("1.2.3.4", "/ads/request").allowed);
        assert!(!limiter.allow("1.2.3.4", "/ads/request").allowed);

        thread::sleep(Duration::from_millis(25));

        assert!(limiter.allow("1.2.3.4", "/ads/request").allowed);
    }

    #[test]
    fn redirect_paths_match_the_click_prefix_rule() {
        let config = RateLimitConfig::default();

        let rule = config.rule_for("/ads/tracking/click/eyJhbGciOiJIUzI1NiJ9");

        assert_eq!(rule.max_requests, 200);
    }

    #[test]
    fn unconfigured_paths_fall_back_to_the_default_rule() {
        let config = RateLimitConfig::default();

        assert_eq!(config.rule_for("/health").max_requests, 1000);
    }

    #[test]
    fn sweep_drops_idle_counters() {
        let limiter = limiter(5, Duration::from_millis(10));
        limiter.allow("1.2.3.4", "/ads/request");

        thread::sleep(Duration::from_millis(25));

        assert_eq!(limiter.sweep(), 1);
        // A fresh window starts clean afterwards.
        assert_eq!(limiter.allow("1.2.3.4", "/ads/request").remaining, 4);
    }
}
