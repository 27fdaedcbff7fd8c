//! Per-user cooldowns and message rate limiting.
//!
//! Both are in-process and advisory: they keep a single user from
//! flooding the bot and are never consulted by the ledger.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Entries idle longer than this are dropped by a sweep.
pub const SWEEP_AFTER: Duration = Duration::from_secs(60);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Minimum spacing between uses of the same command by the same user.
#[derive(Debug)]
pub struct Cooldowns {
    per_command: HashMap<String, Duration>,
    default: Duration,
    last_used: Mutex<HashMap<(String, String), Instant>>,
}

impl Default for Cooldowns {
    /// 30 s for deposits, 5 s for lookups and `/start`, 3 s otherwise.
    fn default() -> Self {
        let mut per_command = HashMap::new();
        per_command.insert("deposit".to_string(), Duration::from_secs(30));
        per_command.insert("start".to_string(), Duration::from_secs(5));
        per_command.insert("lookup".to_string(), Duration::from_secs(5));
        Self::new(per_command, Duration::from_secs(3))
    }
}

impl Cooldowns {
    pub fn new(per_command: HashMap<String, Duration>, default: Duration) -> Self {
        Self {
            per_command,
            default,
            last_used: Mutex::new(HashMap::new()),
        }
    }

    pub fn cooldown_for(&self, command: &str) -> Duration {
        self.per_command.get(command).copied().unwrap_or(self.default)
    }

    /// Record a use of `command`. Returns the time left to wait if the
    /// previous use was too recent; the use is then not recorded.
    pub fn check(&self, user_id: &str, command: &str) -> Result<(), Duration> {
        self.check_at(user_id, command, Instant::now())
    }

    pub(crate) fn check_at(&self, user_id: &str, command: &str, now: Instant) -> Result<(), Duration> {
        let cooldown = self.cooldown_for(command);
        let key = (user_id.to_string(), command.to_string());
        let mut last_used = lock(&self.last_used);

        if let Some(previous) = last_used.get(&key) {
            let elapsed = now.saturating_duration_since(*previous);
            if elapsed < cooldown {
                return Err(cooldown - elapsed);
            }
        }
        last_used.insert(key, now);
        Ok(())
    }

    /// Drop entries older than [`SWEEP_AFTER`]. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut last_used = lock(&self.last_used);
        let before = last_used.len();
        last_used.retain(|_, at| now.saturating_duration_since(*at) <= SWEEP_AFTER);
        before - last_used.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window message counter per user.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_window: u32,
    window: Duration,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    /// `max_per_minute` messages per user per minute.
    pub fn per_minute(max_per_minute: u32) -> Self {
        Self::new(max_per_minute, Duration::from_secs(60))
    }

    pub fn new(max_per_window: u32, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Count a message. Returns `false` once the user is over the limit.
    pub fn check(&self, user_id: &str) -> bool {
        self.check_at(user_id, Instant::now())
    }

    pub(crate) fn check_at(&self, user_id: &str, now: Instant) -> bool {
        let mut windows = lock(&self.windows);
        let window = windows.entry(user_id.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.saturating_duration_since(window.started) > self.window {
            *window = Window {
                started: now,
                count: 0,
            };
        }
        if window.count >= self.max_per_window {
            return false;
        }
        window.count += 1;
        true
    }

    /// Drop windows that have ended. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub(crate) fn sweep_at(&self, now: Instant) -> usize {
        let mut windows = lock(&self.windows);
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.started) <= self.window);
        before - windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_blocks_until_elapsed() {
        let cooldowns = Cooldowns::default();
        let t0 = Instant::now();

        assert!(cooldowns.check_at("111", "deposit", t0).is_ok());
        let wait = cooldowns
            .check_at("111", "deposit", t0 + Duration::from_secs(10))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(20));

        // Other users and other commands are independent
        assert!(cooldowns.check_at("222", "deposit", t0).is_ok());
        assert!(cooldowns.check_at("111", "saldo", t0).is_ok());

        assert!(cooldowns
            .check_at("111", "deposit", t0 + Duration::from_secs(30))
            .is_ok());
    }

    #[test]
    fn test_cooldown_sweep() {
        let cooldowns = Cooldowns::default();
        let t0 = Instant::now();
        cooldowns.check_at("111", "saldo", t0).unwrap();
        cooldowns.check_at("222", "saldo", t0 + Duration::from_secs(50)).unwrap();

        assert_eq!(cooldowns.sweep_at(t0 + Duration::from_secs(90)), 1);
        assert_eq!(cooldowns.sweep_at(t0 + Duration::from_secs(90)), 0);
    }

    #[test]
    fn test_rate_limit_window() {
        let limiter = RateLimiter::per_minute(3);
        let t0 = Instant::now();

        for _ in 0..3 {
            assert!(limiter.check_at("111", t0));
        }
        assert!(!limiter.check_at("111", t0 + Duration::from_secs(30)));
        assert!(limiter.check_at("222", t0));

        let later = t0 + Duration::from_secs(61);
        assert!(limiter.check_at("111", later));
        assert_eq!(limiter.sweep_at(later), 1);
    }
}
