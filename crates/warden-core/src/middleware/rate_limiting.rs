use crate::{
    config::RateLimiterConfig,
    error::GatewayError,
    pipeline::{Next, Reply, RequestScope, Stage},
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::task::JoinHandle;

/// Per-client fixed-window rate limiter.
///
/// Each client key owns a counter and the instant its window opened. A check that
/// lands `window` or more after the window opened resets the counter before counting,
/// so a request arriving exactly on the boundary always starts a fresh window.
///
/// Windows are aligned per key, not to the wall clock. A client may therefore get up
/// to `2 × limit` requests through in a short span straddling its window boundary:
/// `limit` at the end of one window and `limit` more at the start of the next. This
/// is accepted fixed-window behavior.
///
/// Windows are created lazily and never removed by the admission path. Memory grows
/// with the number of distinct keys seen; [`RateLimiter::start_sweep_task`] prunes
/// windows that have already elapsed, which cannot change any admission result.
pub struct RateLimiter {
    windows: Arc<DashMap<String, Window>>,
    limit: u32,
    window: Duration,
    enabled: bool,
    sweep_interval: Duration,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub admitted: bool,
    /// Time until the key's current window closes. Zero when admitted.
    pub retry_after: Duration,
}

impl RateDecision {
    const ADMIT: Self = Self { admitted: true, retry_after: Duration::ZERO };
}

impl RateLimiter {
    #[must_use]
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            limit,
            window,
            enabled: true,
            sweep_interval: Duration::from_secs(60),
        }
    }

    /// A limiter that admits everything and tracks nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { enabled: false, ..Self::new(0, Duration::ZERO) }
    }

    #[must_use]
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self {
            enabled: config.enabled,
            sweep_interval: Duration::from_secs(config.sweep_interval_seconds.max(1)),
            ..Self::new(config.requests_per_window, config.window())
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Counts one request for `key` and decides whether to admit it.
    #[must_use]
    pub fn allow(&self, key: &str) -> RateDecision {
        self.allow_at(key, Instant::now())
    }

    /// [`RateLimiter::allow`] evaluated at `now`.
    ///
    /// The reset, compare, and increment happen while holding the map shard's write
    /// lock for `key`, so two concurrent checks at `count == limit - 1` cannot both
    /// be admitted.
    #[must_use]
    pub fn allow_at(&self, key: &str, now: Instant) -> RateDecision {
        if !self.enabled {
            return RateDecision::ADMIT;
        }

        if let Some(mut window) = self.windows.get_mut(key) {
            return Self::count_request(&mut window, now, self.limit, self.window);
        }

        let mut window =
            self.windows.entry(key.to_string()).or_insert(Window { count: 0, started: now });

        Self::count_request(&mut window, now, self.limit, self.window)
    }

    fn count_request(
        window: &mut Window,
        now: Instant,
        limit: u32,
        size: Duration,
    ) -> RateDecision {
        let elapsed = now.saturating_duration_since(window.started);

        if elapsed >= size {
            window.count = 0;
            window.started = now;
        }

        if window.count < limit {
            window.count += 1;
            return RateDecision::ADMIT;
        }

        let elapsed = now.saturating_duration_since(window.started);
        RateDecision { admitted: false, retry_after: size.saturating_sub(elapsed) }
    }

    /// Spawns a task that periodically drops windows which have already elapsed.
    ///
    /// The task runs until the returned handle is aborted.
    pub fn start_sweep_task(&self) -> JoinHandle<()> {
        let sweep_interval = self.sweep_interval;
        let size = self.window;
        let windows = self.windows.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(sweep_interval);

            loop {
                interval.tick().await;

                let now = Instant::now();
                let before = windows.len();
                windows.retain(|_, w| now.saturating_duration_since(w.started) < size);

                let removed = before.saturating_sub(windows.len());
                if removed > 0 {
                    tracing::debug!(removed, remaining = windows.len(), "swept rate limit windows");
                }
            }
        })
    }

    /// Removes windows that have elapsed as of `now`. Returns how many were removed.
    #[must_use]
    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.windows.len();
        self.windows.retain(|_, w| now.saturating_duration_since(w.started) < self.window);
        before.saturating_sub(self.windows.len())
    }

    /// Number of client keys currently tracked.
    #[must_use]
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    #[doc(hidden)]
    #[must_use]
    pub fn window_info(&self, key: &str) -> Option<(u32, Instant)> {
        self.windows.get(key).map(|w| (w.count, w.started))
    }
}

/// First stage of every chain: admits or rejects by `client_key`.
pub struct RateLimitStage {
    limiter: Arc<RateLimiter>,
}

impl RateLimitStage {
    #[must_use]
    pub fn new(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    async fn handle(&self, scope: RequestScope, next: Next<'_>) -> Result<Reply, GatewayError> {
        let decision = self.limiter.allow(&scope.client_key);
        if !decision.admitted {
            tracing::warn!(
                client = %scope.client_key,
                retry_after_ms = decision.retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            return Err(GatewayError::RateLimited { retry_after: decision.retry_after });
        }
        next.run(scope).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(5);

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let limiter = RateLimiter::new(3, WINDOW);
        let start = Instant::now();

        for _ in 0..3 {
            assert!(limiter.allow_at("client", start).admitted);
        }

        let decision = limiter.allow_at("client", start + Duration::from_secs(1));
        assert!(!decision.admitted);
        assert_eq!(decision.retry_after, Duration::from_secs(4));
    }

    #[test]
    fn test_never_admits_more_than_limit_within_window() {
        let limiter = RateLimiter::new(5, WINDOW);
        let start = Instant::now();

        let admitted = (0..50)
            .filter(|i| limiter.allow_at("client", start + Duration::from_millis(i * 90)).admitted)
            .count();

        assert_eq!(admitted, 5);
    }

    #[test]
    fn test_rejection_has_positive_retry_after() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("client", start).admitted);
        let decision = limiter.allow_at("client", start + Duration::from_millis(4999));
        assert!(!decision.admitted);
        assert!(decision.retry_after > Duration::ZERO);
    }

    #[test]
    fn test_window_resets_after_retry_after() {
        let limiter = RateLimiter::new(2, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("client", start).admitted);
        assert!(limiter.allow_at("client", start).admitted);

        let rejected = limiter.allow_at("client", start + Duration::from_secs(2));
        assert!(!rejected.admitted);

        let later = start + Duration::from_secs(2) + rejected.retry_after;
        assert!(limiter.allow_at("client", later).admitted);
        assert!(limiter.allow_at("client", later).admitted);
        assert!(!limiter.allow_at("client", later).admitted);
    }

    #[test]
    fn test_reset_is_inclusive_at_boundary() {
        let limiter = RateLimiter::new(1, WINDOW);
        let start = Instant::now();

        assert!(limiter.allow_at("client", start).admitted);
        assert!(!limiter.allow_at("client", start + WINDOW - Duration::from_nanos(1)).admitted);
        assert!(limiter.allow_at("client", start + WINDOW).admitted);
    }

    #[test]
    fn test_boundary_burst_up_to_twice_limit() {
        let limiter = RateLimiter::new(3, WINDOW);
        let start = Instant::now();
        let just_before = start + WINDOW - Duration::from_millis(1);
        let just_after = start + WINDOW;

        assert!(limiter.allow_at("client", start).admitted);
        assert!(limiter.allow_at("client", just_before).admitted);
        assert!(limiter.allow_at("client", just_before).admitted);

        let burst = (0..5).filter(|_| limiter.allow_at("client", just_after).admitted).count();
        assert_eq!(burst, 3);
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = RateLimiter::new(1, WINDOW);
        let now = Instant::now();

        assert!(limiter.allow_at("10.0.0.1", now).admitted);
        assert!(limiter.allow_at("10.0.0.2", now).admitted);
        assert!(!limiter.allow_at("10.0.0.1", now).admitted);
        assert!(!limiter.allow_at("10.0.0.2", now).admitted);
        assert_eq!(limiter.window_count(), 2);
    }

    #[test]
    fn test_disabled_always_admits() {
        let limiter = RateLimiter::disabled();
        for _ in 0..1000 {
            assert_eq!(limiter.allow("client"), RateDecision::ADMIT);
        }
        assert_eq!(limiter.window_count(), 0);
    }

    #[test]
    fn test_zero_limit_rejects_everything() {
        let limiter = RateLimiter::new(0, WINDOW);
        let decision = limiter.allow("client");
        assert!(!decision.admitted);
        assert_eq!(decision.retry_after, WINDOW);
    }

    #[test]
    fn test_sweep_removes_only_elapsed_windows() {
        let limiter = RateLimiter::new(5, WINDOW);
        let start = Instant::now();

        let _ = limiter.allow_at("old", start);
        let _ = limiter.allow_at("fresh", start + Duration::from_secs(4));

        assert_eq!(limiter.sweep_at(start + WINDOW), 1);
        assert!(limiter.window_info("old").is_none());
        assert_eq!(limiter.window_info("fresh").map(|(count, _)| count), Some(1));
    }

    #[test]
    fn test_edge_case_keys() {
        let limiter = RateLimiter::new(1, WINDOW);

        assert!(limiter.allow("").admitted);
        assert!(limiter.allow(&"a".repeat(1000)).admitted);
        assert!(limiter.allow("::1").admitted);
        assert_eq!(limiter.window_count(), 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_never_exceed_limit() {
        let limiter = Arc::new(RateLimiter::new(10, Duration::from_secs(60)));

        let mut handles = vec![];
        for _ in 0..8 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                (0..25).filter(|_| limiter.allow("shared").admitted).count()
            }));
        }

        let mut total = 0;
        for handle in handles {
            total += handle.await.unwrap();
        }

        assert_eq!(total, 10);
    }

    #[tokio::test]
    async fn test_sweep_task_prunes_in_background() {
        let limiter = RateLimiter {
            sweep_interval: Duration::from_millis(20),
            ..RateLimiter::new(1, Duration::from_millis(10))
        };

        let _ = limiter.allow("client");
        assert_eq!(limiter.window_count(), 1);

        let handle = limiter.start_sweep_task();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        assert_eq!(limiter.window_count(), 0);
    }

    #[tokio::test]
    async fn test_stage_rejects_with_retry_after() {
        use crate::pipeline::{handler_fn, Deadline, Pipeline};

        let limiter = Arc::new(RateLimiter::new(1, WINDOW));
        let pipeline = Pipeline::builder()
            .stage(Arc::new(RateLimitStage::new(limiter)))
            .handler(Arc::new(handler_fn(|_scope| async { Ok(Reply::no_content()) })));
        let scope = || RequestScope::new("10.0.0.1", Deadline::after(Duration::from_secs(5)));

        assert!(pipeline.execute(scope()).await.is_ok());
        match pipeline.execute(scope()).await {
            Err(GatewayError::RateLimited { retry_after }) => {
                assert!(retry_after > Duration::ZERO && retry_after <= WINDOW);
            }
            other => panic!("expected rate limit rejection, got {other:?}"),
        }
    }
}
