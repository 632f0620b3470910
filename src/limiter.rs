use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota};
use std::collections::VecDeque;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Length of the window the request ceiling applies to.
pub const WINDOW: Duration = Duration::from_secs(60);
// Added on top of every computed wait so the provider's own clock has rolled over too.
const MARGIN: Duration = Duration::from_millis(100);

#[async_trait]
pub trait RateLimiter: Send {
    /// Suspends until one more request may be dispatched and counts it against the limit.
    /// Returns how long the caller was suspended.
    async fn acquire(&mut self) -> Duration;
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum Strategy {
    /// Counter reset once a full window has passed; allows bursts at window seams.
    Fixed,
    /// At most `limit` requests in any trailing window.
    Sliding,
    /// Evenly refilling bucket holding at most `limit` requests.
    TokenBucket,
}

impl Strategy {
    pub fn limiter(self, limit: u32) -> Box<dyn RateLimiter> {
        match self {
            Self::Fixed => Box::new(FixedWindow::new(limit, WINDOW)),
            Self::Sliding => Box::new(SlidingWindow::new(limit, WINDOW)),
            Self::TokenBucket => Box::new(TokenBucket::new(limit, WINDOW)),
        }
    }
}

/// Counts requests since the window started. Once `limit` requests have gone out, the
/// next one waits for the rest of the window and opens a new one.
pub struct FixedWindow {
    limit: u32,
    window: Duration,
    count: u32,
    window_start: Option<Instant>,
}

impl FixedWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit: limit.max(1),
            window,
            count: 0,
            window_start: None,
        }
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[async_trait]
impl RateLimiter for FixedWindow {
    async fn acquire(&mut self) -> Duration {
        let window_start = *self.window_start.get_or_insert_with(Instant::now);
        let mut waited = Duration::ZERO;
        if self.count == self.limit {
            let elapsed = window_start.elapsed();
            if elapsed < self.window {
                waited = self.window - elapsed + MARGIN;
                debug!(
                    "rate limit of {} requests reached, sleeping {:.1}s",
                    self.limit,
                    waited.as_secs_f64()
                );
                sleep(waited).await;
            }
            self.window_start = Some(Instant::now());
            self.count = 0;
        }
        self.count += 1;
        waited
    }
}

pub struct SlidingWindow {
    limit: usize,
    window: Duration,
    sent: VecDeque<Instant>,
}

impl SlidingWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        let limit = limit.max(1) as usize;
        Self {
            limit,
            window,
            sent: VecDeque::with_capacity(limit),
        }
    }
}

#[async_trait]
impl RateLimiter for SlidingWindow {
    async fn acquire(&mut self) -> Duration {
        let mut waited = Duration::ZERO;
        if self.sent.len() == self.limit {
            if let Some(oldest) = self.sent.pop_front() {
                let elapsed = oldest.elapsed();
                if elapsed < self.window {
                    waited = self.window - elapsed + MARGIN;
                    debug!(
                        "rate limit of {} requests reached, sleeping {:.1}s",
                        self.limit,
                        waited.as_secs_f64()
                    );
                    sleep(waited).await;
                }
            }
        }
        self.sent.push_back(Instant::now());
        waited
    }
}

pub struct TokenBucket {
    limiter: DefaultDirectRateLimiter,
}

impl TokenBucket {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limiter: governor::RateLimiter::direct(quota(limit, window)),
        }
    }
}

// One request refills every `window / limit`, with room for `limit` at once.
fn quota(limit: u32, window: Duration) -> Quota {
    let burst = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
    Quota::with_period(window / burst.get())
        .unwrap_or_else(|| Quota::per_minute(burst))
        .allow_burst(burst)
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&mut self) -> Duration {
        let started = Instant::now();
        self.limiter.until_ready().await;
        let waited = started.elapsed();
        if !waited.is_zero() {
            debug!("token bucket empty, waited {:.1}s", waited.as_secs_f64());
        }
        waited
    }
}
