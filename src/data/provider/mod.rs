use crate::data::{error::Error, Bar};
use crate::limiter::RateLimiter;
use async_trait::async_trait;
use chrono::NaiveDate;

pub mod polygon;

pub use polygon::PolygonProvider;

#[async_trait]
pub trait DataProvider {
    /// Downloads every 1-minute bar of `day`, ascending by timestamp. An empty result
    /// means the provider had nothing for that day (usually a market holiday).
    ///
    /// `limiter` is acquired before each outbound request.
    async fn download_day(
        &self,
        ticker: &str,
        day: NaiveDate,
        limiter: &mut dyn RateLimiter,
    ) -> Result<Vec<Bar>, Error>;
}
