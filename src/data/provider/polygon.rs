use crate::credentials::ApiKey;
use crate::data::{error::Error, provider::DataProvider, Bar};
use crate::limiter::RateLimiter;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use reqwest::{Client, RequestBuilder, Url};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_with::{serde_as, TimestampMilliSeconds};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.polygon.io";
// Polygon's maximum page size for aggregates
const PAGE_LIMIT: u32 = 50_000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[serde_as]
#[derive(Debug, Deserialize)]
struct PolygonAggregate {
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    t: DateTime<Utc>,
    o: Decimal,
    h: Decimal,
    l: Decimal,
    c: Decimal,
    // Index aggregates carry no volume
    #[serde(default)]
    v: Decimal,
}

#[derive(Debug, Deserialize)]
struct AggregateWrapper {
    #[serde(rename = "resultsCount", default)]
    results_count: u64,
    #[serde(default)]
    results: Vec<PolygonAggregate>,
    next_url: Option<String>,
}

impl From<PolygonAggregate> for Bar {
    fn from(p: PolygonAggregate) -> Bar {
        Bar {
            datetime: p.t.with_timezone(&New_York),
            open: p.o,
            high: p.h,
            low: p.l,
            close: p.c,
            volume: p.v,
        }
    }
}

#[derive(Clone)]
pub struct PolygonProvider {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl PolygonProvider {
    pub fn new(api_key: ApiKey) -> Result<Self, Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn base_url<T: ToString>(mut self, base_url: T) -> Self {
        self.base_url = base_url.to_string().trim_end_matches('/').to_string();
        self
    }

    fn day_url(&self, ticker: &str, day: NaiveDate) -> Result<Url, Error> {
        let invalid = || Error::InvalidUrl(self.base_url.clone());
        let mut url = Url::parse(&self.base_url).map_err(|_| invalid())?;
        let day = day.to_string();
        url.path_segments_mut()
            .map_err(|_| invalid())?
            .pop_if_empty()
            .extend(["v2", "aggs", "ticker", ticker])
            .extend(["range", "1", "minute", day.as_str(), day.as_str()]);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<AggregateWrapper, Error> {
        let response = request
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status,
                body: body.trim().to_string(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl DataProvider for PolygonProvider {
    async fn download_day(
        &self,
        ticker: &str,
        day: NaiveDate,
        limiter: &mut dyn RateLimiter,
    ) -> Result<Vec<Bar>, Error> {
        let request = self
            .client
            .get(self.day_url(ticker, day)?)
            .query(&[("adjusted", "true"), ("sort", "asc")])
            .query(&[("limit", PAGE_LIMIT)]);
        limiter.acquire().await;
        let mut page = self.send(request).await?;

        let mut bars = BTreeMap::new();
        let mut visited = HashSet::new();
        loop {
            if page.results_count > 0 {
                for agg in page.results {
                    let bar = Bar::from(agg);
                    bars.insert(bar.datetime, bar);
                }
            }
            let next_url = match page.next_url {
                Some(url) => url,
                None => break,
            };
            if !visited.insert(next_url.clone()) {
                return Err(Error::RepeatedPage { pages: visited.len() + 1 });
            }
            debug!(ticker, %day, bars = bars.len(), "fetching next page");
            limiter.acquire().await;
            page = self.send(self.client.get(next_url)).await?;
        }
        Ok(bars.into_values().collect())
    }
}
