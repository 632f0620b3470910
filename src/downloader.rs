use crate::calendar::TradingDays;
use crate::data::{
    error::Error,
    provider::DataProvider,
    store::{DayStatus, DayStore},
};
use crate::limiter::RateLimiter;
use crate::Options;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub written: usize,
    pub skipped: usize,
    pub empty: usize,
    pub failed: usize,
}

/// Walks the trading days of a range and materializes each one as a CSV file.
///
/// Days that already have a file are skipped without touching the network, so rerunning
/// an interrupted download picks up where it stopped. A day that fails to download is
/// logged and left for the next run.
pub struct Downloader<P> {
    provider: P,
    limiter: Box<dyn RateLimiter>,
}

impl<P: DataProvider + Sync> Downloader<P> {
    pub fn new(provider: P, limiter: Box<dyn RateLimiter>) -> Self {
        Self { provider, limiter }
    }

    pub async fn run(&mut self, options: &Options) -> Result<Summary, Error> {
        let mut store = DayStore::open(&options.outdir, &options.ticker, options.remember_empty)?;
        let mut summary = Summary::default();

        for day in TradingDays::new(options.start, options.end) {
            match store.status(day) {
                DayStatus::Populated(path) => {
                    info!("[skip] {} already exists", path.display());
                    summary.skipped += 1;
                    continue;
                }
                DayStatus::EmptyConfirmed => {
                    info!("[skip] {}: previously returned no data", day);
                    summary.skipped += 1;
                    continue;
                }
                DayStatus::NotAttempted => {}
            }

            let bars = match self
                .provider
                .download_day(&options.ticker, day, self.limiter.as_mut())
                .await
            {
                Ok(bars) => bars,
                Err(e) => {
                    warn!("[warn] {}: {}", day, e);
                    summary.failed += 1;
                    continue;
                }
            };

            if bars.is_empty() {
                info!("[info] {}: no data returned (holiday?)", day);
                store.mark_empty(day)?;
                summary.empty += 1;
            } else {
                let path = store.write_day(day, &bars)?;
                info!("[ok]   {}  ({} bars)", path.display(), bars.len());
                summary.written += 1;
            }
        }

        debug!(?summary, "finished {}", options.ticker);
        Ok(summary)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::data::Bar;
    use crate::limiter::FixedWindow;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use chrono_tz::America::New_York;
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Clone)]
    enum Reply {
        Bars(usize),
        Empty,
        Fail,
    }

    /// Serves canned replies and records which days were requested.
    #[derive(Default)]
    struct FakeProvider {
        replies: HashMap<NaiveDate, Reply>,
        requested: Mutex<Vec<NaiveDate>>,
    }

    impl FakeProvider {
        fn reply(mut self, day: NaiveDate, reply: Reply) -> Self {
            self.replies.insert(day, reply);
            self
        }

        fn requested(&self) -> Vec<NaiveDate> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DataProvider for FakeProvider {
        async fn download_day(
            &self,
            _ticker: &str,
            day: NaiveDate,
            limiter: &mut dyn RateLimiter,
        ) -> Result<Vec<Bar>, Error> {
            limiter.acquire().await;
            self.requested.lock().unwrap().push(day);
            match self.replies.get(&day).cloned().unwrap_or(Reply::Empty) {
                Reply::Bars(n) => Ok((0..n)
                    .map(|i| {
                        let open = New_York
                            .from_local_datetime(&day.and_hms_opt(9, 30, 0).unwrap())
                            .unwrap();
                        Bar {
                            datetime: open + chrono::Duration::minutes(i as i64),
                            open: Decimal::ONE,
                            high: Decimal::TWO,
                            low: Decimal::ONE,
                            close: Decimal::TWO,
                            volume: Decimal::ONE_HUNDRED,
                        }
                    })
                    .collect()),
                Reply::Empty => Ok(Vec::new()),
                Reply::Fail => Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "connection reset",
                ))),
            }
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn downloader(provider: FakeProvider) -> Downloader<FakeProvider> {
        Downloader::new(provider, Box::new(FixedWindow::new(5, Duration::from_secs(60))))
    }

    #[tokio::test(start_paused = true)]
    async fn it_writes_one_file_per_populated_day() {
        let dir = tempfile::tempdir().unwrap();
        let provider = FakeProvider::default()
            .reply(date(4), Reply::Bars(3))
            .reply(date(5), Reply::Empty)
            .reply(date(6), Reply::Fail)
            .reply(date(7), Reply::Bars(1));
        let options = Options::new("I:SPX", date(2), date(7)).set_outdir(dir.path());
        let mut downloader = downloader(provider);

        let summary = downloader.run(&options).await.unwrap();
        assert_eq!(
            summary,
            Summary {
                written: 2,
                skipped: 0,
                empty: 1,
                failed: 1
            }
        );
        assert_eq!(
            downloader.provider.requested(),
            vec![date(4), date(5), date(6), date(7)]
        );
        assert!(dir.path().join("I_SPX_2024-03-04.csv").exists());
        assert!(!dir.path().join("I_SPX_2024-03-05.csv").exists());
        assert!(!dir.path().join("I_SPX_2024-03-06.csv").exists());
        assert!(dir.path().join("I_SPX_2024-03-07.csv").exists());
    }

    #[tokio::test(start_paused = true)]
    async fn a_second_run_only_retries_days_without_files() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options::new("SPY", date(4), date(6)).set_outdir(dir.path());
        let provider = FakeProvider::default()
            .reply(date(4), Reply::Bars(2))
            .reply(date(5), Reply::Empty)
            .reply(date(6), Reply::Fail);
        downloader(provider).run(&options).await.unwrap();

        let provider = FakeProvider::default()
            .reply(date(4), Reply::Bars(2))
            .reply(date(6), Reply::Bars(2));
        let mut second = downloader(provider);
        let summary = second.run(&options).await.unwrap();
        assert_eq!(second.provider.requested(), vec![date(5), date(6)]);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.written, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn confirmed_empty_days_are_skipped_when_remembered() {
        let dir = tempfile::tempdir().unwrap();
        let options = Options::new("SPY", date(4), date(5))
            .set_outdir(dir.path())
            .set_remember_empty(true);
        downloader(FakeProvider::default().reply(date(4), Reply::Bars(1)))
            .run(&options)
            .await
            .unwrap();

        let mut second = downloader(FakeProvider::default());
        let summary = second.run(&options).await.unwrap();
        assert!(second.provider.requested().is_empty());
        assert_eq!(summary.skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_are_paced_by_the_limiter() {
        let dir = tempfile::tempdir().unwrap();
        // Two weeks of weekdays
        let options = Options::new("SPY", date(4), date(15)).set_outdir(dir.path());
        let start = tokio::time::Instant::now();
        let summary = downloader(FakeProvider::default())
            .run(&options)
            .await
            .unwrap();
        assert_eq!(summary.empty, 10);
        // 10 requests at 5 per minute need exactly one full wait
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed < Duration::from_secs(120));
    }
}
