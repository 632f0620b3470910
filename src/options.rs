use crate::limiter::Strategy;
use chrono::NaiveDate;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Options {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub outdir: PathBuf,
    pub rate_limit: Strategy,
    pub requests_per_minute: u32,
    pub remember_empty: bool,
}

impl Options {
    pub fn new<T: ToString>(ticker: T, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            start,
            end,
            outdir: PathBuf::from("."),
            rate_limit: Strategy::Fixed,
            requests_per_minute: 5,
            remember_empty: false,
        }
    }

    pub fn set_outdir<T: Into<PathBuf>>(mut self, outdir: T) -> Self {
        self.outdir = outdir.into();
        self
    }

    pub fn set_rate_limit(mut self, rate_limit: Strategy, requests_per_minute: u32) -> Self {
        self.rate_limit = rate_limit;
        self.requests_per_minute = requests_per_minute;
        self
    }

    pub fn set_remember_empty(mut self, remember_empty: bool) -> Self {
        self.remember_empty = remember_empty;
        self
    }
}
