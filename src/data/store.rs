use super::{error::Error, Bar};
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Durable state of a single (ticker, day) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayStatus {
    NotAttempted,
    EmptyConfirmed,
    Populated(PathBuf),
}

/// Per-day CSV files for one ticker inside an output directory.
///
/// A day's file is only ever created, never replaced, so its presence marks the day as
/// done. Days the provider answered without any bars leave no file behind; when
/// `remember_empty` is set they are recorded in a hidden JSON sidecar instead so later
/// runs can tell them apart from days that were never attempted.
pub struct DayStore {
    dir: PathBuf,
    prefix: String,
    remember_empty: bool,
    empty_days: BTreeSet<NaiveDate>,
}

pub fn sanitize_ticker(ticker: &str) -> String {
    ticker.replace(':', "_")
}

impl DayStore {
    pub fn open<T: Into<PathBuf>>(
        dir: T,
        ticker: &str,
        remember_empty: bool,
    ) -> Result<Self, Error> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let mut store = Self {
            dir,
            prefix: sanitize_ticker(ticker),
            remember_empty,
            empty_days: BTreeSet::new(),
        };
        if remember_empty {
            store.empty_days = store.load_empty_days()?;
        }
        Ok(store)
    }

    pub fn path(&self, day: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}_{}.csv", self.prefix, day))
    }

    fn sidecar_path(&self) -> PathBuf {
        self.dir.join(format!(".{}_empty_days.json", self.prefix))
    }

    pub fn status(&self, day: NaiveDate) -> DayStatus {
        let path = self.path(day);
        if path.exists() {
            DayStatus::Populated(path)
        } else if self.empty_days.contains(&day) {
            DayStatus::EmptyConfirmed
        } else {
            DayStatus::NotAttempted
        }
    }

    pub fn write_day(&self, day: NaiveDate, bars: &[Bar]) -> Result<PathBuf, Error> {
        let path = self.path(day);
        if path.exists() {
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            )));
        }
        // Written aside and renamed so an interrupted run never leaves a truncated file
        // that the next run would mistake for a finished day.
        let partial = path.with_extension("csv.partial");
        let mut writer = csv::Writer::from_path(&partial)?;
        for bar in bars {
            writer.serialize(bar)?;
        }
        writer.flush()?;
        drop(writer);
        std::fs::rename(&partial, &path)?;
        Ok(path)
    }

    pub fn mark_empty(&mut self, day: NaiveDate) -> Result<(), Error> {
        if !self.remember_empty || !self.empty_days.insert(day) {
            return Ok(());
        }
        let path = self.sidecar_path();
        let partial = path.with_extension("json.partial");
        std::fs::write(&partial, serde_json::to_vec_pretty(&self.empty_days)?)?;
        std::fs::rename(&partial, &path)?;
        Ok(())
    }

    fn load_empty_days(&self) -> Result<BTreeSet<NaiveDate>, Error> {
        match std::fs::read(self.sidecar_path()) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }
}

pub fn read_day<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>, Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let bars = reader.deserialize().collect::<Result<Vec<Bar>, _>>()?;
    Ok(bars)
}
