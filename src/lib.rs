pub mod calendar;
pub mod credentials;
pub mod data;
pub mod downloader;
pub mod limiter;
pub mod options;
mod utils;

pub use options::Options;
