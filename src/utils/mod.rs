pub mod serde_tz;
