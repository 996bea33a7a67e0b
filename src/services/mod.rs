//! Services behind the toolbox endpoints.
//!
//! Formula engines are pure functions; currency, file processing, cleanup
//! and usage tracking share a [`crate::storage::Storage`].

pub mod calculator;
pub mod cleanup;
pub mod currency;
pub mod files;
pub mod format;
pub mod formulas;
pub mod units;
pub mod usage;

pub use cleanup::{CleanupService, SweepReport};
pub use currency::{CurrencyCode, CurrencyService, HttpRateProvider, RateProvider, RateSource};
pub use files::{FileOperation, FileProcessor, FileTransform, Passthrough, UploadedFile};
