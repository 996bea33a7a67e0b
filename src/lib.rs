//! Toolbox - a web backend for everyday calculators and converters.
//!
//! Toolbox serves a catalog of small tools over HTTP: health and finance
//! formulas, unit and currency conversion, and PDF, image and audio file
//! jobs whose results expire after an hour.
//!
//! # Architecture
//!
//! The library is organized into these main modules:
//!
//! - [`config`] - Configuration loading and environment overrides
//! - [`core`] - Tool catalog, search and quick answers
//! - [`services`] - Formula engines, currency rates, file jobs, cleanup
//! - [`storage`] - Rate cache, job records and usage statistics
//! - [`server`] - Axum router and JSON handlers
//!
//! # Example
//!
//! ```ignore
//! use toolbox::services::formulas;
//!
//! let bmi = formulas::run("bmi", serde_json::json!({"weightKg": 70, "heightCm": 175}))?;
//! ```

pub mod config;
pub mod core;
pub mod server;
pub mod services;
pub mod storage;

mod error;

pub use config::Config;
pub use error::{ToolboxError, ToolboxResult};
pub use server::{build_router, AppState};
pub use storage::{MemStorage, Storage};
