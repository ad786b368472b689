pub mod analysis;
pub mod api;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod migrator;
pub mod notifications;
pub mod sanitize;
pub mod storage;
pub mod telemetry;

pub use sea_orm;
