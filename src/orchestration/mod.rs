//! Batch orchestration: event ingestion, daily balance/points cycles, and
//! scheduling.

pub mod award;
pub mod daily;
pub mod ingest;
pub mod scheduler;

pub use award::PointsAwarder;
pub use daily::{DailyCycle, DailyReport};
pub use ingest::{CycleReport, EventIngestor, HandleOutcome, IngestError, SkipReason};
pub use scheduler::{DailyRunOutcome, Scheduler};
