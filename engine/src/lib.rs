//! # Sort Engine - EXIF Photo Sorting Library
//!
//! A concurrent, headless engine that moves photos into a date-based folder
//! tree using the capture date stored in their EXIF metadata.
//! Designed as the foundation for multiple front ends (CLI, automation).
//!
//! ## Overview
//!
//! A run goes through two phases:
//! - A preparation pass that walks the input tree once and counts the files
//!   of every directory to sort
//! - A sorting pass where one task per directory runs on a worker pool and
//!   reports every outcome through a channel drained on the calling thread
//!
//! It features:
//! - Configurable folder and file name templates (`%Y/%B/%d`)
//! - Collision-free destinations (`IMG001.jpg`, `IMG001-1.jpg`, …)
//! - Monotone overall progress reporting via an observer
//! - Cooperative cancellation and stall warnings
//!
//! ## Basic Usage
//!
//! ```no_run
//! use sort_engine::{create_sorter, SortConfiguration};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = SortConfiguration::new("/photos/camera-dump");
//! config.recursive = true;
//!
//! let sorter = create_sorter(config)?;
//! let summary = sorter.run(None);
//!
//! println!(
//!     "{} moved, {} skipped, {} failed",
//!     summary.moved, summary.skipped, summary.failed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (SortConfiguration, DirectoryPlan, SortEvent)
//! - **error**: Error types and handling
//! - **sort**: Run orchestration (create, prepare, run)
//! - **prepare**: Preparation pass over the input tree
//! - **classify**: EXIF timestamp extraction
//! - **template**: Date template validation and formatting
//! - **fs_ops**: Low-level filesystem operations
//! - **checksums**: Copy verification
//! - **progress**: Observer trait
//! - **cancel**: Cancellation handle

pub mod model;
pub mod error;
pub mod fs_ops;
pub mod sort;
pub mod progress;
pub mod checksums;
pub mod classify;
pub mod template;
pub mod prepare;
pub mod cancel;

mod event_loop;
mod worker;

// Re-export main types and functions
pub use model::{DirectoryPlan, PlanSet, SortConfiguration, SortEvent, SortSummary};
pub use error::SortError;
pub use sort::{create_sorter, Sorter};
pub use progress::SortObserver;
pub use classify::{parse_date_time, ExifClassifier, PathClassifier, Timestamp};
pub use fs_ops::{FsRelocator, Relocator};
pub use prepare::Preparation;
pub use cancel::CancelHandle;
