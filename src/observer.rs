//! Observer trait for conversion stage events.
//!
//! Inject an [`Arc<dyn ConversionObserver>`] via
//! [`crate::config::ConversionConfigBuilder::observer`] to follow a job as it
//! moves through [`Stage`]s. The CLI uses this to drive its spinner; a server
//! could forward the events to a log sink or a websocket instead.
//!
//! # Example
//!
//! ```rust
//! use eqdocx::{ConversionConfig, ConversionObserver, Stage};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Recorder {
//!     seen: Mutex<Vec<Stage>>,
//! }
//!
//! impl ConversionObserver for Recorder {
//!     fn on_stage(&self, stage: Stage) {
//!         self.seen.lock().unwrap().push(stage);
//!     }
//! }
//!
//! let config = ConversionConfig::builder()
//!     .observer(Arc::new(Recorder::default()))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::Stage;
use std::sync::Arc;

/// Receives stage transitions for one conversion at a time.
///
/// All methods default to no-ops. Calls for one job arrive in order from
/// the thread running that job; concurrent jobs sharing an observer may
/// interleave.
pub trait ConversionObserver: Send + Sync {
    /// The job entered `stage`.
    fn on_stage(&self, stage: Stage) {
        let _ = stage;
    }

    /// The job failed while in `stage`. Followed by no further events.
    fn on_failed(&self, stage: Stage, error: &str) {
        let _ = (stage, error);
    }

    /// The converted document (`output_bytes` long) was handed back.
    fn on_delivered(&self, output_bytes: usize) {
        let _ = output_bytes;
    }
}

/// Observer that ignores every event, for callers that must pass one.
/// A [`ConversionConfig`] without an observer reports nothing at all.
///
/// [`ConversionConfig`]: crate::config::ConversionConfig
pub struct NoopObserver;

impl ConversionObserver for NoopObserver {}

/// Shared observer handle as stored in [`crate::config::ConversionConfig`].
pub type Observer = Arc<dyn ConversionObserver>;
