//! # Ingestion
//!
//! Sensor data ingestion module.
//!
//! Responsibilities:
//! - One bounded queue shared by every input line (many producers, one consumer)
//! - Drop-on-full backpressure with counters
//! - Mock sensor rig producing the declared lines
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionQueue, MockRig, MockRigConfig, QueueConfig};
//!
//! let mut queue = IngestionQueue::new(QueueConfig::new(1024));
//! let rx = queue.take_receiver()?;
//!
//! let mut rig = MockRig::new(MockRigConfig::default(), engine.lines().to_vec());
//! rig.start(&queue)?;
//! while let Ok(item) = rx.recv().await {
//!     node.on_item(item);
//! }
//! ```

mod config;
mod error;
mod mock;
mod queue;

pub use config::{IngestionMetrics, MetricsSnapshot, QueueConfig};
pub use error::{IngestionError, Result};
pub use mock::{MockRig, MockRigConfig};
pub use queue::{IngestionQueue, Item, LineSender};
