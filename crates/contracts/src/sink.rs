//! PoseSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for consumers of the pose event stream.

use crate::{ContractError, PoseEvent};

/// Pose event output trait
///
/// All sink implementations must implement this trait.
#[trait_variant::make(PoseSink: Send)]
pub trait LocalPoseSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one pose event
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, event: &PoseEvent) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
