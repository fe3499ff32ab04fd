//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the workspace.
//! Business crates only depend on this crate, never on each other's internals.
//!
//! ## Time Model
//! - Sensor timestamps are seconds (f64) in a monotonic domain
//! - Exact synchronization compares timestamps bit for bit
//!
//! ## Pose Model
//! - [`Transform`] is a rigid `nalgebra::Isometry3<f64>`
//! - Covariances are 6x6 over (x, y, z, roll, pitch, yaw)

mod backend;
mod bundle;
mod config;
mod error;
mod frame_id;
mod line;
mod modality;
mod pose;
mod sensor;
mod sink;
mod stamped;

pub use backend::{NoLookup, PoseBackend, PoseSourceLookup};
pub use bundle::*;
pub use config::*;
pub use error::*;
pub use frame_id::FrameId;
pub use line::{LineId, MAX_RGBD_CAMERAS};
pub use modality::*;
pub use pose::*;
pub use sensor::*;
pub use sink::*;
pub use stamped::TimestampedItem;
