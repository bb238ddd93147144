pub mod config;
pub mod engine;
pub mod error;
pub mod frames;
pub mod interpolation;
pub mod query;
pub mod series;
pub mod transform;
pub mod tree;

#[cfg(test)]
mod test_utils;

pub use config::GraphConfig;
pub use engine::{TransformEngine, TransformLookup};
pub use error::{ErrorKind, TransformError, TransformResult};
pub use frames::{validate_frame_id, FrameIdString, MAX_FRAME_ID_LEN};
pub use interpolation::{extrapolate, interpolate, ExtrapolationPolicy};
pub use query::{QueryTiming, TransformQuery};
pub use series::{InsertOutcome, TimeSeries, TransformSample};
pub use transform::{StampedTransform, Transform3D};
pub use tree::{FrameGraph, FramePath, GraphView};

pub use glam::{DQuat, DVec3};
pub use tfs_clock::{RobotClock, TfDuration, TfTime};
