//! Helpers for building samples in tests.
use crate::series::TransformSample;
use crate::transform::Transform3D;
use glam::{DQuat, DVec3};
use tfs_clock::TfDuration;

/// Pure translation sample at `stamp` nanoseconds.
pub fn sample(stamp: u64, x: f64, y: f64, z: f64) -> TransformSample {
    TransformSample {
        stamp: TfDuration(stamp),
        transform: Transform3D::from_translation(DVec3::new(x, y, z)),
    }
}

pub fn sample_rot(stamp: u64, translation: DVec3, rotation: DQuat) -> TransformSample {
    TransformSample {
        stamp: TfDuration(stamp),
        transform: Transform3D {
            translation,
            rotation,
        },
    }
}

pub fn secs(s: u64) -> TfDuration {
    TfDuration::from_secs(s)
}
