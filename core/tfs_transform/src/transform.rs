use crate::error::{TransformError, TransformResult};
use crate::frames::FrameIdString;
use glam::{DMat4, DQuat, DVec3, EulerRot};
use serde::{Deserialize, Serialize};
use std::ops::Mul;
use tfs_clock::TfTime;

/// A rigid transform: rotation followed by translation.
///
/// For an edge `parent -> child` this is the pose of the child frame expressed in the
/// parent frame, ie it maps points from child coordinates into parent coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub translation: DVec3,
    /// Always a unit quaternion.
    pub rotation: DQuat,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform3D {
    pub const IDENTITY: Transform3D = Transform3D {
        translation: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    /// Builds a transform, normalizing the rotation.
    /// Fails with InvalidArgument on non finite components or a zero quaternion.
    pub fn new(translation: DVec3, rotation: DQuat) -> TransformResult<Self> {
        if !translation.is_finite() {
            return Err(TransformError::InvalidArgument(format!(
                "translation {translation} is not finite"
            )));
        }
        if !rotation.is_finite() {
            return Err(TransformError::InvalidArgument(format!(
                "rotation {rotation} is not finite"
            )));
        }
        let norm = rotation.length();
        if norm < 1e-9 {
            return Err(TransformError::InvalidArgument(
                "rotation quaternion has zero length".to_string(),
            ));
        }
        Ok(Self {
            translation,
            rotation: rotation / norm,
        })
    }

    /// Same as [`Transform3D::new`] from raw arrays, quaternion as `[x, y, z, w]`.
    pub fn from_arrays(translation: [f64; 3], rotation: [f64; 4]) -> TransformResult<Self> {
        Self::new(DVec3::from_array(translation), DQuat::from_array(rotation))
    }

    pub fn from_translation(translation: DVec3) -> Self {
        Self {
            translation,
            rotation: DQuat::IDENTITY,
        }
    }

    pub fn from_rotation(rotation: DQuat) -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: rotation.normalize(),
        }
    }

    pub fn translation_array(&self) -> [f64; 3] {
        self.translation.to_array()
    }

    /// Quaternion as `[x, y, z, w]`.
    pub fn rotation_array(&self) -> [f64; 4] {
        self.rotation.to_array()
    }

    pub fn inverse(&self) -> Self {
        let inv_rotation = self.rotation.inverse();
        Self {
            translation: -(inv_rotation * self.translation),
            rotation: inv_rotation,
        }
    }

    pub fn transform_point(&self, point: DVec3) -> DVec3 {
        self.rotation * point + self.translation
    }

    /// Homogeneous matrix, column-major like glam.
    pub fn to_matrix(&self) -> [[f64; 4]; 4] {
        DMat4::from_rotation_translation(self.rotation, self.translation).to_cols_array_2d()
    }

    /// Roll, pitch, yaw in radians (rotations about X, Y, Z).
    pub fn to_rpy(&self) -> (f64, f64, f64) {
        let (yaw, pitch, roll) = self.rotation.to_euler(EulerRot::ZYX);
        (roll, pitch, yaw)
    }

    /// Compares two transforms, treating `q` and `-q` as the same rotation.
    pub fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        let same_translation = self.translation.abs_diff_eq(other.translation, epsilon);
        let same_rotation = self.rotation.abs_diff_eq(other.rotation, epsilon)
            || self.rotation.abs_diff_eq(-other.rotation, epsilon);
        same_translation && same_rotation
    }
}

/// `a * b` applies `b` first, then `a`.
impl Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            translation: self.rotation * rhs.translation + self.translation,
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}

impl Mul<&Transform3D> for &Transform3D {
    type Output = Transform3D;

    fn mul(self, rhs: &Transform3D) -> Self::Output {
        *self * *rhs
    }
}

/// Result of a lookup: the pose of `child_frame_id` (the source) expressed in
/// `frame_id` (the target), valid at `stamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampedTransform {
    pub transform: Transform3D,
    pub stamp: TfTime,
    pub frame_id: FrameIdString,
    pub child_frame_id: FrameIdString,
}
