use crate::series::TransformSample;
use crate::transform::Transform3D;
use glam::DQuat;
use serde::{Deserialize, Serialize};
use tfs_clock::{TfDuration, TfTime};

/// What a lookup may do when the requested time lies outside the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExtrapolationPolicy {
    /// Never answer outside the sample range.
    #[default]
    None,
    /// Answer up to the given distance past the oldest or newest sample.
    Bounded(TfDuration),
    /// Always answer.
    Unlimited,
}

impl ExtrapolationPolicy {
    pub fn permits(&self, distance: TfDuration) -> bool {
        match self {
            ExtrapolationPolicy::None => false,
            ExtrapolationPolicy::Bounded(limit) => distance <= *limit,
            ExtrapolationPolicy::Unlimited => true,
        }
    }
}

/// Position of `time` relative to `start..end`, 0.0 at start and 1.0 at end.
/// Values outside [0, 1] are extrapolation.
fn ratio(start: TfTime, end: TfTime, time: TfTime) -> f64 {
    let span = end.as_nanos() as f64 - start.as_nanos() as f64;
    if span == 0.0 {
        return 0.0;
    }
    (time.as_nanos() as f64 - start.as_nanos() as f64) / span
}

/// Interpolates between two samples bracketing `time`.
///
/// Translation is interpolated linearly, rotation spherically.
pub fn interpolate(
    before: &TransformSample,
    after: &TransformSample,
    time: TfTime,
) -> Transform3D {
    let r = ratio(before.stamp, after.stamp, time).clamp(0.0, 1.0);
    Transform3D {
        translation: before
            .transform
            .translation
            .lerp(after.transform.translation, r),
        rotation: before
            .transform
            .rotation
            .slerp(after.transform.rotation, r)
            .normalize(),
    }
}

/// Continues the motion between `first` and `second` (first older) to `time`,
/// which may be before `first` or after `second`.
///
/// The translation follows a constant velocity, the rotation a constant angular
/// velocity around the axis of the relative rotation.
pub fn extrapolate(
    first: &TransformSample,
    second: &TransformSample,
    time: TfTime,
) -> Transform3D {
    let r = ratio(first.stamp, second.stamp, time);
    let q0 = first.transform.rotation;
    let mut delta = second.transform.rotation * q0.inverse();
    // shortest arc
    if delta.w < 0.0 {
        delta = -delta;
    }
    let (axis, angle) = delta.to_axis_angle();
    let rotation = if angle.abs() < 1e-12 {
        q0
    } else {
        (DQuat::from_axis_angle(axis, angle * r) * q0).normalize()
    };
    Transform3D {
        translation: first
            .transform
            .translation
            .lerp(second.transform.translation, r),
        rotation,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample, sample_rot};
    use approx::assert_relative_eq;
    use glam::DVec3;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_policy() {
        let d = TfDuration::from_millis(100);
        assert!(!ExtrapolationPolicy::None.permits(d));
        assert!(ExtrapolationPolicy::Bounded(d).permits(d));
        assert!(!ExtrapolationPolicy::Bounded(d).permits(TfDuration::from_millis(101)));
        assert!(ExtrapolationPolicy::Unlimited.permits(TfDuration::MAX));
    }

    #[test]
    fn test_interpolate_midpoint() {
        let before = sample_rot(1000, DVec3::ZERO, DQuat::IDENTITY);
        let after = sample_rot(3000, DVec3::new(10.0, -4.0, 2.0), DQuat::from_rotation_z(FRAC_PI_2));

        let mid = interpolate(&before, &after, TfDuration(2000));
        assert!(mid.translation.abs_diff_eq(DVec3::new(5.0, -2.0, 1.0), 1e-12));
        let (axis, angle) = mid.rotation.to_axis_angle();
        assert_relative_eq!(angle, FRAC_PI_2 / 2.0, epsilon = 1e-9);
        assert!(axis.abs_diff_eq(DVec3::Z, 1e-9));

        let quarter = interpolate(&before, &after, TfDuration(1500));
        assert_relative_eq!(quarter.translation.x, 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_interpolate_at_bounds() {
        let before = sample(1000, 0.0, 0.0, 0.0);
        let after = sample(3000, 10.0, 0.0, 0.0);
        assert_relative_eq!(interpolate(&before, &after, TfDuration(1000)).translation.x, 0.0);
        assert_relative_eq!(interpolate(&before, &after, TfDuration(3000)).translation.x, 10.0);
    }

    #[test]
    fn test_extrapolate_forward_and_backward() {
        let first = sample_rot(1000, DVec3::ZERO, DQuat::IDENTITY);
        let second = sample_rot(2000, DVec3::new(1.0, 0.0, 0.0), DQuat::from_rotation_z(0.1));

        let ahead = extrapolate(&first, &second, TfDuration(3000));
        assert_relative_eq!(ahead.translation.x, 2.0, epsilon = 1e-12);
        let (_, angle) = ahead.rotation.to_axis_angle();
        assert_relative_eq!(angle, 0.2, epsilon = 1e-9);

        let behind = extrapolate(&first, &second, TfDuration(0));
        assert_relative_eq!(behind.translation.x, -1.0, epsilon = 1e-12);
        let expected = DQuat::from_rotation_z(-0.1);
        assert!(behind.rotation.abs_diff_eq(expected, 1e-9));
    }

    #[test]
    fn test_extrapolate_static_rotation() {
        let first = sample(1000, 0.0, 0.0, 0.0);
        let second = sample(2000, 0.0, 1.0, 0.0);
        let ahead = extrapolate(&first, &second, TfDuration(4000));
        assert_relative_eq!(ahead.translation.y, 3.0, epsilon = 1e-12);
        assert!(ahead.rotation.abs_diff_eq(DQuat::IDENTITY, 1e-12));
    }
}
