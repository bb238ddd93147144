use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tfs_clock::{TfDuration, TfTime};
use tfs_transform::{
    validate_frame_id, ErrorKind, StampedTransform, Transform3D, TransformError, TransformQuery,
    TransformResult,
};

/// Bumped on any incompatible change to the messages below.
pub const PROTOCOL_VERSION: &str = "1.0";

/// First message of every connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct HelloMessage {
    pub version: String,
    /// Free form client identification, for the server logs.
    pub client: String,
}

impl HelloMessage {
    pub fn new(client: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            client: client.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct WelcomeMessage {
    pub version: String,
    /// Service name the server answers to.
    pub server: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum Request {
    Hello(HelloMessage),
    CanTransform {
        query: TransformQuery,
        timeout: TfDuration,
    },
    LookupTransform {
        query: TransformQuery,
        timeout: TfDuration,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct RequestEnvelope {
    pub id: u64,
    pub request: Request,
}

/// A stamped transform as sent over the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct WireTransform {
    pub translation: [f64; 3],
    /// `[x, y, z, w]`
    pub rotation: [f64; 4],
    pub stamp: TfTime,
    pub frame_id: String,
    pub child_frame_id: String,
}

impl From<&StampedTransform> for WireTransform {
    fn from(stamped: &StampedTransform) -> Self {
        Self {
            translation: stamped.transform.translation_array(),
            rotation: stamped.transform.rotation_array(),
            stamp: stamped.stamp,
            frame_id: stamped.frame_id.to_string(),
            child_frame_id: stamped.child_frame_id.to_string(),
        }
    }
}

impl WireTransform {
    /// Rebuilds the transform, rejecting anything a well-behaved server would
    /// not have sent.
    pub fn into_stamped(self) -> TransformResult<StampedTransform> {
        Ok(StampedTransform {
            transform: Transform3D::from_arrays(self.translation, self.rotation)?,
            stamp: self.stamp,
            frame_id: validate_frame_id(&self.frame_id, "frame_id")?,
            child_frame_id: validate_frame_id(&self.child_frame_id, "child_frame_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum Response {
    Welcome(WelcomeMessage),
    CanTransform(bool),
    Transform(WireTransform),
    Error { kind: ErrorKind, message: String },
}

impl Response {
    pub fn error(err: &TransformError) -> Self {
        Response::Error {
            kind: err.kind(),
            message: err.message().to_string(),
        }
    }

    /// The transform carried by this response, or the error it stands for.
    pub fn into_transform(self) -> TransformResult<StampedTransform> {
        match self {
            Response::Transform(wire) => wire.into_stamped(),
            Response::Error { kind, message } => Err(TransformError::from_kind(kind, message)),
            other => Err(TransformError::Other(format!(
                "expected a transform, got {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct ResponseEnvelope {
    pub id: u64,
    pub response: Response,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfs_transform::{DQuat, DVec3, FrameIdString};

    fn stamped() -> StampedTransform {
        StampedTransform {
            transform: Transform3D::new(DVec3::new(1.0, 2.0, 3.0), DQuat::from_rotation_z(0.5))
                .unwrap(),
            stamp: TfDuration::from_secs(3),
            frame_id: FrameIdString::from("map").unwrap(),
            child_frame_id: FrameIdString::from("odom").unwrap(),
        }
    }

    #[test]
    fn test_wire_transform_keeps_everything() {
        let original = stamped();
        let back = WireTransform::from(&original).into_stamped().unwrap();
        assert_eq!(back.frame_id, original.frame_id);
        assert_eq!(back.child_frame_id, original.child_frame_id);
        assert_eq!(back.stamp, original.stamp);
        assert!(back.transform.abs_diff_eq(&original.transform, 1e-15));
    }

    #[test]
    fn test_bad_wire_transform_is_rejected() {
        let mut wire = WireTransform::from(&stamped());
        wire.rotation = [0.0; 4];
        assert!(wire.clone().into_stamped().unwrap_err().is_invalid_argument());
        wire.rotation = [0.0, 0.0, 0.0, 1.0];
        wire.frame_id = String::new();
        assert!(wire.into_stamped().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_error_response_keeps_kind() {
        let err = TransformError::Extrapolation("too far in the future".to_string());
        let response = Response::error(&err);
        assert_eq!(
            response,
            Response::Error {
                kind: ErrorKind::Extrapolation,
                message: "too far in the future".to_string()
            }
        );
        assert_eq!(response.into_transform().unwrap_err(), err);
    }

    #[test]
    fn test_writer_errors_travel_as_other() {
        let err = TransformError::OutOfOrder("old".to_string());
        let back = Response::error(&err).into_transform().unwrap_err();
        assert_eq!(back, TransformError::Other("old".to_string()));
    }

    #[test]
    fn test_unexpected_response() {
        let err = Response::CanTransform(true).into_transform().unwrap_err();
        assert!(matches!(err, TransformError::Other(_)));
    }
}
