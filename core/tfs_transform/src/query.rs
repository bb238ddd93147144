use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};
use tfs_clock::TfTime;

/// When the target and source frames are evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub enum QueryTiming {
    /// Both frames at the same instant. Zero means the latest common time.
    Simple { time: TfTime },
    /// Target and source at different instants, bridged through a frame assumed
    /// not to move between them.
    Advanced {
        target_time: TfTime,
        source_time: TfTime,
        fixed_frame: String,
    },
}

/// A transform request: where `source_frame` is, expressed in `target_frame`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Encode, Decode)]
pub struct TransformQuery {
    pub target_frame: String,
    pub source_frame: String,
    pub timing: QueryTiming,
}

impl TransformQuery {
    pub fn simple(target_frame: &str, source_frame: &str, time: TfTime) -> Self {
        Self {
            target_frame: target_frame.to_string(),
            source_frame: source_frame.to_string(),
            timing: QueryTiming::Simple { time },
        }
    }

    pub fn advanced(
        target_frame: &str,
        target_time: TfTime,
        source_frame: &str,
        source_time: TfTime,
        fixed_frame: &str,
    ) -> Self {
        Self {
            target_frame: target_frame.to_string(),
            source_frame: source_frame.to_string(),
            timing: QueryTiming::Advanced {
                target_time,
                source_time,
                fixed_frame: fixed_frame.to_string(),
            },
        }
    }
}
