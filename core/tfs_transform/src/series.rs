use crate::error::{TransformError, TransformResult};
use crate::interpolation::{extrapolate, interpolate, ExtrapolationPolicy};
use crate::transform::Transform3D;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tfs_clock::{TfDuration, TfTime};

/// One stored transform of an edge.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformSample {
    pub stamp: TfTime,
    pub transform: Transform3D,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Stored,
    /// A sample with the same stamp is already stored; samples are immutable so the
    /// new one was dropped.
    Duplicate,
}

/// Time ordered samples of a single parent -> child edge.
///
/// History is bounded twice: samples older than `cache_time` before the newest one
/// are evicted, and the series never holds more than `max_samples`.
/// A static series keeps a single sample that is valid at any time.
#[derive(Clone, Debug)]
pub struct TimeSeries {
    samples: VecDeque<TransformSample>,
    cache_time: TfDuration,
    max_samples: usize,
    match_tolerance: TfDuration,
    is_static: bool,
}

impl TimeSeries {
    pub fn new(cache_time: TfDuration, max_samples: usize, match_tolerance: TfDuration) -> Self {
        let max_samples = max_samples.max(1);
        Self {
            samples: VecDeque::with_capacity(max_samples.min(64)),
            cache_time,
            max_samples,
            match_tolerance,
            is_static: false,
        }
    }

    pub fn new_static() -> Self {
        Self {
            samples: VecDeque::with_capacity(1),
            cache_time: TfDuration::MAX,
            max_samples: 1,
            match_tolerance: TfDuration::ZERO,
            is_static: true,
        }
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn latest(&self) -> Option<&TransformSample> {
        self.samples.back()
    }

    pub fn oldest_stamp(&self) -> Option<TfTime> {
        self.samples.front().map(|s| s.stamp)
    }

    pub fn newest_stamp(&self) -> Option<TfTime> {
        self.samples.back().map(|s| s.stamp)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn insert(&mut self, sample: TransformSample) -> TransformResult<InsertOutcome> {
        if self.is_static {
            self.samples.clear();
            self.samples.push_back(sample);
            return Ok(InsertOutcome::Stored);
        }

        if let (Some(oldest), Some(newest)) = (self.oldest_stamp(), self.newest_stamp()) {
            let horizon = newest.saturating_sub(self.cache_time);
            if sample.stamp < oldest || sample.stamp < horizon {
                return Err(TransformError::OutOfOrder(format!(
                    "sample at {} is older than the retained history ({} to {})",
                    sample.stamp.as_nanos(),
                    oldest.as_nanos(),
                    newest.as_nanos()
                )));
            }
        }

        let pos = self.samples.partition_point(|s| s.stamp < sample.stamp);
        if self
            .samples
            .get(pos)
            .is_some_and(|existing| existing.stamp == sample.stamp)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        self.samples.insert(pos, sample);
        self.evict();
        Ok(InsertOutcome::Stored)
    }

    fn evict(&mut self) {
        let Some(newest) = self.newest_stamp() else {
            return;
        };
        let horizon = newest.saturating_sub(self.cache_time);
        while self.samples.len() > 1 && self.samples.front().is_some_and(|s| s.stamp < horizon)
        {
            self.samples.pop_front();
        }
        while self.samples.len() > self.max_samples {
            self.samples.pop_front();
        }
    }

    /// Sample valid at `time`.
    ///
    /// Zero means the newest sample. Inside the stored range the result is either a
    /// stored sample (within the match tolerance) or an interpolation of the two
    /// bracketing samples. Outside of it `policy` decides.
    pub fn lookup(
        &self,
        time: TfTime,
        policy: ExtrapolationPolicy,
    ) -> TransformResult<TransformSample> {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return Err(TransformError::Lookup(
                "no data is stored for this edge".to_string(),
            ));
        };

        if self.is_static {
            return Ok(TransformSample {
                stamp: if time.is_zero() { last.stamp } else { time },
                transform: last.transform,
            });
        }

        if time.is_zero() {
            return Ok(*last);
        }

        let pos = self.samples.partition_point(|s| s.stamp <= time);
        let before = pos.checked_sub(1).and_then(|i| self.samples.get(i));
        let after = self.samples.get(pos);

        if let Some(exact) = [before, after]
            .into_iter()
            .flatten()
            .filter(|s| s.stamp.abs_diff(time) <= self.match_tolerance)
            .min_by_key(|s| s.stamp.abs_diff(time))
        {
            return Ok(*exact);
        }

        match (before, after) {
            (Some(before), Some(after)) => Ok(TransformSample {
                stamp: time,
                transform: interpolate(before, after, time),
            }),
            (None, Some(_)) => {
                let distance = first.stamp - time;
                if !policy.permits(distance) {
                    return Err(TransformError::Extrapolation(format!(
                        "lookup would require extrapolation {distance} into the past. \
                         Requested time {} but the earliest data is at time {}",
                        time.as_nanos(),
                        first.stamp.as_nanos()
                    )));
                }
                Ok(self.extrapolated(time, true))
            }
            (Some(_), None) => {
                let distance = time - last.stamp;
                if !policy.permits(distance) {
                    return Err(TransformError::Extrapolation(format!(
                        "lookup would require extrapolation {distance} into the future. \
                         Requested time {} but the latest data is at time {}",
                        time.as_nanos(),
                        last.stamp.as_nanos()
                    )));
                }
                Ok(self.extrapolated(time, false))
            }
            (None, None) => Err(TransformError::Lookup(
                "no data is stored for this edge".to_string(),
            )),
        }
    }

    fn extrapolated(&self, time: TfTime, into_past: bool) -> TransformSample {
        let n = self.samples.len();
        let transform = if n < 2 {
            self.samples[0].transform
        } else if into_past {
            extrapolate(&self.samples[0], &self.samples[1], time)
        } else {
            extrapolate(&self.samples[n - 2], &self.samples[n - 1], time)
        };
        TransformSample {
            stamp: time,
            transform,
        }
    }
}
