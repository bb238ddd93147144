use crate::error::TransformResult;
use crate::query::{QueryTiming, TransformQuery};
use crate::transform::{StampedTransform, Transform3D};
use crate::tree::{FrameGraph, GraphView};
use log::trace;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tfs_clock::TfTime;

/// Anything that can answer transform queries, locally or over the wire.
///
/// Only [`TransformLookup::transform_query`] is required, every other method is
/// built on it. `timeout` bounds how long an implementation may wait for the data
/// to become available; zero means a single attempt.
pub trait TransformLookup {
    fn transform_query(
        &self,
        query: &TransformQuery,
        timeout: Duration,
    ) -> TransformResult<StampedTransform>;

    fn can_transform_query(&self, query: &TransformQuery, timeout: Duration) -> bool {
        self.transform_query(query, timeout).is_ok()
    }

    /// Pose of `source` expressed in `target` at `time`, zero meaning the latest
    /// time every edge on the path has data for.
    fn lookup_transform(
        &self,
        target: &str,
        source: &str,
        time: TfTime,
        timeout: Duration,
    ) -> TransformResult<StampedTransform> {
        self.transform_query(&TransformQuery::simple(target, source, time), timeout)
    }

    /// Pose of `source` at `source_time` expressed in `target` at `target_time`,
    /// going through `fixed`, which is assumed not to move in between.
    fn lookup_transform_full(
        &self,
        target: &str,
        target_time: TfTime,
        source: &str,
        source_time: TfTime,
        fixed: &str,
        timeout: Duration,
    ) -> TransformResult<StampedTransform> {
        let query = TransformQuery::advanced(target, target_time, source, source_time, fixed);
        self.transform_query(&query, timeout)
    }

    fn can_transform(&self, target: &str, source: &str, time: TfTime, timeout: Duration) -> bool {
        self.can_transform_query(&TransformQuery::simple(target, source, time), timeout)
    }

    fn can_transform_full(
        &self,
        target: &str,
        target_time: TfTime,
        source: &str,
        source_time: TfTime,
        fixed: &str,
        timeout: Duration,
    ) -> bool {
        let query = TransformQuery::advanced(target, target_time, source, source_time, fixed);
        self.can_transform_query(&query, timeout)
    }
}

/// Answers queries against a shared [`FrameGraph`].
#[derive(Clone)]
pub struct TransformEngine {
    graph: Arc<FrameGraph>,
}

impl TransformEngine {
    pub fn new(graph: Arc<FrameGraph>) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &Arc<FrameGraph> {
        &self.graph
    }

    /// One attempt against the current graph contents.
    pub fn resolve(&self, query: &TransformQuery) -> TransformResult<StampedTransform> {
        // a single view per query: two nested read locks could deadlock behind a writer
        let view = self.graph.view();
        match &query.timing {
            QueryTiming::Simple { time } => {
                lookup_in(&view, &query.target_frame, &query.source_frame, *time)
            }
            QueryTiming::Advanced {
                target_time,
                source_time,
                fixed_frame,
            } => {
                view.resolve_frame(&query.target_frame, "target_frame")?;
                view.resolve_frame(&query.source_frame, "source_frame")?;
                view.resolve_frame(fixed_frame, "fixed_frame")?;
                let fixed_from_source =
                    lookup_in(&view, fixed_frame, &query.source_frame, *source_time)?;
                let target_from_fixed =
                    lookup_in(&view, &query.target_frame, fixed_frame, *target_time)?;
                Ok(StampedTransform {
                    transform: target_from_fixed.transform * fixed_from_source.transform,
                    stamp: target_from_fixed.stamp,
                    frame_id: target_from_fixed.frame_id,
                    child_frame_id: fixed_from_source.child_frame_id,
                })
            }
        }
    }

    /// Retries [`Self::resolve`] as the graph changes until it succeeds or
    /// `timeout` elapses, then returns the last error. Invalid arguments fail
    /// immediately since waiting cannot fix them.
    pub fn resolve_within(
        &self,
        query: &TransformQuery,
        timeout: Duration,
    ) -> TransformResult<StampedTransform> {
        let start = Instant::now();
        let deadline = start
            .checked_add(timeout)
            .unwrap_or_else(|| start + Duration::from_secs(u32::MAX as u64));
        loop {
            let seen = self.graph.generation();
            match self.resolve(query) {
                Ok(transform) => return Ok(transform),
                Err(e) if e.is_invalid_argument() => return Err(e),
                Err(e) => {
                    if Instant::now() >= deadline {
                        trace!(
                            "Giving up on {} -> {} after {:?}: {e}",
                            query.source_frame,
                            query.target_frame,
                            start.elapsed()
                        );
                        return Err(e);
                    }
                    self.graph.wait_for_update(seen, deadline);
                }
            }
        }
    }
}

impl TransformLookup for TransformEngine {
    fn transform_query(
        &self,
        query: &TransformQuery,
        timeout: Duration,
    ) -> TransformResult<StampedTransform> {
        self.resolve_within(query, timeout)
    }
}

fn lookup_in(
    view: &GraphView<'_>,
    target: &str,
    source: &str,
    time: TfTime,
) -> TransformResult<StampedTransform> {
    let target_index = view.resolve_frame(target, "target_frame")?;
    let source_index = view.resolve_frame(source, "source_frame")?;

    if target_index == source_index {
        let stamp = if time.is_zero() {
            view.edge_newest(source_index).unwrap_or(time)
        } else {
            time
        };
        return Ok(StampedTransform {
            transform: Transform3D::IDENTITY,
            stamp,
            frame_id: view.name(target_index),
            child_frame_id: view.name(source_index),
        });
    }

    let path = view.path_indices(source_index, target_index)?;
    let time = if time.is_zero() {
        // latest common time: the oldest of the newest samples along the path
        path.edges()
            .filter_map(|child| view.edge_newest(*child))
            .min()
            .unwrap_or(time)
    } else {
        time
    };

    let ancestor_from_source = compose_chain(view, &path.first_chain, time)?;
    let ancestor_from_target = compose_chain(view, &path.second_chain, time)?;
    Ok(StampedTransform {
        transform: ancestor_from_target.inverse() * ancestor_from_source,
        stamp: time,
        frame_id: view.name(target_index),
        child_frame_id: view.name(source_index),
    })
}

/// Pose of the chain's first frame in the parent of its last edge.
fn compose_chain(view: &GraphView<'_>, chain: &[usize], time: TfTime) -> TransformResult<Transform3D> {
    chain.iter().try_fold(Transform3D::IDENTITY, |result, child| {
        Ok(view.edge_transform(*child, time)? * result)
    })
}
