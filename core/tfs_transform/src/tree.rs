use crate::config::GraphConfig;
use crate::error::{TransformError, TransformResult};
use crate::frames::{validate_frame_id, FrameIdString};
use crate::series::{InsertOutcome, TimeSeries, TransformSample};
use crate::transform::Transform3D;
use dashmap::DashMap;
use glam::{DQuat, DVec3};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Condvar, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::Instant;
use tfs_clock::{RobotClock, TfDuration, TfTime};

type SeriesHandle = Arc<RwLock<TimeSeries>>;

// A poisoned lock only means a panic happened while it was held; every mutation
// under these locks is a single insert or clear, so the data is still coherent.
fn read_lock<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct FrameRecord {
    name: FrameIdString,
    parent: Option<usize>,
}

/// Frame arena. Frames are created on first use and never removed, so indices stay
/// valid for the life of the graph.
#[derive(Debug, Default)]
struct Topology {
    indices: HashMap<FrameIdString, usize>,
    records: Vec<FrameRecord>,
}

impl Topology {
    fn index_of(&self, name: &FrameIdString) -> Option<usize> {
        self.indices.get(name).copied()
    }

    fn ensure_frame(&mut self, name: FrameIdString) -> usize {
        if let Some(index) = self.indices.get(&name) {
            return *index;
        }
        let index = self.records.len();
        self.records.push(FrameRecord { name, parent: None });
        self.indices.insert(name, index);
        index
    }

    /// True if `ancestor` is `frame` or lies on its parent chain.
    fn is_ancestor(&self, ancestor: usize, frame: usize) -> bool {
        let mut current = frame;
        for _ in 0..=self.records.len() {
            if current == ancestor {
                return true;
            }
            match self.records[current].parent {
                Some(parent) => current = parent,
                None => return false,
            }
        }
        false
    }
}

/// Wakes up lookups waiting for new data.
#[derive(Debug, Default)]
struct UpdateSignal {
    generation: Mutex<u64>,
    changed: Condvar,
}

impl UpdateSignal {
    fn current(&self) -> u64 {
        *self.generation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        *generation = generation.wrapping_add(1);
        self.changed.notify_all();
    }

    fn wait_past(&self, seen: u64, deadline: Instant) -> bool {
        let mut generation = self.generation.lock().unwrap_or_else(PoisonError::into_inner);
        while *generation == seen {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            generation = self
                .changed
                .wait_timeout(generation, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Path between two frames through their lowest common ancestor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePath {
    pub common_ancestor: FrameIdString,
    /// `(parent, child)` edges walked up from the first frame to the ancestor.
    pub up_from_first: Vec<(FrameIdString, FrameIdString)>,
    /// `(parent, child)` edges walked up from the second frame to the ancestor.
    pub up_from_second: Vec<(FrameIdString, FrameIdString)>,
}

/// Edges are identified by their child frame, each child having a single parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PathIndices {
    pub ancestor: usize,
    pub first_chain: Vec<usize>,
    pub second_chain: Vec<usize>,
}

impl PathIndices {
    pub fn edges(&self) -> impl Iterator<Item = &usize> {
        self.first_chain.iter().chain(self.second_chain.iter())
    }
}

/// The time-indexed forest of frames.
///
/// The topology (which frame is the parent of which) sits behind one reader-writer
/// lock; each edge's [`TimeSeries`] has its own lock in a concurrent map. Adding a
/// sample to an existing edge only takes the topology for reading, so queries keep
/// running while writers append. Creating or reparenting an edge takes it for
/// writing.
pub struct FrameGraph {
    config: GraphConfig,
    clock: RobotClock,
    topology: RwLock<Topology>,
    series: DashMap<usize, SeriesHandle>,
    /// Newest dynamic sample stamp seen on any edge, the reference for staleness.
    newest_stamp: AtomicU64,
    updates: UpdateSignal,
}

impl Default for FrameGraph {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl FrameGraph {
    pub fn new(config: GraphConfig) -> Self {
        Self::with_clock(config, RobotClock::default())
    }

    /// The clock stamps static transforms.
    pub fn with_clock(config: GraphConfig, clock: RobotClock) -> Self {
        Self {
            config,
            clock,
            topology: RwLock::new(Topology::default()),
            series: DashMap::new(),
            newest_stamp: AtomicU64::new(0),
            updates: UpdateSignal::default(),
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn clock(&self) -> &RobotClock {
        &self.clock
    }

    /// Adds a sample to the `parent -> child` edge, creating frames and edge on
    /// first use.
    pub fn insert(
        &self,
        parent: &str,
        child: &str,
        stamp: TfTime,
        translation: DVec3,
        rotation: DQuat,
    ) -> TransformResult<InsertOutcome> {
        let transform = Transform3D::new(translation, rotation)?;
        self.insert_sample(parent, child, TransformSample { stamp, transform })
    }

    pub fn insert_sample(
        &self,
        parent: &str,
        child: &str,
        sample: TransformSample,
    ) -> TransformResult<InsertOutcome> {
        if sample.stamp.is_zero() {
            return Err(TransformError::InvalidArgument(format!(
                "sample for {parent} -> {child} has the reserved stamp 0"
            )));
        }
        self.insert_edge(parent, child, sample, false)
    }

    /// Sets a transform that never changes: it answers lookups at any time and
    /// never goes stale.
    pub fn insert_static(
        &self,
        parent: &str,
        child: &str,
        translation: DVec3,
        rotation: DQuat,
    ) -> TransformResult<InsertOutcome> {
        let transform = Transform3D::new(translation, rotation)?;
        let sample = TransformSample {
            stamp: self.clock.now(),
            transform,
        };
        self.insert_edge(parent, child, sample, true)
    }

    fn insert_edge(
        &self,
        parent: &str,
        child: &str,
        sample: TransformSample,
        is_static: bool,
    ) -> TransformResult<InsertOutcome> {
        let parent_id = validate_frame_id(parent, "parent_frame")?;
        let child_id = validate_frame_id(child, "child_frame")?;
        if parent_id == child_id {
            return Err(TransformError::InvalidArgument(format!(
                "frame '{child}' cannot be its own parent"
            )));
        }

        // Existing edge: appending only needs the topology for reading.
        {
            let topology = read_lock(&self.topology);
            if let (Some(p), Some(c)) = (topology.index_of(&parent_id), topology.index_of(&child_id))
            {
                if topology.records[c].parent == Some(p) {
                    if let Some(handle) = self.series_of(c) {
                        let mut series = write_lock(&handle);
                        if series.is_static() == is_static {
                            let outcome = series.insert(sample).map_err(|e| {
                                e.with_context(format!("on edge {parent} -> {child}"))
                            })?;
                            drop(series);
                            drop(topology);
                            self.after_insert(sample.stamp, is_static, outcome);
                            return Ok(outcome);
                        }
                    }
                }
            }
        }

        let mut topology = write_lock(&self.topology);
        let p = topology.index_of(&parent_id);
        let c = topology.index_of(&child_id);
        let current_parent = c.and_then(|c| topology.records[c].parent);
        let same_parent = p.is_some() && p == current_parent;

        if !same_parent {
            if let (Some(c), Some(existing)) = (c, current_parent) {
                let newest = TfDuration(self.newest_stamp.load(Ordering::Acquire));
                if !self.edge_is_stale(c, newest) {
                    return Err(TransformError::Connectivity(format!(
                        "frame '{child}' already has parent '{}', refusing to add '{parent}' as a second parent",
                        topology.records[existing].name
                    )));
                }
            }
            if let (Some(p), Some(c)) = (p, c) {
                if topology.is_ancestor(c, p) {
                    return Err(TransformError::Connectivity(format!(
                        "adding {parent} -> {child} would create a cycle"
                    )));
                }
            }
        }

        let p = topology.ensure_frame(parent_id);
        let c = topology.ensure_frame(child_id);
        if let Some(existing) = current_parent.filter(|_| !same_parent) {
            info!(
                "Reparenting stale frame '{}' from '{}' to '{}'",
                child, topology.records[existing].name, parent
            );
        }

        let reusable = self
            .series_of(c)
            .filter(|handle| same_parent && read_lock(handle).is_static() == is_static);
        let handle = match reusable {
            Some(handle) => handle,
            None => {
                debug!("New edge {parent} -> {child} (static: {is_static})");
                let handle = Arc::new(RwLock::new(self.new_series(is_static)));
                self.series.insert(c, handle.clone());
                handle
            }
        };
        topology.records[c].parent = Some(p);

        let outcome = write_lock(&handle)
            .insert(sample)
            .map_err(|e| e.with_context(format!("on edge {parent} -> {child}")))?;
        drop(topology);
        self.after_insert(sample.stamp, is_static, outcome);
        Ok(outcome)
    }

    fn new_series(&self, is_static: bool) -> TimeSeries {
        if is_static {
            TimeSeries::new_static()
        } else {
            TimeSeries::new(
                self.config.cache_time,
                self.config.max_samples,
                self.config.match_tolerance,
            )
        }
    }

    fn after_insert(&self, stamp: TfTime, is_static: bool, outcome: InsertOutcome) {
        match outcome {
            InsertOutcome::Stored => {
                if !is_static {
                    self.newest_stamp.fetch_max(stamp.as_nanos(), Ordering::AcqRel);
                }
                self.updates.notify();
            }
            InsertOutcome::Duplicate => {
                warn!("Ignoring a second sample at {}", stamp.as_nanos());
            }
        }
    }

    fn series_of(&self, child: usize) -> Option<SeriesHandle> {
        self.series.get(&child).map(|entry| entry.value().clone())
    }

    fn edge_is_stale(&self, child: usize, newest: TfTime) -> bool {
        let Some(handle) = self.series_of(child) else {
            return true;
        };
        let series = read_lock(&handle);
        if series.is_static() {
            return series.is_empty();
        }
        match series.newest_stamp() {
            Some(stamp) => stamp < newest.saturating_sub(self.config.cache_time),
            None => true,
        }
    }

    /// A consistent read-only view; no edge can be created or reparented while it
    /// is alive. Keep it short lived, writers creating edges wait for it.
    pub fn view(&self) -> GraphView<'_> {
        GraphView {
            graph: self,
            topology: read_lock(&self.topology),
            newest: TfDuration(self.newest_stamp.load(Ordering::Acquire)),
        }
    }

    /// Parent of `child` through a live edge.
    pub fn parent_of(&self, child: &str) -> Option<FrameIdString> {
        self.view().parent_of(child)
    }

    pub fn find_path(&self, first: &str, second: &str) -> TransformResult<FramePath> {
        self.view().find_path(first, second)
    }

    pub fn frame_exists(&self, name: &str) -> bool {
        self.view().frame_exists(name)
    }

    pub fn frame_count(&self) -> usize {
        read_lock(&self.topology).records.len()
    }

    pub fn frames(&self) -> Vec<FrameIdString> {
        read_lock(&self.topology)
            .records
            .iter()
            .map(|record| record.name)
            .collect()
    }

    /// One line per live edge: `Frame <child> exists with parent <parent>.`
    pub fn all_frames_as_string(&self) -> String {
        let view = self.view();
        let mut out = String::new();
        for (index, record) in view.topology.records.iter().enumerate() {
            if let Some(parent) = view.live_parent(index) {
                let _ = writeln!(
                    out,
                    "Frame {} exists with parent {}.",
                    record.name, view.topology.records[parent].name
                );
            }
        }
        out
    }

    /// Drops every stored sample. Frames stay known.
    pub fn clear(&self) {
        let _topology = write_lock(&self.topology);
        for entry in self.series.iter() {
            write_lock(entry.value()).clear();
        }
        self.newest_stamp.store(0, Ordering::Release);
        info!("Cleared all transform data");
        self.updates.notify();
    }

    /// Counter bumped on every stored sample.
    pub fn generation(&self) -> u64 {
        self.updates.current()
    }

    /// Blocks until the graph changes past `seen` or `deadline` passes.
    /// Returns false on deadline.
    pub fn wait_for_update(&self, seen: u64, deadline: Instant) -> bool {
        self.updates.wait_past(seen, deadline)
    }
}

/// Read-only snapshot of the graph topology, see [`FrameGraph::view`].
pub struct GraphView<'a> {
    graph: &'a FrameGraph,
    topology: RwLockReadGuard<'a, Topology>,
    newest: TfTime,
}

impl GraphView<'_> {
    pub fn config(&self) -> &GraphConfig {
        &self.graph.config
    }

    pub fn frame_exists(&self, name: &str) -> bool {
        FrameIdString::from(name)
            .ok()
            .and_then(|id| self.topology.index_of(&id))
            .is_some()
    }

    pub fn parent_of(&self, child: &str) -> Option<FrameIdString> {
        let id = FrameIdString::from(child).ok()?;
        let index = self.topology.index_of(&id)?;
        self.live_parent(index)
            .map(|parent| self.topology.records[parent].name)
    }

    pub(crate) fn name(&self, index: usize) -> FrameIdString {
        self.topology.records[index].name
    }

    /// Validates `name` and finds it, Lookup error if it was never seen.
    pub(crate) fn resolve_frame(&self, name: &str, argument: &str) -> TransformResult<usize> {
        let id = validate_frame_id(name, argument)?;
        self.topology.index_of(&id).ok_or_else(|| {
            TransformError::Lookup(format!(
                "frame '{name}' passed as {argument} does not exist"
            ))
        })
    }

    fn live_parent(&self, child: usize) -> Option<usize> {
        let parent = self.topology.records[child].parent?;
        if self.graph.edge_is_stale(child, self.newest) {
            None
        } else {
            Some(parent)
        }
    }

    /// `frame` followed by its ancestors up to the root of its live tree.
    fn chain(&self, frame: usize) -> Vec<usize> {
        let mut chain = vec![frame];
        let mut current = frame;
        while chain.len() <= self.topology.records.len() {
            match self.live_parent(current) {
                Some(parent) => {
                    chain.push(parent);
                    current = parent;
                }
                None => break,
            }
        }
        chain
    }

    pub(crate) fn path_indices(&self, first: usize, second: usize) -> TransformResult<PathIndices> {
        let first_ancestors = self.chain(first);
        let second_ancestors = self.chain(second);
        for (second_depth, frame) in second_ancestors.iter().enumerate() {
            if let Some(first_depth) = first_ancestors.iter().position(|f| f == frame) {
                return Ok(PathIndices {
                    ancestor: *frame,
                    first_chain: first_ancestors[..first_depth].to_vec(),
                    second_chain: second_ancestors[..second_depth].to_vec(),
                });
            }
        }
        Err(TransformError::Connectivity(format!(
            "could not find a connection between '{}' and '{}' because they are not part of the same tree",
            self.name(first),
            self.name(second)
        )))
    }

    pub fn find_path(&self, first: &str, second: &str) -> TransformResult<FramePath> {
        let a = self.resolve_frame(first, "first frame")?;
        let b = self.resolve_frame(second, "second frame")?;
        let path = self.path_indices(a, b)?;
        let edges = |chain: &[usize]| -> Vec<(FrameIdString, FrameIdString)> {
            chain
                .iter()
                .filter_map(|child| {
                    self.topology.records[*child]
                        .parent
                        .map(|parent| (self.name(parent), self.name(*child)))
                })
                .collect()
        };
        Ok(FramePath {
            common_ancestor: self.name(path.ancestor),
            up_from_first: edges(&path.first_chain),
            up_from_second: edges(&path.second_chain),
        })
    }

    /// Transform of the edge ending at `child` (pose of child in its parent) at `time`.
    pub(crate) fn edge_transform(&self, child: usize, time: TfTime) -> TransformResult<Transform3D> {
        let context = || {
            let parent = self.topology.records[child]
                .parent
                .map(|p| self.name(p))
                .unwrap_or_default();
            format!("when looking up transform from frame [{}] to frame [{}]", self.name(child), parent)
        };
        let handle = self
            .graph
            .series_of(child)
            .ok_or_else(|| TransformError::Lookup(format!("no edge ends at frame '{}'", self.name(child))))?;
        let series = read_lock(&handle);
        series
            .lookup(time, self.graph.config.extrapolation)
            .map(|sample| sample.transform)
            .map_err(|e| e.with_context(context()))
    }

    /// Newest stamp of a dynamic edge, None for static edges.
    pub(crate) fn edge_newest(&self, child: usize) -> Option<TfTime> {
        let handle = self.graph.series_of(child)?;
        let series = read_lock(&handle);
        if series.is_static() {
            None
        } else {
            series.newest_stamp()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample, secs};
    use std::thread;
    use std::time::Duration;

    fn insert_at(graph: &FrameGraph, parent: &str, child: &str, stamp: TfTime) -> TransformResult<InsertOutcome> {
        graph.insert(parent, child, stamp, DVec3::X, DQuat::IDENTITY)
    }

    #[test]
    fn test_insert_creates_frames() {
        let graph = FrameGraph::default();
        assert!(!graph.frame_exists("map"));
        insert_at(&graph, "map", "odom", secs(1)).unwrap();
        assert!(graph.frame_exists("map"));
        assert!(graph.frame_exists("odom"));
        assert_eq!(graph.frame_count(), 2);
        assert_eq!(graph.parent_of("odom").unwrap().as_str(), "map");
        assert_eq!(graph.parent_of("map"), None);
    }

    #[test]
    fn test_insert_rejects_bad_arguments() {
        let graph = FrameGraph::default();
        assert!(insert_at(&graph, "", "odom", secs(1)).unwrap_err().is_invalid_argument());
        assert!(insert_at(&graph, "map", "map", secs(1)).unwrap_err().is_invalid_argument());
        assert!(insert_at(&graph, "map", "odom", TfTime::LATEST)
            .unwrap_err()
            .is_invalid_argument());
        let err = graph
            .insert("map", "odom", secs(1), DVec3::ZERO, DQuat::from_xyzw(0.0, 0.0, 0.0, 0.0))
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(graph.frame_count(), 0);
    }

    #[test]
    fn test_cyclic_transforms() {
        let graph = FrameGraph::default();
        insert_at(&graph, "world", "robot", secs(1)).unwrap();
        insert_at(&graph, "robot", "sensor", secs(1)).unwrap();
        let result = insert_at(&graph, "sensor", "world", secs(1));
        assert!(matches!(result, Err(TransformError::Connectivity(_))));
    }

    #[test]
    fn test_second_parent_is_rejected() {
        let graph = FrameGraph::default();
        insert_at(&graph, "map", "base", secs(1)).unwrap();
        let err = insert_at(&graph, "odom", "base", secs(1)).unwrap_err();
        assert!(matches!(err, TransformError::Connectivity(_)));
        assert!(err.message().contains("already has parent 'map'"));
        assert_eq!(graph.parent_of("base").unwrap().as_str(), "map");
    }

    #[test]
    fn test_stale_edge_can_be_reparented() {
        let graph = FrameGraph::default();
        insert_at(&graph, "map", "base", secs(1)).unwrap();
        // another edge moves the graph time past the cache horizon of map -> base
        insert_at(&graph, "world", "other", secs(20)).unwrap();
        assert_eq!(graph.parent_of("base"), None);
        insert_at(&graph, "odom", "base", secs(20)).unwrap();
        assert_eq!(graph.parent_of("base").unwrap().as_str(), "odom");
    }

    #[test]
    fn test_find_path() {
        let graph = FrameGraph::default();
        insert_at(&graph, "world", "robot", secs(1)).unwrap();
        insert_at(&graph, "robot", "sensor", secs(1)).unwrap();
        insert_at(&graph, "robot", "camera", secs(1)).unwrap();

        let path = graph.find_path("sensor", "camera").unwrap();
        assert_eq!(path.common_ancestor.as_str(), "robot");
        assert_eq!(path.up_from_first.len(), 1);
        assert_eq!(path.up_from_first[0].0.as_str(), "robot");
        assert_eq!(path.up_from_first[0].1.as_str(), "sensor");
        assert_eq!(path.up_from_second[0].1.as_str(), "camera");

        let path = graph.find_path("sensor", "world").unwrap();
        assert_eq!(path.common_ancestor.as_str(), "world");
        assert_eq!(path.up_from_first.len(), 2);
        assert!(path.up_from_second.is_empty());
    }

    #[test]
    fn test_find_path_failures() {
        let graph = FrameGraph::default();
        insert_at(&graph, "a", "b", secs(1)).unwrap();
        insert_at(&graph, "c", "d", secs(1)).unwrap();
        assert!(matches!(graph.find_path("b", "d"), Err(TransformError::Connectivity(_))));
        assert!(matches!(graph.find_path("b", "zz"), Err(TransformError::Lookup(_))));
    }

    #[test]
    fn test_static_edges_never_go_stale() {
        let graph = FrameGraph::default();
        graph
            .insert_static("base", "laser", DVec3::Z, DQuat::IDENTITY)
            .unwrap();
        insert_at(&graph, "map", "base", secs(100)).unwrap();
        assert_eq!(graph.parent_of("laser").unwrap().as_str(), "base");
        assert!(graph.find_path("laser", "map").is_ok());
    }

    #[test]
    fn test_all_frames_as_string() {
        let graph = FrameGraph::default();
        insert_at(&graph, "map", "odom", secs(1)).unwrap();
        assert_eq!(graph.all_frames_as_string(), "Frame odom exists with parent map.\n");
        assert_eq!(graph.frames().len(), 2);
    }

    #[test]
    fn test_clear_keeps_frames() {
        let graph = FrameGraph::default();
        insert_at(&graph, "map", "odom", secs(1)).unwrap();
        graph.clear();
        assert!(graph.frame_exists("odom"));
        assert_eq!(graph.parent_of("odom"), None);
        assert!(matches!(graph.find_path("map", "odom"), Err(TransformError::Connectivity(_))));
        // same parent again after a clear is fine
        insert_at(&graph, "map", "odom", secs(2)).unwrap();
        assert!(graph.find_path("map", "odom").is_ok());
    }

    #[test]
    fn test_out_of_order_mentions_edge() {
        let graph = FrameGraph::default();
        insert_at(&graph, "map", "odom", secs(5)).unwrap();
        let err = insert_at(&graph, "map", "odom", secs(1)).unwrap_err();
        assert!(matches!(err, TransformError::OutOfOrder(_)));
        assert!(err.message().contains("map -> odom"));
    }

    #[test]
    fn test_update_signal() {
        let graph = Arc::new(FrameGraph::default());
        let seen = graph.generation();
        assert!(!graph.wait_for_update(seen, Instant::now() + Duration::from_millis(10)));

        let writer = {
            let graph = graph.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                graph
                    .insert_sample("map", "odom", sample(1000, 0.0, 0.0, 0.0))
                    .unwrap();
            })
        };
        assert!(graph.wait_for_update(seen, Instant::now() + Duration::from_secs(5)));
        writer.join().unwrap();
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let graph = Arc::new(FrameGraph::default());
        insert_at(&graph, "map", "odom", TfDuration(1)).unwrap();
        insert_at(&graph, "odom", "base", TfDuration(1)).unwrap();

        let writer = {
            let graph = graph.clone();
            thread::spawn(move || {
                for stamp in 2..500u64 {
                    insert_at(&graph, "odom", "base", TfDuration(stamp)).unwrap();
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let graph = graph.clone();
                thread::spawn(move || {
                    for _ in 0..200 {
                        assert!(graph.find_path("base", "map").is_ok());
                    }
                })
            })
            .collect();
        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
