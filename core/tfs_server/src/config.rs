use crate::error::{ServerError, ServerResult};
use log::LevelFilter;
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use tfs_clock::TfDuration;
use tfs_protocol::{default_socket_dir, validate_service_name, DEFAULT_SERVICE_NAME};
use tfs_transform::{ExtrapolationPolicy, FrameGraph, GraphConfig, Transform3D};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// A transform loaded at startup that never changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticTransformConfig {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub translation: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

/// Server settings, read from a RON file. Every field is optional.
///
/// ```ron
/// (
///     service_name: "/tf_service",
///     cache_time: 10000000000,
///     extrapolation: Bounded(100000000),
///     static_transforms: [
///         (parent: "base_link", child: "laser", translation: (0.1, 0.0, 0.2)),
///     ],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub service_name: String,
    /// Defaults to `$TFS_SOCKET_DIR`, then to `tf_service` in the temp directory.
    pub socket_dir: Option<PathBuf>,
    /// Nanoseconds of history kept per edge.
    pub cache_time: TfDuration,
    pub max_samples: usize,
    pub extrapolation: ExtrapolationPolicy,
    /// Nanoseconds.
    pub match_tolerance: TfDuration,
    pub log_level: LogLevel,
    pub static_transforms: Vec<StaticTransformConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let graph = GraphConfig::default();
        Self {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            socket_dir: None,
            cache_time: graph.cache_time,
            max_samples: graph.max_samples,
            extrapolation: graph.extrapolation,
            match_tolerance: graph.match_tolerance,
            log_level: LogLevel::default(),
            static_transforms: Vec::new(),
        }
    }
}

impl ServerConfig {
    fn ron_options() -> Options {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES)
            .with_default_extension(Extensions::UNWRAP_VARIANT_NEWTYPES)
    }

    pub fn from_file(path: &Path) -> ServerResult<Self> {
        let content = read_to_string(path).map_err(|source| ServerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&content)
    }

    pub fn from_ron_str(content: &str) -> ServerResult<Self> {
        let config: Self = Self::ron_options().from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ServerResult<()> {
        validate_service_name(&self.service_name)?;
        if self.max_samples == 0 {
            return Err(ServerError::InvalidConfig(
                "max_samples must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig {
            cache_time: self.cache_time,
            max_samples: self.max_samples,
            extrapolation: self.extrapolation,
            match_tolerance: self.match_tolerance,
        }
    }

    pub fn socket_dir(&self) -> PathBuf {
        self.socket_dir.clone().unwrap_or_else(default_socket_dir)
    }

    pub fn apply_static_transforms(&self, graph: &FrameGraph) -> ServerResult<()> {
        for entry in &self.static_transforms {
            let transform = Transform3D::from_arrays(entry.translation, entry.rotation)?;
            graph.insert_static(
                &entry.parent,
                &entry.child,
                transform.translation,
                transform.rotation,
            )?;
        }
        Ok(())
    }
}
