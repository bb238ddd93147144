//! Serves transform queries against a shared [`FrameGraph`] over a Unix socket.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tfs_server::{ServerConfig, TransformServer};
//! use tfs_transform::FrameGraph;
//!
//! let config = ServerConfig::default();
//! let graph = Arc::new(FrameGraph::new(config.graph_config()));
//! let handle = TransformServer::from_config(&config, graph.clone())?.spawn();
//! // writers keep inserting into `graph` while the server answers queries
//! handle.shutdown();
//! # Ok::<(), tfs_server::ServerError>(())
//! ```
//!
//! [`FrameGraph`]: tfs_transform::FrameGraph

pub mod config;
pub mod error;
pub mod handler;
pub mod server;

pub use config::{LogLevel, ServerConfig, StaticTransformConfig};
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use server::{ServerHandle, TransformServer};
