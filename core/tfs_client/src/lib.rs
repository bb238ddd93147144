//! Remote access to a transform server.
//!
//! ```no_run
//! use std::time::Duration;
//! use tfs_client::BufferClient;
//! use tfs_transform::{TfTime, TransformLookup};
//!
//! let client = BufferClient::new("/tf_service");
//! if client.wait_for_server(Duration::from_secs(1)) {
//!     let odom_in_map = client.lookup_transform("map", "odom", TfTime::LATEST, Duration::from_millis(100));
//!     println!("{odom_in_map:?}");
//! }
//! ```

mod client;
mod config;

pub use client::BufferClient;
pub use config::ClientConfig;
pub use tfs_transform::TransformLookup;
