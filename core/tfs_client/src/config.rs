use std::path::PathBuf;
use std::time::Duration;
use tfs_protocol::default_socket_dir;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Where service sockets live, must match the server's.
    pub socket_dir: PathBuf,
    /// Pause between connection attempts in [`crate::BufferClient::wait_for_server`].
    pub retry_interval: Duration,
    /// Extra time granted on top of a call's own timeout for the round trip.
    /// Past it the call fails with a timeout error.
    pub rpc_grace: Duration,
}

impl ClientConfig {
    pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(20);
    pub const DEFAULT_RPC_GRACE: Duration = Duration::from_millis(250);
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_dir: default_socket_dir(),
            retry_interval: Self::DEFAULT_RETRY_INTERVAL,
            rpc_grace: Self::DEFAULT_RPC_GRACE,
        }
    }
}
