use crate::config::ClientConfig;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tfs_protocol::{
    read_message, socket_path, write_message, HelloMessage, ProtocolError, ProtocolResult,
    Request, RequestEnvelope, Response, ResponseEnvelope, PROTOCOL_VERSION,
};
use tfs_transform::{
    StampedTransform, TransformError, TransformLookup, TransformQuery, TransformResult,
};
use tokio::net::UnixStream;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout_at, Instant};

// stands in for deadlines that do not fit in an Instant
const FAR_FUTURE: Duration = Duration::from_secs(u32::MAX as u64);

fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

#[derive(Debug, Default)]
struct Connection {
    /// None while connected means the last call timed out and the stream was
    /// dropped; the next call reconnects.
    stream: Option<UnixStream>,
}

/// Queries a transform server as if its frame graph were local.
///
/// The client starts disconnected. [`BufferClient::wait_for_server`] connects it;
/// until then, and after the server goes away, every query fails right away with
/// [`TransformError::Connectivity`] (or `false` for the `can_*` family).
///
/// All queries come from [`TransformLookup`], so code written against the trait
/// runs unchanged on a [`tfs_transform::TransformEngine`] or on this client. The
/// client can be shared between threads, calls are serialized on its connection.
/// Its methods block the calling thread and must not be used from async code.
pub struct BufferClient {
    service_name: String,
    socket_path: Option<PathBuf>,
    config: ClientConfig,
    state: Mutex<Connection>,
    connected: AtomicBool,
    next_id: AtomicU64,
    runtime: Option<Runtime>,
}

impl BufferClient {
    pub fn new(service_name: &str) -> Self {
        Self::with_config(service_name, ClientConfig::default())
    }

    pub fn with_config(service_name: &str, config: ClientConfig) -> Self {
        let socket_path = match socket_path(&config.socket_dir, service_name) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("{e}, this client will never connect");
                None
            }
        };
        let runtime = match Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("tfs-client")
            .enable_all()
            .build()
        {
            Ok(runtime) => Some(runtime),
            Err(e) => {
                warn!("Failed to start the client runtime: {e}, this client will never connect");
                None
            }
        };
        Self {
            service_name: service_name.to_string(),
            socket_path,
            config,
            state: Mutex::new(Connection::default()),
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            runtime,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn socket_path(&self) -> Option<&Path> {
        self.socket_path.as_deref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Last known connection state. Does not contact the server.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Tries to reach the server until `timeout` runs out. Returns whether the
    /// client is connected.
    pub fn wait_for_server(&self, timeout: Duration) -> bool {
        if self.is_connected() {
            return true;
        }
        let (Some(runtime), Some(path)) = (&self.runtime, &self.socket_path) else {
            return false;
        };
        let deadline = deadline_after(timeout);
        runtime.block_on(async {
            loop {
                // a server that accepts but stays silent gets retried after rpc_grace
                let attempt_deadline = deadline.min(deadline_after(self.config.rpc_grace));
                match timeout_at(attempt_deadline, self.open(path)).await {
                    Ok(Ok(stream)) => return self.install(stream, deadline).await,
                    Ok(Err(e)) => debug!("{} not reachable yet: {e}", self.service_name),
                    Err(_) => debug!("{} did not answer the hello in time", self.service_name),
                }
                let now = Instant::now();
                if now >= deadline {
                    return false;
                }
                sleep(self.config.retry_interval.min(deadline - now)).await;
            }
        })
    }

    async fn install(&self, stream: UnixStream, deadline: Instant) -> bool {
        let Ok(mut state) = timeout_at(deadline, self.state.lock()).await else {
            return false;
        };
        state.stream = Some(stream);
        self.connected.store(true, Ordering::Release);
        info!("Connected to {}", self.service_name);
        true
    }

    fn next_request_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Connects and performs the hello / welcome exchange.
    async fn open(&self, path: &Path) -> ProtocolResult<UnixStream> {
        let mut stream = UnixStream::connect(path).await?;
        let hello = RequestEnvelope {
            id: self.next_request_id(),
            request: Request::Hello(HelloMessage::new(format!(
                "tfs-client/{}",
                std::process::id()
            ))),
        };
        write_message(&mut stream, &hello).await?;
        let reply: ResponseEnvelope = read_message(&mut stream).await?;
        match reply.response {
            Response::Welcome(welcome) if welcome.version == PROTOCOL_VERSION => Ok(stream),
            Response::Welcome(welcome) => Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION.to_string(),
                actual: welcome.version,
            }),
            Response::Error { message, .. } => Err(ProtocolError::Unexpected(message)),
            other => Err(ProtocolError::Unexpected(format!("{other:?}"))),
        }
    }

    fn mark_disconnected(&self, state: &mut Connection, cause: &ProtocolError) {
        if self.connected.swap(false, Ordering::AcqRel) {
            warn!("Lost connection to {}: {cause}", self.service_name);
        }
        state.stream = None;
    }

    fn not_connected(&self) -> TransformError {
        TransformError::Connectivity(format!(
            "not connected to {}, wait_for_server() has not succeeded",
            self.service_name
        ))
    }

    /// One request, one response, all within `timeout` plus the configured grace.
    fn call(&self, request: Request, timeout: Duration) -> TransformResult<Response> {
        if !self.is_connected() {
            return Err(self.not_connected());
        }
        let (Some(runtime), Some(path)) = (&self.runtime, &self.socket_path) else {
            return Err(self.not_connected());
        };
        let budget = timeout.saturating_add(self.config.rpc_grace);
        let deadline = deadline_after(budget);
        let expired = || {
            TransformError::Timeout(format!(
                "{} did not answer within {budget:?}",
                self.service_name
            ))
        };
        runtime.block_on(async {
            let Ok(mut state) = timeout_at(deadline, self.state.lock()).await else {
                return Err(expired());
            };
            if !self.is_connected() {
                return Err(self.not_connected());
            }
            match timeout_at(deadline, self.exchange(&mut state, path, request)).await {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => {
                    self.mark_disconnected(&mut state, &e);
                    Err(TransformError::Connectivity(format!(
                        "lost connection to {}: {e}",
                        self.service_name
                    )))
                }
                Err(_) => {
                    // a late answer would desynchronize the stream
                    state.stream = None;
                    Err(expired())
                }
            }
        })
    }

    async fn exchange(
        &self,
        state: &mut Connection,
        path: &Path,
        request: Request,
    ) -> ProtocolResult<Response> {
        if state.stream.is_none() {
            state.stream = Some(self.open(path).await?);
        }
        let Some(stream) = state.stream.as_mut() else {
            return Err(ProtocolError::Closed);
        };
        let id = self.next_request_id();
        write_message(stream, &RequestEnvelope { id, request }).await?;
        let reply: ResponseEnvelope = read_message(stream).await?;
        if reply.id != id {
            return Err(ProtocolError::Unexpected(format!(
                "response {} to request {id}",
                reply.id
            )));
        }
        Ok(reply.response)
    }
}

impl TransformLookup for BufferClient {
    fn transform_query(
        &self,
        query: &TransformQuery,
        timeout: Duration,
    ) -> TransformResult<StampedTransform> {
        let request = Request::LookupTransform {
            query: query.clone(),
            timeout: timeout.into(),
        };
        self.call(request, timeout)?.into_transform()
    }

    fn can_transform_query(&self, query: &TransformQuery, timeout: Duration) -> bool {
        let request = Request::CanTransform {
            query: query.clone(),
            timeout: timeout.into(),
        };
        match self.call(request, timeout) {
            Ok(Response::CanTransform(answer)) => answer,
            Ok(other) => {
                warn!("Unexpected answer to can_transform: {other:?}");
                false
            }
            Err(e) => {
                debug!("can_transform failed: {e}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tfs_clock::TfTime;

    #[test]
    fn test_starts_disconnected() {
        let client = BufferClient::new("/tf_service");
        assert!(!client.is_connected());
        assert!(client
            .socket_path()
            .unwrap()
            .ends_with("tf_service.sock"));
        let err = client
            .lookup_transform("map", "odom", TfTime::LATEST, Duration::ZERO)
            .unwrap_err();
        assert!(matches!(err, TransformError::Connectivity(_)));
        assert!(!client.can_transform("map", "odom", TfTime::LATEST, Duration::ZERO));
    }

    #[test]
    fn test_invalid_service_name_never_connects() {
        let client = BufferClient::new("no spaces allowed");
        assert!(client.socket_path().is_none());
        assert!(!client.wait_for_server(Duration::from_millis(30)));
        assert!(!client.is_connected());
    }

    #[test]
    fn test_deadline_saturates() {
        let far = deadline_after(Duration::MAX);
        assert!(far > Instant::now() + Duration::from_secs(3600));
        let soon = deadline_after(Duration::from_millis(10));
        assert!(soon <= Instant::now() + Duration::from_millis(10));
    }
}
