use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use log::{debug, error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tfs_protocol::{
    decode_message, peek_request_id, read_frame, socket_path, write_message, Request,
    RequestEnvelope, Response, ResponseEnvelope,
};
use tfs_transform::{ErrorKind, FrameGraph, TransformEngine};
use tokio::net::{UnixListener, UnixStream};
use tokio::runtime::{Builder, Runtime};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// A bound, not yet accepting, transform service.
pub struct TransformServer {
    service_name: String,
    socket_path: PathBuf,
    listener: UnixListener,
    handler: Arc<RequestHandler>,
    runtime: Runtime,
}

impl TransformServer {
    /// Binds the socket of `service_name` in `socket_dir`.
    ///
    /// A socket file left behind by a dead server is replaced; one that still
    /// accepts connections is an error.
    pub fn bind(
        service_name: &str,
        socket_dir: &Path,
        graph: Arc<FrameGraph>,
    ) -> ServerResult<Self> {
        let path = socket_path(socket_dir, service_name)?;
        fs::create_dir_all(socket_dir)?;
        if path.exists() {
            if std::os::unix::net::UnixStream::connect(&path).is_ok() {
                return Err(ServerError::AlreadyRunning {
                    name: service_name.to_string(),
                    path,
                });
            }
            warn!("Removing stale socket {}", path.display());
            fs::remove_file(&path)?;
        }
        let runtime = Builder::new_multi_thread()
            .thread_name("tfs-server")
            .enable_all()
            .build()?;
        let listener = {
            let _context = runtime.enter();
            UnixListener::bind(&path)?
        };
        let handler = RequestHandler::new(TransformEngine::new(graph), service_name);
        Ok(Self {
            service_name: service_name.to_string(),
            socket_path: path,
            listener,
            handler: Arc::new(handler),
            runtime,
        })
    }

    pub fn from_config(config: &ServerConfig, graph: Arc<FrameGraph>) -> ServerResult<Self> {
        Self::bind(&config.service_name, &config.socket_dir(), graph)
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Starts accepting connections in the background.
    pub fn spawn(self) -> ServerHandle {
        let Self {
            service_name,
            socket_path,
            listener,
            handler,
            runtime,
        } = self;
        info!("Serving {service_name} on {}", socket_path.display());
        let (stop, stopped) = watch::channel(false);
        let connections = Arc::new(AtomicUsize::new(0));
        let accept = runtime.spawn(accept_loop(listener, handler, stopped, connections.clone()));
        ServerHandle {
            stop,
            accept: Some(accept),
            connections,
            socket_path,
            runtime: Some(runtime),
        }
    }
}

async fn accept_loop(
    listener: UnixListener,
    handler: Arc<RequestHandler>,
    mut stopped: watch::Receiver<bool>,
    live: Arc<AtomicUsize>,
) {
    let mut connections = JoinSet::new();
    let mut next_id = 0u64;
    loop {
        tokio::select! {
            _ = stopped.changed() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => {
                    let id = next_id;
                    next_id += 1;
                    let guard = LiveConnection::new(live.clone());
                    connections.spawn(serve_connection(id, stream, handler.clone(), guard));
                }
                Err(e) => warn!("Failed to accept a connection: {e}"),
            },
            Some(finished) = connections.join_next(), if !connections.is_empty() => {
                if let Err(e) = finished {
                    error!("Connection task failed: {e}");
                }
            }
        }
    }
    // closes every stream, requests still waiting on the graph are left to expire
    connections.shutdown().await;
    debug!("Accept loop stopped");
}

struct LiveConnection(Arc<AtomicUsize>);

impl LiveConnection {
    fn new(count: Arc<AtomicUsize>) -> Self {
        count.fetch_add(1, Ordering::AcqRel);
        Self(count)
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Answers requests on one connection until the peer leaves. Requests are handled
/// in order, a slow one only delays this connection.
async fn serve_connection(
    id: u64,
    mut stream: UnixStream,
    handler: Arc<RequestHandler>,
    _live: LiveConnection,
) {
    debug!("Connection {id} opened");
    let mut greeted = false;
    loop {
        let payload = match read_frame(&mut stream).await {
            Ok(payload) => payload,
            Err(e) if e.is_disconnect() => break,
            Err(e) => {
                warn!("Connection {id}: {e}, closing");
                break;
            }
        };
        let envelope: RequestEnvelope = match decode_message(&payload) {
            Ok(envelope) => envelope,
            Err(e) => match peek_request_id(&payload) {
                Some(request_id) => {
                    warn!("Connection {id}: malformed request {request_id}: {e}");
                    let response = Response::Error {
                        kind: ErrorKind::InvalidArgument,
                        message: format!("malformed request: {e}"),
                    };
                    if !reply(&mut stream, request_id, response).await {
                        break;
                    }
                    continue;
                }
                None => {
                    warn!("Connection {id}: unreadable frame, closing");
                    break;
                }
            },
        };

        let request_id = envelope.id;
        let is_hello = matches!(envelope.request, Request::Hello(_));
        let response = if !greeted && !is_hello {
            Response::Error {
                kind: ErrorKind::InvalidArgument,
                message: "the connection must start with a hello".to_string(),
            }
        } else {
            // lookups block on the graph until their own deadline
            let handler = handler.clone();
            let request = envelope.request;
            match tokio::task::spawn_blocking(move || handler.handle(request)).await {
                Ok(response) => response,
                Err(e) => {
                    error!("Connection {id}: request {request_id} failed: {e}");
                    Response::Error {
                        kind: ErrorKind::Other,
                        message: "internal server error".to_string(),
                    }
                }
            }
        };
        let rejected = matches!(response, Response::Error { .. });
        if !reply(&mut stream, request_id, response).await {
            break;
        }
        if is_hello {
            if rejected {
                break;
            }
            greeted = true;
        }
    }
    debug!("Connection {id} closed");
}

/// False once the peer can no longer be written to.
async fn reply(stream: &mut UnixStream, id: u64, response: Response) -> bool {
    match write_message(stream, &ResponseEnvelope { id, response }).await {
        Ok(()) => true,
        Err(e) => {
            if !e.is_disconnect() {
                warn!("Failed to send response {id}: {e}");
            }
            false
        }
    }
}

/// A running server. Dropping it stops the server.
///
/// Stopping blocks the calling thread until every connection is closed, so the
/// handle must not be dropped from inside an async context.
pub struct ServerHandle {
    stop: watch::Sender<bool>,
    accept: Option<JoinHandle<()>>,
    connections: Arc<AtomicUsize>,
    socket_path: PathBuf,
    runtime: Option<Runtime>,
}

impl ServerHandle {
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Number of clients currently connected.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// Closes the socket and every open connection. Lookups still waiting for
    /// data are abandoned, their clients see the connection close.
    pub fn shutdown(mut self) {
        self.stop_now();
    }

    fn stop_now(&mut self) {
        let (Some(accept), Some(runtime)) = (self.accept.take(), self.runtime.take()) else {
            return;
        };
        self.stop.send_replace(true);
        if let Err(e) = runtime.block_on(accept) {
            error!("Accept task failed: {e}");
        }
        if let Err(e) = fs::remove_file(&self.socket_path) {
            debug!("Could not remove {}: {e}", self.socket_path.display());
        }
        runtime.shutdown_background();
        info!("Server on {} stopped", self.socket_path.display());
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        self.stop_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;
    use tfs_clock::TfDuration;
    use tfs_protocol::{read_message, HelloMessage};
    use tfs_transform::{DQuat, DVec3, TransformQuery};
    use tokio::io::AsyncWriteExt;

    fn graph() -> Arc<FrameGraph> {
        let graph = Arc::new(FrameGraph::default());
        graph
            .insert("map", "odom", TfDuration::from_secs(1), DVec3::X, DQuat::IDENTITY)
            .unwrap();
        graph
    }

    fn start(dir: &Path) -> ServerHandle {
        TransformServer::bind("/tf_service", dir, graph())
            .unwrap()
            .spawn()
    }

    /// Test side of a connection, driven by its own runtime.
    struct Peer {
        stream: UnixStream,
        runtime: Runtime,
    }

    impl Peer {
        fn connect(path: &Path) -> Self {
            let runtime = Runtime::new().unwrap();
            let stream = runtime.block_on(UnixStream::connect(path)).unwrap();
            Self { stream, runtime }
        }

        fn send_bytes(&mut self, bytes: &[u8]) {
            self.runtime
                .block_on(self.stream.write_all(bytes))
                .unwrap();
        }

        fn receive(&mut self) -> tfs_protocol::ProtocolResult<ResponseEnvelope> {
            self.runtime.block_on(read_message(&mut self.stream))
        }

        fn call(&mut self, id: u64, request: Request) -> ResponseEnvelope {
            let frame = tfs_protocol::encode_frame(&RequestEnvelope { id, request }).unwrap();
            self.send_bytes(&frame);
            self.receive().unwrap()
        }

        fn hello(&mut self) {
            let welcome = self.call(0, Request::Hello(HelloMessage::new("test")));
            assert!(matches!(welcome.response, Response::Welcome(_)));
        }
    }

    fn can_transform(target: &str, source: &str) -> Request {
        Request::CanTransform {
            query: TransformQuery::simple(target, source, TfDuration::ZERO),
            timeout: TfDuration::ZERO,
        }
    }

    #[test]
    fn test_serves_requests() {
        let dir = tempdir().unwrap();
        let server = TransformServer::bind("/tf_service", dir.path(), graph()).unwrap();
        assert_eq!(server.socket_path(), dir.path().join("tf_service.sock"));
        let handle = server.spawn();

        let mut peer = Peer::connect(handle.socket_path());
        let welcome = peer.call(1, Request::Hello(HelloMessage::new("test")));
        assert_eq!(welcome.id, 1);
        assert!(matches!(welcome.response, Response::Welcome(_)));

        let answer = peer.call(
            2,
            Request::LookupTransform {
                query: TransformQuery::simple("map", "odom", TfDuration::ZERO),
                timeout: TfDuration::ZERO,
            },
        );
        assert_eq!(answer.id, 2);
        let stamped = answer.response.into_transform().unwrap();
        assert_eq!(stamped.transform.translation, DVec3::X);

        handle.shutdown();
        assert!(!dir.path().join("tf_service.sock").exists());
    }

    #[test]
    fn test_requires_hello_first() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        let mut peer = Peer::connect(handle.socket_path());
        let answer = peer.call(5, can_transform("map", "odom"));
        assert!(matches!(
            answer.response,
            Response::Error {
                kind: ErrorKind::InvalidArgument,
                ..
            }
        ));
        // still usable after the hello
        peer.hello();
        let answer = peer.call(7, can_transform("map", "odom"));
        assert_eq!(answer.response, Response::CanTransform(true));
    }

    #[test]
    fn test_malformed_request_gets_error() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        let mut peer = Peer::connect(handle.socket_path());
        peer.hello();

        // id 9 followed by an invalid request tag
        let payload: Vec<u8> = vec![9, 0xfe, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&payload);
        peer.send_bytes(&frame);
        let answer = peer.receive().unwrap();
        assert_eq!(answer.id, 9);
        assert!(matches!(
            answer.response,
            Response::Error {
                kind: ErrorKind::InvalidArgument,
                ..
            }
        ));
        assert_eq!(
            peer.call(10, can_transform("map", "odom")).response,
            Response::CanTransform(true)
        );
    }

    #[test]
    fn test_refuses_live_socket_and_replaces_stale_one() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        assert!(matches!(
            TransformServer::bind("/tf_service", dir.path(), graph()),
            Err(ServerError::AlreadyRunning { .. })
        ));
        drop(handle);

        // a leftover file with nobody listening
        let stale = dir.path().join("tf_service.sock");
        drop(std::os::unix::net::UnixListener::bind(&stale).unwrap());
        assert!(stale.exists());
        let server = TransformServer::bind("/tf_service", dir.path(), graph()).unwrap();
        drop(server.spawn());
    }

    #[test]
    fn test_shutdown_closes_connections() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        let mut peer = Peer::connect(handle.socket_path());
        peer.hello();
        assert_eq!(handle.connection_count(), 1);

        handle.shutdown();
        assert!(peer.receive().is_err());
    }

    #[test]
    fn test_shutdown_does_not_wait_for_pending_lookups() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        let mut peer = Peer::connect(handle.socket_path());
        peer.hello();

        // never satisfiable, the server waits the whole timeout
        let request = RequestEnvelope {
            id: 1,
            request: Request::LookupTransform {
                query: TransformQuery::simple("map", "nowhere", TfDuration::ZERO),
                timeout: TfDuration::from_secs(3),
            },
        };
        peer.send_bytes(&tfs_protocol::encode_frame(&request).unwrap());
        std::thread::sleep(Duration::from_millis(100));

        let start = Instant::now();
        handle.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(peer.receive().is_err());
    }

    #[test]
    fn test_shutdown_without_socket_file() {
        let dir = tempdir().unwrap();
        let handle = start(dir.path());
        fs::remove_file(handle.socket_path()).unwrap();
        let start = Instant::now();
        handle.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
