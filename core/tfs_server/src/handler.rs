use log::{debug, warn};
use std::time::Duration;
use tfs_protocol::{Request, Response, WelcomeMessage, PROTOCOL_VERSION};
use tfs_transform::{ErrorKind, TransformEngine, TransformLookup};

/// Turns one request into one response. Holds no per-connection state, so a single
/// handler is shared by every connection thread.
pub struct RequestHandler {
    engine: TransformEngine,
    service_name: String,
}

impl RequestHandler {
    pub fn new(engine: TransformEngine, service_name: impl Into<String>) -> Self {
        Self {
            engine,
            service_name: service_name.into(),
        }
    }

    pub fn engine(&self) -> &TransformEngine {
        &self.engine
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn handle(&self, request: Request) -> Response {
        match request {
            Request::Hello(hello) => {
                if hello.version != PROTOCOL_VERSION {
                    warn!(
                        "Client '{}' speaks protocol {}, expected {}",
                        hello.client, hello.version, PROTOCOL_VERSION
                    );
                    return Response::Error {
                        kind: ErrorKind::InvalidArgument,
                        message: format!(
                            "protocol version mismatch: server speaks {PROTOCOL_VERSION}, client {}",
                            hello.version
                        ),
                    };
                }
                debug!("Hello from '{}'", hello.client);
                Response::Welcome(WelcomeMessage {
                    version: PROTOCOL_VERSION.to_string(),
                    server: self.service_name.clone(),
                })
            }
            Request::CanTransform { query, timeout } => {
                let answer = self
                    .engine
                    .can_transform_query(&query, Duration::from(timeout));
                debug!(
                    "can_transform {} -> {}: {answer}",
                    query.source_frame, query.target_frame
                );
                Response::CanTransform(answer)
            }
            Request::LookupTransform { query, timeout } => {
                match self.engine.transform_query(&query, Duration::from(timeout)) {
                    Ok(stamped) => Response::Transform((&stamped).into()),
                    Err(e) => {
                        debug!(
                            "lookup_transform {} -> {} failed: {e}",
                            query.source_frame, query.target_frame
                        );
                        Response::error(&e)
                    }
                }
            }
        }
    }
}
