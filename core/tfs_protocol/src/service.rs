use crate::error::{ProtocolError, ProtocolResult};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_SERVICE_NAME: &str = "/tf_service";

/// Overrides the directory holding the service sockets.
pub const SOCKET_DIR_ENV: &str = "TFS_SOCKET_DIR";

pub fn default_socket_dir() -> PathBuf {
    env::var_os(SOCKET_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| env::temp_dir().join("tf_service"))
}

pub fn validate_service_name(name: &str) -> ProtocolResult<()> {
    let invalid = |reason| ProtocolError::InvalidServiceName {
        name: name.to_string(),
        reason,
    };
    if name.trim_start_matches('/').is_empty() {
        return Err(invalid("name is empty"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '/' | '.' | '-'))
    {
        return Err(invalid("only ASCII letters, digits and '_', '/', '.', '-' are allowed"));
    }
    Ok(())
}

/// Socket a service named `name` listens on inside `dir`.
///
/// `/tf_service` becomes `tf_service.sock`, `/robot/tf` becomes `robot.tf.sock`.
pub fn socket_path(dir: &Path, name: &str) -> ProtocolResult<PathBuf> {
    validate_service_name(name)?;
    let file = name.trim_start_matches('/').replace('/', ".");
    Ok(dir.join(format!("{file}.sock")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_path() {
        let dir = Path::new("/run/tf");
        assert_eq!(
            socket_path(dir, DEFAULT_SERVICE_NAME).unwrap(),
            PathBuf::from("/run/tf/tf_service.sock")
        );
        assert_eq!(
            socket_path(dir, "robot/tf").unwrap(),
            PathBuf::from("/run/tf/robot.tf.sock")
        );
        assert_ne!(
            socket_path(dir, "/tf_service").unwrap(),
            socket_path(dir, "/tf_service_wrong").unwrap()
        );
    }

    #[test]
    fn test_invalid_service_names() {
        for name in ["", "/", "//", "tf service", "tf\u{e9}", "a:b"] {
            assert!(
                matches!(
                    socket_path(Path::new("/tmp"), name),
                    Err(ProtocolError::InvalidServiceName { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }
}
