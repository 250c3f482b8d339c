//! Unix domain socket listening resource.
//!
//! Each listener gets its own freshly created directory, named with random
//! hex digits and created with mode `0700`, under the configured socket
//! directory:
//!
//! ```text
//! <socket_dir>/aipc-<12 hex>/s
//! ```
//!
//! Both components are kept short: `sun_path` holds 107 bytes on Linux and
//! 103 on macOS, and a macOS `$TMPDIR` alone is about 48.  Paths that would
//! not fit are refused before anything is created.
//!
//! The path is never registered with anything.  Only the current user can
//! traverse the directory, and only peers that were handed a descriptor know
//! its name.  Dropping the listener removes both the socket file and its
//! directory, after which every descriptor that references it stops
//! connecting.

use std::fs::DirBuilder;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use aipc_core::{PeerStream, TransportAddress};
use async_trait::async_trait;
use tokio::net::UnixListener;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use super::{ListenerError, ListeningResource};

const SOCKET_FILE_NAME: &str = "s";

/// Random hex digits in the directory name (48 bits).
const DIR_RANDOM_LEN: usize = 12;

/// Longest socket path `bind` accepts, excluding the trailing NUL.
#[cfg(target_os = "linux")]
pub const MAX_SOCKET_PATH_LEN: usize = 107;
#[cfg(not(target_os = "linux"))]
pub const MAX_SOCKET_PATH_LEN: usize = 103;

/// Picks the private directory and socket path under `socket_dir`.
fn socket_paths(socket_dir: &Path) -> Result<(PathBuf, PathBuf), ListenerError> {
    let random = Uuid::new_v4().simple().to_string();
    let dir = socket_dir.join(format!("aipc-{}", &random[..DIR_RANDOM_LEN]));
    let path = dir.join(SOCKET_FILE_NAME);
    let len = path.as_os_str().as_bytes().len();
    if len > MAX_SOCKET_PATH_LEN {
        return Err(ListenerError::SocketPathTooLong {
            path,
            len,
            max: MAX_SOCKET_PATH_LEN,
        });
    }
    Ok((dir, path))
}

/// A Unix domain socket in a private, randomly named directory.
#[derive(Debug)]
pub struct UnixSocketListener {
    listener: UnixListener,
    dir: PathBuf,
    path: PathBuf,
    address: TransportAddress,
}

impl UnixSocketListener {
    /// Creates the private directory under `socket_dir` and binds the socket.
    ///
    /// # Errors
    ///
    /// Returns [`ListenerError::SocketPathTooLong`] if `socket_dir` is too
    /// long to hold a socket, [`ListenerError::SocketDir`] if the directory
    /// cannot be created and [`ListenerError::BindFailed`] if the socket cannot
    /// be bound.
    ///
    /// # Panics
    ///
    /// Must be called from inside a Tokio runtime with I/O enabled.
    pub fn bind(socket_dir: &Path) -> Result<Self, ListenerError> {
        let (dir, path) = socket_paths(socket_dir)?;
        DirBuilder::new()
            .mode(0o700)
            .create(&dir)
            .map_err(|source| ListenerError::SocketDir {
                path: dir.clone(),
                source,
            })?;

        let listener = match UnixListener::bind(&path) {
            Ok(listener) => listener,
            Err(source) => {
                std::fs::remove_dir(&dir).ok();
                return Err(ListenerError::BindFailed {
                    address: path.display().to_string(),
                    source,
                });
            }
        };

        info!(path = ?path, "anonymous Unix listener bound");
        Ok(Self {
            listener,
            address: TransportAddress::Unix(path.clone()),
            dir,
            path,
        })
    }
}

#[async_trait]
impl ListeningResource for UnixSocketListener {
    fn address(&self) -> &TransportAddress {
        &self.address
    }

    async fn accept(&mut self) -> io::Result<PeerStream> {
        let (stream, _peer) = self.listener.accept().await?;
        debug!(path = ?self.path, "accepted Unix connection");
        Ok(PeerStream::Unix(stream))
    }
}

impl Drop for UnixSocketListener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = ?self.path, "removed socket file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                trace!(path = ?self.path, "socket file already gone")
            }
            Err(e) => warn!(path = ?self.path, error = %e, "failed to remove socket file"),
        }
        if let Err(e) = std::fs::remove_dir(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = ?self.dir, error = %e, "failed to remove socket directory");
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    /// Short scratch parent so the socket path stays inside `sun_path`.
    fn scratch_dir() -> PathBuf {
        let random = Uuid::new_v4().simple().to_string();
        let dir = std::env::temp_dir().join(format!("aipc-t{}", &random[..8]));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_bind_creates_private_directory() {
        // Arrange
        let parent = scratch_dir();

        // Act
        let listener = UnixSocketListener::bind(&parent).expect("bind");

        // Assert
        let mode = std::fs::metadata(&listener.dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o700);
        assert!(listener.path.exists());
        assert!(matches!(listener.address(), TransportAddress::Unix(p) if p.ends_with(SOCKET_FILE_NAME)));

        // Cleanup
        drop(listener);
        std::fs::remove_dir_all(&parent).ok();
    }

    #[tokio::test]
    async fn test_two_listeners_get_distinct_paths() {
        let parent = scratch_dir();
        let a = UnixSocketListener::bind(&parent).unwrap();
        let b = UnixSocketListener::bind(&parent).unwrap();
        assert_ne!(a.address(), b.address());
        drop((a, b));
        std::fs::remove_dir_all(&parent).ok();
    }

    #[tokio::test]
    async fn test_drop_removes_socket_and_directory() {
        // Arrange
        let parent = scratch_dir();
        let listener = UnixSocketListener::bind(&parent).unwrap();
        let dir = listener.dir.clone();

        // Act
        drop(listener);

        // Assert
        assert!(!dir.exists(), "private directory must be removed on drop");
        std::fs::remove_dir_all(&parent).ok();
    }

    #[tokio::test]
    async fn test_bind_fails_when_parent_directory_is_missing() {
        let random = Uuid::new_v4().simple().to_string();
        let parent = std::env::temp_dir().join(format!("aipc-m{}", &random[..8]));
        let result = UnixSocketListener::bind(&parent);
        assert!(matches!(result, Err(ListenerError::SocketDir { .. })));
    }

    #[tokio::test]
    async fn test_accept_yields_connecting_peer() {
        let parent = scratch_dir();
        let mut listener = UnixSocketListener::bind(&parent).unwrap();
        let path = listener.path.clone();

        let (accepted, connected) =
            tokio::join!(listener.accept(), tokio::net::UnixStream::connect(&path));

        assert!(connected.is_ok());
        assert_eq!(accepted.expect("accept").transport(), "unix");
        drop(listener);
        std::fs::remove_dir_all(&parent).ok();
    }

    #[test]
    fn test_socket_path_for_temp_dir_fits_sun_path() {
        let (_dir, path) = socket_paths(&std::env::temp_dir()).expect("temp dir must fit");
        assert!(path.as_os_str().as_bytes().len() <= MAX_SOCKET_PATH_LEN);
    }

    #[test]
    fn test_socket_path_adds_few_bytes_to_parent() {
        // Arrange: a parent of the length of a stock macOS $TMPDIR
        let parent = PathBuf::from(format!("/{}", "v".repeat(47)));

        // Act
        let (dir, path) = socket_paths(&parent).expect("48-byte parent must fit");

        // Assert
        assert_eq!(dir.parent(), Some(parent.as_path()));
        assert!(path.as_os_str().as_bytes().len() <= 103);
    }

    #[tokio::test]
    async fn test_bind_refuses_parent_too_long_for_sun_path() {
        // Arrange
        let parent = PathBuf::from(format!("/{}", "x".repeat(MAX_SOCKET_PATH_LEN)));

        // Act
        let result = UnixSocketListener::bind(&parent);

        // Assert: refused before any directory is created
        match result {
            Err(ListenerError::SocketPathTooLong { len, max, .. }) => {
                assert!(len > max);
                assert_eq!(max, MAX_SOCKET_PATH_LEN);
            }
            other => panic!("expected SocketPathTooLong, got {other:?}"),
        }
    }
}
