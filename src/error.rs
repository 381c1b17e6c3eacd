//! Distributed sort error.

use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;

/// Distributed sort error.
#[derive(Debug)]
pub enum NetSortError {
    /// Invalid node or cluster configuration.
    Config(String),
    /// Cluster topology file reading error.
    TopologyRead(io::Error),
    /// Cluster topology file format error.
    TopologyFormat(serde_yaml::Error),
    /// Inbound listener bind error.
    Listen(io::Error),
    /// Peer connection error. Only reported when connection attempts are bounded.
    Connection { addr: String, err: io::Error },
    /// Established connection read/write error.
    Transport(io::Error),
    /// Peer sent a frame that violates the wire protocol.
    Protocol(String),
    /// Every record channel producer exited before all peers completed their streams.
    ChannelClosed { received: usize, expected: usize },
    /// Input shard reading error.
    Input(io::Error),
    /// Output shard writing error.
    Output(io::Error),
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Sorted run spilling or reading error.
    Spill(io::Error),
}

impl Error for NetSortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        let err: &(dyn Error + 'static) = match &self {
            NetSortError::TopologyRead(err) => err,
            NetSortError::TopologyFormat(err) => err,
            NetSortError::Listen(err) => err,
            NetSortError::Connection { err, .. } => err,
            NetSortError::Transport(err) => err,
            NetSortError::Input(err) => err,
            NetSortError::Output(err) => err,
            NetSortError::TempDir(err) => err,
            NetSortError::ThreadPoolBuildError(err) => err,
            NetSortError::Spill(err) => err,
            NetSortError::Config(_) | NetSortError::Protocol(_) | NetSortError::ChannelClosed { .. } => return None,
        };
        Some(err)
    }
}

impl Display for NetSortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            NetSortError::Config(msg) => write!(f, "configuration error: {}", msg),
            NetSortError::TopologyRead(err) => write!(f, "cluster topology file not read: {}", err),
            NetSortError::TopologyFormat(err) => write!(f, "cluster topology format error: {}", err),
            NetSortError::Listen(err) => write!(f, "listener not bound: {}", err),
            NetSortError::Connection { addr, err } => write!(f, "connection to {} failed: {}", addr, err),
            NetSortError::Transport(err) => write!(f, "transport error: {}", err),
            NetSortError::Protocol(msg) => write!(f, "protocol violation: {}", msg),
            NetSortError::ChannelClosed { received, expected } => write!(
                f,
                "record channel closed after {} of {} end-of-stream signals",
                received, expected
            ),
            NetSortError::Input(err) => write!(f, "input shard reading error: {}", err),
            NetSortError::Output(err) => write!(f, "output shard writing error: {}", err),
            NetSortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            NetSortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            NetSortError::Spill(err) => write!(f, "sorted run I/O failed: {}", err),
        }
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::io;

    use rstest::*;

    use super::NetSortError;

    #[rstest]
    #[case(NetSortError::Config("cluster size 3 is not a power of two".to_string()), "configuration error: cluster size 3 is not a power of two", false)]
    #[case(NetSortError::Protocol("unknown frame tag 7".to_string()), "protocol violation: unknown frame tag 7", false)]
    #[case(NetSortError::ChannelClosed { received: 1, expected: 4 }, "record channel closed after 1 of 4 end-of-stream signals", false)]
    #[case(NetSortError::Transport(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")), "transport error: eof", true)]
    fn test_error_display(#[case] err: NetSortError, #[case] expected: &str, #[case] has_source: bool) {
        assert_eq!(err.to_string(), expected);
        assert_eq!(err.source().is_some(), has_source);
    }
}
