//! Full-mesh connection establishment and inbound frame readers.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use log;

use crate::error::NetSortError;
use crate::frame::Frame;
use crate::record::Record;
use crate::topology::{ClusterTopology, Peer};

/// Unit delivered by inbound tasks to the aggregator.
#[derive(Debug)]
pub enum Inbound {
    /// A record received from a peer.
    Record(Record),
    /// A peer finished its stream on one connection.
    EndOfStream,
    /// An inbound or outbound task failed; the run cannot complete.
    Failed(NetSortError),
}

/// Outbound connections to every cluster member, indexed by rank.
pub struct Mesh {
    connections: Vec<TcpStream>,
}

impl Mesh {
    /// Connections in ascending rank order.
    pub fn streams_mut(&mut self) -> &mut [TcpStream] {
        &mut self.connections
    }
}

/// Dials every cluster member, itself included, retrying failed attempts.
#[derive(Debug, Clone, Default)]
pub struct MeshConnector {
    /// Pause between failed attempts. Zero means immediate retry.
    retry_delay: Duration,
    /// Attempts per peer before giving up. Unbounded if [`None`].
    max_attempts: Option<usize>,
}

impl MeshConnector {
    pub fn new(retry_delay: Duration, max_attempts: Option<usize>) -> Self {
        MeshConnector {
            retry_delay,
            max_attempts,
        }
    }

    /// Opens one connection per rank in ascending rank order.
    pub fn connect(&self, topology: &ClusterTopology) -> Result<Mesh, NetSortError> {
        let connections = topology
            .peers()
            .iter()
            .map(|peer| self.connect_peer(peer))
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("mesh completed ({} connections)", connections.len());
        return Ok(Mesh { connections });
    }

    fn connect_peer(&self, peer: &Peer) -> Result<TcpStream, NetSortError> {
        let addr = peer.addr();
        let mut attempts = 0;

        loop {
            attempts += 1;
            match TcpStream::connect(addr.as_str()) {
                Ok(stream) => {
                    log::debug!("connected to rank {} at {} (attempts: {})", peer.rank, addr, attempts);
                    return Ok(stream);
                }
                Err(err) => {
                    if attempts == 1 {
                        log::info!("rank {} at {} not reachable yet: {}", peer.rank, addr, err);
                    } else {
                        log::trace!("rank {} at {} attempt {} failed: {}", peer.rank, addr, attempts, err);
                    }
                    if self.max_attempts.map_or(false, |max| attempts >= max) {
                        return Err(NetSortError::Connection { addr, err });
                    }
                }
            }
            if !self.retry_delay.is_zero() {
                thread::sleep(self.retry_delay);
            }
        }
    }
}

/// Accepts peer connections and runs one frame reader per connection.
pub struct InboundListener {
    listener: TcpListener,
}

impl InboundListener {
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self, NetSortError> {
        let listener = TcpListener::bind(addr).map_err(NetSortError::Listen)?;
        Ok(InboundListener { listener })
    }

    pub fn from_listener(listener: TcpListener) -> Self {
        InboundListener { listener }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, NetSortError> {
        self.listener.local_addr().map_err(NetSortError::Listen)
    }

    /// Starts the accept loop. It accepts exactly `expected` connections and then closes the
    /// listening socket. Every failure is delivered to `sink` as [`Inbound::Failed`].
    pub fn spawn(self, expected: usize, sink: Sender<Inbound>) -> Result<ListenerHandle, NetSortError> {
        let handle = thread::Builder::new()
            .name("netsort-accept".to_string())
            .spawn(move || self.accept_loop(expected, sink))
            .map_err(NetSortError::Listen)?;

        Ok(ListenerHandle { handle })
    }

    fn accept_loop(self, expected: usize, sink: Sender<Inbound>) {
        let mut readers = Vec::with_capacity(expected);

        for _ in 0..expected {
            let (stream, remote) = match self.listener.accept() {
                Ok(accepted) => accepted,
                Err(err) => {
                    let _ = sink.send(Inbound::Failed(NetSortError::Listen(err)));
                    return;
                }
            };
            log::debug!("accepted connection from {}", remote);

            let reader_sink = sink.clone();
            let spawned = thread::Builder::new()
                .name(format!("netsort-reader-{}", remote))
                .spawn(move || {
                    if let Err(err) = read_frames(stream, &reader_sink) {
                        log::error!("frame reader for {} failed: {}", remote, err);
                        let _ = reader_sink.send(Inbound::Failed(err));
                    }
                });
            match spawned {
                Ok(reader) => readers.push(reader),
                Err(err) => {
                    let _ = sink.send(Inbound::Failed(NetSortError::Transport(err)));
                    return;
                }
            }
        }
        drop(self.listener);
        log::debug!("listener closed after {} connections", expected);

        for reader in readers {
            if reader.join().is_err() {
                log::error!("frame reader thread panicked");
            }
        }
    }
}

/// Handle to a running accept loop.
pub struct ListenerHandle {
    handle: thread::JoinHandle<()>,
}

impl ListenerHandle {
    /// Waits for the accept loop and all of its frame readers to finish.
    /// Only returns once every accepted connection has delivered its end-of-stream frame or failed.
    pub fn join(self) {
        if self.handle.join().is_err() {
            log::error!("accept loop thread panicked");
        }
    }
}

/// Decodes frames from a connection until its end-of-stream frame and forwards them to `sink`.
/// Returns the number of records received. Stops early if the sink is gone.
pub fn read_frames<R: io::Read>(reader: R, sink: &Sender<Inbound>) -> Result<u64, NetSortError> {
    let mut reader = io::BufReader::new(reader);
    let mut records = 0;

    loop {
        match Frame::read_from(&mut reader)? {
            Frame::Data(record) => {
                records += 1;
                if sink.send(Inbound::Record(record)).is_err() {
                    return Ok(records);
                }
            }
            Frame::EndOfStream => {
                let _ = sink.send(Inbound::EndOfStream);
                return Ok(records);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};
    use std::thread;
    use std::time::Duration;

    use rstest::*;

    use super::{read_frames, Inbound, InboundListener, MeshConnector};
    use crate::error::NetSortError;
    use crate::frame::{Frame, FRAME_SIZE};
    use crate::record::{Record, RECORD_SIZE};
    use crate::topology::{ClusterTopology, Peer};

    fn wire(frames: &[Frame]) -> Vec<u8> {
        let mut buf = Vec::new();
        for frame in frames {
            frame.write_to(&mut buf).unwrap();
        }
        buf
    }

    #[test]
    fn test_read_frames() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let records = vec![Record::new([1u8; RECORD_SIZE]), Record::new([2u8; RECORD_SIZE])];
        let mut frames: Vec<Frame> = records.iter().cloned().map(Frame::Data).collect();
        frames.push(Frame::EndOfStream);
        // anything past the end-of-stream frame is not read
        frames.push(Frame::Data(Record::new([3u8; RECORD_SIZE])));

        let received = read_frames(wire(&frames).as_slice(), &tx).unwrap();
        drop(tx);

        assert_eq!(received, 2);
        let units: Vec<Inbound> = rx.iter().collect();
        assert_eq!(units.len(), 3);
        assert!(matches!(&units[0], Inbound::Record(r) if r == &records[0]));
        assert!(matches!(&units[1], Inbound::Record(r) if r == &records[1]));
        assert!(matches!(units[2], Inbound::EndOfStream));
    }

    #[rstest]
    #[case(FRAME_SIZE + 40)]
    #[case(FRAME_SIZE)]
    #[case(0)]
    fn test_read_frames_without_end_of_stream(#[case] len: usize) {
        let (tx, _rx) = crossbeam_channel::unbounded();
        let data = vec![0u8; len];
        assert!(matches!(read_frames(data.as_slice(), &tx), Err(NetSortError::Transport(_))));
    }

    #[test]
    fn test_read_frames_unknown_tag() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut data = wire(&[Frame::Data(Record::new([4u8; RECORD_SIZE]))]);
        let mut bad = [0u8; FRAME_SIZE];
        bad[0] = 2;
        data.extend_from_slice(&bad);

        let result = read_frames(data.as_slice(), &tx);
        drop(tx);

        assert!(matches!(result, Err(NetSortError::Protocol(_))));
        assert_eq!(rx.iter().count(), 1);
    }

    #[test]
    fn test_connect_waits_for_late_peer() {
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let topology = ClusterTopology::new(vec![Peer {
            rank: 0,
            host: "127.0.0.1".to_string(),
            port,
        }])
        .unwrap();

        let connecting = thread::spawn(move || MeshConnector::default().connect(&topology));
        // the connector keeps failing until the peer starts listening
        thread::sleep(Duration::from_millis(100));
        assert!(!connecting.is_finished());
        let listener = TcpListener::bind(("127.0.0.1", port)).unwrap();

        let mut mesh = connecting.join().unwrap().unwrap();
        assert_eq!(mesh.streams_mut().len(), 1);
        let (_accepted, remote) = listener.accept().unwrap();
        assert_eq!(remote, mesh.streams_mut()[0].local_addr().unwrap());
    }

    #[test]
    fn test_bounded_connect_fails() {
        // grab a free port and release it so nothing is listening there
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let topology = ClusterTopology::new(vec![Peer {
            rank: 0,
            host: "127.0.0.1".to_string(),
            port,
        }])
        .unwrap();

        let connector = MeshConnector::new(Duration::from_millis(1), Some(3));
        assert!(matches!(connector.connect(&topology), Err(NetSortError::Connection { .. })));
    }

    #[test]
    fn test_listener_forwards_frames() {
        let listener = InboundListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = listener.spawn(2, tx).unwrap();

        for i in 0..2u8 {
            let mut stream = TcpStream::connect(addr).unwrap();
            stream
                .write_all(&wire(&[Frame::Data(Record::new([i; RECORD_SIZE])), Frame::EndOfStream]))
                .unwrap();
        }
        handle.join();

        let units: Vec<Inbound> = rx.iter().collect();
        assert_eq!(units.iter().filter(|u| matches!(u, Inbound::Record(_))).count(), 2);
        assert_eq!(units.iter().filter(|u| matches!(u, Inbound::EndOfStream)).count(), 2);
    }

    #[test]
    fn test_listener_reports_broken_stream() {
        let listener = InboundListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = listener.spawn(1, tx).unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(&[0u8; 10]).unwrap();
        drop(stream);
        handle.join();

        let units: Vec<Inbound> = rx.iter().collect();
        assert_eq!(units.len(), 1);
        assert!(matches!(units[0], Inbound::Failed(NetSortError::Transport(_))));
    }
}
