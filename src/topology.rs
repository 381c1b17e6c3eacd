//! Cluster topology.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::NetSortError;
use crate::partition::Partitioner;

/// Cluster member address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Peer {
    pub rank: usize,
    pub host: String,
    pub port: u16,
}

impl Peer {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortField {
    Number(u64),
    Text(String),
}

#[derive(Deserialize)]
struct ServerEntry {
    #[serde(rename = "serverId")]
    server_id: usize,
    host: String,
    port: PortField,
}

#[derive(Deserialize)]
struct TopologyFile {
    servers: Vec<ServerEntry>,
}

/// Ordered, validated set of cluster members.
///
/// Ranks are exactly `0..size` and the size is a valid [`Partitioner`] cluster size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    peers: Vec<Peer>,
}

impl ClusterTopology {
    /// Validates and orders cluster members by rank.
    pub fn new(mut peers: Vec<Peer>) -> Result<Self, NetSortError> {
        if peers.is_empty() {
            return Err(NetSortError::Config("cluster topology lists no servers".to_string()));
        }

        let mut ranks = BTreeSet::new();
        for peer in &peers {
            if !ranks.insert(peer.rank) {
                return Err(NetSortError::Config(format!("duplicate server id {}", peer.rank)));
            }
        }
        if let Some(&max_rank) = ranks.iter().next_back() {
            if max_rank != peers.len() - 1 {
                return Err(NetSortError::Config(format!(
                    "server ids must be 0..{}, found {}",
                    peers.len(),
                    max_rank
                )));
            }
        }
        Partitioner::new(peers.len())?;

        peers.sort_by_key(|peer| peer.rank);
        return Ok(ClusterTopology { peers });
    }

    /// Loads a YAML topology file of the form `servers: [{serverId, host, port}, ...]`.
    pub fn load(path: &Path) -> Result<Self, NetSortError> {
        let content = fs::read_to_string(path).map_err(NetSortError::TopologyRead)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self, NetSortError> {
        let file: TopologyFile = serde_yaml::from_str(content).map_err(NetSortError::TopologyFormat)?;

        let peers = file
            .servers
            .into_iter()
            .map(|server| {
                let port = match server.port {
                    PortField::Number(port) => u16::try_from(port).ok(),
                    PortField::Text(ref port) => port.trim().parse::<u16>().ok(),
                }
                .ok_or_else(|| NetSortError::Config(format!("server {} has an invalid port", server.server_id)))?;

                Ok(Peer {
                    rank: server.server_id,
                    host: server.host,
                    port,
                })
            })
            .collect::<Result<Vec<_>, NetSortError>>()?;

        Self::new(peers)
    }

    pub fn size(&self) -> usize {
        self.peers.len()
    }

    pub fn peer(&self, rank: usize) -> Option<&Peer> {
        self.peers.get(rank)
    }

    /// Cluster members in ascending rank order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }
}

#[cfg(test)]
mod test {
    use std::io::Write;

    use rstest::*;

    use super::{ClusterTopology, Peer};
    use crate::error::NetSortError;

    #[test]
    fn test_load() {
        let mut file = tempfile::NamedTempFile::new_in("./").unwrap();
        write!(
            file,
            "servers:\n  - serverId: 1\n    host: node-b\n    port: \"8081\"\n  - serverId: 0\n    host: node-a\n    port: 8080\n"
        )
        .unwrap();

        let topology = ClusterTopology::load(file.path()).unwrap();
        assert_eq!(topology.size(), 2);
        assert_eq!(
            topology.peers(),
            &[
                Peer { rank: 0, host: "node-a".to_string(), port: 8080 },
                Peer { rank: 1, host: "node-b".to_string(), port: 8081 },
            ]
        );
        assert_eq!(topology.peer(1).unwrap().addr(), "node-b:8081");
    }

    #[test]
    fn test_missing_file() {
        let result = ClusterTopology::load(std::path::Path::new("./no-such-topology.yaml"));
        assert!(matches!(result, Err(NetSortError::TopologyRead(_))));
    }

    #[rstest]
    #[case("servers: []\n")]
    #[case("servers:\n  - {serverId: 0, host: a, port: 1}\n  - {serverId: 0, host: b, port: 2}\n")]
    #[case("servers:\n  - {serverId: 0, host: a, port: 1}\n  - {serverId: 2, host: b, port: 2}\n")]
    #[case("servers:\n  - {serverId: 0, host: a, port: 1}\n  - {serverId: 1, host: b, port: 2}\n  - {serverId: 2, host: c, port: 3}\n")]
    #[case("servers:\n  - {serverId: 0, host: a, port: 70000}\n")]
    #[case("servers:\n  - {serverId: 0, host: a, port: http}\n")]
    fn test_invalid_topology(#[case] content: &str) {
        assert!(matches!(ClusterTopology::from_yaml(content), Err(NetSortError::Config(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        assert!(matches!(
            ClusterTopology::from_yaml("servers: [ {serverId: "),
            Err(NetSortError::TopologyFormat(_))
        ));
    }
}
