//! Topology document loading.
//!
//! A topology document is a JSON object describing one cluster:
//!
//! ```json
//! {
//!     "name": "orders",
//!     "members": [
//!         {"id": "orders-0", "host": "10.0.0.1", "port": 5432},
//!         {"id": "orders-1", "host": "10.0.0.2", "port": "5433", "class": "standard"}
//!     ]
//! }
//! ```
//!
//! Ports are accepted as JSON numbers or numeric strings. Unknown member fields
//! are ignored.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::cluster::ClusterSpec;
use crate::error::{Result, ValidationError};
use crate::member::MemberSpec;

/// Maximum accepted size of a topology file.
pub const MAX_TOPOLOGY_BYTES: u64 = 5 * 1024 * 1024;

/// Raw topology document, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    /// Cluster name.
    pub name: Option<String>,

    /// Members in ordinal order.
    pub members: Option<Vec<MemberDocument>>,
}

/// Raw member entry of a topology document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberDocument {
    /// Member id.
    pub id: Option<String>,

    /// Member host.
    pub host: Option<String>,

    /// Client port, number or numeric string.
    pub port: Option<serde_json::Value>,

    /// Free-form member class, carried but unused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
}

impl TopologyDocument {
    /// Validates the document into a cluster specification.
    ///
    /// Data directories are derived as `data_root/<id>`.
    pub fn into_cluster(self, data_root: &Path) -> Result<ClusterSpec> {
        let name = self.name.ok_or_else(|| ValidationError::missing("name"))?;
        let members = self
            .members
            .ok_or_else(|| ValidationError::missing("members"))?;
        if members.is_empty() {
            return Err(ValidationError::EmptyMembers);
        }

        let members = members
            .into_iter()
            .enumerate()
            .map(|(ordinal, member)| member.into_member(ordinal, data_root))
            .collect::<Result<Vec<_>>>()?;

        ClusterSpec::new(name, members)
    }
}

impl MemberDocument {
    fn into_member(self, ordinal: usize, data_root: &Path) -> Result<MemberSpec> {
        let id = self.id.ok_or_else(|| ValidationError::missing("id"))?;
        let host = self.host.ok_or_else(|| ValidationError::missing("host"))?;
        let port = self.port.ok_or_else(|| ValidationError::missing("port"))?;
        let port = parse_port(&id, &port)?;

        if host.trim().is_empty() {
            return Err(ValidationError::blank("host"));
        }

        Ok(MemberSpec::new(id, host, port, ordinal, data_root))
    }
}

fn parse_port(member: &str, value: &serde_json::Value) -> Result<u16> {
    let invalid = || ValidationError::InvalidPort {
        member: member.to_string(),
        port: match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    };

    let port = match value {
        serde_json::Value::Number(n) => n.as_u64().ok_or_else(invalid)?,
        serde_json::Value::String(s) => s.trim().parse::<u64>().map_err(|_| invalid())?,
        _ => return Err(invalid()),
    };

    match u16::try_from(port) {
        Ok(port) if port > 0 => Ok(port),
        _ => Err(invalid()),
    }
}

/// Parses and validates a topology document from JSON text.
pub fn parse_topology(text: &str, data_root: &Path) -> Result<ClusterSpec> {
    let document: TopologyDocument = serde_json::from_str(text)
        .map_err(|e| ValidationError::malformed(format!("content is not in json format: {}", e)))?;
    document.into_cluster(data_root)
}

/// Loads and validates a topology file.
///
/// The file must exist, carry a `.json` suffix and be no larger than
/// [`MAX_TOPOLOGY_BYTES`].
pub fn load_topology(path: &Path, data_root: &Path) -> Result<ClusterSpec> {
    info!(path = %path.display(), "Loading topology");

    if !path.is_file() {
        return Err(ValidationError::FileNotFound(path.to_path_buf()));
    }
    if path.extension().and_then(|e| e.to_str()) != Some("json") {
        return Err(ValidationError::InvalidFileSuffix(path.to_path_buf()));
    }

    let too_large = || ValidationError::FileTooLarge {
        path: path.to_path_buf(),
        limit: MAX_TOPOLOGY_BYTES,
    };

    let file = File::open(path).map_err(|e| ValidationError::malformed(e.to_string()))?;
    let declared = file
        .metadata()
        .map_err(|e| ValidationError::malformed(e.to_string()))?
        .len();
    if declared > MAX_TOPOLOGY_BYTES {
        return Err(too_large());
    }

    // The file may grow between stat and read.
    let mut text = String::new();
    file.take(MAX_TOPOLOGY_BYTES + 1)
        .read_to_string(&mut text)
        .map_err(|e| ValidationError::malformed(e.to_string()))?;
    if text.len() as u64 > MAX_TOPOLOGY_BYTES {
        return Err(too_large());
    }

    let cluster = parse_topology(&text, data_root)?;
    debug!(cluster = %cluster.name(), members = cluster.len(), "Topology loaded");
    Ok(cluster)
}
