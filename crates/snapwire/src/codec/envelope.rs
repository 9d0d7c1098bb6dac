//! Wire types: the `{data, meta}` envelope and the component snapshot.
//!
//! `data` is plain JSON. Wherever a synth produced a node, the node is a
//! two-element pair `[inner, typeKey]` and the meta tree carries a
//! [`MetaTree`] at the same position naming the synth and its metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::Error;
use crate::limits::MAX_SNAPSHOT_BYTES;

/// Synth-specific reconstruction metadata at one node.
pub type Meta = serde_json::Map<String, Json>;

/// Metadata mirroring the shape of `data`, present only where needed.
///
/// A node with `synth` set was produced by that synth. A node without it is
/// a plain container that has synth-owned descendants. Child nodes are keyed
/// by the segment text (`"0"`, `"title"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaTree {
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub synth: Option<String>,
    #[serde(rename = "m", default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    #[serde(rename = "c", default, skip_serializing_if = "IndexMap::is_empty")]
    pub children: IndexMap<String, MetaTree>,
}

impl MetaTree {
    /// Returns true if the node carries nothing.
    pub fn is_empty(&self) -> bool {
        self.synth.is_none() && self.meta.is_empty() && self.children.is_empty()
    }

    /// Returns the child node for `segment`.
    pub fn child(&self, segment: &str) -> Option<&MetaTree> {
        self.children.get(segment)
    }

    /// Walks the tree along dotted `path`.
    pub fn at(&self, path: &str) -> Option<&MetaTree> {
        path.split('.').try_fold(self, |node, seg| node.child(seg))
    }
}

/// A single dehydrated value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: Json,
    #[serde(default, skip_serializing_if = "MetaTree::is_empty")]
    pub meta: MetaTree,
}

/// Identifies the component a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: String,
    pub name: String,
}

/// The dehydrated state of one component, as sent to and received from the
/// client.
///
/// `data` is a JSON object keyed by property name. `meta` is the root of the
/// meta tree, its children keyed by property name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub fingerprint: Fingerprint,
    pub data: Json,
    #[serde(default, skip_serializing_if = "MetaTree::is_empty")]
    pub meta: MetaTree,
    #[serde(default)]
    pub checksum: String,
}

impl Snapshot {
    /// Hex SHA-256 over `key` followed by the JSON of fingerprint, data and meta.
    pub fn compute_checksum(&self, key: &[u8]) -> Result<String, Error> {
        let payload = serde_json::to_vec(&(&self.fingerprint, &self.data, &self.meta))?;
        let mut hasher = Sha256::new();
        hasher.update(key);
        hasher.update(&payload);
        Ok(to_hex(&hasher.finalize()))
    }

    /// Recomputes the checksum and stores it.
    pub fn seal(&mut self, key: &[u8]) -> Result<(), Error> {
        self.checksum = self.compute_checksum(key)?;
        Ok(())
    }

    /// Fails with [`Error::ChecksumMismatch`] if the snapshot was altered.
    pub fn verify(&self, key: &[u8]) -> Result<(), Error> {
        let expected = self.compute_checksum(key)?;
        if !constant_time_eq(expected.as_bytes(), self.checksum.as_bytes()) {
            warn!(
                component = %self.fingerprint.name,
                id = %self.fingerprint.id,
                "snapshot checksum mismatch"
            );
            return Err(Error::ChecksumMismatch);
        }
        Ok(())
    }

    /// Serializes to JSON text.
    pub fn to_json_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses JSON text, rejecting input over
    /// [`MAX_SNAPSHOT_BYTES`](crate::limits::MAX_SNAPSHOT_BYTES).
    pub fn from_json_str(input: &str) -> Result<Self, Error> {
        if input.len() > MAX_SNAPSHOT_BYTES {
            return Err(Error::LengthExceedsLimit {
                field: "snapshot",
                len: input.len(),
                max: MAX_SNAPSHOT_BYTES,
            });
        }
        let snapshot: Snapshot = serde_json::from_str(input)?;
        if !snapshot.data.is_object() {
            return Err(Error::malformed("", "snapshot data is not an object"));
        }
        Ok(snapshot)
    }
}

fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        s.push_str(&format!("{:02x}", byte));
    }
    s
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot() -> Snapshot {
        let mut meta = MetaTree::default();
        meta.children.insert(
            "tags".to_string(),
            MetaTree {
                synth: Some("map".to_string()),
                ..MetaTree::default()
            },
        );
        Snapshot {
            fingerprint: Fingerprint {
                id: "abc".to_string(),
                name: "tagger".to_string(),
            },
            data: json!({"tags": [[["k1", "v1"]], "map"], "count": 1}),
            meta,
            checksum: String::new(),
        }
    }

    #[test]
    fn test_meta_tree_compact_json() {
        let tree = MetaTree {
            synth: Some("clctn".to_string()),
            meta: Meta::new(),
            children: IndexMap::new(),
        };
        assert_eq!(serde_json::to_value(&tree).unwrap(), json!({"s": "clctn"}));
        let back: MetaTree = serde_json::from_value(json!({})).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn test_checksum_detects_tampering() {
        let mut snap = snapshot();
        snap.seal(b"secret").unwrap();
        assert_eq!(snap.checksum.len(), 64);
        snap.verify(b"secret").unwrap();

        assert!(matches!(snap.verify(b"other"), Err(Error::ChecksumMismatch)));

        snap.data["count"] = json!(2);
        assert!(matches!(snap.verify(b"secret"), Err(Error::ChecksumMismatch)));
    }

    #[test]
    fn test_json_text_round_trip() {
        let mut snap = snapshot();
        snap.seal(b"").unwrap();
        let text = snap.to_json_string().unwrap();
        let back = Snapshot::from_json_str(&text).unwrap();
        assert_eq!(back, snap);
        back.verify(b"").unwrap();
    }

    #[test]
    fn test_from_json_str_rejects_bad_input() {
        assert!(matches!(Snapshot::from_json_str("{"), Err(Error::Json(_))));
        assert!(matches!(
            Snapshot::from_json_str(r#"{"fingerprint":{"id":"a","name":"b"},"data":[]}"#),
            Err(Error::MalformedSnapshot { .. })
        ));
    }

    #[test]
    fn test_meta_at() {
        let snap = snapshot();
        assert_eq!(snap.meta.at("tags").and_then(|t| t.synth.as_deref()), Some("map"));
        assert!(snap.meta.at("tags.0").is_none());
    }
}
