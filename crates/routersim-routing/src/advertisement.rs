//! Payloads carried by `info` packets.
//!
//! ```text
//! {"kind": "DV",  "vector": {"A": 0, "B": 1, "C": null}}
//! {"kind": "LSP", "origin": "A", "seq": 4, "links": {"B": 1, "C": 5}}
//! ```
//!
//! JSON has no infinity, so unreachable costs travel as `null`.

use std::collections::BTreeMap;

use routersim_core::NodeId;
use serde::{Deserialize, Serialize};

use crate::link_state::LinkStateRecord;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum InfoPayload {
    #[serde(rename = "DV")]
    DistanceVector {
        #[serde(with = "cost_map")]
        vector: BTreeMap<NodeId, f64>,
    },
    #[serde(rename = "LSP")]
    LinkState(LinkStateRecord),
}

impl InfoPayload {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }

    pub fn to_value(&self) -> serde_json::Value {
        // A BTreeMap of strings and floats always serializes.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InfoPayload::DistanceVector { .. } => "DV",
            InfoPayload::LinkState(_) => "LSP",
        }
    }
}

/// `BTreeMap<NodeId, f64>` with non-finite costs as `null`.
pub(crate) mod cost_map {
    use std::collections::BTreeMap;

    use routersim_core::NodeId;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::INFINITY;

    pub fn serialize<S: Serializer>(
        map: &BTreeMap<NodeId, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let wire: BTreeMap<&NodeId, Option<f64>> = map
            .iter()
            .map(|(k, v)| (k, v.is_finite().then_some(*v)))
            .collect();
        wire.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<NodeId, f64>, D::Error> {
        let wire = BTreeMap::<NodeId, Option<f64>>::deserialize(deserializer)?;
        Ok(wire
            .into_iter()
            .map(|(k, v)| (k, v.unwrap_or(INFINITY)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dv_payload_uses_null_for_infinity() {
        let mut vector = BTreeMap::new();
        vector.insert("A".to_string(), 0.0);
        vector.insert("C".to_string(), f64::INFINITY);
        let payload = InfoPayload::DistanceVector { vector };

        let value = payload.to_value();
        assert_eq!(value, json!({"kind": "DV", "vector": {"A": 0.0, "C": null}}));

        match InfoPayload::from_value(&value).unwrap() {
            InfoPayload::DistanceVector { vector } => {
                assert_eq!(vector["A"], 0.0);
                assert!(vector["C"].is_infinite());
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn lsp_payload_shape() {
        let value = json!({"kind": "LSP", "origin": "A", "seq": 3, "links": {"B": 1, "C": 5}});
        match InfoPayload::from_value(&value).unwrap() {
            InfoPayload::LinkState(rec) => {
                assert_eq!(rec.origin, "A");
                assert_eq!(rec.seq, 3);
                assert_eq!(rec.links["C"], 5.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_an_error() {
        assert!(InfoPayload::from_value(&json!({"kind": "BGP"})).is_err());
        assert!(InfoPayload::from_value(&json!("DV")).is_err());
    }
}
