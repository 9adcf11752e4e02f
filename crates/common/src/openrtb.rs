use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// OpenRTB 2 fragments the host merges into outgoing bid requests.
///
/// `global` applies to every bidder; `bidder` is keyed by bidder code and
/// only reaches that bidder.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ortb2Fragments {
    #[serde(default)]
    pub global: Map<String, Value>,
    #[serde(default)]
    pub bidder: HashMap<String, BidderFragment>,
}

impl Ortb2Fragments {
    /// Append `data` to `bidder[code].user.data`, creating missing levels.
    pub fn push_bidder_user_data(&mut self, bidder: &str, data: Data) {
        self.bidder
            .entry(bidder.to_string())
            .or_default()
            .user
            .get_or_insert_with(User::default)
            .data
            .push(data);
    }

    /// `user.data` for `bidder`, empty when nothing was written.
    pub fn bidder_user_data(&self, bidder: &str) -> &[Data] {
        self.bidder
            .get(bidder)
            .and_then(|fragment| fragment.user.as_ref())
            .map(|user| user.data.as_slice())
            .unwrap_or_default()
    }
}

/// Subset of an OpenRTB bid request scoped to one bidder.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct BidderFragment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Data>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

/// OpenRTB `user.data` entry.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segment: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ext: Option<Value>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_appends_without_replacing_existing_data() {
        let mut fragments: Ortb2Fragments = serde_json::from_value(json!({
            "global": {},
            "bidder": {
                "mock-bidder-code": {
                    "site": {"page": "https://example.com"},
                    "user": {"data": [{"name": "other-provider"}], "keywords": "a,b"}
                }
            }
        }))
        .expect("valid fragments");

        fragments.push_bidder_user_data(
            "mock-bidder-code",
            Data {
                name: Some("contxtful".to_string()),
                ..Data::default()
            },
        );

        let serialized = serde_json::to_value(&fragments).expect("serializable");
        let bidder = &serialized["bidder"]["mock-bidder-code"];
        assert_eq!(bidder["site"]["page"], "https://example.com");
        assert_eq!(bidder["user"]["keywords"], "a,b");
        assert_eq!(bidder["user"]["data"][0]["name"], "other-provider");
        assert_eq!(bidder["user"]["data"][1]["name"], "contxtful");
    }

    #[test]
    fn push_creates_missing_bidder_fragment() {
        let mut fragments = Ortb2Fragments::default();
        assert!(fragments.bidder_user_data("new-bidder").is_empty());

        fragments.push_bidder_user_data("new-bidder", Data::default());

        assert_eq!(fragments.bidder_user_data("new-bidder").len(), 1);
        assert!(fragments.global.is_empty());
    }
}
