use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{request::RequestParams, types::JsonRpcVersion};

/// A request without an id. Never answered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc", default)]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<RequestParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<RequestParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }

    pub fn new_no_params(method: impl Into<String>) -> Self {
        Self::new(method, None)
    }

    pub fn new_with_object_params(method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self::new(method, Some(RequestParams::Object(params)))
    }

    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_has_no_id() {
        let notification = JsonRpcNotification::new_no_params("notifications/initialized");
        let json = serde_json::to_string(&notification).unwrap();

        assert!(!json.contains("\"id\""));
        assert!(!json.contains("\"params\""));
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"notifications/initialized\""));
    }

    #[test]
    fn test_notification_params() {
        let mut params = Map::new();
        params.insert("level".to_string(), Value::from("info"));
        let notification = JsonRpcNotification::new_with_object_params("log", params);
        assert_eq!(notification.get_param("level"), Some(&Value::from("info")));
        assert_eq!(notification.get_param("missing"), None);
    }
}
