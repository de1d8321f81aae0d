use serde_json::Value;

use crate::{
    error::JsonRpcError,
    notification::JsonRpcNotification,
    request::{JsonRpcRequest, RequestParams},
    types::{JsonRpcVersion, RequestId},
};

/// An inbound envelope after decoding
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcIncoming {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl JsonRpcIncoming {
    pub fn method(&self) -> &str {
        match self {
            JsonRpcIncoming::Request(req) => &req.method,
            JsonRpcIncoming::Notification(notif) => &notif.method,
        }
    }

    pub fn id(&self) -> Option<&RequestId> {
        match self {
            JsonRpcIncoming::Request(req) => Some(&req.id),
            JsonRpcIncoming::Notification(_) => None,
        }
    }
}

/// Decode one inbound envelope.
///
/// Text that is not JSON yields a parse error without an id. Anything that is
/// JSON but not a well-formed request or notification yields an invalid
/// request error carrying the id when one can be recovered. A missing
/// `jsonrpc` member is read as `"2.0"` and a `null` id as no id at all.
pub fn parse_json_rpc_message(text: &str) -> Result<JsonRpcIncoming, JsonRpcError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| JsonRpcError::parse_error(Some(e.to_string())))?;

    let Value::Object(mut object) = value else {
        return Err(JsonRpcError::invalid_request(
            None,
            Some("Invalid Request: expected a JSON object".to_string()),
        ));
    };

    let id = match object.remove("id") {
        None | Some(Value::Null) => None,
        Some(raw) => match RequestId::from_value(&raw) {
            Some(id) => Some(id),
            None => {
                return Err(JsonRpcError::invalid_request(
                    None,
                    Some("Invalid Request: id must be a string or an integer".to_string()),
                ));
            }
        },
    };

    let invalid = |reason: &str| {
        JsonRpcError::invalid_request(id.clone(), Some(format!("Invalid Request: {}", reason)))
    };

    match object.get("jsonrpc") {
        None => {}
        Some(Value::String(tag)) if tag == crate::JSONRPC_VERSION => {}
        Some(_) => return Err(invalid("jsonrpc must be \"2.0\"")),
    }

    let method = match object.remove("method") {
        Some(Value::String(method)) => method,
        Some(_) => return Err(invalid("method must be a string")),
        None => return Err(invalid("missing method")),
    };

    let params = match object.remove("params") {
        None | Some(Value::Null) => None,
        Some(Value::Object(map)) => Some(RequestParams::Object(map)),
        Some(Value::Array(items)) => Some(RequestParams::Array(items)),
        Some(_) => return Err(invalid("params must be an object or an array")),
    };

    Ok(match id {
        Some(id) => JsonRpcIncoming::Request(JsonRpcRequest {
            version: JsonRpcVersion::V2_0,
            id,
            method,
            params,
        }),
        None => JsonRpcIncoming::Notification(JsonRpcNotification {
            version: JsonRpcVersion::V2_0,
            method,
            params,
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::JsonRpcErrorCode;
    use serde_json::json;

    fn code_of(error: &JsonRpcError) -> Option<JsonRpcErrorCode> {
        error.error.error_code()
    }

    #[test]
    fn test_parse_request() {
        let incoming = parse_json_rpc_message(
            r#"{"jsonrpc":"2.0","method":"tools/call","params":{"name":"echo","arguments":{"message":"hi"}},"id":"1"}"#,
        )
        .unwrap();

        match incoming {
            JsonRpcIncoming::Request(request) => {
                assert_eq!(request.id, RequestId::from("1"));
                assert_eq!(request.method, "tools/call");
                assert_eq!(request.get_param("name"), Some(&json!("echo")));
            }
            other => panic!("expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_notification_without_id_or_tag() {
        let incoming = parse_json_rpc_message(r#"{"method":"notifications/initialized"}"#).unwrap();
        assert!(matches!(incoming, JsonRpcIncoming::Notification(_)));
        assert_eq!(incoming.method(), "notifications/initialized");
        assert_eq!(incoming.id(), None);
    }

    #[test]
    fn test_null_id_is_a_notification() {
        let incoming =
            parse_json_rpc_message(r#"{"jsonrpc":"2.0","method":"ping","id":null}"#).unwrap();
        assert!(matches!(incoming, JsonRpcIncoming::Notification(_)));
    }

    #[test]
    fn test_parse_error_has_no_id() {
        let error = parse_json_rpc_message("not json").unwrap_err();
        assert_eq!(code_of(&error), Some(JsonRpcErrorCode::ParseError));
        assert_eq!(error.id, None);
    }

    #[test]
    fn test_wrong_version_keeps_recoverable_id() {
        let error =
            parse_json_rpc_message(r#"{"jsonrpc":"1.0","method":"initialize","id":7}"#).unwrap_err();
        assert_eq!(code_of(&error), Some(JsonRpcErrorCode::InvalidRequest));
        assert_eq!(error.id, Some(RequestId::Number(7)));
    }

    #[test]
    fn test_missing_method_is_invalid_request() {
        let error = parse_json_rpc_message(r#"{"jsonrpc":"2.0","id":"x"}"#).unwrap_err();
        assert_eq!(code_of(&error), Some(JsonRpcErrorCode::InvalidRequest));
        assert_eq!(error.id, Some(RequestId::from("x")));
    }

    #[test]
    fn test_scalar_params_rejected() {
        let error =
            parse_json_rpc_message(r#"{"jsonrpc":"2.0","method":"m","params":5,"id":1}"#)
                .unwrap_err();
        assert_eq!(code_of(&error), Some(JsonRpcErrorCode::InvalidRequest));
    }

    #[test]
    fn test_non_object_is_invalid_request_without_id() {
        let error = parse_json_rpc_message("[1,2,3]").unwrap_err();
        assert_eq!(code_of(&error), Some(JsonRpcErrorCode::InvalidRequest));
        assert_eq!(error.id, None);
    }
}
