//! 下游能力的强类型请求模型
//!
//! 入站请求在分发前按能力解码为对应的请求结构，未知字段、缺失字段与非法取值
//! 都在这里被拒绝，不会透传到下游服务。

use std::collections::HashMap;

use gateway_core::DispatchError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 网关支持的全部能力标识
pub const KNOWN_CAPABILITIES: [&str; 8] = [
    "user.get",
    "user.list",
    "user.create",
    "order.get",
    "order.create",
    "inventory.get",
    "inventory.reserve",
    "notification.send",
];

const DEFAULT_LIST_LIMIT: u32 = 10;
const MAX_LIST_LIMIT: u32 = 100;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("未知的能力: {0}")]
    UnknownCapability(String),

    #[error("缺少路径参数: {0}")]
    MissingParam(&'static str),

    #[error("参数 {name} 无效: {reason}")]
    InvalidParam { name: &'static str, reason: String },

    #[error("缺少请求体")]
    MissingBody,

    #[error("该能力不接受请求体")]
    UnexpectedBody,

    #[error("不支持的查询参数: {0}")]
    UnexpectedQuery(String),

    #[error("请求体格式错误: {0}")]
    Body(String),
}

impl From<SchemaError> for DispatchError {
    fn from(error: SchemaError) -> Self {
        DispatchError::InvalidRequest(error.to_string())
    }
}

/// 解码所需的请求片段
#[derive(Debug, Clone, Default)]
pub struct RequestParts {
    pub path_params: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GetUser {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ListUsers {
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CreateUser {
    pub email: String,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GetOrder {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct OrderItem {
    pub sku: String,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CreateOrder {
    pub user_id: i64,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct GetInventory {
    pub sku: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReserveInventory {
    pub sku: String,
    pub quantity: u32,
    pub order_id: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    Email,
    Sms,
    Push,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SendNotification {
    pub user_id: i64,
    pub channel: NotificationChannel,
    pub message: String,
}

/// 按能力区分的强类型请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityRequest {
    GetUser(GetUser),
    ListUsers(ListUsers),
    CreateUser(CreateUser),
    GetOrder(GetOrder),
    CreateOrder(CreateOrder),
    GetInventory(GetInventory),
    ReserveInventory(ReserveInventory),
    SendNotification(SendNotification),
}

impl CapabilityRequest {
    /// 将入站请求解码为指定能力的请求结构
    pub fn decode(capability: &str, parts: &RequestParts) -> Result<Self, SchemaError> {
        if let Some((query, accepts_body)) = request_shape(capability) {
            check_shape(parts, query, accepts_body)?;
        }

        let request = match capability {
            "user.get" => CapabilityRequest::GetUser(GetUser {
                id: id_param(parts, "id")?,
            }),
            "user.list" => CapabilityRequest::ListUsers(ListUsers {
                limit: list_limit(parts)?,
            }),
            "user.create" => CapabilityRequest::CreateUser(body(parts)?),
            "order.get" => CapabilityRequest::GetOrder(GetOrder {
                id: id_param(parts, "id")?,
            }),
            "order.create" => CapabilityRequest::CreateOrder(body(parts)?),
            "inventory.get" => CapabilityRequest::GetInventory(GetInventory {
                sku: string_param(parts, "sku")?,
            }),
            "inventory.reserve" => CapabilityRequest::ReserveInventory(body(parts)?),
            "notification.send" => CapabilityRequest::SendNotification(body(parts)?),
            other => return Err(SchemaError::UnknownCapability(other.to_string())),
        };

        request.validate()?;
        Ok(request)
    }

    /// 能力标识，同时作为下游RPC的操作名
    pub fn operation(&self) -> &'static str {
        match self {
            CapabilityRequest::GetUser(_) => "user.get",
            CapabilityRequest::ListUsers(_) => "user.list",
            CapabilityRequest::CreateUser(_) => "user.create",
            CapabilityRequest::GetOrder(_) => "order.get",
            CapabilityRequest::CreateOrder(_) => "order.create",
            CapabilityRequest::GetInventory(_) => "inventory.get",
            CapabilityRequest::ReserveInventory(_) => "inventory.reserve",
            CapabilityRequest::SendNotification(_) => "notification.send",
        }
    }

    /// 序列化后的请求负载
    pub fn payload(&self) -> Result<serde_json::Value, SchemaError> {
        let value = match self {
            CapabilityRequest::GetUser(r) => serde_json::to_value(r),
            CapabilityRequest::ListUsers(r) => serde_json::to_value(r),
            CapabilityRequest::CreateUser(r) => serde_json::to_value(r),
            CapabilityRequest::GetOrder(r) => serde_json::to_value(r),
            CapabilityRequest::CreateOrder(r) => serde_json::to_value(r),
            CapabilityRequest::GetInventory(r) => serde_json::to_value(r),
            CapabilityRequest::ReserveInventory(r) => serde_json::to_value(r),
            CapabilityRequest::SendNotification(r) => serde_json::to_value(r),
        };
        value.map_err(|e| SchemaError::Body(e.to_string()))
    }

    fn validate(&self) -> Result<(), SchemaError> {
        match self {
            CapabilityRequest::CreateUser(r) => {
                if r.username.trim().is_empty() {
                    return Err(invalid("username", "不能为空"));
                }
                if !r.email.contains('@') {
                    return Err(invalid("email", "不是合法的邮箱地址"));
                }
            }
            CapabilityRequest::CreateOrder(r) => {
                if r.items.is_empty() {
                    return Err(invalid("items", "订单至少包含一个商品"));
                }
                if r.items.iter().any(|item| item.quantity == 0) {
                    return Err(invalid("quantity", "必须大于0"));
                }
            }
            CapabilityRequest::ReserveInventory(r) => {
                if r.quantity == 0 {
                    return Err(invalid("quantity", "必须大于0"));
                }
            }
            CapabilityRequest::SendNotification(r) => {
                if r.message.trim().is_empty() {
                    return Err(invalid("message", "不能为空"));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// 能力允许的查询参数，以及是否接受请求体
fn request_shape(capability: &str) -> Option<(&'static [&'static str], bool)> {
    match capability {
        "user.get" | "order.get" | "inventory.get" => Some((&[], false)),
        "user.list" => Some((&["limit"], false)),
        "user.create" | "order.create" | "inventory.reserve" | "notification.send" => {
            Some((&[], true))
        }
        _ => None,
    }
}

fn check_shape(
    parts: &RequestParts,
    allowed_query: &[&str],
    accepts_body: bool,
) -> Result<(), SchemaError> {
    let mut unexpected: Vec<&String> = parts
        .query
        .keys()
        .filter(|key| !allowed_query.contains(&key.as_str()))
        .collect();
    unexpected.sort();
    if let Some(key) = unexpected.first() {
        return Err(SchemaError::UnexpectedQuery((*key).clone()));
    }
    if !accepts_body && parts.body.is_some() {
        return Err(SchemaError::UnexpectedBody);
    }
    Ok(())
}

fn invalid(name: &'static str, reason: &str) -> SchemaError {
    SchemaError::InvalidParam {
        name,
        reason: reason.to_string(),
    }
}

fn string_param(parts: &RequestParts, name: &'static str) -> Result<String, SchemaError> {
    match parts.path_params.get(name) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(SchemaError::MissingParam(name)),
    }
}

fn id_param(parts: &RequestParts, name: &'static str) -> Result<i64, SchemaError> {
    let raw = string_param(parts, name)?;
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(invalid(name, &format!("'{raw}' 不是合法的ID"))),
    }
}

fn list_limit(parts: &RequestParts) -> Result<u32, SchemaError> {
    let Some(raw) = parts.query.get("limit") else {
        return Ok(DEFAULT_LIST_LIMIT);
    };
    match raw.parse::<u32>() {
        Ok(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => Ok(limit),
        _ => Err(invalid(
            "limit",
            &format!("必须是1到{MAX_LIST_LIMIT}之间的整数"),
        )),
    }
}

fn body<T: DeserializeOwned>(parts: &RequestParts) -> Result<T, SchemaError> {
    let value = parts.body.clone().ok_or(SchemaError::MissingBody)?;
    serde_json::from_value(value).map_err(|e| SchemaError::Body(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_param(name: &str, value: &str) -> RequestParts {
        let mut parts = RequestParts::default();
        parts.path_params.insert(name.to_string(), value.to_string());
        parts
    }

    fn with_body(body: serde_json::Value) -> RequestParts {
        RequestParts {
            body: Some(body),
            ..RequestParts::default()
        }
    }

    #[test]
    fn test_decode_get_user() {
        let request = CapabilityRequest::decode("user.get", &with_param("id", "42")).unwrap();
        assert_eq!(request, CapabilityRequest::GetUser(GetUser { id: 42 }));
        assert_eq!(request.payload().unwrap(), json!({"id": 42}));
        assert_eq!(request.operation(), "user.get");
    }

    #[test]
    fn test_non_numeric_id_is_rejected() {
        let err = CapabilityRequest::decode("user.get", &with_param("id", "abc")).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidParam { name: "id", .. }));
    }

    #[test]
    fn test_list_users_limit() {
        let parts = RequestParts::default();
        let request = CapabilityRequest::decode("user.list", &parts).unwrap();
        assert_eq!(request, CapabilityRequest::ListUsers(ListUsers { limit: 10 }));

        let mut parts = RequestParts::default();
        parts.query.insert("limit".to_string(), "25".to_string());
        let request = CapabilityRequest::decode("user.list", &parts).unwrap();
        assert_eq!(request, CapabilityRequest::ListUsers(ListUsers { limit: 25 }));

        parts.query.insert("limit".to_string(), "0".to_string());
        assert!(CapabilityRequest::decode("user.list", &parts).is_err());
    }

    #[test]
    fn test_path_only_capabilities_reject_body_and_unknown_query() {
        for (capability, name, value) in [
            ("user.get", "id", "42"),
            ("order.get", "id", "7"),
            ("inventory.get", "sku", "SKU-1"),
        ] {
            let mut parts = with_param(name, value);
            parts.body = Some(json!({"id": 1}));
            assert_eq!(
                CapabilityRequest::decode(capability, &parts).unwrap_err(),
                SchemaError::UnexpectedBody
            );

            let mut parts = with_param(name, value);
            parts.query.insert("expand".to_string(), "all".to_string());
            assert_eq!(
                CapabilityRequest::decode(capability, &parts).unwrap_err(),
                SchemaError::UnexpectedQuery("expand".to_string())
            );
        }

        let mut parts = RequestParts::default();
        parts.query.insert("limit".to_string(), "5".to_string());
        parts.query.insert("offset".to_string(), "10".to_string());
        assert_eq!(
            CapabilityRequest::decode("user.list", &parts).unwrap_err(),
            SchemaError::UnexpectedQuery("offset".to_string())
        );
    }

    #[test]
    fn test_unknown_body_field_is_rejected() {
        let parts = with_body(json!({
            "email": "a@example.com",
            "username": "alice",
            "role": "admin"
        }));
        let err = CapabilityRequest::decode("user.create", &parts).unwrap_err();
        match err {
            SchemaError::Body(msg) => assert!(msg.contains("role")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_body_field_is_rejected() {
        let parts = with_body(json!({"email": "a@example.com"}));
        let err = CapabilityRequest::decode("user.create", &parts).unwrap_err();
        match err {
            SchemaError::Body(msg) => assert!(msg.contains("username")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_body() {
        let err = CapabilityRequest::decode("order.create", &RequestParts::default()).unwrap_err();
        assert_eq!(err, SchemaError::MissingBody);
    }

    #[test]
    fn test_decode_order_and_reservation() {
        let parts = with_body(json!({
            "user_id": 1,
            "items": [{"sku": "SKU-1", "quantity": 2}]
        }));
        let request = CapabilityRequest::decode("order.create", &parts).unwrap();
        assert_eq!(request.operation(), "order.create");

        let empty = with_body(json!({"user_id": 1, "items": []}));
        assert!(CapabilityRequest::decode("order.create", &empty).is_err());

        let reserve = with_body(json!({"sku": "SKU-1", "quantity": 0, "order_id": 9}));
        assert!(CapabilityRequest::decode("inventory.reserve", &reserve).is_err());
    }

    #[test]
    fn test_notification_channel() {
        let parts = with_body(json!({"user_id": 3, "channel": "sms", "message": "hello"}));
        let request = CapabilityRequest::decode("notification.send", &parts).unwrap();
        match request {
            CapabilityRequest::SendNotification(n) => {
                assert_eq!(n.channel, NotificationChannel::Sms)
            }
            other => panic!("unexpected request: {other:?}"),
        }

        let bad = with_body(json!({"user_id": 3, "channel": "fax", "message": "hello"}));
        assert!(CapabilityRequest::decode("notification.send", &bad).is_err());
    }

    #[test]
    fn test_unknown_capability() {
        let err = CapabilityRequest::decode("payment.charge", &RequestParts::default()).unwrap_err();
        assert_eq!(err, SchemaError::UnknownCapability("payment.charge".to_string()));
        let dispatch: DispatchError = err.into();
        assert!(dispatch.is_client_error());
    }

    #[test]
    fn test_every_known_capability_decodes_somewhere() {
        for capability in KNOWN_CAPABILITIES {
            let err = CapabilityRequest::decode(capability, &RequestParts::default());
            assert!(!matches!(err, Err(SchemaError::UnknownCapability(_))));
        }
    }
}
