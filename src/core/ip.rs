use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::ComponentId;

/// Packet type tag. Brackets delimit substreams; the runtime never
/// interprets them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IpKind {
    #[default]
    Normal,
    Open,
    Close,
}

/// The message envelope carried by connections.
///
/// While queued a packet has no owner; the connection assigns the
/// downstream component as owner when the packet is dequeued.
#[derive(Debug, Clone, PartialEq)]
pub struct InformationPacket {
    owner: Option<ComponentId>,
    kind: IpKind,
    data: Value,
}

impl InformationPacket {
    pub fn new(data: Value) -> Self {
        Self {
            owner: None,
            kind: IpKind::Normal,
            data,
        }
    }

    pub fn open(data: Value) -> Self {
        Self::new(data).with_kind(IpKind::Open)
    }

    pub fn close(data: Value) -> Self {
        Self::new(data).with_kind(IpKind::Close)
    }

    pub fn with_kind(mut self, kind: IpKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_owner(mut self, owner: Option<ComponentId>) -> Self {
        self.owner = owner;
        self
    }

    pub fn owner(&self) -> Option<ComponentId> {
        self.owner
    }

    pub(crate) fn set_owner(&mut self, owner: Option<ComponentId>) {
        self.owner = owner;
    }

    pub fn kind(&self) -> IpKind {
        self.kind
    }

    pub fn is_bracket(&self) -> bool {
        self.kind != IpKind::Normal
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn into_data(self) -> Value {
        self.data
    }
}

impl From<Value> for InformationPacket {
    fn from(data: Value) -> Self {
        Self::new(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_packet_is_unowned_normal() {
        let ip = InformationPacket::new(json!({"name": 1}));
        assert_eq!(ip.owner(), None);
        assert_eq!(ip.kind(), IpKind::Normal);
        assert!(!ip.is_bracket());
        assert_eq!(ip.data(), &json!({"name": 1}));
    }

    #[test]
    fn test_brackets() {
        assert_eq!(InformationPacket::open(json!("group")).kind(), IpKind::Open);
        assert!(InformationPacket::close(Value::Null).is_bracket());
    }

    #[test]
    fn test_kind_wire_names() {
        assert_eq!(serde_json::to_value(IpKind::Open).unwrap(), json!("open"));
        let kind: IpKind = serde_json::from_value(json!("close")).unwrap();
        assert_eq!(kind, IpKind::Close);
    }
}
