use async_trait::async_trait;
use bytes::Bytes;
use bytestring::ByteString;
use serde::{Deserialize, Serialize};

use crate::queue::Ingress;
use crate::Result;

/// Quality of Service
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum QoS {
    /// At most once delivery
    AtMostOnce = 0,
    /// At least once delivery
    AtLeastOnce = 1,
    /// Exactly once delivery
    ExactlyOnce = 2,
}

impl QoS {
    #[inline]
    pub fn value(&self) -> u8 {
        match self {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = crate::Error;

    #[inline]
    fn try_from(v: u8) -> Result<Self> {
        match v {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            _ => Err(anyhow::anyhow!("invalid QoS value, {}", v)),
        }
    }
}

/// Wire-level MQTT client the facade drives.
///
/// Implementations own the actual protocol work (framing, CONNECT/CONNACK,
/// packet encoding). The facade treats every call as fire-and-forget: it
/// gates calls on its own connection state, logs failures and moves on.
#[async_trait]
pub trait Transport: Sync + Send {
    /// Establishes the broker connection. May be slow; the retry loop
    /// calls it repeatedly until it succeeds.
    async fn connect(&self) -> Result<()>;

    /// Tears the connection down. Best-effort, errors are swallowed by
    /// the caller.
    async fn disconnect(&self) -> Result<()>;

    /// Whether the underlying connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Subscribes the broker to the given filters in one request.
    async fn subscribe_topics(&self, filters: Vec<ByteString>) -> Result<()>;

    /// Unsubscribes the broker from the given filters in one request.
    async fn unsubscribe_topics(&self, filters: Vec<ByteString>) -> Result<()>;

    async fn publish(&self, topic: ByteString, payload: Bytes, qos: QoS, retain: bool) -> Result<()>;

    /// Registration point for received messages. The implementation keeps
    /// the handle and pushes every received (topic, payload) pair from its
    /// receive context.
    fn set_inbound(&self, ingress: Ingress);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos() {
        assert_eq!(QoS::try_from(0).unwrap(), QoS::AtMostOnce);
        assert_eq!(QoS::try_from(1).unwrap(), QoS::AtLeastOnce);
        assert_eq!(QoS::try_from(2).unwrap(), QoS::ExactlyOnce);
        assert!(QoS::try_from(3).is_err());
        assert_eq!(QoS::AtLeastOnce.value(), 1);
    }
}
