use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Instrument sentinel used when a subscription covers every instrument
pub const ALL_INSTRUMENTS: &str = "all";

/// Identity of one logical subscription: a channel scoped to an instrument
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionKey {
    pub channel: String,
    pub inst_id: String,
}

impl SubscriptionKey {
    pub fn new(channel: impl Into<String>, inst_id: Option<&str>) -> Self {
        Self {
            channel: channel.into(),
            inst_id: inst_id.unwrap_or(ALL_INSTRUMENTS).to_string(),
        }
    }

    /// Instrument to put on the wire; the "all" sentinel is sent as no instrument
    pub fn wire_inst_id(&self) -> Option<&str> {
        if self.inst_id == ALL_INSTRUMENTS {
            None
        } else {
            Some(self.inst_id.as_str())
        }
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.channel, self.inst_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Request written, no acknowledgement yet
    Pending,
    /// Acknowledged by the server; replayed on reconnect
    Confirmed,
}

/// Push action on a data frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushAction {
    Snapshot,
    Update,
}

/// A data frame handed to the consumer
#[derive(Debug, Clone, PartialEq)]
pub struct DataEvent {
    pub key: Option<SubscriptionKey>,
    pub action: Option<PushAction>,
    pub raw: Value,
}

impl DataEvent {
    pub fn channel(&self) -> Option<&str> {
        self.key.as_ref().map(|k| k.channel.as_str())
    }

    /// The `data` payload of the frame, if any
    pub fn data(&self) -> Option<&Value> {
        self.raw.get("data")
    }
}

/// Control event kinds carried by acknowledgement frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    Subscribe,
    Unsubscribe,
    Login,
}

/// Classified inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEnvelope {
    ControlAck {
        event: ControlEvent,
        key: Option<SubscriptionKey>,
        code: Option<String>,
        message: Option<String>,
        raw: Value,
    },
    ControlError {
        key: Option<SubscriptionKey>,
        code: Option<String>,
        message: Option<String>,
        raw: Value,
    },
    DataEvent(DataEvent),
    Heartbeat,
}

/// A zero or absent code denotes success
pub fn is_success_code(code: Option<&str>) -> bool {
    code.map_or(true, |c| c == "0")
}

/// Arguments of an authentication request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginArgs {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
    pub nonce: String,
}
