use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::types::{
    ControlEvent, DataEvent, InboundEnvelope, LoginArgs, PushAction, SubscriptionKey,
};
use crate::exchanges::blofin::types::{BlofinWsChannel, BlofinWsRequest, BlofinWsResponse};
use serde::Serialize;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;

const PING: &str = "ping";
const PONG: &str = "pong";

/// BloFin WebSocket codec implementation
#[derive(Debug, Clone, Copy, Default)]
pub struct BlofinCodec;

impl BlofinCodec {
    fn request<A: Serialize>(op: &str, arg: A) -> Result<Message, ExchangeError> {
        let request = BlofinWsRequest {
            op: op.to_string(),
            args: vec![arg],
        };
        Ok(Message::Text(serde_json::to_string(&request)?))
    }

    fn channel_arg(key: &SubscriptionKey) -> BlofinWsChannel {
        BlofinWsChannel {
            channel: key.channel.clone(),
            inst_id: key.wire_inst_id().map(str::to_string),
        }
    }

    fn control_event(event: &str) -> Option<ControlEvent> {
        match event {
            "subscribe" => Some(ControlEvent::Subscribe),
            "unsubscribe" => Some(ControlEvent::Unsubscribe),
            "login" => Some(ControlEvent::Login),
            _ => None,
        }
    }

    fn push_action(action: Option<&str>) -> Option<PushAction> {
        match action {
            Some("snapshot") => Some(PushAction::Snapshot),
            Some("update") => Some(PushAction::Update),
            _ => None,
        }
    }
}

impl WsCodec for BlofinCodec {
    fn encode_subscription(&self, key: &SubscriptionKey) -> Result<Message, ExchangeError> {
        Self::request("subscribe", Self::channel_arg(key))
    }

    fn encode_unsubscription(&self, key: &SubscriptionKey) -> Result<Message, ExchangeError> {
        Self::request("unsubscribe", Self::channel_arg(key))
    }

    fn encode_login(&self, args: LoginArgs) -> Result<Message, ExchangeError> {
        Self::request("login", args)
    }

    fn heartbeat_probe(&self) -> Message {
        Message::Text(PING.to_string())
    }

    fn decode_message(&self, text: &str) -> Result<InboundEnvelope, ExchangeError> {
        if text == PONG {
            return Ok(InboundEnvelope::Heartbeat);
        }

        let raw: Value = serde_json::from_str(text)?;
        let frame: BlofinWsResponse = serde_json::from_value(raw.clone())?;

        let code = frame.code();
        let key = frame
            .arg
            .as_ref()
            .map(|arg| SubscriptionKey::new(arg.channel.as_str(), arg.inst_id.as_deref()));

        if let Some(event) = frame.event.as_deref() {
            if event == "error" {
                return Ok(InboundEnvelope::ControlError {
                    key,
                    code,
                    message: frame.msg,
                    raw,
                });
            }
            if let Some(event) = Self::control_event(event) {
                return Ok(InboundEnvelope::ControlAck {
                    event,
                    key,
                    code,
                    message: frame.msg,
                    raw,
                });
            }
        }

        Ok(InboundEnvelope::DataEvent(DataEvent {
            key,
            action: Self::push_action(frame.action.as_deref()),
            raw,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn text(message: Message) -> Value {
        match message {
            Message::Text(text) => serde_json::from_str(&text).unwrap(),
            other => panic!("Expected text message, got {:?}", other),
        }
    }

    #[test]
    fn test_encode_subscribe() {
        let msg = BlofinCodec
            .encode_subscription(&SubscriptionKey::new("tickers", Some("BTC-USDT")))
            .unwrap();
        assert_eq!(
            text(msg),
            json!({"op": "subscribe", "args": [{"channel": "tickers", "instId": "BTC-USDT"}]})
        );
    }

    #[test]
    fn test_encode_all_instruments_omits_inst_id() {
        let msg = BlofinCodec
            .encode_unsubscription(&SubscriptionKey::new("orders", None))
            .unwrap();
        assert_eq!(
            text(msg),
            json!({"op": "unsubscribe", "args": [{"channel": "orders"}]})
        );
    }

    #[test]
    fn test_encode_login() {
        let msg = BlofinCodec
            .encode_login(LoginArgs {
                api_key: "key".to_string(),
                passphrase: "pass".to_string(),
                timestamp: "1700000000000".to_string(),
                sign: "c2ln".to_string(),
                nonce: "1700000000000".to_string(),
            })
            .unwrap();
        assert_eq!(
            text(msg),
            json!({"op": "login", "args": [{
                "apiKey": "key",
                "passphrase": "pass",
                "timestamp": "1700000000000",
                "sign": "c2ln",
                "nonce": "1700000000000"
            }]})
        );
    }

    #[test]
    fn test_heartbeat_literals() {
        assert_eq!(BlofinCodec.heartbeat_probe(), Message::Text("ping".to_string()));
        assert_eq!(
            BlofinCodec.decode_message("pong").unwrap(),
            InboundEnvelope::Heartbeat
        );
    }

    #[test]
    fn test_decode_subscribe_ack() {
        let envelope = BlofinCodec
            .decode_message(r#"{"event":"subscribe","arg":{"channel":"tickers","instId":"ETH-USDT"}}"#)
            .unwrap();
        match envelope {
            InboundEnvelope::ControlAck {
                event, key, code, ..
            } => {
                assert_eq!(event, ControlEvent::Subscribe);
                assert_eq!(key, Some(SubscriptionKey::new("tickers", Some("ETH-USDT"))));
                assert_eq!(code, None);
            }
            other => panic!("Expected control ack, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ack_without_instrument_maps_to_all() {
        let envelope = BlofinCodec
            .decode_message(r#"{"event":"subscribe","arg":{"channel":"positions"},"code":"0"}"#)
            .unwrap();
        assert!(matches!(
            envelope,
            InboundEnvelope::ControlAck { key: Some(ref k), .. } if k.inst_id == "all"
        ));
    }

    #[test]
    fn test_decode_error() {
        let envelope = BlofinCodec
            .decode_message(r#"{"event":"error","code":"60012","msg":"Invalid request"}"#)
            .unwrap();
        match envelope {
            InboundEnvelope::ControlError {
                key, code, message, ..
            } => {
                assert_eq!(key, None);
                assert_eq!(code.as_deref(), Some("60012"));
                assert_eq!(message.as_deref(), Some("Invalid request"));
            }
            other => panic!("Expected control error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_login_ack() {
        let envelope = BlofinCodec
            .decode_message(r#"{"event":"login","code":"0","msg":""}"#)
            .unwrap();
        assert!(matches!(
            envelope,
            InboundEnvelope::ControlAck {
                event: ControlEvent::Login,
                ..
            }
        ));
    }

    #[test]
    fn test_decode_data_frame() {
        let frame = r#"{"arg":{"channel":"books5","instId":"BTC-USDT"},"action":"snapshot","data":{"asks":[],"bids":[]}}"#;
        match BlofinCodec.decode_message(frame).unwrap() {
            InboundEnvelope::DataEvent(event) => {
                assert_eq!(event.channel(), Some("books5"));
                assert_eq!(event.action, Some(PushAction::Snapshot));
                assert_eq!(event.data(), Some(&json!({"asks": [], "bids": []})));
            }
            other => panic!("Expected data event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_invalid_json_fails() {
        assert!(matches!(
            BlofinCodec.decode_message("not json"),
            Err(ExchangeError::JsonError(_))
        ));
    }
}
