use super::{EpochSignal, SessionInner};
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::ws::WsStream;
use crate::core::types::{is_success_code, ControlEvent, InboundEnvelope};
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Receive loop for one connection epoch
///
/// Idle read timeouts are normal. A read error, a decode error or the end of
/// the stream all count as a lost connection and go to disconnect handling,
/// after which this loop ends; a successful reconnect starts its successor.
pub(super) fn receive_loop<C: WsCodec>(
    inner: Arc<SessionInner<C>>,
    mut stream: Box<dyn WsStream>,
    mut epoch: EpochSignal,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let read_timeout = inner.config.read_timeout();

        loop {
            if !inner.is_live(epoch.id) {
                inner.handle_disconnect(epoch.id).await;
                break;
            }

            let frame = tokio::select! {
                biased;
                () = epoch.cancelled() => break,
                frame = tokio::time::timeout(read_timeout, stream.next_text()) => frame,
            };

            match frame {
                Err(_) => continue,
                Ok(Some(Ok(text))) => {
                    if let Err(e) = process_frame(&inner, &text) {
                        error!(error = %e, "Error handling WebSocket message");
                        inner.mark_disconnected(epoch.id);
                    }
                }
                Ok(Some(Err(e))) => {
                    error!(error = %e, "Error receiving message");
                    inner.mark_disconnected(epoch.id);
                }
                Ok(None) => {
                    info!("WebSocket stream ended");
                    inner.mark_disconnected(epoch.id);
                }
            }
        }

        debug!(epoch = epoch.id, "Message receiver stopped");
    })
}

fn process_frame<C: WsCodec>(inner: &SessionInner<C>, text: &str) -> Result<(), ExchangeError> {
    match inner.codec.decode_message(text)? {
        InboundEnvelope::Heartbeat => {}
        InboundEnvelope::ControlAck {
            event: ControlEvent::Subscribe,
            key,
            code,
            message,
            ..
        } => {
            let Some(key) = key else {
                warn!(frame = %text, "Invalid subscription response format");
                return Ok(());
            };

            if is_success_code(code.as_deref()) {
                if inner.registry.confirm(&key) {
                    info!(subscription = %key, "Subscription confirmed");
                } else {
                    debug!(subscription = %key, "Acknowledgement for untracked subscription");
                }
            } else {
                inner.registry.remove(&key);
                let err = ExchangeError::SubscriptionError {
                    channel: key.channel,
                    inst_id: key.inst_id,
                    code: code.unwrap_or_default(),
                    message: message.unwrap_or_else(|| "Unknown error".to_string()),
                };
                error!(error = %err, "Subscription failed");
            }
        }
        InboundEnvelope::ControlAck { event, key, .. } => {
            debug!(?event, subscription = ?key, "Control acknowledgement");
        }
        InboundEnvelope::ControlError {
            key, code, message, ..
        } => {
            error!(
                code = code.as_deref().unwrap_or(""),
                message = message.as_deref().unwrap_or(""),
                "Error message received"
            );
            if let Some(key) = key {
                if inner.registry.remove_if_pending(&key) {
                    warn!(subscription = %key, "Pending subscription dropped after error");
                }
            }
        }
        InboundEnvelope::DataEvent(event) => {
            if !inner.delivery.push(event) {
                debug!("Listener dropped, discarding event");
            }
        }
    }

    Ok(())
}
