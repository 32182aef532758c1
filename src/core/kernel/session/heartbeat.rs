use super::{EpochSignal, SessionInner};
use crate::core::kernel::codec::WsCodec;
use futures_util::future::BoxFuture;
use std::sync::Arc;
use tracing::{debug, error};

/// Heartbeat monitor for one connection epoch
pub(super) fn heartbeat_loop<C: WsCodec>(
    inner: Arc<SessionInner<C>>,
    mut epoch: EpochSignal,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let interval = inner.config.heartbeat_interval();

        loop {
            if !inner.is_live(epoch.id) {
                break;
            }

            if let Err(e) = inner.write(inner.codec.heartbeat_probe()).await {
                error!(error = %e, "Heartbeat error");
                inner.handle_disconnect(epoch.id).await;
                break;
            }
            debug!("Ping sent");

            tokio::select! {
                biased;
                () = epoch.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        debug!(epoch = epoch.id, "Heartbeat loop stopped");
    })
}
