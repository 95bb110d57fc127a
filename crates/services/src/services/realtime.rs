//! Change-notification listener. Notifications carry no usable diff, so
//! every signal means "dirty, re-fetch everything"; bursts are debounced
//! into a single refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::gateway::{GatewayError, OrderGateway};
use super::order_sync::OrderSyncService;

pub struct RealtimeService;

impl RealtimeService {
    /// Subscribe to the gateway's change feed and spawn the sync loop. The
    /// loop also wakes on the coordinator's forced-refresh signal and stops
    /// when `cancel` fires, releasing the subscription on the way out.
    pub async fn spawn(
        gateway: Arc<dyn OrderGateway>,
        sync: Arc<OrderSyncService>,
        debounce: Duration,
        cancel: CancellationToken,
    ) -> Result<JoinHandle<()>, GatewayError> {
        let mut subscription = gateway.subscribe_changes().await?;
        let invalidate = sync.invalidation_handle();

        Ok(tokio::spawn(async move {
            info!("realtime sync loop started");
            'listen: loop {
                tokio::select! {
                    _ = cancel.cancelled() => break 'listen,
                    changed = subscription.changed() => {
                        if changed.is_none() {
                            warn!("change feed closed, stopping realtime sync loop");
                            break 'listen;
                        }
                    }
                    _ = invalidate.notified() => {}
                }

                // Absorb follow-up signals until the feed stays quiet for the
                // debounce window, then refresh once.
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break 'listen,
                        _ = tokio::time::sleep(debounce) => break,
                        changed = subscription.changed() => {
                            if changed.is_none() {
                                break;
                            }
                        }
                        _ = invalidate.notified() => {}
                    }
                }

                if let Err(err) = sync.refresh().await {
                    // refresh() already warned and kept the displayed data.
                    debug!(error = %err, "refresh after change notification failed");
                }
            }
            subscription.unsubscribe();
            info!("realtime sync loop stopped");
        }))
    }
}
