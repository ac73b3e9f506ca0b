//! Fixed worker pool draining the bounded event queue.

use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use cqrelay_agent::pipeline::MessageContext;
use cqrelay_onebot::handler::handle_private_message;
use cqrelay_onebot::PrivateMessage;

/// Spawn `count` workers sharing one receiver. Each worker handles one
/// message to completion before taking the next.
///
/// Workers exit once every sender is dropped and the queue is drained, or
/// once `shutdown` flips to `true` or its sender is gone. A message already
/// picked up is always finished before the worker exits; queued ones are
/// left behind.
pub fn spawn_workers<C: MessageContext + 'static>(
    ctx: Arc<C>,
    rx: mpsc::Receiver<PrivateMessage>,
    count: usize,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let count = count.max(1);
    let rx = Arc::new(Mutex::new(rx));
    info!(workers = count, "starting worker pool");

    (0..count)
        .map(|worker| {
            let ctx = Arc::clone(&ctx);
            let rx = Arc::clone(&rx);
            let mut shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    // Hold the receiver lock only while waiting for the next message.
                    let next = {
                        let mut rx = rx.lock().await;
                        if *shutdown.borrow() {
                            None
                        } else {
                            tokio::select! {
                                msg = rx.recv() => msg,
                                _ = shutdown.changed() => None,
                            }
                        }
                    };
                    let Some(msg) = next else { break };
                    debug!(worker, id = %msg.id, "worker picked up message");
                    handle_private_message(ctx.as_ref(), msg).await;
                }
                debug!(worker, "worker exiting");
            })
        })
        .collect()
}
