//! Packet application
//!
//! The reader hands every dispatch to one task per shard, so heartbeat
//! acks and the other control opcodes keep flowing while a handler waits
//! on a REST backfill or a listener takes its time. Jobs run strictly in
//! the order they were queued, across reconnects.

use std::sync::Arc;

use cord_core::Event;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::dispatch::Dispatcher;
use crate::handlers::{HandlerContext, HandlerRegistry};

pub(crate) enum Job {
    Dispatch {
        /// Connection the packet arrived on
        generation: u64,
        seq: Option<u64>,
        event: String,
        payload: Value,
        ctx: HandlerContext,
    },
    /// Session lifecycle event, kept in line with the packets before it
    Lifecycle(Event),
}

/// Sent back to the session once a packet's cache changes are in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Applied {
    pub generation: u64,
    pub event: String,
}

pub(crate) async fn run_applier(
    mut jobs: mpsc::UnboundedReceiver<Job>,
    handlers: Arc<HandlerRegistry>,
    dispatcher: Arc<Dispatcher>,
    applied: mpsc::UnboundedSender<Applied>,
) {
    while let Some(job) = jobs.recv().await {
        match job {
            Job::Lifecycle(event) => dispatcher.dispatch(&event),
            Job::Dispatch {
                generation,
                seq,
                event,
                payload,
                ctx,
            } => {
                let outcome = handlers.handle(&event, payload, &ctx).await;
                // The session may transition before listeners run
                let _ = applied.send(Applied {
                    generation,
                    event: event.clone(),
                });
                match outcome {
                    Ok(events) => dispatcher.dispatch_all(&events),
                    Err(e) => tracing::error!(event = %event, seq = ?seq, error = %e, "Handler failed, packet dropped"),
                }
            }
        }
    }
    tracing::debug!("Packet queue closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::{context, message_json};
    use crate::handlers::{HandlerResult, PacketHandler};
    use async_trait::async_trait;
    use cord_core::EventKind;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Slow;

    #[async_trait]
    impl PacketHandler for Slow {
        async fn handle(&self, _: Value, _: &HandlerContext) -> HandlerResult<Vec<Event>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![Event::Reconnect {
                shard: 0,
                cause: "slow".into(),
            }])
        }
    }

    fn dispatch(generation: u64, event: &str, payload: Value, ctx: &HandlerContext) -> Job {
        Job::Dispatch {
            generation,
            seq: Some(generation),
            event: event.to_string(),
            payload,
            ctx: ctx.clone(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_jobs_apply_in_queue_order() {
        let (ctx, _rx) = context();
        let dispatcher = Dispatcher::new(Arc::clone(ctx.cache_arc()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::Reconnect, EventKind::LostConnection] {
            let seen = Arc::clone(&seen);
            dispatcher.on(kind, move |event, _| seen.lock().push(event.kind()));
        }
        let mut registry = HandlerRegistry::with_defaults();
        registry.register("SLOW", Slow);

        let (jobs_tx, jobs_rx) = mpsc::unbounded_channel();
        let (applied_tx, mut applied_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_applier(
            jobs_rx,
            Arc::new(registry),
            Arc::clone(&dispatcher),
            applied_tx,
        ));

        jobs_tx.send(dispatch(1, "SLOW", Value::Null, &ctx)).unwrap();
        jobs_tx.send(Job::Lifecycle(Event::LostConnection { shard: 0 })).unwrap();
        jobs_tx
            .send(dispatch(2, "MESSAGE_CREATE", message_json(100, 20), &ctx))
            .unwrap();
        drop(jobs_tx);
        task.await.unwrap();

        assert_eq!(applied_rx.recv().await.unwrap().event, "SLOW");
        assert_eq!(
            applied_rx.recv().await.unwrap(),
            Applied {
                generation: 2,
                event: "MESSAGE_CREATE".into()
            }
        );
        assert_eq!(*seen.lock(), vec![EventKind::Reconnect, EventKind::LostConnection]);
    }
}
