//! Cord client entry point
//!
//! Logs in with the `CORD_*` environment configuration and logs the
//! events it receives until interrupted.
//!
//! ```bash
//! CORD_TOKEN=... cargo run -p cord-client
//! ```

use cord_client::{ClientBuilder, ClientError};
use cord_common::{try_init_tracing_with_config, TracingConfig};
use cord_core::{Event, EventKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let builder = ClientBuilder::from_env();
    let json = builder.as_ref().is_ok_and(|b| b.config().log_json);

    // Initialize tracing
    if let Err(e) = try_init_tracing_with_config(TracingConfig::default().with_json(json)) {
        eprintln!("Warning: Failed to initialize tracing: {e}");
    }

    let builder = match builder {
        Ok(builder) => builder,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(builder).await {
        error!(error = %e, "Client stopped");
        std::process::exit(1);
    }
}

async fn run(builder: ClientBuilder) -> anyhow::Result<()> {
    info!(
        shard = builder.config().shard_index,
        shards = builder.config().shard_count,
        account_type = %builder.config().account_type,
        "Configuration loaded"
    );

    let builder = [
        EventKind::Ready,
        EventKind::Resumed,
        EventKind::Reconnect,
        EventKind::LostConnection,
        EventKind::ServerJoin,
        EventKind::ServerLeave,
        EventKind::ServerBecomesAvailable,
        EventKind::ServerBecomesUnavailable,
        EventKind::MessageCreate,
    ]
    .into_iter()
    .fold(builder, |builder, kind| builder.on(kind, log_event));

    let mut client = builder.login().await.map_err(|e| {
        if e.is_fatal() {
            error!(error = %e, "Login rejected");
        }
        e
    })?;

    if let Some(me) = client.yourself() {
        info!(user = %me.tag(), servers = client.cache().server_count(), "Logged in");
    }

    let outcome: Result<(), ClientError> = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, disconnecting");
            Ok(())
        }
        result = client.closed() => result,
    };

    client.disconnect().await;
    if let Err(e) = &outcome {
        warn!(error = %e, "Session ended");
    }
    Ok(outcome?)
}

fn log_event(event: &Event, cache: &cord_cache::EntityCache) {
    match event {
        Event::MessageCreate { message_id, channel_id, .. } => {
            let content = cache.messages().get(*message_id).map(|m| m.content).unwrap_or_default();
            info!(message_id = %message_id, channel_id = %channel_id, content = %content, "Message");
        }
        other => info!(kind = other.kind().as_str(), "Event"),
    }
}
