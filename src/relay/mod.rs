use crate::comm::channel::ChannelId;
use crate::comm::router::ChannelRouter;
use crate::errors::RelayResult;
use crate::scheduler::gate::DaemonGate;
use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

/// Async callback handling one turn: message text plus its source identity,
/// returning the reply to emit.
pub type TurnCallback = Arc<
    dyn Fn(
            String,
            ChannelId,
        ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<String>> + Send>>
        + Send
        + Sync,
>;

/// Foreground conversation loop glue.
///
/// Waits on the inbound channels, closes the daemon gate for the duration of
/// each turn so the scheduler cannot fire mid-interaction, hands the message
/// to the turn handler, and routes the reply back out with the end-of-turn
/// marker. The handler is where an assistant front end plugs in.
pub struct RelayLoop {
    router: ChannelRouter,
    gate: DaemonGate,
    on_turn: TurnCallback,
}

impl RelayLoop {
    pub fn new(router: ChannelRouter, gate: DaemonGate, on_turn: TurnCallback) -> Self {
        Self {
            router,
            gate,
            on_turn,
        }
    }

    /// Placeholder handler used by the bundled binary: logs the message and
    /// echoes it back. Real deployments install their own callback.
    pub fn echo_handler() -> TurnCallback {
        Arc::new(|text, channel| {
            Box::pin(async move {
                info!("Turn from '{}': {} chars", channel, text.len());
                Ok(text)
            })
        })
    }

    /// Consume exactly one turn. The gate stays open while blocked on input
    /// and is closed from consumption until the final outbound write.
    pub async fn turn(&mut self) -> RelayResult<()> {
        let (text, channel) = self.router.await_inbound().await?;
        self.gate.pause().await;

        match (self.on_turn)(text, channel).await {
            Ok(reply) => {
                self.router.emit_outbound(&reply, true)?;
            }
            Err(e) => {
                warn!("Turn handler failed: {}", e);
                self.router.emit_outbound(&format!("Error: {}", e), true)?;
            }
        }

        self.gate.resume().await;
        Ok(())
    }

    pub async fn run(mut self) -> RelayResult<()> {
        loop {
            self.turn().await?;
        }
    }
}
