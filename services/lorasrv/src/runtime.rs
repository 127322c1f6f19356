//! Cooperative master loop
//!
//! One task drives the whole protocol. Each pass, in order: drain the
//! channel's receive side into the engine, run the poll/timeout tick with
//! a single `now` sample, then give the alert dispatcher its drain step.
//! Nothing in the pass blocks; all waiting happens between passes.

use std::time::Instant;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::channel::ChannelLink;
use crate::error::Result;
use crate::poll::PollEngine;
use crate::sink::Sink;

/// Run the polling loop until cancellation. Returns the engine so callers
/// can inspect final state and statistics.
pub async fn run(
    mut engine: PollEngine,
    mut link: Box<dyn ChannelLink>,
    mut sink: Box<dyn Sink>,
    pass_interval: std::time::Duration,
    cancel: CancellationToken,
) -> Result<PollEngine> {
    link.open().await?;

    let mut pass = tokio::time::interval(pass_interval);
    pass.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "master loop started: {} nodes, pass every {:?}",
        engine.registry().len(),
        pass_interval
    );

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = pass.tick() => {
                while let Some((frame, quality)) = link.try_receive() {
                    engine.on_frame(&frame, quality, sink.as_mut());
                }
                engine.tick(Instant::now(), link.as_mut(), sink.as_mut());
                engine.drain_alerts(link.as_mut());
            },
        }
    }

    info!("master loop stopping");
    engine.stats().log_summary();
    info!("{} alert broadcasts sent", engine.alerts().broadcasts_sent());
    link.shutdown().await?;
    Ok(engine)
}
