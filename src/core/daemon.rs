// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/bt-tracker-rs

//! Daemon loop - poll, publish, sleep

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::DaemonContext;
use crate::config::DaemonConfig;
use crate::error::PublishError;
use crate::sensors::CycleResult;
use crate::streaming::cycle_messages;

/// Runs cycles on a fixed period, or exactly once
#[derive(Debug, Clone, Copy)]
pub struct DaemonLoop {
    period: Duration,
    repeat: bool,
}

impl DaemonLoop {
    pub fn new(period: Duration, repeat: bool) -> Self {
        Self { period, repeat }
    }

    pub fn from_config(config: &DaemonConfig) -> Self {
        Self::new(config.period(), config.enabled)
    }

    /// Run until done (non-repeating), a publish failure, or `shutdown`
    /// resolves while sleeping. The publisher is closed on every exit path.
    /// Returns the number of completed cycles.
    pub async fn run<F>(&self, ctx: &mut DaemonContext, shutdown: F) -> Result<u64, PublishError>
    where
        F: Future<Output = ()>,
    {
        let result = self.run_cycles(ctx, shutdown).await;
        let closed = ctx.publisher.close().await;

        let cycles = result?;
        closed?;
        Ok(cycles)
    }

    async fn run_cycles<F>(&self, ctx: &mut DaemonContext, shutdown: F) -> Result<u64, PublishError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut cycles = 0;

        loop {
            run_cycle(ctx).await?;
            cycles += 1;

            if !self.repeat {
                info!("Execution finished in non-daemon mode");
                return Ok(cycles);
            }

            info!("Sleeping ({} seconds) ...", self.period.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(self.period) => {}
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping after {} cycles", cycles);
                    return Ok(cycles);
                }
            }
        }
    }
}

/// One cycle: poll everything, then publish each reading with a short pause
pub async fn run_cycle(ctx: &mut DaemonContext) -> Result<CycleResult, PublishError> {
    let cycle = ctx
        .orchestrator
        .run_cycle(&mut ctx.registry, ctx.air_monitor.as_mut(), ctx.host.as_mut())
        .await;

    for message in cycle_messages(&cycle, &ctx.topics)? {
        info!("Publishing to MQTT topic \"{}\"", message.topic);
        ctx.publisher.publish(&message.topic, message.payload).await?;
        if !ctx.publish_pause.is_zero() {
            tokio::time::sleep(ctx.publish_pause).await;
        }
    }

    for (name, stats) in ctx.registry.stats() {
        debug!(
            "{}: {} attempts, {} successes, {} failures",
            name, stats.attempts, stats.successes, stats.failures
        );
    }
    info!("Status messages published");

    Ok(cycle)
}
