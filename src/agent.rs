//! Request agent – drives the [`Scheduler`] from JSON-lines requests.
//!
//! ## Request contract (inbound, one [`Envelope`] per line)
//!
//! | `type`           | Payload keys                          | Effect                      |
//! |------------------|---------------------------------------|-----------------------------|
//! | `remove_block`   | from, to, block                       | queue a removal scan        |
//! | `replace_block`  | from, to, from_block, to_block, pct?  | queue a replacement scan    |
//! | `remove_entity`  | from, to, entity                      | queue an entity removal     |
//! | `scan`           | from, to, block                       | queue a scan                |
//! | `undo` / `redo`  | id                                    | replay a cached journal     |
//! | `close`          | *(empty)*                             | drop the owner's operations |
//! | `history`        | *(empty)*                             | list the owner's journals   |
//! | `stats`          | *(empty)*                             | reply with `EngineStats`    |
//!
//! ## Outbound
//!
//! Every request is answered with one or more [`Response`] lines; every
//! completed operation additionally produces a `finished` line.

use crate::grid::GridWorld;
use crate::operation::GridEdit;
use crate::protocol::{percentage_from_json, Envelope, Request, Response};
use crate::scheduler::{Scheduler, TickReport};
use crate::types::{Region, WorldId};
use anyhow::{Context, Result};
use log::info;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

// ---------------------------------------------------------------------------
// Config for EngineAgent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// World every request targets.
    pub world: WorldId,
    /// Tick rate in Hz.
    pub tick_rate_hz: f32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            world: WorldId::new("overworld"),
            tick_rate_hz: 20.0,
        }
    }
}

// ---------------------------------------------------------------------------
// EngineAgent
// ---------------------------------------------------------------------------

/// Wraps a [`Scheduler`] and the world it mutates.
///
/// Call [`EngineAgent::run`] inside a Tokio runtime to start the agent.
pub struct EngineAgent {
    config: AgentConfig,
    scheduler: Arc<Mutex<Scheduler>>,
    world: Arc<Mutex<GridWorld>>,
}

impl EngineAgent {
    pub fn new(config: AgentConfig, scheduler: Arc<Mutex<Scheduler>>, world: Arc<Mutex<GridWorld>>) -> Self {
        Self {
            config,
            scheduler,
            world,
        }
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Parse and handle one request line.
    pub fn handle_line(&self, line: &str) -> Vec<Response> {
        match serde_json::from_str::<Envelope>(line) {
            Ok(envelope) => self.handle(envelope),
            Err(e) => vec![Response::Failed {
                error: format!("Invalid request: {}", e),
            }],
        }
    }

    pub fn handle(&self, envelope: Envelope) -> Vec<Response> {
        let Envelope { owner, request } = envelope;
        let world = self.config.world.clone();
        let mut scheduler = self.scheduler.lock();

        let edit = match request {
            Request::RemoveBlock { from, to, block } => GridEdit::remove(Region::new(from, to), block),
            Request::Scan { from, to, block } => GridEdit::scan(Region::new(from, to), block),
            Request::RemoveEntity { from, to, entity } => {
                GridEdit::remove_entities(Region::new(from, to), entity)
            }
            Request::ReplaceBlock {
                from,
                to,
                from_block,
                to_block,
                pct,
            } => {
                let (pct, notice) = percentage_from_json(pct.as_ref());
                let operation = scheduler.submit_edit(
                    owner,
                    world,
                    GridEdit::replace(Region::new(from, to), from_block, to_block, pct),
                );
                let mut responses: Vec<Response> =
                    notice.map(|message| Response::Notice { message }).into_iter().collect();
                responses.push(Response::Accepted { operation });
                return responses;
            }
            Request::Undo { id } => {
                return vec![match scheduler.undo(&owner, world, id) {
                    Ok(operation) => Response::Accepted { operation },
                    Err(e) => Response::Failed { error: e.to_string() },
                }];
            }
            Request::Redo { id } => {
                return vec![match scheduler.redo(&owner, world, id) {
                    Ok(operation) => Response::Accepted { operation },
                    Err(e) => Response::Failed { error: e.to_string() },
                }];
            }
            Request::Close => {
                return vec![Response::Closed {
                    dropped: scheduler.close(&owner),
                }];
            }
            Request::History => {
                return vec![Response::History {
                    entries: scheduler.history(&owner),
                }];
            }
            Request::Stats => return vec![Response::Stats(scheduler.stats())],
        };

        let operation = scheduler.submit_edit(owner, world, edit);
        vec![Response::Accepted { operation }]
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Tick the scheduler once against the agent's world.
    pub fn tick(&self) -> TickReport {
        let mut world = self.world.lock();
        self.scheduler.lock().tick(&mut *world)
    }

    // -----------------------------------------------------------------------
    // Serving
    // -----------------------------------------------------------------------

    /// Interleave request handling with ticks until `input` is exhausted and
    /// every queued operation has finished.
    pub async fn serve<R, W>(&self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();
        let mut input_open = true;
        let period = tick_period(self.config.tick_rate_hz);
        let mut timer = tokio::time::interval(period);

        loop {
            tokio::select! {
                line = lines.next_line(), if input_open => {
                    match line.context("Failed to read request")? {
                        Some(line) if line.trim().is_empty() => {}
                        Some(line) => {
                            for response in self.handle_line(&line) {
                                write_response(&mut output, &response).await?;
                            }
                        }
                        None => input_open = false,
                    }
                }
                _ = timer.tick() => {
                    let report = self.tick();
                    if !report.finished.is_empty() || report.blocked > 0 {
                        tracing::debug!(
                            tick = report.tick,
                            finished = report.finished.len(),
                            in_progress = report.in_progress,
                            blocked = report.blocked,
                            "tick"
                        );
                    }
                    for finished in report.finished {
                        write_response(&mut output, &Response::Finished(finished)).await?;
                    }
                    if !input_open && self.scheduler.lock().is_idle() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Serve stdin/stdout until input ends or SIGINT arrives.
    pub async fn run(self) -> Result<()> {
        info!(
            "EngineAgent active in world '{}' – ticking at {:.0}Hz",
            self.config.world, self.config.tick_rate_hz
        );

        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        let stdout = tokio::io::stdout();

        tokio::select! {
            served = self.serve(stdin, stdout) => served?,
            _ = tokio::signal::ctrl_c() => {
                info!("EngineAgent shutting down (SIGINT)");
            }
        }

        let stats = self.scheduler.lock().stats();
        info!(
            "EngineAgent stopped: {} finished, {} still queued",
            stats.finished_operations, stats.queued_operations
        );
        Ok(())
    }
}

const MIN_TICK_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Serialise `response` as one JSON line.
async fn write_response<W: AsyncWrite + Unpin>(output: &mut W, response: &Response) -> Result<()> {
    let mut payload = serde_json::to_vec(response).context("Failed to serialise response")?;
    payload.push(b'\n');
    output
        .write_all(&payload)
        .await
        .context("Failed to write response")?;
    output.flush().await.context("Failed to flush response")?;
    Ok(())
}

/// Interval between ticks for `hz`, never shorter than one millisecond.
/// Rates that do not yield a finite period tick at that floor.
pub fn tick_period(hz: f32) -> Duration {
    Duration::try_from_secs_f32(1.0 / hz)
        .unwrap_or(MIN_TICK_PERIOD)
        .max(MIN_TICK_PERIOD)
}
