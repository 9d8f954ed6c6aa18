//! ---
//! pv_section: "04-tooling"
//! pv_subsection: "binary"
//! pv_type: "source"
//! pv_scope: "code"
//! pv_description: "Control CLI for graph files and engine sessions."
//! pv_version: "v0.0.0-prealpha"
//! pv_owner: "tbd"
//! ---
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use pv_common::config::{AppConfig, EngineTransport};
use pv_engine_msg::{
    replay_responses, EngineDispatcher, EngineMessage, EngineResponse, IdGenerator,
    InMemoryTransport, MessagePayload, OutboundFrame,
};
use tracing::{info, warn};

/// Engine session commands.
#[derive(Debug, Subcommand)]
pub enum EngineCommand {
    /// Send ping messages to an in-process engine and wait for every answer.
    Ping(PingOptions),
    /// Deliver recorded responses to a fresh message with id 0.
    Replay(ReplayOptions),
}

/// Options for `engine ping`.
#[derive(Debug, Args)]
pub struct PingOptions {
    /// Number of pings to send.
    #[arg(long, default_value_t = 3)]
    pub count: usize,
    /// Give up after this many milliseconds.
    #[arg(long, default_value_t = 2_000)]
    pub timeout_ms: u64,
}

/// Options for `engine replay`.
#[derive(Debug, Args)]
pub struct ReplayOptions {
    /// Newline-delimited JSON file of recorded responses.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Execute the supplied engine command.
pub fn run(command: EngineCommand, config: &AppConfig) -> Result<()> {
    match command {
        EngineCommand::Ping(options) => ping(&options, config),
        EngineCommand::Replay(options) => replay(&options, config),
    }
}

fn dispatcher_for(config: &AppConfig) -> (EngineDispatcher, InMemoryTransport) {
    let mut dispatcher = EngineDispatcher::new(config.engine.max_pending);
    let transport = match config.engine.transport {
        EngineTransport::InMemory => InMemoryTransport::new(),
    };
    dispatcher.register_transport(Arc::new(transport.clone()));
    (dispatcher, transport)
}

/// Answer a decoded message the way a minimal engine would.
fn answer(frame: &OutboundFrame) -> EngineResponse {
    match frame.decode() {
        Ok(message) => match message.payload() {
            MessagePayload::Ping
            | MessagePayload::PreviewStop { .. }
            | MessagePayload::TunerValue { .. } => EngineResponse::ok(frame.id),
            MessagePayload::PreviewSource { preview_name, .. } => {
                EngineResponse::text(frame.id, format!("preview {preview_name} started"))
            }
            MessagePayload::Custom { tag, .. } => {
                EngineResponse::error(frame.id, format!("unsupported message kind {tag}"))
            }
        },
        Err(err) => EngineResponse::error(frame.id, err.to_string()),
    }
}

/// Serve `transport` from a background thread until `stop` is raised.
fn spawn_loopback_engine(
    transport: InMemoryTransport,
    stop: Arc<AtomicBool>,
    idle: Duration,
) -> thread::JoinHandle<usize> {
    thread::spawn(move || {
        let mut answered = 0usize;
        while !stop.load(Ordering::Acquire) {
            match transport.take_outbound() {
                Some(frame) => {
                    transport.push_response(answer(&frame));
                    answered += 1;
                }
                None => thread::sleep(idle),
            }
        }
        answered
    })
}

fn ping(options: &PingOptions, config: &AppConfig) -> Result<()> {
    let (dispatcher, transport) = dispatcher_for(config);
    let poll_interval = config.engine.poll_interval;
    let stop = Arc::new(AtomicBool::new(false));
    let engine = spawn_loopback_engine(transport, Arc::clone(&stop), poll_interval);

    let answered = Arc::new(AtomicUsize::new(0));
    let started = Instant::now();
    for _ in 0..options.count {
        let mut message = EngineMessage::new(MessagePayload::Ping);
        let counter = Arc::clone(&answered);
        let id = message.id();
        message.on_response(move |response| {
            println!("got:{id} {}", response.kind());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        dispatcher.send(message)?;
    }

    let deadline = Duration::from_millis(options.timeout_ms);
    while answered.load(Ordering::SeqCst) < options.count && started.elapsed() < deadline {
        let report = dispatcher.poll();
        for failure in &report.failures {
            warn!(message_id = failure.message_id, error = %failure.error, "ping delivery failed");
        }
        if report.is_empty() {
            thread::sleep(poll_interval);
        }
    }

    stop.store(true, Ordering::Release);
    let served = engine
        .join()
        .map_err(|_| anyhow::anyhow!("loopback engine thread panicked"))?;
    let released = dispatcher.drain_pending().len();
    let metrics = dispatcher.metrics();
    info!(served, released, sent = metrics.sent, delivered = metrics.delivered, "ping session finished");

    let received = answered.load(Ordering::SeqCst);
    if received < options.count {
        bail!(
            "only {received} of {} pings answered within {} ms",
            options.count,
            options.timeout_ms
        );
    }
    println!(
        "{received} pings answered in {:.1} ms",
        started.elapsed().as_secs_f64() * 1_000.0
    );
    Ok(())
}

fn replay(options: &ReplayOptions, config: &AppConfig) -> Result<()> {
    let (dispatcher, _transport) = dispatcher_for(config);

    let mut message = EngineMessage::with_ids(&IdGenerator::new(), MessagePayload::Ping);
    message.on_response(|response| {
        println!("{}", serde_json::to_string(&response.payload)?);
        Ok(())
    });
    dispatcher.send(message)?;

    let count = replay_responses(&dispatcher, &options.file)
        .with_context(|| format!("failed to replay {}", options.file.display()))?;
    let metrics = dispatcher.metrics();
    println!(
        "replayed {count} responses ({} delivered, {} orphaned)",
        metrics.delivered, metrics.orphaned
    );
    Ok(())
}
