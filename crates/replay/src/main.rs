//! Voice Session Replay
//!
//! Feeds a recorded upstream event log (one JSON payload per line) through
//! the call engine and prints what the chat surface would have received as
//! JSON lines on stdout.
//!
//! ```text
//! voice-session-replay [EVENTS_FILE]     # reads stdin when no file is given
//! ```

use anyhow::{bail, Context};
use serde_json::json;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use voice_session_config::{load_settings, Settings};
use voice_session_core::TranscriptMessage;
use voice_session_engine::{
    CallEngine, StartRequest, TransportError, TurnCallbacks, VoiceTransport,
};

/// Transport that only logs requests; the recorded log supplies the events
#[derive(Debug, Default)]
struct LoggingTransport {
    starts: usize,
    stops: usize,
}

impl VoiceTransport for LoggingTransport {
    fn start(&mut self, request: &StartRequest<'_>) -> Result<(), TransportError> {
        self.starts += 1;
        tracing::info!(
            session_id = request.session_id,
            assistant_id = request.assistant_id,
            "Transport start requested"
        );
        Ok(())
    }

    fn stop(&mut self) {
        self.stops += 1;
        tracing::info!("Transport stop requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Priority: env vars > config/{env}.yaml > config/default.yaml > defaults
    let env = std::env::var("VOICE_SESSION_ENV").ok();
    let settings = match load_settings(env.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Tracing not yet initialized
            eprintln!("Warning: Failed to load config: {}. Using defaults.", e);
            Settings::default()
        },
    };

    init_tracing(&settings);
    tracing::info!(
        environment = ?settings.environment,
        config_path = env.as_deref().unwrap_or("default"),
        "Starting voice session replay v{}",
        env!("CARGO_PKG_VERSION")
    );

    if !settings.voice_enabled() {
        bail!(
            "voice calls are not configured; set VOICE_SESSION__TRANSPORT__PUBLIC_KEY \
             and VOICE_SESSION__ASSISTANT__ASSISTANT_ID"
        );
    }

    let mut engine = CallEngine::from_settings(&settings, LoggingTransport::default(), callbacks());

    engine.toggle().context("failed to place call")?;

    let stats = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("failed to open event log {}", path))?;
            replay(&mut engine, BufReader::new(file)).await?
        },
        None => replay(&mut engine, BufReader::new(tokio::io::stdin())).await?,
    };

    tracing::info!(
        events = stats.events,
        malformed = stats.malformed,
        status = %engine.status(),
        "Replay finished"
    );

    let transport = engine.teardown();
    tracing::info!(
        starts = transport.starts,
        stops = transport.stops,
        "Transport released"
    );
    Ok(())
}

#[derive(Debug, Default)]
struct ReplayStats {
    events: usize,
    malformed: usize,
}

async fn replay<R>(
    engine: &mut CallEngine<LoggingTransport>,
    reader: R,
) -> anyhow::Result<ReplayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = ReplayStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await.context("failed to read event log")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        stats.events += 1;
        if let Err(e) = engine.handle_json(line) {
            if !e.is_ignorable() {
                return Err(e.into());
            }
            stats.malformed += 1;
        }
    }

    Ok(stats)
}

fn callbacks() -> TurnCallbacks {
    TurnCallbacks::new()
        .on_user_message(|text| emit(json!({"event": "user_message", "text": text})))
        .on_agent_message(|text| emit(json!({"event": "agent_message", "text": text})))
        .on_user_turn_complete(|text| emit(json!({"event": "user_turn", "text": text})))
        .on_agent_turn_complete(|text| emit(json!({"event": "agent_turn", "text": text})))
        .on_call_end(|log: &[TranscriptMessage]| {
            emit(json!({"event": "call_end", "transcript": log}))
        })
}

fn emit(value: serde_json::Value) {
    println!("{}", value);
}

fn init_tracing(settings: &Settings) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &settings.observability.log_level;
        format!("voice_session={}", level).into()
    });

    // Logs go to stderr so stdout stays a clean JSON stream
    let fmt_layer = if settings.observability.log_json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();
}
