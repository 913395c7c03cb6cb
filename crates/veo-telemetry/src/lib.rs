//! Telemetry sinks selected through `VEO_TELEMETRY_SINK`.
//!
//! Every sink writes one JSON object per line. Nothing is ever written to
//! stdout: the CLI owns it for progress lines and its `--json` report.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;
use veo_core::{PlatformTarget, TelemetryEvent, TelemetryEventType, TelemetrySink};

pub const SINK_ENV: &str = "VEO_TELEMETRY_SINK";
pub const FILE_ENV: &str = "VEO_TELEMETRY_FILE";

pub fn sink_from_env() -> Option<Box<dyn TelemetrySink>> {
    let mode = std::env::var(SINK_ENV).ok()?;
    let file = std::env::var(FILE_ENV).ok();
    sink_from_settings(&mode, file.as_deref())
}

/// `stderr` (or the older spelling `stdout`) logs to the console, `file`
/// appends to the path in `file`. Anything else disables telemetry.
pub fn sink_from_settings(mode: &str, file: Option<&str>) -> Option<Box<dyn TelemetrySink>> {
    match mode.trim().to_ascii_lowercase().as_str() {
        "stderr" | "stdout" => Some(Box::new(StderrSink)),
        "file" => {
            let path = file.filter(|v| !v.trim().is_empty())?;
            Some(Box::new(FileSink::new(PathBuf::from(path))))
        }
        "" | "off" | "none" => None,
        other => {
            tracing::warn!(sink = other, "unknown telemetry sink, telemetry disabled");
            None
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventLine<'a> {
    tool: &'static str,
    event_type: &'a TelemetryEventType,
    platform: PlatformTarget,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<&'a str>,
}

impl<'a> From<&'a TelemetryEvent> for EventLine<'a> {
    fn from(event: &'a TelemetryEvent) -> Self {
        Self {
            tool: "veo",
            event_type: &event.event_type,
            platform: event.platform,
            duration_ms: event.duration_ms,
            detail: event.detail.as_deref(),
        }
    }
}

fn write_event(mut writer: impl Write, event: &TelemetryEvent) -> Result<()> {
    let line = serde_json::to_string(&EventLine::from(event)).context("serializing telemetry event")?;
    writeln!(writer, "{}", line).context("writing telemetry line")?;
    Ok(())
}

/// Console sink. Lines go to stderr next to the tracing output.
pub struct StderrSink;

impl TelemetrySink for StderrSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = write_event(std::io::stderr().lock(), &event) {
            tracing::warn!("dropping telemetry event: {err:#}");
        }
    }
}

pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn append(&self, event: &TelemetryEvent) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("creating telemetry log parent directory")?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .context("opening telemetry file")?;
        write_event(file, event)
    }
}

impl TelemetrySink for FileSink {
    fn emit(&self, event: TelemetryEvent) {
        if let Err(err) = self.append(&event) {
            tracing::warn!(path = %self.path.display(), "dropping telemetry event: {err:#}");
        }
    }
}
