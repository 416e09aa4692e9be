//! `pactl` command lines and output parsing.
//!
//! Everything that knows the shape of the audio server's CLI lives here, so
//! the orchestrator only sees argv vectors going out and identifiers coming
//! back.
//!
//! # Output contract
//!
//! Both short listings are newline-delimited, whitespace-separated tables
//! (tab-separated on PulseAudio and pipewire-pulse alike):
//!
//! ```text
//! $ pactl list short sources
//! 0   alsa_output.pci-0000_00_1f.3.analog-stereo.monitor  module-alsa-card.c  s16le 2ch 44100Hz  SUSPENDED
//! 57  VirtualMic.monitor                                   module-null-sink.c  s16le 2ch 44100Hz  IDLE
//!
//! $ pactl list sink-inputs short
//! 42  0   17  protocol-native.c   float32le 1ch 22050Hz
//! ```
//!
//! * monitor source name = field `[1]` of the line containing
//!   `<sink>.monitor`;
//! * stream id = field `[0]` of the sink-input line mentioning the app.
//!
//! Field positions are part of the contract; the tests below pin them to
//! sample listings.

/// Primary virtual sink; the TTS app plays into it.
pub const PRIMARY_SINK: &str = "VirtualMic";

/// Secondary virtual sink fed by the loopback; its monitor is the "mic".
pub const SECONDARY_SINK: &str = "VirtualMicLoopback";

const PACTL: &str = "pactl";

// ---------------------------------------------------------------------------
// Command lines
// ---------------------------------------------------------------------------

/// `pactl load-module module-null-sink` for a sink described by its own name.
pub fn load_null_sink(name: &str) -> Vec<String> {
    vec![
        PACTL.into(),
        "load-module".into(),
        "module-null-sink".into(),
        format!("sink_name={name}"),
        format!("sink_properties=device.description={name}"),
    ]
}

/// `pactl load-module module-loopback` from `source` into `sink`.
pub fn load_loopback(source: &str, sink: &str, latency_msec: u32) -> Vec<String> {
    vec![
        PACTL.into(),
        "load-module".into(),
        "module-loopback".into(),
        format!("source={source}"),
        format!("sink={sink}"),
        format!("latency_msec={latency_msec}"),
    ]
}

/// `pactl list short sources`.
pub fn list_sources() -> Vec<String> {
    vec![PACTL.into(), "list".into(), "short".into(), "sources".into()]
}

/// `pactl list sink-inputs short`.
pub fn list_sink_inputs() -> Vec<String> {
    vec![PACTL.into(), "list".into(), "sink-inputs".into(), "short".into()]
}

/// `pactl move-sink-input <id> <sink>`.
pub fn move_sink_input(stream_id: &str, sink: &str) -> Vec<String> {
    vec![
        PACTL.into(),
        "move-sink-input".into(),
        stream_id.into(),
        sink.into(),
    ]
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Name of `sink`'s monitor source in `pactl list short sources` output.
///
/// Takes the first line containing `"<sink>.monitor"` and returns its second
/// field.  `None` if no line matches or the line has a single field.
pub fn parse_monitor_source(sources: &str, sink: &str) -> Option<String> {
    let needle = format!("{sink}.monitor");
    sources
        .lines()
        .find(|line| line.contains(&needle))
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
}

/// Id of the first stream in `pactl list sink-inputs short` output whose line
/// mentions `app` (case-insensitive).
pub fn parse_stream_id(sink_inputs: &str, app: &str) -> Option<String> {
    let app = app.to_lowercase();
    sink_inputs
        .lines()
        .find(|line| line.to_lowercase().contains(&app))
        .and_then(|line| line.split_whitespace().next())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
