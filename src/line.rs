use crate::backend::{MessageContext, MessageGenerator, TextGenerator};
use chrono::{Local, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

pub const SOURCE_FILES: [&str; 4] = [
    "module_alpha.py",
    "service_beta.py",
    "utils_gamma.py",
    "main_delta.py",
];

pub const CPU_RANGE: (f64, f64) = (5.0, 80.0);
pub const MEMORY_MB_RANGE: (u32, u32) = (128, 2048);
pub const RESPONSE_TIME_MS_RANGE: (u32, u32) = (10, 500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fabricated resource figures attached to every line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub cpu_usage_percent: f64,
    pub memory_mb: u32,
    pub response_time_ms: u32,
}

impl Metrics {
    pub fn sample<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let cpu: f64 = rng.gen_range(CPU_RANGE.0..=CPU_RANGE.1);
        Self {
            // Two decimals; rounding cannot leave the range since both bounds are exact.
            cpu_usage_percent: (cpu * 100.0).round() / 100.0,
            memory_mb: rng.gen_range(MEMORY_MB_RANGE.0..=MEMORY_MB_RANGE.1),
            response_time_ms: rng.gen_range(RESPONSE_TIME_MS_RANGE.0..=RESPONSE_TIME_MS_RANGE.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub timestamp: NaiveDateTime,
    pub level: Level,
    pub source_file: &'static str,
    pub metrics: Metrics,
    pub message: String,
}

impl fmt::Display for LogLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] ({}): metric_cpu_usage={:.2}% metric_memory_mb={}MB metric_response_time_ms={}ms - {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.6f"),
            self.level,
            self.source_file,
            self.metrics.cpu_usage_percent,
            self.metrics.memory_mb,
            self.metrics.response_time_ms,
            self.message
        )
    }
}

/// Builds complete log lines from random picks plus a generated message.
pub struct LineSynthesizer<G> {
    messages: MessageGenerator<G>,
    rng: StdRng,
}

impl<G: TextGenerator> LineSynthesizer<G> {
    pub fn new(messages: MessageGenerator<G>) -> Self {
        Self::with_rng(messages, StdRng::from_entropy())
    }

    pub fn with_rng(messages: MessageGenerator<G>, rng: StdRng) -> Self {
        Self { messages, rng }
    }

    #[cfg(test)]
    pub(crate) fn messages(&self) -> &MessageGenerator<G> {
        &self.messages
    }

    pub async fn synthesize(&mut self) -> LogLine {
        let timestamp = Local::now().naive_local();
        let source_file = SOURCE_FILES[self.rng.gen_range(0..SOURCE_FILES.len())];
        let level = Level::ALL[self.rng.gen_range(0..Level::ALL.len())];

        let message = self
            .messages
            .generate_message(&MessageContext { level, source_file })
            .await;

        let metrics = Metrics::sample(&mut self.rng);

        LogLine {
            timestamp,
            level,
            source_file,
            metrics,
            message,
        }
    }
}
