use crate::backend::TextGenerator;
use crate::config::Pacing;
use crate::line::LineSynthesizer;
use crate::sink::{LogSink, SinkError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

pub const STOP_NOTICE: &str = "Log generation stopped.";

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Triggering side of the stop signal.
#[derive(Debug)]
pub struct Shutdown {
    tx: watch::Sender<bool>,
}

impl Shutdown {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Listening side of the stop signal, checked by the run loop.
#[derive(Debug, Clone)]
pub struct StopListener {
    rx: watch::Receiver<bool>,
}

impl StopListener {
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once a stop was requested. Never resolves if the
    /// [`Shutdown`] handle is dropped without triggering.
    pub async fn stopped(&mut self) {
        if self.rx.wait_for(|stopped| *stopped).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

pub fn stop_channel() -> (Shutdown, StopListener) {
    let (tx, rx) = watch::channel(false);
    (Shutdown { tx }, StopListener { rx })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub max_lines: Option<u64>,
    pub pacing: Pacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Interrupted,
    LimitReached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub lines_written: u64,
    pub reason: StopReason,
}

/// Generates and writes lines until stopped, the line limit is hit, or the
/// sink fails. A stop request drops whatever line is still being generated.
pub async fn run<G, W>(
    synth: &mut LineSynthesizer<G>,
    sink: &mut LogSink<W>,
    stop: &mut StopListener,
    options: &RunOptions,
) -> Result<RunReport, RunError>
where
    G: TextGenerator,
    W: Write,
{
    let mut pacing_rng = StdRng::from_entropy();
    let mut lines_written = 0u64;

    let reason = loop {
        if stop.is_stopped() {
            break StopReason::Interrupted;
        }
        if options.max_lines.is_some_and(|max| lines_written >= max) {
            break StopReason::LimitReached;
        }

        let line = tokio::select! {
            biased;
            _ = stop.stopped() => break StopReason::Interrupted,
            line = synth.synthesize() => line,
        };

        sink.write_line(&line.to_string())?;
        lines_written += 1;
        debug!(lines_written, level = %line.level, "line written");

        if options.pacing.is_enabled() {
            let delay = pacing_rng.gen_range(options.pacing.min_ms..=options.pacing.max_ms);
            tokio::select! {
                biased;
                _ = stop.stopped() => break StopReason::Interrupted,
                _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
            }
        }
    };

    if reason == StopReason::Interrupted {
        sink.notice(STOP_NOTICE)?;
    }

    Ok(RunReport {
        lines_written,
        reason,
    })
}

/// Logs how a run ended. Failures are reported here rather than propagated,
/// so they reach stdout with the rest of the diagnostics.
pub fn report_outcome(outcome: &Result<RunReport, RunError>) {
    match outcome {
        Ok(RunReport {
            lines_written,
            reason: StopReason::Interrupted,
        }) => info!(lines = lines_written, "Shutdown complete"),
        Ok(RunReport {
            lines_written,
            reason: StopReason::LimitReached,
        }) => info!(lines = lines_written, "Line limit reached"),
        Err(e) => error!("An error occurred: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        Backend, GenerationError, MessageGenerator, NOT_CONFIGURED_MESSAGE, TextGenerator,
    };
    use crate::test_support::capture_logs;
    use std::fs;
    use std::io;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Numbers its replies and pulls the stop signal on the given call.
    struct StopAfter {
        calls: AtomicUsize,
        stop_on: usize,
        shutdown: Shutdown,
    }

    impl TextGenerator for StopAfter {
        fn provider_name(&self) -> &str {
            "stop-after"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n == self.stop_on {
                self.shutdown.trigger();
            }
            Ok(format!("message {n}"))
        }
    }

    /// A backend that never answers.
    struct Hanging;

    impl TextGenerator for Hanging {
        fn provider_name(&self) -> &str {
            "hanging"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn count_notices(echo: Vec<u8>) -> usize {
        String::from_utf8(echo).unwrap().matches(STOP_NOTICE).count()
    }

    #[tokio::test]
    async fn unconfigured_backend_fills_file_up_to_the_limit() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("log");
        let mut sink = LogSink::open(&dir, "dummy_app.log", Vec::new()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (_shutdown, mut stop) = stop_channel();

        let options = RunOptions {
            max_lines: Some(5),
            ..RunOptions::default()
        };
        let report = run(&mut synth, &mut sink, &mut stop, &options).await.unwrap();

        assert_eq!(
            report,
            RunReport {
                lines_written: 5,
                reason: StopReason::LimitReached
            }
        );

        let raw = fs::read_to_string(dir.join("dummy_app.log")).unwrap();
        assert!(raw.ends_with('\n'));
        let lines = read_lines(&dir.join("dummy_app.log"));
        assert_eq!(lines.len(), 5);
        for line in &lines {
            assert!(line.ends_with(&format!("- {NOT_CONFIGURED_MESSAGE}")));
        }

        let echo = String::from_utf8(sink.into_echo()).unwrap();
        assert_eq!(echo.lines().collect::<Vec<_>>(), lines);
        assert!(!echo.contains(STOP_NOTICE));
    }

    #[tokio::test]
    async fn stop_signal_ends_the_loop_after_the_current_line() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", Vec::new()).unwrap();
        let (shutdown, mut stop) = stop_channel();
        let generator = StopAfter {
            calls: AtomicUsize::new(0),
            stop_on: 3,
            shutdown,
        };
        let mut synth = LineSynthesizer::new(MessageGenerator::new(generator));

        let report = run(&mut synth, &mut sink, &mut stop, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(report.lines_written, 3);

        let lines = read_lines(&tmp.path().join("app.log"));
        assert_eq!(lines.len(), 3);
        for (i, line) in lines.iter().enumerate() {
            assert!(line.ends_with(&format!("- message {}", i + 1)), "{line}");
        }
        assert_eq!(synth.messages().backend().calls.load(Ordering::SeqCst), 3);
        assert_eq!(count_notices(sink.into_echo()), 1);
    }

    #[tokio::test]
    async fn stop_during_backend_call_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", Vec::new()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Hanging));
        let (shutdown, mut stop) = stop_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            shutdown.trigger();
        });

        let report = run(&mut synth, &mut sink, &mut stop, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.lines_written, 0);
        assert_eq!(report.reason, StopReason::Interrupted);
        assert_eq!(fs::read_to_string(tmp.path().join("app.log")).unwrap(), "");
        assert_eq!(count_notices(sink.into_echo()), 1);
    }

    #[tokio::test]
    async fn stop_requested_before_start_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", Vec::new()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (shutdown, mut stop) = stop_channel();
        shutdown.trigger();

        let report = run(&mut synth, &mut sink, &mut stop, &RunOptions::default())
            .await
            .unwrap();

        assert_eq!(report.lines_written, 0);
        assert!(read_lines(&tmp.path().join("app.log")).is_empty());
        assert_eq!(count_notices(sink.into_echo()), 1);
    }

    #[tokio::test]
    async fn paced_run_still_honours_the_limit() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", io::sink()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (_shutdown, mut stop) = stop_channel();

        let options = RunOptions {
            max_lines: Some(3),
            pacing: Pacing::new(1, 5),
        };
        let report = run(&mut synth, &mut sink, &mut stop, &options).await.unwrap();

        assert_eq!(report.lines_written, 3);
        assert_eq!(read_lines(&tmp.path().join("app.log")).len(), 3);
    }

    #[tokio::test]
    async fn stop_while_pacing_interrupts_the_pause() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", Vec::new()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (shutdown, mut stop) = stop_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown.trigger();
        });

        let options = RunOptions {
            max_lines: None,
            pacing: Pacing::new(60_000, 60_000),
        };
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            run(&mut synth, &mut sink, &mut stop, &options),
        )
        .await
        .expect("stop should cut the pause short")
        .unwrap();

        assert_eq!(report.lines_written, 1);
        assert_eq!(count_notices(sink.into_echo()), 1);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn file_write_failure_stops_the_loop() {
        if !Path::new("/dev/full").exists() {
            return;
        }
        let mut sink = LogSink::open(Path::new("/dev"), "full", Vec::new()).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (_shutdown, mut stop) = stop_channel();

        let err = run(&mut synth, &mut sink, &mut stop, &RunOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("/dev/full"));
    }

    struct ClosedStdout;

    impl Write for ClosedStdout {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn closed_stdout_is_blamed_on_stdout_not_the_file() {
        let tmp = TempDir::new().unwrap();
        let mut sink = LogSink::open(tmp.path(), "app.log", ClosedStdout).unwrap();
        let mut synth = LineSynthesizer::new(MessageGenerator::new(Backend::Disabled));
        let (_shutdown, mut stop) = stop_channel();

        let err = run(&mut synth, &mut sink, &mut stop, &RunOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, RunError::Sink(SinkError::Echo(_))));
        let text = err.to_string();
        assert!(text.contains("stdout"), "{text}");
        assert!(!text.contains("app.log"), "{text}");
        assert_eq!(read_lines(&tmp.path().join("app.log")).len(), 1);
    }

    #[test]
    fn failed_run_is_reported_as_an_error_line() {
        let outcome: Result<RunReport, RunError> = Err(RunError::Sink(SinkError::Echo(
            io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"),
        )));
        let ((), logs) = capture_logs(|| report_outcome(&outcome));

        let errors = logs.at("ERROR");
        assert_eq!(errors.len(), 1, "{}", logs.contents());
        assert!(errors[0].contains("An error occurred: failed to write to stdout"));
    }

    #[test]
    fn interrupted_run_is_reported_as_info() {
        let outcome = Ok(RunReport {
            lines_written: 4,
            reason: StopReason::Interrupted,
        });
        let ((), logs) = capture_logs(|| report_outcome(&outcome));

        assert!(logs.at("ERROR").is_empty());
        assert!(logs.at("INFO")[0].contains("Shutdown complete"));
    }
}
