use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use std::io;
use tokio::signal;
use tracing::{Level, debug, error};

use ai_loggen::backend::{Backend, MessageGenerator};
use ai_loggen::config::{Cli, Settings};
use ai_loggen::line::LineSynthesizer;
use ai_loggen::runner::{self, RunOptions};
use ai_loggen::sink::LogSink;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let settings = Settings::from(Cli::parse());

    // Setup tracing
    let max_level = if settings.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(max_level).init();
    debug!(?settings, "resolved configuration");

    let backend = Backend::from_config(&settings.backend);
    let mut synth = LineSynthesizer::new(MessageGenerator::new(backend));

    let mut sink = LogSink::open(&settings.log_dir, &settings.log_file, io::stdout())
        .with_context(|| format!("cannot open {}", settings.output_path().display()))?;
    let banner = format!(
        "Generating dummy logs to {}... Press Ctrl+C to stop.",
        sink.path().display()
    );
    sink.notice(&banner)?;

    let (shutdown, mut stop) = runner::stop_channel();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => shutdown.trigger(),
            Err(e) => error!("Unable to listen for Ctrl+C: {e}"),
        }
    });

    let options = RunOptions {
        max_lines: settings.max_lines,
        pacing: settings.pacing,
    };

    let outcome = runner::run(&mut synth, &mut sink, &mut stop, &options).await;
    runner::report_outcome(&outcome);

    Ok(())
}
