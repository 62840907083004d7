use bill_acceptor::application::controller::AcceptorController;
use bill_acceptor::application::reporter::{Reporter, RetryPolicy};
use bill_acceptor::config::Settings;
use bill_acceptor::domain::ports::ReportSinkBox;
use bill_acceptor::infrastructure::http::HttpReportSink;
use bill_acceptor::infrastructure::in_memory::{RecordingEnableLine, RecordingReportSink};
use bill_acceptor::interfaces::csv::outcome_writer::OutcomeWriter;
use bill_acceptor::interfaces::csv::trace_reader::{TraceEvent, TraceReader};
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, sleep_until};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML). `BILL_ACCEPTOR__*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a recorded pulse trace (CSV) against the controller in real time
    Replay {
        /// Trace file with `at_ms,event,id,amount` rows
        trace: PathBuf,

        /// Acknowledge reports locally instead of posting them to the endpoint
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the amount each raw burst pulse count corrects to
    Correct {
        #[arg(required = true)]
        raw_counts: Vec<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).into_diagnostic()?;

    match cli.command {
        Command::Replay { trace, dry_run } => replay(&settings, trace, dry_run).await,
        Command::Correct { raw_counts } => correct(&settings, &raw_counts),
    }
}

fn correct(settings: &Settings, raw_counts: &[u32]) -> Result<()> {
    let table = settings.denomination_table().into_diagnostic()?;
    println!("raw_count,amount");
    for &raw in raw_counts {
        match table.correct(raw) {
            Some(amount) => println!("{},{}", raw, amount),
            None => println!("{},invalid", raw),
        }
    }
    Ok(())
}

async fn replay(settings: &Settings, trace: PathBuf, dry_run: bool) -> Result<()> {
    let table = settings.denomination_table().into_diagnostic()?;
    let controller_config = settings.controller().into_diagnostic()?;

    let sink: ReportSinkBox = if dry_run {
        Box::new(RecordingReportSink::new())
    } else {
        Box::new(HttpReportSink::new(&settings.report).into_diagnostic()?)
    };
    let reporter = Reporter::new(sink, RetryPolicy::from(&settings.report));

    // No GPIO driver here: the trace stands in for the input line, and the
    // enable line only has to be observable in the logs.
    let line = RecordingEnableLine::new();
    let (handle, task) =
        AcceptorController::spawn(controller_config, table, Box::new(line), reporter)
            .into_diagnostic()?;

    let mut finished = handle.subscribe();
    let collector = tokio::spawn(async move {
        let mut out = Vec::new();
        loop {
            match finished.recv().await {
                Ok(f) => out.push(f),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Outcome collector fell behind")
                }
                Err(RecvError::Closed) => break,
            }
        }
        out
    });

    let file = File::open(trace).into_diagnostic()?;
    let edges = handle.edges();
    let origin = Instant::now();
    for record in TraceReader::new(file).records() {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                eprintln!("Error reading trace record: {}", e);
                continue;
            }
        };

        let at = origin + record.offset();
        sleep_until(at).await;
        match record.event {
            TraceEvent::Start => {
                let id = record.id.unwrap_or_default();
                let target = record.amount.unwrap_or(0);
                if let Err(rejection) = handle.start_transaction(id, target).await {
                    eprintln!("Start rejected: {}", rejection);
                }
            }
            TraceEvent::Edge => {
                edges.notify_at(at);
            }
            TraceEvent::Abort => {
                handle.abort().await.into_diagnostic()?;
            }
        }
    }

    handle.shutdown().await.into_diagnostic()?;
    task.await.into_diagnostic()?;
    drop(edges);
    drop(handle);

    let finished = collector.await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = OutcomeWriter::new(stdout.lock());
    writer.write_all(&finished).into_diagnostic()?;

    Ok(())
}
