//! Command-line exporter.
//!
//! `remote` logs in (or reuses `--session`), connects to the live endpoint
//! and exports both streams, optionally recording every response to a
//! fixture, and downloads linked documents under `<output-dir>/documents`.
//! `local` replays such a fixture without any network access or downloads.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use portfolio_downloader::auth::client::{AuthClient, InteractiveLogin};
use portfolio_downloader::auth::LoginChallenge;
use portfolio_downloader::error::AuthError;
use portfolio_downloader::http::ApiHttp;
use portfolio_downloader::network;
use portfolio_downloader::prelude::*;
use portfolio_downloader::transport::native;

#[derive(Parser, Debug)]
#[command(name = "portfolio-downloader")]
#[command(about = "Export the account timeline to CSV, JSON lines and JSON tables")]
struct Cli {
    /// Directory for exports and repositories.
    #[arg(long, short, default_value = "out")]
    output_dir: PathBuf,

    /// Request locale; also decides how detail amounts are parsed.
    #[arg(long, default_value = "de")]
    locale: String,

    /// Process everything but write nothing and download nothing.
    #[arg(long)]
    dry_run: bool,

    /// Debug logging (overridden by `RUST_LOG`).
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Export from the live API.
    Remote(RemoteArgs),
    /// Export from a recorded fixture.
    Local(LocalArgs),
}

#[derive(Args, Debug)]
struct RemoteArgs {
    #[arg(long, env = "TR_PHONE_NUMBER")]
    phone_number: Option<String>,

    #[arg(long, env = "TR_PIN", hide_env_values = true)]
    pin: Option<String>,

    /// Existing session token; skips the login.
    #[arg(long, env = "TR_SESSION", hide_env_values = true)]
    session: Option<String>,

    /// Record every response to this fixture file.
    #[arg(long)]
    record: Option<PathBuf>,

    #[arg(long, default_value = network::DEFAULT_WS_URL)]
    ws_url: String,

    #[arg(long, default_value = network::DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Args, Debug)]
struct LocalArgs {
    /// Fixture written by `remote --record`.
    fixture: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

/// `Ok(false)` when a stream failed.
async fn run(cli: Cli) -> Result<bool, PortfolioError> {
    let builder = PortfolioClient::builder().locale(&cli.locale);

    let downloader = match &cli.command {
        Command::Remote(args) if !cli.dry_run => Some(Arc::new(Downloader::new(
            Arc::new(ApiHttp::new(&args.api_url)?),
            cli.output_dir.join("documents"),
        ))),
        _ => None,
    };

    let mut client = match &cli.command {
        Command::Remote(args) => {
            let builder = builder
                .ws_url(&args.ws_url)
                .session_provider(session_provider(args)?);
            let transport = native::connect(&args.ws_url, &cli.locale).await?;
            match &args.record {
                Some(path) if !cli.dry_run => {
                    tracing::info!("Recording responses to {}", path.display());
                    builder
                        .build_with_transport(Recorder::new(transport, FileWriter::create(path)))
                        .await?
                }
                _ => builder.build_with_transport(transport).await?,
            }
        }
        Command::Local(args) => {
            let replay = ReplayTransport::from_reader(&mut FileReader::new(&args.fixture))?;
            tracing::info!("Replaying {} recorded exchange(s)", replay.exchange_count());
            builder.build_with_transport(replay).await?
        }
    };

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping");
            on_signal.cancel();
        }
    });

    let mut ok = true;
    let documents: Arc<dyn Repository<Document>> =
        repository(&cli.output_dir, "documents.json", cli.dry_run);

    let mut outputs = transaction_outputs(&cli.output_dir, cli.dry_run, Arc::clone(&documents));
    outputs.downloader = downloader.clone();
    let mut transactions = TransactionHandler::new(&client, outputs, HandlerConfig::default())?;
    ok &= report(transactions.run(&cancel).await);

    if !cancel.is_cancelled() {
        let mut outputs = activity_outputs(&cli.output_dir, cli.dry_run, documents);
        outputs.downloader = downloader;
        let mut activity = ActivityHandler::new(&client, outputs, HandlerConfig::default())?;
        ok &= report(activity.run(&cancel).await);
    }

    drop(transactions);
    client.close().await;
    Ok(ok)
}

fn session_provider(args: &RemoteArgs) -> Result<Arc<dyn SessionProvider>, PortfolioError> {
    if let Some(token) = &args.session {
        return Ok(Arc::new(StaticSession::new(SessionToken::new(token.clone()))));
    }
    let (Some(phone), Some(pin)) = (&args.phone_number, &args.pin) else {
        return Err(AuthError::NotAuthenticated.into());
    };
    let auth = AuthClient::new(&args.api_url)?;
    Ok(Arc::new(InteractiveLogin::new(
        auth,
        Credentials::new(phone.clone(), pin.clone()),
        prompt_code,
    )))
}

fn prompt_code(challenge: &LoginChallenge) -> Result<String, AuthError> {
    let mut stdout = std::io::stdout();
    let _ = write!(stdout, "Verification code");
    if let Some(secs) = challenge.countdown_secs {
        let _ = write!(stdout, " (valid {}s)", secs);
    }
    let _ = write!(stdout, ": ");
    let _ = stdout.flush();

    let mut code = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut code)
        .map_err(|e| AuthError::VerificationFailed(e.to_string()))?;
    let code = code.trim().to_string();
    if code.is_empty() {
        return Err(AuthError::VerificationFailed("no code entered".into()));
    }
    Ok(code)
}

fn writer(dir: &Path, name: &str, dry_run: bool) -> Box<dyn Writer> {
    if dry_run {
        Box::new(NilWriter)
    } else {
        Box::new(FileWriter::create(dir.join(name)))
    }
}

fn repository<T>(dir: &Path, name: &str, dry_run: bool) -> Arc<dyn Repository<T>>
where
    T: Identifiable + serde::Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
{
    if dry_run {
        Arc::new(MemoryRepository::new())
    } else {
        Arc::new(JsonFileRepository::new(dir.join(name)))
    }
}

fn transaction_outputs(
    dir: &Path,
    dry_run: bool,
    documents: Arc<dyn Repository<Document>>,
) -> TransactionOutputs {
    TransactionOutputs {
        transactions: repository(dir, "transactions.json", dry_run),
        instruments: repository(dir, "instruments.json", dry_run),
        documents,
        sinks: Vec::new(),
        downloader: None,
    }
    .with_sink(CsvSink::new(writer(dir, "transactions.csv", dry_run)))
    .with_sink(JsonLinesSink::new(writer(dir, "transactions.jsonl", dry_run)))
}

fn activity_outputs(
    dir: &Path,
    dry_run: bool,
    documents: Arc<dyn Repository<Document>>,
) -> ActivityOutputs {
    ActivityOutputs {
        activities: repository(dir, "activities.json", dry_run),
        documents,
        sinks: Vec::new(),
        downloader: None,
    }
    .with_sink(CsvSink::new(writer(dir, "activity.csv", dry_run)))
}

fn report(result: Result<StreamSummary, StreamFailure>) -> bool {
    match result {
        Ok(summary) => {
            for problem in summary.problems() {
                tracing::warn!(
                    "{} event {} ({}) ended {}: {}",
                    summary.stream,
                    problem.sequence,
                    problem.type_tag.as_deref().unwrap_or("<none>"),
                    problem.state,
                    problem.failure.as_deref().unwrap_or("delivery error")
                );
            }
            true
        }
        Err(failure) => {
            match &failure.last_cursor {
                Some(cursor) => tracing::error!("Resume {} after cursor {}", failure.stream, cursor),
                None => tracing::error!("{} failed before its first page completed", failure.stream),
            }
            false
        }
    }
}
