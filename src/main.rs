use clap::Parser;
use std::borrow::Cow;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;
use tinyfetch::{Document, EngineConfig, FetchEngine, SystemDnsResolver};

#[derive(Parser, Debug)]
#[command(name = "tinyfetch", about = "Fetch a URL and print its body", version)]
struct Cli {
    /// URL to fetch (file:, data:, http: or https:). Defaults to a local
    /// test.html when omitted.
    url: Option<String>,

    /// Maximum redirect hops before giving up.
    #[arg(long, default_value_t = 10)]
    max_redirects: usize,

    /// TCP connect timeout in seconds.
    #[arg(long, default_value_t = 6)]
    connect_timeout: u64,

    /// Emit debug-level diagnostics.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install tracing subscriber: {err}");
        return ExitCode::FAILURE;
    }

    let config = EngineConfig {
        connect_timeout: Duration::from_secs(cli.connect_timeout),
        max_redirects: cli.max_redirects,
        ..EngineConfig::default()
    };
    let engine = FetchEngine::with_config(SystemDnsResolver, config);

    let result = engine.fetch(cli.url.as_deref());
    engine.shutdown();

    match result {
        Ok(doc) => {
            let mut stdout = std::io::stdout().lock();
            if stdout.write_all(&render(&doc)).is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("tinyfetch: {err}");
            ExitCode::FAILURE
        }
    }
}

/// View-source mode shows the exact bytes that arrived; normal display goes
/// through the document's decoded text, replacing invalid UTF-8.
fn render(doc: &Document) -> Cow<'_, [u8]> {
    if doc.view_source {
        Cow::Borrowed(&doc.body)
    } else {
        match doc.text() {
            Cow::Borrowed(text) => Cow::Borrowed(text.as_bytes()),
            Cow::Owned(text) => Cow::Owned(text.into_bytes()),
        }
    }
}
