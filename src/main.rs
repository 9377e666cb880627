use bankid::domain::ports::{PairingSinkHandle, TransportHandle};
use bankid::interfaces::csv::EventWriter;
use bankid::{
    ChannelPairingSink, ChannelSink, Config, HttpsTransport, OrderId, Requirements,
    SessionEngine, Submission, logging,
};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file. Defaults to config.json next to the executable.
    #[arg(long)]
    config: Option<PathBuf>,

    /// IP address of the end user.
    #[arg(long)]
    ip: String,

    /// Order id to use instead of a generated one.
    #[arg(long)]
    order_id: Option<String>,

    /// Text to be signed (already encoded). Turns the order into a signature.
    #[arg(long)]
    text: Option<String>,

    /// Non-visible data to sign (already encoded).
    #[arg(long)]
    non_visible_data: Option<String>,

    /// Personal number (12 digits) of the end user.
    #[arg(long)]
    personal_number: Option<String>,

    /// Card reader class required (class1 or class2).
    #[arg(long)]
    card_reader: Option<String>,

    /// Print rotating pairing codes to stderr while the order is pending.
    #[arg(long)]
    qr: bool,

    /// Cancel the order after this many seconds.
    #[arg(long)]
    cancel_after: Option<u64>,
}

impl Cli {
    fn submission(&self) -> Submission {
        let mut submission = Submission::new(&self.ip);
        if let Some(order_id) = &self.order_id {
            submission = submission.with_order_id(order_id.as_str());
        }
        if let Some(text) = &self.text {
            submission = submission.with_visible_data(text);
        }
        let requirements = Requirements {
            personal_number: self.personal_number.clone(),
            user_non_visible_data: self.non_visible_data.clone(),
            card_reader: self.card_reader.clone(),
            ..Default::default()
        };
        if requirements != Requirements::default() {
            submission = submission.with_requirements(requirements);
        }
        submission
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load(&config_path).into_diagnostic()?;
    logging::init(&config).into_diagnostic()?;

    let transport: TransportHandle =
        Arc::new(HttpsTransport::from_config(&config).into_diagnostic()?);
    let (sink, mut events) = ChannelSink::new();
    let engine = SessionEngine::new(transport, Arc::new(sink), config.engine_settings());

    let (pairing_sink, mut codes) = ChannelPairingSink::new();
    let mut submission = cli.submission();
    if cli.qr {
        let pairing_sink: PairingSinkHandle = Arc::new(pairing_sink);
        submission = submission.with_pairing_sink(pairing_sink);
    }
    let order_id: OrderId = engine.submit(submission).await;
    tracing::info!(order_id = %order_id, "order submitted");

    let cancel_timer = async {
        match cli.cancel_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(cancel_timer);
    let mut cancel_sent = false;

    let stdout = io::stdout();
    let mut writer = EventWriter::new(stdout.lock());
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                writer.write_event(&event).into_diagnostic()?;
                if event.order_id == order_id && event.is_terminal() {
                    break;
                }
            }
            Some((code, _)) = codes.recv() => {
                eprintln!("{}", code.content);
            }
            _ = &mut cancel_timer, if !cancel_sent => {
                cancel_sent = true;
                engine.cancel(&order_id).await;
            }
        }
    }

    engine.shutdown().await;
    Ok(())
}
