use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use protondrop::{
    fetch_credential, select_code_source, CheckpointStore, FileWriter, ImapSession,
    ProtondropError, ServerConfig, SyncEngine, SyncOptions, SyncReport,
};

#[derive(Debug, Parser)]
#[command(name = "protondrop")]
#[command(version, about = "Download PDF/ZIP attachments from a mailbox folder")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the folder once and download new attachments
    Run(RunArgs),
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Mailbox folder/label to scan
    #[arg(long, env = "PROTON_FOLDER")]
    folder: String,

    /// Directory to drop attachments into
    #[arg(long, env = "DROP_FOLDER", default_value = "attachments")]
    drop: PathBuf,

    /// Checkpoint file recording the last successful check
    #[arg(long = "config-file", default_value = "last_check.json")]
    config_file: PathBuf,

    /// Secret store item holding the mailbox credentials
    #[arg(long, default_value = "Proton")]
    item: String,

    /// Secret store vault containing the item
    #[arg(long, default_value = "Private")]
    vault: String,

    /// IMAP server host
    #[arg(long, env = "PROTON_IMAP_HOST", default_value = "127.0.0.1")]
    host: String,

    /// IMAP server port
    #[arg(long, env = "PROTON_IMAP_PORT", default_value_t = 993)]
    port: u16,

    /// Accept self-signed TLS certificates (local bridge endpoints)
    #[arg(long)]
    accept_invalid_certs: bool,

    /// Never prompt for a second-factor code
    #[arg(long)]
    non_interactive: bool,

    /// Abort the run on the first attachment write failure
    #[arg(long)]
    stop_on_first_error: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => match run(args).await {
            Ok(report) => {
                info!(
                    "Done: {} messages seen, {} attachments written, {} errors",
                    report.messages_seen,
                    report.attachments_written,
                    report.errors.len()
                );
                if report.errors.is_empty() {
                    ExitCode::SUCCESS
                } else {
                    // Partial run: the checkpoint stopped at the last clean
                    // message, so the next invocation retries the rest.
                    for err in &report.errors {
                        warn!("{}", err);
                    }
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                error!("{}", e);
                if e.is_transient() {
                    ExitCode::from(2)
                } else {
                    ExitCode::FAILURE
                }
            }
        },
    }
}

async fn run(args: RunArgs) -> Result<SyncReport, ProtondropError> {
    let mut credential = fetch_credential(&args.item, &args.vault).await?;
    let code_source = select_code_source(credential.one_time_code.take(), !args.non_interactive);

    let server = ServerConfig {
        host: args.host,
        port: args.port,
        use_tls: true,
        accept_invalid_certs: args.accept_invalid_certs,
    };
    let mut session = ImapSession::open(&server, &credential, code_source.as_ref()).await?;

    let checkpoints = CheckpointStore::new(args.config_file);
    let writer = FileWriter::new(&args.drop);
    let engine = SyncEngine::new(
        args.folder,
        SyncOptions {
            stop_on_first_error: args.stop_on_first_error,
        },
    );

    engine.run(&mut session, &checkpoints, &writer).await
}
