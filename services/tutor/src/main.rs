use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing_subscriber::fmt::time::ChronoLocal;
use tutor_core::keystore::LocalKeyStore;
use tutor_core::session_state::{CallCommand, ConnectionState, SessionController, SessionNotice};
use tutor_core::variants::CallProfile;
use tutor_service::config::{Config, EDITOR_POLL_INTERVAL_MS};
use tutor_service::gemini_adapter::GeminiConnector;
use tutor_service::native_audio::NativeAudioHost;
use tutor_service::{editor, prompt_loader};

#[derive(Parser)]
#[command(version, about = "Realtime voice conversations with an AI tutor")]
struct Cli {
    /// Input device name (see `tutor devices`)
    #[arg(long, global = true)]
    input_device: Option<String>,
    /// Output device name (see `tutor devices`)
    #[arg(long, global = true)]
    output_device: Option<String>,
    /// Directory of `free_chat.md` / `interview.md` / `coding.md` instruction overrides
    #[arg(long, global = true)]
    prompts: Option<PathBuf>,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Free-form conversation
    Chat,
    /// Mock interview for a job field or topic
    Interview {
        #[arg(long)]
        field: String,
    },
    /// Coding assistant watching a source file
    Coding {
        #[arg(long, default_value = "Python")]
        language: String,
        #[arg(long)]
        goal: String,
        /// Source file whose content is shared with the assistant
        #[arg(long)]
        file: Option<PathBuf>,
        /// Shell command run on every Enter; its output is shared too
        #[arg(long, requires = "file")]
        run: Option<String>,
    },
    /// List audio devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load application configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Parse Command-Line Arguments ---
    let args = Cli::parse();

    let (profile, editor_file, run_command) = match args.mode {
        Mode::Devices => {
            println!("Input devices:");
            println!("{}", tutor_native_utils::device::get_available_inputs()?);
            println!("Output devices:");
            println!("{}", tutor_native_utils::device::get_available_outputs()?);
            return Ok(());
        }
        Mode::Chat => (CallProfile::free_chat(), None, None),
        Mode::Interview { field } => (CallProfile::interview(&field)?, None, None),
        Mode::Coding {
            language,
            goal,
            file,
            run,
        } => (CallProfile::coding(&language, &goal), file, run),
    };

    // --- 4. Load Prompts ---
    let profile = match &args.prompts {
        Some(dir) => {
            let prompts =
                prompt_loader::load_prompts(dir).context("Failed to load prompt overrides")?;
            tracing::info!("Loaded {} prompts successfully.", prompts.len());
            prompt_loader::apply_override(profile, &prompts)
        }
        None => profile,
    };

    // --- 5. Wire the session ---
    let keys = Arc::new(LocalKeyStore::new(config.key_file.clone()));
    let connector = Arc::new(GeminiConnector::new(
        keys,
        &config.base_url,
        &config.model,
        config.outbound_queue_capacity,
    ));
    let host = Box::new(NativeAudioHost::new(args.input_device, args.output_device));

    let (notice_tx, notice_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_notices(notice_rx));
    let mut controller = SessionController::new(connector, host).with_notices(notice_tx);

    let (command_tx, mut command_rx) = mpsc::channel::<CallCommand>(32);
    let stop_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, ending call");
            let _ = stop_tx.send(CallCommand::Stop).await;
        }
    });
    let mut reads_stdin = false;
    if let Some(file) = editor_file {
        tokio::spawn(editor::watch_file(
            file.clone(),
            Duration::from_millis(EDITOR_POLL_INTERVAL_MS),
            command_tx.clone(),
        ));
        if let Some(command) = run_command {
            println!("Press Enter to run `{}`.", command);
            reads_stdin = true;
            tokio::spawn(editor::run_on_enter(
                BufReader::new(tokio::io::stdin()),
                file,
                command,
                command_tx.clone(),
            ));
        }
    }

    // --- 6. Run the call until it ends ---
    // The controller owns the audio streams, so it stays on this task.
    if let Err(e) = controller.start(profile).await {
        eprintln!("{}", e.user_message());
        return Err(e).context("Failed to start call");
    }
    controller.run(&mut command_rx).await;

    let snapshot = controller.snapshot();
    drop(controller);
    if let Err(e) = printer.await {
        tracing::debug!("notice printer ended abnormally: {}", e);
    }

    let outcome = if snapshot.state == ConnectionState::Error {
        Err(anyhow::anyhow!(
            snapshot.error.unwrap_or_else(|| "Call failed".to_string())
        ))
    } else {
        Ok(())
    };

    // A pending stdin read holds runtime shutdown until the next line.
    if reads_stdin {
        if let Err(e) = &outcome {
            eprintln!("Error: {:#}", e);
        }
        std::process::exit(if outcome.is_ok() { 0 } else { 1 });
    }
    outcome
}

async fn print_notices(mut notices: mpsc::UnboundedReceiver<SessionNotice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            SessionNotice::Status(status) => println!("[{}]", status),
            SessionNotice::Line(line) => println!("{}", line),
            SessionNotice::Error(error) => eprintln!("! {}", error),
            SessionNotice::State(state) => tracing::debug!("call state: {:?}", state),
        }
    }
}
