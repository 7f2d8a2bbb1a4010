use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use teller_gateway::config::{Config, SttProviderKind};
use teller_gateway::context::ContextRegistry;
use teller_gateway::intent::{IntentDetector, KeywordIntentDetector, LlmIntentDetector};
use teller_gateway::llm::ChatClient;
use teller_gateway::voice::{AudioCapture, Transcriber, SAMPLE_RATE};

/// Teller - voice assistant gateway for the demo bank front-end
#[derive(Parser)]
#[command(name = "teller", version, about)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "TELLER_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the gateway (default when no subcommand is given)
    Serve,
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Detect navigation intent in a single utterance
    Intent {
        /// The utterance to classify
        text: String,
        /// Conversation context id
        #[arg(short, long)]
        context: Option<String>,
    },
    /// Transcribe an audio file with the configured STT provider
    Transcribe {
        /// Path to the audio file (wav, webm, ogg or mp3)
        file: PathBuf,
    },
    /// List the registered conversation contexts
    Contexts,
    /// Interactive first-run setup
    Setup,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,teller_gateway=info",
        1 => "info,teller_gateway=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Serve => serve(cli.port).await,
            Command::TestMic { duration } => test_mic(duration).await,
            Command::Intent { text, context } => cmd_intent(&text, context.as_deref()).await,
            Command::Transcribe { file } => cmd_transcribe(&file).await,
            Command::Contexts => cmd_contexts(),
            Command::Setup => teller_gateway::setup::run_setup(),
        };
    }

    serve(cli.port).await
}

/// Load configuration and run the gateway
async fn serve(port_override: Option<u16>) -> anyhow::Result<()> {
    let mut config = Config::load();
    if let Some(port) = port_override {
        config.server.port = port;
    }

    tracing::info!(
        port = config.server.port,
        llm = config.llm_configured(),
        stt = config.stt_configured(),
        avatar = config.avatar_configured(),
        "starting teller gateway"
    );

    teller_gateway::gateway::run(config).await?;
    Ok(())
}

/// Test microphone input
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    capture.start()?;

    println!("Sample rate: {SAMPLE_RATE} Hz");
    println!("---");

    let mut all_samples = Vec::new();
    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = capture.take_buffer();
        let energy = calculate_rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        // Visual meter
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        all_samples.extend(samples);
    }

    capture.stop();

    println!("\n---");
    println!("Captured {} samples total.", all_samples.len());
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Classify one utterance and print the result as JSON
async fn cmd_intent(text: &str, context_id: Option<&str>) -> anyhow::Result<()> {
    let config = Config::load();
    let registry = match config.server.context_dir {
        Some(ref dir) => ContextRegistry::with_overlay(dir)?,
        None => ContextRegistry::builtin()?,
    };

    let detector: Arc<dyn IntentDetector> = if let Some(ref key) = config.api_keys.openai {
        let mut client = ChatClient::new(key.clone(), config.llm.model.clone())?;
        if let Some(ref base_url) = config.llm.base_url {
            client = client.with_base_url(base_url.clone());
        }
        Arc::new(LlmIntentDetector::new(Arc::new(client)))
    } else {
        tracing::info!("no OPENAI_API_KEY, using keyword matching");
        Arc::new(KeywordIntentDetector::new(&registry))
    };

    let context = registry.resolve(context_id);
    let result = detector.detect(text, context).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// Transcribe an audio file and print the text
async fn cmd_transcribe(file: &PathBuf) -> anyhow::Result<()> {
    let config = Config::load();
    if !config.stt_configured() {
        anyhow::bail!("no API key for the configured STT provider; run `teller setup`");
    }

    let model = config.voice.stt_model.clone();
    let language = config.voice.language.clone();
    let transcriber = match config.voice.stt_provider {
        SttProviderKind::Whisper => Transcriber::whisper(
            config.api_keys.openai.clone().unwrap_or_default(),
            model,
            language,
        )?,
        SttProviderKind::Deepgram => Transcriber::deepgram(
            config.api_keys.deepgram.clone().unwrap_or_default(),
            model,
            language,
        )?,
    };

    let audio = std::fs::read(file)?;
    let media_type = match file.extension().and_then(|ext| ext.to_str()) {
        Some("webm") => "audio/webm",
        Some("ogg") => "audio/ogg",
        Some("mp3") => "audio/mpeg",
        _ => "audio/wav",
    };

    println!("Transcribing {} ({} bytes)...", file.display(), audio.len());
    let text = transcriber.transcribe(&audio, media_type).await?;
    println!("{text}");

    Ok(())
}

/// List the registered conversation contexts
fn cmd_contexts() -> anyhow::Result<()> {
    let config = Config::load();
    let registry = match config.server.context_dir {
        Some(ref dir) => ContextRegistry::with_overlay(dir)?,
        None => ContextRegistry::builtin()?,
    };

    for context in registry.list() {
        println!("{} - {}", context.id, context.name);
        println!("    {}", context.description);
        for page in context.pages() {
            println!("    {page}");
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_gateway::voice::samples_to_wav;

    #[test]
    fn rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[0.0; 160]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn captured_samples_package_as_wav() {
        let samples = vec![0.0f32; usize::try_from(SAMPLE_RATE).unwrap()];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
        assert!(wav.starts_with(b"RIFF"));
    }
}
