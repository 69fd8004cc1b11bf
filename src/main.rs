use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use cyrene_voice::agent::{AgentClient, AgentDirectory, CannedAgent, HttpAgentClient};
use cyrene_voice::session::{ConversationSession, InputMode, PlaybackStatus, TurnOutcome};
use cyrene_voice::store::{self, KvStore, SqliteKvStore, TranscriptStore};
use cyrene_voice::voice::{
    AudioCache, AudioOutput, MicrophoneRecognizer, Playback, Recognizer, SilentOutput, SpeakerOutput,
    SpeechListener, SpeechToText, TextToSpeech, VoiceGenerator, fetch_voices,
};
use cyrene_voice::{Config, db};

/// Cyrene - Voice chat with hosted AI agents
#[derive(Parser)]
#[command(name = "cyrene", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Disable voice features (no microphone or speaker access)
    #[arg(long)]
    disable_voice: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat session
    Chat {
        /// Start in voice mode
        #[arg(long)]
        voice: bool,
        /// Agent to talk to (overrides config)
        #[arg(long)]
        agent: Option<String>,
    },
    /// List available TTS voices
    Voices,
    /// Print the saved chat history
    History,
    /// Delete the saved chat history
    ClearHistory,
    /// Synthesize and play text
    Say {
        /// Text to speak
        text: String,
    },
    /// List agents registered on the hosting node
    Agents,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn,cyrene_voice=info",
        1 => "info,cyrene_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load_with_options(cli.disable_voice)?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Chat { voice, agent } => chat(config, voice, agent).await,
        Command::Voices => list_voices(&config).await,
        Command::History => show_history(&config),
        Command::ClearHistory => clear_history(&config),
        Command::Say { text } => say(&config, &text).await,
        Command::Agents => list_agents(&config).await,
    }
}

/// Open the key/value store backing the transcript
fn open_store(config: &Config) -> anyhow::Result<Arc<dyn KvStore>> {
    let pool = db::init(config.db_path())?;
    Ok(Arc::new(SqliteKvStore::new(pool)))
}

/// Resolve the agent client and the voice it speaks with
async fn connect_agent(
    config: &Config,
    agent_override: Option<String>,
) -> anyhow::Result<(Arc<dyn AgentClient>, Option<String>)> {
    if config.agent.use_mock {
        tracing::info!("using canned agent replies");
        return Ok((Arc::new(CannedAgent::default()), None));
    }

    let agent_id = agent_override
        .or_else(|| config.agent.agent_id.clone())
        .ok_or_else(|| anyhow::anyhow!("no agent configured (set CYRENE_AGENT_ID or pass --agent)"))?;

    if let Some(message_url) = &config.agent.message_url {
        let client = HttpAgentClient::new(message_url, &agent_id)?;
        tracing::info!(url = client.message_url(), "using configured message endpoint");
        return Ok((Arc::new(client), None));
    }

    let api_base = config.agent.api_base_url.as_deref().ok_or_else(|| {
        anyhow::anyhow!("no agent API configured (set CYRENE_API_BASE_URL or CYRENE_MESSAGE_URL)")
    })?;
    let directory = AgentDirectory::new(api_base, &config.agent.node);
    let profile = directory.get_agent(&agent_id).await?;
    tracing::info!(agent = %profile.name, domain = %profile.domain, "resolved agent");

    let client = HttpAgentClient::new(&profile.message_base_url(), &profile.id)?;
    Ok((Arc::new(client), profile.voice_model))
}

/// Build the speech synthesis pipeline
fn voice_generator(config: &Config) -> anyhow::Result<VoiceGenerator> {
    let tts = TextToSpeech::with_provider(&config.voice.tts_url, config.voice.tts_provider)?
        .with_default_voice(config.voice.voice.clone());
    let cache = AudioCache::new(config.audio_dir())?;
    Ok(VoiceGenerator::new(Arc::new(tts), cache))
}

/// Build the speech listener, degrading to unavailable without a microphone
fn speech_listener(config: &Config) -> anyhow::Result<SpeechListener> {
    if !config.voice.enabled || !MicrophoneRecognizer::is_supported() {
        tracing::info!("speech input unavailable");
        return Ok(SpeechListener::unavailable());
    }

    let stt = SpeechToText::new(
        config.voice.stt_url.clone(),
        config.voice.stt_api_key.clone(),
        config.voice.stt_model.clone(),
    )?;
    let recognizer = MicrophoneRecognizer::new(stt, config.voice.no_speech_timeout);
    Ok(SpeechListener::new(Recognizer::Available(Arc::new(recognizer))))
}

fn audio_output(config: &Config) -> Box<dyn AudioOutput> {
    if config.voice.enabled && SpeakerOutput::is_supported() {
        Box::new(SpeakerOutput::new())
    } else {
        tracing::info!("audio output unavailable");
        Box::new(SilentOutput)
    }
}

/// Interactive chat REPL
#[allow(clippy::future_not_send)]
async fn chat(config: Config, start_in_voice: bool, agent: Option<String>) -> anyhow::Result<()> {
    let kv = open_store(&config)?;
    let user_id = match &config.user_id {
        Some(id) => id.clone(),
        None => store::load_or_create_user_id(kv.as_ref())?,
    };

    let (agent, agent_voice) = connect_agent(&config, agent).await?;

    let mut builder = ConversationSession::builder(agent, TranscriptStore::new(kv))
        .user_id(user_id)
        .voice_id(agent_voice.unwrap_or_else(|| config.voice.voice.clone()))
        .listener(speech_listener(&config)?)
        .output(audio_output(&config));
    if config.voice.enabled {
        builder = builder.voice(voice_generator(&config)?);
    }
    let session = builder.build();

    println!("Cyrene chat. Commands: /voice /mic /play N /history /clear /quit");
    print_history(&session.messages());

    if start_in_voice {
        announce_mode(session.toggle_voice_mode(), &session);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_line(&session, line.trim()).await {
                    break;
                }
            }
            Some(event) = session.next_voice_event() => {
                if let Some(outcome) = session.handle_voice_event(event).await {
                    println!();
                    report_outcome(&session, &outcome);
                }
            }
        }
    }

    session.exit_voice_mode();
    Ok(())
}

/// Handle one REPL line; returns false to quit
#[allow(clippy::future_not_send)]
async fn handle_line(session: &ConversationSession, line: &str) -> bool {
    match line {
        "" => {}
        "/quit" | "/exit" => return false,
        "/voice" => announce_mode(session.toggle_voice_mode(), session),
        "/mic" => {
            if session.toggle_recording() {
                println!("listening...");
            } else {
                println!("not listening");
            }
        }
        "/history" => print_history(&session.messages()),
        "/clear" => {
            if session.clear_history() {
                println!("history cleared");
            } else {
                println!("a turn is in flight, try again");
            }
        }
        _ if line.starts_with("/play") => {
            let index = line.trim_start_matches("/play").trim().parse::<usize>();
            match index {
                Ok(index) => match session.toggle_audio_playback(index) {
                    PlaybackStatus::Playing => println!("playing #{index}"),
                    PlaybackStatus::Paused => println!("paused #{index}"),
                    PlaybackStatus::Unavailable => println!("no audio for #{index}"),
                },
                Err(_) => println!("usage: /play N"),
            }
        }
        _ if line.starts_with('/') => println!("unknown command: {line}"),
        text => {
            let user_id = session.user_id();
            let outcome = session.submit(text, &user_id, false).await;
            report_outcome(session, &outcome);
        }
    }
    true
}

fn announce_mode(mode: InputMode, session: &ConversationSession) {
    match mode {
        InputMode::Voice if session.state().is_recording => println!("voice mode on, listening..."),
        InputMode::Voice => println!("voice mode on (no microphone, type to talk)"),
        InputMode::Text => println!("voice mode off"),
    }
}

fn report_outcome(session: &ConversationSession, outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Rejected(reason) => tracing::debug!(?reason, "submit rejected"),
        TurnOutcome::RolledBack(error) => println!("! message failed: {error}"),
        TurnOutcome::Completed { .. } => {
            let messages = session.messages();
            let start = messages.len().saturating_sub(2);
            for (index, message) in messages.iter().enumerate().skip(start) {
                print_message(index, message);
            }
        }
    }
}

fn print_history(messages: &[cyrene_voice::Message]) {
    for (index, message) in messages.iter().enumerate() {
        print_message(index, message);
    }
}

fn print_message(index: usize, message: &cyrene_voice::Message) {
    let who = if message.is_user { "you" } else { "agent" };
    let audio = if message.audio.is_some() { " [audio]" } else { "" };
    println!("#{index} {who}: {}{audio}", message.text);
}

/// List the TTS voice catalog
async fn list_voices(config: &Config) -> anyhow::Result<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;

    let voices = match fetch_voices(&client, &config.voice.voices_url).await {
        Ok(voices) => voices,
        Err(e) => {
            tracing::warn!(error = %e, "failed to fetch voice catalog");
            Vec::new()
        }
    };

    if voices.is_empty() {
        println!("No voices available");
        return Ok(());
    }

    for voice in voices {
        println!("{:<16} {:<12} {:<6} {}", voice.id, voice.name, voice.language, voice.gender);
    }
    Ok(())
}

fn show_history(config: &Config) -> anyhow::Result<()> {
    let store = TranscriptStore::new(open_store(config)?);
    let messages = store.load();
    if messages.is_empty() {
        println!("No saved history");
    } else {
        print_history(&messages);
    }
    Ok(())
}

fn clear_history(config: &Config) -> anyhow::Result<()> {
    TranscriptStore::new(open_store(config)?).clear();
    let removed = AudioCache::new(config.audio_dir())?.purge();
    println!("History cleared ({removed} audio clips removed)");
    Ok(())
}

/// Synthesize text and play it through the speakers
async fn say(config: &Config, text: &str) -> anyhow::Result<()> {
    if !config.voice.enabled {
        anyhow::bail!("voice is disabled");
    }

    let generator = voice_generator(config)?;
    let handle = generator
        .generate_voice(text, &config.voice.voice)
        .await
        .ok_or_else(|| anyhow::anyhow!("speech synthesis failed"))?;
    println!("Saved audio to {handle}");

    let mut playback = audio_output(config).open(&handle)?;
    playback.play()?;
    while playback.is_playing() {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

/// List agents on the configured node
async fn list_agents(config: &Config) -> anyhow::Result<()> {
    let api_base = config
        .agent
        .api_base_url
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("CYRENE_API_BASE_URL not configured"))?;

    let agents = AgentDirectory::new(api_base, &config.agent.node).list_agents().await?;
    if agents.is_empty() {
        println!("No agents on {}", config.agent.node);
    }
    for agent in agents {
        let status = agent.status.as_deref().unwrap_or("unknown");
        println!("{:<38} {:<20} {status}", agent.id, agent.name);
    }
    Ok(())
}
