use anyhow::Result;
use clap::{Parser, Subcommand};
use gabble::config::Config;
use gabble::gate::{Submission, SubmissionGate};
use gabble::parser::{ParseRequest, ParseResponse, ParserClient};
use gabble::recognizer::{Effect, Recognizer};
use gabble::sink::ResultSink;
use gabble::speech::{SpeechAdapter, SpeechEvent};
use gabble::status::StatusBar;
use gabble::trace;
use gabble::tui::{Console, InputEvent};
use std::path::Path;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;

type ResponseTx = UnboundedSender<(u64, Result<ParseResponse>)>;

#[derive(Parser)]
#[command(name = "gabble", about = "Voice and text console for a lightparser service")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Parse one line of text and print the result
    Parse {
        text: Vec<String>,
        /// Submit with the incremental flag set
        #[arg(long)]
        incremental: bool,
    },
    /// Clear the parser's server-side cache
    ClearCache,
}

fn main() -> Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> Result<()> {
    let cli = Cli::parse();
    trace::init_tracing(Path::new("."));

    let config = Config::load();
    let client = ParserClient::new(
        &config.parser.base_url,
        Duration::from_secs(config.parser.timeout_secs),
    )?;

    match cli.command {
        Some(Command::Parse { text, incremental }) => {
            parse_once(&client, text.join(" "), incremental).await
        }
        Some(Command::ClearCache) => {
            client.clear_cache().await;
            Ok(())
        }
        None => run_console(config, client).await,
    }
}

async fn parse_once(client: &ParserClient, text: String, incremental: bool) -> Result<()> {
    let request = ParseRequest {
        text,
        incremental,
        is_final: true,
    };
    let response = client.parse(&request).await?;
    if !response.data.is_null() {
        println!("{}", serde_json::to_string_pretty(&response.data)?);
    }
    if !response.tree.is_null() {
        println!("{}", serde_json::to_string_pretty(&response.tree)?);
    }
    Ok(())
}

async fn run_console(config: Config, client: ParserClient) -> Result<()> {
    let (speech_tx, speech_rx) = flume::unbounded::<SpeechEvent>();
    let mut adapter = SpeechAdapter::new(&config.speech, speech_tx);
    let mut recognizer = Recognizer::new(adapter.is_supported());
    let mut gate = SubmissionGate::new(config.incremental);
    let mut sink = ResultSink::new();
    let mut status_bar = StatusBar::new();
    let mut console = Console::new()?;

    let (response_tx, mut response_rx) =
        tokio::sync::mpsc::unbounded_channel::<(u64, Result<ParseResponse>)>();

    // Stale server-side cache must not leak across sessions
    spawn_clear_cache(&client);

    let mut in_flight: usize = 0;
    let mut tick = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            biased;

            Some((token, outcome)) = response_rx.recv() => {
                in_flight = in_flight.saturating_sub(1);
                match outcome {
                    Ok(response) => {
                        if sink.apply(token, response) {
                            console.show_result(sink.results.as_ref(), sink.tree.as_ref())?;
                        }
                    }
                    Err(e) => {
                        if sink.fail(token, e.to_string()) {
                            console.show_error(sink.error.as_deref().unwrap_or("parse failed"))?;
                        }
                    }
                }
            }

            Ok(event) = speech_rx.recv_async() => {
                let final_text = match &event {
                    SpeechEvent::Result(batch) => batch
                        .entries
                        .iter()
                        .rev()
                        .find(|e| e.is_final)
                        .map(|e| e.transcript.clone()),
                    _ => None,
                };

                let effects = recognizer.on_event(event);

                if let Some(text) = final_text {
                    // Recognized text lands in the input line for editing
                    console.clear_preview();
                    console.set_input(&text);
                    console.show_submitted(&text)?;
                } else {
                    console.set_preview(&recognizer.state().interim);
                }

                perform_effects(
                    effects, &mut adapter, &mut gate, &mut sink,
                    &client, &response_tx, &mut in_flight,
                );
            }

            _ = tick.tick() => {
                status_bar.tick();

                for input in console.poll_input()? {
                    match input {
                        InputEvent::Quit => {
                            adapter.stop();
                            return Ok(());
                        }
                        InputEvent::Edited(text) => {
                            if let Some(submission) = gate.keystroke(&text) {
                                issue_submission(submission, &mut sink, &client, &response_tx, &mut in_flight);
                            }
                        }
                        InputEvent::Submit(text) => {
                            console.show_submitted(&text)?;
                            if let Some(submission) = gate.submit(&text, true) {
                                issue_submission(submission, &mut sink, &client, &response_tx, &mut in_flight);
                            }
                        }
                        InputEvent::ToggleSpeech => {
                            let effects = recognizer.toggle_start_stop();
                            perform_effects(
                                effects, &mut adapter, &mut gate, &mut sink,
                                &client, &response_tx, &mut in_flight,
                            );
                        }
                        InputEvent::ToggleIncremental => {
                            let on = !gate.incremental();
                            if gate.set_incremental(on) {
                                spawn_clear_cache(&client);
                            }
                        }
                    }
                }

                let width = console.term_width();
                let line = status_bar.render(
                    recognizer.state().status,
                    gate.incremental(),
                    in_flight > 0,
                    width,
                );
                console.draw(&line)?;
            }
        }
    }
}

fn perform_effects(
    effects: Vec<Effect>,
    adapter: &mut SpeechAdapter,
    gate: &mut SubmissionGate,
    sink: &mut ResultSink,
    client: &ParserClient,
    response_tx: &ResponseTx,
    in_flight: &mut usize,
) {
    for effect in effects {
        match effect {
            Effect::Start => adapter.start(),
            Effect::Stop => adapter.stop(),
            Effect::Submit { text, is_final } => {
                if let Some(submission) = gate.submit(&text, is_final) {
                    issue_submission(submission, sink, client, response_tx, in_flight);
                }
            }
        }
    }
}

/// Clear the displayed tree, then hand the request to a network task. The
/// completion routes back through the response channel with its token.
fn issue_submission(
    submission: Submission,
    sink: &mut ResultSink,
    client: &ParserClient,
    response_tx: &ResponseTx,
    in_flight: &mut usize,
) {
    sink.begin(submission.token);
    *in_flight += 1;

    let client = client.clone();
    let response_tx = response_tx.clone();
    tokio::spawn(async move {
        let outcome = client.parse(&submission.request).await;
        let _ = response_tx.send((submission.token, outcome));
    });
}

fn spawn_clear_cache(client: &ParserClient) {
    let client = client.clone();
    tokio::spawn(async move {
        client.clear_cache().await;
    });
}
