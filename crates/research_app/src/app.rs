use std::io::{self, BufRead, Write};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use anyhow::{bail, Context};
use research_core::{update, AppViewModel, Feedback, Msg, Outcome, UiState};
use research_engine::{EngineEvent, EngineHandle};
use research_logging::{research_debug, research_info};

use crate::config::AppConfig;
use crate::effects::{progress_event, EffectRunner};
use crate::render;

/// Owns the session state and prints what every message changed.
struct Controller<W: Write> {
    state: UiState,
    runner: EffectRunner,
    last_view: Option<AppViewModel>,
    out: W,
}

impl<W: Write> Controller<W> {
    fn new(runner: EffectRunner, out: W) -> Self {
        Self {
            state: UiState::new(),
            runner,
            last_view: None,
            out,
        }
    }

    fn dispatch_msg(&mut self, msg: Msg) -> io::Result<()> {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.runner.enqueue(effects);

        let was_dirty = state.consume_dirty();
        let view = state.view();
        self.state = state;
        if was_dirty {
            for line in render::render(self.last_view.as_ref(), &view) {
                writeln!(self.out, "{line}")?;
            }
            self.out.flush()?;
            self.last_view = Some(view);
        }
        Ok(())
    }

    fn view(&self) -> AppViewModel {
        self.state.view()
    }
}

/// Researches one query and returns once the report or an error is shown.
pub fn run_ask(config: &AppConfig, query: &str) -> anyhow::Result<ExitCode> {
    if query.trim().is_empty() {
        bail!("the query is empty");
    }

    let (msg_tx, msg_rx) = mpsc::channel();
    let runner = EffectRunner::new(config.client_settings(), msg_tx)
        .context("starting the research engine")?;
    let mut controller = Controller::new(runner, io::stdout().lock());

    controller.dispatch_msg(Msg::QueryChanged(query.to_string()))?;
    controller.dispatch_msg(Msg::SearchSubmitted)?;
    while !controller.view().is_settled() {
        let Ok(msg) = msg_rx.recv() else {
            bail!("the research engine stopped unexpectedly");
        };
        controller.dispatch_msg(msg)?;
    }

    Ok(match controller.view().outcome {
        Outcome::Failed { .. } => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    })
}

/// Interactive session: each input line is a query or a command.
pub fn run_shell(config: &AppConfig) -> anyhow::Result<ExitCode> {
    let (msg_tx, msg_rx) = mpsc::channel();
    let runner = EffectRunner::new(config.client_settings(), msg_tx.clone())
        .context("starting the research engine")?;
    let mut controller = Controller::new(runner, io::stdout());
    let quit = Arc::new(AtomicBool::new(false));

    println!("{HELP}");
    spawn_input_reader(msg_tx, quit.clone());
    controller.dispatch_msg(Msg::HistoryRequested)?;

    while !quit.load(Ordering::SeqCst) {
        let Ok(msg) = msg_rx.recv() else {
            break;
        };
        controller.dispatch_msg(msg)?;
    }

    research_info!("Shell closed");
    Ok(ExitCode::SUCCESS)
}

/// Prints the latest progress snapshot of a session.
pub fn run_status(config: &AppConfig, session_id: &str) -> anyhow::Result<ExitCode> {
    let settings = config.client_settings();
    let wait = settings.connect_timeout + settings.request_timeout * 2;
    let (engine, events) = EngineHandle::new(settings).context("starting the research engine")?;
    engine.snapshot(session_id);

    loop {
        let Some(event) = events.recv_timeout(wait) else {
            bail!("no answer from the backend for session {session_id}");
        };
        if let EngineEvent::SnapshotLoaded { result, .. } = event {
            let payload =
                result.with_context(|| format!("loading progress for session {session_id}"))?;
            for line in render::snapshot_lines(session_id, &progress_event(payload)) {
                println!("{line}");
            }
            return Ok(ExitCode::SUCCESS);
        }
    }
}

const HELP: &str = "Type a research query, or one of:
  history      show past research
  repeat N     research history entry N again
  clear        clear the history
  good | bad   rate the last report
  quit         leave";

#[derive(Debug, PartialEq)]
enum ShellInput {
    Msgs(Vec<Msg>),
    Quit,
    Ignored,
}

fn parse_shell_line(line: &str) -> ShellInput {
    let line = line.trim();
    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };

    match (command.to_ascii_lowercase().as_str(), rest) {
        ("", _) => ShellInput::Ignored,
        ("quit" | "exit", "") => ShellInput::Quit,
        ("history", "") => ShellInput::Msgs(vec![Msg::HistoryRequested]),
        ("clear", "") => ShellInput::Msgs(vec![Msg::ClearHistoryClicked]),
        ("good", "") => ShellInput::Msgs(vec![Msg::FeedbackGiven(Feedback::Helpful)]),
        ("bad", "") => ShellInput::Msgs(vec![Msg::FeedbackGiven(Feedback::NotHelpful)]),
        ("repeat", number) => match number.parse::<usize>() {
            Ok(number) if number > 0 => {
                ShellInput::Msgs(vec![Msg::HistoryRepeatClicked { index: number - 1 }])
            }
            _ => ShellInput::Ignored,
        },
        _ => ShellInput::Msgs(vec![
            Msg::QueryChanged(line.to_string()),
            Msg::SearchSubmitted,
        ]),
    }
}

fn spawn_input_reader(msg_tx: mpsc::Sender<Msg>, quit: Arc<AtomicBool>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            match parse_shell_line(&line) {
                ShellInput::Msgs(msgs) => {
                    for msg in msgs {
                        if msg_tx.send(msg).is_err() {
                            return;
                        }
                    }
                }
                ShellInput::Quit => break,
                ShellInput::Ignored => {
                    research_debug!("Ignoring shell input {:?}", line);
                    println!("{HELP}");
                }
            }
        }
        quit.store(true, Ordering::SeqCst);
        // Wake the controller so it sees the flag.
        let _ = msg_tx.send(Msg::NoOp);
    });
}
