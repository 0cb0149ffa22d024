use crate::error::SessionError;
use crate::peer::transport::Transport;
use crate::session::{MessageSink, SessionController};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::QueueableCommand;
use std::io::{self, BufRead, Write};
use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::{debug, info, warn};

const PROMPT: &str = "> ";

/// Why the interactive loop stopped
#[derive(Debug, PartialEq, Eq)]
pub enum ChatEnd {
    InputClosed,
    ChannelClosed(String),
}

/// Prints incoming messages in blue, then re-issues the prompt.
#[derive(Debug, Default)]
pub struct TerminalSink;

impl TerminalSink {
    pub fn new() -> Self {
        Self
    }

    fn write_message(out: &mut impl Write, text: &str) -> io::Result<()> {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        out.queue(SetForegroundColor(Color::Blue))?;
        write!(out, "\r[{stamp}] {text}")?;
        out.queue(ResetColor)?;
        writeln!(out)?;
        write!(out, "{PROMPT}")?;
        out.flush()
    }
}

impl MessageSink for TerminalSink {
    fn show_message(&mut self, _label: &str, text: &str) {
        if let Err(err) = Self::write_message(&mut io::stdout(), text) {
            warn!(error = %err, "failed to print message");
        }
    }
}

/// Reset colors and show the input prompt
pub fn prompt() -> io::Result<()> {
    let mut out = io::stdout();
    out.queue(ResetColor)?;
    write!(out, "{PROMPT}")?;
    out.flush()
}

/// Read stdin line by line on a dedicated thread, outside the runtime.
/// The returned receiver closes when stdin hits EOF or fails.
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || forward_lines(io::stdin().lock(), &tx));
    rx
}

/// Invalid UTF-8 is replaced rather than ending the input.
fn forward_lines(mut input: impl BufRead, tx: &Sender<String>) {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf) {
            Ok(0) => {
                debug!("stdin closed");
                return;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\n', '\r']).to_string();
                if tx.blocking_send(line).is_err() {
                    return;
                }
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => {
                warn!(error = %err, "failed to read stdin");
                return;
            }
        }
    }
}

/// Send each input line as one frame while incoming messages are displayed
/// as they arrive. Runs until input ends or the channel closes.
pub async fn run<T: Transport>(
    controller: &mut SessionController<T>,
    lines: &mut Receiver<String>,
    mut prompt: impl FnMut() -> io::Result<()>,
) -> Result<ChatEnd, SessionError> {
    prompt()?;
    loop {
        tokio::select! {
            line = lines.recv() => {
                let Some(text) = line else {
                    info!("input closed, leaving chat");
                    return Ok(ChatEnd::InputClosed);
                };
                controller.send_text(&text).await?;
                prompt()?;
            }
            progress = controller.pump() => {
                if let Some(label) = progress?.closed {
                    return Ok(ChatEnd::ChannelClosed(label));
                }
            }
        }
    }
}
