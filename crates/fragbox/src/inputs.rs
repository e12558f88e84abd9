//! Helper threads that feed the window: a stdin command reader and a
//! shader-file watcher. Both only deliver commands; all sandbox
//! mutation happens on the event-loop thread.

use std::ffi::OsStr;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, select, unbounded, Sender};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use renderer::{HostHandle, ParameterAxis, SandboxMessage, TextureAxis, WrapMode};

#[derive(Debug, Clone, PartialEq)]
pub enum InputCommand {
    Message(SandboxMessage),
    Reload,
    Quit,
}

/// Destination for commands produced off the event-loop thread.
pub trait InputSink {
    fn deliver(&self, command: InputCommand) -> Result<()>;
}

impl InputSink for HostHandle {
    fn deliver(&self, command: InputCommand) -> Result<()> {
        match command {
            InputCommand::Message(message) => self.send(message),
            InputCommand::Reload => self.reload(),
            InputCommand::Quit => self.shutdown(),
        }
    }
}

impl InputSink for Sender<InputCommand> {
    fn deliver(&self, command: InputCommand) -> Result<()> {
        self.send(command)
            .map_err(|_| anyhow!("input receiver has been dropped"))
    }
}

/// Parses one stdin line. Blank lines and `#` comments yield `Ok(None)`.
///
/// ```text
/// set <x|y|z|w> <float>
/// wrap <x|y> <selector|name>
/// reload
/// quit
/// ```
pub fn parse_command(line: &str) -> Result<Option<InputCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match (verb.as_str(), args.as_slice()) {
        ("set", [axis, value]) => {
            let axis: ParameterAxis = axis.parse()?;
            let value: f32 = value
                .parse()
                .map_err(|_| format!("invalid parameter value '{value}'"))?;
            InputCommand::Message(SandboxMessage::ParameterChanged { axis, value })
        }
        ("wrap", [axis, mode]) => {
            let axis: TextureAxis = axis.parse()?;
            let mode: WrapMode = mode.parse()?;
            InputCommand::Message(SandboxMessage::WrapModeChanged { axis, mode })
        }
        ("reload", []) => InputCommand::Reload,
        ("quit" | "exit", []) => InputCommand::Quit,
        ("set", _) => return Err("usage: set <x|y|z|w> <value>".to_string()),
        ("wrap", _) => return Err("usage: wrap <x|y> <repeat|clamp|mirror|0|1|2>".to_string()),
        (other, _) => return Err(format!("unknown command '{other}'")),
    };
    Ok(Some(command))
}

/// Reads commands until EOF, `quit`, or the sink goes away.
pub fn pump_commands<R: BufRead>(reader: R, sink: &impl InputSink) -> Result<()> {
    for line in reader.lines() {
        let line = line.context("failed to read from stdin")?;
        match parse_command(&line) {
            Ok(Some(command)) => {
                let quit = command == InputCommand::Quit;
                sink.deliver(command)?;
                if quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(message) => tracing::warn!(input = %line.trim(), "{message}"),
        }
    }
    Ok(())
}

/// Detached: a blocked stdin read cannot be interrupted, so the thread simply
/// ends with the process.
pub fn spawn_stdin_reader<S>(sink: S) -> Result<()>
where
    S: InputSink + Send + 'static,
{
    thread::Builder::new()
        .name("fragbox-stdin".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            if let Err(err) = pump_commands(stdin.lock(), &sink) {
                tracing::debug!(error = %err, "stdin reader stopped");
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(())
}

/// Whether a filesystem event touched the watched file.
///
/// The parent directory is watched rather than the file, so saves that
/// replace the file through a rename still show up as a create of its name.
fn touches(event: &notify::Event, file_name: &OsStr) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    ) && event
        .paths
        .iter()
        .any(|path| path.file_name() == Some(file_name))
}

/// Watches a shader file and delivers [`InputCommand::Reload`] after it
/// changes. Events arriving within `debounce` of each other produce one
/// reload. Stops when dropped.
pub struct FileWatcher {
    watcher: Option<RecommendedWatcher>,
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FileWatcher {
    pub fn spawn<S>(path: PathBuf, debounce: Duration, sink: S) -> Result<Self>
    where
        S: InputSink + Send + 'static,
    {
        let file_name = path
            .file_name()
            .map(OsStr::to_os_string)
            .with_context(|| format!("cannot watch {}: not a file path", path.display()))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = unbounded::<()>();
        let mut watcher = notify::recommended_watcher(
            move |result: notify::Result<notify::Event>| match result {
                Ok(event) if touches(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "shader file watch error"),
            },
        )
        .context("failed to create shader file watcher")?;
        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .with_context(|| format!("failed to watch {}", directory.display()))?;

        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let thread = thread::Builder::new()
            .name("fragbox-watch".into())
            .spawn(move || {
                tracing::debug!(path = %path.display(), ?debounce, "watching shader file");
                loop {
                    select! {
                        recv(shutdown_rx) -> _ => break,
                        recv(event_rx) -> event => {
                            if event.is_err() {
                                break;
                            }
                            while event_rx.recv_timeout(debounce).is_ok() {}
                            tracing::info!(path = %path.display(), "shader file changed; reloading");
                            if sink.deliver(InputCommand::Reload).is_err() {
                                break;
                            }
                        }
                    }
                }
            })
            .context("failed to spawn shader file watcher")?;

        Ok(Self {
            watcher: Some(watcher),
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        drop(self.watcher.take());
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
