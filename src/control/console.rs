//! # Line console.
//!
//! [`Console`] reads operator commands, turns them into requests on a
//! [`SupervisorHandle`] and writes human-readable answers. It never touches
//! process internals: targets are validated against the latest snapshot,
//! then submitted to the core's queues.
//!
//! With a refresh interval set, [`Console::run`] also prints the compact
//! program list on every tick.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Interval;

use crate::control::command::{self, Command, HELP, Target};
use crate::core::{ProcessId, SupervisorHandle};
use crate::error::ControlError;

const CLEAR: &str = "\x1b[2J\x1b[H";
const PROMPT: &str = "procvisor> ";

/// Whether the console should keep reading.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Operator console bound to one supervisor.
pub struct Console<W> {
    handle: SupervisorHandle,
    config_path: PathBuf,
    out: W,
    refresh: Option<Duration>,
}

impl<W: AsyncWrite + Unpin> Console<W> {
    /// `config_path` is the program file re-read by `reload`.
    pub fn new(handle: SupervisorHandle, config_path: impl Into<PathBuf>, out: W) -> Self {
        Self {
            handle,
            config_path: config_path.into(),
            out,
            refresh: None,
        }
    }

    /// Prints the program list every `every` while running.
    pub fn with_refresh(mut self, every: Option<Duration>) -> Self {
        self.refresh = every.filter(|d| !d.is_zero());
        self
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Reads commands until `quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(mut self, input: R) -> io::Result<()> {
        let mut lines = input.lines();
        let mut ticker = self.refresh.map(tokio::time::interval);
        self.say(PROMPT).await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        return Ok(());
                    };
                    if self.execute(&line).await? == Flow::Quit {
                        return Ok(());
                    }
                    self.say(PROMPT).await?;
                }
                _ = tick(&mut ticker) => {
                    let text = self.handle.snapshot().summary();
                    self.say(&text).await?;
                }
            }
        }
    }

    /// Executes one command line.
    pub async fn execute(&mut self, line: &str) -> io::Result<Flow> {
        let cmd = match command::parse(line) {
            Ok(cmd) => cmd,
            Err(err) => {
                self.say(&format!("error: {err}\n")).await?;
                return Ok(Flow::Continue);
            }
        };

        match cmd {
            Command::Empty | Command::Unknown(_) => {}
            Command::Status(None) => {
                let text = self.handle.snapshot().summary();
                self.say(&text).await?;
            }
            Command::Status(Some(target)) => {
                let text = match self.resolve(&target) {
                    Ok(id) => match self.handle.status(&id) {
                        Some(report) => report.to_string(),
                        None => format!("error: no status for {id}\n"),
                    },
                    Err(err) => format!("error: {err}\n"),
                };
                self.say(&text).await?;
            }
            Command::Start(target) => {
                let text = match self.resolve(&target) {
                    Ok(id) => match self.handle.submit_start(id.clone()) {
                        Ok(()) => format!("start requested for {id}\n"),
                        Err(err) => format!("error: {err}\n"),
                    },
                    Err(err) => format!("error: {err}\n"),
                };
                self.say(&text).await?;
            }
            Command::Stop(target) => {
                let text = match self.resolve(&target) {
                    Ok(id) => match self.handle.submit_stop(id.clone()) {
                        Ok(()) => format!("stop requested for {id}\n"),
                        Err(err) => format!("error: {err}\n"),
                    },
                    Err(err) => format!("error: {err}\n"),
                };
                self.say(&text).await?;
            }
            Command::Reload => {
                let text = match self.handle.reload_file(&self.config_path).await {
                    Ok(summary) => format!("reloaded: {summary}\n"),
                    Err(err) => format!("reload rejected: {err}\n"),
                };
                self.say(&text).await?;
            }
            Command::Help => self.say(HELP).await?,
            Command::Clear => self.say(CLEAR).await?,
            Command::Quit => {
                self.say("stopping all processes\n").await?;
                self.handle.shutdown().await;
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Checks a target against the latest snapshot.
    fn resolve(&self, target: &Target) -> Result<ProcessId, ControlError> {
        let snapshot = self.handle.snapshot();
        let program = snapshot
            .program(&target.name)
            .ok_or_else(|| ControlError::UnknownProgram {
                name: target.name.clone(),
            })?;
        if target.index >= program.processes.len() {
            return Err(ControlError::IndexOutOfRange {
                name: target.name.clone(),
                index: target.index,
                len: program.processes.len(),
            });
        }
        Ok(ProcessId::new(target.name.as_str(), target.index))
    }

    async fn say(&mut self, text: &str) -> io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }
}

async fn tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ProcessState, Supervisor, SupervisorConfig};
    use crate::error::RuntimeError;
    use tokio::task::JoinHandle;

    const PROGRAMS: &str = r#"
programs:
  web:
    cmd: /bin/sh
    args: ["-c", "exec sleep 30"]
    numprocs: 2
    starttime: 0
    stoptime: 2
"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        path: PathBuf,
        handle: SupervisorHandle,
        core: JoinHandle<Result<(), RuntimeError>>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("programs.yaml");
        std::fs::write(&path, PROGRAMS).expect("write");
        let programs = crate::programs::load(&path).expect("load");

        let cfg = SupervisorConfig {
            handle_os_signals: false,
            ..SupervisorConfig::default()
        };
        let sup = Supervisor::new(cfg, Vec::new());
        let handle = sup.handle();
        let core = tokio::spawn(sup.run(programs));
        Fixture {
            _dir: dir,
            path,
            handle,
            core,
        }
    }

    fn text(console: &Console<Vec<u8>>) -> String {
        String::from_utf8_lossy(console.output()).into_owned()
    }

    async fn settled(handle: &SupervisorHandle, id: &ProcessId, state: ProcessState) {
        let wait = handle.wait_for(|s| s.get(id).is_some_and(|r| r.state == state));
        assert!(matches!(
            tokio::time::timeout(Duration::from_secs(10), wait).await,
            Ok(Ok(()))
        ));
    }

    #[tokio::test]
    async fn validates_targets_before_submitting() {
        let fx = fixture();
        fx.handle.wait_for(|s| s.program("web").is_some()).await.expect("loaded");
        let mut console = Console::new(fx.handle.clone(), &fx.path, Vec::new());

        console.execute("start web 5").await.expect("io");
        console.execute("stop cache 0").await.expect("io");
        console.execute("status web x").await.expect("io");
        console.execute("frobnicate").await.expect("io");
        let out = text(&console);
        assert!(out.contains("program `web` has no instance 5 (numprocs = 2)"));
        assert!(out.contains("unknown program `cache`"));
        assert!(out.contains("invalid index `x`"));
        assert_eq!(out.lines().count(), 3);

        assert_eq!(console.execute("quit").await.expect("io"), Flow::Quit);
        assert!(matches!(fx.core.await, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn start_status_and_reload() {
        let fx = fixture();
        fx.handle.wait_for(|s| s.program("web").is_some()).await.expect("loaded");
        let mut console = Console::new(fx.handle.clone(), &fx.path, Vec::new());

        let id = ProcessId::new("web", 1);
        console.execute("run web 1").await.expect("io");
        settled(&fx.handle, &id, ProcessState::Running).await;
        console.execute("status web 1").await.expect("io");
        console.execute("status").await.expect("io");
        let out = text(&console);
        assert!(out.contains("start requested for web:1"));
        assert!(out.contains("state:     RUNNING"));
        assert!(out.contains("1/2 up"));

        let extra = format!(
            "{PROGRAMS}  db:\n    cmd: /bin/sh\n    args: [\"-c\", \"exec sleep 30\"]\n"
        );
        std::fs::write(&fx.path, extra).expect("rewrite");
        console.execute("reload").await.expect("io");
        assert!(text(&console).contains("reloaded: 0 starting, 1 pending, 0 stopping, 0 changed"));

        std::fs::write(&fx.path, "programs: [oops").expect("rewrite");
        console.execute("reload").await.expect("io");
        assert!(text(&console).contains("reload rejected:"));
        assert!(fx.handle.snapshot().program("db").is_some());

        console.execute("exit").await.expect("io");
        assert!(matches!(fx.core.await, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn run_reads_until_quit() {
        let fx = fixture();
        fx.handle.wait_for(|s| s.program("web").is_some()).await.expect("loaded");
        let console = Console::new(fx.handle.clone(), &fx.path, Vec::new());
        console
            .run(&b"help\nstatus\nquit\nstatus\n"[..])
            .await
            .expect("io");
        assert!(fx.handle.is_closed());
        assert!(matches!(fx.core.await, Ok(Ok(()))));
    }
}
