//! The game server process, hosted in a pseudo-terminal.

use std::io::{self, Read, Write};
use std::sync::mpsc::Sender;
use std::thread;
use std::time::{Duration, Instant};

use portable_pty::{Child, CommandBuilder, ExitStatus, MasterPty, PtySize};
use tracing::{debug, info, warn};

use crate::config::GameConfig;
use crate::error::{PanelError, Result};
use crate::lines::LineSplitter;

/// Ctrl-C as typed at the terminal; the line discipline turns it into
/// SIGINT for the foreground process.
const INTERRUPT: u8 = 0x03;
const EXIT_POLL: Duration = Duration::from_millis(50);

/// What the command endpoint needs from a running game.
pub trait GameConsole: Send {
    /// Type `command` followed by a newline into the game console.
    fn write_console(&mut self, command: &str) -> Result<()>;

    /// Stop the game without saving and start it again.
    fn hard_reboot(&mut self) -> Result<()>;
}

/// One live process: its PTY, stdin writer, and output reader thread.
struct Session {
    child: Box<dyn Child + Send + Sync>,
    _master: Box<dyn MasterPty + Send>,
    writer: Box<dyn Write + Send>,
    reader_thread: Option<thread::JoinHandle<()>>,
}

impl Session {
    fn spawn(settings: &GameConfig, lines: Sender<String>) -> Result<Self> {
        let mut cmd = CommandBuilder::new(&settings.binary_path);
        for arg in settings.args() {
            cmd.arg(arg);
        }
        if let Some(dir) = &settings.working_dir {
            cmd.cwd(dir);
        }

        let pty_system = portable_pty::native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: 40,
                cols: 200,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(PanelError::pty)?;

        let child = pair.slave.spawn_command(cmd).map_err(PanelError::pty)?;
        let mut reader = pair.master.try_clone_reader().map_err(PanelError::pty)?;
        let writer = pair.master.take_writer().map_err(PanelError::pty)?;

        let reader_thread = thread::Builder::new()
            .name("terrapanel-game-reader".to_string())
            .spawn(move || {
                let mut splitter = LineSplitter::new();
                let mut buffer = [0_u8; 8192];
                loop {
                    match reader.read(&mut buffer) {
                        Ok(0) => break,
                        Ok(n) => {
                            for line in splitter.push(&buffer[..n]) {
                                if lines.send(line).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                        Err(error) => {
                            debug!(%error, "game console reader stopped");
                            break;
                        }
                    }
                }
                if let Some(rest) = splitter.finish() {
                    let _ = lines.send(rest);
                }
            })
            .map_err(|error| {
                PanelError::pty(format!("failed to spawn game reader thread: {error}"))
            })?;

        Ok(Self {
            child,
            _master: pair.master,
            writer,
            reader_thread: Some(reader_thread),
        })
    }

    fn send_input(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.writer.write_all(bytes)?;
        self.writer.flush()
    }

    /// Poll until the child exits or `grace` elapses.
    fn wait_timeout(&mut self, grace: Duration) -> io::Result<Option<ExitStatus>> {
        let deadline = Instant::now() + grace;
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            thread::sleep(EXIT_POLL);
        }
    }

    /// Interrupt, then kill if the process outlives `grace`.
    fn stop(&mut self, grace: Duration) -> Result<()> {
        if let Err(error) = self.send_input(&[INTERRUPT]) {
            debug!(%error, "interrupt write failed; process may already be gone");
        }
        match self.wait_timeout(grace)? {
            Some(status) => {
                info!(exit_code = status.exit_code(), "game server stopped");
            }
            None => {
                warn!(
                    grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
                    "game server ignored interrupt; killing"
                );
                self.child.kill()?;
                let status = self.child.wait()?;
                info!(exit_code = status.exit_code(), "game server killed");
            }
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        self.reader_thread.take();
    }
}

/// The game server process plus enough state to restart it.
///
/// Output lines from every generation of the process go to the same
/// channel, so consumers are unaffected by reboots.
pub struct GamePty {
    settings: GameConfig,
    lines: Sender<String>,
    session: Session,
    generation: u64,
}

impl std::fmt::Debug for GamePty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GamePty")
            .field("binary_path", &self.settings.binary_path)
            .field("pid", &self.pid())
            .field("generation", &self.generation)
            .finish()
    }
}

impl GamePty {
    /// Start the game and relay its console lines to `lines`.
    pub fn spawn(settings: GameConfig, lines: Sender<String>) -> Result<Self> {
        let session = Session::spawn(&settings, lines.clone())?;
        info!(
            binary = %settings.binary_path.display(),
            world = %settings.world_path.display(),
            port = settings.port,
            pid = session.child.process_id(),
            "game server started"
        );
        Ok(Self {
            settings,
            lines,
            session,
            generation: 0,
        })
    }

    #[must_use]
    pub fn pid(&self) -> Option<u32> {
        self.session.child.process_id()
    }

    /// Times the process has been restarted.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.session.child.try_wait(), Ok(None))
    }
}

impl GameConsole for GamePty {
    fn write_console(&mut self, command: &str) -> Result<()> {
        let mut line = Vec::with_capacity(command.len() + 1);
        line.extend_from_slice(command.as_bytes());
        line.push(b'\n');
        self.session.send_input(&line)?;
        debug!(command, "wrote game console command");
        Ok(())
    }

    fn hard_reboot(&mut self) -> Result<()> {
        info!(pid = self.pid(), "hard reboot requested");
        self.session.stop(self.settings.shutdown_grace())?;
        let fresh = Session::spawn(&self.settings, self.lines.clone())?;
        let mut old = std::mem::replace(&mut self.session, fresh);
        if let Some(handle) = old.reader_thread.take() {
            drop(old);
            let _ = handle.join();
        }
        self.generation = self.generation.saturating_add(1);
        info!(
            pid = self.pid(),
            generation = self.generation,
            "game server restarted"
        );
        Ok(())
    }
}
