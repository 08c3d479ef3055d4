//! TUI controller for managing the display lifecycle.
//!
//! The TuiController owns the terminal, the shared [`TuiState`] and the
//! interactive loop: Enter starts a run, Esc stops it, `r` resets the
//! screen and `q` quits. Runs execute on a separate task so the loop
//! keeps drawing while measurements are in flight.

use std::error::Error;
use std::io::{self, Stdout};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use log::debug;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::task::JoinHandle;

use super::display_mode::DisplayMode;
use super::renderer::render_frame;
use super::state::TuiState;
use crate::errors::SpeedTestError;
use crate::results::SpeedTestResult;
use crate::speedtest::cancel::CancelHandle;
use crate::speedtest::engine::TestEngine;
use crate::speedtest::progress::{ProgressCallback, ProgressEvent};

const FRAME_INTERVAL: Duration = Duration::from_millis(50);

type RunHandle = JoinHandle<Result<Option<SpeedTestResult>, SpeedTestError>>;

/// What a key press asks the controller to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Start,
    Stop,
    Reset,
    Quit,
}

/// Map a key press to an action given whether a run is in flight.
pub fn action_for_key(key: KeyEvent, testing: bool) -> Option<ControlAction> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') => Some(ControlAction::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(ControlAction::Quit)
        }
        KeyCode::Enter if !testing => Some(ControlAction::Start),
        KeyCode::Esc if testing => Some(ControlAction::Stop),
        KeyCode::Char('r') if !testing => Some(ControlAction::Reset),
        _ => None,
    }
}

/// Controller for the TUI display.
pub struct TuiController {
    mode: DisplayMode,
    state: Arc<Mutex<TuiState>>,
    /// Terminal instance (only present in TUI mode)
    terminal: Option<Terminal<CrosstermBackend<Stdout>>>,
    initialized: bool,
}

impl TuiController {
    pub fn new(mode: DisplayMode, server_url: &str) -> Self {
        Self {
            mode,
            state: Arc::new(Mutex::new(TuiState::new(server_url))),
            terminal: None,
            initialized: false,
        }
    }

    /// Enter the alternate screen and raw mode. No-op outside TUI mode.
    pub fn init(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.mode.is_interactive() {
            return Ok(());
        }

        enable_raw_mode()?;

        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, cursor::Hide)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        let size = terminal.size()?;

        self.terminal = Some(terminal);
        self.initialized = true;
        self.with_state(|state| state.terminal_width = size.width);

        Ok(())
    }

    /// Restore the terminal.
    pub fn cleanup(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.initialized {
            return Ok(());
        }

        if let Some(ref mut terminal) = self.terminal {
            execute!(terminal.backend_mut(), LeaveAlternateScreen, cursor::Show)?;
        }

        disable_raw_mode()?;

        self.initialized = false;
        self.terminal = None;

        Ok(())
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut TuiState) -> T) -> Option<T> {
        self.state.lock().ok().map(|mut state| f(&mut state))
    }

    pub fn set_error(&mut self, message: String, suggestion: Option<String>) {
        self.with_state(|state| state.set_error(message, suggestion));
    }

    pub fn render(&mut self) -> Result<(), Box<dyn Error>> {
        if !self.mode.is_interactive() {
            return Ok(());
        }

        let Some(ref mut terminal) = self.terminal else { return Ok(()) };

        let width = terminal.size()?.width;
        // Clone so the engine task never waits on a draw.
        let snapshot = self.state.lock().ok().map(|mut state| {
            state.terminal_width = width;
            state.clone()
        });

        if let Some(snapshot) = snapshot {
            terminal.draw(|frame| render_frame(frame, &snapshot))?;
        }

        Ok(())
    }

    /// Callback that feeds engine events into the shared state.
    pub fn progress_callback(&self) -> Arc<dyn ProgressCallback> {
        Arc::new(TuiProgressCallback { state: Arc::clone(&self.state) })
    }

    /// Interactive loop. Returns the last completed result, if any.
    pub async fn run_interactive(
        &mut self,
        engine: Arc<TestEngine>,
    ) -> Result<Option<SpeedTestResult>, Box<dyn Error>> {
        let mut running: Option<(CancelHandle, RunHandle)> = None;
        let mut last_result = None;

        loop {
            self.render()?;

            if running.as_ref().is_some_and(|(_, task)| task.is_finished()) {
                if let Some((_, task)) = running.take() {
                    self.reap(task, &mut last_result).await;
                }
            }

            if !event::poll(FRAME_INTERVAL)? {
                continue;
            }
            let Event::Key(key) = event::read()? else { continue };

            let testing = self.with_state(|state| state.is_testing()).unwrap_or(false)
                || running.is_some();

            match action_for_key(key, testing) {
                Some(ControlAction::Start) => {
                    self.with_state(TuiState::reset);
                    running = Some(self.start_run(Arc::clone(&engine)));
                }
                Some(ControlAction::Stop) => {
                    if let Some((cancel, task)) = running.take() {
                        cancel.cancel();
                        self.with_state(TuiState::stop);
                        self.reap(task, &mut last_result).await;
                    }
                }
                Some(ControlAction::Reset) => {
                    self.with_state(TuiState::reset);
                }
                Some(ControlAction::Quit) => {
                    if let Some((cancel, task)) = running.take() {
                        cancel.cancel();
                        self.reap(task, &mut last_result).await;
                    }
                    break;
                }
                None => {}
            }
        }

        Ok(last_result)
    }

    fn start_run(&self, engine: Arc<TestEngine>) -> (CancelHandle, RunHandle) {
        let cancel = CancelHandle::new();
        let token = cancel.token();
        let callback = self.progress_callback();

        let task = tokio::spawn(async move {
            engine.run(&token, callback.as_ref()).await
        });

        (cancel, task)
    }

    async fn reap(
        &mut self,
        task: RunHandle,
        last_result: &mut Option<SpeedTestResult>,
    ) {
        match task.await {
            Ok(Ok(Some(result))) => *last_result = Some(result),
            Ok(Ok(None)) => debug!("Run cancelled"),
            Ok(Err(e)) => self.set_error(e.message.clone(), e.suggestion.clone()),
            Err(e) => self.set_error(format!("test task failed: {}", e), None),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> Arc<Mutex<TuiState>> {
        Arc::clone(&self.state)
    }
}

impl Drop for TuiController {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

struct TuiProgressCallback {
    state: Arc<Mutex<TuiState>>,
}

impl ProgressCallback for TuiProgressCallback {
    /// Blocks only for as long as a state update or a snapshot clone takes.
    fn on_progress(&self, event: ProgressEvent) {
        if let Ok(mut state) = self.state.lock() {
            state.update_from_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::TestServer;
    use crate::server::ServerConfig;
    use crate::speedtest::client::Client;
    use crate::speedtest::engine::TestConfig;
    use crate::speedtest::phase::Phase;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_enter_starts_only_when_idle() {
        assert_eq!(action_for_key(press(KeyCode::Enter), false), Some(ControlAction::Start));
        assert_eq!(action_for_key(press(KeyCode::Enter), true), None);
    }

    #[test]
    fn test_esc_stops_only_while_testing() {
        assert_eq!(action_for_key(press(KeyCode::Esc), true), Some(ControlAction::Stop));
        assert_eq!(action_for_key(press(KeyCode::Esc), false), None);
    }

    #[test]
    fn test_reset_and_quit() {
        assert_eq!(action_for_key(press(KeyCode::Char('r')), false), Some(ControlAction::Reset));
        assert_eq!(action_for_key(press(KeyCode::Char('r')), true), None);
        assert_eq!(action_for_key(press(KeyCode::Char('q')), true), Some(ControlAction::Quit));
        assert_eq!(
            action_for_key(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                true
            ),
            Some(ControlAction::Quit)
        );
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut key = press(KeyCode::Enter);
        key.kind = KeyEventKind::Release;
        assert_eq!(action_for_key(key, false), None);
    }

    #[test]
    fn test_init_and_render_are_noops_outside_tui() {
        let mut controller = TuiController::new(DisplayMode::Plain, "http://srv");
        assert!(controller.init().is_ok());
        assert!(controller.terminal.is_none());
        assert!(controller.render().is_ok());
        assert!(controller.cleanup().is_ok());
        assert_eq!(controller.mode, DisplayMode::Plain);
    }

    #[tokio::test]
    async fn test_callback_drives_state_through_a_run() {
        let server = TestServer::start(ServerConfig::default()).await;
        let controller = TuiController::new(DisplayMode::Plain, &server.base_url());
        let client = Client::new(&server.base_url(), Duration::from_secs(10)).unwrap();
        let engine = TestEngine::new(
            client,
            TestConfig {
                download_sizes_mb: vec![1],
                upload_sizes: vec![64 * 1024],
                min_phase_duration: Duration::from_millis(30),
                ping_count: 3,
                ..TestConfig::default()
            },
        );

        let callback = controller.progress_callback();
        let result = engine
            .run(&CancelHandle::new().token(), callback.as_ref())
            .await
            .unwrap();
        assert!(result.is_some());

        let state = controller.state();
        let state = state.lock().unwrap();
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(state.progress, 100.0);
        assert_eq!(state.client_ip.as_deref(), Some("127.0.0.1"));
        assert!(state.result.is_some());
        assert_eq!(state.latency.measurements.len(), 3);
    }
}
