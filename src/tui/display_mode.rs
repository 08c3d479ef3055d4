//! Output mode for `speed-probe run`.

/// How a client run presents itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// Interactive dashboard with start/stop controls.
    Tui,
    /// One run, then a coloured summary on stdout.
    Plain,
    /// One run, then the result document as JSON on stdout.
    Json,
}

impl DisplayMode {
    /// `--json` always wins; otherwise a terminal on stdout gets the
    /// dashboard and anything else (pipes, CI logs) gets the summary.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        match (json_flag, is_tty) {
            (true, _) => DisplayMode::Json,
            (false, true) => DisplayMode::Tui,
            (false, false) => DisplayMode::Plain,
        }
    }

    /// Whether the run is driven by key presses rather than started once.
    pub fn is_interactive(self) -> bool {
        self == DisplayMode::Tui
    }
}
