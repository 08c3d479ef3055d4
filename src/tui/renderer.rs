//! Draws [`TuiState`] with ratatui.
//!
//! Wide terminals get the full dashboard: server and client address, the
//! phase line, one gauge covering the whole run and either live figures
//! or the result cards. Below 60 columns everything collapses to a few
//! plain lines.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame,
};

use super::state::{ErrorInfo, TuiState};
use crate::results::{format_ping, format_speed, SpeedTestResult};
use crate::speedtest::phase::Phase;
use crate::speedtest::progress::Direction as Transfer;

/// Get color for speed value based on thresholds.
///
/// - Green: >= 100 Mbps (fast)
/// - Yellow: 25-100 Mbps (moderate)
/// - Red: < 25 Mbps (slow)
pub fn speed_color(speed_mbps: f64) -> Color {
    if speed_mbps >= 100.0 {
        Color::Green
    } else if speed_mbps >= 25.0 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Minimal mode threshold in columns.
const MINIMAL_MODE_THRESHOLD: u16 = 60;

pub fn is_minimal_mode(width: u16) -> bool {
    width < MINIMAL_MODE_THRESHOLD
}

/// Key hints for the current state.
pub fn control_hint(state: &TuiState) -> &'static str {
    if state.is_testing() {
        "esc stop · q quit"
    } else if state.result.is_some() || state.error.is_some() {
        "enter test again · r reset · q quit"
    } else {
        "enter start · q quit"
    }
}

/// Render the TUI to the terminal.
pub fn render_frame(frame: &mut Frame, state: &TuiState) {
    if is_minimal_mode(frame.area().width) {
        render_minimal_frame(frame, state);
    } else {
        render_normal_frame(frame, state);
    }
}

fn render_normal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Metadata
            Constraint::Length(2), // Phase
            Constraint::Length(3), // Unified gauge
            Constraint::Min(6),    // Live speed / results
            Constraint::Length(1), // Controls
        ])
        .split(frame.area());

    render_metadata(frame, chunks[0], state);
    render_phase_indicator(frame, chunks[1], state);
    render_gauge(frame, chunks[2], state);
    render_body(frame, chunks[3], state);
    render_status_bar(frame, chunks[4], state);
}

fn render_minimal_frame(frame: &mut Frame, state: &TuiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Phase + progress
            Constraint::Length(1), // Live speed
            Constraint::Min(3),    // Results
            Constraint::Length(1), // Controls
        ])
        .split(frame.area());

    let phase_line = format!("{} {:.0}%", state.phase.label(), state.progress);
    frame.render_widget(
        Paragraph::new(phase_line).style(phase_style(state.phase)),
        chunks[0],
    );

    let speed = state.current_speed_mbps.map(format_speed).unwrap_or_default();
    let color = state.current_speed_mbps.map(speed_color).unwrap_or(Color::White);
    frame.render_widget(
        Paragraph::new(speed).style(Style::default().fg(color)),
        chunks[1],
    );

    if let Some(ref error) = state.error {
        frame.render_widget(
            Paragraph::new(format!("Error: {}", error.message))
                .style(Style::default().fg(Color::Red)),
            chunks[2],
        );
    } else if let Some(ref result) = state.result {
        let lines = vec![
            Line::from(format!("Down {}", format_speed(result.download))),
            Line::from(format!("Up   {}", format_speed(result.upload))),
            Line::from(format!("Ping {}", format_ping(result.ping))),
        ];
        frame.render_widget(Paragraph::new(lines), chunks[2]);
    }

    render_status_bar(frame, chunks[3], state);
}

/// Server URL and client address.
pub fn render_metadata(frame: &mut Frame, area: Rect, state: &TuiState) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let label = Style::default().fg(Color::White).add_modifier(Modifier::BOLD);
    let value = Style::default().fg(Color::Cyan);

    let lines = vec![
        Line::from(vec![
            Span::styled("Server: ", label),
            Span::styled(state.server_url.clone(), value),
        ]),
        Line::from(vec![
            Span::styled("Your IP: ", label),
            Span::styled(
                state.client_ip.clone().unwrap_or_else(|| "-".to_string()),
                value,
            ),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines), inner);
}

fn phase_style(phase: Phase) -> Style {
    match phase {
        Phase::Complete => {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        }
        Phase::Idle => Style::default().fg(Color::White),
        _ => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
    }
}

pub fn render_phase_indicator(frame: &mut Frame, area: Rect, state: &TuiState) {
    let marker = match state.phase {
        Phase::Idle => "○",
        Phase::Complete => "✓",
        _ => "▶",
    };

    let paragraph = Paragraph::new(format!("{} {}", marker, state.phase.label()))
        .style(phase_style(state.phase));
    frame.render_widget(paragraph, area);
}

/// One bar for the whole run: download fills 0-60, upload 60-80, ping 80-100.
pub fn render_gauge(frame: &mut Frame, area: Rect, state: &TuiState) {
    let percent = state.progress.clamp(0.0, 100.0).round() as u16;
    let color = if state.phase == Phase::Complete { Color::Green } else { Color::Cyan };

    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::NONE))
        .gauge_style(Style::default().fg(color))
        .percent(percent)
        .label(format!("{}%", percent));
    frame.render_widget(gauge, area);
}

fn render_body(frame: &mut Frame, area: Rect, state: &TuiState) {
    if let Some(ref error) = state.error {
        render_error(frame, area, error);
        return;
    }

    match (&state.result, state.phase) {
        (Some(result), _) => render_result_cards(frame, area, result),
        (None, phase) if phase.is_testing() => render_live(frame, area, state),
        _ => {
            let paragraph = Paragraph::new("Press Enter to start a speed test.")
                .style(Style::default().fg(Color::DarkGray));
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_live(frame: &mut Frame, area: Rect, state: &TuiState) {
    let mut lines = Vec::new();

    let (text, color) = match (state.phase, state.current_speed_mbps) {
        (Phase::Ping, _) => match state.latency.measurements.last() {
            Some(&last) => (
                format!("Ping {}/{}: {}", state.latency.current, state.latency.total, format_ping(last)),
                Color::White,
            ),
            None => ("Measuring...".to_string(), Color::White),
        },
        (_, Some(speed)) => {
            let label = state.current_direction.map_or("Current", Transfer::label);
            (format!("{} speed: {}", label, format_speed(speed)), speed_color(speed))
        }
        (_, None) => ("Measuring...".to_string(), Color::White),
    };
    lines.push(Line::from(Span::styled(
        text,
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )));

    let bandwidth = match state.phase {
        Phase::Download => Some((Transfer::Download, &state.download)),
        Phase::Upload => Some((Transfer::Upload, &state.upload)),
        _ => None,
    };
    if let Some((direction, bandwidth)) = bandwidth {
        let mut detail = format!("{} requests: {}", direction.label(), bandwidth.requests);
        if bandwidth.failed > 0 {
            detail.push_str(&format!(" ({} failed)", bandwidth.failed));
        }
        lines.push(Line::from(Span::styled(
            detail,
            Style::default().fg(Color::DarkGray),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn result_card(title: &str, value: String, color: Color) -> Paragraph<'static> {
    Paragraph::new(vec![
        Line::from(""),
        Line::from(Span::styled(
            value,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title(title.to_string()))
}

pub fn render_result_cards(frame: &mut Frame, area: Rect, result: &SpeedTestResult) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 4),
            Constraint::Ratio(1, 4),
            Constraint::Ratio(1, 4),
            Constraint::Ratio(1, 4),
        ])
        .split(area);

    frame.render_widget(
        result_card("Download", format_speed(result.download), speed_color(result.download)),
        columns[0],
    );
    frame.render_widget(
        result_card("Upload", format_speed(result.upload), speed_color(result.upload)),
        columns[1],
    );
    frame.render_widget(
        result_card("Ping", format_ping(result.ping), Color::Magenta),
        columns[2],
    );
    frame.render_widget(result_card("IP", result.ip.clone(), Color::Cyan), columns[3]);
}

fn render_error(frame: &mut Frame, area: Rect, error: &ErrorInfo) {
    let mut lines = vec![Line::from(Span::styled(
        format!("Error: {}", error.message),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    ))];

    if let Some(ref suggestion) = error.suggestion {
        lines.push(Line::from(Span::styled(
            format!("Suggestion: {}", suggestion),
            Style::default().fg(Color::Yellow),
        )));
    }

    frame.render_widget(Paragraph::new(lines), area);
}

pub fn render_status_bar(frame: &mut Frame, area: Rect, state: &TuiState) {
    let paragraph = Paragraph::new(control_hint(state))
        .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}
