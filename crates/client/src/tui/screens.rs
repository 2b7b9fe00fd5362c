use std::time::Instant;

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Circle, Line as CanvasLine, Points, Rectangle};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use rally::{GameState, GameStatus, Paddle, PlayerSide, Transport};

use crate::app::{Overlay, SyncEngine};
use crate::debug::DebugStats;

pub fn render<T: Transport>(
    frame: &mut Frame,
    engine: &SyncEngine<T>,
    stats: &DebugStats,
    now: Instant,
) {
    let area = frame.area();

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);

    render_hud(frame, rows[0], engine, stats);
    render_field(frame, rows[1], engine);
    render_help(frame, rows[2], engine);

    match engine.overlay(now) {
        Overlay::None => {}
        Overlay::Connecting => render_dialog(
            frame,
            rows[1],
            " Connecting ",
            Color::Yellow,
            vec![Line::from("Waiting for the server...")],
        ),
        Overlay::Reconnecting { attempt, remaining } => render_dialog(
            frame,
            rows[1],
            " Connection Lost ",
            Color::Yellow,
            vec![
                Line::from(format!("Reconnecting (attempt {})", attempt)),
                Line::from(format!("Giving up in {}s", remaining.as_secs())),
            ],
        ),
        Overlay::PeerDisconnected => render_dialog(
            frame,
            rows[1],
            " Opponent Left ",
            Color::Magenta,
            vec![Line::from("Waiting for your opponent to return...")],
        ),
        Overlay::Failed { reason } => render_dialog(
            frame,
            rows[1],
            " Disconnected ",
            Color::Red,
            vec![
                Line::from(reason),
                Line::from(""),
                Line::from(Span::styled(
                    "R retry  Q exit",
                    Style::default().fg(Color::DarkGray),
                )),
            ],
        ),
    }
}

fn render_hud<T: Transport>(
    frame: &mut Frame,
    area: Rect,
    engine: &SyncEngine<T>,
    stats: &DebugStats,
) {
    let state = engine.state();
    let (left, right) = state.scores();

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(40),
            Constraint::Percentage(30),
        ])
        .split(area);

    let seat = match engine.local_side() {
        Some(PlayerSide::Player1) => "You: left",
        Some(PlayerSide::Player2) => "You: right",
        None => "You: -",
    };
    let info = Paragraph::new(vec![
        Line::from(seat),
        Line::from(format!(
            "Match {}  Wins {}-{}",
            state.current_match, state.match_wins.player1, state.match_wins.player2
        )),
    ])
    .block(Block::default().borders(Borders::ALL).title(" Rally "));
    frame.render_widget(info, columns[0]);

    let score = Paragraph::new(vec![
        Line::from(Span::styled(
            format!("{}  :  {}", left, right),
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )),
        status_line(engine.status(), engine.status_reason(), state),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL));
    frame.render_widget(score, columns[1]);

    let net = Paragraph::new(vec![
        Line::from(format!("Ping {:.0}ms", engine.connection().ping_ms)),
        Line::from(format!(
            "{:.0} fps  {:.0} snap/s",
            stats.fps(),
            stats.snapshot_rate()
        )),
    ])
    .alignment(Alignment::Right)
    .block(Block::default().borders(Borders::ALL).title(" Net "));
    frame.render_widget(net, columns[2]);
}

fn status_line<'a>(status: GameStatus, reason: Option<&'a str>, state: &GameState) -> Line<'a> {
    let (text, color) = match status {
        GameStatus::Waiting => ("Waiting for players".to_string(), Color::DarkGray),
        GameStatus::Menu => ("Ready".to_string(), Color::Cyan),
        GameStatus::Playing => ("Playing".to_string(), Color::Green),
        GameStatus::Paused => ("Paused".to_string(), Color::Yellow),
        GameStatus::MatchOver => (
            format!("Match over{}", winner_suffix(state.winner)),
            Color::Yellow,
        ),
        GameStatus::GameOver => (
            format!("Game over{}", winner_suffix(state.winner)),
            Color::Red,
        ),
    };

    let mut spans = vec![Span::styled(text, Style::default().fg(color))];
    if let Some(reason) = reason {
        spans.push(Span::styled(
            format!(" ({})", reason),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn winner_suffix(winner: Option<PlayerSide>) -> String {
    winner
        .map(|side| format!(", player {} wins", side.number()))
        .unwrap_or_default()
}

fn render_field<T: Transport>(frame: &mut Frame, area: Rect, engine: &SyncEngine<T>) {
    let field = &engine.config().field;
    let width = field.width as f64;
    let height = field.height as f64;
    let state = engine.state();
    let trail: Vec<(f64, f64)> = engine
        .trail()
        .iter()
        .map(|p| (p.x as f64, height - p.y as f64))
        .collect();
    let local = engine.local_side();

    let canvas = Canvas::default()
        .block(Block::default().borders(Borders::ALL))
        .marker(Marker::Braille)
        .x_bounds([0.0, width])
        .y_bounds([0.0, height])
        .paint(|ctx| {
            ctx.draw(&CanvasLine::new(
                width / 2.0,
                0.0,
                width / 2.0,
                height,
                Color::DarkGray,
            ));

            for side in [PlayerSide::Player1, PlayerSide::Player2] {
                let color = if Some(side) == local {
                    Color::Cyan
                } else {
                    Color::White
                };
                ctx.draw(&paddle_shape(state.paddle(side), height, color));
            }

            ctx.draw(&Points {
                coords: &trail,
                color: Color::DarkGray,
            });
            ctx.draw(&Circle {
                x: state.ball.x as f64,
                y: height - state.ball.y as f64,
                radius: state.ball.radius as f64,
                color: Color::Yellow,
            });
        });
    frame.render_widget(canvas, area);
}

// Game coordinates grow downward, canvas coordinates grow upward.
fn paddle_shape(paddle: &Paddle, field_height: f64, color: Color) -> Rectangle {
    Rectangle {
        x: paddle.x as f64,
        y: field_height - paddle.y as f64 - paddle.height as f64,
        width: paddle.width as f64,
        height: paddle.height as f64,
        color,
    }
}

fn render_help<T: Transport>(frame: &mut Frame, area: Rect, engine: &SyncEngine<T>) {
    let help = Paragraph::new(help_text(engine.status()))
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(help, area);
}

/// Key hints for the status. Only keys whose intent the status accepts are listed.
fn help_text(status: GameStatus) -> &'static str {
    match status {
        GameStatus::Menu => "Space start  W/S or Up/Down move  R restart  Q exit",
        GameStatus::Playing | GameStatus::Paused => {
            "W/S or Up/Down move  Space pause  R restart  Q exit"
        }
        GameStatus::MatchOver => "N next match  R restart  Q exit",
        GameStatus::GameOver | GameStatus::Waiting => "Q exit",
    }
}

fn render_dialog(frame: &mut Frame, area: Rect, title: &str, color: Color, lines: Vec<Line>) {
    let dialog_area = centered_rect(44, lines.len() as u16 + 2, area);
    frame.render_widget(Clear, dialog_area);

    let dialog = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .title(title)
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color)),
        );
    frame.render_widget(dialog, dialog_area);
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::net::Intent;

    #[test]
    fn test_help_lists_only_accepted_keys() {
        use GameStatus::*;

        for status in [Waiting, Menu, Playing, Paused, MatchOver, GameOver] {
            let text = help_text(status);
            assert_eq!(
                text.contains("R restart"),
                Intent::RestartGame.allowed_in(status),
                "{}",
                status
            );
            assert_eq!(
                text.contains("N next"),
                Intent::NextMatch.allowed_in(status),
                "{}",
                status
            );
            assert_eq!(
                text.contains("Space"),
                Intent::StartGame.allowed_in(status) || Intent::TogglePause.allowed_in(status),
                "{}",
                status
            );
        }
        assert_eq!(help_text(GameOver), "Q exit");
    }
}
