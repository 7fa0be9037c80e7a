use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Widget, Wrap},
};

use crate::board::Coord;
use crate::clock::Phase;
use crate::session::{ReportStatus, Snapshot};

/// Terminal columns per board cell
pub const CELL_WIDTH: u16 = 3;
const HEADER_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;

/// Where the board's cells sit on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardLayout {
    pub frame: Rect,
    rows: usize,
    cols: usize,
}

impl BoardLayout {
    /// Centre a `rows x cols` board under the header, or `None` if `area` is too small.
    pub fn fit(area: Rect, rows: usize, cols: usize) -> Option<Self> {
        let (width, height) = Self::required_size(rows, cols)?;
        let total_height = height.checked_add(HEADER_HEIGHT + FOOTER_HEIGHT)?;
        if area.width < width || area.height < total_height {
            return None;
        }
        let frame = Rect {
            x: area.x + (area.width - width) / 2,
            y: area.y + HEADER_HEIGHT,
            width,
            height,
        };
        Some(Self { frame, rows, cols })
    }

    /// Bordered board size in terminal cells
    pub fn required_size(rows: usize, cols: usize) -> Option<(u16, u16)> {
        let cols = u16::try_from(cols).ok()?;
        let rows = u16::try_from(rows).ok()?;
        Some((cols.checked_mul(CELL_WIDTH)?.checked_add(2)?, rows.checked_add(2)?))
    }

    /// Board cell under a terminal position, if any
    pub fn cell_at(&self, column: u16, row: u16) -> Option<Coord> {
        let inner_x = self.frame.x + 1;
        let inner_y = self.frame.y + 1;
        if column < inner_x || row < inner_y {
            return None;
        }
        let coord = Coord::new(
            usize::from(row - inner_y),
            usize::from((column - inner_x) / CELL_WIDTH),
        );
        (coord.row < self.rows && coord.col < self.cols).then_some(coord)
    }

    pub fn cell_rect(&self, coord: Coord) -> Rect {
        Rect {
            x: self.frame.x + 1 + coord.col as u16 * CELL_WIDTH,
            y: self.frame.y + 1 + coord.row as u16,
            width: CELL_WIDTH,
            height: 1,
        }
    }
}

/// Full-screen view of one session
pub struct GameView<'a> {
    pub snapshot: Snapshot<'a>,
    /// Stored personal best, shown once the session is over
    pub best_score: Option<u32>,
}

impl Widget for &GameView<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let snap = &self.snapshot;
        let bold = Style::default().add_modifier(Modifier::BOLD);
        let dim = Style::default().add_modifier(Modifier::DIM);

        let Some(layout) = BoardLayout::fit(area, snap.board.rows(), snap.board.cols()) else {
            let hint = BoardLayout::required_size(snap.board.rows(), snap.board.cols())
                .and_then(|(w, h)| Some((w, h.checked_add(HEADER_HEIGHT + FOOTER_HEIGHT)?)))
                .map(|(w, h)| format!("resize to at least {}x{} to play", w, h))
                .unwrap_or_else(|| "the board cannot fit in a terminal".to_string());
            Paragraph::new(vec![
                Line::styled("Terminal too small", bold.fg(Color::Yellow)),
                Line::styled(hint, dim),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .render(area, buf);
            return;
        };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(HEADER_HEIGHT),
                Constraint::Min(0),
                Constraint::Length(FOOTER_HEIGHT),
            ])
            .split(area);

        let player = snap
            .user_id
            .map(|u| u.to_string())
            .unwrap_or_else(|| "guest".to_string());
        let time_style = if snap.remaining_secs <= 10 && snap.phase == Phase::Running {
            bold.fg(Color::Red)
        } else {
            bold
        };
        Paragraph::new(vec![
            Line::from(vec![
                Span::styled("Drag Game", bold.fg(Color::Cyan)),
                Span::styled(format!("  player: {}", player), dim),
            ]),
            Line::from(vec![
                Span::styled(format!("Score: {}", snap.score), bold.fg(Color::Green)),
                Span::raw("   "),
                Span::styled(format!("Time: {}s", snap.remaining_secs), time_style),
                Span::styled(format!("   Left: {}", snap.remaining_digits()), dim),
                Span::styled(
                    if snap.ready || snap.phase != Phase::Running {
                        format!("   [{}]", snap.phase)
                    } else {
                        format!("   [{}, paused]", snap.phase)
                    },
                    dim,
                ),
            ]),
        ])
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        Block::default()
            .borders(Borders::ALL)
            .border_style(dim)
            .render(layout.frame, buf);

        let ended = snap.phase == Phase::Ended;
        for (r, row) in snap.board.iter_rows().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let coord = Coord::new(r, c);
                let rect = layout.cell_rect(coord);
                let mut style = if ended { dim } else { bold };
                if snap.is_selected(coord) {
                    style = style.bg(Color::Yellow).fg(Color::Black);
                }
                let text = match cell {
                    Some(digit) => format!("{:^width$}", digit, width = CELL_WIDTH as usize),
                    None => " ".repeat(CELL_WIDTH as usize),
                };
                buf.set_string(rect.x, rect.y, text, style);
            }
        }

        Paragraph::new(Span::styled(
            "drag over digits that add up to 10 · r restart · q quit",
            dim.add_modifier(Modifier::ITALIC),
        ))
        .alignment(Alignment::Center)
        .render(chunks[2], buf);

        if ended {
            render_game_over(snap, self.best_score, area, buf);
        }
    }
}

fn render_game_over(snap: &Snapshot<'_>, best: Option<u32>, over: Rect, buf: &mut Buffer) {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let dim = Style::default().add_modifier(Modifier::DIM);

    let mut lines = vec![
        Line::styled("Time's up!", bold.fg(Color::Magenta)),
        Line::from(""),
        Line::styled(format!("Final score: {}", snap.score), bold),
    ];
    if let Some(best) = best {
        lines.push(Line::styled(
            format!("Best: {}", best.max(snap.score)),
            bold.fg(Color::Green),
        ));
    }
    let report = match snap.last_report {
        Some(ReportStatus::Submitted) => "score submitted".to_string(),
        Some(ReportStatus::NoUser) => "playing as guest, score not saved".to_string(),
        Some(ReportStatus::Failed(err)) => format!("could not save score: {}", err),
        None => String::new(),
    };
    if !report.is_empty() {
        lines.push(Line::styled(report, dim));
    }
    lines.push(Line::from(""));
    lines.push(Line::styled("r: play again   q: quit", dim));

    let height = (lines.len() as u16 + 2).min(over.height);
    let width = 40.min(over.width);
    let popup = Rect {
        x: over.x + (over.width - width) / 2,
        y: over.y + (over.height - height) / 2,
        width,
        height,
    };

    Clear.render(popup, buf);
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Game over"))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .render(popup, buf);
}
