//! UI rendering for the player.

use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
    style::{Color, Style, Modifier},
};
use crate::cpu::display::Grid;
use super::app::PlayerApp;

/// Main draw function.
pub fn draw(frame: &mut Frame, app: &PlayerApp) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(18),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
        ])
        .split(frame.area());

    draw_screen(frame, chunks[0], app);
    draw_registers(frame, chunks[1], app);
    draw_status(frame, chunks[2], app);
}

/// Two display rows per terminal line.
pub(crate) fn half_blocks(grid: &Grid) -> Vec<String> {
    grid.chunks(2)
        .map(|pair| {
            let top = &pair[0];
            let bottom = pair.get(1);
            (0..top.len())
                .map(|x| match (top[x], bottom.map_or(false, |row| row[x])) {
                    (true, true) => '█',
                    (true, false) => '▀',
                    (false, true) => '▄',
                    (false, false) => ' ',
                })
                .collect()
        })
        .collect()
}

/// Draw the 64x32 display.
fn draw_screen(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let lines: Vec<Line> = half_blocks(&app.screen)
        .into_iter()
        .map(Line::from)
        .collect();

    let title = format!(" {} ", app.rom.name);
    let screen = Paragraph::new(lines)
        .style(Style::default().fg(Color::Green))
        .block(Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)));

    frame.render_widget(screen, area);
}

/// Draw machine state in one line.
fn draw_registers(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let cpu = &app.cpu;
    let state_style = if cpu.is_running() {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };
    let sound = if app.beeping() {
        Span::styled(" ♪ ", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    } else {
        Span::raw("   ")
    };

    let line = Line::from(vec![
        Span::raw("PC: "),
        Span::styled(format!("{:03X}", cpu.regs.pc), Style::default().fg(Color::Yellow)),
        Span::raw("  I: "),
        Span::styled(format!("{:03X}", cpu.regs.i), Style::default().fg(Color::White)),
        Span::raw("  DT: "),
        Span::raw(format!("{:3}", cpu.timers.delay)),
        Span::raw("  ST: "),
        Span::raw(format!("{:3}", cpu.timers.sound)),
        Span::raw("  Cycles: "),
        Span::styled(format!("{}", cpu.cycles), Style::default().fg(Color::Cyan)),
        Span::raw("  Speed: "),
        Span::raw(format!("{}", app.speed)),
        Span::raw("  "),
        Span::styled(format!("{:?}", cpu.state), state_style),
        sound,
    ]);

    let paragraph = Paragraph::new(line)
        .block(Block::default()
            .title(" Machine ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Green)));

    frame.render_widget(paragraph, area);
}

/// Draw status bar.
fn draw_status(frame: &mut Frame, area: Rect, app: &PlayerApp) {
    let status = Paragraph::new(app.status.clone())
        .style(Style::default().fg(Color::White))
        .block(Block::default()
            .title(" Status ")
            .title_bottom(" 1234/QWER/ASDF/ZXCV: keys  Space: pause  +/-: speed  Backspace: reset  Esc: quit ")
            .borders(Borders::ALL));

    frame.render_widget(status, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::display::{HEIGHT, WIDTH};

    #[test]
    fn test_half_blocks() {
        let mut grid = [[false; WIDTH]; HEIGHT];
        grid[0][0] = true;
        grid[1][0] = true;
        grid[0][1] = true;
        grid[3][2] = true;

        let lines = half_blocks(&grid);
        assert_eq!(lines.len(), HEIGHT / 2);
        assert!(lines[0].starts_with("█▀ "));
        assert!(lines[1].starts_with("  ▄"));
        assert_eq!(lines[0].chars().count(), WIDTH);
    }
}
