use chrono::Local;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame,
};
use thermolog_core::Conversion;

use crate::app::{App, AppState, AuthFocus, AuthMode, PasswordFocus};

use super::styles;

/// Width of text fields in the fixed-size dialogs
const FIELD_WIDTH: usize = 20;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Min(10),   // Converter
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_converter(frame, app, chunks[1]);
    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame),
        AppState::LoggingIn => render_auth_overlay(frame, app),
        AppState::ShowingHistory => render_history_overlay(frame, app),
        AppState::ExportingHistory => {
            render_history_overlay(frame, app);
            render_export_overlay(frame, app);
        }
        AppState::ChangingPassword => render_change_password_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Normal | AppState::Quitting => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Thermolog";
    let help_hint = "[?] Help";
    let user = app
        .current_user()
        .map(|u| format!("{}  ", u))
        .unwrap_or_default();

    let used = title.chars().count() + user.chars().count() + help_hint.len() + 4;
    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat((area.width as usize).saturating_sub(used))),
        Span::styled(user, styles::highlight_style()),
        Span::styled(help_hint, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    let paragraph = Paragraph::new(title_line).block(block);
    frame.render_widget(paragraph, area);
}

fn render_converter(frame: &mut Frame, app: &App, area: Rect) {
    let mut selector = vec![Span::raw("  ")];
    for (i, conversion) in Conversion::ALL.iter().enumerate() {
        if i > 0 {
            selector.push(Span::styled(" | ", styles::muted_style()));
        }
        let style = if *conversion == app.conversion {
            styles::title_style()
        } else {
            styles::muted_style()
        };
        selector.push(Span::styled(conversion.label(), style));
    }

    let from = app.conversion.from_scale().symbol();
    let mut lines = vec![
        Line::from(""),
        Line::from(selector),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Temperature: [", styles::muted_style()),
            Span::styled(
                format!("{:<w$}▌", app.temperature_input, w = FIELD_WIDTH),
                styles::selected_style(),
            ),
            Span::styled("] ", styles::muted_style()),
            Span::styled(from, styles::list_item_style()),
        ]),
        Line::from(""),
    ];

    if let Some(ref error) = app.convert_error {
        lines.push(Line::from(Span::styled(format!("  {}", error), styles::error_style())));
    } else if let Some(reading) = app.last_reading {
        lines.push(Line::from(Span::styled(format!("  {}", reading), styles::reading_style())));
    } else {
        lines.push(Line::from(Span::styled(
            "  Type a temperature and press Enter",
            styles::muted_style(),
        )));
    }

    let block = Block::default()
        .title(Span::styled(" Converter ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.state == AppState::Normal));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[h]istory | [p]assword | [l]ogout | [q]uit";

    let left_text = if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if let Some(account) = app.current_account() {
        match account.last_login {
            Some(at) => format!(
                " Last login {} ",
                at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            ),
            None => format!(" Signed in as {} ", account.username),
        }
    } else {
        " Not signed in ".to_string()
    };

    let right_text = format!(" {} ", shortcuts);

    let width = area.width as usize;
    let padding_len = width
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, styles::muted_style()),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    let paragraph = Paragraph::new(status_line).style(styles::status_bar_style());
    frame.render_widget(paragraph, area);
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 22, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Thermolog", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Converter", styles::highlight_style())),
        help_line("0-9 - .", "Type a temperature"),
        help_line("Enter", "Convert and save to history"),
        help_line("←/→", "Previous/next conversion"),
        help_line("Esc", "Clear input"),
        Line::from(""),
        Line::from(Span::styled(" History", styles::highlight_style())),
        help_line("h", "Show history"),
        help_line("c", "Clear history (in history view)"),
        help_line("x", "Export to CSV (in history view)"),
        Line::from(""),
        Line::from(Span::styled(" Account", styles::highlight_style())),
        help_line("p", "Change password"),
        help_line("l", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

/// A `Label: [value▌]` form row.
fn field_line(label: &str, value: &str, focused: bool) -> Line<'static> {
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("  "),
        Span::styled(format!("{:>17}: [", label), styles::muted_style()),
        Span::styled(
            format!("{:<w$}{}", value, cursor, w = FIELD_WIDTH),
            styles::field_style(focused),
        ),
        Span::styled("]", styles::muted_style()),
    ])
}

fn masked(password: &str) -> String {
    "*".repeat(password.chars().count().min(FIELD_WIDTH))
}

fn button_line(label: &str, focused: bool) -> Line<'static> {
    let text = if focused {
        format!(" ▶ {} ◀ ", label)
    } else {
        format!("   {}   ", label)
    };
    Line::from(vec![
        Span::raw("["),
        Span::styled(text, styles::field_style(focused)),
        Span::raw("]"),
    ])
    .alignment(Alignment::Center)
}

fn render_auth_overlay(frame: &mut Frame, app: &App) {
    let register = app.auth_mode == AuthMode::Register;
    let message = app
        .auth_error
        .as_ref()
        .map(|e| (e, styles::error_style()))
        .or_else(|| app.auth_notice.as_ref().map(|n| (n, styles::success_style())));

    let mut height = 11;
    if register {
        height += 1;
    }
    if message.is_some() {
        height += 2;
    }
    let area = centered_rect_fixed(52, height, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("Thermolog", styles::title_style())).alignment(Alignment::Center),
        Line::from(""),
        field_line("Username", &app.auth_username, app.auth_focus == AuthFocus::Username),
        field_line(
            "Password",
            &masked(&app.auth_password),
            app.auth_focus == AuthFocus::Password,
        ),
    ];
    if register {
        lines.push(field_line(
            "Email (optional)",
            &app.auth_email,
            app.auth_focus == AuthFocus::Email,
        ));
    }

    lines.push(Line::from(""));
    lines.push(button_line(app.auth_mode.title(), app.auth_focus == AuthFocus::Button));
    lines.push(Line::from(""));
    lines.push(
        Line::from(vec![
            Span::styled("Ctrl+R", styles::help_key_style()),
            Span::styled(
                format!(" switch to {}", app.auth_mode.toggle().title()),
                styles::muted_style(),
            ),
        ])
        .alignment(Alignment::Center),
    );

    if let Some((text, style)) = message {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", text), style)));
    }

    let block = Block::default()
        .title(Span::styled(format!(" {} ", app.auth_mode.title()), styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_history_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(60, 22, frame.area());
    frame.render_widget(Clear, area);

    let entries = app.history.as_ref().map(|h| h.entries()).unwrap_or(&[]);

    let header = Row::new(vec![
        Cell::from("Time"),
        Cell::from("Input"),
        Cell::from("Result"),
    ])
    .style(styles::highlight_style());

    let rows: Vec<Row> = entries
        .iter()
        .map(|e| {
            Row::new(vec![
                Cell::from(e.time_display()),
                Cell::from(e.input.clone()),
                Cell::from(e.result.clone()),
            ])
            .style(styles::list_item_style())
        })
        .collect();

    let title = format!(" History ({}) ", entries.len());
    let block = Block::default()
        .title(Span::styled(title, styles::title_style()))
        .title_bottom(Line::from(Span::styled(
            " [c]lear | e[x]port | [Esc] close ",
            styles::muted_style(),
        )))
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.state == AppState::ShowingHistory));

    if entries.is_empty() {
        let empty = Paragraph::new(Line::from(Span::styled(
            "  No conversions yet",
            styles::muted_style(),
        )))
        .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let table = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Percentage(45),
            Constraint::Percentage(45),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(styles::selected_style());

    let mut state = TableState::default().with_selected(Some(app.history_selection));
    frame.render_stateful_widget(table, area, &mut state);
}

fn render_export_overlay(frame: &mut Frame, app: &App) {
    let area = centered_rect_fixed(56, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(" Save history as CSV:", styles::highlight_style())),
        Line::from(""),
        Line::from(vec![
            Span::raw(" "),
            Span::styled(format!("{}▌", app.export_path), styles::selected_style()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled(" Enter", styles::help_key_style()),
            Span::styled(" save  ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(Span::styled(" Export ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_change_password_overlay(frame: &mut Frame, app: &App) {
    let height = if app.password_error.is_some() { 12 } else { 10 };
    let area = centered_rect_fixed(52, height, frame.area());
    frame.render_widget(Clear, area);

    let focus = app.password_focus;
    let mut lines = vec![
        Line::from(""),
        field_line(
            "Current password",
            &masked(&app.current_password),
            focus == PasswordFocus::Current,
        ),
        field_line(
            "New password",
            &masked(&app.new_password),
            focus == PasswordFocus::New,
        ),
        field_line(
            "Confirm",
            &masked(&app.confirm_password),
            focus == PasswordFocus::Confirm,
        ),
        Line::from(""),
        button_line("Change", focus == PasswordFocus::Button),
    ];

    if let Some(ref error) = app.password_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(format!(" {}", error), styles::error_style())));
    }

    let block = Block::default()
        .title(Span::styled(" Change Password ", styles::title_style()))
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(46, 7, frame.area());

    // Clear the area
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::{backend::TestBackend, Terminal};
    use thermolog_core::{Config, HashParams};

    fn screen_text(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| render(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        (0..area.height)
            .map(|y| {
                (0..area.width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_centered_rect_fixed() {
        let outer = Rect::new(0, 0, 100, 40);
        assert_eq!(centered_rect_fixed(40, 10, outer), Rect::new(30, 15, 40, 10));
        let small = Rect::new(0, 0, 20, 5);
        assert_eq!(centered_rect_fixed(40, 10, small), Rect::new(0, 0, 20, 5));
    }

    #[test]
    fn test_password_is_masked() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data_dir: Some(dir.path().to_path_buf()),
            hashing: HashParams::new(8, 1, 1),
            ..Config::default()
        };
        let mut app = App::build(config, None).unwrap();
        app.auth_username = "alice".to_string();
        app.auth_password = "hunter2".to_string();

        let text = screen_text(&app);
        assert!(text.contains("alice"));
        assert!(text.contains("*******"));
        assert!(!text.contains("hunter2"));
    }
}
