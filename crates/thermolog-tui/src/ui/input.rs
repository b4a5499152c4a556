//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{
    can_add_email_char, can_add_password_char, can_add_path_char, can_add_username_char, App,
    AppState, AuthFocus, AuthMode, PasswordFocus,
};

/// Characters that can appear in a temperature. Everything else is a shortcut.
fn is_number_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E')
}

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    match app.state {
        AppState::LoggingIn => handle_auth_input(app, key),
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            false
        }
        AppState::ConfirmingQuit => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
                false
            }
            _ => false,
        },
        AppState::ShowingHistory => {
            handle_history_input(app, key);
            false
        }
        AppState::ExportingHistory => {
            handle_export_input(app, key);
            false
        }
        AppState::ChangingPassword => {
            handle_change_password_input(app, key);
            false
        }
        AppState::Normal => {
            handle_converter_input(app, key);
            false
        }
        AppState::Quitting => true,
    }
}

fn handle_converter_input(app: &mut App, key: KeyEvent) {
    app.status_message = None;
    match key.code {
        KeyCode::Char(c) if is_number_char(c) => app.push_temperature_char(c),
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('h') => app.show_history(),
        KeyCode::Char('p') => app.start_change_password(),
        KeyCode::Char('l') => app.logout(),
        KeyCode::Enter => app.convert_input(),
        KeyCode::Backspace => app.pop_temperature_char(),
        KeyCode::Esc => {
            app.temperature_input.clear();
            app.convert_error = None;
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Tab => app.next_conversion(),
        KeyCode::Left | KeyCode::Up | KeyCode::BackTab => app.prev_conversion(),
        _ => {}
    }
}

fn handle_history_input(app: &mut App, key: KeyEvent) {
    let len = app.history_len();
    match key.code {
        KeyCode::Esc | KeyCode::Char('h') | KeyCode::Char('q') => {
            app.state = AppState::Normal;
        }
        KeyCode::Up | KeyCode::Char('k') => {
            app.history_selection = app.history_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.history_selection + 1 < len {
                app.history_selection += 1;
            }
        }
        KeyCode::Home => app.history_selection = 0,
        KeyCode::End => app.history_selection = len.saturating_sub(1),
        KeyCode::Char('c') => app.clear_history(),
        KeyCode::Char('x') => {
            if len > 0 {
                app.start_export();
            } else {
                app.status_message = Some("Nothing to export".to_string());
            }
        }
        _ => {}
    }
}

fn handle_export_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::ShowingHistory,
        KeyCode::Enter => app.export_history(),
        KeyCode::Backspace => {
            app.export_path.pop();
        }
        KeyCode::Char(c) => {
            if can_add_path_char(app.export_path.len(), c) {
                app.export_path.push(c);
            }
        }
        _ => {}
    }
}

fn handle_auth_input(app: &mut App, key: KeyEvent) -> bool {
    if key.code == KeyCode::Char('r') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.toggle_auth_mode();
        return false;
    }

    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return true;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.auth_focus = app.auth_focus.next(app.auth_mode);
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.auth_focus = app.auth_focus.prev(app.auth_mode);
        }
        KeyCode::Left | KeyCode::Right if app.auth_focus == AuthFocus::Button => {
            app.toggle_auth_mode();
        }
        KeyCode::Enter => match app.auth_focus {
            AuthFocus::Button => app.submit_auth(),
            // Enter on the last field submits
            AuthFocus::Password if app.auth_mode == AuthMode::Login => app.submit_auth(),
            AuthFocus::Email => app.submit_auth(),
            focus => app.auth_focus = focus.next(app.auth_mode),
        },
        KeyCode::Backspace => match app.auth_focus {
            AuthFocus::Username => {
                app.auth_username.pop();
            }
            AuthFocus::Password => {
                app.auth_password.pop();
            }
            AuthFocus::Email => {
                app.auth_email.pop();
            }
            AuthFocus::Button => {}
        },
        KeyCode::Char(c) => match app.auth_focus {
            AuthFocus::Username => {
                if can_add_username_char(app.auth_username.len(), c) {
                    app.auth_username.push(c);
                }
            }
            AuthFocus::Password => {
                if can_add_password_char(app.auth_password.len(), c) {
                    app.auth_password.push(c);
                }
            }
            AuthFocus::Email => {
                if can_add_email_char(app.auth_email.len(), c) {
                    app.auth_email.push(c);
                }
            }
            AuthFocus::Button => {
                // Ignore character input on button
            }
        },
        _ => {}
    }
    false
}

fn handle_change_password_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
        }
        KeyCode::Down | KeyCode::Tab => {
            app.password_focus = app.password_focus.next();
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.password_focus = app.password_focus.prev();
        }
        KeyCode::Enter => match app.password_focus {
            PasswordFocus::Confirm | PasswordFocus::Button => app.attempt_change_password(),
            focus => app.password_focus = focus.next(),
        },
        KeyCode::Backspace => {
            if let Some(field) = password_field(app) {
                field.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(field) = password_field(app) {
                if can_add_password_char(field.len(), c) {
                    field.push(c);
                }
            }
        }
        _ => {}
    }
}

/// The buffer behind the focused change-password field.
fn password_field(app: &mut App) -> Option<&mut String> {
    match app.password_focus {
        PasswordFocus::Current => Some(&mut app.current_password),
        PasswordFocus::New => Some(&mut app.new_password),
        PasswordFocus::Confirm => Some(&mut app.confirm_password),
        PasswordFocus::Button => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thermolog_core::{Config, HashParams};

    fn test_app(dir: &std::path::Path) -> App {
        let config = Config {
            data_dir: Some(dir.to_path_buf()),
            hashing: HashParams::new(8, 1, 1),
            ..Config::default()
        };
        App::build(config, None).unwrap()
    }

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn ctrl(app: &mut App, c: char) {
        handle_input(app, KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    /// Register then log in through the keyboard only.
    fn sign_up(app: &mut App, user: &str, pass: &str) {
        app.auth_username.clear();
        app.auth_focus = AuthFocus::Username;
        ctrl(app, 'r');
        assert_eq!(app.auth_mode, AuthMode::Register);
        type_text(app, user);
        press(app, KeyCode::Tab);
        type_text(app, pass);
        press(app, KeyCode::Tab);
        press(app, KeyCode::Enter);
        assert_eq!(app.auth_mode, AuthMode::Login);
        assert_eq!(app.auth_focus, AuthFocus::Password);

        type_text(app, pass);
        press(app, KeyCode::Enter);
    }

    #[test]
    fn test_keyboard_login_and_convert() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");
        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.current_user(), Some("alice"));

        type_text(&mut app, "100");
        press(&mut app, KeyCode::Enter);
        let reading = app.last_reading.unwrap();
        assert_eq!(reading.to_string(), "100.0°C = 212.00°F");
        assert_eq!(app.history_len(), 1);
    }

    #[test]
    fn test_shortcuts_do_not_reach_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");

        type_text(&mut app, "-4");
        press(&mut app, KeyCode::Char('?'));
        assert_eq!(app.state, AppState::ShowingHelp);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.temperature_input, "-4");

        press(&mut app, KeyCode::Right);
        assert_eq!(app.conversion, thermolog_core::Conversion::FahrenheitToCelsius);
    }

    #[test]
    fn test_quit_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");

        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!press(&mut app, KeyCode::Char('n')));
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Char('y')));
    }

    #[test]
    fn test_escape_on_auth_quits() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        assert!(press(&mut app, KeyCode::Esc));
        assert_eq!(app.state, AppState::Quitting);
    }

    #[test]
    fn test_logout_key_returns_to_auth() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.state, AppState::LoggingIn);
        assert_eq!(app.current_user(), None);
        assert_eq!(app.auth_username, "alice");
    }

    #[test]
    fn test_history_overlay_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");
        for t in ["1", "2", "3"] {
            type_text(&mut app, t);
            press(&mut app, KeyCode::Enter);
            press(&mut app, KeyCode::Esc);
        }

        press(&mut app, KeyCode::Char('h'));
        assert_eq!(app.state, AppState::ShowingHistory);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.history_selection, 2);

        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.state, AppState::ExportingHistory);
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.state, AppState::ShowingHistory);

        press(&mut app, KeyCode::Char('c'));
        assert_eq!(app.history_len(), 0);
        press(&mut app, KeyCode::Char('x'));
        assert_eq!(app.state, AppState::ShowingHistory);
    }

    #[test]
    fn test_change_password_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(dir.path());
        sign_up(&mut app, "alice", "pass1");

        press(&mut app, KeyCode::Char('p'));
        assert_eq!(app.state, AppState::ChangingPassword);
        type_text(&mut app, "pass1");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "newpass");
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, "newpass");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.state, AppState::Normal);
        assert_eq!(app.status_message.as_deref(), Some("Password changed"));
    }

    #[test]
    fn test_is_number_char() {
        for c in "0123456789-+.eE".chars() {
            assert!(is_number_char(c));
        }
        for c in "qhlpx?".chars() {
            assert!(!is_number_char(c));
        }
    }
}
