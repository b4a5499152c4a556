//! Application state management for thermolog.
//!
//! This module contains the core `App` struct that manages all application
//! state: the session manager, the logged-in user's history, form state for
//! the login/register and change-password overlays, and the converter.
//!
//! Per-user data is only ever reached through `SessionManager` and
//! `HistoryStore`. It is reloaded on every login and dropped on logout.

use std::path::PathBuf;

use anyhow::Result;
use tracing::{error, warn};

use thermolog_core::config::USERNAME_ENV;
use thermolog_core::{
    convert, is_acceptable_partial, AccountInfo, AuthError, Config, Conversion, HistoryStore,
    LoadOutcome, Reading, SessionManager, UserHistory,
};

// ============================================================================
// Constants
// ============================================================================

/// Maximum length for username input.
const MAX_USERNAME_LENGTH: usize = 50;

/// Maximum length for password input.
/// 128 chars accommodates password managers and passphrases.
const MAX_PASSWORD_LENGTH: usize = 128;

/// Maximum length for email input.
const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length for the temperature input.
const MAX_TEMPERATURE_LENGTH: usize = 24;

/// Maximum length for the CSV export path.
const MAX_PATH_LENGTH: usize = 512;

/// Shown when a keystroke would make the temperature input invalid.
const NUMBER_HINT: &str = "Enter a number (e.g. 23.5 or -10)";

// ============================================================================
// UI State Types
// ============================================================================

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    LoggingIn,
    Normal,
    ShowingHistory,
    ExportingHistory,
    ChangingPassword,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

/// Which form the auth overlay shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub fn title(&self) -> &'static str {
        match self {
            AuthMode::Login => "Login",
            AuthMode::Register => "Register",
        }
    }

    pub fn toggle(&self) -> Self {
        match self {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        }
    }
}

/// Auth form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFocus {
    Username,
    Password,
    Email,
    Button,
}

impl AuthFocus {
    /// Next field; the email field only exists when registering.
    pub fn next(&self, mode: AuthMode) -> Self {
        match (self, mode) {
            (AuthFocus::Username, _) => AuthFocus::Password,
            (AuthFocus::Password, AuthMode::Register) => AuthFocus::Email,
            (AuthFocus::Password, AuthMode::Login) => AuthFocus::Button,
            (AuthFocus::Email, _) => AuthFocus::Button,
            (AuthFocus::Button, _) => AuthFocus::Username,
        }
    }

    pub fn prev(&self, mode: AuthMode) -> Self {
        match (self, mode) {
            (AuthFocus::Username, _) => AuthFocus::Button,
            (AuthFocus::Password, _) => AuthFocus::Username,
            (AuthFocus::Email, _) => AuthFocus::Password,
            (AuthFocus::Button, AuthMode::Register) => AuthFocus::Email,
            (AuthFocus::Button, AuthMode::Login) => AuthFocus::Password,
        }
    }
}

/// Change-password form focus state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordFocus {
    Current,
    New,
    Confirm,
    Button,
}

impl PasswordFocus {
    pub fn next(&self) -> Self {
        match self {
            PasswordFocus::Current => PasswordFocus::New,
            PasswordFocus::New => PasswordFocus::Confirm,
            PasswordFocus::Confirm => PasswordFocus::Button,
            PasswordFocus::Button => PasswordFocus::Current,
        }
    }

    pub fn prev(&self) -> Self {
        match self {
            PasswordFocus::Current => PasswordFocus::Button,
            PasswordFocus::New => PasswordFocus::Current,
            PasswordFocus::Confirm => PasswordFocus::New,
            PasswordFocus::Button => PasswordFocus::Confirm,
        }
    }
}

/// Main application state container
pub struct App {
    // Core services
    pub config: Config,
    config_file: Option<PathBuf>,
    pub sessions: SessionManager,
    pub histories: HistoryStore,

    /// History of the logged-in user; `None` while logged out
    pub history: Option<UserHistory>,

    pub state: AppState,

    // Auth form state
    pub auth_mode: AuthMode,
    pub auth_focus: AuthFocus,
    pub auth_username: String,
    pub auth_password: String,
    pub auth_email: String,
    pub auth_error: Option<String>,
    pub auth_notice: Option<String>,

    // Change password form state
    pub password_focus: PasswordFocus,
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
    pub password_error: Option<String>,

    // Converter
    pub conversion: Conversion,
    pub temperature_input: String,
    pub last_reading: Option<Reading>,
    pub convert_error: Option<String>,

    // History overlay
    pub history_selection: usize,
    pub export_path: String,

    // Status message
    pub status_message: Option<String>,
}

impl App {
    /// Create a new application instance
    pub fn new(config: Config) -> Result<Self> {
        let config_file = match Config::path() {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "No config location, last username will not be remembered");
                None
            }
        };
        Self::build(config, config_file)
    }

    /// `config_file` is where the last username is remembered, if anywhere.
    pub fn build(config: Config, config_file: Option<PathBuf>) -> Result<Self> {
        let (sessions, histories) = thermolog_core::open(&config)?;

        let status_message = match sessions.store().load_outcome() {
            LoadOutcome::Unreadable { backup, .. } => Some(match backup {
                Some(path) => format!("Account file was unreadable; moved to {}", path.display()),
                None => "Account file is unreadable; starting with no accounts".to_string(),
            }),
            _ => None,
        };

        let auth_username = std::env::var(USERNAME_ENV)
            .ok()
            .or_else(|| config.last_username.clone())
            .unwrap_or_default();

        let mut app = Self {
            config,
            config_file,
            sessions,
            histories,
            history: None,

            state: AppState::LoggingIn,

            auth_mode: AuthMode::Login,
            auth_focus: AuthFocus::Username,
            auth_username,
            auth_password: String::new(),
            auth_email: String::new(),
            auth_error: None,
            auth_notice: None,

            password_focus: PasswordFocus::Current,
            current_password: String::new(),
            new_password: String::new(),
            confirm_password: String::new(),
            password_error: None,

            conversion: Conversion::CelsiusToFahrenheit,
            temperature_input: String::new(),
            last_reading: None,
            convert_error: None,

            history_selection: 0,
            export_path: String::new(),

            status_message,
        };
        app.start_login();
        Ok(app)
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn current_user(&self) -> Option<&str> {
        self.sessions.current_user()
    }

    pub fn current_account(&self) -> Option<AccountInfo> {
        self.current_user().and_then(|u| self.sessions.account(u))
    }

    /// Start the login process (show auth overlay)
    pub fn start_login(&mut self) {
        self.state = AppState::LoggingIn;
        self.auth_mode = AuthMode::Login;
        self.auth_focus = if self.auth_username.is_empty() {
            AuthFocus::Username
        } else {
            AuthFocus::Password
        };
        self.auth_password.clear();
        self.auth_email.clear();
        self.auth_error = None;
    }

    pub fn toggle_auth_mode(&mut self) {
        self.auth_mode = self.auth_mode.toggle();
        self.auth_error = None;
        self.auth_notice = None;
        if self.auth_focus == AuthFocus::Email && self.auth_mode == AuthMode::Login {
            self.auth_focus = AuthFocus::Button;
        }
    }

    /// Submit the auth overlay in its current mode
    pub fn submit_auth(&mut self) {
        match self.auth_mode {
            AuthMode::Login => self.attempt_login(),
            AuthMode::Register => self.attempt_register(),
        }
    }

    /// Attempt login with the credentials from the auth form
    pub fn attempt_login(&mut self) {
        let username = self.auth_username.trim().to_string();
        if username.is_empty() || self.auth_password.is_empty() {
            self.auth_error = Some("Username and password required".to_string());
            return;
        }

        self.auth_error = None;
        self.auth_notice = None;

        match self.sessions.login(&username, &self.auth_password) {
            Ok(()) => {
                self.auth_password.clear();
                self.on_login(username);
            }
            Err(e) => {
                self.auth_password.clear();
                self.auth_error = Some(auth_error_message(&e));
            }
        }
    }

    /// Re-key everything per-user to the identity that just logged in.
    fn on_login(&mut self, username: String) {
        self.reset_user_state();
        self.history = self.histories.open_for(self.sessions.session());

        if let Some(history) = &self.history {
            if let LoadOutcome::Unreadable { backup, .. } = history.load_outcome() {
                self.status_message = Some(match backup {
                    Some(path) => format!("History was unreadable; moved to {}", path.display()),
                    None => "History is unreadable; starting empty".to_string(),
                });
            }
        }

        self.remember_username(username);
        self.state = AppState::Normal;
    }

    fn remember_username(&mut self, username: String) {
        if self.config.last_username.as_deref() == Some(username.as_str()) {
            return;
        }
        self.config.last_username = Some(username);
        if let Some(path) = &self.config_file {
            if let Err(e) = self.config.save_to(path) {
                warn!(error = %e, "Failed to save config");
            }
        }
    }

    /// Attempt registration with the auth form. Does not log in.
    pub fn attempt_register(&mut self) {
        let username = self.auth_username.trim().to_string();
        if username.is_empty() || self.auth_password.is_empty() {
            self.auth_error = Some("Username and password required".to_string());
            return;
        }

        let email = self.auth_email.trim().to_string();
        let email = (!email.is_empty()).then_some(email.as_str());

        match self.sessions.register(&username, &self.auth_password, email) {
            Ok(()) => {
                self.auth_username = username;
                self.auth_password.clear();
                self.auth_email.clear();
                self.auth_error = None;
                self.auth_notice = Some("Registration successful, please log in".to_string());
                self.auth_mode = AuthMode::Login;
                self.auth_focus = AuthFocus::Password;
            }
            Err(e) => {
                self.auth_error = Some(auth_error_message(&e));
            }
        }
    }

    /// Log out, drop the user's data and show the auth overlay again.
    pub fn logout(&mut self) {
        self.sessions.logout();
        self.reset_user_state();
        self.auth_notice = None;
        self.start_login();
    }

    fn reset_user_state(&mut self) {
        self.history = None;
        self.history_selection = 0;
        self.export_path.clear();
        self.temperature_input.clear();
        self.last_reading = None;
        self.convert_error = None;
        self.clear_password_form();
    }

    // =========================================================================
    // Change Password
    // =========================================================================

    pub fn start_change_password(&mut self) {
        self.clear_password_form();
        self.state = AppState::ChangingPassword;
    }

    fn clear_password_form(&mut self) {
        self.password_focus = PasswordFocus::Current;
        self.current_password.clear();
        self.new_password.clear();
        self.confirm_password.clear();
        self.password_error = None;
    }

    pub fn attempt_change_password(&mut self) {
        let Some(username) = self.current_user().map(str::to_string) else {
            self.start_login();
            return;
        };

        if self.new_password != self.confirm_password {
            self.password_error = Some("New passwords do not match".to_string());
            return;
        }

        match self
            .sessions
            .change_password(&username, &self.current_password, &self.new_password)
        {
            Ok(()) => {
                self.clear_password_form();
                self.status_message = Some("Password changed".to_string());
                self.state = AppState::Normal;
            }
            Err(AuthError::InvalidCredentials) => {
                self.current_password.clear();
                self.password_focus = PasswordFocus::Current;
                self.password_error = Some("Current password is incorrect".to_string());
            }
            Err(e) => {
                self.password_error = Some(auth_error_message(&e));
            }
        }
    }

    // =========================================================================
    // Converter
    // =========================================================================

    /// Append a keystroke to the temperature input if the result is still
    /// a number or a prefix of one.
    pub fn push_temperature_char(&mut self, c: char) {
        if self.temperature_input.len() >= MAX_TEMPERATURE_LENGTH {
            return;
        }
        let mut candidate = self.temperature_input.clone();
        candidate.push(c);
        if is_acceptable_partial(&candidate) {
            self.temperature_input = candidate;
            self.convert_error = None;
        } else {
            self.convert_error = Some(NUMBER_HINT.to_string());
        }
    }

    pub fn pop_temperature_char(&mut self) {
        self.temperature_input.pop();
        self.convert_error = None;
    }

    pub fn next_conversion(&mut self) {
        self.conversion = self.conversion.next();
    }

    pub fn prev_conversion(&mut self) {
        self.conversion = self.conversion.prev();
    }

    /// Convert the current input and record it in the user's history
    pub fn convert_input(&mut self) {
        let reading = match convert(self.conversion, &self.temperature_input) {
            Ok(reading) => reading,
            Err(e) => {
                self.convert_error = Some(e.to_string());
                return;
            }
        };

        self.convert_error = None;
        self.last_reading = Some(reading);

        let Some(history) = self.history.as_mut() else {
            return;
        };
        match history.record(reading.input_label(), reading.output_label()) {
            Ok(_) => self.history_selection = 0,
            Err(e) => {
                error!(error = %e, "Failed to save history");
                self.status_message = Some(format!("History not saved: {}", e));
            }
        }
    }

    // =========================================================================
    // History
    // =========================================================================

    pub fn history_len(&self) -> usize {
        self.history.as_ref().map(UserHistory::len).unwrap_or(0)
    }

    pub fn show_history(&mut self) {
        self.history_selection = 0;
        self.state = AppState::ShowingHistory;
    }

    pub fn clear_history(&mut self) {
        let Some(history) = self.history.as_mut() else {
            return;
        };
        match history.clear() {
            Ok(()) => {
                self.history_selection = 0;
                self.status_message = Some("History cleared".to_string());
            }
            Err(e) => {
                error!(error = %e, "Failed to clear history");
                self.status_message = Some(format!("History not cleared: {}", e));
            }
        }
    }

    pub fn start_export(&mut self) {
        if self.export_path.is_empty() {
            let user = self.current_user().unwrap_or("history");
            self.export_path = format!("thermolog-{}.csv", sanitize_file_stem(user));
        }
        self.state = AppState::ExportingHistory;
    }

    pub fn export_history(&mut self) {
        let Some(history) = self.history.as_ref() else {
            return;
        };
        let path = PathBuf::from(self.export_path.trim());
        match history.export_csv_to(&path) {
            Ok(()) => {
                self.status_message = Some(format!("Exported {} entries to {}", history.len(), path.display()));
                self.state = AppState::ShowingHistory;
            }
            Err(e) => {
                error!(error = %e, path = %path.display(), "Export failed");
                self.status_message = Some(format!("Export failed: {}", e));
            }
        }
    }
}

/// User-facing text for an auth failure.
fn auth_error_message(e: &AuthError) -> String {
    if e.is_persistence() {
        error!(error = %e, "Account change was not saved");
        return format!("Not saved to disk: {}", e);
    }
    match e {
        AuthError::UserNotFound(_) => "User not found".to_string(),
        AuthError::InvalidCredentials => "Invalid password".to_string(),
        other => other.to_string(),
    }
}

/// Keep only characters that are safe in a file name.
fn sanitize_file_stem(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

// ============================================================================
// Input validation helpers (exported for use in input.rs)
// ============================================================================

/// Check if a character is valid for input (no control characters)
fn is_valid_input_char(c: char) -> bool {
    !c.is_control()
}

/// Check if a username character should be accepted
pub fn can_add_username_char(current_len: usize, c: char) -> bool {
    current_len < MAX_USERNAME_LENGTH && is_valid_input_char(c)
}

/// Check if a password character should be accepted
pub fn can_add_password_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PASSWORD_LENGTH && is_valid_input_char(c)
}

/// Check if an email character should be accepted
pub fn can_add_email_char(current_len: usize, c: char) -> bool {
    current_len < MAX_EMAIL_LENGTH && is_valid_input_char(c) && !c.is_whitespace()
}

/// Check if a path character should be accepted
pub fn can_add_path_char(current_len: usize, c: char) -> bool {
    current_len < MAX_PATH_LENGTH && is_valid_input_char(c)
}

// ============================================================================
// Tests
// ============================================================================
