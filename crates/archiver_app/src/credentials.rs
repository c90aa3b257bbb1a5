use archiver_core::ConfigError;
use inquire::{InquireError, Password, Text};

use crate::config::ArchiverConfig;

/// Interactive input for the parts of the credential triple left empty.
pub trait Prompter {
    fn text(&self, message: &str, help: &str) -> Result<String, ConfigError>;
    fn password(&self, message: &str) -> Result<String, ConfigError>;
}

pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn text(&self, message: &str, help: &str) -> Result<String, ConfigError> {
        Text::new(message)
            .with_help_message(help)
            .prompt()
            .map_err(|err| prompt_failed(message, err))
    }

    fn password(&self, message: &str) -> Result<String, ConfigError> {
        Password::new(message)
            .without_confirmation()
            .prompt()
            .map_err(|err| prompt_failed(message, err))
    }
}

fn prompt_failed(message: &str, err: InquireError) -> ConfigError {
    let what = message.trim_end_matches(':').to_lowercase();
    match err {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            ConfigError::Missing(format!("{what} (prompt cancelled)"))
        }
        other => ConfigError::Missing(format!("{what} ({other})")),
    }
}

/// Asks for the server, then the user, then the password, skipping whatever
/// is already set. An empty user means anonymous access and no password.
pub fn complete_credentials(
    config: &mut ArchiverConfig,
    prompter: &dyn Prompter,
) -> Result<(), ConfigError> {
    if config.server.trim().is_empty() {
        config.server = prompter
            .text("Server:", "e.g. https://trac.example.org")?
            .trim()
            .to_string();
        if config.server.is_empty() {
            return Err(ConfigError::Missing("server url".to_string()));
        }
    }
    if config.user.is_empty() {
        config.user = prompter
            .text("User:", "leave empty for anonymous access")?
            .trim()
            .to_string();
    }
    if !config.user.is_empty() && config.password.is_empty() {
        config.password = prompter.password("Password:")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use super::*;

    struct Scripted {
        answers: RefCell<VecDeque<Option<&'static str>>>,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answers: &[Option<&'static str>]) -> Self {
            Self {
                answers: RefCell::new(answers.iter().copied().collect()),
                asked: RefCell::new(Vec::new()),
            }
        }

        fn next(&self, message: &str) -> Result<String, ConfigError> {
            self.asked.borrow_mut().push(message.to_string());
            match self.answers.borrow_mut().pop_front().flatten() {
                Some(answer) => Ok(answer.to_string()),
                None => Err(ConfigError::Missing("cancelled".to_string())),
            }
        }
    }

    impl Prompter for Scripted {
        fn text(&self, message: &str, _help: &str) -> Result<String, ConfigError> {
            self.next(message)
        }

        fn password(&self, message: &str) -> Result<String, ConfigError> {
            self.next(message)
        }
    }

    #[test]
    fn prompts_only_for_missing_parts() {
        let mut config = ArchiverConfig {
            server: "http://h".to_string(),
            user: "alice".to_string(),
            ..ArchiverConfig::default()
        };
        let prompter = Scripted::new(&[Some("secret")]);
        complete_credentials(&mut config, &prompter).unwrap();
        assert_eq!(config.password, "secret");
        assert_eq!(*prompter.asked.borrow(), vec!["Password:".to_string()]);
    }

    #[test]
    fn empty_user_skips_the_password() {
        let mut config = ArchiverConfig::default();
        let prompter = Scripted::new(&[Some(" http://h "), Some("")]);
        complete_credentials(&mut config, &prompter).unwrap();
        assert_eq!(config.server, "http://h");
        assert!(config.user.is_empty());
        assert_eq!(prompter.asked.borrow().len(), 2);
    }

    #[test]
    fn nothing_is_asked_when_complete() {
        let mut config = ArchiverConfig {
            server: "http://h".to_string(),
            user: "alice".to_string(),
            password: "pw".to_string(),
            ..ArchiverConfig::default()
        };
        let prompter = Scripted::new(&[]);
        complete_credentials(&mut config, &prompter).unwrap();
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn cancelled_prompt_is_a_config_error() {
        let mut config = ArchiverConfig::default();
        let prompter = Scripted::new(&[None]);
        assert!(matches!(
            complete_credentials(&mut config, &prompter),
            Err(ConfigError::Missing(_))
        ));
    }

    #[test]
    fn blank_server_answer_is_rejected() {
        let mut config = ArchiverConfig::default();
        let prompter = Scripted::new(&[Some("  ")]);
        assert!(matches!(
            complete_credentials(&mut config, &prompter),
            Err(ConfigError::Missing(_))
        ));
    }
}
