//! Operator command definitions

/// Commands understood by the operator console
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorCommand {
    /// Turn live mirroring on and replay the last track
    Enable,
    /// Turn live mirroring off and show the placeholder
    Disable,
    /// Report current mode and displayed text
    Status,
    /// List commands
    Help,
}

/// Errors produced while parsing a command line
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown command: {0} (type 'help')")]
    Unknown(String),
}

impl OperatorCommand {
    /// Parse a trimmed, case-insensitive command line
    ///
    /// Returns `Ok(None)` for blank lines.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let text = line.trim().to_lowercase();
        let command = match text.as_str() {
            "" => return Ok(None),
            "вкл_музыка" | "enable" => Self::Enable,
            "выкл_музыка" | "disable" => Self::Disable,
            "статус" | "status" => Self::Status,
            "help" | "помощь" => Self::Help,
            _ => return Err(CommandError::Unknown(line.trim().to_string())),
        };
        Ok(Some(command))
    }
}

pub const HELP_TEXT: &str = "commands:\n\
    вкл_музыка / enable   turn live music status on\n\
    выкл_музыка / disable  show the placeholder instead\n\
    статус / status        show current status\n\
    help                   show this message";
