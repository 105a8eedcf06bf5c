use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who produced a turn in a conversation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// A message typed by the user.
    User,

    /// A streamed answer from the assistant.
    Assistant,

    /// A system notice.
    System,
}

impl fmt::Display for TurnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnRole::User => write!(f, "user"),
            TurnRole::Assistant => write!(f, "assistant"),
            TurnRole::System => write!(f, "system"),
        }
    }
}

/// Error returned when parsing an invalid turn role string.
#[derive(Debug)]
pub struct TurnRoleParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for TurnRoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown turn role: {}", self.invalid_value)
    }
}

impl std::error::Error for TurnRoleParseError {}

impl FromStr for TurnRole {
    type Err = TurnRoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            _ => Err(TurnRoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        for role in [TurnRole::User, TurnRole::Assistant, TurnRole::System] {
            assert_eq!(role.to_string().parse::<TurnRole>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role() {
        let err = "tool".parse::<TurnRole>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown turn role: tool");
    }
}
