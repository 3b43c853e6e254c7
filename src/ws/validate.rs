//! Inbound message checks applied before anything reaches a session

use thiserror::Error;

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 16;
pub const CHAT_MAX_LEN: usize = 200;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("player name must be 3-16 letters, digits, spaces, '_' or '-'")]
    PlayerName,

    #[error("angle must be within 0-180 degrees, got {0}")]
    Angle(f32),

    #[error("power must be within 0-100, got {0}")]
    Power(f32),

    #[error("chat message must be 1-200 characters")]
    Chat,

    #[error("malformed message: {0}")]
    Malformed(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::PlayerName => "INVALID_PLAYER_NAME",
            ValidationError::Angle(_) | ValidationError::Power(_) => "INVALID_ACTION",
            ValidationError::Chat | ValidationError::Malformed(_) => "INVALID_MESSAGE",
        }
    }
}

/// Trimmed, validated display name
pub fn player_name(raw: &str) -> Result<String, ValidationError> {
    let name = raw.trim();
    let len = name.chars().count();
    let allowed = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '_' | '-'));

    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) || !allowed {
        return Err(ValidationError::PlayerName);
    }
    Ok(name.to_string())
}

pub fn shot(angle: f32, power: f32) -> Result<(), ValidationError> {
    if !angle.is_finite() || !(0.0..=180.0).contains(&angle) {
        return Err(ValidationError::Angle(angle));
    }
    if !power.is_finite() || !(0.0..=100.0).contains(&power) {
        return Err(ValidationError::Power(power));
    }
    Ok(())
}

/// Trimmed chat line
pub fn chat(raw: &str) -> Result<String, ValidationError> {
    let message = raw.trim();
    let len = message.chars().count();
    if len == 0 || len > CHAT_MAX_LEN {
        return Err(ValidationError::Chat);
    }
    Ok(message.to_string())
}
