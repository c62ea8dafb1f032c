use crate::api::ConsoleError;
use crate::flag_definitions::{FlagType, FlagValue};

/// The state of an editable value control before coercion. Boolean-typed
/// flags are edited through a toggle, everything else through free text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawInput {
    Toggle(bool),
    Text(String),
}

impl Default for RawInput {
    fn default() -> Self {
        RawInput::Text(String::new())
    }
}

impl From<bool> for RawInput {
    fn from(value: bool) -> Self {
        RawInput::Toggle(value)
    }
}

impl From<&str> for RawInput {
    fn from(value: &str) -> Self {
        RawInput::Text(value.to_string())
    }
}

impl From<String> for RawInput {
    fn from(value: String) -> Self {
        RawInput::Text(value)
    }
}

/// Converts a raw control state into the canonical typed value for the
/// declared flag type. Pure; applied at every write boundary so persisted
/// values always match the declared type exactly.
///
/// Number parsing rejects anything `f64` cannot represent in a JSON document,
/// so `"NaN"` and `"inf"` fail the same way `"abc"` does.
pub fn coerce(raw: &RawInput, flag_type: FlagType) -> Result<FlagValue, ConsoleError> {
    match (flag_type, raw) {
        (FlagType::Boolean, RawInput::Toggle(state)) => Ok(FlagValue::Boolean(*state)),
        (FlagType::Boolean, RawInput::Text(_)) => {
            Err(ConsoleError::TypeMismatch { expected: FlagType::Boolean })
        }

        (FlagType::Number, RawInput::Text(text)) => {
            let parsed = text
                .trim()
                .parse::<f64>()
                .map_err(|_| ConsoleError::InvalidNumber(text.clone()))?;
            if !parsed.is_finite() {
                return Err(ConsoleError::InvalidNumber(text.clone()));
            }
            Ok(FlagValue::Number(parsed))
        }
        (FlagType::Number, RawInput::Toggle(_)) => {
            Err(ConsoleError::TypeMismatch { expected: FlagType::Number })
        }

        (FlagType::String, RawInput::Text(text)) => Ok(FlagValue::String(text.clone())),
        (FlagType::String, RawInput::Toggle(_)) => {
            Err(ConsoleError::TypeMismatch { expected: FlagType::String })
        }
    }
}
