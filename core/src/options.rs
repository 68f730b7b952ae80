use serde::{Deserialize, Serialize};

/// Default sampling temperature forwarded to the provider when the caller
/// does not supply one.
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// Free-form tuning knobs attached to an enhancement request.
///
/// Every field is optional; unset fields resolve to a neutral default when
/// the instruction text is built. The bag is forwarded verbatim from the
/// controller to the relay, so unknown values pass through without
/// validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnhanceOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

impl EnhanceOptions {
    /// Options pre-filled the way a fresh editing session starts out.
    pub fn for_new_session() -> Self {
        Self {
            tone: Some("neutral".to_string()),
            length: Some("concise".to_string()),
            audience: Some("general".to_string()),
            platform: Some("any".to_string()),
            temperature: Some(DEFAULT_TEMPERATURE),
            extra: None,
        }
    }

    pub fn tone(&self) -> &str {
        self.tone.as_deref().unwrap_or("default")
    }

    pub fn length(&self) -> &str {
        self.length.as_deref().unwrap_or("concise")
    }

    pub fn audience(&self) -> &str {
        self.audience.as_deref().unwrap_or("general")
    }

    pub fn platform(&self) -> &str {
        self.platform.as_deref().unwrap_or("any")
    }

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }
}
