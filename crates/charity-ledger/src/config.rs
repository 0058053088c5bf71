use serde::{Deserialize, Serialize};

/// Configuration for an [`InMemoryProgramLedger`](crate::memory::InMemoryProgramLedger).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Maximum length in bytes of a program's title, description, and image
    /// reference.
    pub max_text_len: usize,
    /// Capacity of each event subscriber's broadcast channel.
    pub event_capacity: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_text_len: 4096,
            event_capacity: 1024,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = LedgerConfig::default();
        assert_eq!(c.max_text_len, 4096);
        assert_eq!(c.event_capacity, 1024);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let c: LedgerConfig = serde_json::from_str(r#"{"max_text_len": 64}"#).unwrap();
        assert_eq!(c.max_text_len, 64);
        assert_eq!(c.event_capacity, 1024);
    }
}
