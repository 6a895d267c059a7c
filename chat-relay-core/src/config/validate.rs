//! Configuration validation rules.

use super::schema::Config;

/// Validate configuration and return aggregated validation errors.
pub fn validate_config(config: &Config) -> crate::Result<()> {
    let mut errors = Vec::new();
    let relay = &config.relay;

    if relay.debounce_ms == 0 {
        errors.push("relay.debounce_ms must be > 0".to_string());
    }
    if relay.max_batch_size == 0 {
        errors.push("relay.max_batch_size must be >= 1".to_string());
    }
    if relay.intake_capacity == 0 {
        errors.push("relay.intake_capacity must be > 0".to_string());
    }
    if relay.history_capacity == 0 {
        errors.push("relay.history_capacity must be > 0".to_string());
    }
    if relay.history_window == 0 || relay.history_window > relay.history_capacity {
        errors.push("relay.history_window must be in [1, relay.history_capacity]".to_string());
    }

    let url = config.responder.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        errors.push("responder.url must be an http(s) URL".to_string());
    }

    if config.channels.whatsapp.enabled && config.channels.whatsapp.bridge_url.trim().is_empty() {
        errors
            .push("channels.whatsapp.bridge_url is required when whatsapp is enabled".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(crate::Error::Validation(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_defaults() {
        validate_config(&Config::default()).unwrap();
    }

    #[test]
    fn test_validate_window_within_capacity() {
        let mut config = Config::default();
        config.relay.history_window = 60;

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("relay.history_window"));
    }

    #[test]
    fn test_validate_aggregates_errors() {
        let mut config = Config::default();
        config.relay.max_batch_size = 0;
        config.responder.url = "localhost:5001/chat".to_string();

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("relay.max_batch_size"));
        assert!(err.contains("responder.url"));
    }

    #[test]
    fn test_validate_enabled_whatsapp_requires_bridge() {
        let mut config = Config::default();
        config.channels.whatsapp.enabled = true;
        config.channels.whatsapp.bridge_url = " ".to_string();

        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("channels.whatsapp.bridge_url"));
    }
}
