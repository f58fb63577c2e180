use super::{types::Config, ConfigError};

fn invalid(message: &str) -> Result<(), ConfigError> {
    Err(ConfigError::ValidationError(message.to_string()))
}

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Research limits and timeouts are positive
/// - Configured collaborators have a URL
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return invalid("server.port cannot be 0");
    }

    let research = &config.research;
    if research.max_iterations == 0 {
        return invalid("research.max_iterations must be at least 1");
    }
    if research.max_results_total == 0 {
        return invalid("research.max_results_total must be at least 1");
    }
    if research.max_urls_per_target == 0 {
        return invalid("research.max_urls_per_target must be at least 1");
    }
    if research.batch_size == 0 {
        return invalid("research.batch_size must be at least 1");
    }
    if research.per_fetch_timeout_ms == 0 {
        return invalid("research.per_fetch_timeout_ms cannot be 0");
    }
    if research.refinement_timeout_ms == 0 {
        return invalid("research.refinement_timeout_ms cannot be 0");
    }
    if research.session_timeout_ms == Some(0) {
        return invalid("research.session_timeout_ms cannot be 0, omit it to disable");
    }
    if research.rate_limit.window_ms == 0 {
        return invalid("research.rate_limit.window_ms cannot be 0");
    }
    if research.rate_limit.max_calls_per_window == 0 {
        return invalid("research.rate_limit.max_calls_per_window cannot be 0");
    }

    if let Some(search) = &config.search {
        if search.url.trim().is_empty() {
            return invalid("search.url cannot be empty");
        }
        if search.timeout_secs == 0 {
            return invalid("search.timeout_secs cannot be 0");
        }
    }
    if let Some(extractor) = &config.extractor {
        if extractor.url.trim().is_empty() {
            return invalid("extractor.url cannot be empty");
        }
        if extractor.timeout_secs == 0 {
            return invalid("extractor.timeout_secs cannot be 0");
        }
    }
    if let Some(http) = config.refiner.as_ref().and_then(|r| r.http.as_ref()) {
        if http.url.trim().is_empty() {
            return invalid("refiner.http.url cannot be empty");
        }
        if http.timeout_secs == 0 {
            return invalid("refiner.http.timeout_secs cannot be 0");
        }
    }

    Ok(())
}
