// Each test binary uses a different subset of the helpers
#![allow(dead_code)]

pub mod fixtures;
pub mod scripted_provider;
pub mod wiremock_helpers;

use sitefinder::config::HttpConfig;

/// HTTP settings for tests: short timeout so timeout cases stay fast
pub fn test_http_config() -> HttpConfig {
    HttpConfig {
        user_agent: "sitefinder-tests/1.0".to_string(),
        request_timeout_secs: 1,
    }
}
