//! Configuration validation logic.

use std::collections::HashSet;

use crate::config::schema::{GatewayConfig, ParamKind};

/// Error type for configuration validation failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError(pub String);

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validation error: {}", self.0)
    }
}

/// Validate a GatewayConfig for semantic correctness.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    // 1. Pool thresholds must describe a non-empty, ordered range
    if config.rpc_pool.max_clients == 0 {
        errors.push(ValidationError(
            "rpc_pool.max_clients must be > 0".to_string(),
        ));
    }
    if config.rpc_pool.max_requests_per_client == 0 {
        errors.push(ValidationError(
            "rpc_pool.max_requests_per_client must be > 0".to_string(),
        ));
    }
    if config.rpc_pool.initial_clients > config.rpc_pool.max_clients {
        errors.push(ValidationError(format!(
            "rpc_pool.initial_clients ({}) exceeds rpc_pool.max_clients ({})",
            config.rpc_pool.initial_clients, config.rpc_pool.max_clients
        )));
    }
    if config.rpc_pool.monitor_interval_ms == 0 {
        errors.push(ValidationError(
            "rpc_pool.monitor_interval_ms must be > 0".to_string(),
        ));
    }

    // 2. Routes must be well-formed and unique per (method, path)
    let mut seen: HashSet<(String, String)> = HashSet::new();
    for route in &config.routes {
        if !route.path.starts_with('/') {
            errors.push(ValidationError(format!(
                "Route '{}' must start with '/'",
                route.path
            )));
        }
        match route.http_method.as_str() {
            "GET" | "POST" => {}
            other => errors.push(ValidationError(format!(
                "Route '{}' has unsupported type '{}'",
                route.path, other
            ))),
        }
        if !seen.insert((route.http_method.clone(), route.path.clone())) {
            errors.push(ValidationError(format!(
                "Duplicate route '{} {}'",
                route.http_method, route.path
            )));
        }

        // 3. Declared parameter patterns must compile, and only apply to strings
        for param in &route.params {
            if let Some(pattern) = &param.pattern {
                if param.kind != ParamKind::String {
                    errors.push(ValidationError(format!(
                        "Route '{}' param '{}': pattern is only valid for string parameters",
                        route.path, param.name
                    )));
                } else if let Err(err) = regex::Regex::new(pattern) {
                    errors.push(ValidationError(format!(
                        "Route '{}' param '{}': invalid pattern: {}",
                        route.path, param.name, err
                    )));
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::*;

    fn route(path: &str, method: &str) -> RouteConfig {
        RouteConfig {
            path: path.into(),
            http_method: method.into(),
            service: None,
            method: None,
            params: Vec::new(),
            description: String::new(),
        }
    }

    #[test]
    fn test_valid_config() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("/payments/authorize", "POST"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_initial_above_max() {
        let mut config = GatewayConfig::default();
        config.rpc_pool.initial_clients = 30;
        config.rpc_pool.max_clients = 10;

        let errs = validate_config(&config).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].0.contains("exceeds rpc_pool.max_clients"));
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("/a", "GET"));
        config.routes.push(route("/a", "GET"));

        let errs = validate_config(&config).unwrap_err();
        assert!(errs[0].0.contains("Duplicate route"));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let mut config = GatewayConfig::default();
        let mut r = route("/a", "GET");
        r.params.push(ParamConfig {
            name: "code".into(),
            kind: ParamKind::String,
            required: true,
            pattern: Some("[unclosed".into()),
            description: String::new(),
        });
        config.routes.push(r);

        let errs = validate_config(&config).unwrap_err();
        assert!(errs[0].0.contains("invalid pattern"));
    }
}
