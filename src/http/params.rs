//! Route parameter validation and extraction.
//!
//! # Responsibilities
//! - Bind the request body (POST) into the argument map
//! - Overlay query and path parameters by declared name
//! - Coerce declared types and enforce regex patterns
//! - Drop arguments the route does not declare
//!
//! # Design Decisions
//! - Query parameters take precedence over path parameters, which take
//!   precedence over body fields
//! - Validation failures never reach the RPC pool

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use thiserror::Error;

use crate::config::{ParamConfig, ParamKind, RouteConfig};

/// A request argument failed the route's declared schema.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ParamError(pub String);

/// Validate the request against the route schema and build the RPC
/// argument map.
pub fn extract_args(
    route: &RouteConfig,
    path_params: &HashMap<String, String>,
    query: &HashMap<String, String>,
    body: &[u8],
) -> Result<HashMap<String, Value>, ParamError> {
    let mut args: HashMap<String, Value> = HashMap::new();

    if matches!(route.http_method.as_str(), "POST" | "PUT") && !body.is_empty() {
        args = serde_json::from_slice(body)
            .map_err(|err| ParamError(format!("Error parsing request body: {err}")))?;
    }

    let mut allowed: HashSet<&str> = HashSet::new();
    for param in &route.params {
        allowed.insert(param.name.as_str());

        // Query beats path beats body.
        if let Some(value) = query.get(&param.name) {
            args.insert(param.name.clone(), Value::String(value.clone()));
        } else if let Some(value) = path_params.get(&param.name) {
            args.insert(param.name.clone(), Value::String(value.clone()));
        }

        if param.required && !args.contains_key(&param.name) {
            return Err(ParamError(format!(
                "missing required parameter: {} - {}",
                param.name,
                describe(param)
            )));
        }

        if let Some(value) = args.remove(&param.name) {
            let coerced = coerce(param, value)?;
            args.insert(param.name.clone(), coerced);
        }
    }

    // Arguments the route does not declare are dropped, not forwarded.
    args.retain(|name, _| allowed.contains(name.as_str()));

    Ok(args)
}

fn coerce(param: &ParamConfig, value: Value) -> Result<Value, ParamError> {
    match param.kind {
        ParamKind::String => {
            let text = match value {
                Value::String(text) => text,
                _ => {
                    return Err(ParamError(format!(
                        "unable to parse parameter {}: - {}",
                        param.name,
                        describe(param)
                    )))
                }
            };
            if let Some(pattern) = &param.pattern {
                let matched = regex::Regex::new(pattern)
                    .map(|re| re.is_match(&text))
                    .unwrap_or(false);
                if !matched {
                    return Err(ParamError(format!(
                        "invalid parameter value for {}: does not match pattern {} - {}",
                        param.name,
                        pattern,
                        describe(param)
                    )));
                }
            }
            Ok(Value::String(text))
        }
        ParamKind::Integer => to_integer(&value).map(Value::from).ok_or_else(|| {
            ParamError(format!(
                "invalid parameter type for {}: expected int - {}",
                param.name,
                describe(param)
            ))
        }),
        ParamKind::Number => to_number(&value).map(Value::from).ok_or_else(|| {
            ParamError(format!(
                "invalid parameter type for {}: expected float - {}",
                param.name,
                describe(param)
            ))
        }),
        ParamKind::Boolean => to_boolean(&value).map(Value::from).ok_or_else(|| {
            ParamError(format!(
                "invalid parameter type for {}: expected bool - {}",
                param.name,
                describe(param)
            ))
        }),
    }
}

fn to_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|f| f as i64)),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

fn to_boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// Auto-generate a parameter description when none is configured.
fn describe(param: &ParamConfig) -> String {
    let kind = format!("{:?}", param.kind).to_lowercase();
    let mut description = format!("{} ({})", param.name, kind);
    if param.required {
        description.push_str(", required");
    }
    if let Some(pattern) = &param.pattern {
        description.push_str(&format!(", pattern: {pattern}"));
    }
    description
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteConfig;

    fn route_with(params: Vec<ParamConfig>, http_method: &str) -> RouteConfig {
        RouteConfig {
            path: "/pay".into(),
            http_method: http_method.into(),
            service: None,
            method: None,
            params,
            description: String::new(),
        }
    }

    fn param(name: &str, kind: ParamKind, required: bool) -> ParamConfig {
        ParamConfig {
            name: name.into(),
            kind,
            required,
            pattern: None,
            description: String::new(),
        }
    }

    #[test]
    fn query_beats_path_beats_body() {
        let route = route_with(vec![param("id", ParamKind::String, true)], "POST");
        let mut query = HashMap::new();
        query.insert("id".to_string(), "from-query".to_string());
        let mut path = HashMap::new();
        path.insert("id".to_string(), "from-path".to_string());

        let args =
            extract_args(&route, &path, &query, br#"{"id": "from-body"}"#).unwrap();
        assert_eq!(args["id"], Value::String("from-query".into()));

        let args = extract_args(&route, &path, &HashMap::new(), b"").unwrap();
        assert_eq!(args["id"], Value::String("from-path".into()));
    }

    #[test]
    fn missing_required_parameter_rejected() {
        let route = route_with(vec![param("id", ParamKind::String, true)], "GET");
        let err = extract_args(&route, &HashMap::new(), &HashMap::new(), b"").unwrap_err();
        assert!(err.0.contains("missing required parameter: id"));
    }

    #[test]
    fn integer_coercion_from_string_and_number() {
        let route = route_with(vec![param("count", ParamKind::Integer, true)], "POST");

        let mut query = HashMap::new();
        query.insert("count".to_string(), "7".to_string());
        let args = extract_args(&route, &HashMap::new(), &query, b"").unwrap();
        assert_eq!(args["count"], Value::from(7));

        let args =
            extract_args(&route, &HashMap::new(), &HashMap::new(), br#"{"count": 7.0}"#).unwrap();
        assert_eq!(args["count"], Value::from(7));
    }

    #[test]
    fn pattern_mismatch_rejected() {
        let mut p = param("code", ParamKind::String, true);
        p.pattern = Some("^[A-Z]{3}$".into());
        let route = route_with(vec![p], "GET");

        let mut query = HashMap::new();
        query.insert("code".to_string(), "usd".to_string());
        let err = extract_args(&route, &HashMap::new(), &query, b"").unwrap_err();
        assert!(err.0.contains("does not match pattern"));

        query.insert("code".to_string(), "USD".to_string());
        assert!(extract_args(&route, &HashMap::new(), &query, b"").is_ok());
    }

    #[test]
    fn undeclared_arguments_dropped() {
        let route = route_with(vec![param("id", ParamKind::String, false)], "POST");
        let args = extract_args(
            &route,
            &HashMap::new(),
            &HashMap::new(),
            br#"{"id": "x", "extra": "y"}"#,
        )
        .unwrap();
        assert!(args.contains_key("id"));
        assert!(!args.contains_key("extra"));
    }

    #[test]
    fn malformed_body_rejected() {
        let route = route_with(vec![], "POST");
        let err =
            extract_args(&route, &HashMap::new(), &HashMap::new(), b"not json").unwrap_err();
        assert!(err.0.contains("Error parsing request body"));
    }
}
