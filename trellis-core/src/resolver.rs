// Argument resolution: turns a route's parameter bindings into the
// positional arguments of one invocation

use crate::binding::{Argument, Arguments, HeaderBinding, ParameterBinding, PathBinding, ValueType};
use crate::context::{PathVariables, QueryParams, percent_decode};
use crate::headers::HeaderMap;
use crate::{Error, RequestError};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Model attributes already produced for one controller during one request.
pub type AttributeCache = HashMap<String, Value>;

/// Everything a binding may read from.
#[derive(Debug, Clone, Copy)]
pub struct RequestSources<'a> {
    pub query: Option<&'a QueryParams>,
    pub path_variables: Option<&'a PathVariables>,
    pub headers: &'a HeaderMap,
    pub body: Option<&'a Value>,
    pub attributes: Option<&'a AttributeCache>,
}

/// Resolve one argument per binding; `None` slots become `Undefined`.
///
/// Fails on the first binding that cannot be satisfied: a missing required
/// header is a 400, a missing required path variable a 404.
pub fn resolve_arguments(
    params: &[Option<ParameterBinding>],
    sources: &RequestSources<'_>,
) -> Result<Arguments, Error> {
    params
        .iter()
        .map(|binding| match binding {
            Some(binding) => resolve_one(binding, sources),
            None => Ok(Argument::Undefined),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Arguments::from)
}

fn resolve_one(binding: &ParameterBinding, sources: &RequestSources<'_>) -> Result<Argument, Error> {
    match binding {
        ParameterBinding::RequestBody => Ok(sources
            .body
            .map(|body| Argument::Json(body.clone()))
            .unwrap_or_default()),

        ParameterBinding::QueryParam { name, value_type } => {
            resolve_query(name.as_deref(), *value_type, sources.query)
        }

        ParameterBinding::RequestHeader(header) => resolve_header(header, sources.headers),

        ParameterBinding::RequestHeaderMap { defaults } => {
            Ok(Argument::Headers(sources.headers.merged_over(defaults)))
        }

        ParameterBinding::PathVariable(path) => resolve_path_variable(path, sources.path_variables),

        ParameterBinding::ModelAttribute { attribute_name } => Ok(sources
            .attributes
            .and_then(|cache| cache.get(attribute_name))
            .map(|value| Argument::Json(value.clone()))
            .unwrap_or_default()),
    }
}

fn resolve_query(
    name: Option<&str>,
    value_type: ValueType,
    query: Option<&QueryParams>,
) -> Result<Argument, Error> {
    let Some(name) = name else {
        if value_type.is_scalar() {
            return Err(Error::InvalidBinding(format!(
                "unnamed query parameter cannot be coerced to {:?}",
                value_type
            )));
        }
        return Ok(query
            .map(|q| {
                let object: Map<String, Value> = q
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                    .collect();
                Argument::Json(Value::Object(object))
            })
            .unwrap_or_default());
    };

    match query.and_then(|q| q.get(name)) {
        Some(raw) => coerce(raw, value_type, || format!("query parameter {}", name)),
        None => Ok(Argument::Undefined),
    }
}

fn resolve_header(header: &HeaderBinding, headers: &HeaderMap) -> Result<Argument, Error> {
    match headers.get(&header.name) {
        Some(raw) => {
            let value = if header.decode {
                percent_decode(raw)
            } else {
                raw.to_string()
            };
            coerce(&value, header.value_type, || format!("header {}", header.name))
        }
        None if header.required => {
            Err(RequestError::bad_request(format!("Header missing: {}", header.name)).into())
        }
        None => Ok(header.default.clone()),
    }
}

fn resolve_path_variable(
    path: &PathBinding,
    variables: Option<&PathVariables>,
) -> Result<Argument, Error> {
    match variables.and_then(|v| v.get(&path.name)) {
        Some(raw) if !raw.is_empty() => Ok(Argument::Text(if path.decode {
            percent_decode(raw)
        } else {
            raw.clone()
        })),
        _ if path.required => {
            Err(RequestError::not_found(format!("Path variable missing: {}", path.name)).into())
        }
        _ => Ok(path.default.clone()),
    }
}

/// Coerce a raw string. Numeric coercions never fail: unparseable input is
/// NaN. A malformed JSON document is the caller's fault.
pub fn coerce(
    raw: &str,
    value_type: ValueType,
    source: impl FnOnce() -> String,
) -> Result<Argument, Error> {
    match value_type {
        ValueType::String | ValueType::RawObject => Ok(Argument::Text(raw.to_string())),
        ValueType::Integer => Ok(parse_integer(raw)),
        ValueType::Number => Ok(Argument::Number(parse_number(raw))),
        ValueType::Json => serde_json::from_str(raw).map(Argument::Json).map_err(|e| {
            RequestError::bad_request(format!("Invalid JSON in {}: {}", source(), e)).into()
        }),
    }
}

/// Base-10 integer from the leading digits of `raw`, after optional
/// whitespace and sign. `Number(NaN)` when there are none.
pub fn parse_integer(raw: &str) -> Argument {
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['+', '-']));
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(u8::is_ascii_digit)
        .count();
    if digits == 0 {
        return Argument::Number(f64::NAN);
    }

    let literal = &trimmed[..sign_len + digits];
    match literal.parse::<i64>() {
        Ok(n) => Argument::Integer(n),
        // Out of i64 range
        Err(_) => Argument::Number(literal.parse::<f64>().unwrap_or(f64::NAN)),
    }
}

/// Longest leading decimal literal of `raw`, or NaN.
pub fn parse_number(raw: &str) -> f64 {
    let trimmed = raw.trim_start();
    let bytes = trimmed.as_bytes();
    let digits_from = |start: usize| {
        bytes[start.min(bytes.len())..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let mut end = usize::from(trimmed.starts_with(['+', '-']));
    let int_digits = digits_from(end);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits_from(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    trimmed[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sources<'a>(headers: &'a HeaderMap) -> RequestSources<'a> {
        RequestSources {
            query: None,
            path_variables: None,
            headers,
            body: None,
            attributes: None,
        }
    }

    fn bound(binding: impl Into<ParameterBinding>) -> Option<ParameterBinding> {
        Some(binding.into())
    }

    fn query(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_unbound_slot_is_undefined() {
        let headers = HeaderMap::new();
        let args = resolve_arguments(&[None, None], &sources(&headers)).unwrap();
        assert_eq!(args.len(), 2);
        assert!(args.get(0).is_undefined());
    }

    #[test]
    fn test_body_verbatim() {
        let headers = HeaderMap::new();
        let body = json!({ "name": "ada" });
        let mut src = sources(&headers);
        src.body = Some(&body);
        let args = resolve_arguments(&[Some(ParameterBinding::body())], &src).unwrap();
        assert_eq!(args.get(0).as_json(), Some(&body));
    }

    #[test]
    fn test_query_coercions() {
        let headers = HeaderMap::new();
        let q = query(&[("page", "3"), ("ratio", "0.25"), ("bad", "abc"), ("f", "{\"a\":1}")]);
        let mut src = sources(&headers);
        src.query = Some(&q);

        let params = vec![
            Some(ParameterBinding::query("page", ValueType::Integer)),
            Some(ParameterBinding::query("ratio", ValueType::Number)),
            Some(ParameterBinding::query("bad", ValueType::Integer)),
            Some(ParameterBinding::query("f", ValueType::Json)),
            Some(ParameterBinding::query("missing", ValueType::String)),
            Some(ParameterBinding::query("page", ValueType::String)),
        ];
        let args = resolve_arguments(&params, &src).unwrap();
        assert_eq!(args.get(0), &Argument::Integer(3));
        assert_eq!(args.get(1), &Argument::Number(0.25));
        assert!(args.get(2).is_nan());
        assert_eq!(args.get(3).as_json(), Some(&json!({ "a": 1 })));
        assert!(args.get(4).is_undefined());
        assert_eq!(args.get(5).as_str(), Some("3"));
    }

    #[test]
    fn test_query_object() {
        let headers = HeaderMap::new();
        let q = query(&[("a", "1"), ("b", "two")]);
        let mut src = sources(&headers);
        src.query = Some(&q);
        let args = resolve_arguments(&[Some(ParameterBinding::query_object())], &src).unwrap();
        assert_eq!(args.get(0).as_json(), Some(&json!({ "a": "1", "b": "two" })));

        let none = resolve_arguments(&[Some(ParameterBinding::query_object())], &sources(&headers))
            .unwrap();
        assert!(none.get(0).is_undefined());
    }

    #[test]
    fn test_unnamed_scalar_query_fails() {
        let headers = HeaderMap::new();
        let bad = ParameterBinding::QueryParam {
            name: None,
            value_type: ValueType::String,
        };
        let err = resolve_arguments(&[Some(bad)], &sources(&headers)).unwrap_err();
        assert!(matches!(err, Error::InvalidBinding(_)));
    }

    #[test]
    fn test_invalid_json_query_is_bad_request() {
        let headers = HeaderMap::new();
        let q = query(&[("filter", "{nope")]);
        let mut src = sources(&headers);
        src.query = Some(&q);
        let err = resolve_arguments(&[Some(ParameterBinding::query("filter", ValueType::Json))], &src)
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_required_header_missing() {
        let headers = HeaderMap::new();
        let err = resolve_arguments(
            &[bound(ParameterBinding::header("Authorization"))],
            &sources(&headers),
        )
        .unwrap_err();
        match err {
            Error::Request(e) => {
                assert_eq!(e.status, 400);
                assert_eq!(e.message(), Some("Header missing: Authorization"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_lookup_decode_and_default() {
        let headers: HeaderMap = [
            ("x-user", "Ada%20Lovelace"),
            ("X-Count", "7"),
            ("x-count", "8"),
        ]
        .into_iter()
        .collect();
        let params = vec![
            bound(ParameterBinding::header("X-User").decoded()),
            bound(ParameterBinding::header("X-User")),
            bound(ParameterBinding::header("x-count").typed(ValueType::Integer)),
            bound(ParameterBinding::header("Accept-Language").default_value("en")),
            bound(ParameterBinding::header("X-Trace").optional()),
        ];
        let args = resolve_arguments(&params, &sources(&headers)).unwrap();
        assert_eq!(args.get(0).as_str(), Some("Ada Lovelace"));
        assert_eq!(args.get(1).as_str(), Some("Ada%20Lovelace"));
        assert_eq!(args.get(2), &Argument::Integer(7));
        assert_eq!(args.get(3).as_str(), Some("en"));
        assert!(args.get(4).is_undefined());
    }

    #[test]
    fn test_header_map_merges_defaults() {
        let defaults: HeaderMap = [("Accept", "*/*"), ("X-Client", "unknown")]
            .into_iter()
            .collect();
        let live: HeaderMap = [("x-client", "cli")].into_iter().collect();
        let args = resolve_arguments(
            &[Some(ParameterBinding::header_map_with(defaults.clone()))],
            &sources(&live),
        )
        .unwrap();
        let merged = args.get(0).as_headers().unwrap();
        assert_eq!(merged.get("x-client"), Some("cli"));
        assert_eq!(merged.get("accept"), Some("*/*"));

        let empty = HeaderMap::new();
        let args = resolve_arguments(&[Some(ParameterBinding::header_map())], &sources(&empty))
            .unwrap();
        assert!(args.get(0).as_headers().unwrap().is_empty());
    }

    #[test]
    fn test_path_variables() {
        let headers = HeaderMap::new();
        let vars: PathVariables = [
            ("param".to_string(), "something".to_string()),
            ("name".to_string(), "a%2Fb".to_string()),
            ("blank".to_string(), String::new()),
        ]
        .into_iter()
        .collect();
        let mut src = sources(&headers);
        src.path_variables = Some(&vars);

        let params = vec![
            bound(ParameterBinding::path("param")),
            bound(ParameterBinding::path("name").decoded()),
            bound(ParameterBinding::path("blank").default_value("fallback")),
        ];
        let args = resolve_arguments(&params, &src).unwrap();
        assert_eq!(args.get(0).as_str(), Some("something"));
        assert_eq!(args.get(1).as_str(), Some("a/b"));
        assert_eq!(args.get(2).as_str(), Some("fallback"));

        let err = resolve_arguments(&[bound(ParameterBinding::path("blank"))], &src)
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
        let err = resolve_arguments(&[bound(ParameterBinding::path("id"))], &sources(&headers))
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[test]
    fn test_model_attribute_from_cache() {
        let headers = HeaderMap::new();
        let mut cache = AttributeCache::new();
        cache.insert("user".into(), json!({ "id": 1 }));
        let mut src = sources(&headers);
        src.attributes = Some(&cache);
        let args = resolve_arguments(
            &[
                Some(ParameterBinding::model_attribute("user")),
                Some(ParameterBinding::model_attribute("tenant")),
            ],
            &src,
        )
        .unwrap();
        assert_eq!(args.get(0).as_json(), Some(&json!({ "id": 1 })));
        assert!(args.get(1).is_undefined());
    }

    #[test]
    fn test_parse_integer_prefix() {
        assert_eq!(parse_integer("42"), Argument::Integer(42));
        assert_eq!(parse_integer("  -17px"), Argument::Integer(-17));
        assert_eq!(parse_integer("3.9"), Argument::Integer(3));
        assert!(parse_integer("").is_nan());
        assert!(parse_integer("-").is_nan());
        assert!(parse_integer("x1").is_nan());
        assert_eq!(parse_integer("99999999999999999999"), Argument::Number(1e20));
    }

    #[test]
    fn test_parse_number_long_input() {
        let mut raw = "9".repeat(50_000);
        raw.push_str("-1-1-1-1");
        raw.push_str(&"e".repeat(50_000));
        assert_eq!(parse_number(&raw), f64::INFINITY);
        assert_eq!(parse_number(&format!("{}x", "1".repeat(10))), 1_111_111_111.0);
    }

    #[test]
    fn test_parse_number_prefix() {
        assert_eq!(parse_number("1.5"), 1.5);
        assert_eq!(parse_number("2e3kg"), 2000.0);
        assert_eq!(parse_number("-.5"), -0.5);
        assert_eq!(parse_number("7e"), 7.0);
        assert!(parse_number("abc").is_nan());
        assert!(parse_number("inf").is_nan());
        assert_eq!(parse_number("1.5.5"), 1.5);
        assert_eq!(parse_number("5."), 5.0);
        assert_eq!(parse_number("1e+"), 1.0);
        assert_eq!(parse_number("  -2.5E-1x"), -0.25);
        assert!(parse_number("+").is_nan());
        assert!(parse_number(".e5").is_nan());
    }
}
