//! Binding request data to method arguments.

use http::HeaderMap;
use serde_json::{Map, Value};
use std::collections::HashMap;

use apiary_contract::{MethodConfig, ParameterConfig, ParameterKind, ParameterLocation};
use apiary_core::{Identity, InjectedKind, ScalarKind, ServiceFault};
use apiary_router::Params;

/// Request data available to the binder.
#[derive(Debug, Clone, Copy)]
pub struct BindingInput<'r> {
    /// Path placeholder values, percent-decoded.
    pub params: &'r Params,
    /// Raw query string.
    pub query: Option<&'r str>,
    /// Body bytes.
    pub body: &'r [u8],
    /// Request headers.
    pub headers: &'r HeaderMap,
    /// Authenticated caller.
    pub identity: Option<&'r Identity>,
}

/// Binds every parameter of `method`, in declaration order.
///
/// Fails with a `400` fault naming the first parameter the request does not
/// satisfy.
pub fn bind_arguments(
    method: &MethodConfig,
    input: &BindingInput<'_>,
) -> Result<Vec<Value>, ServiceFault> {
    let query = parse_query(input.query)?;
    let mut body = LazyBody::new(input.body);
    method
        .parameters
        .iter()
        .map(|param| bind_one(param, input, &query, &mut body))
        .collect()
}

fn bind_one(
    param: &ParameterConfig,
    input: &BindingInput<'_>,
    query: &HashMap<String, Vec<String>>,
    body: &mut LazyBody<'_>,
) -> Result<Value, ServiceFault> {
    let name = param.name.as_deref().unwrap_or("body");
    let value = match (&param.kind, param.location) {
        (ParameterKind::Injected { injected }, _) => return Ok(inject(*injected, input)),
        (ParameterKind::Scalar { scalar, repeated }, ParameterLocation::Path) => {
            let raw = input.params.get(name).ok_or_else(|| missing(name))?;
            if *repeated {
                let values = raw
                    .split(',')
                    .map(|part| scalar.coerce(part).map_err(|e| invalid(name, &e)))
                    .collect::<Result<Vec<_>, _>>()?;
                Value::Array(values)
            } else {
                scalar.coerce(raw).map_err(|e| invalid(name, &e))?
            }
        }
        (ParameterKind::Scalar { scalar, repeated }, _) => {
            let value = match query.get(name) {
                Some(raw) => Some(from_query(scalar, *repeated, raw).map_err(|e| invalid(name, &e))?),
                None => match body.field(name)? {
                    Some(v) if !v.is_null() => {
                        Some(from_json(scalar, *repeated, v).map_err(|e| invalid(name, &e))?)
                    }
                    _ => None,
                },
            };
            match value {
                Some(value) => value,
                None => absent(param, name)?,
            }
        }
        (ParameterKind::Resource, _) => match body.whole()? {
            Some(value) if !value.is_null() => value,
            _ => absent(param, name)?,
        },
        (ParameterKind::Unresolved, _) => return Ok(Value::Null),
    };
    transform(param, value).map_err(|e| invalid(name, &e))
}

fn absent(param: &ParameterConfig, name: &str) -> Result<Value, ServiceFault> {
    if let Some(default) = &param.default_value {
        Ok(default.clone())
    } else if param.nullable {
        Ok(Value::Null)
    } else {
        Err(missing(name))
    }
}

fn from_query(scalar: &ScalarKind, repeated: bool, raw: &[String]) -> Result<Value, String> {
    if repeated {
        raw.iter()
            .map(|r| scalar.coerce(r))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array)
    } else {
        // The last occurrence wins for single-valued parameters.
        let last = raw.last().map_or("", String::as_str);
        scalar.coerce(last)
    }
}

fn from_json(scalar: &ScalarKind, repeated: bool, value: Value) -> Result<Value, String> {
    match (repeated, value) {
        (true, Value::Array(items)) => items
            .into_iter()
            .map(|item| scalar.accept(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (true, single) => scalar.accept(single).map(|v| Value::Array(vec![v])),
        (false, value) => scalar.accept(value),
    }
}

fn transform(param: &ParameterConfig, value: Value) -> Result<Value, String> {
    let chain = &param.transformers;
    if chain.is_empty() || value.is_null() {
        return Ok(value);
    }
    match (&param.kind, value) {
        (ParameterKind::Scalar { repeated: true, .. }, Value::Array(items)) => items
            .into_iter()
            .map(|item| chain.from_wire(item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (_, value) => chain.from_wire(value),
    }
}

fn inject(kind: InjectedKind, input: &BindingInput<'_>) -> Value {
    match kind {
        InjectedKind::User => input
            .identity
            .and_then(|identity| serde_json::to_value(identity).ok())
            .unwrap_or(Value::Null),
        InjectedKind::Request => {
            let headers: Map<String, Value> = input
                .headers
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.as_str().to_string(), Value::from(value.to_str().ok()?)))
                })
                .collect();
            Value::Object(headers)
        }
        InjectedKind::ServletContext => Value::Null,
    }
}

fn parse_query(query: Option<&str>) -> Result<HashMap<String, Vec<String>>, ServiceFault> {
    let mut grouped: HashMap<String, Vec<String>> = HashMap::new();
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return Ok(grouped);
    };
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
        .map_err(|e| ServiceFault::bad_request(format!("malformed query string: {e}")))?;
    for (name, value) in pairs {
        grouped.entry(name).or_default().push(value);
    }
    Ok(grouped)
}

fn missing(name: &str) -> ServiceFault {
    ServiceFault::bad_request(format!("required parameter '{name}' is missing"))
}

fn invalid(name: &str, reason: &str) -> ServiceFault {
    ServiceFault::bad_request(format!("invalid value for parameter '{name}': {reason}"))
}

/// The request body, parsed as JSON on first use.
struct LazyBody<'r> {
    raw: &'r [u8],
    parsed: Option<Value>,
}

impl<'r> LazyBody<'r> {
    fn new(raw: &'r [u8]) -> Self {
        Self { raw, parsed: None }
    }

    fn parsed(&mut self) -> Result<Option<&Value>, ServiceFault> {
        if self.raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        if self.parsed.is_none() {
            let value = serde_json::from_slice(self.raw)
                .map_err(|e| ServiceFault::bad_request(format!("request body is not valid JSON: {e}")))?;
            self.parsed = Some(value);
        }
        Ok(self.parsed.as_ref())
    }

    fn whole(&mut self) -> Result<Option<Value>, ServiceFault> {
        Ok(self.parsed()?.cloned())
    }

    fn field(&mut self, name: &str) -> Result<Option<Value>, ServiceFault> {
        Ok(self
            .parsed()?
            .and_then(|body| body.as_object())
            .and_then(|object| object.get(name))
            .cloned())
    }
}
