//! URL to route-function map and argument reconstruction.

use std::{collections::BTreeMap, fmt};

use drafter_core::{
    Request, RouteTable, RouteUrl, StateSnapshot,
    form::{
        self, JSON_DECODE_SYMBOL, LABEL_SEPARATOR, PREVIOUSLY_PRESSED_BUTTON, SUBMIT_BUTTON_KEY,
    },
};
use serde_json::{Map, Value};

use crate::{
    coerce::{self, CoerceError},
    extract::{ExtractError, ParamKind, ParamValue},
    handler::{BindError, BoundCall, Erased, ErasedHandler, Handler},
    upload,
};

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {0} is already registered")]
    Duplicate(RouteUrl),
    #[error("route {url} takes {expected} named parameters, but {given} names were given")]
    Arity {
        url: RouteUrl,
        expected: usize,
        given: usize,
    },
    #[error("route {url}: the state can only be the first parameter (found at {position})")]
    StatePosition { url: RouteUrl, position: usize },
    #[error("route {url}: invalid parameter name \"{name}\"")]
    InvalidName { url: RouteUrl, name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ArgumentError {
    #[error("value of \"{key}\" is not valid JSON: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("argument \"{0}\" was given more than once")]
    Collision(String),
    #[error("{route} has no parameter named \"{name}\"")]
    Unexpected { route: String, name: String },
    #[error("argument \"{0}\" was given both by position and by name")]
    Conflict(String),
    #[error("parameter \"{name}\": {source}")]
    Coerce {
        name: String,
        #[source]
        source: CoerceError,
    },
    #[error("parameter \"{0}\" needs the site state, but no state has been set")]
    MissingState(String),
    #[error("parameter \"{name}\": {source}")]
    Extract {
        name: String,
        #[source]
        source: ExtractError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub optional: bool,
}

/// Parameter list of a route, computed once at registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Param>,
}

impl Signature {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.params.iter().position(|param| param.name == name)
    }

    pub fn takes_state(&self) -> bool {
        self.params
            .first()
            .is_some_and(|param| param.kind == ParamKind::State)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (index, param) in self.params.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            if param.kind == ParamKind::State {
                f.write_str(&param.name)?;
            } else if param.optional {
                write!(f, "{}: {}?", param.name, param.kind)?;
            } else {
                write!(f, "{}: {}", param.name, param.kind)?;
            }
        }
        f.write_str(")")
    }
}

pub struct Route {
    pub url: RouteUrl,
    pub signature: Signature,
    handler: Box<dyn ErasedHandler>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("url", &self.url)
            .field("signature", &self.signature)
            .finish_non_exhaustive()
    }
}

impl Route {
    pub fn name(&self) -> &str {
        self.url.name()
    }

    /// Extract the prepared values into a ready-to-run call.
    pub fn bind(&self, prepared: PreparedCall) -> Result<BoundCall<'_>, ArgumentError> {
        self.handler
            .bind(prepared.values)
            .map_err(|BindError { position, source }| ArgumentError::Extract {
                name: self
                    .signature
                    .params
                    .get(position)
                    .map_or_else(|| position.to_string(), |param| param.name.clone()),
                source,
            })
    }
}

/// Arguments reconstructed from a request, one slot per declared parameter.
#[derive(Debug)]
pub struct PreparedCall {
    pub values: Vec<Option<ParamValue>>,
    /// Pretty form of the call, e.g. `deposit(state, amount=20)`.
    pub repr: String,
    pub warnings: Vec<String>,
}

struct Supplied {
    value: Value,
    /// Decoded from JSON rather than taken from a raw form field.
    decoded: bool,
}

impl Supplied {
    fn raw(value: Value) -> Self {
        Self {
            value,
            decoded: false,
        }
    }

    fn decoded(value: Value) -> Self {
        Self {
            value,
            decoded: true,
        }
    }

    fn repr(&self) -> String {
        if upload::is_upload(&self.value) {
            let filename = self
                .value
                .get("filename")
                .and_then(Value::as_str)
                .unwrap_or_default();
            return format!("<file {filename:?}>");
        }
        self.value.to_string()
    }
}

#[derive(Debug, Default)]
pub struct Router {
    routes: BTreeMap<RouteUrl, Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `url`.
    ///
    /// `names` names the parameters after an optional leading `State`, which
    /// is always called `state`.
    pub fn add_route<F, Args>(
        &mut self,
        url: &str,
        names: &[&str],
        handler: F,
    ) -> Result<&Route, RouteError>
    where
        F: Handler<Args>,
        Args: 'static,
    {
        let url = RouteUrl::new(url);
        if self.routes.contains_key(&url) {
            return Err(RouteError::Duplicate(url));
        }

        let specs = F::params();
        if let Some(position) = specs
            .iter()
            .skip(1)
            .position(|spec| spec.kind == ParamKind::State)
        {
            return Err(RouteError::StatePosition {
                url,
                position: position + 1,
            });
        }

        let takes_state = specs
            .first()
            .is_some_and(|spec| spec.kind == ParamKind::State);
        let expected = specs.len() - usize::from(takes_state);
        if names.len() != expected {
            return Err(RouteError::Arity {
                url,
                expected,
                given: names.len(),
            });
        }

        for (index, name) in names.iter().enumerate() {
            let invalid = name.is_empty()
                || name.contains(form::LABEL_SEPARATOR)
                || name.starts_with(JSON_DECODE_SYMBOL)
                || *name == "state" && takes_state
                || names[..index].contains(name);
            if invalid {
                return Err(RouteError::InvalidName {
                    url,
                    name: name.to_string(),
                });
            }
        }

        let state_name = takes_state.then_some("state");
        let params = state_name
            .into_iter()
            .chain(names.iter().copied())
            .zip(specs)
            .map(|(name, spec)| Param {
                name: name.to_string(),
                kind: spec.kind,
                optional: spec.optional,
            })
            .collect();

        let route = Route {
            url: url.clone(),
            signature: Signature { params },
            handler: Box::new(Erased::new(handler)),
        };
        tracing::debug!("registered route {}{}", route.url, route.signature);

        Ok(self.routes.entry(url).or_insert(route))
    }

    pub fn resolve(&self, url: &RouteUrl) -> Option<&Route> {
        self.routes.get(url)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Rebuild the typed call for `route` from the flat request parameters.
    pub fn prepare_arguments(
        &self,
        route: &Route,
        request: &Request,
        state: Option<&StateSnapshot>,
    ) -> Result<PreparedCall, ArgumentError> {
        let mut kwargs = request.kwargs.clone();
        let pressed = take_pressed_button(&mut kwargs);

        let mut named: Vec<(String, Supplied)> = Vec::with_capacity(kwargs.len());
        for (key, value) in kwargs {
            let active = form::split_namespaced_key(&key)
                .filter(|(namespace, _)| pressed.as_deref() == Some(*namespace))
                .map(|(_, name)| name.to_string());

            let (name, supplied) = if let Some(name) = active {
                (name, Supplied::decoded(decode_json(&key, value)?))
            } else if let Some(name) = key.strip_prefix(JSON_DECODE_SYMBOL) {
                (name.to_string(), Supplied::decoded(decode_json(&key, value)?))
            } else if key.contains(LABEL_SEPARATOR) {
                // belongs to another button
                continue;
            } else {
                (key, Supplied::raw(value))
            };

            if named.iter().any(|(existing, _)| *existing == name) {
                return Err(ArgumentError::Collision(name));
            }
            named.push((name, supplied));
        }

        let mut positional: Vec<Supplied> =
            request.args.iter().cloned().map(Supplied::raw).collect();

        let params = &route.signature.params;
        let supplied = positional.len() + named.len();
        let inject = match params.first() {
            Some(first) if first.kind == ParamKind::State => true,
            Some(first) if first.kind == ParamKind::Json => {
                first.name == "state" || params.len() - 1 == supplied
            }
            _ => false,
        };

        let mut warnings = Vec::new();
        let available = params.len() - usize::from(inject);
        if supplied > available {
            let warning = format!(
                "{} takes {available} arguments but {supplied} were given; the extra arguments were ignored",
                route.name()
            );
            tracing::warn!("{warning}");
            warnings.push(warning);

            let mut excess = supplied - available;
            let from_positional = excess.min(positional.len());
            positional.truncate(positional.len() - from_positional);
            excess -= from_positional;
            named.truncate(named.len() - excess);
        }

        let mut values: Vec<Option<ParamValue>> = params.iter().map(|_| None).collect();
        let mut parts = Vec::with_capacity(params.len());
        let mut next = 0;

        if inject {
            let snapshot = state
                .cloned()
                .ok_or_else(|| ArgumentError::MissingState(params[0].name.clone()))?;
            values[0] = Some(ParamValue::State(snapshot));
            parts.push(params[0].name.clone());
            next = 1;
        }

        for supplied in positional {
            let param = &params[next];
            parts.push(supplied.repr());
            values[next] = Some(coerce_supplied(param, supplied)?);
            next += 1;
        }

        for (name, supplied) in named {
            let index = route
                .signature
                .position(&name)
                .ok_or_else(|| ArgumentError::Unexpected {
                    route: route.name().to_string(),
                    name: name.clone(),
                })?;
            if values[index].is_some() {
                return Err(ArgumentError::Conflict(name));
            }
            parts.push(format!("{name}={}", supplied.repr()));
            values[index] = Some(coerce_supplied(&params[index], supplied)?);
        }

        Ok(PreparedCall {
            values,
            repr: format!("{}({})", route.name(), parts.join(", ")),
            warnings,
        })
    }
}

impl RouteTable for Router {
    fn has_route(&self, url: &RouteUrl) -> bool {
        self.routes.contains_key(url)
    }

    fn route_urls(&self) -> Vec<RouteUrl> {
        self.routes.keys().cloned().collect()
    }
}

/// Namespace of the pressed button. Both button keys are removed so they
/// never reach the route.
fn take_pressed_button(kwargs: &mut Map<String, Value>) -> Option<String> {
    let submitted = kwargs.remove(SUBMIT_BUTTON_KEY);
    let previous = kwargs.remove(PREVIOUSLY_PRESSED_BUTTON);

    match coerce::flatten_singleton(submitted.or(previous)?) {
        Value::String(text) => match serde_json::from_str(&text) {
            Ok(Value::String(namespace)) => Some(namespace),
            _ => Some(text),
        },
        _ => None,
    }
}

fn decode_json(key: &str, value: Value) -> Result<Value, ArgumentError> {
    match coerce::flatten_singleton(value) {
        Value::String(text) => serde_json::from_str(&text).map_err(|source| ArgumentError::Decode {
            key: key.trim_start_matches(JSON_DECODE_SYMBOL).to_string(),
            source,
        }),
        other => Ok(other),
    }
}

fn coerce_supplied(param: &Param, supplied: Supplied) -> Result<ParamValue, ArgumentError> {
    let value = if supplied.decoded {
        supplied.value
    } else {
        flatten_raw(supplied.value, param.kind)
    };

    coerce::coerce(value, param.kind).map_err(|source| ArgumentError::Coerce {
        name: param.name.clone(),
        source,
    })
}

/// Transport delivers single form values as one-element lists. A lone object
/// or list stays wrapped for structured parameters.
fn flatten_raw(value: Value, kind: ParamKind) -> Value {
    let structured = matches!(
        &value,
        Value::Array(items) if items.len() == 1 && (items[0].is_object() || items[0].is_array())
    );
    if structured && !kind.is_scalar() {
        value
    } else {
        coerce::flatten_singleton(value)
    }
}

#[cfg(test)]
mod tests {
    use drafter_core::{Action, form::namespaced_key};
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;
    use crate::{
        extract::State,
        handler::RouteOutput,
        payload::{Page, Payload},
    };

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Bank {
        balance: i64,
    }

    fn deposit(State(mut bank): State<Bank>, amount: i64) -> Page {
        bank.balance += amount;
        let text = bank.balance.to_string();
        Page::new(bank, [text])
    }

    fn cell_clicked(State(bank): State<Bank>, x: i64, y: i64) -> Page {
        Page::new(bank, [format!("{x},{y}")])
    }

    fn bank_snapshot(balance: i64) -> StateSnapshot {
        StateSnapshot::capture(&Bank { balance }).unwrap()
    }

    fn request(url: &str) -> Request {
        Request::new(1, Action::Submit, url)
    }

    fn run(route: &Route, prepared: PreparedCall) -> String {
        let call = route.bind(prepared).unwrap();
        match call() {
            RouteOutput::Payload(Payload::Page(page)) => match &page.content[0] {
                drafter_render::Content::Text(text) => text.clone(),
                other => panic!("unexpected content {other:?}"),
            },
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_route_rejected() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let error = router.add_route("/deposit", &["amount"], deposit).unwrap_err();
        assert!(matches!(error, RouteError::Duplicate(_)));
    }

    #[test]
    fn test_name_count_must_match() {
        let mut router = Router::new();
        let error = router.add_route("deposit", &[], deposit).unwrap_err();
        assert!(matches!(
            error,
            RouteError::Arity {
                expected: 1,
                given: 0,
                ..
            }
        ));
    }

    #[test]
    fn test_signature_display() {
        let mut router = Router::new();
        let route = router.add_route("deposit", &["amount"], deposit).unwrap();
        assert_eq!(route.signature.to_string(), "(state, amount: int)");
    }

    #[test]
    fn test_state_injected_and_amount_coerced() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let route = router.resolve(&RouteUrl::new("deposit")).unwrap();

        let request = request("/deposit").with_kwarg("amount", json!("20"));
        let prepared = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(100)))
            .unwrap();

        assert_eq!(prepared.repr, r#"deposit(state, amount="20")"#);
        assert_eq!(run(route, prepared), "120");
    }

    #[test]
    fn test_missing_state() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let route = router.resolve(&RouteUrl::new("deposit")).unwrap();

        let error = router
            .prepare_arguments(route, &request("/deposit"), None)
            .unwrap_err();
        assert!(matches!(error, ArgumentError::MissingState(name) if name == "state"));
    }

    #[test]
    fn test_only_pressed_button_arguments_survive() {
        let mut router = Router::new();
        router.add_route("cell_clicked", &["x", "y"], cell_clicked).unwrap();
        let route = router.resolve(&RouteUrl::new("cell_clicked")).unwrap();

        let first = "Click Me#1";
        let second = "Click Me#2";
        let request = request("/cell_clicked")
            .with_kwarg(namespaced_key(first, "x"), json!("0"))
            .with_kwarg(namespaced_key(first, "y"), json!("0"))
            .with_kwarg(namespaced_key(second, "x"), json!("1"))
            .with_kwarg(namespaced_key(second, "y"), json!("0"))
            .with_kwarg(SUBMIT_BUTTON_KEY, json!([format!("\"{second}\"")]));

        let prepared = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap();
        assert_eq!(run(route, prepared), "1,0");
    }

    #[test]
    fn test_sigil_values_are_json_decoded() {
        fn tally(items: crate::extract::Json<Vec<i64>>) -> Page {
            Page::new(0, [items.0.iter().sum::<i64>().to_string()])
        }

        let mut router = Router::new();
        router.add_route("tally", &["items"], tally).unwrap();
        let route = router.resolve(&RouteUrl::new("tally")).unwrap();

        let request = request("/tally").with_kwarg(form::json_decode_key("items"), json!("[1,2,3]"));
        let prepared = router.prepare_arguments(route, &request, None).unwrap();
        assert_eq!(run(route, prepared), "6");
    }

    #[test]
    fn test_singleton_form_value_flattened_for_json() {
        fn echo(State(bank): State<Bank>, note: crate::extract::Json<String>) -> Page {
            Page::new(bank, [note.0])
        }

        let mut router = Router::new();
        router.add_route("echo", &["note"], echo).unwrap();
        let route = router.resolve(&RouteUrl::new("echo")).unwrap();

        let request = request("/echo").with_kwarg("note", json!(["hi"]));
        let prepared = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap();
        assert_eq!(run(route, prepared), "hi");
    }

    #[test]
    fn test_single_record_list_kept_for_json() {
        fn count(rows: crate::extract::Json<Vec<Bank>>) -> Page {
            Page::new(0, [rows.0.len().to_string()])
        }

        let mut router = Router::new();
        router.add_route("count", &["rows"], count).unwrap();
        let route = router.resolve(&RouteUrl::new("count")).unwrap();

        let request = request("/count").with_kwarg("rows", json!([{"balance": 3}]));
        let prepared = router.prepare_arguments(route, &request, None).unwrap();
        assert_eq!(run(route, prepared), "1");
    }

    #[test]
    fn test_sigil_checked_before_foreign_namespace() {
        fn tally(items: crate::extract::Json<Vec<i64>>) -> Page {
            Page::new(0, [items.0.len().to_string()])
        }

        let mut router = Router::new();
        router.add_route("tally", &["items"], tally).unwrap();
        let route = router.resolve(&RouteUrl::new("tally")).unwrap();

        // decoded under its full name instead of being dropped as another button's
        let key = form::json_decode_key(&namespaced_key("a", "b"));
        let request = request("/tally").with_kwarg(key, json!("[1]"));
        let error = router.prepare_arguments(route, &request, None).unwrap_err();
        assert!(matches!(error, ArgumentError::Unexpected { name, .. } if name == "a~b"));
    }

    #[test]
    fn test_decoded_collision_is_fatal() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let route = router.resolve(&RouteUrl::new("deposit")).unwrap();

        let request = request("/deposit")
            .with_kwarg("amount", json!("1"))
            .with_kwarg(form::json_decode_key("amount"), json!("2"));
        let error = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap_err();
        assert!(matches!(error, ArgumentError::Collision(name) if name == "amount"));
    }

    #[test]
    fn test_excess_arguments_trimmed_with_warning() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let route = router.resolve(&RouteUrl::new("deposit")).unwrap();

        let request = request("/deposit")
            .with_arg(json!("5"))
            .with_arg(json!("6"));
        let prepared = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap();

        assert_eq!(prepared.warnings.len(), 1);
        assert_eq!(run(route, prepared), "5");
    }

    #[test]
    fn test_stray_parameter_rejected() {
        fn index(State(bank): State<Bank>, name: Option<String>) -> Page {
            Page::new(bank, [name.unwrap_or_default()])
        }

        let mut router = Router::new();
        router.add_route("index", &["name"], index).unwrap();
        let route = router.resolve(&RouteUrl::index()).unwrap();

        // one extra name is trimmed first, so send two strays
        let request = request("/")
            .with_kwarg("colour", json!("red"))
            .with_kwarg("size", json!("xl"));
        let error = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap_err();
        assert!(matches!(error, ArgumentError::Unexpected { name, .. } if name == "colour"));
    }

    #[test]
    fn test_conversion_error_names_types() {
        let mut router = Router::new();
        router.add_route("deposit", &["amount"], deposit).unwrap();
        let route = router.resolve(&RouteUrl::new("deposit")).unwrap();

        let request = request("/deposit").with_kwarg("amount", json!("lots"));
        let error = router
            .prepare_arguments(route, &request, Some(&bank_snapshot(0)))
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            r#"parameter "amount": cannot convert "lots" (str) to int"#
        );
    }
}
