//! Route functions.
//!
//! Any `Fn` whose parameters implement [`FromParam`] and whose return value
//! implements [`IntoPayload`] is a [`Handler`].

use std::marker::PhantomData;

use crate::{
    extract::{ExtractError, FromParam, ParamKind, ParamValue},
    payload::{Download, ErrorPage, Fragment, Page, Payload, Progress, Redirect, Update},
};

/// What a route call produced.
#[derive(Debug)]
pub enum RouteOutput {
    Payload(Payload),
    /// A value that is not a payload, e.g. a bare string.
    NotPayload {
        type_name: &'static str,
        value: String,
    },
    Failed(anyhow::Error),
}

pub trait IntoPayload {
    fn into_payload(self) -> RouteOutput;
}

macro_rules! into_payload {
    ($($name:ty),+) => {
        $(impl IntoPayload for $name {
            fn into_payload(self) -> RouteOutput {
                RouteOutput::Payload(self.into())
            }
        })+
    };
}

into_payload!(Payload, Page, Fragment, Update, Redirect, Progress, Download, ErrorPage);

impl IntoPayload for () {
    fn into_payload(self) -> RouteOutput {
        RouteOutput::NotPayload {
            type_name: "()",
            value: "()".into(),
        }
    }
}

impl IntoPayload for String {
    fn into_payload(self) -> RouteOutput {
        RouteOutput::NotPayload {
            type_name: "String",
            value: format!("{self:?}"),
        }
    }
}

impl IntoPayload for &'static str {
    fn into_payload(self) -> RouteOutput {
        RouteOutput::NotPayload {
            type_name: "&str",
            value: format!("{self:?}"),
        }
    }
}

impl<T, E> IntoPayload for Result<T, E>
where
    T: IntoPayload,
    E: Into<anyhow::Error>,
{
    fn into_payload(self) -> RouteOutput {
        match self {
            Ok(value) => value.into_payload(),
            Err(error) => RouteOutput::Failed(error.into()),
        }
    }
}

/// Declared kind of one handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub kind: ParamKind,
    pub optional: bool,
}

impl ParamSpec {
    fn of<T: FromParam>() -> Self {
        Self {
            kind: T::KIND,
            optional: T::OPTIONAL,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("parameter {position}: {source}")]
pub struct BindError {
    pub position: usize,
    #[source]
    pub source: ExtractError,
}

/// A route call with its arguments extracted, ready to run.
pub type BoundCall<'a> = Box<dyn FnOnce() -> RouteOutput + 'a>;

pub trait Handler<Args>: Send + Sync + 'static {
    fn params() -> Vec<ParamSpec>;

    /// Extract every parameter; `values` holds one slot per parameter.
    fn bind(&self, values: Vec<Option<ParamValue>>) -> Result<BoundCall<'_>, BindError>;
}

macro_rules! impl_handler {
    ($($ty:ident),*) => {
        impl<F, R, $($ty,)*> Handler<($($ty,)*)> for F
        where
            F: Fn($($ty),*) -> R + Send + Sync + 'static,
            R: IntoPayload,
            $($ty: FromParam + 'static,)*
        {
            fn params() -> Vec<ParamSpec> {
                vec![$(ParamSpec::of::<$ty>()),*]
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn bind(&self, values: Vec<Option<ParamValue>>) -> Result<BoundCall<'_>, BindError> {
                let mut values = values.into_iter();
                let mut position = 0;
                $(
                    let $ty = <$ty as FromParam>::from_param(values.next().flatten())
                        .map_err(|source| BindError { position, source })?;
                    position += 1;
                )*
                Ok(Box::new(move || (self)($($ty),*).into_payload()))
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);

/// Object-safe form of [`Handler`], stored by the router.
pub(crate) trait ErasedHandler: Send + Sync {
    fn bind(&self, values: Vec<Option<ParamValue>>) -> Result<BoundCall<'_>, BindError>;
}

pub(crate) struct Erased<F, Args> {
    handler: F,
    _args: PhantomData<fn() -> Args>,
}

impl<F, Args> Erased<F, Args> {
    pub(crate) fn new(handler: F) -> Self {
        Self {
            handler,
            _args: PhantomData,
        }
    }
}

impl<F, Args> ErasedHandler for Erased<F, Args>
where
    F: Handler<Args>,
    Args: 'static,
{
    fn bind(&self, values: Vec<Option<ParamValue>>) -> Result<BoundCall<'_>, BindError> {
        self.handler.bind(values)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::extract::State;

    fn params_of<F: Handler<Args>, Args>(_: &F) -> Vec<ParamSpec> {
        F::params()
    }

    fn greet(name: String, times: i64) -> Page {
        Page::new(0, [name.repeat(times as usize)])
    }

    #[test]
    fn test_params_reflect_signature() {
        let specs = params_of(&greet);
        assert_eq!(
            specs.iter().map(|spec| spec.kind).collect::<Vec<_>>(),
            [ParamKind::Text, ParamKind::Integer]
        );

        let with_state = |_: State<i64>, _: Option<bool>| Update::new(0);
        let specs = params_of(&with_state);
        assert_eq!(specs[0].kind, ParamKind::State);
        assert!(specs[1].optional);
    }

    #[test]
    fn test_bind_and_call() {
        let route = greet;
        let call = route
            .bind(vec![
                Some(ParamValue::Json(json!("ab"))),
                Some(ParamValue::Json(json!(2))),
            ])
            .unwrap();

        match call() {
            RouteOutput::Payload(Payload::Page(page)) => assert_eq!(page.content.len(), 1),
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn test_bind_reports_position() {
        let route = greet;
        let Err(error) = route.bind(vec![Some(ParamValue::Json(json!("ab"))), None]) else {
            panic!("binding should fail");
        };
        assert_eq!(error.position, 1);
        assert!(matches!(error.source, ExtractError::Missing));
    }

    #[test]
    fn test_string_is_not_a_payload() {
        let route = || "oops".to_string();
        let call = route.bind(Vec::new()).unwrap();
        assert!(matches!(
            call(),
            RouteOutput::NotPayload {
                type_name: "String",
                ..
            }
        ));
    }

    #[test]
    fn test_error_result_fails() {
        let route = || -> anyhow::Result<Page> { anyhow::bail!("no funds") };
        let call = route.bind(Vec::new()).unwrap();
        match call() {
            RouteOutput::Failed(error) => assert_eq!(error.to_string(), "no funds"),
            other => panic!("unexpected output {other:?}"),
        }
    }
}
