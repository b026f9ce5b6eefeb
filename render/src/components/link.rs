use drafter_core::{
    RouteTable, RouteUrl,
    form::{self, SUBMIT_BUTTON_KEY},
};
use serde::Serialize;

use super::{Component, Content, VerifyError, next_instance_id};
use crate::{Buffer, Settings};

/// A named value embedded in a page.
///
/// Inside a [`Link`] or [`Button`] it is scoped to that control's namespace;
/// on its own it renders as a hidden JSON-decoded input.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: String,
    pub value: serde_json::Value,
}

impl Argument {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn serialized<T: Serialize>(
        name: impl Into<String>,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            name: name.into(),
            value: serde_json::to_value(value)?,
        })
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        render_hidden(output, &form::json_decode_key(&self.name), &self.value);
    }

    pub(super) fn verify(&self, path: &str) -> Result<(), VerifyError> {
        verify_argument_name(&self.name, path)
    }
}

impl From<Argument> for Component {
    fn from(argument: Argument) -> Self {
        Component::Argument(argument)
    }
}

impl From<Argument> for Content {
    fn from(argument: Argument) -> Self {
        Content::Component(Component::Argument(argument))
    }
}

macro_rules! fresh_instance_clone {
    ($($name:ident),*) => {
        $(
            impl Clone for $name {
                fn clone(&self) -> Self {
                    Self {
                        text: self.text.clone(),
                        url: self.url.clone(),
                        arguments: self.arguments.clone(),
                        instance: next_instance_id(),
                        settings: self.settings.clone(),
                    }
                }
            }
        )*
    };
}

fresh_instance_clone!(Link, Button);

/// Hyperlink to a route or an external url.
#[derive(Debug, PartialEq)]
pub struct Link {
    pub text: String,
    pub url: String,
    pub arguments: Vec<Argument>,
    instance: u64,
    settings: Settings,
}

impl Link {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            arguments: Vec::new(),
            instance: next_instance_id(),
            settings: Settings::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    /// `"<text>#<instance-id>"`
    pub fn namespace(&self) -> String {
        namespace(&self.text, self.instance)
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        if form::is_external_url(&self.url) {
            output.push_str("<a");
            output.push_attr("href", &self.url);
            self.settings.render(output, &["target", "rel"]);
            output.push_char('>');
            output.push_html(&self.text);
            output.push_str("</a>");
            return;
        }

        let namespace = self.namespace();
        output.push_str("<a");
        output.push_attr("href", &RouteUrl::new(&self.url));
        output.push_attr("data-drafter-link", &encode_namespace(&namespace));
        self.settings.render(output, &[]);
        output.push_char('>');
        output.push_html(&self.text);
        output.push_str("</a>");
        render_arguments(output, &namespace, &self.arguments);
    }

    pub(super) fn verify(&self, routes: &dyn RouteTable, path: &str) -> Result<(), VerifyError> {
        verify_target("Link", &self.text, &self.url, routes, path)?;
        verify_arguments(&self.arguments, path)
    }
}

/// Submit button that sends the form to a route. A clone is a separate
/// button with its own namespace.
#[derive(Debug, PartialEq)]
pub struct Button {
    pub text: String,
    pub url: String,
    pub arguments: Vec<Argument>,
    instance: u64,
    settings: Settings,
}

impl Button {
    pub fn new(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: url.into(),
            arguments: Vec::new(),
            instance: next_instance_id(),
            settings: Settings::new(),
        }
    }

    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = Argument>) -> Self {
        self.arguments.extend(arguments);
        self
    }

    /// `"<text>#<instance-id>"`
    pub fn namespace(&self) -> String {
        namespace(&self.text, self.instance)
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        let namespace = self.namespace();
        let target = if form::is_external_url(&self.url) {
            self.url.clone()
        } else {
            RouteUrl::new(&self.url).to_string()
        };

        output.push_str("<button type=\"submit\"");
        output.push_attr("name", SUBMIT_BUTTON_KEY);
        output.push_attr("value", &encode_namespace(&namespace));
        output.push_attr("formaction", &target);
        self.settings.render(output, &["disabled", "autofocus"]);
        output.push_char('>');
        output.push_html(&self.text);
        output.push_str("</button>");
        render_arguments(output, &namespace, &self.arguments);
    }

    pub(super) fn verify(&self, routes: &dyn RouteTable, path: &str) -> Result<(), VerifyError> {
        verify_target("Button", &self.text, &self.url, routes, path)?;
        verify_arguments(&self.arguments, path)
    }
}

impl_component!(Link, Button);

fn namespace(label: &str, instance: u64) -> String {
    format!("{label}#{instance}")
}

fn encode_namespace(namespace: &str) -> String {
    serde_json::Value::from(namespace).to_string()
}

fn render_hidden(output: &mut Buffer, name: &str, value: &serde_json::Value) {
    output.push_str("<input type=\"hidden\"");
    output.push_attr("name", name);
    output.push_attr("value", &value.to_string());
    output.push_char('>');
}

fn render_arguments(output: &mut Buffer, namespace: &str, arguments: &[Argument]) {
    for argument in arguments {
        render_hidden(
            output,
            &form::namespaced_key(namespace, &argument.name),
            &argument.value,
        );
    }
}

fn verify_target(
    kind: &str,
    label: &str,
    url: &str,
    routes: &dyn RouteTable,
    path: &str,
) -> Result<(), VerifyError> {
    if form::is_external_url(url) || routes.has_route(&RouteUrl::new(url)) {
        return Ok(());
    }

    Err(VerifyError::new(
        path,
        format!(
            "{kind} \"{label}\" points to \"{url}\", which is neither a registered route nor an external url"
        ),
    ))
}

fn verify_arguments(arguments: &[Argument], path: &str) -> Result<(), VerifyError> {
    let mut seen = Vec::with_capacity(arguments.len());
    for (index, argument) in arguments.iter().enumerate() {
        let argument_path = format!("{path}.arguments[{index}]");
        verify_argument_name(&argument.name, &argument_path)?;
        if seen.contains(&argument.name.as_str()) {
            return Err(VerifyError::new(
                &argument_path,
                format!("argument \"{}\" is given more than once", argument.name),
            ));
        }
        seen.push(argument.name.as_str());
    }
    Ok(())
}

fn verify_argument_name(name: &str, path: &str) -> Result<(), VerifyError> {
    if name.is_empty() || name.contains(form::LABEL_SEPARATOR) {
        return Err(VerifyError::new(
            path,
            format!(
                "argument name \"{name}\" must be non-empty and must not contain '{}'",
                form::LABEL_SEPARATOR
            ),
        ));
    }
    Ok(())
}
