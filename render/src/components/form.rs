use drafter_core::form::{JSON_DECODE_SYMBOL, LABEL_SEPARATOR};

use super::{Component, Content, VerifyError};
use crate::{Buffer, Settings};

const INPUT_ATTRIBUTES: &[&str] = &[
    "placeholder",
    "size",
    "maxlength",
    "minlength",
    "pattern",
    "readonly",
    "disabled",
    "required",
    "autofocus",
    "autocomplete",
    "min",
    "max",
    "step",
];

const TEXT_AREA_ATTRIBUTES: &[&str] = &[
    "placeholder",
    "rows",
    "cols",
    "maxlength",
    "readonly",
    "disabled",
    "required",
    "autofocus",
    "wrap",
];

/// Field names become route parameter names, so they must survive the
/// router's key decoding untouched.
pub(super) fn verify_name(name: &str, path: &str) -> Result<(), VerifyError> {
    if name.is_empty() {
        return Err(VerifyError::new(path, "form field name must not be empty"));
    }
    if name.contains(LABEL_SEPARATOR) || name.starts_with(JSON_DECODE_SYMBOL) {
        return Err(VerifyError::new(
            path,
            format!("form field name \"{name}\" must not contain '{LABEL_SEPARATOR}'"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBox {
    pub name: String,
    pub default_value: String,
    /// HTML input type, e.g. `text`, `number`, `password`.
    pub kind: String,
    settings: Settings,
}

impl TextBox {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: String::new(),
            kind: "text".into(),
            settings: Settings::new(),
        }
    }

    pub fn with_default(mut self, value: impl ToString) -> Self {
        self.default_value = value.to_string();
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<input");
        output.push_attr("type", &self.kind);
        output.push_attr("name", &self.name);
        output.push_attr("value", &self.default_value);
        self.settings.render(output, INPUT_ATTRIBUTES);
        output.push_char('>');
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextArea {
    pub name: String,
    pub default_value: String,
    settings: Settings,
}

impl TextArea {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_value: String::new(),
            settings: Settings::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = value.into();
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<textarea");
        output.push_attr("name", &self.name);
        self.settings.render(output, TEXT_AREA_ATTRIBUTES);
        output.push_char('>');
        output.push_html(&self.default_value);
        output.push_str("</textarea>");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectBox {
    pub name: String,
    pub options: Vec<String>,
    pub default_value: Option<String>,
    settings: Settings,
}

impl SelectBox {
    pub fn new<I, S>(name: impl Into<String>, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            options: options.into_iter().map(Into::into).collect(),
            default_value: None,
            settings: Settings::new(),
        }
    }

    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<select");
        output.push_attr("name", &self.name);
        self.settings.render(output, &["disabled", "required", "autofocus"]);
        output.push_char('>');
        for option in &self.options {
            output.push_str("<option");
            output.push_attr("value", option);
            if self.default_value.as_ref() == Some(option) {
                output.push_str(" selected");
            }
            output.push_char('>');
            output.push_html(option);
            output.push_str("</option>");
        }
        output.push_str("</select>");
    }

    pub(super) fn verify(&self, path: &str) -> Result<(), VerifyError> {
        verify_name(&self.name, path)?;
        match &self.default_value {
            Some(default) if !self.options.contains(default) => Err(VerifyError::new(
                path,
                format!(
                    "default value \"{default}\" of select box \"{}\" is not one of its options",
                    self.name
                ),
            )),
            _ => Ok(()),
        }
    }
}

/// Checkbox; an unchecked box sends nothing, which a `bool` parameter reads
/// as `false`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckBox {
    pub name: String,
    pub checked: bool,
    settings: Settings,
}

impl CheckBox {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checked: false,
            settings: Settings::new(),
        }
    }

    pub fn with_default(mut self, checked: bool) -> Self {
        self.checked = checked;
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<input type=\"checkbox\"");
        output.push_attr("name", &self.name);
        output.push_attr("value", "true");
        if self.checked {
            output.push_str(" checked");
        }
        self.settings.render(output, &["disabled", "required"]);
        output.push_char('>');
    }
}

/// File picker; the client sends the chosen file as a base64 upload envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub name: String,
    pub accept: Vec<String>,
    settings: Settings,
}

impl FileUpload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            accept: Vec::new(),
            settings: Settings::new(),
        }
    }

    pub fn accepting<I, S>(mut self, accept: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.accept = accept.into_iter().map(Into::into).collect();
        self
    }

    pub(super) fn render(&self, output: &mut Buffer) {
        output.push_str("<input type=\"file\"");
        output.push_attr("name", &self.name);
        if !self.accept.is_empty() {
            output.push_attr("accept", &self.accept.join(","));
        }
        self.settings.render(output, &["disabled", "required", "multiple"]);
        output.push_char('>');
    }
}

impl_component!(TextBox, TextArea, SelectBox, CheckBox, FileUpload);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing::{Routes, render};

    #[test]
    fn test_text_box_render() {
        let html = render(
            TextBox::new("amount")
                .with_default(20)
                .with_kind("number")
                .with("placeholder", "How much?"),
        );
        assert_eq!(
            html,
            r#"<input type="number" name="amount" value="20" placeholder="How much?">"#
        );
    }

    #[test]
    fn test_select_box_marks_default() {
        let html = render(SelectBox::new("color", ["red", "blue"]).with_default("blue"));
        assert!(html.contains(r#"<option value="blue" selected>blue</option>"#));
        assert!(html.contains(r#"<option value="red">red</option>"#));
    }

    #[test]
    fn test_select_box_default_must_be_an_option() {
        let routes = Routes::of(&[]);
        let select = SelectBox::new("color", ["red"]).with_default("green");
        let error = Component::from(select).verify(&routes, "Page").unwrap_err();
        assert_eq!(error.path, "Page.SelectBox");
    }

    #[test]
    fn test_field_name_with_separator_rejected() {
        let routes = Routes::of(&[]);
        let error = Component::from(TextBox::new("a~b"))
            .verify(&routes, "Page")
            .unwrap_err();
        assert!(error.reason.contains("a~b"));
    }

    #[test]
    fn test_file_upload_accept() {
        let html = render(FileUpload::new("new_image").accepting(["image/png", "image/jpeg"]));
        assert_eq!(
            html,
            r#"<input type="file" name="new_image" accept="image/png,image/jpeg">"#
        );
    }
}
