use crate::Buffer;

const STYLE_PREFIX: &str = "style_";

/// Attributes any component may receive through its settings.
pub const BASELINE_ATTRIBUTES: &[&str] = &[
    "id",
    "class",
    "style",
    "title",
    "lang",
    "dir",
    "accesskey",
    "tabindex",
    "hidden",
    "draggable",
    "spellcheck",
    "role",
    "onclick",
    "ondblclick",
    "onmouseover",
    "onmouseout",
    "onkeypress",
    "onkeydown",
    "onkeyup",
    "onfocus",
    "onblur",
    "onchange",
];

/// Flat keyword overrides for a component (`extra_settings`).
///
/// `style_*` keys become CSS declarations, baseline or component-declared
/// keys become attributes and anything else is coerced to inline style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings(Vec<(String, String)>);

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == key) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, value)| value.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Split into `(attributes, css declarations)`.
    pub fn resolve(&self, extra_attributes: &[&str]) -> (Vec<(&str, &str)>, Vec<String>) {
        let mut attributes = Vec::new();
        let mut styles = Vec::new();

        for (key, value) in &self.0 {
            if let Some(property) = key.strip_prefix(STYLE_PREFIX) {
                styles.push(css_declaration(property, value));
            } else if key == "style" {
                styles.push(value.trim().trim_end_matches(';').to_string());
            } else if BASELINE_ATTRIBUTES.contains(&key.as_str())
                || extra_attributes.contains(&key.as_str())
            {
                attributes.push((key.as_str(), value.as_str()));
            } else {
                styles.push(css_declaration(key, value));
            }
        }

        (attributes, styles)
    }

    /// Write ` attr="..."` pairs and a merged `style` attribute.
    pub fn render(&self, output: &mut Buffer, extra_attributes: &[&str]) {
        let (attributes, styles) = self.resolve(extra_attributes);

        for (name, value) in attributes {
            output.push_attr(name, value);
        }

        if !styles.is_empty() {
            output.push_attr("style", &styles.join("; "));
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Settings {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut settings = Settings::new();
        for (key, value) in iter {
            settings.set(key, value);
        }
        settings
    }
}

fn css_declaration(property: &str, value: &str) -> String {
    format!("{}: {}", property.replace('_', "-"), value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_prefix_becomes_css() {
        let settings: Settings = [("style_background_color", "red")].into_iter().collect();
        let (attributes, styles) = settings.resolve(&[]);

        assert!(attributes.is_empty());
        assert_eq!(styles, ["background-color: red"]);
    }

    #[test]
    fn test_baseline_and_extra_attributes() {
        let settings: Settings = [("id", "main"), ("placeholder", "Name"), ("border", "1px")]
            .into_iter()
            .collect();

        let (attributes, styles) = settings.resolve(&["placeholder"]);
        assert_eq!(attributes, [("id", "main"), ("placeholder", "Name")]);
        assert_eq!(styles, ["border: 1px"]);
    }

    #[test]
    fn test_unknown_key_coerced_to_style() {
        let settings: Settings = [("font_size", "20px")].into_iter().collect();
        let mut output = Buffer::empty();
        settings.render(&mut output, &[]);

        assert_eq!(&*output, r#" style="font-size: 20px""#);
    }

    #[test]
    fn test_set_replaces() {
        let mut settings = Settings::new();
        settings.set("class", "a");
        settings.set("class", "b");
        assert_eq!(settings.get("class"), Some("b"));
    }
}
