use drafter_core::ServerConfig;

/// Stylesheets and scripts a theme contributes to the site frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    pub name: String,
    pub css_paths: Vec<String>,
    pub js_paths: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme \"{name}\"{}", suggestion_hint(.suggestion))]
pub struct UnknownTheme {
    pub name: String,
    pub suggestion: Option<&'static str>,
}

fn suggestion_hint(suggestion: &Option<&'static str>) -> String {
    match suggestion {
        Some(name) => format!(", did you mean \"{name}\"?"),
        None => String::new(),
    }
}

const CDN_THEMES: &[(&str, &str)] = &[
    ("simple", "https://cdn.simplecss.org/simple.min.css"),
    ("mvp", "https://unpkg.com/mvp.css"),
    ("sakura", "https://cdn.jsdelivr.net/npm/sakura.css/css/sakura.css"),
    (
        "tacit",
        "https://cdn.jsdelivr.net/gh/yegor256/tacit@gh-pages/tacit-css-1.8.1.min.css",
    ),
    (
        "skeleton",
        "https://cdnjs.cloudflare.com/ajax/libs/skeleton/2.0.4/skeleton.min.css",
    ),
];

/// Every theme name that [`Theme::lookup`] accepts.
pub fn theme_names() -> impl Iterator<Item = &'static str> {
    ["default", "none"]
        .into_iter()
        .chain(CDN_THEMES.iter().map(|(name, _)| *name))
}

impl Theme {
    pub fn lookup(name: &str, config: &ServerConfig) -> Result<Self, UnknownTheme> {
        let assets_url = config.assets_url.trim_end_matches('/');
        let css_paths = match name {
            "default" => vec![format!("{assets_url}/themes/default.css")],
            "none" => Vec::new(),
            _ => match CDN_THEMES.iter().find(|(theme, _)| *theme == name) {
                Some((_, url)) => vec![url.to_string()],
                None => {
                    return Err(UnknownTheme {
                        name: name.to_string(),
                        suggestion: did_you_mean(name),
                    });
                }
            },
        };

        Ok(Self {
            name: name.to_string(),
            css_paths,
            js_paths: Vec::new(),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, UnknownTheme> {
        Self::lookup(&config.theme, config)
    }
}

fn did_you_mean(name: &str) -> Option<&'static str> {
    let name = name.to_lowercase();
    theme_names()
        .map(|candidate| (levenshtein(&name, candidate), candidate))
        .filter(|(distance, candidate)| *distance <= candidate.len().max(2) / 2)
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1; b.len() + 1];
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        previous = current;
    }

    previous[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_theme_uses_assets_url() {
        let config = ServerConfig::default();
        let theme = Theme::lookup("default", &config).unwrap();
        assert_eq!(theme.css_paths, ["/assets/themes/default.css"]);
    }

    #[test]
    fn test_none_theme_is_empty() {
        let theme = Theme::lookup("none", &ServerConfig::default()).unwrap();
        assert!(theme.css_paths.is_empty());
        assert!(theme.js_paths.is_empty());
    }

    #[test]
    fn test_unknown_theme_suggests() {
        let error = Theme::lookup("sakrua", &ServerConfig::default()).unwrap_err();
        assert_eq!(error.suggestion, Some("sakura"));
        assert_eq!(
            error.to_string(),
            "unknown theme \"sakrua\", did you mean \"sakura\"?"
        );
    }

    #[test]
    fn test_unrelated_name_has_no_suggestion() {
        let error = Theme::lookup("bootstrap", &ServerConfig::default()).unwrap_err();
        assert_eq!(error.suggestion, None);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "mvp"), 3);
    }
}
