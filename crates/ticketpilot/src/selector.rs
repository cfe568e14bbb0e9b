/// Represents ways to locate a DOM element.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Select by raw CSS query
    Css(String),
    /// Select by visible text content, optionally constrained to a tag
    Text { tag: Option<String>, text: String },
    /// Select using an XPath query
    XPath(String),
    /// Select a form control by its `name` attribute
    Name(String),
    /// Select a form control by its `placeholder` attribute
    Placeholder(String),
    /// Select the form control associated with a `<label>` whose text matches
    Label(String),
    /// Chain multiple selectors, each scoped within the previous match
    Chain(Vec<Selector>),
    /// Pick the n-th element from the current matches (0-based)
    Nth(usize),
    /// Filter current matches by on-screen visibility
    Visible(bool),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

fn looks_like_css(s: &str) -> bool {
    s.starts_with('#')
        || s.starts_with('.')
        || s.starts_with('[')
        || s.starts_with('*')
        || s.contains('[')
        || s.contains('>')
        || s.contains(' ')
        // Bare tags and tag.class / tag#id compounds
        || s.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '#'))
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();

        // Handle chained selectors first
        let parts: Vec<&str> = s.split(">>").map(|p| p.trim()).collect();
        if parts.len() > 1 {
            return Selector::Chain(parts.into_iter().map(Selector::from).collect());
        }

        // tag:text:Save narrows a text match to one element tag
        if let Some(idx) = s.find(":text:") {
            let tag = &s[..idx];
            let text = &s[idx + ":text:".len()..];
            if tag.is_empty() || text.is_empty() {
                return Selector::Invalid(format!("Empty tag or text in selector: \"{s}\""));
            }
            // The "tag" may be any CSS prefix, e.g. ".modal.show button"
            return Selector::Text {
                tag: Some(tag.to_string()),
                text: text.to_string(),
            };
        }

        match s {
            "" => Selector::Invalid("Empty selector".to_string()),
            _ if s.to_lowercase().starts_with("css:") => Selector::Css(s[4..].trim().to_string()),
            _ if s.to_lowercase().starts_with("text:") => Selector::Text {
                tag: None,
                text: s[5..].to_string(),
            },
            _ if s.to_lowercase().starts_with("xpath:") => {
                Selector::XPath(s[6..].trim().to_string())
            }
            _ if s.to_lowercase().starts_with("name:") => {
                Selector::Name(s[5..].trim().to_string())
            }
            _ if s.to_lowercase().starts_with("placeholder:") => {
                Selector::Placeholder(s["placeholder:".len()..].trim().to_string())
            }
            _ if s.to_lowercase().starts_with("label:") => {
                Selector::Label(s[6..].trim().to_string())
            }
            _ if s.to_lowercase().starts_with("visible:") => {
                let value = s[8..].trim().to_lowercase();
                Selector::Visible(value == "true")
            }
            _ if s.to_lowercase().starts_with("nth:") || s.to_lowercase().starts_with("nth=") => {
                let index_str = s[4..].trim();
                match index_str.parse::<usize>() {
                    Ok(index) => Selector::Nth(index),
                    Err(_) => {
                        Selector::Invalid(format!("Invalid index for nth selector: '{index_str}'"))
                    }
                }
            }
            _ if s.starts_with('/') || s.starts_with("(/") => Selector::XPath(s.to_string()),
            _ if looks_like_css(s) => Selector::Css(s.to_string()),
            _ => Selector::Invalid(format!(
                "Unknown selector format: \"{s}\". Use prefixes like 'css:', 'text:', 'xpath:', 'name:', 'placeholder:', or 'label:' to specify the selector type."
            )),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

impl Selector {
    /// Flatten this selector into chain segments (a non-chain selector is a
    /// single segment).
    pub fn segments(&self) -> Vec<Selector> {
        match self {
            Selector::Chain(parts) => parts.clone(),
            other => vec![other.clone()],
        }
    }

    /// The first `Invalid` segment, if any.
    pub fn validity_error(&self) -> Option<&str> {
        match self {
            Selector::Invalid(reason) => Some(reason),
            Selector::Chain(parts) => parts.iter().find_map(|p| p.validity_error()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
