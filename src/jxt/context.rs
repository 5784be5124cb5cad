use crate::element::Element;

use super::registry::Registry;

/// Caller-facing knobs for a single import or export run.
#[derive(Debug, Clone, Default)]
pub struct TranslationOptions {
    pub lang: Option<String>,
    pub accept_languages: Vec<String>,
}

/// State threaded through an import or export traversal.
pub struct TranslationContext<'a> {
    pub registry: &'a Registry,
    pub lang: String,
    pub accept_languages: Vec<String>,
    pub path: String,
    pub path_selector: Option<String>,
    // Exporting only: the default namespace and element being built by
    // the parent translator.
    pub namespace: Option<String>,
    pub element: Option<Element>,
}

impl<'a> TranslationContext<'a> {
    pub fn new(registry: &'a Registry, options: &TranslationOptions) -> TranslationContext<'a> {
        TranslationContext {
            registry,
            lang: options
                .lang
                .as_deref()
                .unwrap_or("")
                .to_lowercase(),
            accept_languages: options
                .accept_languages
                .iter()
                .map(|lang| lang.to_lowercase())
                .collect(),
            path: String::new(),
            path_selector: None,
            namespace: None,
            element: None,
        }
    }

    pub fn resolve_language(&self, available: &[String]) -> String {
        self.registry
            .resolve_language(available, &self.accept_languages, &self.lang)
    }

    pub fn sanitizer(&self, name: &str) -> Option<super::registry::Sanitizer> {
        self.registry.sanitizer(name)
    }
}

/// Picks the best language from `available`: an exact accept-language
/// match first, then a primary-subtag match, then the context language,
/// else the first available language.
pub fn basic_language_resolver(
    available: &[String],
    accept_languages: &[String],
    current: &str,
) -> String {
    for accept in accept_languages {
        if available.iter().any(|lang| lang == accept) {
            return accept.clone();
        }
        let primary = accept.split('-').next().unwrap_or(accept);
        if let Some(found) = available
            .iter()
            .find(|lang| lang.split('-').next().unwrap_or(lang) == primary)
        {
            return found.clone();
        }
    }
    if available.iter().any(|lang| lang == current) {
        return current.to_string();
    }
    available.first().cloned().unwrap_or_default()
}
