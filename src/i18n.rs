//! Supported languages, request-language detection and the English fallback rule.

use std::{convert::Infallible, fmt, future::Future, str::FromStr};

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};

use crate::cms::cache::mark_degraded;

/// Cookie set by the language switcher on the client.
pub const LANGUAGE_COOKIE: &str = "lang";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Fr,
    Zh,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::En, Language::Fr, Language::Zh];

    /// The language every lookup falls back to.
    pub const FALLBACK: Language = Language::En;

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Zh => "zh",
        }
    }

    /// Open Graph locale
    pub fn locale(self) -> &'static str {
        match self {
            Language::En => "en_US",
            Language::Fr => "fr_FR",
            Language::Zh => "zh_CN",
        }
    }

    pub fn is_fallback(self) -> bool {
        self == Self::FALLBACK
    }
}

impl Default for Language {
    fn default() -> Self {
        Self::FALLBACK
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported language '{0}'")]
pub struct UnsupportedLanguage(pub String);

impl FromStr for Language {
    type Err = UnsupportedLanguage;

    /// Accepts bare codes and BCP 47 tags by primary subtag (`fr-CA`, `zh-Hant`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let primary = s
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Ok(Language::En),
            "fr" => Ok(Language::Fr),
            "zh" => Ok(Language::Zh),
            _ => Err(UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Picks the highest-weighted supported language from an `Accept-Language` value.
pub fn parse_accept_language(header: &str) -> Option<Language> {
    let mut best: Option<(Language, f32)> = None;

    for part in header.split(',') {
        let mut pieces = part.split(';');
        let tag = pieces.next().unwrap_or_default().trim();
        if tag.is_empty() || tag == "*" {
            continue;
        }

        let quality = pieces
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if quality <= 0.0 {
            continue;
        }

        if let Ok(lang) = tag.parse::<Language>() {
            match best {
                Some((_, q)) if q >= quality => {}
                _ => best = Some((lang, quality)),
            }
        }
    }

    best.map(|(lang, _)| lang)
}

/// Resolves a request language: cookie first, then `Accept-Language`, then English.
pub fn detect_language(cookie: Option<&str>, accept_language: Option<&str>) -> Language {
    cookie
        .and_then(|c| c.parse().ok())
        .or_else(|| accept_language.and_then(parse_accept_language))
        .unwrap_or_default()
}

/// The `lang` query parameter, as used by the hreflang alternate URLs.
fn query_language(query: Option<&str>) -> Option<Language> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "lang")
        .and_then(|(_, value)| value.parse().ok())
}

/// Extractor for the caller's language: `?lang=`, then cookie, then
/// `Accept-Language`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLanguage(pub Language);

impl<S> FromRequestParts<S> for RequestLanguage
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let accept = parts
            .headers
            .get(axum::http::header::ACCEPT_LANGUAGE)
            .and_then(|v| v.to_str().ok());
        let language = query_language(parts.uri.query()).unwrap_or_else(|| {
            detect_language(jar.get(LANGUAGE_COOKIE).map(|c| c.value()), accept)
        });
        Ok(RequestLanguage(language))
    }
}

/// Looks up `language`, then English when that yields nothing.
///
/// A lookup error counts as "nothing" and is logged. Only one fallback step is
/// taken; when English is missing as well the result is `None`.
pub async fn resolve_with_fallback<T, E, F, Fut>(language: &str, mut lookup: F) -> Option<T>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: fmt::Display,
{
    match lookup(language.to_string()).await {
        Ok(Some(found)) => return Some(found),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(language = %language, error = %e, "localized lookup failed");
            mark_degraded();
        }
    }

    let fallback = Language::FALLBACK.code();
    if language == fallback {
        return None;
    }

    match lookup(fallback.to_string()).await {
        Ok(found) => found,
        Err(e) => {
            tracing::error!(error = %e, "fallback lookup failed");
            mark_degraded();
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_language_tags() {
        assert_eq!("fr-CA".parse::<Language>().unwrap(), Language::Fr);
        assert_eq!("ZH_hant".parse::<Language>().unwrap(), Language::Zh);
        assert!("de".parse::<Language>().is_err());
    }

    #[test]
    fn test_accept_language_prefers_highest_quality() {
        assert_eq!(
            parse_accept_language("de-DE,fr;q=0.7,zh-CN;q=0.9"),
            Some(Language::Zh)
        );
        assert_eq!(parse_accept_language("de,es;q=0.5"), None);
        assert_eq!(parse_accept_language("fr;q=0,en;q=0.2"), Some(Language::En));
    }

    #[test]
    fn test_cookie_wins_over_header() {
        assert_eq!(detect_language(Some("zh"), Some("fr")), Language::Zh);
        assert_eq!(detect_language(Some("klingon"), Some("fr")), Language::Fr);
        assert_eq!(detect_language(None, None), Language::En);
    }

    #[test]
    fn test_query_parameter() {
        assert_eq!(query_language(Some("page=2&lang=fr")), Some(Language::Fr));
        assert_eq!(query_language(Some("lang=xx")), None);
        assert_eq!(query_language(None), None);
    }

    #[tokio::test]
    async fn test_extractor_prefers_query_over_cookie() {
        let request = axum::http::Request::builder()
            .uri("/about?lang=zh")
            .header("cookie", "lang=fr")
            .body(())
            .unwrap();
        let (mut parts, _) = request.into_parts();
        let RequestLanguage(lang) = RequestLanguage::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        assert_eq!(lang, Language::Zh);
    }

    #[tokio::test]
    async fn test_fallback_uses_english_when_missing() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let result = resolve_with_fallback("fr", |lang| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(lang.clone());
                Ok::<_, String>(if lang == "en" { Some("hello") } else { None })
            }
        })
        .await;

        assert_eq!(result, Some("hello"));
        assert_eq!(*seen.lock().unwrap(), vec!["fr".to_string(), "en".to_string()]);
    }

    #[tokio::test]
    async fn test_fallback_treats_errors_as_missing() {
        let result = resolve_with_fallback("zh", |lang| async move {
            if lang == "zh" {
                Err("boom".to_string())
            } else {
                Ok(Some(42))
            }
        })
        .await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_english_is_not_looked_up_twice() {
        let calls = Arc::new(Mutex::new(0));
        let result: Option<()> = resolve_with_fallback("en", |_| {
            let calls = calls.clone();
            async move {
                *calls.lock().unwrap() += 1;
                Ok::<_, String>(None)
            }
        })
        .await;
        assert!(result.is_none());
        assert_eq!(*calls.lock().unwrap(), 1);
    }
}
