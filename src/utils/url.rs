// src/utils/url.rs

//! URL manipulation utilities.

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    match base.join(href) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

/// Normalize an `<img src>` from a notice body to an absolute https URL.
///
/// Notice bodies mix absolute `https://`, plain `http://` and
/// protocol-relative `//host/...` sources.
///
/// # Examples
/// ```
/// use smus_crawler::utils::url::normalize_image_url;
/// use url::Url;
///
/// let base = Url::parse("https://topis.seoul.go.kr/notice/").unwrap();
/// assert_eq!(
///     normalize_image_url(&base, "//topis.seoul.go.kr/img/a.png"),
///     "https://topis.seoul.go.kr/img/a.png"
/// );
/// ```
pub fn normalize_image_url(base: &Url, src: &str) -> String {
    let resolved = resolve_url(base, src.trim());
    match resolved.strip_prefix("http://") {
        Some(rest) => format!("https://{rest}"),
        None => resolved,
    }
}
