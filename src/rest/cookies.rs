//! Set-Cookie extraction
//!
//! The login endpoints establish the session via `Set-Cookie` response
//! headers. Most HTTP stacks expose repeated headers individually, but
//! some intermediaries fold them into one comma-joined value, so the
//! splitter must cope with both. Splitting on `,` is not safe naively:
//! `expires=Wed, 21 Oct 2025 …` attribute values and `"`-quoted cookie
//! values legitimately contain commas.
//!
//! A comma is a split point only when the text after it looks like the
//! start of a new cookie (`name=`) and does not begin with a weekday
//! token. Only the `name=value` prefix of each cookie is kept; the
//! attributes are the browser's concern, not ours.

use std::sync::OnceLock;

use regex::Regex;

/// Matches text that starts like a new cookie: optional whitespace, a
/// token free of `=`, `;`, and whitespace, then `=`.
fn cookie_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*[^=;\s]+\s*=").expect("cookie_start regex is valid"))
}

/// Matches text that begins with an HTTP weekday token, as found after
/// the comma inside `expires=` dates.
fn weekday_start() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun)").expect("weekday regex is valid")
    })
}

/// Extract session cookies from a REST response.
///
/// Prefers the multi-header view (each `Set-Cookie` line separately) and
/// additionally splits any comma-joined lines. Returns the `name=value`
/// prefix of each cookie, attributes discarded.
pub fn extract_cookies(response: &reqwest::Response) -> Vec<String> {
    let mut cookies = Vec::new();
    for value in response.headers().get_all(reqwest::header::SET_COOKIE) {
        let Ok(text) = value.to_str() else {
            tracing::warn!("skipping non-UTF8 Set-Cookie header");
            continue;
        };
        for cookie in split_set_cookie(text) {
            cookies.push(name_value(&cookie).to_string());
        }
    }
    cookies
}

/// Split a (possibly comma-joined) `Set-Cookie` value into individual
/// cookie strings, honoring quoted regions and `expires=` dates.
pub fn split_set_cookie(value: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;

    for (index, c) in value.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                let rest = &value[index + 1..];
                if cookie_start().is_match(rest) && !weekday_start().is_match(rest) {
                    let piece = value[start..index].trim();
                    if !piece.is_empty() {
                        parts.push(piece.to_string());
                    }
                    start = index + 1;
                }
            }
            _ => {}
        }
    }

    let tail = value[start..].trim();
    if !tail.is_empty() {
        parts.push(tail.to_string());
    }
    parts
}

/// The `name=value` prefix of a cookie string, attributes stripped.
pub fn name_value(cookie: &str) -> &str {
    cookie.split(';').next().unwrap_or("").trim()
}
