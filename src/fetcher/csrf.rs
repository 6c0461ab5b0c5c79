use regex::Regex;

pub const DEFAULT_CSRF_COOKIE: &str = "csrftoken";
pub const CSRF_HEADER: &str = "X-CSRFToken";
pub const CSRF_FORM_FIELD: &str = "csrfmiddlewaretoken";

/// Where the anti-forgery token for mutating requests comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CsrfSource {
    /// A token supplied directly (CLI flag or config file).
    Token(String),
    /// A cookie, read from an explicit `Cookie` header string if given,
    /// otherwise from the client's cookie jar after fetching `page`.
    Cookie {
        name: String,
        header: Option<String>,
        page: String,
    },
    /// A hidden `csrfmiddlewaretoken` form field embedded in `page`.
    FormField { page: String },
    /// Send no token; the backend is expected to exempt the endpoints.
    Disabled,
}

impl Default for CsrfSource {
    fn default() -> Self {
        CsrfSource::Cookie {
            name: DEFAULT_CSRF_COOKIE.to_string(),
            header: None,
            page: String::new(),
        }
    }
}

/// Finds `name` in a `Cookie` header string (`a=1; csrftoken=xyz`).
pub fn cookie_value(cookie_header: &str, name: &str) -> Option<String> {
    let prefix = format!("{name}=");
    cookie_header
        .split(';')
        .map(|c| c.trim())
        .find_map(|c| c.strip_prefix(prefix.as_str()))
        .map(|raw| {
            urlencoding::decode(raw)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| raw.to_string())
        })
        .filter(|v| !v.is_empty())
}

/// Extracts the value of the hidden CSRF form field from an HTML page.
pub fn form_field_token(html: &str) -> Option<String> {
    let name_first = Regex::new(&format!(
        r#"name\s*=\s*["']{CSRF_FORM_FIELD}["'][^>]*?value\s*=\s*["']([^"']+)["']"#
    ))
    .ok()?;
    if let Some(cap) = name_first.captures(html) {
        return Some(cap[1].to_string());
    }
    let value_first = Regex::new(&format!(
        r#"value\s*=\s*["']([^"']+)["'][^>]*?name\s*=\s*["']{CSRF_FORM_FIELD}["']"#
    ))
    .ok()?;
    value_first.captures(html).map(|cap| cap[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_value_finds_and_decodes_token() {
        let header = "sessionid=abc; csrftoken=tok%2B123; theme=dark";
        assert_eq!(cookie_value(header, "csrftoken").as_deref(), Some("tok+123"));
        assert_eq!(cookie_value(header, "missing"), None);
        assert_eq!(cookie_value("csrftoken=", "csrftoken"), None);
    }

    #[test]
    fn cookie_name_must_match_exactly() {
        assert_eq!(cookie_value("xcsrftoken=bad; csrftoken=good", "csrftoken").as_deref(), Some("good"));
    }

    #[test]
    fn form_field_token_handles_attribute_order() {
        let a = r#"<input type="hidden" name="csrfmiddlewaretoken" value="AbC123">"#;
        let b = r#"<input value='XyZ' type='hidden' name='csrfmiddlewaretoken'>"#;
        assert_eq!(form_field_token(a).as_deref(), Some("AbC123"));
        assert_eq!(form_field_token(b).as_deref(), Some("XyZ"));
        assert_eq!(form_field_token("<form></form>"), None);
    }
}
