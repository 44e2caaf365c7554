use std::borrow::Cow;

/// Scrub credential material out of text that may end up in logs or error
/// details: bearer headers, refresh-token query params and JSON fields.
pub fn redact_credentials(input: &str) -> Cow<'_, str> {
    let mut redacted = input.to_string();

    for marker in ["refreshToken=", "refreshtoken="] {
        redacted = scrub_after(redacted, marker, |ch| {
            ch == '&' || ch == ';' || ch == '"' || ch.is_whitespace()
        });
    }
    redacted = scrub_after(redacted, "\"refreshToken\":\"", |ch| ch == '"');
    redacted = scrub_after(redacted, "Bearer ", |ch| {
        !(ch.is_ascii_alphanumeric() || ch == '.' || ch == '_' || ch == '-')
    });

    if redacted == input {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(redacted)
    }
}

/// Replace everything between each `marker` occurrence and the first char
/// matching `stops` with `REDACTED`.
fn scrub_value(haystack: &str, marker: &str, stops: impl Fn(char) -> bool) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(idx) = rest.find(marker) {
        out.push_str(&rest[..idx + marker.len()]);
        rest = &rest[idx + marker.len()..];

        let mut consumed = 0;
        for ch in rest.chars() {
            if stops(ch) {
                break;
            }
            consumed += ch.len_utf8();
        }
        out.push_str("REDACTED");
        rest = &rest[consumed..];
    }
    out.push_str(rest);
    out
}

fn scrub_after(haystack: String, marker: &str, stops: impl Fn(char) -> bool) -> String {
    if haystack.contains(marker) {
        scrub_value(&haystack, marker, stops)
    } else {
        haystack
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_tokens_are_scrubbed() {
        let input = "request failed: Authorization: Bearer eyJhbGci.abc-123, retrying";
        assert_eq!(
            redact_credentials(input),
            "request failed: Authorization: Bearer REDACTED, retrying"
        );
    }

    #[test]
    fn refresh_token_params_are_scrubbed() {
        let input = "POST /auth/refresh?refreshToken=rt-0815&cityId=3";
        assert_eq!(
            redact_credentials(input),
            "POST /auth/refresh?refreshToken=REDACTED&cityId=3"
        );
    }

    #[test]
    fn refresh_token_json_fields_are_scrubbed() {
        let input = r#"body was {"refreshToken":"rt-0815","cityId":3}"#;
        assert_eq!(
            redact_credentials(input),
            r#"body was {"refreshToken":"REDACTED","cityId":3}"#
        );
    }

    #[test]
    fn clean_text_is_borrowed_unchanged() {
        let input = "connection refused";
        assert!(matches!(redact_credentials(input), Cow::Borrowed(_)));
    }
}
