pub(crate) fn append_query(url: &str, params: &[(&str, &str)]) -> String {
    let mut out = url.to_string();
    let sep = if url.contains('?') { '&' } else { '?' };
    out.push(sep);
    let mut first = true;
    for (k, v) in params {
        if !first {
            out.push('&');
        }
        first = false;
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

/// Normalizes a vocabulary display name into a map key:
/// lower-cased, whitespace runs collapsed to single underscores.
pub(crate) fn normalize_key(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_query_uses_question_mark_then_ampersand() {
        let url = append_query("http://example.org/events", &[("where", "a"), ("limit", "5")]);
        assert_eq!(url, "http://example.org/events?where=a&limit=5");

        let url = append_query(&url, &[("offset", "10")]);
        assert_eq!(url, "http://example.org/events?where=a&limit=5&offset=10");
    }

    #[test]
    fn normalize_key_lowercases_and_underscores() {
        assert_eq!(normalize_key("Sampling Depth"), "sampling_depth");
        assert_eq!(normalize_key("  Valid   Range\t"), "valid_range");
        assert_eq!(normalize_key("pressure"), "pressure");
        assert_eq!(normalize_key(""), "");
    }
}
