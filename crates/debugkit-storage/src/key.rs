/// Composite storage key for one handler of one request: `<id>-<name>`.
pub fn composite_key(id: &str, name: &str) -> String {
    format!("{}-{}", id, name)
}

/// True when a handler key belongs to `handler_type`: either the bare tag
/// or a named key ending in `-<tag>`.
pub fn matches_type(name: &str, handler_type: &str) -> bool {
    name == handler_type
        || name
            .strip_suffix(handler_type)
            .is_some_and(|prefix| prefix.ends_with('-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_type() {
        assert!(matches_type("message", "message"));
        assert!(matches_type("boot-message", "message"));
        assert!(!matches_type("bootmessage", "message"));
        assert!(!matches_type("message-time", "message"));
    }

    #[test]
    fn test_composite_key() {
        assert_eq!(composite_key("abc", "boot-time"), "abc-boot-time");
    }
}
