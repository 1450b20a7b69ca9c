//! Name validation shared by containers and records.

/// True when `name` is safe to use as a single filesystem path segment.
///
/// Allowed characters are ASCII letters, digits, `_`, `-`, `.` and `:`.
/// Names containing `..`, and the names `.` and `..` themselves, are rejected.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["rocky-9", "alpine_3.19", "sles:15.5", "default", "a", "x.y"] {
            assert!(valid_name(name), "{name}");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in [
            "", ".", "..", "a/b", "/abs", "../up", "a..b", "sp ace", "tab\tx", "nl\n", "nul\0",
            "bell\u{7}", "ütf", "semi;colon", "back\\slash",
        ] {
            assert!(!valid_name(name), "{name:?}");
        }
    }
}
