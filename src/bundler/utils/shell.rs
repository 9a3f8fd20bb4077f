//! Quoting of values interpolated into shell scripts and remote command lines.

/// Quotes `value` so a POSIX shell reads it back as one literal word.
///
/// Values made only of characters with no special meaning are returned
/// unchanged; anything else is wrapped in single quotes, with embedded single
/// quotes rendered as `'\''`.
pub fn quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./,:=@%+".contains(c));

    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Joins `args` into a single command line with every argument quoted.
pub fn join<S: AsRef<str>>(args: &[S]) -> String {
    args.iter()
        .map(|a| quote(a.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_words_stay_unquoted() {
        assert_eq!(quote("my-app"), "my-app");
        assert_eq!(quote("/opt/my-app/bin"), "/opt/my-app/bin");
        assert_eq!(quote("PORT=5000"), "PORT=5000");
    }

    #[test]
    fn metacharacters_are_neutralised() {
        assert_eq!(quote(""), "''");
        assert_eq!(quote("a b"), "'a b'");
        assert_eq!(quote("$(rm -rf /)"), "'$(rm -rf /)'");
        assert_eq!(quote("it's"), r"'it'\''s'");
        assert_eq!(quote("x`id`;y"), "'x`id`;y'");
    }

    #[test]
    fn join_quotes_each_argument() {
        assert_eq!(
            join(&["pkgr", "package", "-", "--description", "My app; really"]),
            "pkgr package - --description 'My app; really'"
        );
    }
}
