use regex::{Captures, Regex};
use std::env;
use std::path::{Path, PathBuf};

/// Expand a leading `~` and `$VAR` / `${VAR}` references.
///
/// Unset variables are left untouched, matching shell `expandvars` behavior.
pub fn expand_user_vars(input: &str) -> String {
    expand_vars(&expand_user(input))
}

fn expand_user(input: &str) -> String {
    let Some(rest) = input.strip_prefix('~') else {
        return input.to_string();
    };
    if !(rest.is_empty() || rest.starts_with('/')) {
        return input.to_string();
    }
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => input.to_string(),
    }
}

fn expand_vars(input: &str) -> String {
    if !input.contains('$') {
        return input.to_string();
    }
    let pattern = Regex::new(r"\$(?:(\w+)|\{([^}]*)\})").expect("static env var pattern");
    pattern
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Expand `raw` and anchor it at `base` when it is still relative.
///
/// Existing paths are canonicalized; missing ones keep their joined form so
/// existence checks can report them verbatim.
pub fn resolve_path(base: &Path, raw: &str) -> PathBuf {
    let expanded = PathBuf::from(expand_user_vars(raw));
    let joined = if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    };
    joined.canonicalize().unwrap_or(joined)
}

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_set_variables_and_keeps_unset_ones() {
        env::set_var("REGMAN_UTIL_TEST_DIR", "/opt/rtl");
        assert_eq!(
            expand_user_vars("$REGMAN_UTIL_TEST_DIR/core.v"),
            "/opt/rtl/core.v"
        );
        assert_eq!(
            expand_user_vars("${REGMAN_UTIL_TEST_DIR}/core.v"),
            "/opt/rtl/core.v"
        );
        assert_eq!(
            expand_user_vars("$REGMAN_UTIL_TEST_UNSET/x"),
            "$REGMAN_UTIL_TEST_UNSET/x"
        );
    }

    #[test]
    fn expands_home_prefix_only() {
        let Some(home) = dirs::home_dir() else {
            return;
        };
        assert_eq!(
            expand_user_vars("~/rtl"),
            format!("{}/rtl", home.display())
        );
        assert_eq!(expand_user_vars("a~/rtl"), "a~/rtl");
        assert_eq!(expand_user_vars("~other/rtl"), "~other/rtl");
    }

    #[test]
    fn resolves_relative_paths_against_base() {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = dir.path().canonicalize().expect("canonical base");
        std::fs::write(base.join("top.v"), "module top; endmodule\n").expect("write");

        assert_eq!(resolve_path(&base, "top.v"), base.join("top.v"));
        assert_eq!(resolve_path(&base, "./missing.v"), base.join("./missing.v"));
        assert_eq!(resolve_path(&base, "/abs/x.v"), PathBuf::from("/abs/x.v"));
    }

    #[test]
    fn display_path_strips_base() {
        let base = Path::new("/work/proj");
        assert_eq!(
            display_path(Path::new("/work/proj/rtl/a.v"), Some(base)),
            "rtl/a.v"
        );
        assert_eq!(display_path(Path::new("/elsewhere"), Some(base)), "/elsewhere");
    }
}
