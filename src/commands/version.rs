//! # Version Command Implementation
//!
//! Prints the version, commit and build date. The commit and date are taken
//! from `METAREPO_BUILD_COMMIT` and `METAREPO_BUILD_DATE` at compile time.

use anyhow::Result;

const VERSION: &str = env!("CARGO_PKG_VERSION");
const COMMIT: Option<&str> = option_env!("METAREPO_BUILD_COMMIT");
const BUILD_DATE: Option<&str> = option_env!("METAREPO_BUILD_DATE");

/// Execute the `version` command.
pub fn execute() -> Result<()> {
    println!("{}", render(COMMIT, BUILD_DATE));
    Ok(())
}

fn render(commit: Option<&str>, date: Option<&str>) -> String {
    format!(
        "metarepo {}\n  commit: {}\n  built:  {}",
        VERSION,
        commit.unwrap_or("none"),
        date.unwrap_or("unknown")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_defaults() {
        let text = render(None, None);
        assert!(text.starts_with(&format!("metarepo {}", VERSION)));
        assert!(text.contains("commit: none"));
        assert!(text.contains("built:  unknown"));
    }

    #[test]
    fn test_render_build_metadata() {
        let text = render(Some("abc1234"), Some("2024-05-01"));
        assert!(text.contains("commit: abc1234"));
        assert!(text.contains("built:  2024-05-01"));
    }
}
