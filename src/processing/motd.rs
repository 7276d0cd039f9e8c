use std::sync::LazyLock;

use regex::Regex;

/// `§` followed by a color or format code. Servers whose text didn't survive
/// decoding send U+FFFD in place of the `§`.
static FORMATTING_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[§\x{FFFD}][0-9a-fk-or]").expect("valid regex"));

/// Strips formatting codes, trims every line, and drops blank lines.
pub fn clean_motd(motd: &str) -> String {
    FORMATTING_CODE
        .replace_all(motd, "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
