/// Link and label text that roster templates render next to real names.
const BOILERPLATE: &[&str] = &[
    "full bio",
    "view bio",
    "bio",
    "read more",
    "view profile",
    "profile",
    "roster",
    "full roster",
    "coaches",
    "coaching staff",
    "staff directory",
    "schedule",
    "news",
    "print",
    "view all",
    "headshot",
];

pub const MIN_NAME_LEN: usize = 3;
pub const MAX_NAME_LEN: usize = 49;

/// Canonical form used for identity matching.
///
/// Lowercases, drops apostrophes and periods, turns hyphens and other
/// punctuation into spaces, and collapses whitespace. Runs of single-letter
/// tokens are joined so initials compare equal however they were punctuated
/// ("A. J. Terry", "A.J. Terry" and "AJ Terry" all become "aj terry").
pub fn normalize_name(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\'' | '\u{2018}' | '\u{2019}' | '`' | '.' => {}
            c if c.is_alphanumeric() => cleaned.extend(c.to_lowercase()),
            _ => cleaned.push(' '),
        }
    }

    let mut tokens: Vec<String> = Vec::new();
    let mut initials = String::new();
    for token in cleaned.split_whitespace() {
        if token.chars().count() == 1 {
            initials.push_str(token);
            continue;
        }
        if !initials.is_empty() {
            tokens.push(std::mem::take(&mut initials));
        }
        tokens.push(token.to_string());
    }
    if !initials.is_empty() {
        tokens.push(initials);
    }

    tokens.join(" ")
}

/// Whitespace tokens of an already-normalized name.
pub fn name_tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}

/// Whether scraped link/cell text looks like a person's name rather than
/// navigation chrome.
pub fn is_plausible_name(raw: &str) -> bool {
    let trimmed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let len = trimmed.chars().count();
    if !(MIN_NAME_LEN..=MAX_NAME_LEN).contains(&len) {
        return false;
    }
    if !trimmed.chars().any(char::is_alphabetic) {
        return false;
    }
    let lowered = trimmed.to_lowercase();
    !BOILERPLATE.contains(&lowered.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apostrophes_and_hyphens_normalize_equal() {
        assert_eq!(normalize_name("O'Brien-Smith"), normalize_name("obrien smith"));
        assert_eq!(normalize_name("O’Brien-Smith"), "obrien smith");
    }

    #[test]
    fn initials_collapse() {
        assert_eq!(normalize_name("A. J. Terry"), "aj terry");
        assert_eq!(normalize_name("A.J. Terry"), "aj terry");
        assert_eq!(normalize_name("AJ Terry"), "aj terry");
    }

    #[test]
    fn single_initial_is_kept_as_token() {
        assert_eq!(normalize_name("C. Booler"), "c booler");
    }

    #[test]
    fn whitespace_collapses() {
        assert_eq!(normalize_name("  Mary   Ann\tLee \n"), "mary ann lee");
    }

    #[test]
    fn plausible_name_bounds() {
        assert!(is_plausible_name("Li Na"));
        assert!(!is_plausible_name("Al"));
        assert!(!is_plausible_name(&"x".repeat(50)));
        assert!(is_plausible_name(&"x".repeat(49)));
        assert!(!is_plausible_name("Full Bio"));
        assert!(!is_plausible_name("  full   bio "));
        assert!(!is_plausible_name("2024"));
    }
}
