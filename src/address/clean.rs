use std::sync::LazyLock;
use regex::{Captures, Regex};
use crate::address::tables::{lookup, DIRECTIONALS, STATES, SUFFIXES};

static DIRECTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| whole_word_alternation(DIRECTIONALS));
static SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| whole_word_alternation(SUFFIXES));

/// Build `\b(?:K1|K2|...)\b` from the keys of a table, in table order.
///
/// The regex engine picks alternatives leftmost-first, so a key that is a
/// prefix of a later key (`NORTH`, `NORTHEAST`) still only matches a whole word.
pub(crate) fn whole_word_alternation(table: &[(&str, &str)]) -> Regex {
    let alternatives = table
        .iter()
        .map(|(long, _)| regex::escape(long))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternatives})\b")).expect("table keys form a valid regex")
}

/// Replace every whole-word key of `table` matched by `re` with its abbreviation.
pub(crate) fn replace_whole_words(re: &Regex, table: &'static [(&'static str, &'static str)], text: &str) -> String {
    re.replace_all(text, |caps: &Captures| {
        let word = &caps[0];
        lookup(table, word).unwrap_or(word).to_string()
    })
        .into_owned()
}

/// collapse every run of whitespace into one space and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Upper-case `text` and drop everything except alphanumerics, whitespace, `#` and `-`.
pub fn clean(text: &str) -> String {
    let kept = text
        .trim()
        .to_uppercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '#' | '-'))
        .collect::<String>();
    collapse_whitespace(&kept)
}

/// Abbreviate directionals (`NORTH` -> `N`), then street suffixes (`STREET` -> `ST`).
///
/// Expects already upper-cased text; matching is case-sensitive.
pub fn canonicalize(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = replace_whole_words(&DIRECTIONAL_RE, DIRECTIONALS, text);
    let text = replace_whole_words(&SUFFIX_RE, SUFFIXES, &text);
    collapse_whitespace(&text)
}

/// Map a state name to its 2-letter code.
///
/// Unknown names come back cleaned but untranslated.
pub fn standardize_state(input: &str) -> String {
    let upper = input.trim().to_uppercase();
    if upper.chars().count() == 2 && upper.chars().all(char::is_alphabetic) {
        return upper;
    }

    let cleaned = collapse_whitespace(
        &upper
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect::<String>(),
    );
    if let Some(code) = lookup(STATES, &cleaned) {
        return code.to_string();
    }
    // "WASHINGTON STATE"
    if let Some(code) = cleaned
        .strip_suffix(" STATE")
        .and_then(|name| lookup(STATES, name))
    {
        return code.to_string();
    }
    cleaned
}

/// Reduce a ZIP to its digits, formatting ZIP+4 as `DDDDD-DDDD`.
///
/// Other digit counts pass through as bare digits; input without digits yields "".
pub fn standardize_zip(input: &str) -> String {
    let digits = input
        .chars()
        .filter(char::is_ascii_digit)
        .collect::<String>();
    if digits.len() == 9 {
        format!("{}-{}", &digits[..5], &digits[5..])
    } else {
        digits
    }
}
