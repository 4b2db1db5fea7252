// src/services/version.rs

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::{config::VERSION_LETTERS, error::AppError};

/// Matches the version suffix of a shuffled title: "(Shuffled A)" or
/// "(Shuffled A3)".
static VERSION_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<base>.*) \(Shuffled (?P<letter>[A-Z])(?P<number>\d+)?\)$")
        .expect("valid version suffix pattern")
});

/// Position of a title in the two-level shuffle lineage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lineage<'a> {
    /// An original paper.
    Root { base: &'a str },
    /// A shuffled copy; `number` is set for second-generation copies.
    Shuffled {
        base: &'a str,
        letter: char,
        number: Option<u32>,
    },
}

impl<'a> Lineage<'a> {
    pub fn parse(title: &'a str) -> Self {
        let Some(caps) = VERSION_SUFFIX.captures(title) else {
            return Lineage::Root { base: title };
        };

        let base = caps.name("base").map_or(title, |m| m.as_str());
        let letter = caps
            .name("letter")
            .and_then(|m| m.as_str().chars().next())
            .unwrap_or('A');
        let number = caps.name("number").and_then(|m| m.as_str().parse().ok());

        Lineage::Shuffled {
            base,
            letter,
            number,
        }
    }

    /// Title of the original paper this lineage hangs off.
    pub fn base(&self) -> &'a str {
        match self {
            Lineage::Root { base } | Lineage::Shuffled { base, .. } => *base,
        }
    }
}

/// Prefix to use when listing candidate sibling titles for `title`.
pub fn sibling_prefix(title: &str) -> &str {
    Lineage::parse(title).base()
}

/// Computes the next free version title for a shuffled copy of `title`.
///
/// * Root titles get the smallest unused letter: "Test (Shuffled C)".
/// * Shuffled titles keep their letter and get the smallest unused positive
///   number under it: "Test (Shuffled A2)". A numbered title anchors to its
///   letter as well, so the tree never grows past two levels.
pub fn next_version_title(title: &str, siblings: &[String]) -> Result<String, AppError> {
    match Lineage::parse(title) {
        Lineage::Root { base } => {
            let pattern = letter_sibling_pattern(base)?;
            let used: BTreeSet<char> = siblings
                .iter()
                .filter_map(|t| pattern.captures(t))
                .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().chars().next()))
                .collect();

            let letter = VERSION_LETTERS
                .into_iter()
                .find(|l| !used.contains(l))
                .ok_or_else(|| {
                    AppError::Conflict(format!("All version letters are taken for '{}'", base))
                })?;

            Ok(format!("{} (Shuffled {})", base, letter))
        }
        Lineage::Shuffled { base, letter, .. } => {
            let pattern = numbered_sibling_pattern(base, letter)?;
            let used: BTreeSet<u32> = siblings
                .iter()
                .filter_map(|t| pattern.captures(t))
                .filter_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
                .collect();

            let number = (1u32..)
                .find(|n| !used.contains(n))
                .ok_or_else(|| AppError::Conflict("Version numbers exhausted".to_string()))?;

            Ok(format!("{} (Shuffled {}{})", base, letter, number))
        }
    }
}

fn letter_sibling_pattern(base: &str) -> Result<Regex, AppError> {
    Regex::new(&format!(r"^{} \(Shuffled ([A-Z])\)$", regex::escape(base)))
        .map_err(|e| AppError::InternalServerError(e.to_string()))
}

fn numbered_sibling_pattern(base: &str, letter: char) -> Result<Regex, AppError> {
    Regex::new(&format!(
        r"^{} \(Shuffled {}(\d+)\)$",
        regex::escape(base),
        letter
    ))
    .map_err(|e| AppError::InternalServerError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn first_copy_of_a_root_gets_a() {
        assert_eq!(
            next_version_title("Test 1", &titles(&["Test 1"])).unwrap(),
            "Test 1 (Shuffled A)"
        );
    }

    #[test]
    fn root_takes_next_free_letter() {
        let siblings = titles(&["Test 1", "Test 1 (Shuffled A)", "Test 1 (Shuffled B)"]);
        assert_eq!(
            next_version_title("Test 1", &siblings).unwrap(),
            "Test 1 (Shuffled C)"
        );
    }

    #[test]
    fn root_fills_gaps_first() {
        let siblings = titles(&["Test 1 (Shuffled A)", "Test 1 (Shuffled C)"]);
        assert_eq!(
            next_version_title("Test 1", &siblings).unwrap(),
            "Test 1 (Shuffled B)"
        );
    }

    #[test]
    fn numbered_children_do_not_consume_letters() {
        let siblings = titles(&["Test 1 (Shuffled A1)", "Test 1 (Shuffled B2)"]);
        assert_eq!(
            next_version_title("Test 1", &siblings).unwrap(),
            "Test 1 (Shuffled A)"
        );
    }

    #[test]
    fn other_bases_sharing_a_prefix_are_ignored() {
        let siblings = titles(&["Test 10 (Shuffled A)", "Test 1 (Shuffled A)"]);
        assert_eq!(
            next_version_title("Test 1", &siblings).unwrap(),
            "Test 1 (Shuffled B)"
        );
    }

    #[test]
    fn shuffled_paper_gets_numbered_child() {
        let siblings = titles(&["Test 1 (Shuffled A)", "Test 1 (Shuffled A1)"]);
        assert_eq!(
            next_version_title("Test 1 (Shuffled A)", &siblings).unwrap(),
            "Test 1 (Shuffled A2)"
        );
    }

    #[test]
    fn numbered_children_are_counted_per_letter() {
        let siblings = titles(&["Test 1 (Shuffled A1)", "Test 1 (Shuffled B1)", "Test 1 (Shuffled B2)"]);
        assert_eq!(
            next_version_title("Test 1 (Shuffled B)", &siblings).unwrap(),
            "Test 1 (Shuffled B3)"
        );
        assert_eq!(
            next_version_title("Test 1 (Shuffled A)", &siblings).unwrap(),
            "Test 1 (Shuffled A2)"
        );
    }

    #[test]
    fn second_generation_stays_under_its_letter() {
        let siblings = titles(&["Test 1 (Shuffled A1)", "Test 1 (Shuffled A2)"]);
        assert_eq!(
            next_version_title("Test 1 (Shuffled A1)", &siblings).unwrap(),
            "Test 1 (Shuffled A3)"
        );
    }

    #[test]
    fn exhausted_letters_are_a_conflict() {
        let siblings: Vec<String> = ('A'..='Z').map(|l| format!("Quiz (Shuffled {})", l)).collect();
        assert!(matches!(
            next_version_title("Quiz", &siblings),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn lineage_parses_suffixes() {
        assert_eq!(Lineage::parse("Algebra"), Lineage::Root { base: "Algebra" });
        assert_eq!(
            Lineage::parse("Algebra (Shuffled D12)"),
            Lineage::Shuffled {
                base: "Algebra",
                letter: 'D',
                number: Some(12)
            }
        );
        assert_eq!(sibling_prefix("Algebra (Shuffled D)"), "Algebra");
        // Lowercase letters are not version suffixes.
        assert_eq!(sibling_prefix("Algebra (Shuffled d)"), "Algebra (Shuffled d)");
    }

    #[test]
    fn regex_metacharacters_in_titles_are_literal() {
        let siblings = titles(&["Unit 3 (a+b) (Shuffled A)"]);
        assert_eq!(
            next_version_title("Unit 3 (a+b)", &siblings).unwrap(),
            "Unit 3 (a+b) (Shuffled B)"
        );
    }
}
