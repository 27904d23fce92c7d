//! Language-specific OCR correction.
//!
//! [`correct`] runs an ordered rule list for the target language and passes
//! text through untouched for languages without rules. Rules are plain text
//! rewrites with no state, and each rule's output is stable under its own
//! pattern, so running the whole list twice gives the same text as running
//! it once.
//!
//! Order matters. Digit-for-letter repair runs before the vocabulary pass so
//! that `wart0sc` becomes `wartosc` and then `wartość`; the company-form rule
//! runs first because it needs the `0.0.` spelling that later rules leave alone.

use crate::ocr::language::is_polish;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::borrow::Cow;

/// How a rule rewrites text.
#[derive(Debug)]
pub enum RuleKind {
    /// Regex replacement with `$n` group references.
    Replace { pattern: Regex, replacement: &'static str },
    /// A digit between two letters is read as the given letter (lower, upper).
    DigitBetweenLetters { digit: char, lower: char, upper: char },
    /// Whole-word vocabulary fixes, preserving the source word's capitalization.
    Vocabulary { pattern: Regex, words: &'static [(&'static str, &'static str)] },
}

#[derive(Debug)]
pub struct CorrectionRule {
    pub name: &'static str,
    pub kind: RuleKind,
}

impl CorrectionRule {
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        match &self.kind {
            RuleKind::Replace { pattern, replacement } => pattern.replace_all(text, *replacement),
            RuleKind::DigitBetweenLetters { digit, lower, upper } => {
                replace_digit_between_letters(text, *digit, *lower, *upper)
            }
            RuleKind::Vocabulary { pattern, words } => pattern.replace_all(text, |caps: &Captures<'_>| {
                let found = &caps[0];
                let key = found.to_lowercase();
                words
                    .iter()
                    .find(|(wrong, _)| *wrong == key)
                    .map(|(_, right)| match_case(found, right))
                    .unwrap_or_else(|| found.to_string())
            }),
        }
    }
}

const POLISH_VOCABULARY: &[(&str, &str)] = &[
    ("wartosc", "wartość"),
    ("sprzedazy", "sprzedaży"),
    ("platnosci", "płatności"),
    ("platnosc", "płatność"),
    ("slownie", "słownie"),
    ("ilosc", "ilość"),
    ("zlotych", "złotych"),
    ("uslugi", "usługi"),
    ("usluga", "usługa"),
    ("nalezy", "należy"),
    ("sposob", "sposób"),
    ("lacznie", "łącznie"),
    ("zaplaty", "zapłaty"),
    ("zaplacono", "zapłacono"),
];

fn compile(pattern: &str, name: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("{name} regex pattern is valid and should compile: {e}"))
}

static POLISH_RULES: Lazy<Vec<CorrectionRule>> = Lazy::new(|| {
    let vocabulary_alternation = POLISH_VOCABULARY
        .iter()
        .map(|(wrong, _)| *wrong)
        .collect::<Vec<_>>()
        .join("|");

    vec![
        CorrectionRule {
            name: "company_form",
            kind: RuleKind::Replace {
                pattern: compile(r"\b[Ss][Pp]\.?\s*z\s*[oO0]\.\s*[oO0]\b\.?", "Company form"),
                replacement: "Sp. z o.o.",
            },
        },
        CorrectionRule {
            name: "digit_zero_in_word",
            kind: RuleKind::DigitBetweenLetters {
                digit: '0',
                lower: 'o',
                upper: 'O',
            },
        },
        CorrectionRule {
            name: "digit_six_in_word",
            kind: RuleKind::DigitBetweenLetters {
                digit: '6',
                lower: 'ó',
                upper: 'Ó',
            },
        },
        CorrectionRule {
            name: "currency_zloty",
            kind: RuleKind::Replace {
                pattern: compile(r"(\d)[ \t]*(?:zł|zl|zt|z1)\b", "Currency"),
                replacement: "${1} zł",
            },
        },
        CorrectionRule {
            name: "vocabulary",
            kind: RuleKind::Vocabulary {
                pattern: compile(&format!(r"(?i)\b(?:{vocabulary_alternation})\b"), "Vocabulary"),
                words: POLISH_VOCABULARY,
            },
        },
        CorrectionRule {
            name: "street_abbreviation",
            kind: RuleKind::Replace {
                pattern: compile(r"\b([Uu]l)[ \t]+(\p{Lu})", "Street abbreviation"),
                replacement: "${1}. ${2}",
            },
        },
        CorrectionRule {
            name: "nip_label",
            kind: RuleKind::Replace {
                pattern: compile(r"\bNIP[ \t]*[:;]?[ \t]*(\d)", "NIP label"),
                replacement: "NIP: ${1}",
            },
        },
        CorrectionRule {
            name: "whitespace",
            kind: RuleKind::Replace {
                pattern: compile(r"[ \t]{2,}", "Whitespace"),
                replacement: " ",
            },
        },
    ]
});

/// Rules for `language`, if any exist.
pub fn rules_for(language: &str) -> Option<&'static [CorrectionRule]> {
    if is_polish(language) {
        Some(POLISH_RULES.as_slice())
    } else {
        None
    }
}

/// Apply the correction rules for `language` in declared order.
pub fn correct<'t>(text: &'t str, language: &str) -> Cow<'t, str> {
    let Some(rules) = rules_for(language) else {
        return Cow::Borrowed(text);
    };

    let mut current = Cow::Borrowed(text);
    for rule in rules {
        let rewritten = match rule.apply(&current) {
            Cow::Owned(rewritten) => rewritten,
            Cow::Borrowed(_) => continue,
        };
        current = Cow::Owned(rewritten);
    }
    current
}

fn replace_digit_between_letters(text: &str, digit: char, lower: char, upper: char) -> Cow<'_, str> {
    if !text.contains(digit) {
        return Cow::Borrowed(text);
    }

    let chars: Vec<char> = text.chars().collect();
    let mut changed = false;
    let mut out = String::with_capacity(text.len() + 8);

    for (i, &c) in chars.iter().enumerate() {
        let between_letters = c == digit
            && i > 0
            && i + 1 < chars.len()
            && chars[i - 1].is_alphabetic()
            && chars[i + 1].is_alphabetic();

        if between_letters {
            changed = true;
            if chars[i - 1].is_uppercase() && chars[i + 1].is_uppercase() {
                out.push(upper);
            } else {
                out.push(lower);
            }
        } else {
            out.push(c);
        }
    }

    if changed { Cow::Owned(out) } else { Cow::Borrowed(text) }
}

fn match_case(source: &str, replacement: &str) -> String {
    let letters: Vec<char> = source.chars().filter(|c| c.is_alphabetic()).collect();
    let first_upper = letters.first().is_some_and(|c| c.is_uppercase());
    let all_upper = letters.len() > 1 && letters.iter().all(|c| c.is_uppercase());

    if all_upper {
        replacement.to_uppercase()
    } else if first_upper {
        let mut chars = replacement.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        replacement.to_string()
    }
}
