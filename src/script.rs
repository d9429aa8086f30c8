use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Writing systems a corpus can target or treat as foreign noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Script {
    Greek,
    Latin,
    Han,
    Arabic,
    Hebrew,
    Devanagari,
    Gujarati,
    Cyrillic,
}

impl Script {
    /// Block membership only; callers pair this with `is_alphabetic` when counting letters.
    pub fn contains(self, c: char) -> bool {
        let u = c as u32;
        match self {
            Script::Greek => (0x0370..=0x03FF).contains(&u) || (0x1F00..=0x1FFF).contains(&u),
            Script::Latin => {
                c.is_ascii_alphabetic()
                    || (0x00C0..=0x024F).contains(&u)
                    || (0x1E00..=0x1EFF).contains(&u)
                    || (0x2C60..=0x2C7F).contains(&u)
                    || (0xA720..=0xA7FF).contains(&u)
            }
            Script::Han => {
                (0x4E00..=0x9FFF).contains(&u)
                    || (0x3400..=0x4DBF).contains(&u)
                    || (0xF900..=0xFAFF).contains(&u)
                    || (0x20000..=0x2A6DF).contains(&u)
            }
            Script::Arabic => {
                (0x0600..=0x06FF).contains(&u)
                    || (0x0750..=0x077F).contains(&u)
                    || (0xFB50..=0xFDFF).contains(&u)
                    || (0xFE70..=0xFEFF).contains(&u)
            }
            Script::Hebrew => (0x0590..=0x05FF).contains(&u) || (0xFB1D..=0xFB4F).contains(&u),
            Script::Devanagari => (0x0900..=0x097F).contains(&u),
            Script::Gujarati => (0x0A80..=0x0AFF).contains(&u),
            Script::Cyrillic => (0x0400..=0x052F).contains(&u),
        }
    }

    pub fn is_letter(self, c: char) -> bool {
        c.is_alphabetic() && self.contains(c)
    }

    pub fn has_case(self) -> bool {
        matches!(self, Script::Greek | Script::Latin | Script::Cyrillic)
    }

    fn property(self) -> &'static str {
        match self {
            Script::Greek => "Greek",
            Script::Latin => "Latin",
            Script::Han => "Han",
            Script::Arabic => "Arabic",
            Script::Hebrew => "Hebrew",
            Script::Devanagari => "Devanagari",
            Script::Gujarati => "Gujarati",
            Script::Cyrillic => "Cyrillic",
        }
    }

    /// Regex class for any letter of this script, usable on its own or nested in `[...]`.
    pub fn class(self) -> String {
        format!(r"\p{{{}}}", self.property())
    }

    /// Capital letters. Caseless scripts treat every letter as a valid sentence start.
    pub fn upper_class(self) -> String {
        if self.has_case() {
            format!(r"[\p{{{}}}&&\p{{Lu}}]", self.property())
        } else {
            self.class()
        }
    }

    pub fn lower_class(self) -> String {
        if self.has_case() {
            format!(r"[\p{{{}}}&&\p{{Ll}}]", self.property())
        } else {
            self.class()
        }
    }

    /// Expand `{script}`, `{upper}` and `{lower}` placeholders in a profile pattern.
    pub fn expand(self, pattern: &str) -> String {
        pattern
            .replace("{script}", &self.class())
            .replace("{upper}", &self.upper_class())
            .replace("{lower}", &self.lower_class())
    }
}

/// Combining diacritics that survive NFC on polytonic text.
pub fn is_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F | 0x1DC0..=0x1DFF)
}

/// A character that belongs inside a target-script word.
pub fn is_word_char(c: char, script: Script) -> bool {
    script.is_letter(c) || is_mark(c)
}

/// Non-empty and made only of target-script letters and marks.
pub fn is_script_word(token: &str, script: Script) -> bool {
    !token.is_empty() && token.chars().all(|c| is_word_char(c, script)) && has_script(token, script)
}

pub fn nfc(text: &str) -> String {
    text.nfc().collect()
}

pub fn alpha_count(text: &str) -> usize {
    text.chars().filter(|c| c.is_alphabetic()).count()
}

pub fn script_count(text: &str, script: Script) -> usize {
    text.chars().filter(|&c| script.is_letter(c)).count()
}

/// Target-script letters over all letters; 0.0 when the text has no letters.
pub fn script_ratio(text: &str, script: Script) -> f64 {
    let total = alpha_count(text);
    if total == 0 {
        return 0.0;
    }
    script_count(text, script) as f64 / total as f64
}

pub fn has_script(text: &str, script: Script) -> bool {
    text.chars().any(|c| script.is_letter(c))
}

fn first_letter(text: &str) -> Option<char> {
    text.trim_start().chars().next()
}

pub fn starts_with_upper(text: &str, script: Script) -> bool {
    match first_letter(text) {
        Some(c) if script.is_letter(c) => !script.has_case() || c.is_uppercase(),
        _ => false,
    }
}

pub fn starts_with_lower(text: &str, script: Script) -> bool {
    match first_letter(text) {
        Some(c) if script.is_letter(c) => script.has_case() && c.is_lowercase(),
        _ => false,
    }
}

/// Words of three or more letters that carry no target-script letter.
pub fn foreign_words(text: &str, script: Script) -> usize {
    text.split(|c: char| !c.is_alphabetic())
        .filter(|w| w.chars().count() >= 3 && !w.chars().any(|c| script.contains(c)))
        .count()
}

/// Length of the longest run of consecutive target-script letters.
pub fn longest_script_run(text: &str, script: Script) -> usize {
    let mut best = 0;
    let mut run = 0;
    for c in text.chars() {
        if script.is_letter(c) {
            run += 1;
            best = best.max(run);
        } else {
            run = 0;
        }
    }
    best
}

/// Character count, which is what every length threshold in a profile measures.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_ignores_punctuation_and_digits() {
        assert_eq!(script_ratio("λόγος, 123.", Script::Greek), 1.0);
        assert_eq!(script_ratio("123", Script::Greek), 0.0);
        let mixed = script_ratio("λόγος codices", Script::Greek);
        assert!(mixed > 0.4 && mixed < 0.5);
    }

    #[test]
    fn caseless_script_starts_count_as_upper() {
        assert!(starts_with_upper("天下", Script::Han));
        assert!(!starts_with_lower("天下", Script::Han));
        assert!(starts_with_lower("καὶ", Script::Greek));
        assert!(starts_with_upper("Τούτου", Script::Greek));
    }

    #[test]
    fn nfc_folds_greek_question_mark() {
        assert_eq!(nfc("τί\u{037E}"), "τί;");
    }
}
