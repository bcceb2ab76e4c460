use std::fmt;

use crate::log;

/// Number of decimal digits on the meter display.
pub const DECIMAL_DIGITS: usize = 3;

/// Keeps only ASCII digits from raw OCR text.
///
/// Tesseract may emit whitespace, stray punctuation, or non-ASCII digit
/// look-alikes; none of them belong in a reading.
pub fn extract_digits(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Counts ASCII digits in the text.
pub fn count_digits(text: &str) -> usize {
    text.chars().filter(|c| c.is_ascii_digit()).count()
}

/// One OCR attempt on the integer region, ranked by its digit counts.
///
/// Field order matters: candidates compare by significant digits, then
/// total digits, then the digit string itself.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Candidate {
    /// Digit count with leading zeros stripped
    pub significant: usize,
    /// Total digit count
    pub total: usize,
    pub digits: String,
}

impl Candidate {
    /// Builds a candidate from raw OCR text; None when it has no digits.
    pub fn from_text(text: &str) -> Option<Self> {
        let digits = extract_digits(text);
        if digits.is_empty() {
            return None;
        }
        Some(Self {
            significant: digits.trim_start_matches('0').len(),
            total: digits.len(),
            digits,
        })
    }
}

/// Picks the integer digits from the ranked attempts.
///
/// The best region candidate wins if it has at least 2 significant digits.
/// Otherwise the best of all candidates (region and full-image) is used.
/// With no candidates at all the result is empty.
pub fn select_integer(region: &[Candidate], full_image: &[Candidate]) -> String {
    if let Some(best) = region.iter().max() {
        if best.significant >= 2 {
            return best.digits.clone();
        }
    }

    let best = region.iter().chain(full_image.iter()).max();
    match best {
        Some(candidate) => {
            log(&format!(
                "Integer fallback to best overall candidate: {:?}",
                candidate.digits
            ));
            candidate.digits.clone()
        }
        None => String::new(),
    }
}

/// A formatted meter reading.
///
/// The integer part has no leading zeros unless it is exactly "0"; the
/// decimal part holds 1 to 3 digits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reading {
    pub integer: String,
    pub decimal: String,
}

impl Reading {
    /// Schema-valid placeholder for a capture where nothing was recognized.
    pub fn placeholder() -> Self {
        Self {
            integer: "0".to_string(),
            decimal: "0".to_string(),
        }
    }

    /// Builds a reading from raw integer and decimal text.
    ///
    /// Non-digits are dropped, the decimal part is truncated to 3 digits,
    /// and empty parts become "0".
    pub fn from_parts(integer: &str, decimal: &str) -> Self {
        Self {
            integer: normalize_integer(&extract_digits(integer)),
            decimal: normalize_decimal(&extract_digits(decimal)),
        }
    }

    /// Builds a reading from one run of digits whose last 3 are decimals.
    ///
    /// Up to 3 digits are all decimals, zero-padded on the left.
    pub fn from_flat_digits(text: &str) -> Self {
        let flat = extract_digits(text);
        if flat.is_empty() {
            return Self::placeholder();
        }
        if flat.len() <= DECIMAL_DIGITS {
            return Self {
                integer: "0".to_string(),
                decimal: format!("{:0>width$}", flat, width = DECIMAL_DIGITS),
            };
        }
        let (integer, decimal) = flat.split_at(flat.len() - DECIMAL_DIGITS);
        Self {
            integer: normalize_integer(integer),
            decimal: decimal.to_string(),
        }
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.integer, self.decimal)
    }
}

fn normalize_integer(digits: &str) -> String {
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Truncates decimal digits to 3; empty becomes "0".
pub fn normalize_decimal(digits: &str) -> String {
    if digits.is_empty() {
        return "0".to_string();
    }
    digits.chars().take(DECIMAL_DIGITS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str) -> Candidate {
        Candidate::from_text(text).unwrap()
    }

    #[test]
    fn test_extract_digits() {
        assert_eq!(extract_digits("1 44\n"), "144");
        assert_eq!(extract_digits("7.8-6"), "786");
        assert_eq!(extract_digits("abc"), "");
        // Non-ASCII digits are not meter digits
        assert_eq!(extract_digits("١٢3"), "3");
    }

    #[test]
    fn test_candidate_scores() {
        let c = candidate("00144");
        assert_eq!(c.significant, 3);
        assert_eq!(c.total, 5);
        assert_eq!(c.digits, "00144");
        assert!(Candidate::from_text(" \n").is_none());
    }

    #[test]
    fn test_candidate_ordering() {
        assert!(candidate("144") > candidate("0014"));
        // Same significant count: more total digits wins
        assert!(candidate("0144") > candidate("144"));
        assert!(candidate("144") > candidate("44"));
    }

    #[test]
    fn test_select_integer_prefers_region_with_two_significant() {
        let region = vec![candidate("14"), candidate("144"), candidate("7")];
        let full = vec![candidate("1447860")];
        assert_eq!(select_integer(&region, &full), "144");
    }

    #[test]
    fn test_select_integer_falls_back_to_overall_best() {
        let region = vec![candidate("7"), candidate("00")];
        let full = vec![candidate("144786")];
        assert_eq!(select_integer(&region, &full), "144786");
    }

    #[test]
    fn test_select_integer_single_weak_candidate() {
        let region = vec![candidate("7")];
        assert_eq!(select_integer(&region, &[]), "7");
    }

    #[test]
    fn test_select_integer_empty() {
        assert_eq!(select_integer(&[], &[]), "");
    }

    #[test]
    fn test_reading_from_parts() {
        assert_eq!(Reading::from_parts("0144", "786").to_string(), "144.786");
        assert_eq!(Reading::from_parts("", "").to_string(), "0.0");
        assert_eq!(Reading::from_parts("000", "78612").to_string(), "0.786");
        assert_eq!(Reading::from_parts("12", "7").to_string(), "12.7");
    }

    #[test]
    fn test_reading_from_flat_digits() {
        assert_eq!(Reading::from_flat_digits("144786").to_string(), "144.786");
        assert_eq!(Reading::from_flat_digits("144.786").to_string(), "144.786");
        assert_eq!(Reading::from_flat_digits("86").to_string(), "0.086");
        assert_eq!(Reading::from_flat_digits("000786").to_string(), "0.786");
        assert_eq!(Reading::from_flat_digits("").to_string(), "0.0");
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(Reading::placeholder().to_string(), "0.0");
    }
}
