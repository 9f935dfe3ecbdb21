//! Message numbering labels (1., A., I.) shared by the Markdown and PDF exporters

use serde::{Deserialize, Serialize};

/// Message numbering scheme for exported documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumberingStyle {
    None,
    #[default]
    Numeric,
    Letter,
    Roman,
}

/// Number label for a 1-based index, including the trailing dot.
/// Empty for [`NumberingStyle::None`].
pub fn format_number(style: NumberingStyle, index: usize) -> String {
    match style {
        NumberingStyle::None => String::new(),
        NumberingStyle::Numeric => format!("{}.", index),
        NumberingStyle::Letter => format!("{}.", to_letters(index)),
        NumberingStyle::Roman => format!("{}.", to_roman(index)),
    }
}

/// Spreadsheet-style column letters: 1 -> A, 26 -> Z, 27 -> AA
pub fn to_letters(index: usize) -> String {
    if index == 0 {
        return "0".to_string();
    }
    let mut n = index;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Roman numerals for 1..=3999; other values are returned as decimal
pub fn to_roman(index: usize) -> String {
    const TABLE: [(usize, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];
    if index == 0 || index > 3999 {
        return index.to_string();
    }
    let mut n = index;
    let mut out = String::new();
    for (value, symbol) in TABLE {
        while n >= value {
            out.push_str(symbol);
            n -= value;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric() {
        let labels: Vec<String> = (1..=5).map(|i| format_number(NumberingStyle::Numeric, i)).collect();
        assert_eq!(labels, vec!["1.", "2.", "3.", "4.", "5."]);
    }

    #[test]
    fn test_letters() {
        assert_eq!(format_number(NumberingStyle::Letter, 1), "A.");
        assert_eq!(format_number(NumberingStyle::Letter, 26), "Z.");
        assert_eq!(format_number(NumberingStyle::Letter, 27), "AA.");
        assert_eq!(to_letters(52), "AZ");
        assert_eq!(to_letters(703), "AAA");
    }

    #[test]
    fn test_roman() {
        assert_eq!(format_number(NumberingStyle::Roman, 1), "I.");
        assert_eq!(format_number(NumberingStyle::Roman, 4), "IV.");
        assert_eq!(format_number(NumberingStyle::Roman, 9), "IX.");
        assert_eq!(to_roman(1994), "MCMXCIV");
        assert_eq!(to_roman(3999), "MMMCMXCIX");
        assert_eq!(to_roman(4000), "4000");
    }

    #[test]
    fn test_none() {
        assert_eq!(format_number(NumberingStyle::None, 3), "");
    }
}
