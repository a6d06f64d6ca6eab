//! Code normalisation for folder and record correlation.

use crate::constants::MAX_CODE_LEN;

/// Vietnamese letters with diacritics, grouped by their ASCII base letter.
const VIETNAMESE_FOLDS: &[(&str, char)] = &[
    ("àáạảãâầấậẩẫăằắặẳẵ", 'a'),
    ("ÀÁẠẢÃÂẦẤẬẨẪĂẰẮẶẲẴ", 'A'),
    ("èéẹẻẽêềếệểễ", 'e'),
    ("ÈÉẸẺẼÊỀẾỆỂỄ", 'E'),
    ("ìíịỉĩ", 'i'),
    ("ÌÍỊỈĨ", 'I'),
    ("òóọỏõôồốộổỗơờớợởỡ", 'o'),
    ("ÒÓỌỎÕÔỒỐỘỔỖƠỜỚỢỞỠ", 'O'),
    ("ùúụủũưừứựửữ", 'u'),
    ("ÙÚỤỦŨƯỪỨỰỬỮ", 'U'),
    ("ỳýỵỷỹ", 'y'),
    ("ỲÝỴỶỸ", 'Y'),
    ("đ", 'd'),
    ("Đ", 'D'),
];

/// Replaces Vietnamese accented letters with their ASCII base letter.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii() {
                return c;
            }
            VIETNAMESE_FOLDS
                .iter()
                .find(|(group, _)| group.contains(c))
                .map(|(_, base)| *base)
                .unwrap_or(c)
        })
        .collect()
}

/// Derives a filesystem- and comparison-friendly code from free text.
///
/// Diacritics are folded, anything other than letters, digits, `_` and `-` becomes `_`, runs of
/// `_` collapse to one, leading and trailing `_` are trimmed and the result is cut to
/// [`MAX_CODE_LEN`] characters.
///
/// `"Chi cục An toàn"` becomes `"Chi_cuc_An_toan"`.
pub fn normalize_code(input: &str) -> String {
    let folded = fold_diacritics(input.trim());

    let mut out = String::with_capacity(folded.len());
    for c in folded.chars() {
        let mapped = if c.is_alphanumeric() || c == '-' { c } else { '_' };
        if mapped == '_' && out.ends_with('_') {
            continue;
        }
        out.push(mapped);
    }

    out.trim_matches('_').chars().take(MAX_CODE_LEN).collect()
}
