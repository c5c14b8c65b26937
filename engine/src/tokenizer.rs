use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)[\p{L}\p{N}_]+").expect("valid regex");
}

/// Tokenize text into lowercase word tokens using NFKC normalization.
///
/// No stemming and no stop-word removal; repeated words are kept so callers
/// can count term frequency.
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    RE.find_iter(&normalized).map(|m| m.as_str().to_string()).collect()
}
