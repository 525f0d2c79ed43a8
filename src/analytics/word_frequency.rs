use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use crate::storage::WordCount;
use crate::util::{fold_lowercase, strip_html};

/// Words kept per snapshot.
pub const TOP_WORDS: usize = 30;

/// Tokens shorter than this are ignored.
pub const MIN_WORD_CHARS: usize = 3;

/// Turkish function words (plus a few English ones that leak in through
/// agency copy). Only entries of three or more characters matter since
/// shorter tokens are dropped anyway.
const STOP_WORDS: &[&str] = &[
    "acaba", "ama", "ancak", "artık", "aslında", "ayrıca", "bana", "bazı", "belki", "ben",
    "beni", "benim", "beri", "bile", "bir", "biri", "birkaç", "birçok", "biz", "bize",
    "bizim", "böyle", "bu", "buna", "bunda", "bundan", "bunlar", "bunları", "bunların",
    "bunu", "bunun", "burada", "bütün", "çok", "çünkü", "daha", "değil", "diye", "dolayı",
    "gibi", "göre", "hala", "halde", "hangi", "hem", "henüz", "hep", "hepsi", "her",
    "herhangi", "hiç", "için", "ile", "ilgili", "ise", "işte", "kadar", "karşı", "kendi",
    "kendine", "kendini", "kez", "kim", "kimse", "mı", "mi", "nasıl", "neden", "nedenle",
    "olan", "olarak", "oldu", "olduğu", "olduğunu", "olmak", "olması", "olmayan", "olur",
    "onlar", "onları", "onların", "onu", "onun", "öyle", "önce", "sadece", "sonra", "şey",
    "şimdi", "şöyle", "şu", "şuna", "şunu", "tarafından", "tüm", "var", "vardı", "veya",
    "yani", "yapılan", "yine", "yok", "zaten", "eden", "etti", "ettiği", "eder",
    "ederek", "dedi", "yaptı", "yer", "aldı", "üzere", "ilk", "son", "yeni", "the", "and",
    "for", "with", "that", "this",
];

fn stop_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercased tokens of `text` that count as words.
///
/// Markup is stripped first; tokens are maximal runs of alphanumeric
/// characters, kept when at least [`MIN_WORD_CHARS`] long, not purely numeric
/// and not a stop word.
pub fn tokenize(text: &str) -> Vec<String> {
    strip_html(text)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(fold_lowercase)
        .filter(|t| t.chars().count() >= MIN_WORD_CHARS)
        .filter(|t| !t.chars().all(|c| c.is_numeric()))
        .filter(|t| !stop_words().contains(t.as_str()))
        .collect()
}

/// Counts words across `texts` and returns the `cap` most frequent.
///
/// Sorted by count descending; equal counts keep the order in which the
/// words were first seen.
pub fn count_words<'a, I>(texts: I, cap: usize) -> Vec<WordCount>
where
    I: IntoIterator<Item = &'a str>,
{
    // word -> (count, first position)
    let mut counts: HashMap<String, (i64, usize)> = HashMap::new();
    let mut position = 0usize;

    for text in texts {
        for token in tokenize(text) {
            counts
                .entry(token)
                .and_modify(|(count, _)| *count += 1)
                .or_insert((1, position));
            position += 1;
        }
    }

    let mut ranked: Vec<(String, i64, usize)> = counts
        .into_iter()
        .map(|(word, (count, first))| (word, count, first))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.truncate(cap);

    ranked
        .into_iter()
        .map(|(word, count, _)| WordCount { word, count })
        .collect()
}
