//! Sub-stream path guessing
//!
//! Given a path that served the main stream, derive the usual secondary
//! stream path. Rules are tried in order; the first match wins. The guesser
//! does not know whether its input really is a main path.

type Rule = fn(&str) -> Option<String>;

const RULES: &[(&str, Rule)] = &[
    ("subtype", subtype_rule),
    ("channel-101", channel_number_rule),
    ("main-dir", main_dir_rule),
    ("main-suffix", main_suffix_rule),
    ("underscore-0", underscore_zero_rule),
    ("slash-0", slash_zero_rule),
    ("stream1", stream_one_rule),
    ("live", live_rule),
];

pub fn guess_sub_path(main_path: &str) -> Option<String> {
    RULES.iter().find_map(|(name, rule)| {
        let guess = rule(main_path)?;
        tracing::trace!(rule = name, main = main_path, sub = %guess, "Sub path guessed");
        Some(guess)
    })
}

/// `...subtype=0` -> `...subtype=1`
fn subtype_rule(path: &str) -> Option<String> {
    let idx = path.rfind("subtype=0")?;
    let end = idx + "subtype=0".len();
    // subtype=00 or subtype=01 are not the pattern
    if path[end..].starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some(format!("{}subtype=1{}", &path[..idx], &path[end..]))
}

/// Trailing channel number `.../101` -> `.../102` (also 201 -> 202, ...)
fn channel_number_rule(path: &str) -> Option<String> {
    let digits = path.len() - path.trim_end_matches(|c: char| c.is_ascii_digit()).len();
    if digits < 3 {
        return None;
    }
    let head = &path[..path.len() - digits];
    if !head.ends_with('/') {
        return None;
    }
    let number = &path[head.len()..];
    let prefix = number.strip_suffix("01")?;
    Some(format!("{}{}02", head, prefix))
}

/// `/main/` -> `/sub/`
fn main_dir_rule(path: &str) -> Option<String> {
    path.contains("/main/").then(|| path.replacen("/main/", "/sub/", 1))
}

/// `..._main` -> `..._sub`
fn main_suffix_rule(path: &str) -> Option<String> {
    path.strip_suffix("_main").map(|head| format!("{}_sub", head))
}

/// Trailing `_0` -> `_1`, also before a file extension (`ch0_0.h264`)
fn underscore_zero_rule(path: &str) -> Option<String> {
    if let Some(head) = path.strip_suffix("_0") {
        return Some(format!("{}_1", head));
    }
    let dot = path.rfind('.')?;
    let (stem, ext) = path.split_at(dot);
    if ext.contains('/') {
        return None;
    }
    stem.strip_suffix("_0").map(|head| format!("{}_1{}", head, ext))
}

/// Trailing `/0` -> `/1`
fn slash_zero_rule(path: &str) -> Option<String> {
    path.strip_suffix("/0").map(|head| format!("{}/1", head))
}

/// Trailing `stream1` -> `stream2`
fn stream_one_rule(path: &str) -> Option<String> {
    path.strip_suffix("stream1").map(|head| format!("{}stream2", head))
}

/// Trailing `/live` -> `/live/1`
fn live_rule(path: &str) -> Option<String> {
    path.ends_with("/live").then(|| format!("{}/1", path))
}
