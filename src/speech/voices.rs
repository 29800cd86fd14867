//! Voice selection heuristic.
//!
//! Given a target language tag and whatever voices the engine happens to
//! offer, pick the best candidate. Device voice coverage is wildly uneven,
//! so after exact and prefix matching we substitute a phonetically close
//! language before giving up and taking English. No tier guarantees a
//! match; `None` means "let the engine use its default voice".

use super::interface::VoiceInfo;

/// Substitutions for languages with poor device coverage. A Hindi voice
/// reading Tamil is rough but far closer than an English one.
const RELATED_LANGUAGES: &[(&str, &[&str])] = &[
    ("ta", &["hi", "te", "kn", "ml"]),
    ("te", &["hi", "ta", "kn"]),
    ("kn", &["hi", "te", "ta"]),
    ("ml", &["hi", "ta"]),
    ("mr", &["hi"]),
    ("gu", &["hi"]),
    ("pa", &["hi"]),
    ("bn", &["hi"]),
    ("ur", &["hi"]),
];

/// Name substrings that indicate a male voice. Stated product preference;
/// falls back to list order when no name carries a gender signal.
const MALE_INDICATORS: &[&str] = &["male", "ravi", "prabhat", "madhur", "rishi", "david", "mark"];

/// Pick the best voice for `language` out of `voices`.
///
/// Preference order:
///   1. exact tag match (`ta-IN`)
///   2. language-prefix match (any `ta-*`)
///   3. related-language substitution (`ta` → `hi`, ...)
///   4. any English voice
/// Within a tier, a voice whose name signals male wins; otherwise the
/// first voice in list order does.
pub fn select_voice<'a>(language: &str, voices: &'a [VoiceInfo]) -> Option<&'a VoiceInfo> {
    if voices.is_empty() {
        return None;
    }

    let language = language.trim();
    let prefix = language_prefix(language);

    let exact: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| v.language.eq_ignore_ascii_case(language))
        .collect();
    if let Some(voice) = prefer_male(&exact) {
        return Some(voice);
    }

    let prefixed: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| language_prefix(&v.language).eq_ignore_ascii_case(prefix))
        .collect();
    if let Some(voice) = prefer_male(&prefixed) {
        return Some(voice);
    }

    for (lang, substitutes) in RELATED_LANGUAGES {
        if lang.eq_ignore_ascii_case(prefix) {
            for substitute in *substitutes {
                let related: Vec<&VoiceInfo> = voices
                    .iter()
                    .filter(|v| language_prefix(&v.language).eq_ignore_ascii_case(substitute))
                    .collect();
                if let Some(voice) = prefer_male(&related) {
                    return Some(voice);
                }
            }
        }
    }

    let english: Vec<&VoiceInfo> = voices
        .iter()
        .filter(|v| language_prefix(&v.language).eq_ignore_ascii_case("en"))
        .collect();
    prefer_male(&english)
}

fn language_prefix(tag: &str) -> &str {
    tag.split(&['-', '_'][..]).next().unwrap_or(tag)
}

fn prefer_male<'a>(candidates: &[&'a VoiceInfo]) -> Option<&'a VoiceInfo> {
    candidates
        .iter()
        .find(|v| {
            let name = v.name.to_lowercase();
            MALE_INDICATORS.iter().any(|m| name.contains(m))
        })
        .copied()
        .or_else(|| candidates.first().copied())
}
