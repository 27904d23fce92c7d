//! Language code handling for OCR engines.
//!
//! Configs use short codes (`en`, `pl`, `german`, `japan`, ...). Tesseract
//! wants its own three-letter traineddata names; [`tesseract_language`] maps
//! between the two and passes anything it does not know through unchanged,
//! so native Tesseract codes (`eng+pol`) work as-is.

/// Short codes and their Tesseract traineddata names.
const LANGUAGE_MAP: &[(&str, &str)] = &[
    ("en", "eng"),
    ("english", "eng"),
    ("pl", "pol"),
    ("polish", "pol"),
    ("de", "deu"),
    ("german", "deu"),
    ("fr", "fra"),
    ("french", "fra"),
    ("es", "spa"),
    ("spanish", "spa"),
    ("it", "ita"),
    ("italian", "ita"),
    ("pt", "por"),
    ("nl", "nld"),
    ("cs", "ces"),
    ("sk", "slk"),
    ("uk", "ukr"),
    ("ru", "rus"),
    ("cyrillic", "rus"),
    ("ch", "chi_sim"),
    ("zh", "chi_sim"),
    ("chinese_cht", "chi_tra"),
    ("ja", "jpn"),
    ("japan", "jpn"),
    ("ko", "kor"),
    ("korean", "kor"),
    ("ta", "tam"),
    ("te", "tel"),
    ("ka", "kan"),
    ("ar", "ara"),
    ("arabic", "ara"),
    ("hi", "hin"),
    ("devanagari", "hin"),
    ("latin", "lat"),
];

/// Codes accepted in `EngineConfig::language` besides raw Tesseract names.
pub fn supported_languages() -> Vec<&'static str> {
    LANGUAGE_MAP.iter().map(|(code, _)| *code).collect()
}

/// Map a config language (possibly `+`-joined) to Tesseract's naming.
pub fn tesseract_language(code: &str) -> String {
    code.split('+')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_ascii_lowercase();
            LANGUAGE_MAP
                .iter()
                .find(|(short, _)| *short == lower)
                .map(|(_, tess)| (*tess).to_string())
                .unwrap_or_else(|| part.to_string())
        })
        .collect::<Vec<_>>()
        .join("+")
}

/// Whether `language` selects the Polish correction rules.
pub fn is_polish(language: &str) -> bool {
    matches!(language.trim().to_ascii_lowercase().as_str(), "pl" | "pol" | "polish")
}
