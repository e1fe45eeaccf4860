use std::collections::HashMap;
use std::sync::Arc;

use fluent_templates::{
    fluent_bundle::{FluentArgs, FluentValue},
    static_loader, Loader,
};
use once_cell::sync::Lazy;
use unic_langid::LanguageIdentifier;

use crate::storage::db::DbPool;
use crate::storage::employees;

static_loader! {
    static LOCALES = {
        locales: "./locales",
        fallback_language: "ru",
    };
}

/// Supported languages (code, human-readable name).
pub static SUPPORTED_LANGS: &[(&str, &str)] = &[("ru", "Русский"), ("en", "English")];

/// Default language identifier used as a fallback.
static DEFAULT_LANG: Lazy<LanguageIdentifier> = Lazy::new(|| "ru".parse().unwrap());

/// Normalizes a language code into a LanguageIdentifier (falls back to default).
pub fn lang_from_code(code: &str) -> LanguageIdentifier {
    let normalized = match code.to_lowercase().as_str() {
        "en" | "en-us" | "en-gb" => "en",
        "ru" | "ru-ru" => "ru",
        other => return other.parse().unwrap_or_else(|_| DEFAULT_LANG.clone()),
    };
    normalized.parse().unwrap_or_else(|_| DEFAULT_LANG.clone())
}

/// Resolves the language for an employee by Telegram ID using the pool.
pub fn employee_lang(db_pool: &Arc<DbPool>, telegram_id: i64) -> LanguageIdentifier {
    if let Ok(conn) = crate::storage::get_connection(db_pool) {
        if let Ok(Some(emp)) = employees::get_by_telegram_id(&conn, telegram_id) {
            return lang_from_code(&emp.language);
        }
    }
    DEFAULT_LANG.clone()
}

/// Returns a localized string for the given key.
/// Converts literal `\n` sequences to actual newlines for proper Telegram formatting.
pub fn t(lang: &LanguageIdentifier, key: &str) -> String {
    let text = LOCALES
        .lookup(lang, key)
        .unwrap_or_else(|| LOCALES.lookup(&DEFAULT_LANG, key).unwrap_or_else(|| key.to_string()));
    text.replace("\\n", "\n")
}

/// Returns a localized string with arguments for interpolation.
pub fn t_args(lang: &LanguageIdentifier, key: &str, args: &FluentArgs) -> String {
    let args_map: HashMap<String, FluentValue> = args.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();

    let text = LOCALES.lookup_with_args(lang, key, &args_map).unwrap_or_else(|| {
        LOCALES
            .lookup_with_args(&DEFAULT_LANG, key, &args_map)
            .unwrap_or_else(|| key.to_string())
    });
    text.replace("\\n", "\n")
}

/// Finds a human-friendly name for a language code.
pub fn language_name(code: &str) -> &str {
    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
        .unwrap_or("Unknown")
}

/// Checks if a language code is supported by the bot.
/// Returns the normalized code if supported, None otherwise.
pub fn is_language_supported(code: &str) -> Option<&'static str> {
    let normalized = code.split('-').next().unwrap_or(code).to_lowercase();

    SUPPORTED_LANGS
        .iter()
        .find(|(c, _)| c.eq_ignore_ascii_case(&normalized))
        .map(|(c, _)| *c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_known_translation() {
        let ru = lang_from_code("ru");
        let en = lang_from_code("en");

        assert!(t(&ru, "survey-completed").contains("Спасибо"));
        assert!(t(&en, "survey-completed").contains("Thank you"));
    }

    #[test]
    fn falls_back_to_default_language() {
        let de = lang_from_code("de");
        // No German catalog: the Russian fallback is served.
        assert_eq!(t(&de, "survey-completed"), t(&DEFAULT_LANG, "survey-completed"));
    }

    #[test]
    fn converts_newlines() {
        let en = lang_from_code("en");
        let text = t(&en, "menu-help-text");

        assert!(text.contains('\n'));
        assert!(!text.contains("\\n"));
    }

    #[test]
    fn interpolates_args() {
        let en = lang_from_code("en");
        let mut args = FluentArgs::new();
        args.set("name", "Alice");
        let text = t_args(&en, "menu-greeting", &args);
        assert!(text.contains("Alice"));
    }

    #[test]
    fn language_support_normalizes_variants() {
        assert_eq!(is_language_supported("en-US"), Some("en"));
        assert_eq!(is_language_supported("RU"), Some("ru"));
        assert_eq!(is_language_supported("kg"), None);
    }
}
