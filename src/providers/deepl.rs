use super::{classify_status, error_body, ProviderError};
use crate::credentials::Credential;
use crate::languages::Language;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api-free.deepl.com";

const SOURCE_LANGS: &[&str] = &[
    "ar", "bg", "cs", "da", "de", "el", "en", "es", "et", "fi", "fr", "hu", "id", "it", "ja",
    "ko", "lt", "lv", "nb", "nl", "pl", "pt", "ro", "ru", "sk", "sl", "sv", "tr", "uk", "zh",
];

/// DeepL-specific "quota exceeded" status.
const QUOTA_EXCEEDED: u16 = 456;

#[derive(Debug, Serialize)]
struct TranslateBody<'a> {
    text: [&'a str; 1],
    source_lang: String,
    target_lang: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    text: String,
}

/// DeepL API. Needs an auth key, either the user's own or the system default.
#[derive(Debug)]
pub struct DeepL {
    client: reqwest::Client,
    base_url: String,
}

impl DeepL {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn supports_pair(&self, source: Language, target: Language) -> bool {
        SOURCE_LANGS.contains(&source.code()) && target_code(target).is_some()
    }

    pub async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        let key = credential
            .secret()
            .ok_or_else(|| ProviderError::Unauthorized("DeepL auth key required".into()))?;
        let target_lang =
            target_code(target).ok_or_else(|| ProviderError::unsupported(source, target))?;

        let body = TranslateBody {
            text: [text],
            source_lang: source.code().to_ascii_uppercase(),
            target_lang,
        };

        let response = self
            .client
            .post(format!("{}/v2/translate", self.base_url))
            .header("Authorization", format!("DeepL-Auth-Key {}", key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            if status.as_u16() == QUOTA_EXCEEDED {
                return Err(ProviderError::QuotaExceeded(format!("DeepL: {}", body)));
            }
            return Err(classify_status(status, &body));
        }

        let parsed: TranslateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid DeepL response: {}", e)))?;

        parsed
            .translations
            .into_iter()
            .next()
            .map(|t| t.text)
            .ok_or_else(|| ProviderError::Unavailable("DeepL response contained no translations".into()))
    }
}

/// DeepL target code; English and Portuguese need a regional variant.
fn target_code(target: Language) -> Option<&'static str> {
    let code = match target.code() {
        "en" => "EN-US",
        "pt" => "PT-PT",
        "ar" => "AR",
        "bg" => "BG",
        "cs" => "CS",
        "da" => "DA",
        "de" => "DE",
        "el" => "EL",
        "es" => "ES",
        "et" => "ET",
        "fi" => "FI",
        "fr" => "FR",
        "hu" => "HU",
        "id" => "ID",
        "it" => "IT",
        "ja" => "JA",
        "ko" => "KO",
        "lt" => "LT",
        "lv" => "LV",
        "nb" => "NB",
        "nl" => "NL",
        "pl" => "PL",
        "ro" => "RO",
        "ru" => "RU",
        "sk" => "SK",
        "sl" => "SL",
        "sv" => "SV",
        "tr" => "TR",
        "uk" => "UK",
        "zh" => "ZH",
        _ => return None,
    };
    Some(code)
}
