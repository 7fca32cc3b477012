use super::{classify_status, error_body, ProviderError};
use crate::credentials::Credential;
use crate::languages::Language;
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://router.huggingface.co/hf-inference";

/// Published Helsinki-NLP opus-mt models reachable through the inference router.
const MODEL_PAIRS: &[(&str, &str)] = &[
    ("en", "zh"),
    ("zh", "en"),
    ("en", "fr"),
    ("fr", "en"),
    ("en", "de"),
    ("de", "en"),
    ("en", "es"),
    ("es", "en"),
    ("en", "ru"),
    ("ru", "en"),
    ("en", "ar"),
    ("ar", "en"),
    ("en", "it"),
    ("it", "en"),
    ("ja", "en"),
    ("ko", "en"),
    ("en", "nl"),
    ("nl", "en"),
    ("en", "uk"),
    ("uk", "en"),
    ("en", "vi"),
    ("vi", "en"),
];

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
}

#[derive(Debug, Deserialize)]
struct InferenceOutput {
    translation_text: String,
}

/// Helsinki-NLP opus-mt models on the Hugging Face inference API. Needs a token.
#[derive(Debug)]
pub struct Helsinki {
    client: reqwest::Client,
    base_url: String,
}

impl Helsinki {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn supports_pair(&self, source: Language, target: Language) -> bool {
        MODEL_PAIRS
            .iter()
            .any(|&(s, t)| s == source.code() && t == target.code())
    }

    fn model_url(&self, source: Language, target: Language) -> String {
        format!(
            "{}/models/Helsinki-NLP/opus-mt-{}-{}",
            self.base_url,
            source.code(),
            target.code()
        )
    }

    pub async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        let token = credential
            .secret()
            .ok_or_else(|| ProviderError::Unauthorized("Hugging Face token required".into()))?;

        let response = self
            .client
            .post(self.model_url(source, target))
            .bearer_auth(token)
            .json(&InferenceRequest { inputs: text })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            if status == reqwest::StatusCode::NOT_FOUND {
                return Err(ProviderError::unsupported(source, target));
            }
            return Err(classify_status(status, &body));
        }

        let outputs: Vec<InferenceOutput> = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid inference response: {}", e)))?;

        outputs
            .into_iter()
            .next()
            .map(|o| o.translation_text)
            .ok_or_else(|| ProviderError::Unavailable("inference response was empty".into()))
    }
}
