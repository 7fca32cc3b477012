use super::quota::{word_count, DailyQuota};
use super::{classify_status, error_body, ProviderError};
use crate::credentials::Credential;
use crate::languages::Language;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.mymemory.translated.net";

#[derive(Debug, Deserialize)]
struct MyMemoryResponse {
    #[serde(rename = "responseData")]
    response_data: Option<ResponseData>,
    #[serde(rename = "responseStatus")]
    response_status: Option<Value>,
    #[serde(rename = "responseDetails")]
    response_details: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct ResponseData {
    #[serde(rename = "translatedText")]
    translated_text: Option<String>,
}

/// MyMemory: free, anonymous, any registered language pair.
///
/// The anonymous tier is limited by a daily word budget shared by every
/// in-flight request of this process.
#[derive(Debug)]
pub struct MyMemory {
    client: reqwest::Client,
    base_url: String,
    quota: Option<Arc<DailyQuota>>,
}

impl MyMemory {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            quota: None,
        }
    }

    pub fn with_quota(mut self, quota: Arc<DailyQuota>) -> Self {
        self.quota = Some(quota);
        self
    }

    pub fn quota(&self) -> Option<&DailyQuota> {
        self.quota.as_deref()
    }

    pub fn supports_pair(&self, _source: Language, _target: Language) -> bool {
        true
    }

    pub async fn translate(
        &self,
        text: &str,
        source: Language,
        target: Language,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        let reservation = match &self.quota {
            Some(quota) => Some(quota.reserve(word_count(text))?),
            None => None,
        };

        let translated = self.call(text, source, target, credential).await?;
        if let Some(reservation) = reservation {
            reservation.commit();
        }
        Ok(translated)
    }

    async fn call(
        &self,
        text: &str,
        source: Language,
        target: Language,
        credential: &Credential,
    ) -> Result<String, ProviderError> {
        let langpair = format!("{}|{}", source.code(), target.code());
        let mut query = vec![("q", text), ("langpair", langpair.as_str())];
        if let Some(key) = credential.secret() {
            query.push(("key", key));
        }

        let response = self
            .client
            .get(format!("{}/get", self.base_url))
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response).await;
            return Err(classify_status(status, &body));
        }

        let body: MyMemoryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("invalid MyMemory response: {}", e)))?;

        // MyMemory reports most failures inside a 200 response.
        let inner_status = body.response_status.as_ref().and_then(status_code);
        let details = body
            .response_details
            .as_ref()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        match inner_status {
            Some(200) | None => {}
            Some(403) if details.to_ascii_uppercase().contains("INVALID") => {
                return Err(ProviderError::unsupported(source, target));
            }
            Some(code) => {
                debug!("MyMemory returned inner status {}: {}", code, details);
                let status = reqwest::StatusCode::from_u16(code)
                    .unwrap_or(reqwest::StatusCode::BAD_GATEWAY);
                return Err(classify_status(status, &details));
            }
        }

        body.response_data
            .and_then(|d| d.translated_text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProviderError::Unavailable("MyMemory response contained no translation".into()))
    }
}

/// `responseStatus` is sometimes a number and sometimes a string.
fn status_code(value: &Value) -> Option<u16> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderErrorKind;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    fn ok_body(text: &str) -> Value {
        serde_json::json!({
            "responseData": { "translatedText": text, "match": 1 },
            "responseStatus": 200,
            "responseDetails": ""
        })
    }

    async fn provider(server: &MockServer) -> MyMemory {
        MyMemory::new(reqwest::Client::new(), server.uri())
    }

    #[tokio::test]
    async fn test_translate_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("q", "Hello"))
            .and(query_param("langpair", "en|fr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("Bonjour")))
            .expect(1)
            .mount(&server)
            .await;

        let result = provider(&server)
            .await
            .translate("Hello", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .expect("Should succeed");

        assert_eq!(result, "Bonjour");
    }

    #[tokio::test]
    async fn test_user_key_is_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/get"))
            .and(query_param("key", "mm-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("你好")))
            .expect(1)
            .mount(&server)
            .await;

        let credential = Credential::probe("mm-key");
        let result = provider(&server)
            .await
            .translate("Hello", Language::ENGLISH, Language::CHINESE, &credential)
            .await
            .unwrap();
        assert_eq!(result, "你好");
    }

    #[tokio::test]
    async fn test_inner_quota_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseData": { "translatedText": "MYMEMORY WARNING: YOU USED ALL AVAILABLE FREE TRANSLATIONS FOR TODAY" },
                "responseStatus": "429",
                "responseDetails": "MYMEMORY WARNING: YOU USED ALL AVAILABLE FREE TRANSLATIONS FOR TODAY"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .translate("Hello", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_inner_invalid_language() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "responseData": { "translatedText": "" },
                "responseStatus": 403,
                "responseDetails": "'XX' IS AN INVALID TARGET LANGUAGE"
            })))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .translate("Hello", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::UnsupportedPair);
    }

    #[tokio::test]
    async fn test_http_error_maps_to_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .await
            .translate("Hello", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_local_quota_blocks_without_network_call() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("x")))
            .expect(0)
            .mount(&server)
            .await;

        let quota = Arc::new(DailyQuota::new(1));
        let provider = provider(&server).await.with_quota(quota);

        let err = provider
            .translate("two words", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ProviderErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_failed_call_refunds_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let quota = Arc::new(DailyQuota::new(10));
        let provider = provider(&server).await.with_quota(Arc::clone(&quota));

        let _ = provider
            .translate("one two three", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await;
        assert_eq!(quota.remaining(), 10);
    }

    #[tokio::test]
    async fn test_abandoned_call_refunds_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(ok_body("un deux trois"))
                    .set_delay(std::time::Duration::from_secs(3)),
            )
            .mount(&server)
            .await;

        let quota = Arc::new(DailyQuota::new(10));
        let provider = provider(&server).await.with_quota(Arc::clone(&quota));

        let call = provider.translate(
            "one two three",
            Language::ENGLISH,
            Language::FRENCH,
            &Credential::Anonymous,
        );
        let outcome = tokio::time::timeout(std::time::Duration::from_millis(100), call).await;
        assert!(outcome.is_err());
        assert_eq!(quota.remaining(), 10);
    }

    #[tokio::test]
    async fn test_successful_call_spends_quota() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(ok_body("un deux trois")))
            .mount(&server)
            .await;

        let quota = Arc::new(DailyQuota::new(10));
        let provider = provider(&server).await.with_quota(Arc::clone(&quota));

        provider
            .translate("one two three", Language::ENGLISH, Language::FRENCH, &Credential::Anonymous)
            .await
            .unwrap();
        assert_eq!(quota.remaining(), 7);
    }

    #[test]
    fn test_status_code_parsing() {
        assert_eq!(status_code(&serde_json::json!(200)), Some(200));
        assert_eq!(status_code(&serde_json::json!("429")), Some(429));
        assert_eq!(status_code(&serde_json::json!(null)), None);
    }
}
