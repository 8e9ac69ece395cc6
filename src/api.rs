//! The vendor's REST api: listing voices and synthesizing speech.
//!
//! Both calls go through [`TtsApi`] so the lister and the batch runner can be
//! driven by an in-memory double. [`HttpApi`] is the blocking `ureq`
//! implementation used by the binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const API_KEY_HEADER: &str = "openapi_key";

#[derive(Debug)]
pub enum ApiError {
    /// The server answered with a non-2xx status.
    Status { code: u16, body: String },
    /// The request never got a response.
    Transport(String),
    /// The response body is not what we expected.
    Decode(String),
}

impl ApiError {
    /// Short advice for the status codes the vendor documents.
    pub fn hint(&self) -> Option<&'static str> {
        let ApiError::Status { code, .. } = self else {
            return None;
        };
        Some(match code {
            400 => "bad request, check the URL",
            401 | 403 => "authentication failed, check API_KEY",
            404 => "endpoint not found, check the URL",
            429 => "too many requests, wait a moment and try again",
            500..=599 => "server error on the vendor side",
            _ => "unexpected status, contact the vendor with this code",
        })
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Status { code, body } => {
                write!(f, "request failed with status {code}")?;
                if let Some(hint) = self.hint() {
                    write!(f, " ({hint})")?;
                }
                if !body.is_empty() {
                    write!(f, ": {body}")?;
                }
                Ok(())
            }
            ApiError::Transport(e) => write!(f, "request failed: {e}"),
            ApiError::Decode(e) => write!(f, "unexpected response: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<ureq::Error> for ApiError {
    fn from(e: ureq::Error) -> Self {
        match e {
            ureq::Error::Status(code, response) => ApiError::Status {
                code,
                body: response.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => ApiError::Transport(t.to_string()),
        }
    }
}

/// The fields of a voice record this crate reads. Everything else the
/// vendor sends is kept in `extra` so it survives a round trip to JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceRecord {
    #[serde(default)]
    pub speaker_uuid: String,
    #[serde(default)]
    pub speaker_name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

fn null_as_empty<'de, D: serde::Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(d)?.unwrap_or_default())
}

/// Pulls the voice list out of a list-voices response, which is either
/// `{"data": [...]}` or a bare array. Any other shape yields no voices.
pub fn voice_list(body: Value) -> Result<Vec<VoiceRecord>, ApiError> {
    let list = match body {
        Value::Array(list) => list,
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(list)) => list,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };
    list.into_iter()
        .enumerate()
        .map(|(i, v)| {
            serde_json::from_value(v).map_err(|e| ApiError::Decode(format!("voice {i}: {e}")))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prosody {
    pub speed: f64,
    pub pitch: f64,
}

/// Body of a synthesize call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SynthesisRequest {
    pub voice: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_fm_steps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<f64>,
    pub properties: Prosody,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SynthesisResponse {
    /// Base64-encoded audio. A 200 response without it is not an error at
    /// the transport level.
    #[serde(default)]
    pub audio: Option<String>,
}

pub trait TtsApi {
    fn list_voices(&self) -> Result<Vec<VoiceRecord>, ApiError>;

    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, ApiError>;
}

/// Blocking client for the vendor api.
pub struct HttpApi {
    agent: ureq::Agent,
    api_key: String,
    voices_url: Option<String>,
    synthesis_url: Option<String>,
}

impl HttpApi {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(10))
                .timeout_read(Duration::from_secs(120))
                .build(),
            api_key: api_key.into(),
            voices_url: None,
            synthesis_url: None,
        }
    }

    pub fn with_voices_url(mut self, url: impl Into<String>) -> Self {
        self.voices_url = Some(url.into());
        self
    }

    pub fn with_synthesis_url(mut self, url: impl Into<String>) -> Self {
        self.synthesis_url = Some(url.into());
        self
    }
}

fn unconfigured(what: &str) -> ApiError {
    ApiError::Transport(format!("no {what} url configured"))
}

impl TtsApi for HttpApi {
    fn list_voices(&self) -> Result<Vec<VoiceRecord>, ApiError> {
        let url = self
            .voices_url
            .as_deref()
            .ok_or_else(|| unconfigured("voice list"))?;
        debug!("GET {url}");
        let body: Value = self
            .agent
            .get(url)
            .set("accept", "application/json")
            .set(API_KEY_HEADER, &self.api_key)
            .call()?
            .into_json()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        voice_list(body)
    }

    fn synthesize(&self, request: &SynthesisRequest) -> Result<SynthesisResponse, ApiError> {
        let url = self
            .synthesis_url
            .as_deref()
            .ok_or_else(|| unconfigured("synthesis"))?;
        debug!("POST {url} voice={} steps={:?}", request.voice, request.n_fm_steps);
        self.agent
            .post(url)
            .set("Content-Type", "application/json")
            .set(API_KEY_HEADER, &self.api_key)
            .send_json(request)?
            .into_json()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_accepts_wrapped_and_bare_arrays() {
        let record = json!({"speaker_uuid": "u1", "speaker_name": "A(Joy)", "description": "d"});
        let wrapped = voice_list(json!({ "data": [record.clone()] })).unwrap();
        let bare = voice_list(json!([record])).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(bare[0].speaker_uuid, "u1");
        assert!(voice_list(json!({"items": []})).unwrap().is_empty());
        assert!(voice_list(json!("nope")).unwrap().is_empty());
    }

    #[test]
    fn extra_fields_survive() {
        let voices = voice_list(json!([{
            "speaker_uuid": "u1",
            "speaker_name": "A",
            "description": null,
            "saas_name": null,
            "tags": ["x"]
        }]))
        .unwrap();
        assert_eq!(voices[0].description, "");
        let back = serde_json::to_value(&voices[0]).unwrap();
        assert_eq!(back["saas_name"], Value::Null);
        assert_eq!(back["tags"], json!(["x"]));
    }

    #[test]
    fn request_body_shape() {
        let request = SynthesisRequest {
            voice: "u1".into(),
            text: "hello".into(),
            n_fm_steps: Some(8.0),
            seed: Some(-1.0),
            properties: Prosody {
                speed: 1.3,
                pitch: 1.0,
            },
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "voice": "u1",
                "text": "hello",
                "n_fm_steps": 8.0,
                "seed": -1.0,
                "properties": {"speed": 1.3, "pitch": 1.0}
            })
        );

        let short = SynthesisRequest {
            n_fm_steps: None,
            seed: None,
            ..request
        };
        let body = serde_json::to_value(&short).unwrap();
        assert!(body.get("n_fm_steps").is_none());
        assert!(body.get("seed").is_none());
    }

    #[test]
    fn status_errors_carry_hints() {
        let err = ApiError::Status {
            code: 429,
            body: "slow down".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("429"));
        assert!(msg.contains("too many requests"));
        assert!(msg.contains("slow down"));
        assert!(ApiError::Transport("x".into()).hint().is_none());
    }
}
