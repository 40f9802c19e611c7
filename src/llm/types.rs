use serde::{Deserialize, Serialize};

/// Body of a non-streaming generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
    /// Base64-encoded images for vision models.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            stream: false,
            images: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(alias = "text", default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagsResponse {
    #[serde(default)]
    pub models: Vec<ModelTag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelTag {
    pub name: String,
}
