//! Outbound generation request, sent once as the first frame of a session.

use pix2code_core::commit::PromptContent;
use serde::{Deserialize, Serialize};

/// Whether the request starts a new design or edits the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationType {
    Create,
    Update,
}

/// Kind of artifact the design came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    #[default]
    Image,
    Video,
    Text,
}

/// Target front-end stack for generated code.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stack {
    #[default]
    HtmlTailwind,
    HtmlCss,
    ReactTailwind,
    Bootstrap,
    IonicTailwind,
    VueTailwind,
    Svg,
}

/// User settings flattened into every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationSettings {
    pub generated_code_config: Stack,
    pub code_generation_model: String,
    pub is_image_generation_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_ai_api_key: Option<String>,
    #[serde(rename = "openAiBaseURL", skip_serializing_if = "Option::is_none")]
    pub open_ai_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot_one_api_key: Option<String>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            generated_code_config: Stack::default(),
            code_generation_model: "claude-3-5-sonnet-20240620".to_string(),
            is_image_generation_enabled: true,
            open_ai_api_key: None,
            open_ai_base_url: None,
            anthropic_api_key: None,
            screenshot_one_api_key: None,
        }
    }
}

/// Full parameters of one generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub generation_type: GenerationType,
    pub input_mode: InputMode,
    pub prompt: PromptContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<PromptContent>>,
    #[serde(default)]
    pub is_imported_from_code: bool,
    #[serde(flatten)]
    pub settings: GenerationSettings,
    pub user_id: String,
}

impl GenerationParams {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
