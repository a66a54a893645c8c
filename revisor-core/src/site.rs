//! Site generation job payload for `POST /api/v1/sites`.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde::Serialize;

/// Length of generated site identifiers.
pub const SITE_ID_LEN: usize = 17;

/// Generate a random site id drawn uniformly from `[A-Za-z0-9]`.
pub fn generate_site_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(SITE_ID_LEN)
        .map(char::from)
        .collect()
}

/// Optional generation features switched on by keywords in the prompt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptFeatures {
    pub multiplayer: bool,
    pub database: bool,
}

impl PromptFeatures {
    /// Case-insensitive keyword scan. `database` also matches on a bare
    /// `db` substring, which includes words such as "feedback".
    pub fn from_prompt(prompt: &str) -> Self {
        let lower = prompt.to_lowercase();
        Self {
            multiplayer: lower.contains("multiplayer"),
            database: lower.contains("database") || lower.contains("db"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateSiteRequest {
    pub generate: GenerateSpec,
    pub project_id: String,
    pub project_version: u64,
    pub project_revision_id: String,
    pub site_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateSpec {
    pub prompt: PromptSpec,
    pub flags: GenerationFlags,
    pub model: String,
    pub lore: Lore,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerationFlags {
    pub use_worker_generation: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lore {
    pub version: u32,
    pub attachments: Vec<serde_json::Value>,
    pub references: Vec<serde_json::Value>,
    #[serde(rename = "enableDatabase")]
    pub enable_database: bool,
    #[serde(rename = "enableApi")]
    pub enable_api: bool,
    #[serde(rename = "enableMultiplayer")]
    pub enable_multiplayer: bool,
    #[serde(rename = "enableMobilePrompt")]
    pub enable_mobile_prompt: bool,
    #[serde(rename = "enableDB")]
    pub enable_db: bool,
    #[serde(rename = "enableLLM")]
    pub enable_llm: bool,
    #[serde(rename = "enableLLM2")]
    pub enable_llm2: bool,
    #[serde(rename = "enableTweaks")]
    pub enable_tweaks: bool,
    pub features: LoreFeatures,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoreFeatures {
    pub context: bool,
    pub errors: bool,
    pub htmx: bool,
    pub images: bool,
    pub navigation: bool,
}

impl Lore {
    /// The feature block sent with every generation job.
    ///
    /// `enable_database` is always false: the keyword-derived database flag
    /// only reaches the secondary `enableDB` field.
    pub fn for_features(features: PromptFeatures) -> Self {
        Self {
            version: 1,
            attachments: Vec::new(),
            references: Vec::new(),
            enable_database: false,
            enable_api: true,
            enable_multiplayer: features.multiplayer,
            enable_mobile_prompt: true,
            enable_db: features.database,
            enable_llm: false,
            enable_llm2: true,
            enable_tweaks: false,
            features: LoreFeatures {
                context: true,
                errors: true,
                htmx: true,
                images: true,
                navigation: true,
            },
        }
    }
}

impl CreateSiteRequest {
    pub fn new(
        prompt: &str,
        model_id: &str,
        project_id: &str,
        project_version: u64,
        project_revision_id: &str,
        site_id: String,
    ) -> Self {
        Self {
            generate: GenerateSpec {
                prompt: PromptSpec {
                    kind: "plaintext".to_string(),
                    text: prompt.to_string(),
                    data: None,
                },
                flags: GenerationFlags {
                    use_worker_generation: false,
                },
                model: model_id.to_string(),
                lore: Lore::for_features(PromptFeatures::from_prompt(prompt)),
            },
            project_id: project_id.to_string(),
            project_version,
            project_revision_id: project_revision_id.to_string(),
            site_id,
        }
    }
}
