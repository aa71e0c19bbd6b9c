use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

fn default_lang() -> String {
    "zh".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct DetectNavigationRequest {
    #[validate(length(min = 1, message = "Text is required"))]
    pub text: String,
    #[serde(default = "default_lang")]
    pub lang: String,
}
