use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

pub mod client;
pub mod normalize;
pub mod prompts;

/// Boundary to the vision/reasoning service. Both calls return the raw
/// model text; parsing and normalization happen on our side so a fake
/// implementation can feed arbitrary responses through the same path.
#[async_trait]
pub trait NutritionAi: Send + Sync {
    /// Vision round-trip: analyze a meal photo, returns raw model text.
    async fn analyze_image(
        &self,
        system_prompt: &str,
        user_text: &str,
        image_data_url: &str,
    ) -> anyhow::Result<String>;

    /// JSON-mode reasoning round-trip (goal validation).
    async fn complete_json(&self, system_prompt: &str, user_prompt: &str)
        -> anyhow::Result<String>;
}

/// Inline data URL for the vision request payload.
pub fn image_data_url(bytes: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_url_carries_mime_and_base64() {
        let url = image_data_url(b"abc", "image/png");
        assert_eq!(url, "data:image/png;base64,YWJj");
    }
}
