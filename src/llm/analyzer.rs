use base64::{engine::general_purpose, Engine};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::client::{ChatMessage, LlmClient};
use crate::matcher::Restrictions;

pub const FALLBACK_FOOD_NAME: &str = "Unknown food";
pub const FALLBACK_REASON: &str = "Could not analyze image";

/// What the model reports about a photographed dish.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAnalysis {
    #[serde(default)]
    pub food_name: String,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub is_safe: Option<bool>,
    #[serde(default)]
    pub unsafe_reasons: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl FoodAnalysis {
    pub fn fallback() -> Self {
        Self {
            food_name: FALLBACK_FOOD_NAME.into(),
            ingredients: Vec::new(),
            is_safe: None,
            unsafe_reasons: vec![FALLBACK_REASON.into()],
            description: "We could not analyze this image. Please try again with a clearer photo."
                .into(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.food_name == FALLBACK_FOOD_NAME && self.unsafe_reasons.iter().any(|r| r == FALLBACK_REASON)
    }
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

pub fn build_prompt(restrictions: Restrictions<'_>) -> String {
    let profile = if restrictions.is_empty() {
        "The user has no dietary restrictions.".to_string()
    } else {
        format!(
            "The user's dietary profile:\n- Allergies: {}\n- Dietary preferences: {}\n- Health restrictions: {}",
            list_or_none(restrictions.allergies),
            list_or_none(restrictions.dietary_preferences),
            list_or_none(restrictions.health_restrictions),
        )
    };

    format!(
        "You are a food safety assistant. Identify the food in this photo and list its likely \
         ingredients, including common hidden ones (sauces, oils, dressings).\n\n\
         {profile}\n\n\
         Decide whether the food is safe for this user. Use null for isSafe when you cannot tell.\n\
         Reply with ONLY a JSON object of this shape:\n\
         {{\"foodName\": string, \"ingredients\": [string], \"isSafe\": true | false | null, \
         \"unsafeReasons\": [string], \"description\": string}}"
    )
}

pub fn image_data_url(bytes: &[u8], content_type: &str) -> String {
    format!("data:{};base64,{}", content_type, general_purpose::STANDARD.encode(bytes))
}

/// Outermost `{...}` of a reply that may carry a code fence or prose.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_analysis(text: &str) -> anyhow::Result<FoodAnalysis> {
    let json = extract_json(text).ok_or_else(|| anyhow::anyhow!("no JSON object in reply"))?;
    let mut analysis: FoodAnalysis = serde_json::from_str(json)?;
    analysis.food_name = analysis.food_name.trim().to_string();
    if analysis.food_name.is_empty() {
        analysis.food_name = FALLBACK_FOOD_NAME.into();
    }
    analysis.ingredients = analysis
        .ingredients
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();
    Ok(analysis)
}

/// Best effort: any transport or parse failure yields [`FoodAnalysis::fallback`].
pub async fn analyze_food_image(
    llm: &dyn LlmClient,
    model: &str,
    image: &[u8],
    content_type: &str,
    restrictions: Restrictions<'_>,
) -> FoodAnalysis {
    debug!(bytes = image.len(), %content_type, %model, "analyzing food image");
    let messages = [ChatMessage::user_with_image(
        build_prompt(restrictions),
        image_data_url(image, content_type),
    )];

    let reply = match llm.complete(model, &messages).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "image analysis request failed");
            return FoodAnalysis::fallback();
        }
    };

    match parse_analysis(&reply) {
        Ok(a) => {
            info!(food = %a.food_name, ingredients = a.ingredients.len(), "image analyzed");
            a
        }
        Err(e) => {
            warn!(error = %e, "could not parse analysis reply");
            FoodAnalysis::fallback()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(anyhow::Result<String>);

    #[async_trait]
    impl LlmClient for Canned {
        async fn complete(&self, _model: &str, _m: &[ChatMessage]) -> anyhow::Result<String> {
            match &self.0 {
                Ok(s) => Ok(s.clone()),
                Err(e) => Err(anyhow::anyhow!(e.to_string())),
            }
        }
    }

    #[test]
    fn prompt_lists_restrictions() {
        let allergies = vec!["peanuts".to_string()];
        let prompt = build_prompt(Restrictions { allergies: &allergies, ..Default::default() });
        assert!(prompt.contains("Allergies: peanuts"));
        assert!(prompt.contains("Dietary preferences: none"));
        assert!(prompt.contains("\"foodName\""));
    }

    #[test]
    fn prompt_without_restrictions() {
        let prompt = build_prompt(Restrictions::default());
        assert!(prompt.contains("no dietary restrictions"));
    }

    #[test]
    fn parses_fenced_json() {
        let reply = "Sure!\n```json\n{\"foodName\": \" Pad Thai \", \"ingredients\": [\"rice noodles\", \" \", \"peanuts\"], \"isSafe\": false, \"unsafeReasons\": [\"peanuts\"], \"description\": \"Thai noodles\"}\n```";
        let a = parse_analysis(reply).unwrap();
        assert_eq!(a.food_name, "Pad Thai");
        assert_eq!(a.ingredients, vec!["rice noodles", "peanuts"]);
        assert_eq!(a.is_safe, Some(false));
    }

    #[test]
    fn null_is_safe_means_caution() {
        let a = parse_analysis(r#"{"foodName":"Soup","ingredients":[],"isSafe":null}"#).unwrap();
        assert_eq!(a.is_safe, None);
        assert!(a.unsafe_reasons.is_empty());
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_analysis("I cannot see any food here.").is_err());
        assert!(extract_json("} backwards {").is_none());
    }

    #[test]
    fn data_url_is_base64() {
        assert_eq!(image_data_url(b"hi", "image/png"), "data:image/png;base64,aGk=");
    }

    #[tokio::test]
    async fn falls_back_on_garbage_reply() {
        let llm = Canned(Ok("not json".into()));
        let a = analyze_food_image(&llm, "m", b"img", "image/jpeg", Restrictions::default()).await;
        assert!(a.is_fallback());
        assert_eq!(a.is_safe, None);
    }

    #[tokio::test]
    async fn falls_back_on_transport_error() {
        let llm = Canned(Err(anyhow::anyhow!("timeout")));
        let a = analyze_food_image(&llm, "m", b"img", "image/jpeg", Restrictions::default()).await;
        assert_eq!(a, FoodAnalysis::fallback());
    }

    #[tokio::test]
    async fn returns_parsed_analysis() {
        let llm = Canned(Ok(r#"{"foodName":"Salad","ingredients":["lettuce"],"isSafe":true}"#.into()));
        let a = analyze_food_image(&llm, "m", b"img", "image/jpeg", Restrictions::default()).await;
        assert_eq!(a.food_name, "Salad");
        assert_eq!(a.is_safe, Some(true));
    }
}
