use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

/// One recommended product as produced by the model and reconciled
/// against the inventory. Missing fields decode to their zero value.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RecommendationItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub brand: String,
    #[serde(rename = "mainFeatures")]
    pub main_features: Vec<String>,
    pub tags: Option<Vec<String>>,
    #[serde(rename = "priceKRW")]
    pub price_krw: i64,
    #[serde(rename = "deliveryDays")]
    pub delivery_days: i64,
    pub category: String,
    /// Attached server-side; `None` marks a title that matched nothing.
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
}

impl RecommendationItem {
    pub fn is_resolved(&self) -> bool {
        self.image_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationTurn {
    System(String),
    User(String),
    Assistant(String),
}

impl ConversationTurn {
    pub fn role(&self) -> &'static str {
        match self {
            ConversationTurn::System(_) => "system",
            ConversationTurn::User(_) => "user",
            ConversationTurn::Assistant(_) => "assistant",
        }
    }

    pub fn content(&self) -> &str {
        match self {
            ConversationTurn::System(text)
            | ConversationTurn::User(text)
            | ConversationTurn::Assistant(text) => text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_decodes_with_missing_fields() {
        let item: RecommendationItem =
            serde_json::from_str(r#"{"title":"rice","priceKRW":12900,"extra":true}"#).unwrap();
        assert_eq!(item.title, "rice");
        assert_eq!(item.price_krw, 12900);
        assert!(item.main_features.is_empty());
        assert!(item.tags.is_none());
        assert!(!item.is_resolved());
    }

    #[test]
    fn item_serializes_wire_names_and_omits_absent_optionals() {
        let item = RecommendationItem {
            id: "1".into(),
            title: "rice".into(),
            main_features: vec!["short grain".into()],
            price_krw: 100,
            delivery_days: 1,
            ..Default::default()
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["mainFeatures"][0], "short grain");
        assert_eq!(value["priceKRW"], 100);
        assert_eq!(value["deliveryDays"], 1);
        assert!(value.get("imageUrl").is_none());
        assert!(value.get("tags").is_none());
    }

    #[test]
    fn chat_request_tolerates_missing_fields() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert!(req.session_id.is_empty());
        assert_eq!(req.message, "hi");
    }

    #[test]
    fn turn_roles() {
        assert_eq!(ConversationTurn::System("s".into()).role(), "system");
        assert_eq!(ConversationTurn::User("u".into()).content(), "u");
        assert_eq!(ConversationTurn::Assistant("a".into()).role(), "assistant");
    }
}
