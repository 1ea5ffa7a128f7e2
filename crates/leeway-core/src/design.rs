use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Lowercase a free-form label and fold `_` and spaces into `-`.
pub(crate) fn normalize_token(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Error returned when a label does not name a known enum value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $variant:ident => $wire:literal, $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $( $variant ),+
        }

        impl $name {
            /// Every value, in declaration order.
            pub fn all() -> &'static [$name] {
                &[ $( $name::$variant ),+ ]
            }

            /// The kebab-case value used on the wire.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $wire ),+
                }
            }

            /// Human-readable label.
            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.label())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let token = normalize_token(s);
                match token.as_str() {
                    $( $wire => Ok($name::$variant), )+
                    _ => Err(UnknownVariant {
                        kind: $kind,
                        value: s.to_string(),
                    }),
                }
            }
        }
    };
}

closed_enum! {
    /// The kind of room being analyzed.
    RoomType, "room type" {
        LivingRoom => "living-room", "living room",
        Bedroom => "bedroom", "bedroom",
        Kitchen => "kitchen", "kitchen",
        Bathroom => "bathroom", "bathroom",
        DiningRoom => "dining-room", "dining room",
        Office => "office", "office",
        Other => "other", "room",
    }
}

closed_enum! {
    /// The interior style the user is aiming for.
    DesignStyle, "design style" {
        Modern => "modern", "modern",
        Traditional => "traditional", "traditional",
        Minimalist => "minimalist", "minimalist",
        Industrial => "industrial", "industrial",
        Bohemian => "bohemian", "bohemian",
        Scandinavian => "scandinavian", "scandinavian",
        Rustic => "rustic", "rustic",
        Eclectic => "eclectic", "eclectic",
    }
}

closed_enum! {
    /// What aspect of the room a suggestion touches.
    SuggestionCategory, "suggestion category" {
        Furniture => "furniture", "Furniture",
        ColorScheme => "color-scheme", "Color scheme",
        Lighting => "lighting", "Lighting",
        Decor => "decor", "Decor",
        Layout => "layout", "Layout",
        Storage => "storage", "Storage",
    }
}

closed_enum! {
    /// How strongly the backend recommends a suggestion.
    Priority, "priority" {
        High => "high", "High",
        Medium => "medium", "Medium",
        Low => "low", "Low",
    }
}

impl Default for RoomType {
    fn default() -> Self {
        RoomType::LivingRoom
    }
}

impl Default for DesignStyle {
    fn default() -> Self {
        DesignStyle::Modern
    }
}

impl Default for SuggestionCategory {
    fn default() -> Self {
        SuggestionCategory::Decor
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Reference to captured or selected image content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ImageHandle(PathBuf);

impl ImageHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// String form of the handle, as shown to users and logs.
    pub fn uri(&self) -> String {
        self.0.display().to_string()
    }
}

impl std::fmt::Display for ImageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// One submitted analysis intent.
///
/// Requests are built by [`crate::RequestBuilder`] and never change afterwards;
/// every pipeline attempt gets a fresh one.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignRequest {
    id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_uri: Option<ImageHandle>,
    description: String,
    room_type: RoomType,
    style: DesignStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    budget: Option<f64>,
    timestamp: DateTime<Utc>,
}

impl DesignRequest {
    pub(crate) fn new(
        image_uri: Option<ImageHandle>,
        description: String,
        room_type: RoomType,
        style: DesignStyle,
        budget: Option<f64>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_uri,
            description,
            room_type,
            style,
            budget,
            timestamp: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn image_uri(&self) -> Option<&ImageHandle> {
        self.image_uri.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn room_type(&self) -> RoomType {
        self.room_type
    }

    pub fn style(&self) -> DesignStyle {
        self.style
    }

    pub fn budget(&self) -> Option<f64> {
        self.budget
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// One discrete, categorized design recommendation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignSuggestion {
    /// Assigned when the backend output is parsed.
    pub id: Uuid,

    pub title: String,

    pub description: String,

    pub category: SuggestionCategory,

    pub priority: Priority,

    /// Rough cost in the user's currency, when the backend gave one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

/// One completed analysis outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignResponse {
    pub id: Uuid,

    /// Id of the [`DesignRequest`] this answers.
    pub request_id: Uuid,

    /// Narrative summary. Holds the raw backend text for degraded responses.
    pub analysis: String,

    /// Ranked as emitted by the backend. Empty for degraded responses.
    pub suggestions: Vec<DesignSuggestion>,

    pub timestamp: DateTime<Utc>,
}

impl DesignResponse {
    /// Sum of the estimated costs that were provided.
    pub fn total_estimated_cost(&self) -> Option<f64> {
        let costs: Vec<f64> = self
            .suggestions
            .iter()
            .filter_map(|s| s.estimated_cost)
            .collect();
        if costs.is_empty() {
            None
        } else {
            Some(costs.iter().sum())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enums_parse_loose_labels() {
        assert_eq!("Living Room".parse::<RoomType>(), Ok(RoomType::LivingRoom));
        assert_eq!("dining_room".parse::<RoomType>(), Ok(RoomType::DiningRoom));
        assert_eq!(" SCANDINAVIAN ".parse::<DesignStyle>(), Ok(DesignStyle::Scandinavian));
        assert_eq!(
            "Color Scheme".parse::<SuggestionCategory>(),
            Ok(SuggestionCategory::ColorScheme)
        );
        assert!("garage".parse::<RoomType>().is_err());
    }

    #[test]
    fn enums_use_kebab_case_on_the_wire() {
        let json = serde_json::to_string(&SuggestionCategory::ColorScheme).unwrap();
        assert_eq!(json, "\"color-scheme\"");
        let room: RoomType = serde_json::from_str("\"dining-room\"").unwrap();
        assert_eq!(room, RoomType::DiningRoom);
        for style in DesignStyle::all() {
            assert_eq!(style.as_str().parse::<DesignStyle>(), Ok(*style));
        }
    }

    #[test]
    fn request_serializes_with_camel_case_fields() {
        let request = DesignRequest::new(
            Some(ImageHandle::new("/tmp/room.jpg")),
            "small room".into(),
            RoomType::Bedroom,
            DesignStyle::Minimalist,
            Some(500.0),
        );
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["imageUri"], "/tmp/room.jpg");
        assert_eq!(value["roomType"], "bedroom");
        assert_eq!(value["budget"], 500.0);
    }

    #[test]
    fn total_cost_ignores_missing_estimates() {
        let suggestion = |cost| DesignSuggestion {
            id: Uuid::new_v4(),
            title: "t".into(),
            description: String::new(),
            category: SuggestionCategory::Decor,
            priority: Priority::Low,
            estimated_cost: cost,
        };
        let mut response = DesignResponse {
            id: Uuid::new_v4(),
            request_id: Uuid::new_v4(),
            analysis: "ok".into(),
            suggestions: vec![suggestion(Some(100.0)), suggestion(None), suggestion(Some(50.0))],
            timestamp: Utc::now(),
        };
        assert_eq!(response.total_estimated_cost(), Some(150.0));
        response.suggestions.clear();
        assert_eq!(response.total_estimated_cost(), None);
    }
}
