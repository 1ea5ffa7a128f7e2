//! Request construction.
//!
//! Callers describe an analysis with an [`AnalysisInput`] whose fields are all
//! optional. The [`RequestBuilder`] owns the defaults: a room with no stated
//! type is a living room, and the style defaults to modern.

use serde::{Deserialize, Serialize};

use crate::design::{DesignRequest, DesignStyle, ImageHandle, RoomType};
use crate::error::{DesignError, Result};

/// Room type used when the caller does not pick one.
pub const DEFAULT_ROOM_TYPE: RoomType = RoomType::LivingRoom;

/// Style used when the caller does not pick one.
pub const DEFAULT_STYLE: DesignStyle = DesignStyle::Modern;

/// The user-supplied part of an analysis request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub description: Option<String>,
    pub room_type: Option<RoomType>,
    pub style: Option<DesignStyle>,
    pub budget: Option<f64>,
}

impl AnalysisInput {
    /// Check the input without building anything.
    pub fn validate(&self) -> Result<()> {
        if let Some(budget) = self.budget {
            if !budget.is_finite() {
                return Err(DesignError::InvalidRequest(
                    "Budget must be a finite number".to_string(),
                ));
            }
            if budget < 0.0 {
                return Err(DesignError::InvalidRequest(format!(
                    "Budget must not be negative (got {budget})"
                )));
            }
        }
        Ok(())
    }
}

/// Builds immutable [`DesignRequest`]s from partial input.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestBuilder;

impl RequestBuilder {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, input: &AnalysisInput, image: Option<ImageHandle>) -> Result<DesignRequest> {
        input.validate()?;
        Ok(DesignRequest::new(
            image,
            input.description.clone().unwrap_or_default(),
            input.room_type.unwrap_or(DEFAULT_ROOM_TYPE),
            input.style.unwrap_or(DEFAULT_STYLE),
            input.budget,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn defaults_apply_when_unspecified() {
        let request = RequestBuilder::new()
            .build(&AnalysisInput::default(), None)
            .unwrap();
        assert_eq!(request.room_type(), RoomType::LivingRoom);
        assert_eq!(request.style(), DesignStyle::Modern);
        assert_eq!(request.description(), "");
        assert!(request.image_uri().is_none());
        assert!(request.budget().is_none());
    }

    #[test]
    fn explicit_fields_are_kept() {
        let input = AnalysisInput {
            description: Some("small room".into()),
            room_type: Some(RoomType::Bedroom),
            style: Some(DesignStyle::Minimalist),
            budget: Some(500.0),
        };
        let request = RequestBuilder::new()
            .build(&input, Some(ImageHandle::new("room.jpg")))
            .unwrap();
        assert_eq!(request.room_type(), RoomType::Bedroom);
        assert_eq!(request.style(), DesignStyle::Minimalist);
        assert_eq!(request.description(), "small room");
        assert_eq!(request.budget(), Some(500.0));
        assert_eq!(request.image_uri().map(|h| h.uri()), Some("room.jpg".to_string()));
    }

    #[test]
    fn negative_budget_is_rejected() {
        let input = AnalysisInput {
            budget: Some(-1.0),
            ..Default::default()
        };
        let err = RequestBuilder::new().build(&input, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);

        let input = AnalysisInput {
            budget: Some(f64::NAN),
            ..Default::default()
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn zero_budget_is_allowed() {
        let input = AnalysisInput {
            budget: Some(0.0),
            ..Default::default()
        };
        assert!(RequestBuilder::new().build(&input, None).is_ok());
    }

    #[test]
    fn each_build_gets_a_fresh_id() {
        let builder = RequestBuilder::new();
        let input = AnalysisInput::default();
        let a = builder.build(&input, None).unwrap();
        let b = builder.build(&input, None).unwrap();
        assert_ne!(a.id(), b.id());
    }
}
