//! Builds the instruction text sent alongside the room photo.

use leeway_core::DesignRequest;

/// Used when the user gave no description of their own.
pub const DEFAULT_DESCRIPTION: &str = "Please analyze this room and provide design suggestions";

/// Fill the prompt template in one pass. User text is inserted verbatim.
fn fill_template(room: &str, style: &str, description: &str, budget_line: &str) -> String {
    format!(
        r#"As an expert interior designer, analyze this {room} and provide design suggestions.

Context:
- Room Type: {room}
- Preferred Style: {style}
- Description: {description}
{budget_line}
Please provide:
1. Overall analysis of the current space
2. Specific design suggestions categorized by furniture, color scheme, lighting, decor, layout, and storage
3. Prioritize suggestions by impact and budget considerations
4. Estimated costs where applicable

Respond with JSON only, no markdown, in exactly this format:
{{
  "analysis": "Your analysis here",
  "suggestions": [
    {{
      "title": "Suggestion title",
      "description": "Detailed description",
      "category": "furniture|color-scheme|lighting|decor|layout|storage",
      "priority": "high|medium|low",
      "estimatedCost": 0
    }}
  ]
}}"#
    )
}

const IMAGE_NOTE: &str = "A photo of the room is attached. Base your analysis on what you can see in it.";

const NO_IMAGE_NOTE: &str = "No photo is available. Base your analysis on the description alone.";

/// Build the prompt for a request.
///
/// `with_image` says whether an image segment will actually be attached,
/// which can differ from `request.image_uri()` when the image was unreadable.
pub fn build_prompt(request: &DesignRequest, with_image: bool) -> String {
    let description = match request.description().trim() {
        "" => DEFAULT_DESCRIPTION,
        text => text,
    };

    let budget_line = match request.budget() {
        Some(budget) => format!("- Budget: ${}\n", format_amount(budget)),
        None => String::new(),
    };

    let note = if with_image { IMAGE_NOTE } else { NO_IMAGE_NOTE };

    let prompt = fill_template(
        request.room_type().label(),
        request.style().label(),
        description,
        &budget_line,
    );
    format!("{prompt}\n\n{note}")
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
    }
}
