/// Instruction sent alongside every image.
pub const LANDMARK_PROMPT: &str = r#"Identify the landmark in this photo.

INSTRUCTIONS:
1. Name the most recognizable landmark or place visible in the image
2. Give its location as decimal degrees (negative for south and west)
3. Add one sentence of context about the place
4. Output ONLY valid JSON, nothing else

SCHEMA:
{"name": "Landmark Name", "lat": 0.0, "lng": 0.0, "desc": "1-sentence context"}

If no landmark can be identified, output exactly:
{"error": "unknown"}

RULES:
- "lat" and "lng" must be JSON numbers, not strings
- No markdown, no code blocks, no explanations

JSON OUTPUT:"#;

pub fn build_landmark_prompt() -> String {
    LANDMARK_PROMPT.to_string()
}
