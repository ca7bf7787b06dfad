use crate::models::Limits;

/// Sampling temperature sent with every request. Not user-configurable.
pub const TEMPERATURE: f32 = 0.9;

const MIN_OUTPUT_TOKENS: u32 = 512;
const OUTPUT_TOKEN_HEADROOM: u32 = 256;

/// Render the instruction text for one image. Pure function of the limits.
pub fn build_prompt(limits: &Limits) -> String {
    format!(
        "Analyze this image and respond with ONLY a JSON object, no markdown and no text \
before or after it. Use exactly this shape:\n\
{{\"title\": \"...\", \"description\": \"...\", \"tags\": [\"...\", \"...\"]}}\n\
\n\
Rules:\n\
- \"title\": a specific, descriptive title of at most {title} characters.\n\
- \"description\": a detailed description of what is visible, at most {description} characters.\n\
- \"tags\": a list of plain keywords or short phrases without '#' symbols; \
all tags joined with \", \" must fit in {tags} characters.\n\
- Describe what is actually in the image. Avoid generic filler such as \
\"beautiful image\" or \"nice photo\".\n\
- Return valid JSON only.",
        title = limits.title,
        description = limits.description,
        tags = limits.tags,
    )
}

/// `max(512, ceil((description + title) / 2) + 256)`.
pub fn max_output_tokens(limits: &Limits) -> u32 {
    let verbosity = (limits.description as u64).saturating_add(limits.title as u64);
    let budget = verbosity
        .div_ceil(2)
        .saturating_add(OUTPUT_TOKEN_HEADROOM as u64);
    u32::try_from(budget)
        .unwrap_or(u32::MAX)
        .max(MIN_OUTPUT_TOKENS)
}
