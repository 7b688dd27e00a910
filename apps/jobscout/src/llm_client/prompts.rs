// Cross-cutting prompt fragments. Generation keeps its own prompts in
// generation/prompts.rs.

/// System prompt that asks for a bare number and nothing else.
pub const NUMBER_ONLY_SYSTEM: &str = "You output only numbers. \
    Respond with a single decimal number between 0.0 and 1.0. \
    No text, no explanation, just the number.";
