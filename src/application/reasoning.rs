//! Two-turn implication analysis: a free-text reasoning turn followed by a
//! JSON extraction turn over the same conversation.

use crate::domain::entities::comparison::ComparisonResult;
use crate::domain::entities::market::Market;
use crate::domain::error::DomainError;
use crate::domain::ports::chat_model::{ChatMessage, ChatModel};
use tracing::debug;

const TEMPERATURE: f32 = 0.0;

const REASONING_SYSTEM_PROMPT: &str = r#"You are a logical reasoning engine specialized in prediction market implications.
Task: Determine if the outcome of a "Source" market logically necessitates a specific outcome in a "Target" market.

CRITICAL DISTINCTION:
- You must distinguish between CORRELATION (likely to happen) and LOGICAL NECESSITY (must happen).
- Only conclude a definite outcome if the outcome is a LOGICAL NECESSITY based on the definitions of the events.
- If the relationship is merely correlational (e.g. "Stock A going up usually means Stock B goes up"), you MUST conclude no necessity.

Rules:
1. Analyze if Source=YES implies Target=YES (NECESSITY).
2. Analyze if Source=YES implies Target=NO (NECESSITY).
3. Analyze if Source=NO implies Target=YES (NECESSITY).
4. Analyze if Source=NO implies Target=NO (NECESSITY).
5. If the outcome is uncertain, not guaranteed, or merely correlated, state that there is no logical necessity.
6. Check for MUTUAL EXCLUSIVITY: If Source and Target describe different outcomes for the same unique position (e.g. Winner, Top Rank, Next CEO), then Source=YES implies Target=NO.

Constraint Examples:
- "Total > 10" implies "Total > 5" (NECESSITY).
- "A wins" implies "B loses" (if mutually exclusive) (NECESSITY).
- "Inflation goes up" implies "Rates go up" (CORRELATION - No necessity).
- 'Song A is #1' implies 'Song B is NOT #1' (NECESSITY - Mutually Exclusive).
- Specific dates/values must be strictly compared.

DO NOT output JSON. Provide a step-by-step logical analysis."#;

const EXTRACTION_PROMPT: &str = r#"Based on the above analysis, map the logical implications to strict JSON.

JSON Schema:
{
  "reason": "A summary of the logic",
  "source_yes": "target_yes" | "target_no" | null,
  "source_no": "target_yes" | "target_no" | null
}

Constraints:
- "source_yes": The necessary outcome of the Target market if the Source market resolves to YES. Null if no necessity.
- "source_no": The necessary outcome of the Target market if the Source market resolves to NO. Null if no necessity.
- "reason": A brief summary string explaining the logic."#;

fn reasoning_user_prompt(source: &Market, target: &Market) -> String {
    format!(
        "Source Bet:\nCategory: {}\nMarket: {}\n\nTarget Bet:\nCategory: {}\nMarket: {}\n\n\
         Please provide a step-by-step logical analysis of whether the Source outcome necessitates the Target outcome.",
        source.category,
        source.prompt_description(),
        target.category,
        target.prompt_description(),
    )
}

/// Runs both turns against `chat` and returns the normalized result.
///
/// Identifier fields always describe the given pair. A reply that does not
/// contain a parseable object is a `DomainError::Parse`.
pub async fn compare_markets(
    chat: &dyn ChatModel,
    source: &Market,
    target: &Market,
) -> Result<ComparisonResult, DomainError> {
    let mut messages = vec![
        ChatMessage::system(REASONING_SYSTEM_PROMPT),
        ChatMessage::user(reasoning_user_prompt(source, target)),
    ];
    debug!(source = %source.external_id, target = %target.external_id, prompt = %messages[1].content, "Reasoning turn");

    let analysis = chat.complete(&messages, TEMPERATURE).await?;
    debug!(model = chat.name(), output = %analysis, "Reasoning output");

    messages.push(ChatMessage::assistant(analysis));
    messages.push(ChatMessage::user(EXTRACTION_PROMPT));

    let extracted = chat.complete(&messages, TEMPERATURE).await?;
    debug!(model = chat.name(), output = %extracted, "Extraction output");

    let mut result = ComparisonResult::from_model_output(&extracted)
        .map_err(|e| DomainError::Parse(format!("{e}; output was: {extracted}")))?;

    result.source_market_id = source.external_id.clone();
    result.source_event_id = source.event_ticker.clone();
    result.target_market_id = target.external_id.clone();
    result.target_event_id = target.event_ticker.clone();
    Ok(result)
}
