use serde_json::json;

use crate::model::RawComment;

pub(super) const CLASSIFY_SYSTEM_PROMPT: &str = r#"You classify viewer comments for a community feedback report.

Be objective and conservative. Only label intent that the comment clearly expresses.
If unsure, use neutral sentiment and the intent "discussion" or "other".
Never explain your choices.

Output rules:
- Respond with a JSON array only. No markdown, no prose before or after.
- One object per comment with the keys: id, sentiment, intent, emotion_intensity, key_topics.

sentiment: positive | neutral | negative

intent: praise | question | constructive_criticism | aggressive_criticism | discussion | other
- aggressive_criticism: insults, personal attacks, contempt or demeaning language
- constructive_criticism: criticism that gives reasons or suggestions without attacking anyone

emotion_intensity: number from 0.0 to 1.0
- 0.0 informational, no emotion
- 0.3 mild
- 0.6 strong
- 0.9 rage or insults

key_topics: 0 to 3 abstract, reusable snake_case topics.
- No generic topics such as "this_video", "creator" or "content".
- No personal names and no specific events.
"#;

pub(super) const REPAIR_SYSTEM_PROMPT: &str =
    "You repair JSON syntax. Respond with valid JSON only.";

pub(super) fn build_classify_prompt(batch: &[&RawComment]) -> String {
    let payload = batch
        .iter()
        .map(|comment| json!({ "id": comment.comment_id, "text": comment.text }))
        .collect::<Vec<_>>();

    format!(
        "Classify the following comments.\n\n\
         Return one object per comment with:\n\
         - id (copied from the input)\n\
         - sentiment: positive | neutral | negative\n\
         - intent: praise | question | constructive_criticism | aggressive_criticism | discussion | other\n\
         - emotion_intensity: number between 0.0 and 1.0\n\
         - key_topics: up to 3 abstract snake_case topics\n\n\
         Comments:\n{:#}\n",
        serde_json::Value::Array(payload)
    )
}

pub(super) fn build_repair_prompt(broken: &str) -> String {
    format!(
        "The text below should be a JSON array but has syntax errors.\n\n\
         - Fix only the syntax so that it parses as JSON.\n\
         - Do not change any values, labels or content beyond what valid JSON requires.\n\
         - Respond with the corrected JSON array only, without markdown or commentary.\n\n\
         Broken JSON:\n{broken}\n"
    )
}
