//! Coaching prompt sent to chat-completion providers.

use crate::suggest::SuggestionRequest;

/// Number of replacement tasks the prompt asks for.
pub const SUGGESTED_TASK_COUNT: usize = 5;

const NONE_PLACEHOLDER: &str = "none";

/// Renders the re-planning prompt for `request`.
///
/// Only task texts and completion state are used; empty groups render as
/// `none`.
pub fn build_plan_prompt(request: &SuggestionRequest) -> String {
    let completed = join_texts(request.tasks.iter().filter(|t| t.completed).map(|t| &t.text));
    let incomplete = join_texts(request.tasks.iter().filter(|t| !t.completed).map(|t| &t.text));

    format!(
        "You are a professional goal-achievement coach.\n\
         Your client is struggling to reach their goal. Rebuild their plan from the information below.\n\
         # Client information\n\
         - **Final goal:** {goal}\n\
         - **Completed tasks:** {completed}\n\
         - **Incomplete tasks:** {incomplete}\n\
         # Your job\n\
         1. Analyze the information and guess where the client is most likely stuck.\n\
         2. Then propose a new list of {count} concrete, actionable tasks that lead to the final goal.\n\
         3. Keep each task short and phrase it as a specific action.\n\
         4. Answer with a JSON object that has a \"tasks\" key holding an array of strings. \
         Example: {{\"tasks\": [\"New task 1\", \"New task 2\", \"New task 3\", \"New task 4\", \"New task 5\"]}}\n\
         5. Do not include any text outside the JSON object.\n",
        goal = request.goal_text.trim(),
        completed = completed,
        incomplete = incomplete,
        count = SUGGESTED_TASK_COUNT,
    )
}

fn join_texts<'a>(texts: impl Iterator<Item = &'a String>) -> String {
    let joined = texts
        .map(|text| text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        NONE_PLACEHOLDER.to_string()
    } else {
        joined
    }
}
