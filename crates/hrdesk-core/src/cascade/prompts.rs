//! Prompt templates sent to the generator.

use crate::config::NOT_FOUND_SENTINEL;

/// Prompt that restricts the model to the retrieved policy text.
///
/// The model must reply with exactly [`NOT_FOUND_SENTINEL`] when the policy
/// does not state the answer.
pub fn grounded_prompt(policy_text: &str, question: &str) -> String {
    format!(
        "\nExtract the answer ONLY if it is explicitly stated in the policy text.\n\
         If the answer is not explicitly stated, return exactly: {NOT_FOUND_SENTINEL}\n\
         \n\
         Policy:\n\
         {policy_text}\n\
         \n\
         Question:\n\
         {question}\n\
         \n\
         Return ONE short factual sentence.\n"
    )
}

/// Unconstrained prompt used when no policy text applies.
pub fn fallback_prompt(question: &str) -> String {
    format!(
        "\nYou are an internal HR assistant for this company.\n\
         Answer briefly in ONE sentence.\n\
         \n\
         Question:\n\
         {question}\n"
    )
}

/// True when a grounded reply means "the policy doesn't say".
///
/// Trimmed, case-insensitive, exact match; a sentence that merely
/// contains the sentinel is an answer.
pub fn is_not_found(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case(NOT_FOUND_SENTINEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grounded_prompt_layout() {
        let prompt = grounded_prompt(
            "The notice period for permanent staff is 30 days.",
            "What is the notice period?",
        );
        assert_eq!(
            prompt,
            "\nExtract the answer ONLY if it is explicitly stated in the policy text.\n\
             If the answer is not explicitly stated, return exactly: NOT_FOUND\n\n\
             Policy:\nThe notice period for permanent staff is 30 days.\n\n\
             Question:\nWhat is the notice period?\n\n\
             Return ONE short factual sentence.\n"
        );
    }

    #[test]
    fn test_fallback_prompt_has_no_policy() {
        let prompt = fallback_prompt("Is there a gym?");
        assert!(prompt.contains("internal HR assistant"));
        assert!(prompt.ends_with("Question:\nIs there a gym?\n"));
        assert!(!prompt.contains("Policy:"));
    }

    #[test]
    fn test_sentinel_detection() {
        assert!(is_not_found("NOT_FOUND"));
        assert!(is_not_found("  not_found\n"));
        assert!(is_not_found("Not_Found"));
        assert!(!is_not_found("NOT_FOUND."));
        assert!(!is_not_found("The answer was NOT_FOUND in the policy"));
        assert!(!is_not_found(""));
    }
}
