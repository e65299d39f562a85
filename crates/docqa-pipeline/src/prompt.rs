pub const SYSTEM_PROMPT: &str = "You answer questions using only the provided context.";

/// Returned instead of calling the model when nothing relevant was retrieved.
pub const INSUFFICIENT_INFORMATION: &str =
    "I could not find enough information in the document to answer this question.";

pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "Use the following context to answer the question.\n\nContext:\n{context}\n\nQuestion: {question}\n\nAnswer concisely using the context above."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_follows_context() {
        let p = build_prompt("[page 1, part 0]\nwolves howl", "what howls?");
        let ctx = p.find("wolves howl").unwrap();
        let q = p.find("Question: what howls?").unwrap();
        assert!(ctx < q);
        assert!(p.ends_with("Answer concisely using the context above."));
    }
}
