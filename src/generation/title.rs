use super::{Content, GenerativeModel};

/// Title used whenever generation fails or produces nothing usable.
pub const FALLBACK_TITLE: &str = "Untitled Document";

/// Upper bound on the number of words kept from a generated title.
pub const MAX_TITLE_WORDS: usize = 5;

/// Build the one-shot prompt asking the model to title a summary.
pub fn title_prompt(summary: &str) -> String {
    format!(
        "Given the following summary of a document, generate a concise and descriptive title (maximum 5 words):\n\n{summary}\n\nTitle:"
    )
}

/// Ask `model` for a short title describing `summary`.
///
/// Never fails: any provider error or empty reply yields [`FALLBACK_TITLE`].
pub async fn generate_title(model: &dyn GenerativeModel, summary: &str) -> String {
    let request = [Content::user_text(title_prompt(summary))];
    match model.generate(&request).await {
        Ok(reply) => match clean_title(&reply) {
            Some(title) => title,
            None => {
                tracing::error!("Title generation returned no usable text");
                FALLBACK_TITLE.to_string()
            }
        },
        Err(error) => {
            tracing::error!(error = %error, "Error generating title");
            FALLBACK_TITLE.to_string()
        }
    }
}

fn clean_title(reply: &str) -> Option<String> {
    let first_line = reply.trim().lines().next()?;
    let stripped = first_line
        .trim()
        .trim_start_matches("Title:")
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '#' || c.is_whitespace());
    let words: Vec<&str> = stripped.split_whitespace().take(MAX_TITLE_WORDS).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}
