//! Plain-text extraction for speech synthesis.

use lol_html::{RewriteStrSettings, comments, element, rewrite_str};

use super::error::DomainError;

/// Upper bound on the number of characters sent to the TTS server.
pub const MAX_SPEECH_CHARS: usize = 5000;

/// Build the text read aloud for a post: `"{title}. {body}"` with all markup removed,
/// whitespace runs collapsed and the result cut at `max_chars` characters.
///
/// The cut is a hard character boundary; sentences are not preserved.
pub fn build_speech_text(
    title: &str,
    body_html: &str,
    max_chars: usize,
) -> Result<String, DomainError> {
    let stripped = strip_markup(body_html)?;
    let body = collapse_whitespace(stripped.trim());
    let text = format!("{title}. {body}");
    Ok(truncate_chars(&text, max_chars).to_string())
}

/// Remove every tag, keeping element text. `script` and `style` lose their content too.
pub fn strip_markup(html: &str) -> Result<String, DomainError> {
    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![
                element!("script, style", |el| {
                    el.remove();
                    Ok(())
                }),
                element!("*", |el| {
                    if !el.removed() {
                        el.remove_and_keep_content();
                    }
                    Ok(())
                }),
                comments!("*", |comment| {
                    comment.remove();
                    Ok(())
                }),
            ],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|err| DomainError::validation(format!("post body could not be parsed: {err}")))
}

/// Replace each run of whitespace with a single space.
pub fn collapse_whitespace(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut in_run = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            if !in_run {
                output.push(' ');
                in_run = true;
            }
        } else {
            output.push(ch);
            in_run = false;
        }
    }
    output
}

fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &input[..byte_index],
        None => input,
    }
}
