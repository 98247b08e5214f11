//! `chat`.

use blockbot_types::{ChatOrigin, ChatRecord};

use super::{ActionContext, ActionError, ActionOutcome};

/// Send `message`, truncated to the chat length limit, and record it.
pub(super) async fn say(ctx: &ActionContext<'_>, message: &str) -> Result<ActionOutcome, ActionError> {
    let text = truncate_chars(message, ctx.chat_length_limit);
    if text.trim().is_empty() {
        return Err(ActionError::InvalidParameters {
            message: "chat message is empty".to_owned(),
        });
    }

    let session = ctx.connection.session();
    session.chat(text).await?;

    let record = ChatRecord::new(ChatOrigin::Bot, session.username(), text);
    let id = ctx.chat.push(record).await;
    Ok(ActionOutcome {
        message_id: Some(id),
        ..ActionOutcome::done(format!("said: {text}"))
    })
}

/// The longest prefix of `text` with at most `limit` characters.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> &str {
    text.char_indices()
        .nth(limit)
        .and_then(|(idx, _)| text.get(..idx))
        .unwrap_or(text)
}
