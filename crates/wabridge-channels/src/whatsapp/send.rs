//! Outbound message chunking.

/// WhatsApp rejects text bodies above this many bytes.
pub(super) const MAX_MESSAGE_LEN: usize = 4096;

/// Split a long message into chunks of at most `max_len` bytes, preferring
/// newline breaks and never cutting through a UTF-8 character.
pub(super) fn split_message(text: &str, max_len: usize) -> Vec<&str> {
    if text.len() <= max_len {
        return vec![text];
    }

    let mut chunks = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= max_len {
            chunks.push(rest);
            break;
        }
        let mut end = max_len;
        while !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = rest.chars().next().map_or(rest.len(), char::len_utf8);
        }
        let break_at = rest[..end].rfind('\n').map(|i| i + 1).unwrap_or(end);
        let (head, tail) = rest.split_at(break_at);
        chunks.push(head);
        rest = tail;
    }

    chunks
}
