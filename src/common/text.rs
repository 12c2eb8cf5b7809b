//! Small text helpers shared by the piers.

/// Largest char boundary at or below `byte_index`.
fn floor_char_boundary(s: &str, byte_index: usize) -> usize {
    if byte_index >= s.len() {
        return s.len();
    }
    let mut i = byte_index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Split a message into chunks of at most `max_len` bytes.
///
/// Words are packed greedily. A word that does not fit on a line of its own is
/// cut on char boundaries. Chunks never start or end with a space.
pub fn split_message(message: &str, max_len: usize) -> Vec<String> {
    if message.len() <= max_len {
        return vec![message.to_string()];
    }

    let mut chunks = Vec::new();
    let mut line = String::new();

    for word in message.split(' ') {
        if line.is_empty() && word.is_empty() {
            continue;
        }

        let joined_len = if line.is_empty() {
            word.len()
        } else {
            line.len() + 1 + word.len()
        };
        if joined_len <= max_len {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
            continue;
        }

        if !line.is_empty() {
            chunks.push(line.trim_end_matches(' ').to_string());
            line.clear();
        }

        let mut rest = word;
        while rest.len() > max_len {
            let cut = match floor_char_boundary(rest, max_len) {
                // Limit is smaller than the first char: take the char anyway
                0 => rest.chars().next().map_or(rest.len(), char::len_utf8),
                cut => cut,
            };
            chunks.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        line.push_str(rest);
    }

    let line = line.trim_end_matches(' ');
    if !line.is_empty() {
        chunks.push(line.to_string());
    }
    chunks
}
