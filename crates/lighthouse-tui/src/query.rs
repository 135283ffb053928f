//! Single-line query editor.
//!
//! Cursor positions are in char units. Every editing method reports whether
//! the text changed, so the caller only re-sends the query when it must.

/// The query being typed, plus its cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuffer {
    text: String,
    cursor: usize,
}

impl QueryBuffer {
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Cursor position in chars.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Text left of the cursor.
    pub fn before_cursor(&self) -> &str {
        &self.text[..char_to_byte_index(&self.text, self.cursor)]
    }

    /// Inserts a string at the cursor. Line breaks become spaces, since a
    /// query is always sent as one line.
    pub fn insert_str(&mut self, text: &str) -> bool {
        let cleaned: String = text
            .chars()
            .filter(|&c| c != '\r')
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        if cleaned.is_empty() {
            return false;
        }
        let byte_idx = char_to_byte_index(&self.text, self.cursor);
        self.text.insert_str(byte_idx, &cleaned);
        self.cursor += cleaned.chars().count();
        true
    }

    pub fn insert_char(&mut self, ch: char) -> bool {
        let mut buf = [0u8; 4];
        self.insert_str(ch.encode_utf8(&mut buf))
    }

    /// Backspace.
    pub fn delete_prev_char(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.delete_range(self.cursor - 1, self.cursor);
        self.cursor -= 1;
        true
    }

    /// Delete.
    pub fn delete_next_char(&mut self) -> bool {
        if self.cursor >= char_len(&self.text) {
            return false;
        }
        self.delete_range(self.cursor, self.cursor + 1);
        true
    }

    /// Deletes the word immediately to the left of the cursor.
    pub fn delete_word_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        let chars: Vec<char> = self.text.chars().collect();
        let start = scan_left_segment(&chars, self.cursor.min(chars.len()));
        self.delete_range(start, self.cursor);
        self.cursor = start;
        true
    }

    /// Clears the whole query.
    pub fn clear(&mut self) -> bool {
        if self.text.is_empty() {
            return false;
        }
        self.text.clear();
        self.cursor = 0;
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(char_len(&self.text));
    }

    pub fn move_home(&mut self) {
        self.cursor = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor = char_len(&self.text);
    }

    fn delete_range(&mut self, start: usize, end: usize) {
        let start = char_to_byte_index(&self.text, start);
        let end = char_to_byte_index(&self.text, end);
        self.text.replace_range(start..end, "");
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum CharClass {
    Whitespace,
    Word,
    Punct,
}

fn char_class(c: char) -> CharClass {
    if c.is_whitespace() {
        CharClass::Whitespace
    } else if c.is_alphanumeric() || c == '_' {
        CharClass::Word
    } else {
        CharClass::Punct
    }
}

fn scan_left_segment(chars: &[char], mut idx: usize) -> usize {
    if idx == 0 {
        return 0;
    }
    let class = char_class(chars[idx - 1]);
    while idx > 0 && char_class(chars[idx - 1]) == class {
        idx -= 1;
    }
    idx
}

fn char_to_byte_index(text: &str, col: usize) -> usize {
    text.char_indices().nth(col).map_or(text.len(), |(i, _)| i)
}
