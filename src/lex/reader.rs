use crate::lex::Pos;

/// Character stream over the source text with 1-based line/column tracking.
///
/// Carriage returns are dropped up front, so `\r\n` line endings count as a
/// single newline.
pub struct SourceReader {
    chars: Vec<char>,
    next: usize,
    current: Option<char>,
    pos: Pos,
    line: usize,
    column: usize,
}

impl SourceReader {
    pub fn new(src: &str) -> Self {
        Self {
            chars: src.chars().filter(|&c| c != '\r').collect(),
            next: 0,
            current: None,
            pos: Pos::new(1, 0),
            line: 1,
            column: 1,
        }
    }

    /// Advances to the next character and returns it.
    pub fn read_next(&mut self) -> Option<char> {
        self.pos = Pos::new(self.line, self.column);
        self.current = self.chars.get(self.next).copied();

        if let Some(c) = self.current {
            self.next += 1;
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
        self.current
    }

    pub fn current(&self) -> Option<char> {
        self.current
    }

    /// Position of the current character, or just past the input at the end.
    pub fn pos(&self) -> Pos {
        self.pos
    }

    /// Looks `offset` characters past the current one without consuming.
    /// `peek(0)` is the character the next `read_next` will return.
    pub fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.next + offset).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_and_columns() {
        let mut r = SourceReader::new("ab\r\nc");
        assert_eq!(r.read_next(), Some('a'));
        assert_eq!(r.pos(), Pos::new(1, 1));
        assert_eq!(r.peek(0), Some('b'));
        assert_eq!(r.peek(1), Some('\n'));
        r.read_next();
        assert_eq!(r.read_next(), Some('\n'));
        assert_eq!(r.pos(), Pos::new(1, 3));
        assert_eq!(r.read_next(), Some('c'));
        assert_eq!(r.pos(), Pos::new(2, 1));
        assert_eq!(r.read_next(), None);
        assert_eq!(r.current(), None);
        assert_eq!(r.pos(), Pos::new(2, 2));
    }
}
