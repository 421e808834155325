use super::token::LiteralKind;
use crate::{
    err::{Category, Handler},
    lex::{Pos, SourceReader, Token, TokenKind, TokenKind::*},
    symbol::Symbol,
};
use log::trace;
use std::collections::HashMap;

pub struct Lexer<'a> {
    reader: SourceReader,
    keywords: HashMap<Symbol, TokenKind>,
    handler: &'a Handler,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &str, handler: &'a Handler) -> Self {
        let mut reader = SourceReader::new(src);
        reader.read_next();
        Self {
            reader,
            keywords: keywords(),
            handler,
        }
    }

    /// Scans the next token. Keeps returning `Eof` once the input is exhausted.
    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_trivia();
            let c = match self.peek() {
                Some(c) => c,
                None => return Token::new(Eof, Symbol::empty(), self.reader.pos()),
            };

            let start = self.reader.pos();
            if let Some(t) = self.scan_token(c, start) {
                trace!("{} {:?} '{}'", t.pos, t.kind, t.symbol);
                return t;
            }
        }
    }

    /// Every token up to and including the first `Eof`.
    pub fn tokens(self) -> Tokens<'a> {
        Tokens {
            lexer: self,
            done: false,
        }
    }

    fn scan_token(&mut self, c: char, start: Pos) -> Option<Token> {
        self.advance();
        let kind = match c {
            '(' => OpenParen,
            ')' => CloseParen,
            '[' => OpenBracket,
            ']' => CloseBracket,
            ',' => Comma,
            '.' => Dot,
            '-' => Minus,
            '+' => Plus,
            ';' => SemiColon,
            '*' => Star,
            '/' => Slash,
            '%' => Percent,
            '=' => Eq,
            ':' => {
                if self.eat('=') {
                    Assign
                } else {
                    Colon
                }
            }
            '<' => {
                if self.eat('=') {
                    Le
                } else if self.eat('>') {
                    Ne
                } else {
                    Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Ge
                } else {
                    Gt
                }
            }
            '"' => return Some(self.string(start)),
            c if c.is_ascii_digit() => return Some(self.number(c, start)),
            c if c.is_ascii_alphabetic() => return Some(self.ident(c, start)),
            c => {
                self.report(start, &format!("Unknown token '{}'", c));
                return None;
            }
        };
        Some(Token::new(kind, Symbol::empty(), start))
    }

    fn skip_trivia(&mut self) {
        loop {
            while self.peek().map_or(false, char::is_whitespace) {
                self.advance();
            }

            match (self.peek(), self.peek_next()) {
                (Some('/'), Some('/')) => self.line_comment(),
                (Some('/'), Some('*')) => self.block_comment(),
                _ => return,
            }
        }
    }

    fn line_comment(&mut self) {
        while self.peek().map_or(false, |c| c != '\n') {
            self.advance();
        }
    }

    fn block_comment(&mut self) {
        let start = self.reader.pos();
        self.advance();
        self.advance();

        let mut depth = 1;
        while depth > 0 {
            match (self.peek(), self.peek_next()) {
                (None, _) => {
                    self.report(start, "EOF while scanning comment");
                    return;
                }
                (Some('/'), Some('*')) => {
                    depth += 1;
                    self.advance();
                }
                (Some('*'), Some('/')) => {
                    depth -= 1;
                    self.advance();
                }
                _ => {}
            }
            self.advance();
        }
    }

    fn string(&mut self, start: Pos) -> Token {
        let mut text = String::new();
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    break;
                }
                None | Some('\n') => {
                    self.report(self.reader.pos(), "EOL while scanning string literal");
                    break;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some(c) if c != '\n' => {
                            match unescape(c) {
                                Some(decoded) => text.push(decoded),
                                None => self.report(
                                    self.reader.pos(),
                                    &format!("Unrecognized escape sequence '\\{}'", c),
                                ),
                            }
                            self.advance();
                        }
                        _ => {}
                    }
                }
                Some(c) => {
                    text.push(c);
                    self.advance();
                }
            }
        }

        let kind = Literal {
            kind: LiteralKind::Str,
        };
        Token::new(kind, Symbol::intern(&text), start)
    }

    fn number(&mut self, first: char, start: Pos) -> Token {
        let mut text = first.to_string();
        self.digits(&mut text);

        let is_real =
            self.peek() == Some('.') && self.peek_next().map_or(false, |c| c.is_ascii_digit());
        let kind = if is_real {
            text.push('.');
            self.advance();
            self.digits(&mut text);
            self.exponent(&mut text);
            LiteralKind::Real
        } else {
            if text.parse::<i32>().is_err() {
                self.report(start, &format!("Integer literal '{}' is out of range", text));
            }
            LiteralKind::Int
        };

        Token::new(Literal { kind }, Symbol::intern(&text), start)
    }

    /// Appends `e[+-]digits` to `text` if present. A malformed exponent is
    /// reported and left out; the character after it is not consumed.
    fn exponent(&mut self, text: &mut String) {
        if self.peek() != Some('e') {
            return;
        }

        let mut exp = String::from("e");
        let mut last = self.reader.pos();
        self.advance();
        if let Some(sign) = self.peek().filter(|&c| c == '+' || c == '-') {
            exp.push(sign);
            last = self.reader.pos();
            self.advance();
        }

        if self.peek().map_or(false, |c| c.is_ascii_digit()) {
            self.digits(&mut exp);
            text.push_str(&exp);
        } else {
            self.report(last, "Expected digits while reading exponent");
        }
    }

    fn digits(&mut self, text: &mut String) {
        while let Some(c) = self.peek().filter(char::is_ascii_digit) {
            text.push(c);
            self.advance();
        }
    }

    fn ident(&mut self, first: char, start: Pos) -> Token {
        let mut text = first.to_string();
        while let Some(c) = self.peek().filter(|&c| is_ident_continue(c)) {
            text.push(c);
            self.advance();
        }

        let symbol = Symbol::intern(&text);
        match self.keywords.get(&symbol).copied() {
            Some(kind) => Token::new(kind, Symbol::empty(), start),
            None => Token::new(Ident, symbol, start),
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn report(&self, pos: Pos, msg: &str) {
        self.handler.report(Category::Lexical, pos, msg);
    }

    fn peek(&self) -> Option<char> {
        self.reader.current()
    }

    fn peek_next(&self) -> Option<char> {
        self.reader.peek(0)
    }

    fn advance(&mut self) {
        self.reader.read_next();
    }
}

pub struct Tokens<'a> {
    lexer: Lexer<'a>,
    done: bool,
}

impl Iterator for Tokens<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        if self.done {
            return None;
        }
        let t = self.lexer.next_token();
        self.done = t.kind == Eof;
        Some(t)
    }
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn unescape(c: char) -> Option<char> {
    match c {
        '"' => Some('"'),
        '\'' => Some('\''),
        'n' => Some('\n'),
        't' => Some('\t'),
        '\\' => Some('\\'),
        _ => None,
    }
}

fn keywords() -> HashMap<Symbol, TokenKind> {
    let mut m = HashMap::new();
    m.insert(Symbol::intern("program"), Program);
    m.insert(Symbol::intern("var"), Var);
    m.insert(Symbol::intern("procedure"), Procedure);
    m.insert(Symbol::intern("function"), Function);
    m.insert(Symbol::intern("array"), Array);
    m.insert(Symbol::intern("of"), Of);
    m.insert(Symbol::intern("begin"), Begin);
    m.insert(Symbol::intern("end"), End);
    m.insert(Symbol::intern("if"), If);
    m.insert(Symbol::intern("then"), Then);
    m.insert(Symbol::intern("else"), Else);
    m.insert(Symbol::intern("while"), While);
    m.insert(Symbol::intern("do"), Do);
    m.insert(Symbol::intern("return"), Return);
    m.insert(Symbol::intern("assert"), Assert);
    m.insert(Symbol::intern("not"), Not);
    m.insert(Symbol::intern("and"), And);
    m.insert(Symbol::intern("or"), Or);
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::Diagnostic;

    fn lex(src: &str) -> (Vec<Token>, Vec<Diagnostic>) {
        let handler = Handler::new();
        let tokens = Lexer::new(src, &handler).tokens().collect();
        (tokens, handler.into_diagnostics())
    }

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).0.into_iter().map(|t| t.kind).collect()
    }

    fn messages(diags: &[Diagnostic]) -> Vec<String> {
        diags.iter().map(|d| d.to_string()).collect()
    }

    const INT: TokenKind = Literal {
        kind: LiteralKind::Int,
    };
    const REAL: TokenKind = Literal {
        kind: LiteralKind::Real,
    };
    const STR: TokenKind = Literal {
        kind: LiteralKind::Str,
    };

    #[test]
    fn symbols_prefer_two_characters() {
        assert_eq!(
            kinds(":= : <= <> < >= > = ( ) [ ] + - * / % . ; ,"),
            vec![
                Assign, Colon, Le, Ne, Lt, Ge, Gt, Eq, OpenParen, CloseParen, OpenBracket,
                CloseBracket, Plus, Minus, Star, Slash, Percent, Dot, SemiColon, Comma, Eof
            ]
        );
    }

    #[test]
    fn keywords_and_identifiers() {
        let (tokens, diags) = lex("program Prog_1; begin x2 end.");
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, Program);
        assert_eq!(tokens[1].kind, Ident);
        assert_eq!(tokens[1].symbol, "Prog_1");
        assert_eq!(tokens[3].kind, Begin);
        assert_eq!(tokens[4].symbol, "x2");
        assert_eq!(tokens[5].kind, End);
    }

    #[test]
    fn positions_are_one_based() {
        let (tokens, _) = lex("var\n  x := 1");
        assert_eq!(tokens[0].pos, Pos::new(1, 1));
        assert_eq!(tokens[1].pos, Pos::new(2, 3));
        assert_eq!(tokens[2].pos, Pos::new(2, 5));
        assert_eq!(tokens[3].pos, Pos::new(2, 8));
    }

    #[test]
    fn eof_repeats() {
        let handler = Handler::new();
        let mut lexer = Lexer::new("x", &handler);
        assert_eq!(lexer.next_token().kind, Ident);
        assert_eq!(lexer.next_token().kind, Eof);
        assert_eq!(lexer.next_token().kind, Eof);
    }

    #[test]
    fn literal_text_survives_scanning() {
        for (src, kind, text) in &[
            ("42", INT, "42"),
            ("3.25", REAL, "3.25"),
            ("1.5e10", REAL, "1.5e10"),
            ("2.0e-3", REAL, "2.0e-3"),
            ("7.75e+2", REAL, "7.75e+2"),
            (r#""plain""#, STR, "plain"),
            (r#""q\"q""#, STR, "q\"q"),
            (r#""a\'b""#, STR, "a'b"),
            (r#""l\nl""#, STR, "l\nl"),
            (r#""t\tt""#, STR, "t\tt"),
            (r#""b\\b""#, STR, "b\\b"),
        ] {
            let (tokens, diags) = lex(src);
            assert!(diags.is_empty(), "{}", src);
            assert_eq!(tokens[0].kind, *kind, "{}", src);
            assert_eq!(tokens[0].symbol, *text, "{}", src);
            assert_eq!(tokens[1].kind, Eof);
        }
    }

    #[test]
    fn dot_after_integer_is_separate() {
        assert_eq!(kinds("a.size"), vec![Ident, Dot, Ident, Eof]);
        assert_eq!(kinds("1."), vec![INT, Dot, Eof]);
    }

    #[test]
    fn missing_exponent_digits() {
        let (tokens, diags) = lex("1.2e");
        assert_eq!(tokens[0].symbol, "1.2");
        assert_eq!(
            messages(&diags),
            vec!["(1,4) Lexical: Expected digits while reading exponent"]
        );

        let (tokens, diags) = lex("15.02e-");
        assert_eq!(tokens[0].symbol, "15.02");
        assert_eq!(diags[0].pos, Pos::new(1, 7));
    }

    #[test]
    fn bad_exponent_keeps_next_token() {
        assert_eq!(
            kinds("15.02e;2.4e-;"),
            vec![REAL, SemiColon, REAL, SemiColon, Eof]
        );
    }

    #[test]
    fn unknown_token_is_skipped() {
        let (tokens, diags) = lex("@var");
        assert_eq!(tokens[0].kind, Var);
        assert_eq!(messages(&diags), vec!["(1,1) Lexical: Unknown token '@'"]);
    }

    #[test]
    fn bad_escape_keeps_string() {
        let (tokens, diags) = lex(r#""a\qb""#);
        assert_eq!(tokens[0].symbol, "ab");
        assert_eq!(
            messages(&diags),
            vec![r"(1,4) Lexical: Unrecognized escape sequence '\q'"]
        );
    }

    #[test]
    fn unterminated_string() {
        let (tokens, diags) = lex("\"abc\nx");
        assert_eq!(tokens[0].kind, STR);
        assert_eq!(tokens[0].symbol, "abc");
        assert_eq!(tokens[1].kind, Ident);
        assert_eq!(
            messages(&diags),
            vec!["(1,5) Lexical: EOL while scanning string literal"]
        );
    }

    #[test]
    fn comments_nest_and_alternate_with_whitespace() {
        let src = "// line\n /* a /* b */ c */ // more\n x";
        let (tokens, diags) = lex(src);
        assert!(diags.is_empty());
        assert_eq!(tokens[0].kind, Ident);
        assert_eq!(tokens[0].pos, Pos::new(3, 2));
    }

    #[test]
    fn unterminated_comment_reports_opening() {
        let (tokens, diags) = lex("x /* /* */");
        assert_eq!(tokens[1].kind, Eof);
        assert_eq!(
            messages(&diags),
            vec!["(1,3) Lexical: EOF while scanning comment"]
        );
    }

    #[test]
    fn integer_out_of_range() {
        let (tokens, diags) = lex("2147483648");
        assert_eq!(tokens[0].kind, INT);
        assert_eq!(
            messages(&diags),
            vec!["(1,1) Lexical: Integer literal '2147483648' is out of range"]
        );
    }
}
