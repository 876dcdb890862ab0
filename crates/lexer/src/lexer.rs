//! Stateless-over-its-buffer lexer (spec section 4.2).

use crate::keyword::Keyword;
use crate::token::{Position, Token, TokenKind};

/// Two-character operators recognized before falling back to a
/// one-character operator. Order matters: longer matches are tried first.
const TWO_CHAR_OPERATORS: &[&str] =
    &["==", "!=", "<=", ">=", "&&", "||", "++", "--", "<<", ">>"];

const ONE_CHAR_OPERATORS: &[char] =
    &['+', '-', '*', '/', '%', '=', '<', '>', '!', '&', '|', '^', '~'];

pub struct Lexer {
    source: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
}

impl Lexer {
    pub fn init_from_source(text: &str) -> Self {
        Self { source: text.chars().collect(), position: 0, line: 1, column: 1 }
    }

    pub fn reset(&mut self) {
        self.position = 0;
        self.line = 1;
        self.column = 1;
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.source.len()
    }

    fn current(&self) -> char {
        self.source.get(self.position).copied().unwrap_or('\0')
    }

    fn peek_char(&self, offset: usize) -> char {
        self.source.get(self.position + offset).copied().unwrap_or('\0')
    }

    fn advance(&mut self) -> char {
        let c = self.current();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.position += 1;
        c
    }

    fn pos(&self) -> Position {
        Position { line: self.line, column: self.column }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while !self.is_at_end() && self.current().is_whitespace() {
                self.advance();
            }
            if self.current() == '/' && self.peek_char(1) == '/' {
                while !self.is_at_end() && self.current() != '\n' {
                    self.advance();
                }
                continue;
            }
            if self.current() == '/' && self.peek_char(1) == '*' {
                self.advance();
                self.advance();
                while !self.is_at_end() {
                    if self.current() == '*' && self.peek_char(1) == '/' {
                        self.advance();
                        self.advance();
                        break;
                    }
                    self.advance();
                }
                continue;
            }
            break;
        }
    }

    fn read_identifier(&mut self) -> Token {
        let start_pos = self.pos();
        let mut text = String::new();
        while !self.is_at_end() && (self.current().is_alphanumeric() || self.current() == '_') {
            text.push(self.advance());
        }
        let kind = match Keyword::lookup(&text) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Identifier(text),
        };
        Token::new(kind, start_pos)
    }

    fn read_number(&mut self) -> Token {
        let start_pos = self.pos();
        let mut text = String::new();
        let mut is_float = false;
        while self.current().is_ascii_digit() {
            text.push(self.advance());
        }
        if self.current() == '.' && self.peek_char(1).is_ascii_digit() {
            is_float = true;
            text.push(self.advance());
            while self.current().is_ascii_digit() {
                text.push(self.advance());
            }
        }
        if self.current() == 'e' || self.current() == 'E' {
            let save = (self.position, self.line, self.column);
            let mut exponent = String::new();
            exponent.push(self.advance());
            if self.current() == '+' || self.current() == '-' {
                exponent.push(self.advance());
            }
            if self.current().is_ascii_digit() {
                is_float = true;
                while self.current().is_ascii_digit() {
                    exponent.push(self.advance());
                }
                text.push_str(&exponent);
            } else {
                (self.position, self.line, self.column) = save;
            }
        }
        if is_float {
            Token::new(TokenKind::FloatLiteral(text.parse().unwrap_or(0.0)), start_pos)
        } else {
            Token::new(TokenKind::IntLiteral(text.parse().unwrap_or(0)), start_pos)
        }
    }

    fn read_string(&mut self, quote: char) -> Token {
        let start_pos = self.pos();
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            if self.is_at_end() {
                eprintln!(
                    "lex error: {}:{}: unterminated string literal",
                    start_pos.line, start_pos.column
                );
                return Token::new(TokenKind::Error, start_pos);
            }
            let c = self.current();
            if c == quote {
                self.advance();
                break;
            }
            if c == '\\' {
                self.advance();
                let escaped = self.advance();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    '0' => '\0',
                    '\\' => '\\',
                    '\'' => '\'',
                    '"' => '"',
                    other => other,
                });
                continue;
            }
            if c == '\n' {
                eprintln!(
                    "lex error: {}:{}: unterminated string literal",
                    start_pos.line, start_pos.column
                );
                return Token::new(TokenKind::Error, start_pos);
            }
            value.push(self.advance());
        }
        Token::new(TokenKind::StringLiteral(value), start_pos)
    }

    fn read_operator(&mut self) -> Token {
        let start_pos = self.pos();
        let two: String = [self.current(), self.peek_char(1)].iter().collect();
        if TWO_CHAR_OPERATORS.contains(&two.as_str()) {
            self.advance();
            self.advance();
            return Token::new(TokenKind::Operator(two), start_pos);
        }
        let c = self.advance();
        Token::new(TokenKind::Operator(c.to_string()), start_pos)
    }

    /// Produces the next token, advancing the lexer's position.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace_and_comments();
        let pos = self.pos();
        if self.is_at_end() {
            return Token::new(TokenKind::Eof, pos);
        }
        let c = self.current();
        if c.is_alphabetic() || c == '_' {
            return self.read_identifier();
        }
        if c.is_ascii_digit() {
            return self.read_number();
        }
        if c == '"' || c == '\'' {
            return self.read_string(c);
        }
        match c {
            '(' => {
                self.advance();
                Token::new(TokenKind::LParen, pos)
            }
            ')' => {
                self.advance();
                Token::new(TokenKind::RParen, pos)
            }
            '{' => {
                self.advance();
                Token::new(TokenKind::LBrace, pos)
            }
            '}' => {
                self.advance();
                Token::new(TokenKind::RBrace, pos)
            }
            '[' => {
                self.advance();
                Token::new(TokenKind::LBracket, pos)
            }
            ']' => {
                self.advance();
                Token::new(TokenKind::RBracket, pos)
            }
            ';' => {
                self.advance();
                Token::new(TokenKind::Semicolon, pos)
            }
            ',' => {
                self.advance();
                Token::new(TokenKind::Comma, pos)
            }
            '.' => {
                self.advance();
                Token::new(TokenKind::Dot, pos)
            }
            ':' => {
                self.advance();
                Token::new(TokenKind::Colon, pos)
            }
            c if ONE_CHAR_OPERATORS.contains(&c) => self.read_operator(),
            other => {
                eprintln!("lex error: {}:{}: unexpected character '{}'", pos.line, pos.column, other);
                self.advance();
                Token::new(TokenKind::Error, pos)
            }
        }
    }

    /// Looks ahead one token without consuming it, by saving and restoring
    /// position/line/column; safe to call repeatedly (spec section 4.2).
    pub fn peek_token(&mut self) -> Token {
        let save = (self.position, self.line, self.column);
        let token = self.next_token();
        (self.position, self.line, self.column) = save;
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::init_from_source(src);
        let mut out = Vec::new();
        loop {
            let t = lexer.next_token();
            let done = t.is_eof();
            out.push(t.kind);
            if done {
                break;
            }
        }
        out
    }

    #[test]
    fn skips_whitespace_and_both_comment_forms() {
        let toks = tokens("  // line comment\nint /* block \n comment */ x;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Keyword(Keyword::Int),
                TokenKind::Identifier("x".into()),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn recognizes_two_and_one_char_operators() {
        let toks = tokens("a == b && !c");
        assert_eq!(
            toks,
            vec![
                TokenKind::Identifier("a".into()),
                TokenKind::Operator("==".into()),
                TokenKind::Identifier("b".into()),
                TokenKind::Operator("&&".into()),
                TokenKind::Operator("!".into()),
                TokenKind::Identifier("c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reads_float_and_int_literals() {
        let toks = tokens("10 3.5 2e3");
        assert_eq!(
            toks,
            vec![
                TokenKind::IntLiteral(10),
                TokenKind::FloatLiteral(3.5),
                TokenKind::FloatLiteral(2000.0),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn reads_escaped_string_literals() {
        let toks = tokens(r#" "hi\n\"there\"" 'x' "#);
        assert_eq!(
            toks,
            vec![
                TokenKind::StringLiteral("hi\n\"there\"".into()),
                TokenKind::StringLiteral("x".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_yields_error_token() {
        let toks = tokens("\"never closed");
        assert_eq!(toks, vec![TokenKind::Error, TokenKind::Eof]);
    }

    #[test]
    fn peek_is_idempotent_and_repeatable() {
        let mut lexer = Lexer::init_from_source("foo bar");
        let p1 = lexer.peek_token();
        let p2 = lexer.peek_token();
        assert_eq!(p1, p2);
        let next = lexer.next_token();
        assert_eq!(next, p1);
        assert_eq!(lexer.next_token().kind, TokenKind::Identifier("bar".into()));
    }
}
