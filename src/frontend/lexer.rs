use std::iter::Peekable;
use std::str::Chars;

use super::ast::Pos;
use super::error::CompileError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Text(String),
    Ident(String),

    // Keywords
    Func,
    Print,
    Return,
    Continue,
    If,
    Then,
    Else,
    Fi,
    While,
    Do,
    Done,
    Var,
    Unary,
    Binary,

    Assign, // :=
    /// Any other ASCII punctuation character, including user operators.
    Char(char),

    // Special
    /// Stands in for a token the lexer rejected.
    Invalid,
    Eof,
}

impl Token {
    fn keyword(word: &str) -> Option<Token> {
        Some(match word {
            "FUNC" => Token::Func,
            "PRINT" => Token::Print,
            "RETURN" => Token::Return,
            "CONTINUE" => Token::Continue,
            "IF" => Token::If,
            "THEN" => Token::Then,
            "ELSE" => Token::Else,
            "FI" => Token::Fi,
            "WHILE" => Token::While,
            "DO" => Token::Do,
            "DONE" => Token::Done,
            "VAR" => Token::Var,
            "unary" => Token::Unary,
            "binary" => Token::Binary,
            _ => return None,
        })
    }

    pub fn is_char(&self, c: char) -> bool {
        matches!(self, Token::Char(x) if *x == c)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Text(s) => write!(f, "{s:?}"),
            Token::Ident(name) => write!(f, "{name}"),
            Token::Func => write!(f, "FUNC"),
            Token::Print => write!(f, "PRINT"),
            Token::Return => write!(f, "RETURN"),
            Token::Continue => write!(f, "CONTINUE"),
            Token::If => write!(f, "IF"),
            Token::Then => write!(f, "THEN"),
            Token::Else => write!(f, "ELSE"),
            Token::Fi => write!(f, "FI"),
            Token::While => write!(f, "WHILE"),
            Token::Do => write!(f, "DO"),
            Token::Done => write!(f, "DONE"),
            Token::Var => write!(f, "VAR"),
            Token::Unary => write!(f, "unary"),
            Token::Binary => write!(f, "binary"),
            Token::Assign => write!(f, ":="),
            Token::Char(c) => write!(f, "{c}"),
            Token::Invalid => write!(f, "<invalid>"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub pos: Pos,
}

/// Lazy tokenizer: each call to [`Lexer::next_token`] reads just enough
/// characters for one token.
pub struct Lexer<I: Iterator<Item = char>> {
    chars: Peekable<I>,
    line: u32,
    col: u32,
    escapes: bool,
    done: bool,
}

impl<'a> Lexer<Chars<'a>> {
    pub fn from_source(source: &'a str) -> Self {
        Lexer::new(source.chars())
    }
}

impl<I: Iterator<Item = char>> Lexer<I> {
    pub fn new(chars: I) -> Self {
        Self {
            chars: chars.peekable(),
            line: 1,
            col: 1,
            escapes: true,
            done: false,
        }
    }

    /// Toggle C-style escape processing in text literals (on by default).
    pub fn with_escapes(mut self, escapes: bool) -> Self {
        self.escapes = escapes;
        self
    }

    fn pos(&self) -> Pos {
        Pos::new(self.line, self.col)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(ch)
    }

    fn skip_line(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.bump();
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if matches!(ch, ' ' | '\t' | '\r' | '\n') {
                self.bump();
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Result<SpannedToken, CompileError> {
        loop {
            self.skip_whitespace();
            let start = self.pos();
            let Some(ch) = self.bump() else {
                return Ok(SpannedToken { token: Token::Eof, pos: start });
            };

            let token = match ch {
                c if c.is_ascii_alphabetic() => self.lex_word(c),
                c if c.is_ascii_digit() => self.lex_number(c, start)?,
                '"' => self.lex_text(start)?,
                ':' => {
                    if self.peek() == Some('=') {
                        self.bump();
                        Token::Assign
                    } else {
                        return Err(CompileError::lexer("expected '=' after ':'", start));
                    }
                }
                '/' if self.peek() == Some('/') => {
                    self.skip_line();
                    continue;
                }
                c if c.is_ascii_punctuation() => Token::Char(c),
                c => {
                    return Err(CompileError::lexer(
                        format!("unexpected character '{}'", c.escape_default()),
                        start,
                    ));
                }
            };
            return Ok(SpannedToken { token, pos: start });
        }
    }

    fn lex_word(&mut self, first: char) -> Token {
        let mut word = String::from(first);
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_alphanumeric() {
                break;
            }
            word.push(ch);
            self.bump();
        }
        Token::keyword(&word).unwrap_or(Token::Ident(word))
    }

    fn lex_number(&mut self, first: char, start: Pos) -> Result<Token, CompileError> {
        // Digits and dots are taken greedily, then the whole run is validated.
        let mut run = String::from(first);
        while let Some(ch) = self.peek() {
            if !(ch.is_ascii_digit() || ch == '.') {
                break;
            }
            run.push(ch);
            self.bump();
        }
        let dots = run.matches('.').count();
        if dots > 1 || run.ends_with('.') {
            return Err(CompileError::lexer(
                format!("malformed number literal '{run}'"),
                start,
            ));
        }
        run.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| CompileError::lexer(format!("malformed number literal '{run}'"), start))
    }

    fn lex_text(&mut self, start: Pos) -> Result<Token, CompileError> {
        let mut text = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(CompileError::lexer("unterminated text literal", start));
                }
                Some('"') => {
                    self.bump();
                    return Ok(Token::Text(text));
                }
                Some('\\') if self.escapes => {
                    let escape_pos = self.pos();
                    self.bump();
                    let resolved = match self.peek() {
                        Some('n') => '\n',
                        Some('t') => '\t',
                        Some('\\') => '\\',
                        Some('"') => '"',
                        None | Some('\n') => {
                            return Err(CompileError::lexer("unterminated text literal", start));
                        }
                        Some(other) => {
                            self.bump();
                            // Finish the literal so lexing resumes after it.
                            self.skip_text_rest();
                            return Err(CompileError::lexer(
                                format!("unknown escape sequence '\\{other}'"),
                                escape_pos,
                            ));
                        }
                    };
                    self.bump();
                    text.push(resolved);
                }
                Some(ch) => {
                    self.bump();
                    text.push(ch);
                }
            }
        }
    }

    fn skip_text_rest(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                return;
            }
            self.bump();
            if ch == '"' {
                return;
            }
            if ch == '\\' {
                self.bump();
            }
        }
    }
}

/// Yields tokens up to (not including) `Eof`. An error item does not end the
/// stream; the offending characters have already been consumed.
impl<I: Iterator<Item = char>> Iterator for Lexer<I> {
    type Item = Result<SpannedToken, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_token() {
            Ok(SpannedToken { token: Token::Eof, .. }) => {
                self.done = true;
                None
            }
            other => Some(other),
        }
    }
}
