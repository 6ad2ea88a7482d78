//! The indentation-aware token scanner.
//!
//! Tokens are produced one at a time from a module cursor. At the beginning
//! of every line the scanner measures the indentation column (spaces count 1,
//! tabs round up to the next multiple of the configured tab size) and
//! compares it with the top of the indent stack, producing synthetic
//! `Indent`/`Dedent` tokens. Dedenting across more than one level rewinds the
//! cursor to the beginning of the line so the next call measures it again and
//! emits the next `Dedent`.
//!
//! Only a single token of look-ahead is supported. The whole scanner state is
//! a plain value, so the parser can swap it out while it recursively parses
//! an imported module and restore it afterwards.

use std::rc::Rc;

use crate::config::{Config, DEBUG_TOKENS};
use crate::error::{Error, ErrorKind, Result};
use crate::module::{Cursor, ModuleCode, Source};

pub mod token;

pub use token::Token;

use token::keyword_lookup;

/// Maximum depth of the indentation stack.
const MAX_INDENT: usize = 132;

pub struct Lexer {
    cursor: Cursor,
    current: Token,
    peeked: Option<Token>,
    at_bol: bool,
    indents: Vec<usize>,
    tabsize: usize,
    debug: u32,
}

impl Lexer {
    pub fn new(module: Rc<ModuleCode>, config: &Config) -> Self {
        Self {
            cursor: Cursor::new(module),
            current: Token::Unknown,
            peeked: None,
            at_bol: true,
            indents: vec![0],
            tabsize: config.tabsize.max(1),
            debug: config.debug,
        }
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    /// Position of the scanner, for diagnostics and AST node sources.
    pub fn source(&self) -> Source {
        self.cursor.source()
    }

    /// Read the next token into `current`. A previously peeked token is
    /// consumed first.
    pub fn advance(&mut self) -> Result<&Token> {
        self.current = match self.peeked.take() {
            Some(token) => token,
            None => self.read_next_token()?,
        };
        if self.debug & DEBUG_TOKENS != 0 {
            eprintln!("token : {} {}", self.current.name(), self.current.lexeme());
        }
        Ok(&self.current)
    }

    /// Look one token ahead without consuming it. Repeated peeks return the
    /// same token.
    pub fn peek(&mut self) -> Result<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.read_next_token()?);
        }
        Ok(self.peeked.as_ref().unwrap_or(&Token::Endmarker))
    }

    fn error(&self, kind: ErrorKind, detail: impl Into<String>) -> Error {
        Error::new(kind, detail).with_source(&self.cursor.source())
    }

    fn read_next_token(&mut self) -> Result<Token> {
        while self.at_bol {
            self.at_bol = false;

            // Measure the indentation column of this line.
            let mut col = 0usize;
            let mut ch = loop {
                match self.cursor.next_char() {
                    Some(b' ') => col += 1,
                    Some(b'\t') => col = (col / self.tabsize + 1) * self.tabsize,
                    other => break other,
                }
            };

            // Lines holding only a comment do not count.
            if ch == Some(b'#') {
                while !matches!(ch, Some(b'\n') | None) {
                    ch = self.cursor.next_char();
                }
            }
            if ch == Some(b'\r') {
                ch = self.cursor.next_char();
            }
            match ch {
                Some(b'\n') => {
                    // Blank line, does not change the indentation depth.
                    self.at_bol = true;
                    continue;
                }
                None => {
                    col = 0;
                    if col == self.current_indent() {
                        return Ok(Token::Endmarker);
                    }
                }
                Some(_) => self.cursor.push_back(),
            }

            if col == self.current_indent() {
                break;
            } else if col > self.current_indent() {
                if self.indents.len() >= MAX_INDENT {
                    return Err(self.error(ErrorKind::Syntax, "max indentation level reached"));
                }
                self.indents.push(col);
                return Ok(Token::Indent);
            } else {
                self.indents.pop();
                if self.indents.is_empty() {
                    return Err(self.error(
                        ErrorKind::Syntax,
                        "inconsistent use of TAB and space in indentation",
                    ));
                }
                if col != self.current_indent() {
                    // Not yet back at a recorded level: rewind so the next
                    // call measures this line again and dedents once more.
                    self.at_bol = true;
                    self.cursor.rewind_to_bol();
                }
                return Ok(Token::Dedent);
            }
        }

        // Skip inline whitespace.
        let mut ch = loop {
            match self.cursor.next_char() {
                Some(b' ') | Some(b'\t') => continue,
                other => break other,
            }
        };

        // Skip a trailing comment.
        if ch == Some(b'#') {
            while !matches!(ch, Some(b'\n') | None) {
                ch = self.cursor.next_char();
            }
        }

        if ch == Some(b'\r') {
            ch = self.cursor.next_char();
        }
        let ch = match ch {
            Some(b'\n') => {
                self.at_bol = true;
                return Ok(Token::Newline);
            }
            None => return Ok(Token::Endmarker),
            Some(c) => c,
        };

        if ch.is_ascii_digit() {
            self.cursor.push_back();
            return self.read_number();
        }
        if ch.is_ascii_alphabetic() {
            self.cursor.push_back();
            return Ok(self.read_identifier());
        }

        match ch {
            b'\'' => self.read_character(),
            b'"' => self.read_string(),
            b'(' => Ok(Token::LPar),
            b')' => Ok(Token::RPar),
            b'[' => Ok(Token::LSqb),
            b']' => Ok(Token::RSqb),
            b',' => Ok(Token::Comma),
            b'.' => Ok(Token::Dot),
            b':' => Ok(Token::Colon),
            b'*' => Ok(self.compound(b'=', Token::StarEqual, Token::Star)),
            b'%' => Ok(self.compound(b'=', Token::PercentEqual, Token::Percent)),
            b'+' => Ok(self.compound(b'=', Token::PlusEqual, Token::Plus)),
            b'-' => Ok(self.compound(b'=', Token::MinusEqual, Token::Minus)),
            b'/' => Ok(self.compound(b'=', Token::SlashEqual, Token::Slash)),
            b'!' => Ok(self.compound(b'=', Token::NotEqual, Token::Not)),
            b'=' => Ok(self.compound(b'=', Token::EqEqual, Token::Equal)),
            b'<' => {
                if self.cursor.peek_char() == Some(b'=') {
                    self.cursor.next_char();
                    Ok(Token::LessEqual)
                } else if self.cursor.peek_char() == Some(b'>') {
                    self.cursor.next_char();
                    Ok(Token::NotEqual)
                } else {
                    Ok(Token::Less)
                }
            }
            b'>' => Ok(self.compound(b'=', Token::GreaterEqual, Token::Greater)),
            _ => Ok(Token::Unknown),
        }
    }

    fn current_indent(&self) -> usize {
        self.indents.last().copied().unwrap_or(0)
    }

    /// Two-character operator if the next byte matches, else the one-character
    /// operator.
    fn compound(&mut self, follow: u8, matched: Token, single: Token) -> Token {
        if self.cursor.peek_char() == Some(follow) {
            self.cursor.next_char();
            matched
        } else {
            single
        }
    }

    /// Decimal number, optional fraction, optional e/E exponent with optional
    /// sign. Examples: `2`, `2.`, `0.2`, `1E+2`, `0.1e-2`.
    fn read_number(&mut self) -> Result<Token> {
        let mut text = String::new();
        let mut dots = 0;
        let mut exponent = false;

        loop {
            match self.cursor.next_char() {
                Some(c) if c.is_ascii_digit() || c == b'.' => {
                    if c == b'.' {
                        dots += 1;
                        if dots > 1 {
                            return Err(self.error(ErrorKind::Value, "multiple decimal points"));
                        }
                    }
                    text.push(c as char);
                }
                other => {
                    let mut ch = other;
                    if matches!(ch, Some(b'e') | Some(b'E')) {
                        exponent = true;
                        text.push(ch.unwrap_or(b'e') as char);
                        ch = self.cursor.next_char();
                        if matches!(ch, Some(b'+') | Some(b'-')) {
                            text.push(ch.unwrap_or(b'+') as char);
                            ch = self.cursor.next_char();
                        }
                        if !matches!(ch, Some(c) if c.is_ascii_digit()) {
                            return Err(self.error(ErrorKind::Syntax, "missing exponent"));
                        }
                        while let Some(c) = ch {
                            if !c.is_ascii_digit() {
                                break;
                            }
                            text.push(c as char);
                            ch = self.cursor.next_char();
                        }
                    }
                    if ch.is_some() {
                        self.cursor.push_back();
                    }
                    break;
                }
            }
        }

        if dots == 1 || exponent {
            Ok(Token::FloatLit(text))
        } else {
            Ok(Token::IntLit(text))
        }
    }

    /// A name: letters, digits and underscores, starting with a letter.
    /// Keywords are recognized with a binary search of the sorted table.
    fn read_identifier(&mut self) -> Token {
        let mut name = String::new();
        while let Some(c) = self.cursor.next_char() {
            if c.is_ascii_alphanumeric() || c == b'_' {
                name.push(c as char);
            } else {
                self.cursor.push_back();
                break;
            }
        }
        keyword_lookup(&name).unwrap_or(Token::Identifier(name))
    }

    /// A character constant: one byte or one escape sequence between single
    /// quotes.
    fn read_character(&mut self) -> Result<Token> {
        let value = match self.cursor.next_char() {
            Some(b'\\') => {
                let escape = self.cursor.next_char();
                match escape.and_then(decode_escape) {
                    Some(c) => c,
                    None => {
                        return Err(self.error(
                            ErrorKind::Syntax,
                            format!(
                                "unknown escape sequence: {}",
                                escape.map(|c| c as char).unwrap_or(' ')
                            ),
                        ));
                    }
                }
            }
            Some(b'\'') | None => {
                return Err(self.error(ErrorKind::Syntax, "empty character constant"));
            }
            Some(c) => c,
        };
        if self.cursor.next_char() != Some(b'\'') {
            return Err(self.error(
                ErrorKind::Syntax,
                "too many characters in character constant",
            ));
        }
        Ok(Token::CharLit(value))
    }

    /// A string literal. Recognized escape sequences are decoded; an unknown
    /// escape keeps the backslash. End of input ends the string silently.
    fn read_string(&mut self) -> Result<Token> {
        let mut bytes = Vec::new();
        loop {
            match self.cursor.next_char() {
                None | Some(b'"') => break,
                Some(b'\\') => match self.cursor.peek_char().and_then(decode_escape) {
                    Some(c) => {
                        self.cursor.next_char();
                        bytes.push(c);
                    }
                    None => bytes.push(b'\\'),
                },
                Some(c) => bytes.push(c),
            }
        }
        Ok(Token::StrLit(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

fn decode_escape(ch: u8) -> Option<u8> {
    match ch {
        b'0' => Some(0),
        b'a' => Some(7),
        b'b' => Some(8),
        b'f' => Some(12),
        b'n' => Some(b'\n'),
        b'r' => Some(b'\r'),
        b't' => Some(b'\t'),
        b'v' => Some(11),
        b'\\' => Some(b'\\'),
        b'\'' => Some(b'\''),
        b'"' => Some(b'"'),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    fn tokenize(source: &str) -> Vec<Token> {
        tokenize_with(source, &Config::default())
    }

    fn tokenize_with(source: &str, config: &Config) -> Vec<Token> {
        let module = ModuleCode::from_source("test", source);
        let mut lexer = Lexer::new(module, config);
        let mut tokens = Vec::new();
        loop {
            let token = lexer.advance().expect("scan should succeed").clone();
            let done = token == Token::Endmarker;
            tokens.push(token);
            if done {
                break;
            }
        }
        tokens
    }

    fn tokenize_err(source: &str) -> Error {
        let module = ModuleCode::from_source("test", source);
        let mut lexer = Lexer::new(module, &Config::default());
        loop {
            match lexer.advance() {
                Err(error) => return error,
                Ok(Token::Endmarker) => panic!("expected scan failure"),
                Ok(_) => continue,
            }
        }
    }

    #[test]
    fn scans_simple_program_with_indentation() {
        let tokens = tokenize(indoc! {"
            def fn(n)
                print n
            fn(4)
        "});
        let expected = vec![
            Token::DefFunc,
            Token::Identifier("fn".to_string()),
            Token::LPar,
            Token::Identifier("n".to_string()),
            Token::RPar,
            Token::Newline,
            Token::Indent,
            Token::Print,
            Token::Identifier("n".to_string()),
            Token::Newline,
            Token::Dedent,
            Token::Identifier("fn".to_string()),
            Token::LPar,
            Token::IntLit("4".to_string()),
            Token::RPar,
            Token::Newline,
            Token::Endmarker,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn emits_one_dedent_per_level_before_endmarker() {
        let tokens = tokenize(indoc! {"
            if 1
                if 2
                    pass
        "});
        let dedents = tokens.iter().filter(|t| **t == Token::Dedent).count();
        let indents = tokens.iter().filter(|t| **t == Token::Indent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
        assert_eq!(tokens.last(), Some(&Token::Endmarker));
    }

    #[test]
    fn blank_and_comment_lines_do_not_change_indentation() {
        let tokens = tokenize(indoc! {"
            if 1
                pass

                # only a comment
                pass
        "});
        let expected = vec![
            Token::If,
            Token::IntLit("1".to_string()),
            Token::Newline,
            Token::Indent,
            Token::Pass,
            Token::Newline,
            Token::Pass,
            Token::Newline,
            Token::Dedent,
            Token::Endmarker,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn tab_rounds_up_to_next_tab_stop() {
        let config = Config {
            tabsize: 8,
            debug: 0,
        };
        let tokens = tokenize_with("if 1\n\tpass\n", &config);
        assert!(tokens.contains(&Token::Indent));
    }

    #[test]
    fn scans_compound_operators() {
        let tokens = tokenize("a += 1 <= 2 <> 3 == 4 %= 5\n");
        assert!(tokens.contains(&Token::PlusEqual));
        assert!(tokens.contains(&Token::LessEqual));
        assert!(tokens.contains(&Token::NotEqual));
        assert!(tokens.contains(&Token::EqEqual));
        assert!(tokens.contains(&Token::PercentEqual));
    }

    #[test]
    fn diamond_is_a_synonym_for_not_equal() {
        assert_eq!(tokenize("1 <> 2\n")[1], Token::NotEqual);
        assert_eq!(tokenize("1 != 2\n")[1], Token::NotEqual);
    }

    #[test]
    fn scans_numbers_and_exponents() {
        let tokens = tokenize("2 2. 0.2 1E+2 1e2 1E-2 0.1e+2\n");
        assert_eq!(tokens[0], Token::IntLit("2".to_string()));
        assert_eq!(tokens[1], Token::FloatLit("2.".to_string()));
        assert_eq!(tokens[2], Token::FloatLit("0.2".to_string()));
        assert_eq!(tokens[3], Token::FloatLit("1E+2".to_string()));
        assert_eq!(tokens[4], Token::FloatLit("1e2".to_string()));
        assert_eq!(tokens[5], Token::FloatLit("1E-2".to_string()));
        assert_eq!(tokens[6], Token::FloatLit("0.1e+2".to_string()));
    }

    #[test]
    fn errors_on_missing_exponent_digits() {
        let error = tokenize_err("1E+\n");
        assert_eq!(error.kind(), ErrorKind::Syntax);
        assert!(error.to_string().contains("missing exponent"));
    }

    #[test]
    fn errors_on_multiple_decimal_points() {
        let error = tokenize_err("1.2.3\n");
        assert_eq!(error.kind(), ErrorKind::Value);
        assert!(error.to_string().contains("multiple decimal points"));
    }

    #[test]
    fn scans_character_constants_and_escapes() {
        assert_eq!(tokenize("'a'\n")[0], Token::CharLit(b'a'));
        assert_eq!(tokenize("'\\n'\n")[0], Token::CharLit(b'\n'));
        assert_eq!(tokenize("'\\\\'\n")[0], Token::CharLit(b'\\'));
    }

    #[test]
    fn errors_on_bad_character_constants() {
        assert_eq!(tokenize_err("''\n").kind(), ErrorKind::Syntax);
        assert_eq!(tokenize_err("'ab'\n").kind(), ErrorKind::Syntax);
        assert_eq!(tokenize_err("'\\q'\n").kind(), ErrorKind::Syntax);
    }

    #[test]
    fn scans_strings_with_escapes() {
        assert_eq!(
            tokenize("\"a\\tb\"\n")[0],
            Token::StrLit("a\tb".to_string())
        );
        // Unknown escapes keep the backslash.
        assert_eq!(
            tokenize("\"a\\qb\"\n")[0],
            Token::StrLit("a\\qb".to_string())
        );
    }

    #[test]
    fn unterminated_string_ends_silently_at_eof() {
        // Strings may span newlines; an unterminated one runs to the end of
        // the buffer, taking the loader's terminating newline with it.
        let tokens = tokenize("\"abc");
        assert_eq!(tokens[0], Token::StrLit("abc\n".to_string()));
    }

    #[test]
    fn peek_is_cached_and_single_level() {
        let module = ModuleCode::from_source("test", "a b\n");
        let mut lexer = Lexer::new(module, &Config::default());
        lexer.advance().expect("advance");
        assert_eq!(
            lexer.peek().expect("peek"),
            &Token::Identifier("b".to_string())
        );
        assert_eq!(
            lexer.peek().expect("peek"),
            &Token::Identifier("b".to_string())
        );
        assert_eq!(
            lexer.advance().expect("advance"),
            &Token::Identifier("b".to_string())
        );
    }

    #[test]
    fn indents_and_dedents_stay_balanced() {
        let tokens = tokenize(indoc! {"
            if 1
                if 2
                    pass
                pass
            pass
        "});
        let mut depth = 0i32;
        for token in &tokens {
            match token {
                Token::Indent => depth += 1,
                Token::Dedent => depth -= 1,
                _ => {}
            }
            assert!(depth >= 0);
        }
        assert_eq!(depth, 0);
    }

    #[test]
    fn comments_are_skipped_inline() {
        let tokens = tokenize("pass  # trailing comment\n");
        assert_eq!(
            tokens,
            vec![Token::Pass, Token::Newline, Token::Endmarker]
        );
    }
}
