use crate::error::{LessError, LessResult};
use crate::token::{Token, TokenKind};
use std::rc::Rc;

/// 拉取式的词法分析器：`current()` 返回当前 token，`advance()` 前进到下一个。
///
/// 空白与注释作为独立的 token 输出，是否保留由解析器决定。
pub struct Tokenizer<'a> {
    cursor: Cursor<'a>,
    source: Rc<str>,
    current: Token,
    last_kind: Option<TokenKind>,
    last_text: String,
}

impl<'a> Tokenizer<'a> {
    /// 创建分析器并读取第一个 token。
    pub fn new(input: &'a str, source_name: &str) -> LessResult<Self> {
        let source: Rc<str> = Rc::from(source_name);
        let mut tokenizer = Self {
            cursor: Cursor::new(input),
            current: Token::new(TokenKind::Eos, "", 1, 1, source.clone()),
            source,
            last_kind: None,
            last_text: String::new(),
        };
        tokenizer.current = tokenizer.read_token()?;
        Ok(tokenizer)
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn kind(&self) -> TokenKind {
        self.current.kind
    }

    /// 前进一个 token，返回刚刚离开的 token。到达结尾后一直停留在 `Eos`。
    pub fn advance(&mut self) -> LessResult<Token> {
        if self.current.kind == TokenKind::Eos {
            return Ok(self.current.clone());
        }
        // 读取下一个 token 之前记下当前 token，带符号数字的判断依赖它
        if self.current.kind != TokenKind::Comment {
            self.last_kind = Some(self.current.kind);
            self.last_text.clone_from(&self.current.text);
        }
        let next = self.read_token()?;
        Ok(std::mem::replace(&mut self.current, next))
    }

    fn token(&self, kind: TokenKind, text: String, line: u32, column: u32) -> Token {
        Token::new(kind, text, line, column, self.source.clone())
    }

    fn error(&self, text: String, line: u32, column: u32, expected: &str) -> LessError {
        let token = self.token(TokenKind::Other, text, line, column);
        LessError::parse(&token, expected)
    }

    fn read_token(&mut self) -> LessResult<Token> {
        let line = self.cursor.line;
        let column = self.cursor.column;
        let Some(ch) = self.cursor.peek_char() else {
            return Ok(self.token(TokenKind::Eos, String::new(), line, column));
        };

        let (kind, text) = match ch {
            _ if ch.is_whitespace() => (TokenKind::Whitespace, self.cursor.read_whitespace()),
            '/' if self.cursor.peek_nth(1) == Some('*') => {
                let text = self
                    .cursor
                    .read_block_comment()
                    .map_err(|text| self.error(text, line, column, "注释结束标记 '*/'"))?;
                (TokenKind::Comment, text)
            }
            '/' if self.cursor.peek_nth(1) == Some('/') => {
                (TokenKind::Comment, self.cursor.read_line_comment())
            }
            '"' | '\'' => {
                let text = self
                    .cursor
                    .read_string()
                    .map_err(|text| self.error(text, line, column, "字符串结束引号"))?;
                (TokenKind::String, text)
            }
            '@' => self.read_at(),
            '#' if self.cursor.peek_nth(1).is_some_and(is_name_char) => {
                self.cursor.advance_char();
                let mut text = String::from("#");
                text.push_str(&self.cursor.read_identifier());
                (TokenKind::Hash, text)
            }
            _ if ch.is_ascii_digit() => self.read_number(),
            '.' if self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.read_number()
            }
            '-' if self.starts_signed_number() => self.read_number(),
            '-' if self.cursor.peek_nth(1).is_some_and(|c| is_name_start(c) || c == '-')
                || (self.cursor.peek_nth(1) == Some('@') && self.cursor.peek_nth(2) == Some('{')) =>
            {
                (TokenKind::Identifier, self.cursor.read_identifier())
            }
            _ if is_name_start(ch) => {
                let ident = self.cursor.read_identifier();
                if ident.eq_ignore_ascii_case("url") && self.cursor.peek_char() == Some('(') {
                    let text = self
                        .cursor
                        .read_url(ident)
                        .map_err(|text| self.error(text, line, column, "url 结束括号 ')'"))?;
                    (TokenKind::Url, text)
                } else {
                    (TokenKind::Identifier, ident)
                }
            }
            _ => {
                self.cursor.advance_char();
                let kind = match ch {
                    ':' => TokenKind::Colon,
                    ';' => TokenKind::Delimiter,
                    '(' => TokenKind::ParenOpen,
                    ')' => TokenKind::ParenClose,
                    '{' => TokenKind::BraceOpen,
                    '}' => TokenKind::BraceClose,
                    '[' => TokenKind::BracketOpen,
                    ']' => TokenKind::BracketClose,
                    _ => TokenKind::Other,
                };
                (kind, ch.to_string())
            }
        };
        Ok(self.token(kind, text, line, column))
    }

    fn read_at(&mut self) -> (TokenKind, String) {
        match self.cursor.peek_nth(1) {
            Some('{') => (TokenKind::Identifier, self.cursor.read_identifier()),
            Some(next) if is_name_start(next) || next == '-' => {
                self.cursor.advance_char();
                let mut text = String::from("@");
                text.push_str(&self.cursor.read_identifier());
                (TokenKind::AtKeyword, text)
            }
            _ => {
                self.cursor.advance_char();
                (TokenKind::Other, "@".to_string())
            }
        }
    }

    /// `-` 后紧跟数字、且处于一个新项的开头时，视为带符号的数字。
    fn starts_signed_number(&self) -> bool {
        let digit_follows = match self.cursor.peek_nth(1) {
            Some(c) if c.is_ascii_digit() => true,
            Some('.') => self.cursor.peek_nth(2).is_some_and(|c| c.is_ascii_digit()),
            _ => false,
        };
        if !digit_follows {
            return false;
        }
        match self.last_kind {
            None => true,
            Some(
                TokenKind::Whitespace
                | TokenKind::ParenOpen
                | TokenKind::Colon
                | TokenKind::Delimiter
                | TokenKind::BraceOpen
                | TokenKind::BracketOpen,
            ) => true,
            Some(TokenKind::Other) => matches!(
                self.last_text.as_str(),
                "," | "*" | "/" | "+" | "=" | "<" | ">"
            ),
            _ => false,
        }
    }

    fn read_number(&mut self) -> (TokenKind, String) {
        let mut text = String::new();
        if self.cursor.peek_char() == Some('-') {
            text.push('-');
            self.cursor.advance_char();
        }
        let mut seen_dot = false;
        while let Some(ch) = self.cursor.peek_char() {
            if ch.is_ascii_digit() {
                text.push(ch);
                self.cursor.advance_char();
            } else if ch == '.'
                && !seen_dot
                && self.cursor.peek_nth(1).is_some_and(|c| c.is_ascii_digit())
            {
                seen_dot = true;
                text.push(ch);
                self.cursor.advance_char();
            } else {
                break;
            }
        }
        match self.cursor.peek_char() {
            Some('%') => {
                self.cursor.advance_char();
                text.push('%');
                (TokenKind::Percentage, text)
            }
            Some(ch) if ch.is_ascii_alphabetic() => {
                while let Some(ch) = self.cursor.peek_char() {
                    if !ch.is_ascii_alphabetic() {
                        break;
                    }
                    text.push(ch);
                    self.cursor.advance_char();
                }
                (TokenKind::Dimension, text)
            }
            _ => (TokenKind::Number, text),
        }
    }
}

fn is_name_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_' || ch == '\\' || !ch.is_ascii()
}

fn is_name_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '-' || ch == '_' || ch == '\\' || !ch.is_ascii()
}

/// 带位置指针的输入游标，额外记录行列号。
#[derive(Clone)]
struct Cursor<'a> {
    source: &'a str,
    position: usize,
    line: u32,
    column: u32,
}

impl<'a> Cursor<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            position: 0,
            line: 1,
            column: 1,
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.source[self.position..].chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.source[self.position..].chars().nth(n)
    }

    fn advance_char(&mut self) -> Option<char> {
        let ch = self.peek_char()?;
        self.position += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn starts_with(&self, prefix: &str) -> bool {
        self.source[self.position..].starts_with(prefix)
    }

    fn read_whitespace(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if !ch.is_whitespace() {
                break;
            }
            text.push(ch);
            self.advance_char();
        }
        text
    }

    fn read_block_comment(&mut self) -> Result<String, String> {
        let mut text = String::new();
        self.advance_char();
        self.advance_char();
        text.push_str("/*");
        loop {
            if self.starts_with("*/") {
                self.advance_char();
                self.advance_char();
                text.push_str("*/");
                return Ok(text);
            }
            match self.advance_char() {
                Some(ch) => text.push(ch),
                None => return Err(text),
            }
        }
    }

    fn read_line_comment(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek_char() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance_char();
        }
        text
    }

    fn read_string(&mut self) -> Result<String, String> {
        let mut text = String::new();
        let Some(quote) = self.advance_char() else {
            return Err(text);
        };
        text.push(quote);
        while let Some(ch) = self.advance_char() {
            text.push(ch);
            if ch == quote {
                return Ok(text);
            }
            if ch == '\n' {
                return Err(text);
            }
            if ch == '\\' {
                if let Some(escaped) = self.advance_char() {
                    text.push(escaped);
                }
            }
        }
        Err(text)
    }

    fn read_url(&mut self, ident: String) -> Result<String, String> {
        let mut text = ident;
        let mut depth = 0usize;
        while let Some(ch) = self.peek_char() {
            if ch == '"' || ch == '\'' {
                let quoted = self.read_string().map_err(|partial| text.clone() + &partial)?;
                text.push_str(&quoted);
                continue;
            }
            self.advance_char();
            text.push(ch);
            match ch {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                _ => {}
            }
        }
        Err(text)
    }

    /// 读取标识符，允许其中嵌入 `@{name}` 插值片段。
    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(ch) = self.peek_char() {
            if ch == '@' && self.peek_nth(1) == Some('{') {
                while let Some(inner) = self.advance_char() {
                    ident.push(inner);
                    if inner == '}' {
                        break;
                    }
                }
            } else if ch == '\\' {
                ident.push(ch);
                self.advance_char();
                if let Some(escaped) = self.advance_char() {
                    ident.push(escaped);
                }
            } else if is_name_char(ch) {
                ident.push(ch);
                self.advance_char();
            } else {
                break;
            }
        }
        ident
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<(TokenKind, String)> {
        let mut tokenizer = Tokenizer::new(input, "test").unwrap();
        let mut out = Vec::new();
        while tokenizer.kind() != TokenKind::Eos {
            let token = tokenizer.advance().unwrap();
            if token.kind != TokenKind::Whitespace {
                out.push((token.kind, token.text));
            }
        }
        out
    }

    #[test]
    fn classifies_numbers_and_units() {
        let tokens = kinds("10px 50% 1.5 .5em");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Dimension, "10px".to_string()),
                (TokenKind::Percentage, "50%".to_string()),
                (TokenKind::Number, "1.5".to_string()),
                (TokenKind::Dimension, ".5em".to_string()),
            ]
        );
    }

    #[test]
    fn minus_sign_depends_on_context() {
        let tokens = kinds("(@gap * -2) 10px-5px -webkit-box");
        let texts: Vec<&str> = tokens.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(
            texts,
            vec!["(", "@gap", "*", "-2", ")", "10px", "-", "5px", "-webkit-box"]
        );
        assert_eq!(tokens[3].0, TokenKind::Number);
    }

    #[test]
    fn negative_values_in_a_space_separated_list() {
        let tokens = kinds("0 -1px 2px -.5em");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Number, "0".to_string()),
                (TokenKind::Dimension, "-1px".to_string()),
                (TokenKind::Dimension, "2px".to_string()),
                (TokenKind::Dimension, "-.5em".to_string()),
            ]
        );
    }

    #[test]
    fn negated_variable_is_split() {
        let tokens = kinds("-@gap");
        assert_eq!(tokens[0], (TokenKind::Other, "-".to_string()));
        assert_eq!(tokens[1], (TokenKind::AtKeyword, "@gap".to_string()));
    }

    #[test]
    fn interpolation_stays_inside_identifiers() {
        let tokens = kinds(".btn-@{size} @{prop}-color");
        assert_eq!(tokens[1], (TokenKind::Identifier, "btn-@{size}".to_string()));
        assert_eq!(tokens[2], (TokenKind::Identifier, "@{prop}-color".to_string()));
    }

    #[test]
    fn urls_strings_and_hashes() {
        let tokens = kinds("url('a b.png') \"x\\\"y\" #fff #main @@name");
        assert_eq!(tokens[0], (TokenKind::Url, "url('a b.png')".to_string()));
        assert_eq!(tokens[1], (TokenKind::String, "\"x\\\"y\"".to_string()));
        assert_eq!(tokens[2], (TokenKind::Hash, "#fff".to_string()));
        assert_eq!(tokens[3], (TokenKind::Hash, "#main".to_string()));
        assert_eq!(tokens[4], (TokenKind::Other, "@".to_string()));
        assert_eq!(tokens[5], (TokenKind::AtKeyword, "@name".to_string()));
    }

    #[test]
    fn tracks_line_and_column() {
        let mut tokenizer = Tokenizer::new("a\n  b", "pos").unwrap();
        tokenizer.advance().unwrap();
        tokenizer.advance().unwrap();
        let token = tokenizer.current();
        assert_eq!((token.line, token.column), (2, 3));
    }

    #[test]
    fn unterminated_string_is_a_parse_error() {
        let mut tokenizer = Tokenizer::new("a \"open", "err").unwrap();
        tokenizer.advance().unwrap();
        let err = tokenizer.advance().unwrap_err();
        assert!(err.is_parse());
    }
}
