//! 词法单元与词法单元序列。
//!
//! 解析器、求值器与序列化器之间交换的都是 `TokenList`：它以双端队列保存 token，
//! 求值时从队首逐个消费，必要时再把 token 推回队首。

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

/// token 的种类，集合是封闭的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Identifier,
    AtKeyword,
    Number,
    Percentage,
    Dimension,
    String,
    Url,
    Hash,
    Colon,
    Delimiter,
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Whitespace,
    Comment,
    Other,
    Eos,
}

/// 源码位置，用于错误信息。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

impl Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

/// 不可变的词法单元。比较时只看种类与文本，不看位置。
#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: u32,
    pub column: u32,
    pub source: Rc<str>,
}

impl Token {
    pub fn new<S: Into<String>>(
        kind: TokenKind,
        text: S,
        line: u32,
        column: u32,
        source: Rc<str>,
    ) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            column,
            source,
        }
    }

    /// 求值过程中生成的 token，没有源码位置。
    pub fn synthetic<S: Into<String>>(kind: TokenKind, text: S) -> Self {
        Self::new(kind, text, 0, 0, Rc::from(""))
    }

    /// 在给定 token 的位置上生成新 token，便于错误信息指回源码。
    pub fn derived<S: Into<String>>(kind: TokenKind, text: S, at: &Token) -> Self {
        Self::new(kind, text, at.line, at.column, at.source.clone())
    }

    pub fn space() -> Self {
        Self::synthetic(TokenKind::Whitespace, " ")
    }

    pub fn is(&self, text: &str) -> bool {
        self.text == text
    }

    pub fn is_whitespace(&self) -> bool {
        matches!(self.kind, TokenKind::Whitespace | TokenKind::Comment)
    }

    pub fn position(&self) -> SourcePosition {
        SourcePosition {
            source: self.source.to_string(),
            line: self.line,
            column: self.column,
        }
    }

    pub fn found_text(&self) -> String {
        if self.kind == TokenKind::Eos {
            "输入结尾".to_string()
        } else {
            self.text.clone()
        }
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.text == other.text
    }
}

impl Eq for Token {}

impl Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// 有序的 token 序列。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenList {
    tokens: VecDeque<Token>,
}

impl TokenList {
    pub fn new() -> Self {
        Self::default()
    }

    /// 去掉队首的空白与注释。
    pub fn ltrim(&mut self) {
        while self.tokens.front().is_some_and(Token::is_whitespace) {
            self.tokens.pop_front();
        }
    }

    /// 去掉队尾的空白与注释。
    pub fn rtrim(&mut self) {
        while self.tokens.back().is_some_and(Token::is_whitespace) {
            self.tokens.pop_back();
        }
    }

    pub fn trim(&mut self) {
        self.ltrim();
        self.rtrim();
    }

    pub fn trimmed(mut self) -> Self {
        self.trim();
        self
    }

    pub fn front_is(&self, kind: TokenKind) -> bool {
        self.tokens.front().is_some_and(|t| t.kind == kind)
    }

    pub fn contains_kind(&self, kind: TokenKind) -> bool {
        self.tokens.iter().any(|t| t.kind == kind)
    }

    /// 把另一序列追加到末尾。
    pub fn append_list(&mut self, other: TokenList) {
        self.tokens.extend(other.tokens);
    }

    /// 把另一序列整体插入到队首，保持其顺序。
    pub fn prepend_list(&mut self, other: TokenList) {
        for token in other.tokens.into_iter().rev() {
            self.tokens.push_front(token);
        }
    }

    /// 按顶层逗号拆分，括号内部的逗号不参与拆分。每一段都会去掉首尾空白。
    pub fn split_commas(&self) -> Vec<TokenList> {
        self.split_on(",")
    }

    /// 按顶层分隔符拆分，空段会被丢弃。
    pub fn split_on(&self, separator: &str) -> Vec<TokenList> {
        let mut parts = Vec::new();
        let mut current = TokenList::new();
        let mut depth = 0usize;
        for token in &self.tokens {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::BracketClose => depth = depth.saturating_sub(1),
                TokenKind::Other | TokenKind::Delimiter if depth == 0 && token.is(separator) => {
                    parts.push(std::mem::take(&mut current).trimmed());
                    continue;
                }
                _ => {}
            }
            current.push_back(token.clone());
        }
        parts.push(current.trimmed());
        parts.retain(|part| !part.is_empty());
        parts
    }

    /// 顶层（括号之外）是否出现给定文本的 token。
    pub fn contains_top_level(&self, text: &str) -> bool {
        let mut depth = 0usize;
        self.tokens.iter().any(|token| {
            match token.kind {
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::BracketClose => {
                    depth = depth.saturating_sub(1)
                }
                _ => return depth == 0 && token.is(text),
            }
            false
        })
    }

    /// 用 `, ` 把多个选择器分支拼回一个序列。
    pub fn join_commas(parts: Vec<TokenList>) -> TokenList {
        let mut joined = TokenList::new();
        for (idx, part) in parts.into_iter().enumerate() {
            if idx > 0 {
                joined.push_back(Token::synthetic(TokenKind::Other, ","));
                joined.push_back(Token::space());
            }
            joined.append_list(part);
        }
        joined
    }

    /// 查找子序列首次出现的位置，空白只按“是否存在”比较。
    pub fn find_sequence(&self, needle: &TokenList, from: usize) -> Option<usize> {
        if needle.is_empty() || needle.len() > self.len() {
            return None;
        }
        (from..=self.len() - needle.len()).find(|&start| {
            needle
                .iter()
                .enumerate()
                .all(|(offset, token)| tokens_match(&self.tokens[start + offset], token))
        })
    }

    /// 第一个非空白 token 的位置，没有则为空位置。
    pub fn position(&self) -> SourcePosition {
        self.tokens
            .iter()
            .find(|t| !t.is_whitespace())
            .or_else(|| self.tokens.front())
            .map(Token::position)
            .unwrap_or(SourcePosition {
                source: String::new(),
                line: 0,
                column: 0,
            })
    }

    /// 空白被折叠后的文本，用于比较选择器。
    pub fn normalized(&self) -> String {
        crate::utils::collapse_whitespace(&self.to_string())
    }
}

fn tokens_match(a: &Token, b: &Token) -> bool {
    if a.is_whitespace() && b.is_whitespace() {
        return true;
    }
    a == b
}

impl Deref for TokenList {
    type Target = VecDeque<Token>;

    fn deref(&self) -> &Self::Target {
        &self.tokens
    }
}

impl DerefMut for TokenList {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.tokens
    }
}

impl From<Vec<Token>> for TokenList {
    fn from(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into(),
        }
    }
}

impl FromIterator<Token> for TokenList {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TokenList {
    type Item = Token;
    type IntoIter = std::collections::vec_deque::IntoIter<Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.into_iter()
    }
}

impl<'a> IntoIterator for &'a TokenList {
    type Item = &'a Token;
    type IntoIter = std::collections::vec_deque::Iter<'a, Token>;

    fn into_iter(self) -> Self::IntoIter {
        self.tokens.iter()
    }
}

impl Display for TokenList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.tokens {
            f.write_str(&token.text)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(parts: &[(TokenKind, &str)]) -> TokenList {
        parts
            .iter()
            .map(|(kind, text)| Token::synthetic(*kind, *text))
            .collect()
    }

    #[test]
    fn trim_removes_whitespace_on_both_ends() {
        let mut tokens = list(&[
            (TokenKind::Whitespace, " "),
            (TokenKind::Identifier, "a"),
            (TokenKind::Comment, "/* x */"),
        ]);
        tokens.trim();
        assert_eq!(tokens.to_string(), "a");
    }

    #[test]
    fn split_commas_ignores_nested_commas() {
        let tokens = list(&[
            (TokenKind::Other, "."),
            (TokenKind::Identifier, "a"),
            (TokenKind::Other, ","),
            (TokenKind::Whitespace, " "),
            (TokenKind::Identifier, "b"),
            (TokenKind::ParenOpen, "("),
            (TokenKind::Number, "1"),
            (TokenKind::Other, ","),
            (TokenKind::Number, "2"),
            (TokenKind::ParenClose, ")"),
        ]);
        let parts = tokens.split_commas();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].to_string(), ".a");
        assert_eq!(parts[1].to_string(), "b(1,2)");
    }

    #[test]
    fn find_sequence_ignores_positions() {
        let haystack = list(&[
            (TokenKind::Other, "."),
            (TokenKind::Identifier, "a"),
            (TokenKind::Whitespace, " "),
            (TokenKind::Other, "."),
            (TokenKind::Identifier, "b"),
        ]);
        let needle = list(&[(TokenKind::Other, "."), (TokenKind::Identifier, "b")]);
        assert_eq!(haystack.find_sequence(&needle, 0), Some(3));
        assert_eq!(haystack.find_sequence(&needle, 4), None);
    }
}
