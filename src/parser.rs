use crate::ast::{
    AtRule, LessStylesheet, RulesetId, RulesetKind, StylesheetStatement, UnprocessedStatement,
};
use crate::error::{LessError, LessResult};
use crate::mixin::Mixin;
use crate::selector::LessSelector;
use crate::token::{Token, TokenKind, TokenList};
use crate::tokenizer::Tokenizer;

/// 冒泡到外层的 at 块，外层选择器会被带进块内。
const BUBBLING_AT_RULES: &[&str] = &["@media", "@supports", "@document"];

/// 负责把 LESS 源码解析为文档模型的递归下降解析器。
///
/// 语句只按 `;`、`{`、`}` 切分，声明与 mixin 调用的区分留到求值阶段。
pub struct LessParser {
    source_name: String,
}

impl Default for LessParser {
    fn default() -> Self {
        Self::new()
    }
}

/// 一条语句在哪里结束。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementEnd {
    Semicolon,
    Block,
    BlockEnd,
    Eos,
}

impl LessParser {
    pub fn new() -> Self {
        Self::with_source_name("<input>")
    }

    /// 指定错误信息中的来源标识，通常是文件路径。
    pub fn with_source_name(source_name: &str) -> Self {
        Self {
            source_name: source_name.to_string(),
        }
    }

    pub fn parse(&self, input: &str) -> LessResult<LessStylesheet> {
        let mut state = ParseState {
            tokenizer: Tokenizer::new(input, &self.source_name)?,
            doc: LessStylesheet::new(),
        };
        state.parse_stylesheet()?;
        Ok(state.doc)
    }
}

struct ParseState<'a> {
    tokenizer: Tokenizer<'a>,
    doc: LessStylesheet,
}

impl ParseState<'_> {
    fn parse_stylesheet(&mut self) -> LessResult<()> {
        loop {
            self.skip_whitespace()?;
            match self.tokenizer.kind() {
                TokenKind::Eos => return Ok(()),
                TokenKind::BraceClose => {
                    return Err(LessError::parse(self.tokenizer.current(), "输入结尾"));
                }
                _ => self.parse_top_level()?,
            }
        }
    }

    fn parse_top_level(&mut self) -> LessResult<()> {
        let at = self.tokenizer.current().clone();
        let (tokens, end) = self.read_statement()?;
        if end == StatementEnd::Block {
            return self.parse_block_head(tokens, &at, None);
        }
        if tokens.is_empty() {
            return Ok(());
        }

        if let Some((key, value)) = split_variable(&tokens)? {
            self.doc.variables.define(&key, value);
            return Ok(());
        }
        if let Some((keyword, rule)) = split_at_rule(&tokens) {
            self.doc
                .statements
                .push(StylesheetStatement::AtRule(AtRule { keyword, rule }));
            return Ok(());
        }
        if Mixin::parse(&tokens).is_some() {
            self.doc
                .statements
                .push(StylesheetStatement::MixinCall(UnprocessedStatement::new(tokens)));
            return Ok(());
        }
        let found = tokens.front().cloned().unwrap_or(at);
        Err(LessError::parse(&found, "声明块 ('{...}')"))
    }

    /// `{` 已被消费：根据语句头创建规则集或 at 块，再解析块体。
    fn parse_block_head(
        &mut self,
        tokens: TokenList,
        at: &Token,
        parent: Option<RulesetId>,
    ) -> LessResult<()> {
        if tokens.is_empty() {
            return Err(LessError::parse(at, "选择器"));
        }
        if split_variable(&tokens)?.is_some() {
            return Err(LessError::parse(at, "变量的值"));
        }

        let id = match split_at_rule(&tokens) {
            Some((keyword, rule)) => {
                let bubbles = parent.is_some()
                    && BUBBLING_AT_RULES.contains(&keyword.text.to_ascii_lowercase().as_str());
                let kind = RulesetKind::AtBlock {
                    keyword,
                    rule,
                    bubbles,
                };
                self.doc.add_ruleset(LessSelector::default(), kind, parent)
            }
            None => self
                .doc
                .add_ruleset(LessSelector::parse(tokens), RulesetKind::Ruleset, parent),
        };
        if parent.is_none() {
            self.doc.statements.push(StylesheetStatement::Ruleset(id));
        }
        self.parse_block(id)
    }

    fn parse_block(&mut self, id: RulesetId) -> LessResult<()> {
        loop {
            self.skip_whitespace()?;
            match self.tokenizer.kind() {
                TokenKind::BraceClose => {
                    self.tokenizer.advance()?;
                    return Ok(());
                }
                TokenKind::Eos => {
                    return Err(LessError::parse(self.tokenizer.current(), "块结束 ('}')"));
                }
                _ => {}
            }

            let at = self.tokenizer.current().clone();
            let (tokens, end) = self.read_statement()?;
            if end == StatementEnd::Block {
                self.parse_block_head(tokens, &at, Some(id))?;
                continue;
            }
            if tokens.is_empty() {
                continue;
            }
            match split_variable(&tokens)? {
                Some((key, value)) => self.doc.ruleset_mut(id).variables.define(&key, value),
                None => self
                    .doc
                    .ruleset_mut(id)
                    .statements
                    .push(UnprocessedStatement::new(tokens)),
            }
        }
    }

    /// 读取一条语句，直到括号外的 `;`、`{`，或者 `}` 与输入结尾。
    /// `;` 与 `{` 被消费，`}` 留给块解析。括号未闭合时遇到 `}` 或输入结尾即报错。
    fn read_statement(&mut self) -> LessResult<(TokenList, StatementEnd)> {
        let mut tokens = TokenList::new();
        let mut depth = 0usize;
        let end = loop {
            match self.tokenizer.kind() {
                TokenKind::Eos | TokenKind::BraceClose if depth > 0 => {
                    return Err(LessError::parse(self.tokenizer.current(), "')'"));
                }
                TokenKind::Eos => break StatementEnd::Eos,
                TokenKind::BraceClose => break StatementEnd::BlockEnd,
                TokenKind::Delimiter if depth == 0 => {
                    self.tokenizer.advance()?;
                    break StatementEnd::Semicolon;
                }
                TokenKind::BraceOpen if depth == 0 => {
                    self.tokenizer.advance()?;
                    break StatementEnd::Block;
                }
                TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
                TokenKind::ParenClose | TokenKind::BracketClose => {
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            tokens.push_back(self.next_token()?);
        };
        tokens.trim();
        Ok((tokens, end))
    }

    /// 注释按单个空格处理。
    fn next_token(&mut self) -> LessResult<Token> {
        let token = self.tokenizer.advance()?;
        if token.kind == TokenKind::Comment {
            return Ok(Token::derived(TokenKind::Whitespace, " ", &token));
        }
        Ok(token)
    }

    fn skip_whitespace(&mut self) -> LessResult<()> {
        while matches!(
            self.tokenizer.kind(),
            TokenKind::Whitespace | TokenKind::Comment
        ) {
            self.tokenizer.advance()?;
        }
        Ok(())
    }
}

/// `@name: value` 形式的变量定义。值为空时报错。
fn split_variable(tokens: &TokenList) -> LessResult<Option<(String, TokenList)>> {
    let Some(first) = tokens.front() else {
        return Ok(None);
    };
    if first.kind != TokenKind::AtKeyword {
        return Ok(None);
    }
    let mut rest = tokens.clone();
    rest.pop_front();
    rest.ltrim();
    if !rest.front_is(TokenKind::Colon) {
        return Ok(None);
    }
    rest.pop_front();
    rest.trim();
    if rest.is_empty() {
        return Err(LessError::parse(first, "变量的值"));
    }
    Ok(Some((first.text.clone(), rest)))
}

fn split_at_rule(tokens: &TokenList) -> Option<(Token, TokenList)> {
    let mut rest = tokens.clone();
    let keyword = rest.pop_front()?;
    if keyword.kind != TokenKind::AtKeyword {
        return None;
    }
    rest.trim();
    Some((keyword, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> LessResult<LessStylesheet> {
        LessParser::new().parse(input)
    }

    #[test]
    fn variables_rulesets_and_statements() {
        let doc = parse("@a: 1px;\n.b { @c: 2; color: red; .d { x: y } }").unwrap();
        assert_eq!(doc.variables.get("@a").map(|v| v.to_string()), Some("1px".to_string()));

        let ids: Vec<_> = doc.top_level_rulesets().collect();
        assert_eq!(ids.len(), 1);
        let b = doc.ruleset(ids[0]);
        assert_eq!(b.selector.tokens.to_string(), ".b");
        assert!(b.variables.contains("@c"));
        assert_eq!(b.statements.len(), 1);
        assert_eq!(b.statements[0].tokens.to_string(), "color: red");
        assert_eq!(b.nested.len(), 1);
        assert_eq!(doc.ruleset(b.nested[0]).statements[0].tokens.to_string(), "x: y");
    }

    #[test]
    fn semicolons_inside_parentheses_do_not_end_statements() {
        let doc = parse(".a { .m(1; 2); }").unwrap();
        let id = doc.top_level_rulesets().next().unwrap();
        assert_eq!(doc.ruleset(id).statements[0].tokens.to_string(), ".m(1; 2)");
    }

    #[test]
    fn comments_become_spaces() {
        let doc = parse("/* head */ .a { color: /* x */ red; // tail\n }").unwrap();
        let id = doc.top_level_rulesets().next().unwrap();
        assert_eq!(doc.ruleset(id).statements[0].tokens.normalized(), "color: red");
    }

    #[test]
    fn at_rules_and_blocks() {
        let doc = parse("@charset \"utf-8\";\n@media print { .a { color: red; } }\n.b { @media screen { c: d } }").unwrap();
        assert!(matches!(
            &doc.statements[0],
            StylesheetStatement::AtRule(rule) if rule.keyword.text == "@charset"
        ));
        let ids: Vec<_> = doc.top_level_rulesets().collect();
        assert!(matches!(
            doc.ruleset(ids[0]).kind,
            RulesetKind::AtBlock { bubbles: false, .. }
        ));
        let nested = doc.ruleset(ids[1]).nested[0];
        assert!(matches!(
            doc.ruleset(nested).kind,
            RulesetKind::AtBlock { bubbles: true, .. }
        ));
    }

    #[test]
    fn top_level_mixin_call() {
        let doc = parse(".m() { } .m();").unwrap();
        assert!(matches!(doc.statements[1], StylesheetStatement::MixinCall(_)));
    }

    #[test]
    fn missing_block_is_an_error() {
        let err = parse("color: red;").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("声明块"));
    }

    #[test]
    fn unclosed_block_is_an_error() {
        let err = parse(".a { color: red;").unwrap_err();
        assert!(err.to_string().contains("块结束"));
    }

    #[test]
    fn unclosed_parenthesis_is_an_error() {
        let err = parse(".a { w: (1 + 2; }").unwrap_err();
        assert!(err.is_parse());
        assert!(err.to_string().contains("')'"));
        assert!(parse(".m(@a").unwrap_err().is_parse());
    }

    #[test]
    fn empty_variable_is_an_error() {
        let err = parse("@a: ;").unwrap_err();
        assert!(err.to_string().contains("变量的值"));
    }

    #[test]
    fn stray_closing_brace_is_an_error() {
        let err = parse(".a { } }").unwrap_err();
        assert!(err.to_string().contains("输入结尾"));
    }
}
