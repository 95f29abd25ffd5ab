//! 规则集选择器。解析时把选择器拆成四部分：普通选择器、mixin 参数列表、
//! `when` 守卫条件与 `:extend(...)` 目标。

use crate::extension::Extension;
use crate::token::{Token, TokenKind, TokenList};

/// mixin 形参。`name` 含 `@` 前缀。
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub default: Option<TokenList>,
}

#[derive(Debug, Clone, Default)]
pub struct LessSelector {
    /// 去掉参数、守卫与 extend 之后的选择器。
    pub tokens: TokenList,
    /// `Some` 表示这是一个带参数列表的 mixin 定义。
    pub parameters: Option<Vec<Parameter>>,
    /// 参数列表以 `...` 或 `@rest...` 结尾时为真。
    pub unlimited: bool,
    pub rest: Option<String>,
    /// 以逗号分隔的守卫条件，任意一个成立即可。
    pub conditions: Vec<TokenList>,
    /// `extension` 字段留空，求值时填入处理后的选择器。
    pub extensions: Vec<Extension>,
}

impl LessSelector {
    pub fn parse(tokens: TokenList) -> Self {
        let mut selector = LessSelector::default();
        let mut input = tokens;
        let mut out = TokenList::new();

        while let Some(token) = input.pop_front() {
            match token.kind {
                TokenKind::Colon
                    if input.front().is_some_and(|t| t.is("extend"))
                        && input.get(1).is_some_and(|t| t.kind == TokenKind::ParenOpen) =>
                {
                    input.drain(..2);
                    let group = take_group(&mut input);
                    selector.extensions.extend(parse_extend_targets(&group));
                }
                TokenKind::ParenOpen
                    if selector.parameters.is_none() && ends_with_mixin_name(&out) =>
                {
                    let group = take_group(&mut input);
                    match parse_parameters(&group) {
                        Some((parameters, unlimited, rest)) => {
                            selector.parameters = Some(parameters);
                            selector.unlimited = unlimited;
                            selector.rest = rest;
                        }
                        None => {
                            let close = Token::derived(TokenKind::ParenClose, ")", &token);
                            out.push_back(token);
                            out.append_list(group);
                            out.push_back(close);
                        }
                    }
                }
                TokenKind::Identifier
                    if token.is("when")
                        && out.back().is_some_and(Token::is_whitespace)
                        && out.iter().any(|t| !t.is_whitespace()) =>
                {
                    selector.conditions = input.split_commas();
                    input.clear();
                }
                _ => out.push_back(token),
            }
        }
        out.trim();
        selector.tokens = out;
        selector
    }

    pub fn needs_arguments(&self) -> bool {
        self.parameters.is_some()
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }
}

/// 取出直到匹配的右括号为止的内容，右括号被消费但不包含在结果中。
fn take_group(input: &mut TokenList) -> TokenList {
    let mut group = TokenList::new();
    let mut depth = 1usize;
    while let Some(token) = input.pop_front() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
        group.push_back(token);
    }
    group
}

/// 选择器末尾是 `.name` 或 `#name` 时，后面的括号是参数列表。
fn ends_with_mixin_name(out: &TokenList) -> bool {
    let len = out.len();
    match out.back() {
        Some(last) if last.kind == TokenKind::Hash => true,
        Some(last) if last.kind == TokenKind::Identifier => {
            len >= 2 && out[len - 2].kind == TokenKind::Other && out[len - 2].is(".")
        }
        _ => false,
    }
}

fn parse_extend_targets(group: &TokenList) -> Vec<Extension> {
    group
        .split_commas()
        .into_iter()
        .map(|mut target| {
            let all = target.back().is_some_and(|t| t.is("all"));
            if all {
                target.pop_back();
                target.rtrim();
            }
            Extension {
                target,
                extension: TokenList::new(),
                all,
            }
        })
        .collect()
}

/// 解析形参列表，失败（如含有字面量模式）时返回 `None`，括号按普通选择器处理。
fn parse_parameters(group: &TokenList) -> Option<(Vec<Parameter>, bool, Option<String>)> {
    let separator = if group.contains_top_level(";") { ";" } else { "," };
    let mut parameters = Vec::new();
    let mut unlimited = false;
    let mut rest = None;

    for part in group.split_on(separator) {
        if unlimited {
            return None;
        }
        if is_ellipsis(&part, 0) {
            unlimited = true;
            continue;
        }
        let mut part = part;
        let name = match part.pop_front() {
            Some(token) if token.kind == TokenKind::AtKeyword => token.text,
            _ => return None,
        };
        part.ltrim();
        if part.is_empty() {
            parameters.push(Parameter { name, default: None });
        } else if part.front_is(TokenKind::Colon) {
            part.pop_front();
            part.trim();
            if part.is_empty() {
                return None;
            }
            parameters.push(Parameter {
                name,
                default: Some(part),
            });
        } else if is_ellipsis(&part, 0) && part.len() == 3 {
            unlimited = true;
            rest = Some(name);
        } else {
            return None;
        }
    }
    Some((parameters, unlimited, rest))
}

fn is_ellipsis(tokens: &TokenList, from: usize) -> bool {
    (from..from + 3).all(|idx| tokens.get(idx).is_some_and(|t| t.is(".")))
}

/// 把子选择器与父选择器组合：含 `&` 的分支用父分支替换 `&`，否则用空格连接。
pub fn prefix_selector(child: &TokenList, parent: &TokenList) -> TokenList {
    let parents = parent.split_commas();
    let children = child.split_commas();
    if parents.is_empty() {
        return TokenList::join_commas(children);
    }
    let mut combined = Vec::new();
    for parent in &parents {
        for child in &children {
            if child.iter().any(|t| t.is("&")) {
                let mut branch = TokenList::new();
                for token in child {
                    if token.is("&") {
                        branch.append_list(parent.clone());
                    } else {
                        branch.push_back(token.clone());
                    }
                }
                combined.push(branch);
            } else {
                let mut branch = parent.clone();
                branch.push_back(Token::space());
                branch.append_list(child.clone());
                combined.push(branch);
            }
        }
    }
    TokenList::join_commas(combined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::Tokenizer;
    use pretty_assertions::assert_eq;

    fn tokens(input: &str) -> TokenList {
        let mut tokenizer = Tokenizer::new(input, "test").unwrap();
        let mut list = TokenList::new();
        while tokenizer.kind() != TokenKind::Eos {
            list.push_back(tokenizer.advance().unwrap());
        }
        list
    }

    #[test]
    fn parses_parameters_and_guards() {
        let selector = LessSelector::parse(tokens(".m(@a; @b: 2px, 3px) when (@a > 0), (@b)"));
        assert_eq!(selector.tokens.to_string(), ".m");
        let params = selector.parameters.clone().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "@a");
        assert_eq!(
            params[1].default.as_ref().map(|d| d.to_string()),
            Some("2px, 3px".to_string())
        );
        assert_eq!(selector.conditions.len(), 2);
        assert!(selector.needs_arguments());
    }

    #[test]
    fn rest_parameters() {
        let selector = LessSelector::parse(tokens(".m(@a, @rest...)"));
        assert!(selector.unlimited);
        assert_eq!(selector.rest.as_deref(), Some("@rest"));
        let anonymous = LessSelector::parse(tokens(".m(...)"));
        assert!(anonymous.unlimited);
        assert!(anonymous.rest.is_none());
    }

    #[test]
    fn pseudo_class_arguments_stay_in_selector() {
        let selector = LessSelector::parse(tokens("li:nth-child(2n+1), a:not(.b)"));
        assert!(!selector.needs_arguments());
        assert_eq!(selector.tokens.to_string(), "li:nth-child(2n+1), a:not(.b)");
    }

    #[test]
    fn literal_parameters_stay_in_selector() {
        let selector = LessSelector::parse(tokens(".m(dark; @a)"));
        assert!(!selector.needs_arguments());
        assert_eq!(selector.tokens.to_string(), ".m(dark; @a)");
    }

    #[test]
    fn extend_is_removed_from_selector() {
        let selector = LessSelector::parse(tokens(".b:extend(.a all, .c)"));
        assert_eq!(selector.tokens.to_string(), ".b");
        assert_eq!(selector.extensions.len(), 2);
        assert!(selector.extensions[0].all);
        assert_eq!(selector.extensions[0].target.to_string(), ".a");
        assert!(!selector.extensions[1].all);
    }

    #[test]
    fn prefix_replaces_ampersand() {
        let parent = tokens(".a, .b");
        assert_eq!(prefix_selector(&tokens("&:hover"), &parent).to_string(), ".a:hover, .b:hover");
        assert_eq!(prefix_selector(&tokens(".c"), &parent).to_string(), ".a .c, .b .c");
        assert_eq!(prefix_selector(&tokens(".c"), &TokenList::new()).to_string(), ".c");
    }
}
