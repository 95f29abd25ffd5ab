//! mixin 调用：`.name(args);`、`#ns > .name;` 等语句的解析、路径匹配与实参绑定。

use crate::ast::VariableMap;
use crate::selector::LessSelector;
use crate::token::{Token, TokenKind, TokenList};
use indexmap::IndexMap;

#[derive(Debug, Clone)]
pub struct Mixin {
    /// 调用语句中的名字部分，用于错误信息。
    pub name: TokenList,
    /// 路径片段，每段是 `#id` 或 `.class`，片段之间的空白与 `>` 已去掉。
    pub path: Vec<TokenList>,
    pub arguments: Vec<TokenList>,
    pub named: IndexMap<String, TokenList>,
    pub important: bool,
}

impl Mixin {
    /// 尝试把一条语句解析为 mixin 调用，不是调用时返回 `None`。
    pub fn parse(tokens: &TokenList) -> Option<Mixin> {
        let mut input = tokens.clone();
        input.trim();

        let mut name = TokenList::new();
        let mut path = Vec::new();
        loop {
            let Some(front) = input.front() else { break };
            match front.kind {
                TokenKind::Hash => {
                    let hash = input.pop_front()?;
                    name.push_back(hash.clone());
                    path.push(TokenList::from(vec![hash]));
                }
                TokenKind::Other
                    if front.is(".") && input.get(1).is_some_and(|t| t.kind == TokenKind::Identifier) =>
                {
                    let dot = input.pop_front()?;
                    let ident = input.pop_front()?;
                    name.push_back(dot.clone());
                    name.push_back(ident.clone());
                    path.push(TokenList::from(vec![dot, ident]));
                }
                TokenKind::Whitespace | TokenKind::Comment if !path.is_empty() => {
                    name.push_back(input.pop_front()?);
                }
                TokenKind::Other if front.is(">") && !path.is_empty() => {
                    name.push_back(input.pop_front()?);
                }
                _ => break,
            }
        }
        if path.is_empty() {
            return None;
        }
        name.trim();

        let mut mixin = Mixin {
            name,
            path,
            arguments: Vec::new(),
            named: IndexMap::new(),
            important: false,
        };

        if input.front_is(TokenKind::ParenOpen) {
            input.pop_front();
            let group = take_balanced(&mut input)?;
            mixin.parse_arguments(&group);
        }

        input.ltrim();
        if input.front().is_some_and(|t| t.is("!")) {
            input.pop_front();
            input.ltrim();
            if !input.front().is_some_and(|t| t.is("important")) {
                return None;
            }
            input.pop_front();
            mixin.important = true;
        }
        input.trim();
        input.is_empty().then_some(mixin)
    }

    fn parse_arguments(&mut self, group: &TokenList) {
        let separator = if group.contains_top_level(";") { ";" } else { "," };
        for mut part in group.split_on(separator) {
            let is_named = part.front_is(TokenKind::AtKeyword)
                && part
                    .iter()
                    .skip(1)
                    .find(|t| !t.is_whitespace())
                    .is_some_and(|t| t.kind == TokenKind::Colon);
            if is_named {
                let Some(key) = part.pop_front() else { continue };
                part.ltrim();
                part.pop_front();
                part.ltrim();
                self.named.insert(key.text, part);
            } else {
                self.arguments.push(part);
            }
        }
    }

    /// 名字的纯文本，如 `#ns > .m`。
    pub fn display_name(&self) -> String {
        self.name.normalized()
    }

    pub fn has_arguments(&self) -> bool {
        !self.arguments.is_empty() || !self.named.is_empty()
    }

    /// 用规则集选择器的某个分支匹配路径中从 `offset` 开始的片段，返回匹配后的新位置。
    pub fn walk(&self, selector: &TokenList, offset: usize) -> Option<usize> {
        selector.split_commas().iter().find_map(|branch| {
            let fragments = fragments(branch).filter(|f| !f.is_empty())?;
            let end = offset + fragments.len();
            (end <= self.path.len() && self.path[offset..end] == fragments[..]).then_some(end)
        })
    }

    /// 按位置、名称、默认值的顺序把实参绑定到形参，失败时返回 `None`。
    ///
    /// 实参应已在调用方作用域中求值。结果额外包含 `@arguments`，有剩余参数名时包含剩余参数。
    pub fn bind(&self, selector: &LessSelector) -> Option<VariableMap> {
        let Some(parameters) = &selector.parameters else {
            return (!self.has_arguments()).then(VariableMap::new);
        };

        let mut bound = VariableMap::new();
        let mut all = Vec::new();
        let mut position = 0;
        for parameter in parameters {
            let value = if let Some(value) = self.named.get(&parameter.name) {
                value.clone()
            } else if position < self.arguments.len() {
                position += 1;
                self.arguments[position - 1].clone()
            } else {
                parameter.default.clone()?
            };
            all.push(value.clone());
            bound.insert(&parameter.name, value);
        }

        let remaining = &self.arguments[position..];
        if !remaining.is_empty() && !selector.unlimited {
            return None;
        }
        if let Some(rest) = &selector.rest {
            bound.insert(rest, join_spaced(remaining));
        }
        all.extend(remaining.iter().cloned());
        bound.insert("@arguments", join_spaced(&all));
        Some(bound)
    }
}

/// 把选择器分支拆成路径片段。含有其他成分（伪类、属性等）的分支不能作为 mixin 路径。
fn fragments(branch: &TokenList) -> Option<Vec<TokenList>> {
    let mut result = Vec::new();
    let mut iter = branch.iter().peekable();
    while let Some(token) = iter.next() {
        match token.kind {
            TokenKind::Hash => result.push(TokenList::from(vec![token.clone()])),
            TokenKind::Other if token.is(".") => {
                let ident = iter.next_if(|t| t.kind == TokenKind::Identifier)?;
                result.push(TokenList::from(vec![token.clone(), ident.clone()]));
            }
            TokenKind::Whitespace | TokenKind::Comment => {}
            TokenKind::Other if token.is(">") => {}
            _ => return None,
        }
    }
    Some(result)
}

fn take_balanced(input: &mut TokenList) -> Option<TokenList> {
    let mut group = TokenList::new();
    let mut depth = 1usize;
    while let Some(token) = input.pop_front() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose => {
                depth -= 1;
                if depth == 0 {
                    return Some(group);
                }
            }
            _ => {}
        }
        group.push_back(token);
    }
    None
}

fn join_spaced(values: &[TokenList]) -> TokenList {
    let mut joined = TokenList::new();
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            joined.push_back(Token::space());
        }
        joined.append_list(value.clone());
    }
    joined
}
