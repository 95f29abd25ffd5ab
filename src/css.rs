//! 求值产出的扁平 CSS 结构，交给序列化器输出。

use crate::token::TokenList;

#[derive(Debug, Clone, PartialEq)]
pub struct CssDeclaration {
    pub property: String,
    pub value: TokenList,
    pub important: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssRuleset {
    pub selector: TokenList,
    pub declarations: Vec<CssDeclaration>,
}

/// at 规则的块体：块内可以直接有声明（如 `@font-face`），也可以有子节点。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssBlock {
    pub declarations: Vec<CssDeclaration>,
    pub children: Vec<CssNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CssAtRule {
    /// 含 `@` 的关键字。
    pub name: String,
    pub params: TokenList,
    /// `None` 表示语句形式，如 `@charset "utf-8";`。
    pub block: Option<CssBlock>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CssNode {
    Rule(CssRuleset),
    AtRule(CssAtRule),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CssStylesheet {
    pub nodes: Vec<CssNode>,
}

impl CssStylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 深度优先访问所有规则集，包括 at 块内部的。
    pub fn for_each_ruleset_mut<F>(&mut self, mut visit: F)
    where
        F: FnMut(&mut CssRuleset),
    {
        fn walk<F: FnMut(&mut CssRuleset)>(nodes: &mut [CssNode], visit: &mut F) {
            for node in nodes {
                match node {
                    CssNode::Rule(rule) => visit(rule),
                    CssNode::AtRule(CssAtRule {
                        block: Some(block), ..
                    }) => walk(&mut block.children, visit),
                    CssNode::AtRule(_) => {}
                }
            }
        }
        walk(&mut self.nodes, &mut visit);
    }
}
