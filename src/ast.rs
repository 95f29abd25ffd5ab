//! LESS 文档模型。
//!
//! 所有规则集保存在样式表的一个数组里，用 `RulesetId` 互相引用：子规则集记录父节点，
//! 父节点按顺序记录子节点。文档在解析完成后只读，求值过程中不会被修改。

use crate::selector::LessSelector;
use crate::token::{Token, TokenList};
use indexmap::IndexMap;

/// 规则集在样式表中的句柄。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RulesetId(usize);

/// 变量名（含 `@`）到未求值 token 序列的有序映射。
#[derive(Debug, Clone, Default)]
pub struct VariableMap {
    entries: IndexMap<String, TokenList>,
}

impl VariableMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// 定义变量。同一作用域重复定义时给出警告，后定义的生效。
    pub fn define(&mut self, key: &str, value: TokenList) {
        if self.entries.insert(key.to_string(), value).is_some() {
            log::warn!("变量 {key} 在同一作用域中重复定义，使用最后一次定义");
        }
    }

    pub fn insert(&mut self, key: &str, value: TokenList) {
        self.entries.insert(key.to_string(), value);
    }

    pub fn get(&self, key: &str) -> Option<&TokenList> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TokenList)> {
        self.entries.iter()
    }

    /// 合并另一组变量，已有的同名变量被覆盖。
    pub fn merge(&mut self, other: VariableMap) {
        self.entries.extend(other.entries);
    }
}

/// 规则集内部尚未分类的语句：声明、mixin 调用或 `:extend`，求值时再判断。
#[derive(Debug, Clone)]
pub struct UnprocessedStatement {
    pub tokens: TokenList,
}

impl UnprocessedStatement {
    pub fn new(tokens: TokenList) -> Self {
        Self { tokens }
    }
}

#[derive(Debug, Clone)]
pub enum RulesetKind {
    Ruleset,
    /// at 块，如 `@media`。嵌套在规则集中且 `bubbles` 为真时，外层选择器会被带进块内。
    AtBlock {
        keyword: Token,
        rule: TokenList,
        bubbles: bool,
    },
}

#[derive(Debug, Clone)]
pub struct LessRuleset {
    pub selector: LessSelector,
    pub kind: RulesetKind,
    pub parent: Option<RulesetId>,
    pub nested: Vec<RulesetId>,
    pub statements: Vec<UnprocessedStatement>,
    pub variables: VariableMap,
}

impl LessRuleset {
    pub fn is_mixin(&self) -> bool {
        self.selector.needs_arguments()
    }
}

/// 顶层的 at 语句，如 `@charset "utf-8";`。
#[derive(Debug, Clone)]
pub struct AtRule {
    pub keyword: Token,
    pub rule: TokenList,
}

#[derive(Debug, Clone)]
pub enum StylesheetStatement {
    /// 规则集或 at 块（at 块的规则集没有选择器）。
    Ruleset(RulesetId),
    AtRule(AtRule),
    MixinCall(UnprocessedStatement),
}

#[derive(Debug, Clone, Default)]
pub struct LessStylesheet {
    rulesets: Vec<LessRuleset>,
    pub statements: Vec<StylesheetStatement>,
    pub variables: VariableMap,
}

impl LessStylesheet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配一个规则集。有父节点时挂到父节点的子列表末尾，否则只分配不挂载。
    pub fn add_ruleset(
        &mut self,
        selector: LessSelector,
        kind: RulesetKind,
        parent: Option<RulesetId>,
    ) -> RulesetId {
        let id = RulesetId(self.rulesets.len());
        self.rulesets.push(LessRuleset {
            selector,
            kind,
            parent,
            nested: Vec::new(),
            statements: Vec::new(),
            variables: VariableMap::new(),
        });
        if let Some(parent) = parent {
            self.rulesets[parent.0].nested.push(id);
        }
        id
    }

    pub fn ruleset(&self, id: RulesetId) -> &LessRuleset {
        &self.rulesets[id.0]
    }

    pub fn ruleset_mut(&mut self, id: RulesetId) -> &mut LessRuleset {
        &mut self.rulesets[id.0]
    }

    /// 顶层规则集，按出现顺序。
    pub fn top_level_rulesets(&self) -> impl Iterator<Item = RulesetId> + '_ {
        self.statements.iter().filter_map(|statement| match statement {
            StylesheetStatement::Ruleset(id) => Some(*id),
            _ => None,
        })
    }

    /// 从给定规则集沿父链向上，不含自身。
    pub fn ancestors(&self, id: RulesetId) -> Ancestors<'_> {
        Ancestors {
            stylesheet: self,
            next: self.ruleset(id).parent,
        }
    }
}

pub struct Ancestors<'a> {
    stylesheet: &'a LessStylesheet,
    next: Option<RulesetId>,
}

impl Iterator for Ancestors<'_> {
    type Item = RulesetId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.stylesheet.ruleset(current).parent;
        Some(current)
    }
}
