//! 一次编译过程中唯一的可变状态：作用域帧栈、闭包累加器与待应用的扩展指令。
//!
//! 每个 `ProcessingContext` 只能服务于一次编译，不能在并发的编译之间共享或复用。

use crate::ast::{LessStylesheet, RulesetId, VariableMap};
use crate::extension::Extension;
use crate::token::TokenList;

/// 某个带参数的祖先规则集在闭包捕获时绑定的实参。
#[derive(Debug, Clone)]
pub struct CapturedScope {
    pub ruleset: RulesetId,
    pub arguments: VariableMap,
}

/// mixin 调用结束后仍可调用的嵌套 mixin 定义，连同当时外层调用的实参。
#[derive(Debug, Clone)]
pub struct Closure {
    pub ruleset: RulesetId,
    pub captured: Vec<CapturedScope>,
}

/// 作用域帧。普通规则集求值和 mixin 调用都会压入一帧。
#[derive(Debug, Clone, Default)]
pub struct Frame {
    /// `None` 表示样式表根。
    pub ruleset: Option<RulesetId>,
    /// mixin 调用绑定的实参（含 `@arguments`）。
    pub arguments: VariableMap,
    /// 已完成的 mixin 调用返回给本帧的变量。
    pub returned: VariableMap,
    pub closures: Vec<Closure>,
    /// 通过闭包调用时带入的外层实参。
    pub captured: Vec<CapturedScope>,
    pub is_call: bool,
}

impl Frame {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn ruleset(id: RulesetId) -> Self {
        Self {
            ruleset: Some(id),
            ..Self::default()
        }
    }

    pub fn call(id: RulesetId, arguments: VariableMap, captured: Vec<CapturedScope>) -> Self {
        Self {
            ruleset: Some(id),
            arguments,
            captured,
            is_call: true,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
pub struct ProcessingContext {
    stack: Vec<Frame>,
    extensions: Vec<Extension>,
    pending_closures: Vec<Closure>,
}

impl Default for ProcessingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingContext {
    pub fn new() -> Self {
        Self {
            stack: vec![Frame::root()],
            extensions: Vec::new(),
            pending_closures: Vec::new(),
        }
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.stack.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.stack.pop()
    }

    /// 给定的 mixin 定义是否已经在调用栈上。
    pub fn is_active_call(&self, id: RulesetId) -> bool {
        self.stack
            .iter()
            .any(|frame| frame.is_call && frame.ruleset == Some(id))
    }

    /// 按作用域规则查找变量：
    ///
    /// 1. 从栈顶向下，每一帧依次查看规则集自身的变量、帧的实参、调用返回的变量，
    ///    再沿父链查看祖先的变量与祖先的实参；
    /// 2. 最后查看样式表的全局变量。
    pub fn variable(&self, doc: &LessStylesheet, key: &str) -> Option<TokenList> {
        for (depth, frame) in self.stack.iter().enumerate().rev() {
            if let Some(id) = frame.ruleset {
                let ruleset = doc.ruleset(id);
                if let Some(value) = ruleset.variables.get(key) {
                    return Some(value.clone());
                }
                if let Some(value) = frame.arguments.get(key) {
                    return Some(value.clone());
                }
                if let Some(value) = frame.returned.get(key) {
                    return Some(value.clone());
                }
                for ancestor in doc.ancestors(id) {
                    if let Some(value) = doc.ruleset(ancestor).variables.get(key) {
                        return Some(value.clone());
                    }
                    if doc.ruleset(ancestor).is_mixin() {
                        if let Some(value) = self.ancestor_arguments(depth, frame, ancestor, key) {
                            return Some(value.clone());
                        }
                    }
                }
            } else if let Some(value) = frame.returned.get(key) {
                return Some(value.clone());
            }
        }
        doc.variables.get(key).cloned()
    }

    /// 带参数祖先的实参：先看闭包捕获的，再看栈中更早的调用帧。
    fn ancestor_arguments<'a>(
        &'a self,
        depth: usize,
        frame: &'a Frame,
        ancestor: RulesetId,
        key: &str,
    ) -> Option<&'a TokenList> {
        if let Some(captured) = frame.captured.iter().find(|c| c.ruleset == ancestor) {
            return captured.arguments.get(key);
        }
        self.stack[..depth]
            .iter()
            .rev()
            .find(|f| f.is_call && f.ruleset == Some(ancestor))
            .and_then(|f| f.arguments.get(key).or_else(|| {
                f.captured.iter().find_map(|c| c.arguments.get(key))
            }))
    }

    /// 规则集（`None` 为样式表根）当前可见的闭包，取最近一帧的。
    pub fn closures_for(&self, ruleset: Option<RulesetId>) -> Vec<Closure> {
        self.stack
            .iter()
            .rev()
            .find(|frame| frame.ruleset == ruleset)
            .map(|frame| frame.closures.clone())
            .unwrap_or_default()
    }

    /// 当前调用栈上带参数规则集的实参快照，用于闭包捕获。
    pub fn capture_scopes(&self, doc: &LessStylesheet, id: RulesetId) -> Vec<CapturedScope> {
        let mut captured = Vec::new();
        for ancestor in doc.ancestors(id) {
            if !doc.ruleset(ancestor).is_mixin() {
                continue;
            }
            let found = self
                .stack
                .iter()
                .rev()
                .find(|f| f.is_call && f.ruleset == Some(ancestor));
            if let Some(frame) = found {
                captured.push(CapturedScope {
                    ruleset: ancestor,
                    arguments: frame.arguments.clone(),
                });
                captured.extend(frame.captured.iter().cloned());
            }
        }
        captured
    }

    pub fn add_closure(&mut self, closure: Closure) {
        self.pending_closures.push(closure);
    }

    /// 把刚完成的调用产生的闭包交给当前帧。
    pub fn save_closures(&mut self) {
        let pending = std::mem::take(&mut self.pending_closures);
        if let Some(frame) = self.stack.last_mut() {
            frame.closures.extend(pending);
        }
    }

    /// 把 mixin 调用的局部变量并入当前帧。
    pub fn merge_returned(&mut self, variables: VariableMap) {
        if let Some(frame) = self.stack.last_mut() {
            frame.returned.merge(variables);
        }
    }

    pub fn add_extension(&mut self, extension: Extension) {
        self.extensions.push(extension);
    }

    pub fn take_extensions(&mut self) -> Vec<Extension> {
        std::mem::take(&mut self.extensions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::RulesetKind;
    use crate::selector::LessSelector;
    use crate::token::{Token, TokenKind};

    fn value(text: &str) -> TokenList {
        TokenList::from(vec![Token::synthetic(TokenKind::Number, text)])
    }

    #[test]
    fn inner_definitions_shadow_outer_ones() {
        let mut doc = LessStylesheet::new();
        doc.variables.define("@c", value("1"));
        let outer = doc.add_ruleset(LessSelector::default(), RulesetKind::Ruleset, None);
        doc.ruleset_mut(outer).variables.define("@c", value("2"));
        let inner = doc.add_ruleset(LessSelector::default(), RulesetKind::Ruleset, Some(outer));

        let mut context = ProcessingContext::new();
        assert_eq!(context.variable(&doc, "@c"), Some(value("1")));
        context.push_frame(Frame::ruleset(outer));
        context.push_frame(Frame::ruleset(inner));
        assert_eq!(context.variable(&doc, "@c"), Some(value("2")));
        context.pop_frame();
        context.pop_frame();
        assert_eq!(context.variable(&doc, "@c"), Some(value("1")));
    }

    #[test]
    fn call_frames_expose_arguments_and_detect_cycles() {
        let mut doc = LessStylesheet::new();
        let mixin = doc.add_ruleset(LessSelector::default(), RulesetKind::Ruleset, None);
        let mut args = VariableMap::new();
        args.insert("@x", value("5"));

        let mut context = ProcessingContext::new();
        assert!(!context.is_active_call(mixin));
        context.push_frame(Frame::call(mixin, args, Vec::new()));
        assert!(context.is_active_call(mixin));
        assert_eq!(context.variable(&doc, "@x"), Some(value("5")));
    }

    #[test]
    fn closures_move_to_the_calling_frame() {
        let mut doc = LessStylesheet::new();
        let def = doc.add_ruleset(LessSelector::default(), RulesetKind::Ruleset, None);
        let mut context = ProcessingContext::new();
        context.add_closure(Closure {
            ruleset: def,
            captured: Vec::new(),
        });
        context.save_closures();
        assert_eq!(context.closures_for(None).len(), 1);
    }
}
