//! 求值器：把解析得到的 LESS 文档展开为扁平的 CSS 规则。
//!
//! 所有作用域状态都放在 `ProcessingContext` 中，文档本身在求值期间只读。
//! 规则集按出现顺序输出，嵌套规则排在父规则之后。

use crate::ast::{
    LessStylesheet, RulesetId, RulesetKind, StylesheetStatement, UnprocessedStatement,
    VariableMap,
};
use crate::context::{CapturedScope, Closure, Frame, ProcessingContext};
use crate::css::{CssAtRule, CssBlock, CssDeclaration, CssNode, CssRuleset, CssStylesheet};
use crate::error::{LessError, LessResult};
use crate::extension::{propagate, Extension};
use crate::functions::FunctionLibrary;
use crate::mixin::Mixin;
use crate::processor::{ValueProcessor, ValueScope};
use crate::selector::{prefix_selector, LessSelector};
use crate::token::{Token, TokenKind, TokenList};

/// 当前作用域的变量视图，交给值处理器使用。
struct Scope<'a> {
    doc: &'a LessStylesheet,
    context: &'a ProcessingContext,
}

impl ValueScope for Scope<'_> {
    fn variable(&self, key: &str) -> Option<TokenList> {
        self.context.variable(self.doc, key)
    }
}

/// 一个规则集收集到的输出。mixin 调用直接写入调用方的输出。
#[derive(Default)]
struct RuleOutput {
    declarations: Vec<CssDeclaration>,
    /// 处理语句时产生的嵌套规则，排在规则本身之后。
    nodes: Vec<CssNode>,
    /// 带 `!important` 的 mixin 调用期间为真。
    important: bool,
}

impl RuleOutput {
    fn push_declaration(&mut self, mut declaration: CssDeclaration) {
        declaration.important |= self.important;
        self.declarations.push(declaration);
    }
}

/// 通过了参数绑定与守卫检查的 mixin 定义。
struct Candidate {
    ruleset: RulesetId,
    arguments: VariableMap,
    captured: Vec<CapturedScope>,
    guarded: bool,
}

/// 负责维护作用域并输出扁平化 CSS 规则。
pub struct Evaluator {
    processor: ValueProcessor,
    context: ProcessingContext,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    pub fn new() -> Self {
        Self::with_library(FunctionLibrary::with_builtins())
    }

    pub fn with_library(library: FunctionLibrary) -> Self {
        Self {
            processor: ValueProcessor::new(library),
            context: ProcessingContext::new(),
        }
    }

    /// 用于注册额外的内置函数。
    pub fn library_mut(&mut self) -> &mut FunctionLibrary {
        self.processor.library_mut()
    }

    /// 求值整个文档，并在最后应用收集到的 `:extend` 指令。
    pub fn evaluate(&mut self, doc: &LessStylesheet) -> LessResult<CssStylesheet> {
        self.context = ProcessingContext::new();
        let mut css = CssStylesheet::new();
        let root = TokenList::new();

        for statement in &doc.statements {
            match statement {
                StylesheetStatement::Ruleset(id) => {
                    self.process_ruleset(doc, *id, &root, &mut css.nodes)?;
                }
                StylesheetStatement::AtRule(at_rule) => {
                    let mut rule = at_rule.rule.clone();
                    if at_rule.keyword.text.eq_ignore_ascii_case("@import") {
                        strip_import_options(&mut rule);
                    }
                    let params = self.process_value(doc, &rule)?;
                    css.nodes.push(CssNode::AtRule(CssAtRule {
                        name: at_rule.keyword.text.clone(),
                        params,
                        block: None,
                    }));
                }
                StylesheetStatement::MixinCall(statement) => {
                    self.process_top_level_call(doc, statement, &mut css.nodes)?;
                }
            }
        }

        let extensions = self.context.take_extensions();
        if !extensions.is_empty() {
            log::debug!("应用 {} 条扩展指令", extensions.len());
            propagate(&mut css, &extensions);
        }
        Ok(css)
    }

    fn process_top_level_call(
        &mut self,
        doc: &LessStylesheet,
        statement: &UnprocessedStatement,
        out: &mut Vec<CssNode>,
    ) -> LessResult<()> {
        let tokens = &statement.tokens;
        let Some(mixin) = Mixin::parse(tokens) else {
            return Err(LessError::parse_statement(
                tokens.normalized(),
                "声明块 ('{...}')",
                tokens.position(),
            ));
        };
        let mut output = RuleOutput::default();
        if !self.call_mixin(doc, None, &mixin, &TokenList::new(), &mut output)? {
            return Err(no_matching_mixin(&mixin));
        }
        if let Some(declaration) = output.declarations.first() {
            return Err(LessError::ValueError {
                found: mixin.display_name(),
                message: format!("顶层 mixin 调用产生了无法附加的声明 {}", declaration.property),
                position: mixin.name.position(),
            });
        }
        out.extend(output.nodes);
        Ok(())
    }

    /// 处理规则集或 at 块。带参数的 mixin 定义只在被调用时输出。
    fn process_ruleset(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        prefix: &TokenList,
        out: &mut Vec<CssNode>,
    ) -> LessResult<()> {
        let ruleset = doc.ruleset(id);
        if ruleset.is_mixin() {
            return Ok(());
        }
        self.context.push_frame(Frame::ruleset(id));
        let result = match &ruleset.kind {
            RulesetKind::Ruleset => self.process_rule(doc, id, prefix, out),
            RulesetKind::AtBlock {
                keyword,
                rule,
                bubbles,
            } => self.process_at_block(doc, id, keyword, rule, *bubbles, prefix, out),
        };
        self.context.pop_frame();
        result
    }

    fn process_rule(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        prefix: &TokenList,
        out: &mut Vec<CssNode>,
    ) -> LessResult<()> {
        if !self.match_conditions(doc, id)? {
            log::trace!("守卫不成立，跳过 {}", doc.ruleset(id).selector.tokens.normalized());
            return Ok(());
        }
        let ruleset = doc.ruleset(id);
        let mut selector = ruleset.selector.tokens.clone();
        self.interpolate(doc, &mut selector)?;
        let selector = prefix_selector(&selector, prefix);

        for extension in &ruleset.selector.extensions {
            self.add_extension(doc, extension, &selector)?;
        }

        let mut output = RuleOutput::default();
        self.process_statements(doc, id, &selector, &mut output)?;
        self.process_nested(doc, id, &selector, &mut output.nodes)?;

        out.push(CssNode::Rule(CssRuleset {
            selector,
            declarations: output.declarations,
        }));
        out.extend(output.nodes);
        Ok(())
    }

    /// at 块。可冒泡的块把外层选择器带进块内，其余块的内容不加前缀。
    #[allow(clippy::too_many_arguments)]
    fn process_at_block(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        keyword: &Token,
        rule: &TokenList,
        bubbles: bool,
        prefix: &TokenList,
        out: &mut Vec<CssNode>,
    ) -> LessResult<()> {
        let params = self.process_value(doc, rule)?;
        let inner = if bubbles {
            prefix.clone()
        } else {
            TokenList::new()
        };

        let mut output = RuleOutput::default();
        self.process_statements(doc, id, &inner, &mut output)?;
        self.process_nested(doc, id, &inner, &mut output.nodes)?;

        let mut block = CssBlock::default();
        if inner.is_empty() {
            block.declarations = output.declarations;
        } else if !output.declarations.is_empty() {
            block.children.push(CssNode::Rule(CssRuleset {
                selector: inner,
                declarations: output.declarations,
            }));
        }
        block.children.extend(output.nodes);

        out.push(CssNode::AtRule(CssAtRule {
            name: keyword.text.clone(),
            params,
            block: Some(block),
        }));
        Ok(())
    }

    fn process_statements(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        selector: &TokenList,
        output: &mut RuleOutput,
    ) -> LessResult<()> {
        for statement in &doc.ruleset(id).statements {
            self.process_statement(doc, id, statement, selector, output)?;
        }
        Ok(())
    }

    fn process_nested(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        selector: &TokenList,
        out: &mut Vec<CssNode>,
    ) -> LessResult<()> {
        for child in &doc.ruleset(id).nested {
            self.process_ruleset(doc, *child, selector, out)?;
        }
        Ok(())
    }

    /// 语句依次尝试：at 语句（忽略）、`&:extend(...)`、mixin 调用、声明。
    fn process_statement(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        statement: &UnprocessedStatement,
        selector: &TokenList,
        output: &mut RuleOutput,
    ) -> LessResult<()> {
        let tokens = &statement.tokens;
        let Some(first) = tokens.front() else {
            return Ok(());
        };

        if first.kind == TokenKind::AtKeyword {
            log::warn!(
                "{} 忽略规则集内部的 at 语句 {}",
                first.position(),
                tokens.normalized()
            );
            return Ok(());
        }

        if first.is("&") {
            let parsed = LessSelector::parse(tokens.clone());
            if parsed.tokens.len() == 1 && !parsed.extensions.is_empty() {
                for extension in &parsed.extensions {
                    self.add_extension(doc, extension, selector)?;
                }
                return Ok(());
            }
        }

        let mixin = Mixin::parse(tokens);
        if let Some(mixin) = &mixin {
            if self.call_mixin(doc, Some(id), mixin, selector, output)? {
                return Ok(());
            }
        }

        match split_declaration(tokens) {
            Some((property, value)) => {
                let declaration = self.process_declaration(doc, property, value)?;
                output.push_declaration(declaration);
                Ok(())
            }
            None => match &mixin {
                Some(mixin) => Err(no_matching_mixin(mixin)),
                None => Err(LessError::parse_statement(
                    tokens.normalized(),
                    "变量、mixin 或声明",
                    tokens.position(),
                )),
            },
        }
    }

    fn process_declaration(
        &mut self,
        doc: &LessStylesheet,
        mut property: TokenList,
        value: TokenList,
    ) -> LessResult<CssDeclaration> {
        self.interpolate(doc, &mut property)?;
        let (value, important) = strip_important(value);
        let value = self.process_value(doc, &value)?;
        Ok(CssDeclaration {
            property: property.to_string(),
            value,
            important,
        })
    }

    fn add_extension(
        &mut self,
        doc: &LessStylesheet,
        directive: &Extension,
        selector: &TokenList,
    ) -> LessResult<()> {
        let mut target = directive.target.clone();
        self.interpolate(doc, &mut target)?;
        self.context.add_extension(Extension {
            target,
            extension: selector.clone(),
            all: directive.all,
        });
        Ok(())
    }

    /// 展开 mixin 调用，没有任何定义匹配时返回 `false`。
    fn call_mixin(
        &mut self,
        doc: &LessStylesheet,
        caller: Option<RulesetId>,
        mixin: &Mixin,
        selector: &TokenList,
        output: &mut RuleOutput,
    ) -> LessResult<bool> {
        let call = self.evaluate_arguments(doc, mixin)?;
        let candidates = self.find_candidates(doc, caller, &call)?;
        if candidates.is_empty() {
            log::debug!("没有与 {} 匹配的 mixin 定义", call.display_name());
            return Ok(false);
        }

        // 有守卫成立时，无守卫的定义只作为默认分支，不再展开
        let any_guarded = candidates.iter().any(|c| c.guarded);
        let saved = output.important;
        output.important |= call.important;
        for candidate in candidates {
            if any_guarded && !candidate.guarded {
                continue;
            }
            self.instantiate(doc, &call, candidate, selector, output)?;
        }
        output.important = saved;
        Ok(true)
    }

    /// 实参在调用方作用域中求值。
    fn evaluate_arguments(&mut self, doc: &LessStylesheet, mixin: &Mixin) -> LessResult<Mixin> {
        let mut call = mixin.clone();
        for argument in call.arguments.iter_mut() {
            *argument = self.process_value(doc, argument)?;
        }
        for value in call.named.values_mut() {
            *value = self.process_value(doc, value)?;
        }
        Ok(call)
    }

    /// 从调用位置开始逐层向外查找定义：先看当前层的嵌套规则集与闭包，
    /// 找到后停止；否则转到父规则集，最后是样式表顶层。
    fn find_candidates(
        &mut self,
        doc: &LessStylesheet,
        caller: Option<RulesetId>,
        call: &Mixin,
    ) -> LessResult<Vec<Candidate>> {
        let mut found = Vec::new();
        let mut scope = caller;
        let mut exclude = None;
        loop {
            let children: Vec<RulesetId> = match scope {
                Some(id) => doc.ruleset(id).nested.clone(),
                None => doc.top_level_rulesets().collect(),
            };
            for child in children {
                if Some(child) != exclude {
                    collect_definitions(doc, child, call, 0, &[], &mut found);
                }
            }
            for closure in self.context.closures_for(scope) {
                collect_definitions(doc, closure.ruleset, call, 0, &closure.captured, &mut found);
            }
            if !found.is_empty() {
                break;
            }
            match scope {
                Some(id) => {
                    let ruleset = doc.ruleset(id);
                    exclude = (!ruleset.is_mixin()).then_some(id);
                    scope = ruleset.parent;
                }
                None => break,
            }
        }

        let mut candidates = Vec::new();
        for (id, captured) in found {
            let selector = &doc.ruleset(id).selector;
            let Some(arguments) = call.bind(selector) else {
                log::trace!("{} 的实参与定义 {} 不匹配", call.display_name(), selector.tokens);
                continue;
            };
            let guarded = selector.has_conditions();
            if guarded && !self.match_guard(doc, id, &arguments, &captured)? {
                log::trace!("{} 的守卫不成立", selector.tokens);
                continue;
            }
            candidates.push(Candidate {
                ruleset: id,
                arguments,
                captured,
                guarded,
            });
        }
        log::debug!(
            "mixin {} 匹配到 {} 个定义",
            call.display_name(),
            candidates.len()
        );
        Ok(candidates)
    }

    /// 在临时的调用帧中求值守卫，形参此时可见。
    fn match_guard(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        arguments: &VariableMap,
        captured: &[CapturedScope],
    ) -> LessResult<bool> {
        self.context
            .push_frame(Frame::call(id, arguments.clone(), captured.to_vec()));
        let result = self.match_conditions(doc, id);
        self.context.pop_frame();
        result
    }

    /// 逗号分隔的条件中任意一个成立即可，没有条件时总是成立。
    fn match_conditions(&mut self, doc: &LessStylesheet, id: RulesetId) -> LessResult<bool> {
        let conditions = &doc.ruleset(id).selector.conditions;
        for condition in conditions {
            if self.validate_condition(doc, condition)? {
                return Ok(true);
            }
        }
        Ok(conditions.is_empty())
    }

    fn instantiate(
        &mut self,
        doc: &LessStylesheet,
        call: &Mixin,
        candidate: Candidate,
        selector: &TokenList,
        output: &mut RuleOutput,
    ) -> LessResult<()> {
        let id = candidate.ruleset;
        if self.context.is_active_call(id) {
            return Err(LessError::cyclic(call.display_name(), call.name.position()));
        }
        log::trace!("展开 mixin {}", call.display_name());

        self.context
            .push_frame(Frame::call(id, candidate.arguments, candidate.captured));
        let result = self.expand(doc, id, selector, output);
        self.context.pop_frame();
        let locals = result?;

        self.context.save_closures();
        self.context.merge_returned(locals);
        Ok(())
    }

    /// 在调用帧中展开 mixin 的内容，返回求值后的局部变量。
    fn expand(
        &mut self,
        doc: &LessStylesheet,
        id: RulesetId,
        selector: &TokenList,
        output: &mut RuleOutput,
    ) -> LessResult<VariableMap> {
        self.process_statements(doc, id, selector, output)?;

        let ruleset = doc.ruleset(id);
        for child in &ruleset.nested {
            self.process_ruleset(doc, *child, selector, &mut output.nodes)?;
        }
        for child in &ruleset.nested {
            if doc.ruleset(*child).is_mixin() {
                let captured = self.context.capture_scopes(doc, *child);
                self.context.add_closure(Closure {
                    ruleset: *child,
                    captured,
                });
            }
        }

        let mut locals = VariableMap::new();
        for (key, value) in ruleset.variables.iter() {
            let value = self.process_value(doc, value)?;
            locals.insert(key, value);
        }
        Ok(locals)
    }

    fn process_value(&mut self, doc: &LessStylesheet, value: &TokenList) -> LessResult<TokenList> {
        let scope = Scope {
            doc,
            context: &self.context,
        };
        self.processor.process_value(value, &scope)
    }

    fn validate_condition(&mut self, doc: &LessStylesheet, condition: &TokenList) -> LessResult<bool> {
        let scope = Scope {
            doc,
            context: &self.context,
        };
        self.processor.validate_condition(condition, &scope)
    }

    fn interpolate(&mut self, doc: &LessStylesheet, tokens: &mut TokenList) -> LessResult<()> {
        let scope = Scope {
            doc,
            context: &self.context,
        };
        self.processor.interpolate_list(tokens, &scope)
    }
}

/// 沿 mixin 路径匹配规则集，路径走完的规则集即为候选定义。
fn collect_definitions(
    doc: &LessStylesheet,
    id: RulesetId,
    call: &Mixin,
    offset: usize,
    captured: &[CapturedScope],
    found: &mut Vec<(RulesetId, Vec<CapturedScope>)>,
) {
    let ruleset = doc.ruleset(id);
    let Some(end) = call.walk(&ruleset.selector.tokens, offset) else {
        return;
    };
    if end == call.path.len() {
        found.push((id, captured.to_vec()));
        return;
    }
    for child in &ruleset.nested {
        collect_definitions(doc, *child, call, end, captured, found);
    }
}

/// 在顶层冒号处把语句拆成属性名与值。
fn split_declaration(tokens: &TokenList) -> Option<(TokenList, TokenList)> {
    let mut depth = 0usize;
    let mut colon = None;
    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::ParenOpen | TokenKind::BracketOpen => depth += 1,
            TokenKind::ParenClose | TokenKind::BracketClose => depth = depth.saturating_sub(1),
            TokenKind::Colon if depth == 0 => {
                colon = Some(idx);
                break;
            }
            _ => {}
        }
    }
    let colon = colon?;
    let property = tokens.iter().take(colon).cloned().collect::<TokenList>().trimmed();
    if property.is_empty() || property.contains_kind(TokenKind::Whitespace) {
        return None;
    }
    let value = tokens.iter().skip(colon + 1).cloned().collect::<TokenList>().trimmed();
    Some((property, value))
}

fn strip_important(mut value: TokenList) -> (TokenList, bool) {
    value.rtrim();
    if !value.back().is_some_and(|t| t.is("important")) {
        return (value, false);
    }
    let mut rest = value.clone();
    rest.pop_back();
    rest.rtrim();
    if !rest.back().is_some_and(|t| t.is("!")) {
        return (value, false);
    }
    rest.pop_back();
    rest.rtrim();
    (rest, true)
}

/// 去掉 `@import (css) "a.css"` 中的导入选项，只保留 CSS 能识别的部分。
fn strip_import_options(rule: &mut TokenList) {
    if !rule.front_is(TokenKind::ParenOpen) {
        return;
    }
    while let Some(token) = rule.pop_front() {
        if token.kind == TokenKind::ParenClose {
            break;
        }
    }
    rule.ltrim();
}

fn no_matching_mixin(mixin: &Mixin) -> LessError {
    LessError::ValueError {
        found: mixin.display_name(),
        message: "没有匹配的 mixin 定义，也不是合法的声明".to_string(),
        position: mixin.name.position(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LessParser;
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

    fn evaluate(source: &str) -> LessResult<CssStylesheet> {
        let doc = LessParser::new().parse(source)?;
        Evaluator::new().evaluate(&doc)
    }

    /// 规则集的选择器与 `property: value` 列表。
    fn rules(css: &CssStylesheet) -> Vec<(String, Vec<String>)> {
        css.nodes
            .iter()
            .filter_map(|node| match node {
                CssNode::Rule(rule) => Some((
                    rule.selector.to_string(),
                    rule.declarations
                        .iter()
                        .map(|d| format!("{}: {}", d.property, d.value))
                        .collect(),
                )),
                CssNode::AtRule(_) => None,
            })
            .collect()
    }

    #[test]
    fn nested_rules_follow_their_parent() {
        let css = evaluate(".a { color: red; .b { color: blue; } &:hover { color: green; } }").unwrap();
        assert_eq!(
            rules(&css),
            vec![
                (".a".to_string(), vec!["color: red".to_string()]),
                (".a .b".to_string(), vec!["color: blue".to_string()]),
                (".a:hover".to_string(), vec!["color: green".to_string()]),
            ]
        );
    }

    #[test]
    fn inner_variables_shadow_globals() {
        let css = evaluate("@c: 1px; .a { @c: 2px; width: @c; } .b { width: @c; }").unwrap();
        assert_eq!(rules(&css)[0].1, vec!["width: 2px".to_string()]);
        assert_eq!(rules(&css)[1].1, vec!["width: 1px".to_string()]);
    }

    #[test]
    fn guards_select_matching_definitions() {
        let source = "
            .m(@a) when (@a > 10) { width: big; }
            .m(@a) when (@a <= 10) { width: small; }
            .m(@a) { width: default; }
            .x { .m(20); }
            .y { .m(5); }
        ";
        let css = evaluate(source).unwrap();
        assert_eq!(rules(&css)[0].1, vec!["width: big".to_string()]);
        assert_eq!(rules(&css)[1].1, vec!["width: small".to_string()]);
    }

    #[test]
    fn unguarded_definition_is_the_fallback() {
        let source = "
            .m(@a) when (@a > 10) { width: big; }
            .m(@a) { width: default; }
            .x { .m(1); }
        ";
        let css = evaluate(source).unwrap();
        assert_eq!(rules(&css)[0].1, vec!["width: default".to_string()]);
    }

    #[test]
    fn mixin_locals_are_returned_to_the_caller() {
        let css = evaluate(".m() { @result: 5px; } .a { .m(); width: @result; }").unwrap();
        assert_eq!(rules(&css)[0].1, vec!["width: 5px".to_string()]);
    }

    #[test]
    fn closures_keep_outer_arguments() {
        let source = "
            .outer(@c) { .inner() { color: @c; } }
            .a { .outer(red); .inner(); }
        ";
        let css = evaluate(source).unwrap();
        assert_eq!(rules(&css)[0].1, vec!["color: red".to_string()]);
    }

    #[test]
    fn namespaced_calls_walk_the_path() {
        let css = evaluate("#ns { .m() { color: red; } } .a { #ns > .m(); }").unwrap();
        assert_eq!(rules(&css).last().map(|r| r.1.clone()), Some(vec!["color: red".to_string()]));
    }

    #[test]
    fn important_call_marks_declarations() {
        let css = evaluate(".m() { color: red; } .a { .m() !important; }").unwrap();
        let CssNode::Rule(rule) = &css.nodes[0] else {
            panic!("期待规则集");
        };
        assert!(rule.declarations[0].important);
    }

    #[test]
    fn self_recursive_mixin_is_cyclic() {
        let err = evaluate(".loop() { .loop(); } .a { .loop(); }").unwrap_err();
        assert!(err.is_cyclic());
    }

    #[test]
    fn unknown_mixin_is_an_error() {
        let err = evaluate(".a { .missing(); }").unwrap_err();
        assert!(err.is_value());
    }

    #[test]
    fn media_blocks_bubble_with_the_parent_selector() {
        let css = evaluate(".a { @media print { color: red; } }").unwrap();
        let CssNode::AtRule(media) = &css.nodes[1] else {
            panic!("期待 at 规则");
        };
        assert_eq!(media.name, "@media");
        assert_eq!(media.params.to_string(), "print");
        let block = media.block.as_ref().unwrap();
        let CssNode::Rule(rule) = &block.children[0] else {
            panic!("期待规则集");
        };
        assert_eq!(rule.selector.to_string(), ".a");
    }

    #[test]
    fn statement_extend_targets_later_rules() {
        let css = evaluate(".b { &:extend(.a); color: blue; } .a { color: red; }").unwrap();
        assert_eq!(rules(&css)[1].0, ".a, .b");
    }

    #[test]
    fn split_declaration_requires_a_property() {
        let statement = tokens("color: red");
        let (property, value) = split_declaration(&statement).unwrap();
        assert_eq!(property.to_string(), "color");
        assert_eq!(value.to_string(), "red");
        assert!(split_declaration(&tokens(": red")).is_none());
    }

    #[test]
    fn import_options_are_dropped() {
        let mut rule = tokens("(css, optional) \"a.css\"");
        strip_import_options(&mut rule);
        assert_eq!(rule.to_string(), "\"a.css\"");
    }

    #[test]
    fn important_suffix_is_removed() {
        let (value, important) = strip_important(tokens("1px ! important"));
        assert!(important);
        assert_eq!(value.to_string(), "1px");
    }
}
