use crate::css::{CssAtRule, CssBlock, CssDeclaration, CssNode, CssRuleset, CssStylesheet};
use crate::token::TokenList;
use crate::utils::indent;

/// 负责将扁平化的规则转换为最终 CSS 文本。
pub struct Serializer {
    minify: bool,
}

impl Serializer {
    pub fn new(minify: bool) -> Self {
        Self { minify }
    }

    pub fn to_css(&self, stylesheet: &CssStylesheet) -> String {
        if self.minify {
            self.render_minified(stylesheet)
        } else {
            self.render_pretty(stylesheet)
        }
    }

    fn render_pretty(&self, stylesheet: &CssStylesheet) -> String {
        let blocks: Vec<String> = stylesheet
            .nodes
            .iter()
            .map(|node| {
                let mut output = String::new();
                self.render_node_pretty(node, 0, &mut output);
                output
            })
            .filter(|block| !block.is_empty())
            .collect();
        blocks.join("\n").trim().to_string()
    }

    fn render_minified(&self, stylesheet: &CssStylesheet) -> String {
        let mut output = String::new();
        for node in &stylesheet.nodes {
            self.render_node_minified(node, &mut output);
        }
        output
    }

    fn format_declaration(&self, decl: &CssDeclaration) -> String {
        let mut result = format!("{}: {}", decl.property.trim(), render_tokens(&decl.value));
        if decl.important {
            result.push_str(" !important");
        }
        result.push(';');
        result
    }

    fn format_declaration_minified(&self, decl: &CssDeclaration) -> String {
        let mut result = format!("{}:{}", decl.property.trim(), render_tokens(&decl.value));
        if decl.important {
            result.push_str("!important");
        }
        result
    }

    fn render_node_pretty(&self, node: &CssNode, level: usize, output: &mut String) {
        match node {
            CssNode::Rule(rule) => self.render_rule_pretty(rule, level, output),
            CssNode::AtRule(at_rule) => self.render_at_rule_pretty(at_rule, level, output),
        }
    }

    fn render_rule_pretty(&self, rule: &CssRuleset, level: usize, output: &mut String) {
        if rule.declarations.is_empty() {
            return;
        }
        output.push_str(&indent(level));
        output.push_str(&render_selector(&rule.selector, ", "));
        output.push_str(" {\n");
        for decl in &rule.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_at_rule_pretty(&self, at_rule: &CssAtRule, level: usize, output: &mut String) {
        output.push_str(&indent(level));
        output.push_str(&at_rule.name);
        let params = render_tokens(&at_rule.params);
        if !params.is_empty() {
            output.push(' ');
            output.push_str(&params);
        }
        let Some(block) = &at_rule.block else {
            output.push_str(";\n");
            return;
        };
        output.push_str(" {\n");
        for decl in &block.declarations {
            output.push_str(&indent(level + 1));
            output.push_str(&self.format_declaration(decl));
            output.push('\n');
        }
        for child in &block.children {
            self.render_node_pretty(child, level + 1, output);
        }
        output.push_str(&indent(level));
        output.push_str("}\n");
    }

    fn render_node_minified(&self, node: &CssNode, output: &mut String) {
        match node {
            CssNode::Rule(rule) => self.render_rule_minified(rule, output),
            CssNode::AtRule(at_rule) => self.render_at_rule_minified(at_rule, output),
        }
    }

    fn render_rule_minified(&self, rule: &CssRuleset, output: &mut String) {
        if rule.declarations.is_empty() {
            return;
        }
        output.push_str(&render_selector(&rule.selector, ","));
        output.push('{');
        self.render_declarations_minified(&rule.declarations, output);
        output.push('}');
    }

    fn render_at_rule_minified(&self, at_rule: &CssAtRule, output: &mut String) {
        output.push_str(&at_rule.name);
        let params = render_tokens(&at_rule.params);
        if !params.is_empty() {
            output.push(' ');
            output.push_str(&params);
        }
        let Some(CssBlock {
            declarations,
            children,
        }) = &at_rule.block
        else {
            output.push(';');
            return;
        };
        output.push('{');
        self.render_declarations_minified(declarations, output);
        for child in children {
            self.render_node_minified(child, output);
        }
        output.push('}');
    }

    fn render_declarations_minified(&self, declarations: &[CssDeclaration], output: &mut String) {
        for (idx, decl) in declarations.iter().enumerate() {
            if idx > 0 {
                output.push(';');
            }
            output.push_str(&self.format_declaration_minified(decl));
        }
    }
}

/// 逐个输出 token，连续空白（含换行）输出为一个空格，首尾空白去掉。
fn render_tokens(tokens: &TokenList) -> String {
    let mut result = String::new();
    let mut pending_space = false;
    for token in tokens {
        if token.is_whitespace() {
            pending_space = !result.is_empty();
            continue;
        }
        if pending_space {
            result.push(' ');
            pending_space = false;
        }
        result.push_str(&token.text);
    }
    result
}

fn render_selector(selector: &TokenList, separator: &str) -> String {
    selector
        .split_commas()
        .iter()
        .map(render_tokens)
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{Token, TokenKind};
    use pretty_assertions::assert_eq;

    fn list(parts: &[(TokenKind, &str)]) -> TokenList {
        parts
            .iter()
            .map(|(kind, text)| Token::synthetic(*kind, *text))
            .collect()
    }

    fn sample() -> CssStylesheet {
        let selector = list(&[
            (TokenKind::Other, "."),
            (TokenKind::Identifier, "a"),
            (TokenKind::Other, ","),
            (TokenKind::Whitespace, "\n  "),
            (TokenKind::Other, "."),
            (TokenKind::Identifier, "b"),
        ]);
        let value = list(&[
            (TokenKind::Dimension, "1px"),
            (TokenKind::Whitespace, "\n    "),
            (TokenKind::Identifier, "solid"),
        ]);
        CssStylesheet {
            nodes: vec![
                CssNode::AtRule(CssAtRule {
                    name: "@charset".to_string(),
                    params: list(&[(TokenKind::String, "\"utf-8\"")]),
                    block: None,
                }),
                CssNode::Rule(CssRuleset {
                    selector: selector.clone(),
                    declarations: vec![
                        CssDeclaration {
                            property: "border".to_string(),
                            value,
                            important: false,
                        },
                        CssDeclaration {
                            property: "color".to_string(),
                            value: list(&[(TokenKind::Identifier, "red")]),
                            important: true,
                        },
                    ],
                }),
                CssNode::Rule(CssRuleset {
                    selector,
                    declarations: Vec::new(),
                }),
            ],
        }
    }

    #[test]
    fn pretty_output() {
        let css = Serializer::new(false).to_css(&sample());
        assert_eq!(
            css,
            "@charset \"utf-8\";\n\n.a, .b {\n  border: 1px solid;\n  color: red !important;\n}"
        );
    }

    #[test]
    fn minified_output() {
        let css = Serializer::new(true).to_css(&sample());
        assert_eq!(css, "@charset \"utf-8\";.a,.b{border:1px solid;color:red!important}");
    }

    #[test]
    fn at_rule_blocks() {
        let sheet = CssStylesheet {
            nodes: vec![CssNode::AtRule(CssAtRule {
                name: "@media".to_string(),
                params: list(&[(TokenKind::Identifier, "print")]),
                block: Some(CssBlock {
                    declarations: Vec::new(),
                    children: vec![CssNode::Rule(CssRuleset {
                        selector: list(&[(TokenKind::Identifier, "p")]),
                        declarations: vec![CssDeclaration {
                            property: "margin".to_string(),
                            value: list(&[(TokenKind::Number, "0")]),
                            important: false,
                        }],
                    })],
                }),
            })],
        };
        assert_eq!(
            Serializer::new(false).to_css(&sheet),
            "@media print {\n  p {\n    margin: 0;\n  }\n}"
        );
        assert_eq!(Serializer::new(true).to_css(&sheet), "@media print{p{margin:0}}");
    }
}
