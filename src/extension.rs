//! `:extend` 指令与扩展传播。
//!
//! 指令在求值过程中收集，全部展开完成后再统一作用在扁平 CSS 上，
//! 因此可以扩展定义在后面的选择器。

use crate::css::CssStylesheet;
use crate::token::TokenList;
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    pub target: TokenList,
    pub extension: TokenList,
    /// `all`：目标出现在分支任意位置时都替换，而不只是整个分支相等。
    pub all: bool,
}

impl Extension {
    /// 返回对给定选择器应用本指令后新增的分支（可能与已有分支重复）。
    pub fn apply(&self, selector: &TokenList) -> Vec<TokenList> {
        if self.target.is_empty() {
            return Vec::new();
        }
        let replacements = self.extension.split_commas();
        let mut added = Vec::new();
        for branch in selector.split_commas() {
            if self.all {
                if branch.find_sequence(&self.target, 0).is_none() {
                    continue;
                }
                for replacement in &replacements {
                    added.push(replace_all(&branch, &self.target, replacement));
                }
            } else if branch.len() == self.target.len() && matches_at(&branch, &self.target, 0) {
                added.extend(replacements.iter().cloned());
            }
        }
        added
    }
}

/// 把扩展指令作用到样式表的所有规则集上。
///
/// 按收集顺序逐条应用，重复整轮直到没有新增分支；轮数不超过指令数，
/// 所以扩展链（扩展另一条扩展产生的选择器）也能生效。
pub fn propagate(stylesheet: &mut CssStylesheet, extensions: &[Extension]) {
    for pass in 0..extensions.len() {
        let mut changed = false;
        for extension in extensions {
            stylesheet.for_each_ruleset_mut(|rule| {
                let added = extension.apply(&rule.selector);
                if added.is_empty() {
                    return;
                }
                let mut branches = rule.selector.split_commas();
                let mut seen: HashSet<String> = branches.iter().map(TokenList::normalized).collect();
                let before = branches.len();
                for branch in added {
                    if seen.insert(branch.normalized()) {
                        branches.push(branch);
                    }
                }
                if branches.len() > before {
                    log::trace!(
                        "扩展 {} -> {} 作用于 {}",
                        extension.extension.normalized(),
                        extension.target.normalized(),
                        rule.selector.normalized()
                    );
                    rule.selector = TokenList::join_commas(branches);
                    changed = true;
                }
            });
        }
        if !changed {
            log::debug!("扩展传播在第 {} 轮后稳定", pass + 1);
            break;
        }
    }
}

fn matches_at(branch: &TokenList, target: &TokenList, idx: usize) -> bool {
    branch.find_sequence(target, idx) == Some(idx)
}

fn replace_all(branch: &TokenList, target: &TokenList, replacement: &TokenList) -> TokenList {
    let mut out = TokenList::new();
    let mut idx = 0;
    while idx < branch.len() {
        if matches_at(branch, target, idx) {
            out.append_list(replacement.clone());
            idx += target.len();
        } else {
            out.push_back(branch[idx].clone());
            idx += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::css::{CssNode, CssRuleset};
    use crate::token::TokenKind;
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

    fn extension(target: &str, extension: &str, all: bool) -> Extension {
        Extension {
            target: tokens(target),
            extension: tokens(extension),
            all,
        }
    }

    fn sheet(selectors: &[&str]) -> CssStylesheet {
        CssStylesheet {
            nodes: selectors
                .iter()
                .map(|s| {
                    CssNode::Rule(CssRuleset {
                        selector: tokens(s),
                        declarations: Vec::new(),
                    })
                })
                .collect(),
        }
    }

    fn selectors(sheet: &CssStylesheet) -> Vec<String> {
        sheet
            .nodes
            .iter()
            .filter_map(|n| match n {
                CssNode::Rule(rule) => Some(rule.selector.to_string()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn exact_matches_only_without_all() {
        let ext = extension(".a", ".b", false);
        assert_eq!(ext.apply(&tokens(".a")).len(), 1);
        assert!(ext.apply(&tokens(".a:hover")).is_empty());
        assert!(ext.apply(&tokens(".x .a")).is_empty());
    }

    #[test]
    fn all_replaces_every_occurrence() {
        let ext = extension(".a", ".b", true);
        let added = ext.apply(&tokens(".a:hover .a"));
        assert_eq!(added[0].to_string(), ".b:hover .b");
    }

    #[test]
    fn chained_extensions_reach_a_fixed_point() {
        let mut css = sheet(&[".a", ".c"]);
        // 第二条扩展的目标由第一条产生
        let exts = vec![extension(".b", ".c", false), extension(".a", ".b", false)];
        propagate(&mut css, &exts);
        assert_eq!(selectors(&css), vec![".a, .b, .c", ".c"]);
    }

    #[test]
    fn duplicate_branches_are_not_added() {
        let mut css = sheet(&[".a, .b"]);
        propagate(&mut css, &[extension(".a", ".b", false)]);
        assert_eq!(selectors(&css), vec![".a, .b"]);
    }
}
