//! 值处理器：把声明值、参数与守卫条件中的表达式求值为 token 序列或布尔值。
//!
//! 表达式按优先级爬升解析：比较运算结合最松，其次是 `+`/`-`，`*`/`/` 最紧，
//! 同级运算左结合。无法组成表达式的 token 原样输出。
//! 括号外两个数字字面量之间的 `/` 是 CSS 的分隔符（`12px/1.5`、`1 / 3`），不做除法。

use crate::color::Color;
use crate::error::{LessError, LessResult};
use crate::functions::FunctionLibrary;
use crate::token::{Token, TokenKind, TokenList};
use crate::utils::remove_quotes;
use crate::value::{is_unit, Number, Operator, Value};

/// 这些函数的参数交给浏览器计算，只做变量替换。
const RAW_FUNCTIONS: &[&str] = &["calc", "var", "env"];

/// 变量查找的入口，由求值器根据当前作用域实现。
pub trait ValueScope {
    /// 返回变量未经求值的 token 序列。
    fn variable(&self, key: &str) -> Option<TokenList>;
}

pub struct ValueProcessor {
    library: FunctionLibrary,
    evaluating: Vec<String>,
    /// 当前所在的括号层数，函数参数也算一层。
    parens: usize,
}

impl Default for ValueProcessor {
    fn default() -> Self {
        Self::new(FunctionLibrary::with_builtins())
    }
}

impl ValueProcessor {
    pub fn new(library: FunctionLibrary) -> Self {
        Self {
            library,
            evaluating: Vec::new(),
            parens: 0,
        }
    }

    pub fn library_mut(&mut self) -> &mut FunctionLibrary {
        &mut self.library
    }

    /// 求值一个值：能组成表达式的部分被计算，其余 token 原样保留，原有的空白位置保留为单个空格。
    pub fn process_value(
        &mut self,
        value: &TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<TokenList> {
        if !self.needs_processing(value) {
            let mut output = value.clone();
            self.interpolate_list(&mut output, scope)?;
            return Ok(output);
        }

        let mut input = value.clone();
        let mut output = TokenList::new();
        loop {
            let spaced = input.front().is_some_and(Token::is_whitespace);
            input.ltrim();
            let Some(front) = input.front().cloned() else {
                break;
            };
            if spaced
                && !output.is_empty()
                && !output.back().is_some_and(|t| t.kind == TokenKind::ParenOpen)
            {
                output.push_back(Token::space());
            }

            if let Some(result) = self.process_statement(&mut input, scope)? {
                output.append_list(result.to_tokens(&front));
                continue;
            }

            let Some(token) = input.pop_front() else {
                break;
            };
            match token.kind {
                TokenKind::AtKeyword => {
                    let resolved = self.resolve_variable(&token, scope)?;
                    output.append_list(resolved);
                }
                TokenKind::Identifier
                    if input.front_is(TokenKind::ParenOpen)
                        && RAW_FUNCTIONS.contains(&token.text.to_ascii_lowercase().as_str()) =>
                {
                    output.push_back(token);
                    self.copy_raw_group(&mut input, &mut output, scope)?;
                }
                TokenKind::Identifier if input.front_is(TokenKind::ParenOpen) => {
                    // 未注册的函数原样输出，参数在括号内继续求值
                    if token.text.contains("@{") {
                        let text = self.interpolate(&token.text, &token, scope)?;
                        output.push_back(Token::derived(token.kind, text, &token));
                    } else {
                        output.push_back(token);
                    }
                    if let Some(open) = input.pop_front() {
                        output.push_back(open);
                    }
                }
                TokenKind::String | TokenKind::Url | TokenKind::Identifier
                    if token.text.contains("@{") =>
                {
                    let text = self.interpolate(&token.text, &token, scope)?;
                    output.push_back(Token::derived(token.kind, text, &token));
                }
                _ => output.push_back(token),
            }
        }
        Ok(output)
    }

    /// 求值守卫条件。`and` 连接多个条件，`not` 取反，每个条件必须得到布尔值。
    pub fn validate_condition(
        &mut self,
        condition: &TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<bool> {
        let mut value = condition.clone();
        value.trim();
        let at = value
            .front()
            .cloned()
            .unwrap_or_else(|| Token::synthetic(TokenKind::Eos, ""));

        let mut result = self.validate_value(&mut value, &at, scope)?;
        loop {
            value.ltrim();
            if !result || !value.front().is_some_and(|t| t.is("and")) {
                break;
            }
            value.pop_front();
            result = self.validate_value(&mut value, &at, scope)?;
        }

        if !result {
            return Ok(false);
        }
        value.ltrim();
        match value.front() {
            Some(token) => Err(LessError::parse(token, "'and' 或条件结束")),
            None => Ok(true),
        }
    }

    fn validate_value(
        &mut self,
        value: &mut TokenList,
        at: &Token,
        scope: &dyn ValueScope,
    ) -> LessResult<bool> {
        value.ltrim();
        let negate = value.front().is_some_and(|t| t.is("not"));
        if negate {
            value.pop_front();
            value.ltrim();
        }
        let found = value.front().cloned().unwrap_or_else(|| at.clone());
        match self.process_statement(value, scope)? {
            Some(Value::Boolean(b)) => Ok(b != negate),
            Some(other) => Err(LessError::value(
                &found,
                format!("条件必须得到布尔值，实际得到 {}", other.type_name()),
            )),
            None => Err(LessError::parse(&found, "条件")),
        }
    }

    /// 替换文本中的 `@{name}`，变量值是字符串时去掉引号。
    pub fn interpolate(
        &mut self,
        text: &str,
        at: &Token,
        scope: &dyn ValueScope,
    ) -> LessResult<String> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("@{") {
            let Some(len) = rest[start..].find('}') else {
                break;
            };
            result.push_str(&rest[..start]);
            let key = format!("@{}", &rest[start + 2..start + len]);
            let Some(tokens) = scope.variable(&key) else {
                return Err(LessError::value(
                    at,
                    format!("插值引用了未定义的变量 {key}"),
                ));
            };
            let processed = self
                .guarded(&key, at, |this| this.process_value(&tokens, scope))?
                .trimmed();
            match processed.front() {
                Some(token) if processed.len() == 1 && token.kind == TokenKind::String => {
                    result.push_str(&remove_quotes(&token.text).0);
                }
                _ => result.push_str(&processed.to_string()),
            }
            rest = &rest[start + len + 1..];
        }
        result.push_str(rest);
        Ok(result)
    }

    /// 对序列中每个带 `@{...}` 的 token 做插值。
    pub fn interpolate_list(
        &mut self,
        tokens: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<()> {
        for token in tokens.iter_mut() {
            if token.text.contains("@{") {
                token.text = self.interpolate(&token.text, token, scope)?;
            }
        }
        Ok(())
    }

    fn needs_processing(&self, value: &TokenList) -> bool {
        value.iter().enumerate().any(|(idx, token)| match token.kind {
            TokenKind::AtKeyword => true,
            TokenKind::Identifier => {
                value
                    .get(idx + 1)
                    .is_some_and(|next| next.kind == TokenKind::ParenOpen)
                    && self.library.contains(&token.text)
            }
            TokenKind::Other => matches!(
                token.text.as_str(),
                "+" | "-" | "*" | "/" | "~" | "@" | "%"
            ),
            _ => false,
        })
    }

    /// 解析一个表达式：常量后跟任意多个运算。
    fn process_statement(
        &mut self,
        value: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<Option<Value>> {
        value.ltrim();
        let mut literal = starts_with_number(value);
        let Some(mut result) = self.process_constant(value, scope)? else {
            return Ok(None);
        };
        while let Some(next) = self.process_operator(value, &result, literal, None, scope)? {
            result = next;
            literal = false;
        }
        Ok(Some(result))
    }

    /// 若下一个 token 是比 `last` 结合更紧的运算符，消费它和右操作数并返回结果。
    fn process_operator(
        &mut self,
        value: &mut TokenList,
        lhs: &Value,
        lhs_literal: bool,
        last: Option<Operator>,
        scope: &dyn ValueScope,
    ) -> LessResult<Option<Value>> {
        let Some(start) = value.iter().position(|t| !t.is_whitespace()) else {
            return Ok(None);
        };
        let op_token = value[start].clone();
        if op_token.kind != TokenKind::Other {
            return Ok(None);
        }
        let mut text = op_token.text.clone();
        let mut width = 1;
        if let Some(next) = value.get(start + 1) {
            if next.kind == TokenKind::Other
                && matches!((text.as_str(), next.text.as_str()), ("=", "<") | ("<", "=") | (">", "="))
            {
                text.push_str(&next.text);
                width = 2;
            }
        }
        let Some(op) = Operator::from_text(&text) else {
            return Ok(None);
        };
        if last.is_some_and(|last| op.precedence() <= last.precedence()) {
            return Ok(None);
        }

        if op == Operator::Divide && self.parens == 0 && lhs_literal {
            let rhs_literal = value
                .iter()
                .skip(start + 1)
                .find(|t| !t.is_whitespace())
                .is_some_and(is_number_token);
            if rhs_literal {
                return Ok(None);
            }
        }

        value.drain(..start + width);
        value.ltrim();
        let mut rhs_literal = starts_with_number(value);
        let Some(mut rhs) = self.process_constant(value, scope)? else {
            let found = value
                .front()
                .cloned()
                .unwrap_or_else(|| Token::derived(TokenKind::Eos, "", &op_token));
            return Err(LessError::parse(&found, "常量或 @ 变量"));
        };
        while let Some(next) = self.process_operator(value, &rhs, rhs_literal, Some(op), scope)? {
            rhs = next;
            rhs_literal = false;
        }
        lhs.operate(op, &rhs)
            .map(Some)
            .map_err(|err| LessError::value(&op_token, err.to_string()))
    }

    fn process_constant(
        &mut self,
        value: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<Option<Value>> {
        let Some(token) = value.front().cloned() else {
            return Ok(None);
        };
        let next_kind = value.get(1).map(|t| t.kind);

        let constant = match token.kind {
            TokenKind::Hash => {
                value.pop_front();
                Color::from_hash(&token.text)
                    .map(Value::Color)
                    .unwrap_or_else(|| Value::keyword(token.text.clone()))
            }
            TokenKind::Number | TokenKind::Percentage | TokenKind::Dimension => {
                value.pop_front();
                Number::parse(&token.text)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::keyword(token.text.clone()))
            }
            TokenKind::AtKeyword => {
                return self.variable_constant(value, 1, &token.text, &token, scope);
            }
            TokenKind::String => {
                value.pop_front();
                let text = self.interpolate(&token.text, &token, scope)?;
                Value::from_string_literal(&text)
            }
            TokenKind::Url => {
                value.pop_front();
                let text = self.interpolate(&token.text, &token, scope)?;
                Value::from_url_literal(&text)
            }
            TokenKind::Identifier if next_kind == Some(TokenKind::ParenOpen) => {
                if !self.library.contains(&token.text) {
                    return Ok(None);
                }
                value.drain(..2);
                self.process_function(&token.text, &token, value, scope)?
            }
            TokenKind::Identifier => {
                value.pop_front();
                let text = if token.text.contains("@{") {
                    self.interpolate(&token.text, &token, scope)?
                } else {
                    token.text.clone()
                };
                identifier_value(text)
            }
            TokenKind::ParenOpen => return self.process_group(value, scope),
            TokenKind::Other if token.is("@") && next_kind == Some(TokenKind::AtKeyword) => {
                let inner = value[1].clone();
                let name = self.resolve_variable(&inner, scope)?.to_string();
                let key = format!("@{}", remove_quotes(name.trim()).0);
                return self.variable_constant(value, 2, &key, &inner, scope);
            }
            TokenKind::Other if token.is("%") && next_kind == Some(TokenKind::ParenOpen) => {
                value.drain(..2);
                self.process_function("%", &token, value, scope)?
            }
            TokenKind::Other if token.is("~") && next_kind == Some(TokenKind::String) => {
                let string = value[1].clone();
                value.drain(..2);
                let text = self.interpolate(&string.text, &string, scope)?;
                Value::keyword(remove_quotes(&text).0)
            }
            TokenKind::Other if token.is("-") => {
                value.pop_front();
                match self.process_constant(value, scope)? {
                    Some(operand) => Value::number(0.0, "")
                        .operate(Operator::Subtract, &operand)
                        .map_err(|err| LessError::value(&token, err.to_string()))?,
                    None => {
                        value.push_front(token);
                        return Ok(None);
                    }
                }
            }
            _ => return Ok(None),
        };
        Ok(Some(constant))
    }

    /// 括号分组：整个括号内是一个表达式时返回其值，否则把已求值的部分写回序列。
    fn process_group(
        &mut self,
        value: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<Option<Value>> {
        let Some(open) = value.pop_front() else {
            return Ok(None);
        };
        if !has_closing_paren(value) {
            return Err(LessError::ValueError {
                found: format!("({}", value.normalized()),
                message: "括号没有闭合，缺少 ')'".to_string(),
                position: open.position(),
            });
        }
        self.parens += 1;
        let inner = self.process_statement(value, scope);
        self.parens -= 1;
        let inner = inner?;
        let close = value.iter().position(|t| !t.is_whitespace());
        match inner {
            Some(result)
                if close.is_some_and(|idx| value[idx].kind == TokenKind::ParenClose) =>
            {
                value.drain(..=close.unwrap_or_default());
                Ok(Some(result))
            }
            Some(result) => {
                value.prepend_list(result.to_tokens(&open));
                value.push_front(open);
                Ok(None)
            }
            None => {
                value.push_front(open);
                Ok(None)
            }
        }
    }

    /// 变量作为常量：变量值必须恰好是一个表达式，否则交给调用方逐个 token 处理。
    fn variable_constant(
        &mut self,
        value: &mut TokenList,
        consumed: usize,
        key: &str,
        at: &Token,
        scope: &dyn ValueScope,
    ) -> LessResult<Option<Value>> {
        let Some(mut tokens) = scope.variable(key) else {
            return Err(undefined_variable(at, key));
        };
        let result = self.guarded(key, at, |this| this.process_statement(&mut tokens, scope))?;
        tokens.ltrim();
        match result {
            Some(result) if tokens.is_empty() => {
                value.drain(..consumed);
                Ok(Some(result))
            }
            _ => Ok(None),
        }
    }

    fn resolve_variable(&mut self, token: &Token, scope: &dyn ValueScope) -> LessResult<TokenList> {
        let Some(tokens) = scope.variable(&token.text) else {
            return Err(undefined_variable(token, &token.text));
        };
        Ok(self
            .guarded(&token.text, token, |this| this.process_value(&tokens, scope))?
            .trimmed())
    }

    fn process_function(
        &mut self,
        name: &str,
        at: &Token,
        value: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<Value> {
        self.parens += 1;
        let args = self.process_arguments(value, at, scope);
        self.parens -= 1;
        let args = args?;
        let Some(info) = self.library.get(name) else {
            return Err(LessError::value(at, format!("未知函数 {name}")));
        };
        if !FunctionLibrary::check_arguments(info, &args) {
            let rendered: Vec<String> = args.iter().map(Value::to_css).collect();
            return Err(LessError::ValueError {
                found: format!("{name}({})", rendered.join(", ")),
                message: format!(
                    "参数不符合函数签名 {}",
                    FunctionLibrary::signature_to_string(name, info)
                ),
                position: at.position(),
            });
        }
        Ok((info.function)(&args))
    }

    fn process_arguments(
        &mut self,
        value: &mut TokenList,
        at: &Token,
        scope: &dyn ValueScope,
    ) -> LessResult<Vec<Value>> {
        let mut args = Vec::new();
        value.ltrim();
        if value.front_is(TokenKind::ParenClose) {
            value.pop_front();
            return Ok(args);
        }
        loop {
            match self.process_statement(value, scope)? {
                Some(arg) => args.push(arg),
                None if value.front_is(TokenKind::ParenClose) => {}
                None => match value.pop_front() {
                    Some(token) => args.push(Value::keyword(token.text)),
                    None => break,
                },
            }
            value.ltrim();
            match value.front() {
                Some(token) if token.is(",") || token.is(";") => {
                    value.pop_front();
                }
                Some(token) if token.kind == TokenKind::ParenClose => {
                    value.pop_front();
                    return Ok(args);
                }
                Some(token) => return Err(LessError::parse(token, "')'")),
                None => break,
            }
        }
        Err(LessError::parse(
            &Token::derived(TokenKind::Eos, "", at),
            "')'",
        ))
    }

    /// 原样复制一个括号组，只替换其中的变量。
    fn copy_raw_group(
        &mut self,
        input: &mut TokenList,
        output: &mut TokenList,
        scope: &dyn ValueScope,
    ) -> LessResult<()> {
        let mut depth = 0usize;
        while let Some(token) = input.pop_front() {
            match token.kind {
                TokenKind::ParenOpen => depth += 1,
                TokenKind::ParenClose => depth = depth.saturating_sub(1),
                TokenKind::AtKeyword => {
                    let resolved = self.resolve_variable(&token, scope)?;
                    output.append_list(resolved);
                    continue;
                }
                _ => {}
            }
            output.push_back(token);
            if depth == 0 {
                break;
            }
        }
        Ok(())
    }

    fn guarded<T>(
        &mut self,
        key: &str,
        at: &Token,
        f: impl FnOnce(&mut Self) -> LessResult<T>,
    ) -> LessResult<T> {
        if self.evaluating.iter().any(|k| k == key) {
            return Err(LessError::value(at, format!("变量 {key} 递归引用了自身")));
        }
        self.evaluating.push(key.to_string());
        let result = f(self);
        self.evaluating.pop();
        result
    }
}

fn identifier_value(text: String) -> Value {
    match text.as_str() {
        "true" => Value::Boolean(true),
        "false" => Value::Boolean(false),
        _ if is_unit(&text) => Value::Unit(text),
        _ => Color::from_name(&text)
            .map(Value::Color)
            .unwrap_or(Value::keyword(text)),
    }
}

fn is_number_token(token: &Token) -> bool {
    matches!(
        token.kind,
        TokenKind::Number | TokenKind::Percentage | TokenKind::Dimension
    )
}

fn starts_with_number(value: &TokenList) -> bool {
    value.front().is_some_and(is_number_token)
}

/// 从左括号之后开始，是否存在与之配对的右括号。
fn has_closing_paren(value: &TokenList) -> bool {
    let mut depth = 0usize;
    for token in value.iter() {
        match token.kind {
            TokenKind::ParenOpen => depth += 1,
            TokenKind::ParenClose if depth == 0 => return true,
            TokenKind::ParenClose => depth -= 1,
            _ => {}
        }
    }
    false
}

fn undefined_variable(at: &Token, key: &str) -> LessError {
    LessError::value(at, format!("未定义的变量 {key}"))
}
