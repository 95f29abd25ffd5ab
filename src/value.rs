//! 求值过程中的类型化值，以及值之间的运算。

use crate::color::{format_float, Color};
use crate::token::{Token, TokenKind, TokenList};
use crate::utils::{add_quotes, remove_quotes};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use thiserror::Error;

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?(?:\d+\.?\d*|\.\d+))(%|[a-zA-Z]+)?$").expect("数字正则编译失败")
});

const UNITS: &[&str] = &[
    "em", "ex", "ch", "rem", "vw", "vh", "vmin", "vmax", "px", "in", "mm", "cm", "pt", "pc",
    "m", "s", "ms", "rad", "deg", "grad", "turn", "dpi", "dpcm", "dppx", "hz", "khz",
];

pub fn is_unit(text: &str) -> bool {
    UNITS.contains(&text.to_ascii_lowercase().as_str())
}

/// 值运算失败的原因。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("除数不能为 0")]
    DivisionByZero,
    #[error("不能用 {0} 减去或除以颜色")]
    ColorOperand(&'static str),
    #[error("{lhs} 与 {rhs} 之间不支持运算 `{op}`")]
    Unsupported {
        op: Operator,
        lhs: &'static str,
        rhs: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Equals,
    LessThan,
    GreaterThan,
    LessOrEqual,
    GreaterOrEqual,
}

impl Operator {
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "+" => Operator::Add,
            "-" => Operator::Subtract,
            "*" => Operator::Multiply,
            "/" => Operator::Divide,
            "=" => Operator::Equals,
            "<" => Operator::LessThan,
            ">" => Operator::GreaterThan,
            "=<" | "<=" => Operator::LessOrEqual,
            ">=" => Operator::GreaterOrEqual,
            _ => return None,
        })
    }

    /// 数值越大结合得越紧。
    pub fn precedence(self) -> u8 {
        match self {
            Operator::Equals
            | Operator::LessThan
            | Operator::GreaterThan
            | Operator::LessOrEqual
            | Operator::GreaterOrEqual => 1,
            Operator::Add | Operator::Subtract => 2,
            Operator::Multiply | Operator::Divide => 3,
        }
    }

    fn is_comparison(self) -> bool {
        self.precedence() == 1
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Operator::Add => "+",
            Operator::Subtract => "-",
            Operator::Multiply => "*",
            Operator::Divide => "/",
            Operator::Equals => "=",
            Operator::LessThan => "<",
            Operator::GreaterThan => ">",
            Operator::LessOrEqual => "=<",
            Operator::GreaterOrEqual => ">=",
        };
        f.write_str(text)
    }
}

/// 带单位的数字。`unit` 为空表示纯数字，为 `%` 表示百分比。
#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub value: f64,
    pub unit: String,
}

impl Number {
    pub fn new<S: Into<String>>(value: f64, unit: S) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let caps = NUMBER_RE.captures(text)?;
        let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
        let unit = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        Some(Self::new(value, unit))
    }

    pub fn is_percentage(&self) -> bool {
        self.unit == "%"
    }

    /// 百分比按 0–1 返回，纯数字也按百分数理解。
    pub fn as_ratio(&self) -> f64 {
        self.value / 100.0
    }

    fn kind(&self) -> TokenKind {
        match self.unit.as_str() {
            "" => TokenKind::Number,
            "%" => TokenKind::Percentage,
            _ => TokenKind::Dimension,
        }
    }

    fn combine_unit(&self, other: &Number) -> String {
        if self.unit.is_empty() {
            other.unit.clone()
        } else {
            self.unit.clone()
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", format_float(self.value), self.unit)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(Number),
    /// 单独出现的单位名，如 `px`。
    Unit(String),
    Color(Color),
    /// `quote` 为 `None` 时是未加引号的字符串（关键字或转义结果）。
    String {
        text: String,
        quote: Option<char>,
    },
    Url {
        url: String,
        quote: Option<char>,
    },
    Boolean(bool),
}

impl Value {
    pub fn number<S: Into<String>>(value: f64, unit: S) -> Self {
        Value::Number(Number::new(value, unit))
    }

    pub fn keyword<S: Into<String>>(text: S) -> Self {
        Value::String {
            text: text.into(),
            quote: None,
        }
    }

    pub fn quoted<S: Into<String>>(text: S, quote: char) -> Self {
        Value::String {
            text: text.into(),
            quote: Some(quote),
        }
    }

    /// 从源码文本（带引号）构造字符串值。
    pub fn from_string_literal(text: &str) -> Self {
        let (text, quote) = remove_quotes(text);
        Value::String { text, quote }
    }

    /// 从 `url(...)` 文本构造 url 值。
    pub fn from_url_literal(text: &str) -> Self {
        let inner = text
            .find('(')
            .map(|start| &text[start + 1..text.len().saturating_sub(1)])
            .unwrap_or(text)
            .trim();
        let (url, quote) = remove_quotes(inner);
        Value::Url { url, quote }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(n) if n.unit.is_empty() => "Number",
            Value::Number(n) if n.is_percentage() => "Percentage",
            Value::Number(_) => "Dimension",
            Value::Unit(_) => "Unit",
            Value::Color(_) => "Color",
            Value::String { .. } => "String",
            Value::Url { .. } => "Url",
            Value::Boolean(_) => "Boolean",
        }
    }

    /// 输出到 CSS 的文本。
    pub fn to_css(&self) -> String {
        match self {
            Value::Number(n) => n.to_string(),
            Value::Unit(unit) => unit.clone(),
            Value::Color(color) => color.to_css(),
            Value::String { text, quote } => match quote {
                Some(q) => add_quotes(text, *q),
                None => text.clone(),
            },
            Value::Url { url, quote } => match quote {
                Some(q) => format!("url({})", add_quotes(url, *q)),
                None => format!("url({url})"),
            },
            Value::Boolean(b) => b.to_string(),
        }
    }

    /// 转回 token 序列，位置取自 `at`。
    pub fn to_tokens(&self, at: &Token) -> TokenList {
        let kind = match self {
            Value::Number(n) => n.kind(),
            Value::Unit(_) | Value::Boolean(_) => TokenKind::Identifier,
            Value::Color(c) => match &c.source {
                Some(source) if !source.starts_with('#') => TokenKind::Identifier,
                _ if c.source.is_none() && c.a < 1.0 => TokenKind::Identifier,
                _ => TokenKind::Hash,
            },
            Value::String { quote: Some(_), .. } => TokenKind::String,
            Value::String { quote: None, .. } => TokenKind::Identifier,
            Value::Url { .. } => TokenKind::Url,
        };
        TokenList::from(vec![Token::derived(kind, self.to_css(), at)])
    }

    /// 用于字符串格式化等场合的纯文本，字符串不带引号。
    pub fn to_plain(&self) -> String {
        match self {
            Value::String { text, .. } => text.clone(),
            other => other.to_css(),
        }
    }

    pub fn operate(&self, op: Operator, rhs: &Value) -> Result<Value, OperationError> {
        if op.is_comparison() {
            return self.compare(op, rhs);
        }
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => number_operation(op, a, b),
            (Value::Color(a), Value::Color(b)) => Ok(Value::Color(a.zip_channels(b, |x, y| {
                // 颜色按通道相除，除数为 0 的通道取上限
                if op == Operator::Divide && y == 0.0 {
                    if x > 0.0 {
                        255.0
                    } else {
                        0.0
                    }
                } else {
                    arithmetic(op, x, y)
                }
            }))),
            (Value::Color(c), Value::Number(n)) => {
                if op == Operator::Divide && n.value == 0.0 {
                    return Err(OperationError::DivisionByZero);
                }
                Ok(Value::Color(c.map_channels(|x| arithmetic(op, x, n.value))))
            }
            (Value::Number(_), Value::Color(_)) => match op {
                Operator::Add | Operator::Multiply => rhs.operate(op, self),
                _ => Err(OperationError::ColorOperand(self.type_name())),
            },
            _ => Err(OperationError::Unsupported {
                op,
                lhs: self.type_name(),
                rhs: rhs.type_name(),
            }),
        }
    }

    fn compare(&self, op: Operator, rhs: &Value) -> Result<Value, OperationError> {
        if op == Operator::Equals {
            return Ok(Value::Boolean(self.equals(rhs)));
        }
        let (Value::Number(a), Value::Number(b)) = (self, rhs) else {
            return Err(OperationError::Unsupported {
                op,
                lhs: self.type_name(),
                rhs: rhs.type_name(),
            });
        };
        let result = match op {
            Operator::LessThan => a.value < b.value,
            Operator::GreaterThan => a.value > b.value,
            Operator::LessOrEqual => a.value <= b.value,
            _ => a.value >= b.value,
        };
        Ok(Value::Boolean(result))
    }

    fn equals(&self, rhs: &Value) -> bool {
        match (self, rhs) {
            (Value::Number(a), Value::Number(b)) => {
                a.value == b.value && (a.unit == b.unit || a.unit.is_empty() || b.unit.is_empty())
            }
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::String { text: a, .. }, Value::String { text: b, .. }) => a == b,
            (Value::Unit(a), Value::Unit(b)) => a.eq_ignore_ascii_case(b),
            (Value::Url { url: a, .. }, Value::Url { url: b, .. }) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

fn number_operation(op: Operator, a: &Number, b: &Number) -> Result<Value, OperationError> {
    if op == Operator::Divide && b.value == 0.0 {
        return Err(OperationError::DivisionByZero);
    }
    Ok(Value::Number(Number::new(
        arithmetic(op, a.value, b.value),
        a.combine_unit(b),
    )))
}

fn arithmetic(op: Operator, a: f64, b: f64) -> f64 {
    match op {
        Operator::Add => a + b,
        Operator::Subtract => a - b,
        Operator::Multiply => a * b,
        _ => a / b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(text: &str) -> Value {
        Value::Number(Number::parse(text).unwrap())
    }

    #[test]
    fn unit_comes_from_first_operand_with_one() {
        let sum = num("2").operate(Operator::Add, &num("3px")).unwrap();
        assert_eq!(sum.to_css(), "5px");
        let product = num("2em").operate(Operator::Multiply, &num("3px")).unwrap();
        assert_eq!(product.to_css(), "6em");
    }

    #[test]
    fn division_by_zero_is_rejected() {
        let err = num("4px").operate(Operator::Divide, &num("0")).unwrap_err();
        assert_eq!(err, OperationError::DivisionByZero);
    }

    #[test]
    fn numbers_commute_with_colors_for_add_and_multiply() {
        let color = Value::Color(Color::from_hash("#102030").unwrap());
        let sum = num("16").operate(Operator::Add, &color).unwrap();
        assert_eq!(sum.to_css(), "#203040");
        assert!(num("16").operate(Operator::Subtract, &color).is_err());
        assert!(num("16").operate(Operator::Divide, &color).is_err());
    }

    #[test]
    fn colors_divide_per_channel() {
        let white = Value::Color(Color::from_hash("#ffffff").unwrap());
        let red = Value::Color(Color::from_hash("#ff0000").unwrap());
        let quotient = white.operate(Operator::Divide, &red).unwrap();
        assert_eq!(quotient.to_css(), "#01ffff");
        let half = Value::Color(Color::from_hash("#804020").unwrap())
            .operate(Operator::Divide, &Value::Color(Color::from_hash("#020202").unwrap()))
            .unwrap();
        assert_eq!(half.to_css(), "#402010");
    }

    #[test]
    fn comparisons_produce_booleans() {
        let lt = num("2").operate(Operator::LessThan, &num("3")).unwrap();
        assert_eq!(lt, Value::Boolean(true));
        let eq = Value::keyword("dark")
            .operate(Operator::Equals, &Value::quoted("dark", '"'))
            .unwrap();
        assert_eq!(eq, Value::Boolean(true));
        assert!(Value::keyword("a")
            .operate(Operator::LessThan, &Value::keyword("b"))
            .is_err());
    }

    #[test]
    fn strings_only_support_equality() {
        let err = Value::keyword("a").operate(Operator::Add, &num("1"));
        assert!(matches!(err, Err(OperationError::Unsupported { .. })));
    }

    #[test]
    fn formats_numbers_without_trailing_zeros() {
        assert_eq!(num("1.50px").to_css(), "1.5px");
        assert_eq!(
            num("10px").operate(Operator::Divide, &num("3")).unwrap().to_css(),
            "3.3333px"
        );
    }

    #[test]
    fn url_literals_keep_their_quotes() {
        let url = Value::from_url_literal("url('img/a.png')");
        assert_eq!(url.to_css(), "url('img/a.png')");
    }
}
