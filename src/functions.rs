//! 内置函数表。每个函数带一个签名字符串，调用前按签名检查实参类型。
//!
//! 签名中的类型代码：
//!
//! | 代码 | 含义 |
//! |------|------|
//! | `N`  | 数字（任意单位） |
//! | `P`  | 百分比或纯数字 |
//! | `C`  | 颜色 |
//! | `S`  | 字符串 |
//! | `U`  | 单位（含未加引号的单位名） |
//! | `B`  | 布尔值 |
//! | `Q`  | url |
//! | `.`  | 任意值 |
//!
//! 代码后跟 `?` 表示可选，跟 `*` 表示重复零次或多次。

use crate::color::{self, Color};
use crate::utils::url_escape;
use crate::value::{is_unit, Number, Value};
use indexmap::IndexMap;

pub type NativeFunction = fn(&[Value]) -> Value;

#[derive(Clone, Copy)]
pub struct FunctionInfo {
    pub signature: &'static str,
    pub function: NativeFunction,
}

pub struct FunctionLibrary {
    functions: IndexMap<String, FunctionInfo>,
}

impl Default for FunctionLibrary {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FunctionLibrary {
    pub fn empty() -> Self {
        Self {
            functions: IndexMap::new(),
        }
    }

    pub fn with_builtins() -> Self {
        let mut library = Self::empty();
        library.register_color_functions();
        library.register_number_functions();
        library.register_type_functions();
        library.register_string_functions();
        library
    }

    /// 注册（或覆盖）一个函数，名称不区分大小写。
    pub fn register(&mut self, name: &str, signature: &'static str, function: NativeFunction) {
        self.functions.insert(
            name.to_ascii_lowercase(),
            FunctionInfo {
                signature,
                function,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&FunctionInfo> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 按签名检查实参。
    pub fn check_arguments(info: &FunctionInfo, args: &[Value]) -> bool {
        let codes: Vec<char> = info.signature.chars().collect();
        let mut arg = 0;
        let mut i = 0;
        while i < codes.len() {
            let code = codes[i];
            let modifier = codes.get(i + 1).copied().filter(|c| *c == '?' || *c == '*');
            i += if modifier.is_some() { 2 } else { 1 };
            match modifier {
                Some('*') => {
                    while arg < args.len() && matches_code(code, &args[arg]) {
                        arg += 1;
                    }
                }
                Some(_) => {
                    if arg < args.len() && matches_code(code, &args[arg]) {
                        arg += 1;
                    }
                }
                None => {
                    if arg >= args.len() || !matches_code(code, &args[arg]) {
                        return false;
                    }
                    arg += 1;
                }
            }
        }
        arg == args.len()
    }

    /// 把签名渲染成可读文本，用于错误信息，如 `lighten(Color, Percentage)`。
    pub fn signature_to_string(name: &str, info: &FunctionInfo) -> String {
        let mut parts = Vec::new();
        let mut chars = info.signature.chars().peekable();
        while let Some(code) = chars.next() {
            let mut part = code_name(code).to_string();
            if let Some(modifier) = chars.next_if(|c| *c == '?' || *c == '*') {
                part.push_str(if modifier == '?' { " (可选)" } else { " ..." });
            }
            parts.push(part);
        }
        format!("{name}({})", parts.join(", "))
    }

    fn register_color_functions(&mut self) {
        self.register("rgb", "NNN", |args| {
            Value::Color(Color::rgba(channel(args, 0), channel(args, 1), channel(args, 2), 1.0))
        });
        self.register("rgba", "NNNN", |args| {
            Value::Color(Color::rgba(
                channel(args, 0),
                channel(args, 1),
                channel(args, 2),
                alpha_at(args, 3),
            ))
        });
        self.register("hsl", "NPP", |args| {
            Value::Color(Color::from_hsla(
                hue_at(args, 0),
                ratio_at(args, 1),
                ratio_at(args, 2),
                1.0,
            ))
        });
        self.register("hsla", "NPPN", |args| {
            Value::Color(Color::from_hsla(
                hue_at(args, 0),
                ratio_at(args, 1),
                ratio_at(args, 2),
                alpha_at(args, 3),
            ))
        });
        self.register("lighten", "CP", |args| {
            Value::Color(color::lighten(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("darken", "CP", |args| {
            Value::Color(color::darken(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("saturate", "CP", |args| {
            Value::Color(color::saturate(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("desaturate", "CP", |args| {
            Value::Color(color::desaturate(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("fadein", "CP", |args| {
            Value::Color(color::fade_in(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("fadeout", "CP", |args| {
            Value::Color(color::fade_out(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("fade", "CP", |args| {
            Value::Color(color::fade(&color_at(args, 0), ratio_at(args, 1)))
        });
        self.register("spin", "CN", |args| {
            Value::Color(color::spin(&color_at(args, 0), number_at(args, 1)))
        });
        self.register("mix", "CCP?", |args| {
            let weight = if args.len() > 2 { ratio_at(args, 2) } else { 0.5 };
            Value::Color(color::mix(&color_at(args, 0), &color_at(args, 1), weight))
        });
        self.register("greyscale", "C", |args| {
            Value::Color(color::greyscale(&color_at(args, 0)))
        });
        self.register("contrast", "CC?C?P?", |args| {
            let dark = match args.get(1) {
                Some(Value::Color(c)) => c.clone(),
                _ => Color::rgba(0.0, 0.0, 0.0, 1.0),
            };
            let light = match args.get(2) {
                Some(Value::Color(c)) => c.clone(),
                _ => Color::rgba(255.0, 255.0, 255.0, 1.0),
            };
            let threshold = if args.len() > 3 { ratio_at(args, 3) } else { 0.43 };
            Value::Color(color::contrast(&color_at(args, 0), &dark, &light, threshold))
        });
        self.register("hue", "C", |args| {
            Value::number(color_at(args, 0).hue().round(), "")
        });
        self.register("saturation", "C", |args| {
            Value::number((color_at(args, 0).saturation() * 100.0).round(), "%")
        });
        self.register("lightness", "C", |args| {
            Value::number((color_at(args, 0).lightness() * 100.0).round(), "%")
        });
        self.register("red", "C", |args| Value::number(color_at(args, 0).r.round(), ""));
        self.register("green", "C", |args| Value::number(color_at(args, 0).g.round(), ""));
        self.register("blue", "C", |args| Value::number(color_at(args, 0).b.round(), ""));
        self.register("alpha", "C", |args| Value::number(color_at(args, 0).a, ""));
        self.register("argb", "C", |args| Value::keyword(color_at(args, 0).to_argb()));
        self.register("overlay", "CC", |args| {
            Value::Color(color::overlay(&color_at(args, 0), &color_at(args, 1)))
        });
        self.register("multiply", "CC", |args| {
            Value::Color(color::multiply(&color_at(args, 0), &color_at(args, 1)))
        });
        self.register("screen", "CC", |args| {
            Value::Color(color::screen(&color_at(args, 0), &color_at(args, 1)))
        });
    }

    fn register_number_functions(&mut self) {
        self.register("unit", "NU?", |args| {
            let unit = match args.get(1) {
                Some(Value::Unit(unit)) => unit.clone(),
                Some(Value::String { text, .. }) => text.clone(),
                _ => String::new(),
            };
            Value::number(number_at(args, 0), unit)
        });
        self.register("ceil", "N", |args| map_number(args, f64::ceil));
        self.register("floor", "N", |args| map_number(args, f64::floor));
        self.register("sqrt", "N", |args| map_number(args, f64::sqrt));
        self.register("abs", "N", |args| map_number(args, f64::abs));
        self.register("round", "NN?", |args| {
            let places = if args.len() > 1 { number_at(args, 1).max(0.0) } else { 0.0 };
            let factor = 10f64.powi(places as i32);
            map_number(args, |v| (v * factor).round() / factor)
        });
        self.register("percentage", "N", |args| {
            Value::number(number_at(args, 0) * 100.0, "%")
        });
    }

    fn register_type_functions(&mut self) {
        self.register("isnumber", ".", |args| {
            Value::Boolean(matches!(args.first(), Some(Value::Number(_))))
        });
        self.register("iscolor", ".", |args| {
            Value::Boolean(matches!(args.first(), Some(Value::Color(_))))
        });
        self.register("isstring", ".", |args| {
            Value::Boolean(matches!(args.first(), Some(Value::String { quote: Some(_), .. })))
        });
        self.register("iskeyword", ".", |args| {
            Value::Boolean(matches!(args.first(), Some(Value::String { quote: None, .. })))
        });
        self.register("isurl", ".", |args| {
            Value::Boolean(matches!(args.first(), Some(Value::Url { .. })))
        });
        self.register("ispixel", ".", |args| has_unit(args.first(), "px"));
        self.register("isem", ".", |args| has_unit(args.first(), "em"));
        self.register("ispercentage", ".", |args| has_unit(args.first(), "%"));
        self.register("isunit", ".U", |args| {
            let unit = match args.get(1) {
                Some(Value::Unit(unit)) => unit.as_str(),
                Some(Value::String { text, .. }) => text.as_str(),
                _ => "",
            };
            has_unit(args.first(), unit)
        });
    }

    fn register_string_functions(&mut self) {
        self.register("e", "S", |args| Value::keyword(string_at(args, 0)));
        self.register("escape", "S", |args| {
            Value::keyword(url_escape(&string_at(args, 0)))
        });
        self.register("%", "S.*", format_string);
    }
}

/// `%(format, args...)`：依次替换 `%d`、`%a`、`%s`，大写形式会对结果做 url 编码。
fn format_string(args: &[Value]) -> Value {
    let (format, quote) = match args.first() {
        Some(Value::String { text, quote }) => (text.as_str(), *quote),
        _ => ("", None),
    };
    let mut values = args.iter().skip(1);
    let mut result = String::with_capacity(format.len());
    let mut chars = format.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            result.push(ch);
            continue;
        }
        match chars.peek().copied() {
            Some(placeholder @ ('d' | 'a' | 's' | 'D' | 'A' | 'S')) => {
                chars.next();
                let Some(value) = values.next() else {
                    result.push('%');
                    result.push(placeholder);
                    continue;
                };
                let text = if placeholder.eq_ignore_ascii_case(&'s') {
                    value.to_plain()
                } else {
                    value.to_css()
                };
                if placeholder.is_ascii_uppercase() {
                    result.push_str(&url_escape(&text));
                } else {
                    result.push_str(&text);
                }
            }
            Some('%') => {
                chars.next();
                result.push('%');
            }
            _ => result.push('%'),
        }
    }
    Value::String {
        text: result,
        quote,
    }
}

fn matches_code(code: char, value: &Value) -> bool {
    match code {
        'N' => matches!(value, Value::Number(_)),
        'P' => matches!(value, Value::Number(n) if n.unit.is_empty() || n.is_percentage()),
        'C' => matches!(value, Value::Color(_)),
        'S' => matches!(value, Value::String { .. }),
        'U' => match value {
            Value::Unit(_) => true,
            Value::String { text, quote: None } => is_unit(text) || text == "%",
            _ => false,
        },
        'B' => matches!(value, Value::Boolean(_)),
        'Q' => matches!(value, Value::Url { .. }),
        _ => true,
    }
}

fn code_name(code: char) -> &'static str {
    match code {
        'N' => "Number",
        'P' => "Percentage",
        'C' => "Color",
        'S' => "String",
        'U' => "Unit",
        'B' => "Boolean",
        'Q' => "Url",
        _ => "Any",
    }
}

fn color_at(args: &[Value], idx: usize) -> Color {
    match args.get(idx) {
        Some(Value::Color(c)) => c.clone(),
        _ => Color::default(),
    }
}

fn number_at(args: &[Value], idx: usize) -> f64 {
    match args.get(idx) {
        Some(Value::Number(n)) => n.value,
        _ => 0.0,
    }
}

fn ratio_at(args: &[Value], idx: usize) -> f64 {
    match args.get(idx) {
        Some(Value::Number(n)) => n.as_ratio(),
        _ => 0.0,
    }
}

fn string_at(args: &[Value], idx: usize) -> String {
    args.get(idx).map(Value::to_plain).unwrap_or_default()
}

/// rgb 通道：百分比按 0–255 缩放。
fn channel(args: &[Value], idx: usize) -> f64 {
    match args.get(idx) {
        Some(Value::Number(n)) if n.is_percentage() => n.as_ratio() * 255.0,
        Some(Value::Number(n)) => n.value,
        _ => 0.0,
    }
}

/// alpha：百分比按 0–1 缩放，纯数字直接使用。
fn alpha_at(args: &[Value], idx: usize) -> f64 {
    match args.get(idx) {
        Some(Value::Number(n)) if n.is_percentage() => n.as_ratio(),
        Some(Value::Number(n)) => n.value,
        _ => 1.0,
    }
}

fn hue_at(args: &[Value], idx: usize) -> f64 {
    (number_at(args, idx) % 360.0 + 360.0) % 360.0 / 360.0
}

fn map_number(args: &[Value], op: impl Fn(f64) -> f64) -> Value {
    match args.first() {
        Some(Value::Number(n)) => Value::Number(Number::new(op(n.value), n.unit.clone())),
        _ => Value::number(0.0, ""),
    }
}

fn has_unit(value: Option<&Value>, unit: &str) -> Value {
    Value::Boolean(matches!(value, Some(Value::Number(n)) if n.unit.eq_ignore_ascii_case(unit)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn call(name: &str, args: &[Value]) -> Option<Value> {
        let library = FunctionLibrary::with_builtins();
        let info = library.get(name)?;
        FunctionLibrary::check_arguments(info, args).then(|| (info.function)(args))
    }

    fn hex(text: &str) -> Value {
        Value::Color(Color::from_hash(text).unwrap())
    }

    #[test]
    fn signatures_accept_optional_and_repeated_arguments() {
        let library = FunctionLibrary::with_builtins();
        let mix = library.get("mix").unwrap();
        assert!(FunctionLibrary::check_arguments(mix, &[hex("#fff"), hex("#000")]));
        assert!(FunctionLibrary::check_arguments(
            mix,
            &[hex("#fff"), hex("#000"), Value::number(20.0, "%")]
        ));
        assert!(!FunctionLibrary::check_arguments(mix, &[hex("#fff")]));

        let format = library.get("%").unwrap();
        assert!(FunctionLibrary::check_arguments(
            format,
            &[Value::quoted("%d", '"'), Value::number(1.0, ""), Value::keyword("a")]
        ));
    }

    #[test]
    fn signature_mismatch_is_reported() {
        assert!(call("lighten", &[Value::number(1.0, ""), Value::number(2.0, "%")]).is_none());
        let library = FunctionLibrary::with_builtins();
        let info = library.get("lighten").unwrap();
        assert_eq!(
            FunctionLibrary::signature_to_string("lighten", info),
            "lighten(Color, Percentage)"
        );
    }

    #[test]
    fn color_functions_use_percentages() {
        let darker = call("darken", &[hex("#336699"), Value::number(10.0, "%")]).unwrap();
        assert_eq!(darker.to_css(), "#264c73");
        let faded = call("fade", &[hex("#ffffff"), Value::number(40.0, "%")]).unwrap();
        assert_eq!(faded.to_css(), "rgba(255, 255, 255, 0.4)");
        let rgb = call(
            "rgb",
            &[
                Value::number(255.0, ""),
                Value::number(0.0, ""),
                Value::number(0.0, ""),
            ],
        )
        .unwrap();
        assert_eq!(rgb.to_css(), "#ff0000");
    }

    #[test]
    fn number_functions_keep_units() {
        let rounded = call("round", &[Value::number(1.67, "px"), Value::number(1.0, "")]).unwrap();
        assert_eq!(rounded.to_css(), "1.7px");
        let converted = call("unit", &[Value::number(5.0, "px"), Value::keyword("rem")]).unwrap();
        assert_eq!(converted.to_css(), "5rem");
        let stripped = call("unit", &[Value::number(5.0, "px")]).unwrap();
        assert_eq!(stripped.to_css(), "5");
        let pct = call("percentage", &[Value::number(0.5, "")]).unwrap();
        assert_eq!(pct.to_css(), "50%");
    }

    #[test]
    fn type_tests_inspect_values() {
        assert_eq!(
            call("ispixel", &[Value::number(1.0, "px")]),
            Some(Value::Boolean(true))
        );
        assert_eq!(call("iscolor", &[Value::keyword("a")]), Some(Value::Boolean(false)));
        assert_eq!(
            call("isstring", &[Value::quoted("a", '"')]),
            Some(Value::Boolean(true))
        );
    }

    #[test]
    fn format_function_substitutes_placeholders() {
        let formatted = call(
            "%",
            &[
                Value::quoted("%d/%s", '"'),
                Value::number(10.0, "px"),
                Value::quoted("a b", '"'),
            ],
        )
        .unwrap();
        assert_eq!(formatted.to_css(), "\"10px/a b\"");
    }
}
