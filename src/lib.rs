//! less_oxide 库入口，提供面向 Rust 与 Node.js 的 LESS 编译能力。
//! 内部分为四个阶段：解析（Parser）→ 语义求值（Evaluator）→ 扩展传播 → CSS 序列化（Serializer）。

mod ast;
mod color;
mod context;
mod css;
mod error;
mod evaluator;
mod extension;
mod functions;
mod mixin;
mod parser;
mod processor;
mod selector;
mod serializer;
mod token;
mod tokenizer;
mod utils;
mod value;

pub use crate::ast::LessStylesheet;
pub use crate::context::ProcessingContext;
pub use crate::css::CssStylesheet;
pub use crate::error::{LessError, LessResult};
pub use crate::evaluator::Evaluator;
pub use crate::functions::FunctionLibrary;
pub use crate::parser::LessParser;
pub use crate::serializer::Serializer;
pub use crate::token::SourcePosition;

use std::fs;
use std::path::Path;

/// 错误信息中默认的来源标识。
pub const DEFAULT_SOURCE_NAME: &str = "<input>";

/// LESS 编译配置。
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// 是否输出压缩后的 CSS。
    pub minify: bool,
    /// 错误信息中的来源标识，缺省为 `<input>`。
    pub source_name: Option<String>,
}

/// 编译 LESS 源码为 CSS 文本。
///
/// # 参数
/// * `source` - 待编译的 LESS 字符串
/// * `options` - 编译配置
pub fn compile(source: &str, options: CompileOptions) -> LessResult<String> {
    let source_name = options.source_name.as_deref().unwrap_or(DEFAULT_SOURCE_NAME);
    let parser = LessParser::with_source_name(source_name);
    let document = parser.parse(source)?;

    let mut evaluator = Evaluator::new();
    let stylesheet = evaluator.evaluate(&document)?;

    let serializer = Serializer::new(options.minify);
    Ok(serializer.to_css(&stylesheet))
}

/// 从文件路径编译 LESS，文件路径作为错误信息中的来源标识。
pub fn compile_file<P: AsRef<Path>>(path: P, mut options: CompileOptions) -> LessResult<String> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| LessError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    if options.source_name.is_none() {
        options.source_name = Some(path.display().to_string());
    }
    compile(&source, options)
}

#[cfg(feature = "node")]
use napi::{Error, Result};
#[cfg(feature = "node")]
use napi_derive::napi;

/// Node.js 侧的编译选项对象。
#[cfg(feature = "node")]
#[napi(object)]
pub struct JsCompileOptions {
    /// 是否压缩输出 CSS。
    pub minify: Option<bool>,
    /// 源文件路径，用于错误信息。
    pub filename: Option<String>,
}

/// 暴露给 Node.js 的编译函数。
#[cfg(feature = "node")]
#[napi]
pub fn compile_less(source: String, options: Option<JsCompileOptions>) -> Result<String> {
    let opt = options.unwrap_or(JsCompileOptions {
        minify: None,
        filename: None,
    });
    let compile_options = CompileOptions {
        minify: opt.minify.unwrap_or(false),
        source_name: opt.filename,
    };
    let result =
        compile(&source, compile_options).map_err(|err| Error::from_reason(err.to_string()))?;
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minified() -> CompileOptions {
        CompileOptions {
            minify: true,
            ..CompileOptions::default()
        }
    }

    #[test]
    fn compile_basic_variable() {
        let src = r"@base: #111;
body {
  color: @base;
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("color: #111"));
    }

    #[test]
    fn compile_nested_selectors() {
        let src = r".btn {
  color: #fff;
  &:hover {
    color: #000;
  }
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains(".btn:hover"));
        assert!(css.contains("color: #000"));
    }

    #[test]
    fn compile_important_flag() {
        let src = r"@base: 10px;
.box {
  margin: @base !important;
}";
        let css = compile(src, minified()).unwrap();
        assert!(css.contains("margin:10px!important"));
        assert!(!css.contains("!important!important"));
    }

    #[test]
    fn compile_mixin_invocation() {
        let src = r".rounded(@radius) {
  border-radius: @radius;
}

.card {
  .rounded(8px);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("border-radius: 8px"));
        assert!(!css.contains(".rounded"));
    }

    #[test]
    fn compile_arithmetic_expression() {
        let src = r"@base: 10px;
.box {
  width: @base + 5px;
  padding: (@base * 2);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("width: 15px"));
        assert!(css.contains("padding: 20px"));
    }

    #[test]
    fn compile_multiple_arithmetic_segments() {
        let src = r"@spacing: 12px;
.box {
  padding: (@spacing * 0.75) (@spacing * 1.5);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("padding: 9px 18px"));
    }

    #[test]
    fn compile_color_functions() {
        let src = r"@brand: #336699;
.btn {
  background: lighten(@brand, 20%);
  border-color: darken(@brand, 10%);
  color: fade(#ffffff, 40%);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("background: #6699cc"));
        assert!(css.contains("border-color: #264c73"));
        assert!(css.contains("color: rgba(255, 255, 255, 0.4)"));
    }

    #[test]
    fn compile_mixin_with_default() {
        let src = r".shadow(@blur: 4px) {
  box-shadow: 0 0 @blur rgba(0, 0, 0, 0.2);
}

.panel {
  .shadow();
}

.toast {
  .shadow(8px);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains(".panel"));
        assert!(css.contains("box-shadow: 0 0 4px rgba(0, 0, 0, 0.2)"));
        assert!(css.contains("box-shadow: 0 0 8px rgba(0, 0, 0, 0.2)"));
    }

    #[test]
    fn compile_color_extremes() {
        let src = r"@white: #ffffff;
.banner {
  color: fade(@white, 50%);
  background: lighten(#000, 0%);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("color: rgba(255, 255, 255, 0.5)"));
        assert!(css.contains("background: #000000"));
    }

    #[test]
    fn compile_arithmetic_division_and_negative() {
        let src = r"@gap: 12px;
.grid {
  margin: -(@gap / 2);
  width: (@gap * -2);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("margin: -6px"));
        assert!(css.contains("width: -24px"));
    }

    #[test]
    fn compile_inline_color_function() {
        let src = r".shadow {
  box-shadow: 0 0 5px fade(#336699, 30%);
}";
        let css = compile(src, CompileOptions::default()).unwrap();
        assert!(css.contains("rgba(51, 102, 153, 0.3)"));
        assert!(!css.contains("fade("));
    }

    #[test]
    fn compile_import_statement() {
        let src = r#"@import "reset.css";
@color: #000;
body {
  color: @color;
}"#;
        let pretty = compile(src, CompileOptions::default()).unwrap();
        assert!(pretty.trim_start().starts_with("@import \"reset.css\";"));
        assert!(pretty.contains("body {"));

        let minified = compile(src, minified()).unwrap();
        assert!(minified.starts_with("@import \"reset.css\";"));
        assert!(minified.contains("body{color:#000}"));
    }

    #[test]
    fn errors_carry_the_source_name() {
        let err = compile(
            ".a { color: @missing; }",
            CompileOptions {
                source_name: Some("theme.less".to_string()),
                ..CompileOptions::default()
            },
        )
        .unwrap_err();
        assert!(err.is_value());
        assert!(err.to_string().starts_with("theme.less:1:"));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = compile_file("does/not/exist.less", CompileOptions::default()).unwrap_err();
        assert!(matches!(err, LessError::IoError { .. }));
    }
}
