use crate::token::{SourcePosition, Token};
use std::path::PathBuf;
use thiserror::Error;

/// 编译过程中统一的错误类型。所有致命错误都会携带来源、行列号与出错的文本。
#[derive(Debug, Error)]
pub enum LessError {
    #[error("{position} 解析失败: 遇到 `{found}`，期待 {expected}")]
    ParseError {
        found: String,
        expected: String,
        position: SourcePosition,
    },
    #[error("{position} 求值失败: `{found}`: {message}")]
    ValueError {
        found: String,
        message: String,
        position: SourcePosition,
    },
    #[error("{position} 检测到循环调用的 mixin: {mixin}")]
    CyclicMixin {
        mixin: String,
        position: SourcePosition,
    },
    #[error("读取文件 {} 失败: {source}", .path.display())]
    IoError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type LessResult<T> = Result<T, LessError>;

impl LessError {
    pub fn parse<S: Into<String>>(token: &Token, expected: S) -> Self {
        LessError::ParseError {
            found: token.found_text(),
            expected: expected.into(),
            position: token.position(),
        }
    }

    /// 语句级别的解析失败，`found` 为整条语句的文本。
    pub fn parse_statement<F, S>(found: F, expected: S, position: SourcePosition) -> Self
    where
        F: Into<String>,
        S: Into<String>,
    {
        LessError::ParseError {
            found: found.into(),
            expected: expected.into(),
            position,
        }
    }

    pub fn value<S: Into<String>>(token: &Token, message: S) -> Self {
        LessError::ValueError {
            found: token.found_text(),
            message: message.into(),
            position: token.position(),
        }
    }

    pub fn cyclic<S: Into<String>>(mixin: S, position: SourcePosition) -> Self {
        LessError::CyclicMixin {
            mixin: mixin.into(),
            position,
        }
    }

    pub fn is_parse(&self) -> bool {
        matches!(self, LessError::ParseError { .. })
    }

    pub fn is_value(&self) -> bool {
        matches!(self, LessError::ValueError { .. })
    }

    pub fn is_cyclic(&self) -> bool {
        matches!(self, LessError::CyclicMixin { .. })
    }
}
