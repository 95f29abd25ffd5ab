/// 折叠连续空白为单个空格，并去掉首尾空白。
pub fn collapse_whitespace(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut pending_space = false;
    for ch in input.chars() {
        if ch.is_whitespace() {
            pending_space = !result.is_empty();
        } else {
            if pending_space {
                result.push(' ');
                pending_space = false;
            }
            result.push(ch);
        }
    }
    result
}

pub fn indent(level: usize) -> String {
    "  ".repeat(level)
}

/// 去掉字符串两侧的引号，并还原被转义的同类引号。
///
/// 返回去掉引号后的文本以及使用的引号字符；没有引号时原样返回。
pub fn remove_quotes(text: &str) -> (String, Option<char>) {
    let mut chars = text.chars();
    let quote = match chars.next() {
        Some(q @ ('"' | '\'')) if text.len() >= 2 && text.ends_with(q) => q,
        _ => return (text.to_string(), None),
    };
    let inner = &text[1..text.len() - 1];
    let mut result = String::with_capacity(inner.len());
    let mut iter = inner.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\\' && iter.peek() == Some(&quote) {
            continue;
        }
        result.push(ch);
    }
    (result, Some(quote))
}

/// 用给定引号包裹文本，转义其中的同类引号。
pub fn add_quotes(text: &str, quote: char) -> String {
    let mut result = String::with_capacity(text.len() + 2);
    result.push(quote);
    for ch in text.chars() {
        if ch == quote {
            result.push('\\');
        }
        result.push(ch);
    }
    result.push(quote);
    result
}

/// URL 编码 `escape()` 需要处理的字符。
pub fn url_escape(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            ' ' | '#' | '^' | '(' | ')' | '{' | '}' | '|' | ':' | '>' | '<' | ';' | ']' | '['
            | '=' => result.push_str(&format!("%{:02X}", ch as u32)),
            _ => result.push(ch),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapse_keeps_single_spaces() {
        assert_eq!(collapse_whitespace("  .a \n\t .b  "), ".a .b");
    }

    #[test]
    fn quotes_are_removed_and_restored() {
        assert_eq!(
            remove_quotes("\"a\\\"b\""),
            ("a\"b".to_string(), Some('"'))
        );
        assert_eq!(remove_quotes("plain"), ("plain".to_string(), None));
        assert_eq!(add_quotes("a\"b", '"'), "\"a\\\"b\"");
    }

    #[test]
    fn escape_encodes_reserved_characters() {
        assert_eq!(url_escape("a=1 (b)"), "a%3D1%20%28b%29");
    }
}
