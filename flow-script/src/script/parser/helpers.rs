//! # 辅助解析函数
//!
//! 属性表中字符串的去引号与反转义。

/// 反转义单个字符
///
/// `\a\b\f\n\r\t\v` 转为对应控制字符，其余字符原样保留。
fn escape_char(c: char) -> char {
    match c {
        'a' => '\u{07}',
        'b' => '\u{08}',
        'f' => '\u{0C}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{0B}',
        other => other,
    }
}

/// 处理字符串中的反斜杠转义
///
/// 输入: `a\tb\'c`
/// 输出: `a<TAB>b'c`
pub fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;
    for c in s.chars() {
        if escaped {
            out.push(escape_char(c));
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else {
            out.push(c);
        }
    }
    out
}

/// 去掉成对的单/双引号并反转义；未加引号的内容原样返回
pub fn unquote(s: &str) -> String {
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if (first == '\'' || first == '"') && first == last => {
            escape_string(chars.as_str())
        }
        _ => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string(r"a\tb"), "a\tb");
        assert_eq!(escape_string(r"\a\b\f\n\r\v"), "\u{07}\u{08}\u{0C}\n\r\u{0B}");
        // 其他转义保留字符本身
        assert_eq!(escape_string(r#"\'\"\\\q"#), "'\"\\q");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("'hello world'"), "hello world");
        assert_eq!(unquote(r#""a\nb""#), "a\nb");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("'mismatch\""), "'mismatch\"");
        assert_eq!(unquote("'"), "'");
        assert_eq!(unquote(""), "");
    }
}
