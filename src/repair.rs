//! 模型输出的宽松JSON解析
//!
//! 模型经常返回带代码块标记的内容、Python字典写法（单引号、`True`/`None`）、
//! 多余的尾逗号或缺失的右括号。这里先按严格JSON解析，失败后修复再解析一次。

use crate::error::{Result, TranslationError};
use crate::types::TranslationMap;
use serde_json::{Map, Value};
use tracing::debug;

/// 从模型回复中解析出一个 `单词 -> 读法` 对象
pub fn parse_object(response: &str) -> Result<TranslationMap> {
    let candidate = isolate_object(response).ok_or_else(|| {
        TranslationError::ParseError(format!("no object found in model response: {}", preview(response)))
    })?;

    let map = match serde_json::from_str::<Map<String, Value>>(candidate) {
        Ok(map) => map,
        Err(strict_err) => {
            let repaired = repair(candidate);
            debug!("Strict parse failed ({}), retrying with repaired text: {}", strict_err, repaired);
            serde_json::from_str::<Map<String, Value>>(&repaired).map_err(|e| {
                TranslationError::ParseError(format!(
                    "unrepairable model response ({}): {}",
                    e,
                    preview(response)
                ))
            })?
        }
    };

    Ok(into_translation_map(map))
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

/// 去掉 Markdown 代码块标记，保留第一个代码块内部
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    match text.split("```").nth(1) {
        Some(inner) => inner.trim_start_matches(|c: char| c.is_ascii_alphanumeric()).trim(),
        None => text,
    }
}

/// 截取第一个 `{` 到最后一个 `}`；缺少右括号时截到末尾，交给修复步骤补齐
fn isolate_object(text: &str) -> Option<&str> {
    let text = strip_code_fence(text);
    let start = text.find('{')?;
    match text.rfind('}') {
        Some(end) if end > start => Some(&text[start..=end]),
        _ => Some(&text[start..]),
    }
}

fn into_translation_map(map: Map<String, Value>) -> TranslationMap {
    map.into_iter()
        .filter_map(|(word, value)| match value {
            Value::String(reading) => Some((word, reading)),
            Value::Number(n) => Some((word, n.to_string())),
            Value::Bool(b) => Some((word, b.to_string())),
            other => {
                debug!("Dropping non-scalar reading for {}: {}", word, other);
                None
            }
        })
        .collect()
}

fn repair(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' | '\'' => {
                i = copy_string(&chars, i, &mut out);
                continue;
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                // 不匹配的右括号直接丢弃
                if closers.last() == Some(&c) {
                    closers.pop();
                    out.push(c);
                }
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, None | Some('}') | Some(']')) {
                    out.push(c);
                }
            }
            c if starts_bare_word(c) => {
                // 未加引号的键或值，一直读到下一个结构字符
                let start = i;
                while i < chars.len() && !ends_bare_word(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.trim_end() {
                    "true" | "True" => out.push_str("true"),
                    "false" | "False" => out.push_str("false"),
                    "null" | "None" => out.push_str("null"),
                    bare => {
                        out.push('"');
                        for ch in bare.chars() {
                            match ch {
                                '\\' => out.push_str("\\\\"),
                                '\t' => out.push_str("\\t"),
                                _ => out.push(ch),
                            }
                        }
                        out.push('"');
                    }
                }
                continue;
            }
            _ => out.push(c),
        }
        i += 1;
    }

    while let Some(closer) = closers.pop() {
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        if out.ends_with(',') || out.ends_with(':') {
            out.pop();
        }
        out.push(closer);
    }

    out
}

/// 数字、空白和结构字符之外的字符开始一个裸词
fn starts_bare_word(c: char) -> bool {
    !c.is_whitespace() && !ends_bare_word(c) && !c.is_ascii_digit() && !matches!(c, '-' | '+' | '.')
}

fn ends_bare_word(c: char) -> bool {
    matches!(c, '{' | '}' | '[' | ']' | ',' | ':' | '"' | '\'' | '\n' | '\r')
}

/// 把单引号或双引号字符串复制为合法的JSON字符串，返回结束引号之后的位置
fn copy_string(chars: &[char], start: usize, out: &mut String) -> usize {
    let quote = chars[start];
    out.push('"');
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\\' => {
                match chars.get(i + 1) {
                    Some('\'') => out.push('\''),
                    Some(&next) => {
                        out.push('\\');
                        out.push(next);
                    }
                    None => {}
                }
                i += 2;
                continue;
            }
            c if c == quote => {
                out.push('"');
                return i + 1;
            }
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
        i += 1;
    }

    // 未闭合的字符串
    out.push('"');
    i
}
