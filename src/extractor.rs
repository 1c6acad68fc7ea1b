//! 英数字单词提取模块
//!
//! 从日文文本中找出需要转换为片假名的英数字单词。

use regex::Regex;
use std::collections::BTreeSet;

/// 字母开头、可带数字或点分数字后缀的单词，例如 `Ubuntu20.04`、`v1.2.3`、`Windows１０`
///
/// 字母只限ASCII；`\d` 按Unicode匹配，全角数字也算后缀。
const ALPHANUMERIC_PATTERN: &str = r"[a-zA-Z]+(?:\d+(?:\.\d+)*)?(?:\d+)?";
/// 纯字母单词
const ALPHABETIC_PATTERN: &str = r"[a-zA-Z]+";

/// 单词提取器
///
/// 对文本分别执行两次独立扫描，返回两组匹配结果的并集。
/// `abc123` 会同时产生 `abc123` 和 `abc`，两者都需要翻译和替换。
#[derive(Debug, Clone)]
pub struct TokenExtractor {
    alphanumeric: Regex,
    alphabetic: Regex,
}

impl TokenExtractor {
    pub fn new() -> Self {
        Self {
            // 两个模式都是编译期常量
            alphanumeric: Regex::new(ALPHANUMERIC_PATTERN).expect("valid alphanumeric pattern"),
            alphabetic: Regex::new(ALPHABETIC_PATTERN).expect("valid alphabetic pattern"),
        }
    }

    /// 提取去重后的单词集合，保留大小写。
    ///
    /// 返回 `BTreeSet`，迭代顺序固定，便于复现远程请求。
    pub fn extract(&self, text: &str) -> BTreeSet<String> {
        self.alphanumeric
            .find_iter(text)
            .chain(self.alphabetic.find_iter(text))
            .map(|m| m.as_str().to_string())
            .collect()
    }

    /// 按长度降序排列单词，长度相同时按字典序。
    ///
    /// 替换必须先处理长单词，否则 `abc` 会先破坏 `abc123`。
    pub fn longest_first<'a, I>(tokens: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut sorted: Vec<String> = tokens.into_iter().cloned().collect();
        sorted.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        sorted
    }
}

impl Default for TokenExtractor {
    fn default() -> Self {
        Self::new()
    }
}
