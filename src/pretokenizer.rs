//! 按 GPT-2 的预分词规则把文本切分为互不重叠、首尾相接的片段。

use crate::Result;
use fancy_regex::{Regex, RegexBuilder};
use std::ops::Range;

/// GPT-2/GPT-3 预分词模式。
///
/// 按优先级依次匹配：缩写后缀、可带一个前导空格的字母串、数字串、符号串，
/// 不后随非空白字符的空白串，以及其他空白串。
pub const GPT2_PATTERN: &str =
    r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+(?!\S)|\s+";

/// 与 [`GPT2_PATTERN`] 等价但不含前瞻的模式。
///
/// `\s+(?!\S)` 由匹配后归还空白串的最后一个字符实现。
/// 前瞻会让整个模式进入回溯引擎，而回溯栈随空白串长度增长且有固定上限。
const GPT2_SPLIT: &str = r"'s|'t|'re|'ve|'m|'ll|'d| ?\p{L}+| ?\p{N}+| ?[^\s\p{L}\p{N}]+|\s+";

/// 自定义模式的默认回溯次数上限。
pub const BACKTRACK_LIMIT: usize = 100_000_000;

#[derive(Clone, Debug)]
pub struct Pretokenizer {
    regex: Regex,
    /// 后随非空白字符的空白串把最后一个字符留给下一个片段
    yield_last_space: bool,
}

/// 预分词产生的一个片段。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Chunk<'t> {
    /// 片段在原文中的字节偏移
    pub offset: usize,
    pub text: &'t str,
}

impl Chunk<'_> {
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.text.len()
    }
}

impl Pretokenizer {
    pub fn new() -> Result<Self> {
        Self::with_pattern(GPT2_PATTERN)
    }

    /// 使用自定义模式构造。模式编译失败属于配置错误。
    #[inline]
    pub fn with_pattern(pattern: &str) -> Result<Self> {
        Self::with_backtrack_limit(pattern, BACKTRACK_LIMIT)
    }

    /// 指定回溯引擎的回溯次数上限。超限时 [`Chunks`] 产生 [`Error::Pattern`](crate::Error::Pattern)。
    pub fn with_backtrack_limit(pattern: &str, limit: usize) -> Result<Self> {
        let gpt2 = pattern == GPT2_PATTERN;
        let source = if gpt2 { GPT2_SPLIT } else { pattern };
        Ok(Self {
            regex: RegexBuilder::new(source).backtrack_limit(limit).build()?,
            yield_last_space: gpt2,
        })
    }

    #[inline]
    pub fn pattern(&self) -> &str {
        if self.yield_last_space {
            GPT2_PATTERN
        } else {
            self.regex.as_str()
        }
    }

    /// 惰性切分 `text`。每次调用都从头开始产生片段。
    #[inline]
    pub fn split<'r, 't>(&'r self, text: &'t str) -> Chunks<'r, 't> {
        Chunks {
            pretokenizer: self,
            text,
            pos: 0,
            pending: None,
        }
    }

    /// 从 `from` 开始查找下一个非空匹配。
    fn find(&self, text: &str, mut from: usize) -> Result<Option<Range<usize>>> {
        loop {
            let Some(m) = self.regex.find_from_pos(text, from)? else {
                return Ok(None);
            };
            let mut range = m.range();

            if range.is_empty() {
                match text[range.end..].chars().next() {
                    Some(c) => {
                        from = range.end + c.len_utf8();
                        continue;
                    }
                    None => return Ok(None),
                }
            }

            // 只有空白串分支会匹配出全为空白的片段
            if self.yield_last_space && range.end < text.len() {
                let piece = m.as_str();
                if piece.chars().all(char::is_whitespace) {
                    if let Some((last, _)) = piece.char_indices().next_back().filter(|&(i, _)| i > 0)
                    {
                        range.end = range.start + last;
                    }
                }
            }
            return Ok(Some(range));
        }
    }
}

pub struct Chunks<'r, 't> {
    pretokenizer: &'r Pretokenizer,
    text: &'t str,
    /// 已产生片段的末尾
    pos: usize,
    /// 模式跳过了一段文本时，先产生空隙，再产生暂存的匹配
    pending: Option<Range<usize>>,
}

impl<'t> Chunks<'_, 't> {
    fn emit(&mut self, range: Range<usize>) -> Chunk<'t> {
        let text = self.text;
        self.pos = range.end;
        Chunk {
            offset: range.start,
            text: &text[range],
        }
    }
}

impl<'t> Iterator for Chunks<'_, 't> {
    type Item = Result<Chunk<'t>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(range) = self.pending.take() {
            return Some(Ok(self.emit(range)));
        }
        if self.pos >= self.text.len() {
            return None;
        }
        match self.pretokenizer.find(self.text, self.pos) {
            Ok(Some(range)) if range.start == self.pos => Some(Ok(self.emit(range))),
            Ok(Some(range)) => {
                let gap = self.pos..range.start;
                self.pending = Some(range);
                Some(Ok(self.emit(gap)))
            }
            Ok(None) => Some(Ok(self.emit(self.pos..self.text.len()))),
            Err(e) => {
                // 引擎出错后不再产生片段
                self.pos = self.text.len();
                Some(Err(e))
            }
        }
    }
}
