use crate::{utok, Bpe, Error, Method, Resources, Result, Scheme};
use regex::{Regex, RegexBuilder};
use std::{collections::HashMap, ops::Deref, slice::from_ref};

pub struct Tokeneer<M> {
    method: M,
    special: HashMap<String, TokenSeq>,
    special_regex: Option<Regex>,
}

#[derive(PartialEq, Debug)]
enum TokenSeq {
    Single(utok),
    Multi(Box<[utok]>),
}

impl Deref for TokenSeq {
    type Target = [utok];
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::Single(t) => from_ref(t),
            Self::Multi(t) => t,
        }
    }
}

impl<M: Method> Tokeneer<M> {
    pub fn new(method: M) -> Self {
        let special = method
            .internal_special()
            .into_iter()
            .filter(|(k, _)| k.is_ascii())
            .map(|(k, v)| (k.to_string(), TokenSeq::Single(v)))
            .collect::<HashMap<_, _>>();
        // 内置特殊词是固定的 ASCII 字面量，编译失败只会关闭特殊词识别
        let special_regex =
            build_pattern(special.keys(), SPECIAL_SIZE_LIMIT).unwrap_or_else(|e| {
                log::warn!("special tokens disabled: {e}");
                None
            });
        Self {
            method,
            special,
            special_regex,
        }
    }

    /// 编码文本。特殊词与普通文本一样处理。
    pub fn encode(&self, text: &str) -> Result<Vec<utok>> {
        let mut ans = Vec::new();
        self.method.encode(text, &mut ans)?;
        Ok(ans)
    }

    /// 编码文本，并将其中出现的特殊词直接转换为对应的 token。
    pub fn encode_with_special(&self, text: &str) -> Result<Vec<utok>> {
        let mut ans = Vec::new();
        let mut start = 0;
        if let Some(regex) = &self.special_regex {
            for m in regex.find_iter(text) {
                self.method.encode(&text[start..m.start()], &mut ans)?;
                ans.extend_from_slice(&self.special[m.as_str()]);
                start = m.end();
            }
        }
        self.method.encode(&text[start..], &mut ans)?;
        Ok(ans)
    }

    /// 编码后的 token 数。
    #[inline]
    pub fn count(&self, text: &str) -> Result<usize> {
        self.encode(text).map(|tokens| tokens.len())
    }

    /// 解码为原始字节，不检查 UTF-8 的完整性。
    pub fn decode_bytes(&self, tokens: &[utok]) -> Result<Vec<u8>> {
        let mut ans = Vec::new();
        for &t in tokens {
            self.method.decode(t, &mut ans)?;
        }
        Ok(ans)
    }

    pub fn decode(&self, tokens: &[utok]) -> Result<String> {
        Ok(String::from_utf8(self.decode_bytes(tokens)?)?)
    }

    #[inline]
    pub fn vocab_size(&self) -> usize {
        self.method.vocab_size()
    }
}

impl<M> Tokeneer<M> {
    /// 注册额外的特殊词。同一个特殊词不能对应不同的 token 序列。
    ///
    /// 任何一个特殊词冲突或匹配正则无法构造时，不注册任何特殊词。
    pub fn extend_special(
        &mut self,
        patterns: impl IntoIterator<Item = (String, Vec<utok>)>,
    ) -> Result<()> {
        let mut added = HashMap::<String, Box<[utok]>>::new();
        for (k, v) in patterns {
            let same = match self.special.get(&k) {
                Some(seq) => Some(**seq == *v),
                None => added.get(&k).map(|seq| **seq == *v),
            };
            match same {
                Some(true) => {}
                Some(false) => return Err(Error::SpecialConflict(k)),
                None => {
                    added.insert(k, v.into_boxed_slice());
                }
            }
        }
        if added.is_empty() {
            return Ok(());
        }

        let regex = build_pattern(self.special.keys().chain(added.keys()), SPECIAL_SIZE_LIMIT)?;
        self.special
            .extend(added.into_iter().map(|(k, v)| (k, TokenSeq::Multi(v))));
        self.special_regex = regex;
        Ok(())
    }

    /// 已注册的特殊词。
    pub fn special(&self) -> impl Iterator<Item = (&str, &[utok])> + '_ {
        self.special.iter().map(|(k, v)| (k.as_str(), &**v))
    }

    #[inline]
    pub fn internal(&self) -> &M {
        &self.method
    }
}

impl Tokeneer<Bpe> {
    /// 按方案名构造编码器，资源来自 [`Scheme::default_resources`]。
    pub fn from_scheme(name: &str) -> Result<Self> {
        let scheme = name.parse::<Scheme>()?;
        Self::from_resources(scheme, &*scheme.default_resources())
    }

    pub fn from_resources(scheme: Scheme, resources: &(impl Resources + ?Sized)) -> Result<Self> {
        Ok(Self::new(Bpe::from_resources(scheme, resources)?))
    }

    #[inline]
    pub fn cache_len(&self) -> usize {
        self.method.cache_len()
    }

    #[inline]
    pub fn clear_cache(&self) {
        self.method.clear_cache()
    }
}

/// 特殊词正则编译后的大小上限，与 `regex` 的默认值相同。
const SPECIAL_SIZE_LIMIT: usize = 10 << 20;

/// 构造匹配所有特殊词的正则，较长的词优先。没有特殊词时返回 `None`。
fn build_pattern<'a>(
    text: impl IntoIterator<Item = &'a String>,
    size_limit: usize,
) -> Result<Option<Regex>> {
    let mut words = text.into_iter().collect::<Vec<_>>();
    if words.is_empty() {
        return Ok(None);
    }
    words.sort_unstable_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

    let pattern = words
        .into_iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    Ok(Some(RegexBuilder::new(&pattern).size_limit(size_limit).build()?))
}
