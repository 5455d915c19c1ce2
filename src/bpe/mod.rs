mod algorithm;

use crate::{byte_map, utok, Error, Method, Pretokenizer, Resources, Result, Scheme, Vocabulary};
use rustc_hash::FxHashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub use algorithm::MergeState;

/// GPT-2/GPT-3 字节级 BPE。
///
/// 文本先按预分词模式切成片段，每个片段的 UTF-8 字节逐个映射为可打印符号，
/// 再按合词排名贪心合并，最后在词表中查找每个词的 token。
pub struct Bpe {
    vocab: Vocabulary,
    pretokenizer: Pretokenizer,
    /// 符号串 -> 合并结果对应的 token 序列。只增不减，随实例销毁
    cache: Mutex<FxHashMap<Box<str>, Box<[utok]>>>,
}

impl Bpe {
    pub fn new(vocab: Vocabulary, pretokenizer: Pretokenizer) -> Self {
        Self {
            vocab,
            pretokenizer,
            cache: Default::default(),
        }
    }

    /// 从资源读取方案对应的词表与合词规则。
    pub fn from_resources(scheme: Scheme, resources: &(impl Resources + ?Sized)) -> Result<Self> {
        let [encoder, merges] = scheme.resource_names();
        let vocab = Vocabulary::new(
            &resources.read(encoder)?,
            &resources.read(merges)?,
            [encoder, merges],
        )?;
        log::info!("{scheme} tokenizer ready, {} tokens", vocab.len());
        Ok(Self::new(vocab, Pretokenizer::with_pattern(scheme.pattern())?))
    }

    #[inline]
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    #[inline]
    pub fn pretokenizer(&self) -> &Pretokenizer {
        &self.pretokenizer
    }

    /// 缓存中的片段数。
    pub fn cache_len(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear()
    }

    /// 合并一个符号串并追加其 token，不读写缓存。
    pub fn encode_symbols(&self, symbols: &str, ans: &mut Vec<utok>) -> Result<()> {
        let mut state = self.vocab.begin_merge(symbols);
        while state.merge() {}
        for piece in state.iter() {
            let token = self
                .vocab
                .id(piece)
                .ok_or_else(|| Error::UnknownPiece(piece.into()))?;
            ans.push(token);
        }
        Ok(())
    }

    fn encode_cached(&self, symbols: &str, ans: &mut Vec<utok>) -> Result<()> {
        if let Some(tokens) = self.lock_cache().get(symbols) {
            ans.extend_from_slice(tokens);
            return Ok(());
        }

        // 合并在锁外进行，并发时同一片段可能被重复计算，结果相同
        let start = ans.len();
        self.encode_symbols(symbols, ans)?;
        log::debug!("bpe cache miss: {symbols:?} -> {:?}", &ans[start..]);
        self.lock_cache()
            .insert(symbols.into(), ans[start..].into());
        Ok(())
    }

    fn lock_cache(&self) -> MutexGuard<'_, FxHashMap<Box<str>, Box<[utok]>>> {
        // 插入是原子的，中毒的锁中的表仍然完整
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Method for Bpe {
    #[inline]
    fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
    #[inline]
    fn internal_special(&self) -> impl IntoIterator<Item = (&str, utok)> {
        self.vocab.unreachable()
    }
    fn encode(&self, text: &str, ans: &mut Vec<utok>) -> Result<()> {
        for chunk in self.pretokenizer.split(text) {
            let symbols = byte_map::remap(chunk?.text.as_bytes());
            match symbols.chars().count() {
                0 => {}
                1 => self.encode_symbols(&symbols, ans)?,
                _ => self.encode_cached(&symbols, ans)?,
            }
        }
        Ok(())
    }
    fn decode(&self, token: utok, buf: &mut Vec<u8>) -> Result<()> {
        let piece = self.vocab.piece(token).ok_or(Error::InvalidToken(token))?;
        byte_map::restore(piece, buf)
    }
}
