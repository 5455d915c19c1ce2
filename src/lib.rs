#![deny(warnings)]

mod bpe;
mod error;
mod pretokenizer;
mod resources;
mod tokeneer;
mod vocab;

pub mod byte_map;

pub use bpe::{Bpe, MergeState};
pub use error::{Error, ErrorKind, Result};
pub use pretokenizer::{Chunk, Chunks, Pretokenizer, BACKTRACK_LIMIT, GPT2_PATTERN};
pub use resources::{Directory, Resources, Scheme, RESOURCE_DIR_ENV};
pub use tokeneer::Tokeneer;
pub use vocab::Vocabulary;

#[cfg(feature = "embedded")]
pub use resources::Embedded;

/// `utok` for token id.
#[allow(non_camel_case_types)]
pub type utok = u32;

/// GPT-2/GPT-3 字节级 BPE 编码器。
pub type Encoder = Tokeneer<Bpe>;

pub trait Method {
    fn vocab_size(&self) -> usize;
    fn internal_special(&self) -> impl IntoIterator<Item = (&str, utok)>;
    /// 编码一段不含特殊词的文本，结果追加到 `ans`。
    fn encode(&self, text: &str, ans: &mut Vec<utok>) -> Result<()>;
    /// 解码单个 token，字节追加到 `buf`。
    fn decode(&self, token: utok, buf: &mut Vec<u8>) -> Result<()>;
}
