//! 编码方案与资源读取。

use crate::{pretokenizer::GPT2_PATTERN, Error, Result};
use std::{
    borrow::Cow,
    collections::HashMap,
    fmt,
    hash::BuildHasher,
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

/// 设置后，[`Scheme`] 的资源从这个目录读取，而非内嵌资源。
pub const RESOURCE_DIR_ENV: &str = "BPE_RESOURCE_DIR";

/// 按名字读取资源内容。
pub trait Resources {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>>;
}

/// 编码方案：一组固定的词表和合词规则。
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Scheme {
    /// GPT-2 与 GPT-3 共用的 50257 词编码
    Gpt3,
}

impl Scheme {
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gpt3 => "gpt3",
        }
    }

    /// 词表与合词规则的资源名。
    #[inline]
    pub const fn resource_names(self) -> [&'static str; 2] {
        match self {
            Self::Gpt3 => ["encoder.json", "vocab.bpe"],
        }
    }

    #[inline]
    pub const fn pattern(self) -> &'static str {
        match self {
            Self::Gpt3 => GPT2_PATTERN,
        }
    }

    /// 方案的默认资源：环境变量 [`RESOURCE_DIR_ENV`] 指定的目录，否则为内嵌资源。
    pub fn default_resources(self) -> Box<dyn Resources> {
        match std::env::var_os(RESOURCE_DIR_ENV) {
            Some(dir) => {
                log::info!("reading {self} resources from {}", Path::new(&dir).display());
                Box::new(Directory::new(dir))
            }
            None => default_embedded(),
        }
    }
}

#[cfg(feature = "embedded")]
fn default_embedded() -> Box<dyn Resources> {
    Box::new(Embedded)
}

#[cfg(not(feature = "embedded"))]
fn default_embedded() -> Box<dyn Resources> {
    Box::new(HashMap::<String, Vec<u8>>::new())
}

impl FromStr for Scheme {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpt3" | "gpt-3" | "gpt2" | "gpt-2" | "r50k_base" => Ok(Self::Gpt3),
            _ => Err(Error::UnknownScheme(s.into())),
        }
    }
}

impl fmt::Display for Scheme {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 编译进二进制的公开 GPT-2/GPT-3 资源。
#[cfg(feature = "embedded")]
#[derive(Clone, Copy, Default, Debug)]
pub struct Embedded;

#[cfg(feature = "embedded")]
impl Resources for Embedded {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        const ENCODER: &[u8] = include_bytes!("../resources/gpt3/encoder.json");
        const MERGES: &[u8] = include_bytes!("../resources/gpt3/vocab.bpe");
        match name {
            "encoder.json" => Ok(Cow::Borrowed(ENCODER)),
            "vocab.bpe" => Ok(Cow::Borrowed(MERGES)),
            _ => Err(not_found(name)),
        }
    }
}

/// 从一个目录读取资源，资源名即文件名。
#[derive(Clone, Debug)]
pub struct Directory(PathBuf);

impl Directory {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl Resources for Directory {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        let path = self.0.join(name);
        std::fs::read(&path)
            .map(Cow::Owned)
            .map_err(|source| Error::MissingResource {
                name: path.display().to_string(),
                source,
            })
    }
}

/// 内存中的资源表。
impl<S: BuildHasher> Resources for HashMap<String, Vec<u8>, S> {
    fn read(&self, name: &str) -> Result<Cow<'_, [u8]>> {
        self.get(name)
            .map(|data| Cow::Borrowed(data.as_slice()))
            .ok_or_else(|| not_found(name))
    }
}

fn not_found(name: &str) -> Error {
    Error::MissingResource {
        name: name.into(),
        source: io::Error::new(io::ErrorKind::NotFound, "no such resource"),
    }
}
