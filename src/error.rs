use crate::utok;
use std::string::FromUtf8Error;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("resource `{name}` is missing or unreadable")]
    MissingResource {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("resource `{name}` is malformed: {reason}")]
    MalformedResource { name: String, reason: String },
    #[error("unknown encoding scheme: {0}")]
    UnknownScheme(String),
    #[error("pretokenizer pattern error: {0}")]
    Pattern(#[from] fancy_regex::Error),
    #[error("special token `{0}` is already registered with different tokens")]
    SpecialConflict(String),
    #[error("special token pattern error: {0}")]
    SpecialPattern(#[from] regex::Error),

    #[error("piece `{0}` is not in the vocabulary")]
    UnknownPiece(String),

    #[error("invalid token id: {0}")]
    InvalidToken(utok),
    #[error("symbol {0:?} is outside the byte alphabet")]
    InvalidSymbol(char),
    #[error("decoded bytes are not valid UTF-8")]
    InvalidUtf8(#[from] FromUtf8Error),
}

/// 错误所属的阶段。
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    /// 构造期：资源缺失、格式错误、配置错误
    Resource,
    /// 编码期：合词结果与词表不一致
    Encoding,
    /// 解码期：调用方提供的 token 序列与方案不兼容
    Decoding,
}

impl Error {
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingResource { .. }
            | Self::MalformedResource { .. }
            | Self::UnknownScheme(_)
            | Self::Pattern(_)
            | Self::SpecialConflict(_)
            | Self::SpecialPattern(_) => ErrorKind::Resource,
            Self::UnknownPiece(_) => ErrorKind::Encoding,
            Self::InvalidToken(_) | Self::InvalidSymbol(_) | Self::InvalidUtf8(_) => {
                ErrorKind::Decoding
            }
        }
    }

    pub(crate) fn malformed(name: &str, reason: impl Into<String>) -> Self {
        Self::MalformedResource {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
