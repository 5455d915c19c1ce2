//! 字节到可打印 Unicode 字符的双射。
//!
//! 字节 33..=126、161..=172、174..=255 映射到同值码点，
//! 其余 68 个字节按字节值升序依次映射到 U+0100 起的码点。
//! 构造顺序决定了与公开词表的兼容性，不可调整。

use crate::{Error, Result};

/// 映射区间的上界（不含）
const SYMBOL_END: usize = 256 + 68;

const fn is_direct(b: u8) -> bool {
    matches!(b, 33..=126 | 161..=172 | 174..=255)
}

const ENCODE: [char; 256] = {
    let mut table = ['\0'; 256];
    let mut n = 0u32;
    let mut i = 0usize;
    while i < 256 {
        let b = i as u8;
        let code = if is_direct(b) {
            b as u32
        } else {
            n += 1;
            256 + n - 1
        };
        table[i] = match char::from_u32(code) {
            Some(c) => c,
            None => unreachable!(),
        };
        i += 1;
    }
    table
};

const DECODE: [Option<u8>; SYMBOL_END] = {
    let mut table = [None; SYMBOL_END];
    let mut i = 0usize;
    while i < 256 {
        table[ENCODE[i] as usize] = Some(i as u8);
        i += 1;
    }
    table
};

/// byte -> symbol
#[inline(always)]
pub const fn encode(b: u8) -> char {
    ENCODE[b as usize]
}

/// symbol -> byte
#[inline]
pub fn decode(c: char) -> Result<u8> {
    DECODE
        .get(c as usize)
        .copied()
        .flatten()
        .ok_or(Error::InvalidSymbol(c))
}

/// 将一段原始字节逐个映射为符号串，每个字节对应一个字符。
pub fn remap(bytes: &[u8]) -> String {
    let mut ans = String::with_capacity(bytes.len() * 2);
    ans.extend(bytes.iter().map(|&b| encode(b)));
    ans
}

/// 将符号串还原为原始字节并追加到 `buf`，遇到字母表外的字符时失败。
pub fn restore(symbols: &str, buf: &mut Vec<u8>) -> Result<()> {
    buf.reserve(symbols.len());
    for c in symbols.chars() {
        buf.push(decode(c)?);
    }
    Ok(())
}
