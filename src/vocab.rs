//! 这个模块解析 `encoder.json` 与 `vocab.bpe`，构造不可变的词表和合词排名表。

use crate::{byte_map, utok, Error, Result};
use rustc_hash::{FxHashMap, FxHashSet};

/// 词表与合词规则。
///
/// 词的内容按 token 顺序连续保存在同一个字符串中，
/// `slices` 记录每个词的位置，`sorted_pieces` 按内容的字典序排列，用于从内容二分查找 token。
pub struct Vocabulary {
    /// 所有词的内容
    text: Box<str>,
    /// token -> (offset, len)
    slices: Box<[(u32, u32)]>,
    /// 按内容字典序排序的 token
    sorted_pieces: Box<[utok]>,
    /// 排名从 0 开始，越小越先合并
    ranks: Ranks,
    /// 既不是单字节符号也不是任何合词规则产物的词
    unreachable: Box<[utok]>,
}

impl Vocabulary {
    /// 从 `encoder.json` 与 `vocab.bpe` 的内容构造词表。
    ///
    /// `names` 是两个资源的名字，只用于报告错误。
    pub fn new(encoder: &[u8], merges: &[u8], names: [&str; 2]) -> Result<Self> {
        let [encoder_name, merges_name] = names;

        let table = serde_json::from_slice::<FxHashMap<String, utok>>(encoder)
            .map_err(|e| Error::malformed(encoder_name, e.to_string()))?;

        // token 必须恰好覆盖 0..n，否则存在重复或空洞
        let mut by_id = vec![None; table.len()];
        for (piece, &id) in &table {
            let Some(slot) = by_id.get_mut(id as usize) else {
                return Err(Error::malformed(
                    encoder_name,
                    format!("id {id} of {piece:?} is out of range 0..{}", table.len()),
                ));
            };
            if let Some(prev) = *slot {
                return Err(Error::malformed(
                    encoder_name,
                    format!("id {id} is shared by {prev:?} and {piece:?}"),
                ));
            }
            *slot = Some(piece.as_str());
        }

        // 重新编排词表，内容全部保存到 text_buf 以实现缓存友好性
        let total_len = table.keys().map(String::len).sum();
        let mut text_buf = String::with_capacity(total_len);
        let slices = by_id
            .into_iter()
            .flatten()
            .map(|piece| {
                let off = text_buf.len();
                text_buf.push_str(piece);
                (off as u32, piece.len() as u32)
            })
            .collect::<Box<[_]>>();
        let text = text_buf.into_boxed_str();

        let mut sorted_pieces = (0..slices.len() as utok).collect::<Box<[_]>>();
        sorted_pieces.sort_unstable_by_key(|&t| slice(&text, &slices, t));

        let (ranks, products) = parse_merges(merges, merges_name)?;

        // BPE 词表中，并非所有词都是合词规则可达的
        let unreachable = (0..slices.len() as utok)
            .filter(|&t| {
                let piece = slice(&text, &slices, t);
                let mut chars = piece.chars();
                let single_symbol = matches!(
                    (chars.next(), chars.next()),
                    (Some(c), None) if byte_map::decode(c).is_ok()
                );
                !single_symbol && !products.contains(piece)
            })
            .collect::<Box<[_]>>();

        log::info!(
            "vocabulary loaded: {} pieces, {} merges, {} unreachable",
            slices.len(),
            ranks.len,
            unreachable.len(),
        );

        Ok(Self {
            text,
            slices,
            sorted_pieces,
            ranks,
            unreachable,
        })
    }

    /// 词表大小。
    #[inline]
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// 合词规则的数量。
    #[inline]
    pub fn merge_count(&self) -> usize {
        self.ranks.len
    }

    /// token -> piece
    #[inline]
    pub fn piece(&self, token: utok) -> Option<&str> {
        ((token as usize) < self.slices.len()).then(|| slice(&self.text, &self.slices, token))
    }

    /// piece -> token
    #[inline]
    pub fn id(&self, piece: &str) -> Option<utok> {
        self.sorted_pieces
            .binary_search_by_key(&piece, |&t| slice(&self.text, &self.slices, t))
            .ok()
            .map(|i| self.sorted_pieces[i])
    }

    /// 查询一对相邻词的合并排名。
    #[inline]
    pub fn rank(&self, left: &str, right: &str) -> Option<u32> {
        self.ranks.map.get(left)?.get(right).copied()
    }

    /// 合词规则不可达的词及其 token。
    pub fn unreachable(&self) -> impl Iterator<Item = (&str, utok)> + '_ {
        self.unreachable
            .iter()
            .map(|&t| (slice(&self.text, &self.slices, t), t))
    }
}

#[inline(always)]
fn slice<'a>(text: &'a str, slices: &[(u32, u32)], token: utok) -> &'a str {
    let (off, len) = slices[token as usize];
    &text[off as usize..][..len as usize]
}

/// left -> right -> rank，查询时不需要拼接键。
#[derive(Default)]
struct Ranks {
    map: FxHashMap<Box<str>, FxHashMap<Box<str>, u32>>,
    /// 不重复的规则数
    len: usize,
}

impl Ranks {
    fn insert(&mut self, left: &str, right: &str, rank: u32) {
        let rights = self.map.entry(left.into()).or_default();
        if !rights.contains_key(right) {
            rights.insert(right.into(), rank);
            self.len += 1;
        }
    }
}

/// 解析合词规则，同时收集所有规则的合并产物。
///
/// 第一行是版本注释，丢弃；之后每个非空行必须恰好是两个以空白分隔的词。
/// 行序即排名，同一规则重复出现时保留第一次的排名。
fn parse_merges(data: &[u8], name: &str) -> Result<(Ranks, FxHashSet<String>)> {
    let data = std::str::from_utf8(data).map_err(|e| Error::malformed(name, e.to_string()))?;

    let mut ranks = Ranks::default();
    let mut products = FxHashSet::default();
    let mut rank = 0u32;
    let mut start = 0;
    let ends = memchr::memchr_iter(b'\n', data.as_bytes()).chain([data.len()]);
    for (i, end) in ends.enumerate() {
        let line = &data[start..end];
        start = (end + 1).min(data.len());
        if i == 0 || line.trim().is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let (Some(left), Some(right), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(Error::malformed(
                name,
                format!("line {} does not hold exactly two pieces: {line:?}", i + 1),
            ));
        };

        ranks.insert(left, right, rank);
        products.insert(format!("{left}{right}"));
        rank += 1;
    }
    Ok((ranks, products))
}
