use crate::Vocabulary;
use std::fmt;

/// 一个片段的合词状态。
///
/// 片段的每个词都是符号串中连续的一段，因此只需记录词的起始位置，合并即删除一个边界。
pub struct MergeState<'v, 't> {
    text: &'t str,
    vocab: &'v Vocabulary,
    /// 每个词的起始字节位置，末尾附加 `text.len()`
    bounds: Vec<usize>,
}

pub struct Iter<'s, 't> {
    text: &'t str,
    bounds: &'s [usize],
}

impl Vocabulary {
    /// 将一个已映射为符号串的片段拆成单个符号，准备合并。
    pub fn begin_merge<'v, 't>(&'v self, text: &'t str) -> MergeState<'v, 't> {
        let mut bounds = text.char_indices().map(|(i, _)| i).collect::<Vec<_>>();
        bounds.push(text.len());
        MergeState {
            text,
            vocab: self,
            bounds,
        }
    }
}

impl<'t> MergeState<'_, 't> {
    /// 当前的词数。
    #[inline]
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline(always)]
    fn piece(&self, i: usize) -> &'t str {
        let text = self.text;
        &text[self.bounds[i]..self.bounds[i + 1]]
    }

    /// 找到排名最高的相邻词对，返回其左词下标和排名。排名相同时取最左侧的。
    fn best_pair(&self) -> Option<(usize, u32)> {
        let mut best = None::<(usize, u32)>;
        for i in 0..self.len().saturating_sub(1) {
            let (left, right) = (self.piece(i), self.piece(i + 1));
            if let Some(rank) = self.vocab.rank(left, right) {
                if best.map_or(true, |(_, r)| rank < r) {
                    best = Some((i, rank));
                }
            }
        }
        best
    }

    /// 尝试执行一轮合并，返回是否成功执行了合并。
    ///
    /// 一轮合并选出排名最高的词对，并从左到右合并它所有不重叠的出现。
    pub fn merge(&mut self) -> bool {
        if self.len() < 2 {
            return false;
        }
        let Some((i, _)) = self.best_pair() else {
            return false;
        };
        let (first, second) = (self.piece(i), self.piece(i + 1));

        // t0 first second t3 first second
        // -- ----- ------ -- ----- ------
        //                ↓
        // t0 first+second t3 first+second
        // -- ------------ -- ------------
        let mut bounds = Vec::with_capacity(self.bounds.len());
        let mut j = 0;
        while j < self.len() {
            bounds.push(self.bounds[j]);
            if j + 1 < self.len() && self.piece(j) == first && self.piece(j + 1) == second {
                j += 2;
            } else {
                j += 1;
            }
        }
        bounds.push(self.text.len());
        self.bounds = bounds;
        true
    }

    #[inline]
    pub fn iter(&self) -> Iter<'_, 't> {
        Iter {
            text: self.text,
            bounds: &self.bounds,
        }
    }
}

impl<'t> Iterator for Iter<'_, 't> {
    type Item = &'t str;

    fn next(&mut self) -> Option<Self::Item> {
        let (text, bounds) = (self.text, self.bounds);
        match bounds {
            &[start, end, ..] => {
                self.bounds = &bounds[1..];
                Some(&text[start..end])
            }
            _ => None,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bounds.len().saturating_sub(1);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Iter<'_, '_> {}

impl fmt::Display for MergeState<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "---------------------------")?;
        {
            writeln!(f, "text:")?;
            writeln!(f, "  {}", self.text)?;
        }
        writeln!(f, "---------------------------")?;
        {
            writeln!(f, "pieces:")?;
            for piece in self.iter() {
                match self.vocab.id(piece) {
                    Some(token) => writeln!(f, "  {token:>6}: {piece}")?,
                    None => writeln!(f, "  {:>6}: {piece}", "?")?,
                }
            }
        }
        writeln!(f, "---------------------------")?;
        {
            writeln!(f, "merges:")?;
            let pieces = self.iter().collect::<Vec<_>>();
            for pair in pieces.windows(2) {
                if let Some(rank) = self.vocab.rank(pair[0], pair[1]) {
                    writeln!(f, "  {rank:>6} | {} {}", pair[0], pair[1])?;
                }
            }
        }
        writeln!(f, "---------------------------")
    }
}
