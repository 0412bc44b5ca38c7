//! # 确定性哈希
//!
//! 标准库的 `Hasher` 每次启动都会随机化，不能用于跨会话比较脚本是否改动。
//! 这里使用 Knuth 黄金分割乘法哈希。

const GOLDEN_RATIO: u64 = 11_400_714_819_323_199_563;

/// 把 `y` 混入累积值 `x`
pub fn add(x: u64, y: u64) -> u64 {
    x.wrapping_mul(GOLDEN_RATIO).wrapping_add(y)
}

/// 字符串哈希，按 UTF-16 码元逐个混入
pub fn hash_str(s: &str) -> u64 {
    s.encode_utf16().fold(0, |acc, unit| add(acc, u64::from(unit)))
}

/// 依次混入一组哈希值
pub fn fold<I>(hashes: I) -> u64
where
    I: IntoIterator<Item = u64>,
{
    hashes.into_iter().fold(0, add)
}
