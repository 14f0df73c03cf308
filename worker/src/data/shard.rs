use std::ops::Range;

/// Splits `total` samples among `parts` and returns the block of `part`.
///
/// Blocks are contiguous, disjoint and cover `[0..total)`. The first `total % parts`
/// blocks hold one extra sample.
pub fn block_range(total: usize, part: usize, parts: usize) -> Range<usize> {
    assert!(parts > 0);
    assert!(part < parts);

    let base = total / parts;
    let rem = total % parts;

    let start = part * base + part.min(rem);
    let extra = if part < rem { 1 } else { 0 };
    let end = start + base + extra;

    start..end
}
