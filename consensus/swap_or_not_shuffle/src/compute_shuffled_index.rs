use crate::Buf;
use std::cmp::max;

/// Computes the position to which `index` is mapped by the swap-or-not
/// permutation over `0..list_size`, seeded with `seed`.
///
/// Equivalent to `compute_shuffled_index` in the consensus spec.
///
/// Returns `None` under any of the following conditions:
///  - `list_size == 0`
///  - `index >= list_size`
///  - `list_size > 2**24`
///  - `list_size > usize::max_value() / 2`
pub fn compute_shuffled_index(
    index: usize,
    list_size: usize,
    seed: &[u8],
    shuffle_round_count: u8,
) -> Option<usize> {
    if list_size == 0
        || index >= list_size
        || list_size > usize::max_value() / 2
        || list_size > 2_usize.pow(24)
    {
        return None;
    }

    let mut index = index;
    let mut buf = Buf::new(seed);

    for round in 0..shuffle_round_count {
        buf.set_round(round);

        let pivot = buf.raw_pivot() as usize % list_size;
        let flip = (pivot + (list_size - index)) % list_size;
        let position = max(index, flip);

        buf.mix_in_position(position >> 8);

        let byte = buf.hash().as_bytes()[(position % 256) / 8];
        let bit = (byte >> (position % 8)) % 2;

        if bit == 1 {
            index = flip;
        }
    }

    Some(index)
}
