use std::{
    collections::HashSet,
    hash::Hash,
};

/// Rows of `left` whose key also appears in `right`.
///
/// Keys of `right` are collapsed into a set first, so a one-to-many match never
/// repeats a row of `left`. Order of `left` is preserved.
pub fn semi_join<L, R, K>(
    left: &[L],
    right: &[R],
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
) -> Vec<L>
where
    L: Clone,
    K: Eq + Hash,
{
    let keys: HashSet<K> = right.iter().map(right_key).collect();
    left.iter().filter(|row| keys.contains(&left_key(*row))).cloned().collect()
}

/// Rows of `left` whose key does not appear in `right`.
///
/// Rows come back untouched, so values `right` holds for the same columns never leak in.
pub fn anti_join<L, R, K>(
    left: &[L],
    right: &[R],
    left_key: impl Fn(&L) -> K,
    right_key: impl Fn(&R) -> K,
) -> Vec<L>
where
    L: Clone,
    K: Eq + Hash,
{
    let keys: HashSet<K> = right.iter().map(right_key).collect();
    left.iter().filter(|row| !keys.contains(&left_key(*row))).cloned().collect()
}
