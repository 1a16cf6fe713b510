use fnv::FnvHasher;
use itertools::Itertools;
use std::{
    collections::HashSet,
    hash::{BuildHasherDefault, Hash}
};

pub type FnvHashSet<T> = HashSet<T, BuildHasherDefault<FnvHasher>>;

/// Construct a hash set with the specified capacity. The hashing algorithm is much faster than the default
/// on short keys such as grid coordinates.
/// Note it is less robust against security attacks on key collisions.
pub fn fnv_hashset<T: Hash + Eq>(capacity: usize) -> FnvHashSet<T> {
    let fnv = BuildHasherDefault::<FnvHasher>::default();
    HashSet::<T, _>::with_capacity_and_hasher(capacity, fnv)
}

/// Set contents in ascending order, so edits reach a presentation layer in a stable order.
pub fn sorted<T: Ord + Copy + Hash + Eq>(set: &FnvHashSet<T>) -> Vec<T> {
    set.iter().cloned().sorted().collect()
}

/// Percentage of `part` in `whole`, zero for an empty whole.
pub fn percent(part: usize, whole: usize) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 * 100.0 / whole as f32
    }
}
