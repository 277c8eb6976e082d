use std::fmt::Display;
use std::hash::Hash;

use crate::Set;

pub fn format_comma_delimited<I: IntoIterator<Item = T>, T: Display>(iter: I) -> String {
    iter.into_iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

pub fn has_unique_elements<T: Eq + Hash>(items: &[T]) -> bool {
    items.iter().collect::<Set<&T>>().len() == items.len()
}
