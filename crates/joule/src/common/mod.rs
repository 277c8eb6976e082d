#[macro_use]
pub mod index;

pub mod error;
pub mod ids;
pub mod utils;

pub type Map<K, V> = hashbrown::HashMap<K, V>;
pub type Set<T> = hashbrown::HashSet<T>;
