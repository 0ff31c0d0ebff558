//! Collection aliases used across the workspace.

pub use smallvec::{smallvec, SmallVec};

pub type DefaultHashBuilder = foldhash::fast::RandomState;

pub mod hashset {
    pub type HashSet<K> = hashbrown::HashSet<K, super::DefaultHashBuilder>;
}
