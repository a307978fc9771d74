//! The five memory tools named in §6, one module each.

pub mod checkpoint;
pub mod forget;
pub mod prune;
pub mod recall;
pub mod store;

use crate::protocol::types::ToolDescriptor;

pub fn all_descriptors() -> Vec<ToolDescriptor> {
    vec![
        recall::descriptor(),
        store::descriptor(),
        forget::descriptor(),
        checkpoint::descriptor(),
        prune::descriptor(),
    ]
}
