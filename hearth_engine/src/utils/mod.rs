mod resizable_sequence;
mod teardown_graph;

pub use resizable_sequence::ResizableSequence;
pub use teardown_graph::{TeardownGraph, TeardownKey};
