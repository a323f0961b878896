//! Small collection helpers used across the workspace.

mod hashmap;
mod prio_queue;
mod string_list;

pub use hashmap::GitHashMapExt;
pub use prio_queue::PriorityQueue;
pub use string_list::{StringList, StringListItem};
