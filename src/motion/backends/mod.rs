pub mod block_match;
pub mod pyramidal_lk;

pub use block_match::{BlockMatchConfig, BlockMatcher};
pub use pyramidal_lk::{PyramidalLk, PyramidalLkConfig};
