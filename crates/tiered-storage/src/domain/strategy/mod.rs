//! # Placement Strategies
//!
//! Choose which volume (or cold backend) receives the next write.
//!
//! Every strategy has the same shape: candidates that cannot take a block
//! are evicted from the round, then one capable candidate is chosen and a
//! slot on it is reserved. Admission and reservation are a single call
//! ([`PlacementCandidate::reserve`]) so a successful selection always owns a
//! write slot.
//!
//! | strategy          | order of attempts                                    |
//! |-------------------|------------------------------------------------------|
//! | `random`          | uniform draws without replacement                    |
//! | `round_robin`     | `prev+1 ..` wrapping, previous candidate last        |
//! | `min_size_first`  | most available bytes or least used bytes, per tier   |
//! | `min_count_first` | fewest stored blocks                                 |

mod candidate;
mod pool;
mod selector;


pub use candidate::PlacementCandidate;
pub use pool::VolumePool;
pub use selector::{PlacementStrategy, Selection, SelectionOutcome, SizeMetric};
