//! Filesystem operations: rename-or-copy moves, durability helpers and the operation lock.

mod atomic;
mod copy;
mod helpers;
mod io_copy;
mod lock;
mod meta;
mod mover;
mod space;
mod util;

pub use helpers::io_error_with_help_io;
pub use lock::{OperationLock, lock_path_for, try_lock_operation};
pub use mover::{MoveOutcome, Mover, relocate_file};
