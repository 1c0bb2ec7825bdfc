pub mod count;
pub mod open;
pub mod read;
pub mod verify;
pub mod watch;
pub mod write;

pub use count::cmd_count;
pub use open::cmd_open;
pub use read::cmd_read;
pub use verify::cmd_verify;
pub use watch::cmd_watch;
pub use write::cmd_write;
