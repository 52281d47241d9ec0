pub mod logging;
pub mod panic;

pub use logging::init_logging;
pub use panic::{catch_panic, catch_panic_sync};
