//! Process-wide state shared by the server, the watcher and the builder.

mod state;

pub use state::{
    begin_update, end_update, is_busy, is_healthy, is_shutdown, register_server, set_healthy,
    setup_shutdown_handler,
};
