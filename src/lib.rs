// Library surface for the server binary, replay tool and integration tests.
pub mod api;
pub mod clock;
pub mod composer;
pub mod config;
pub mod logging;
pub mod replay;
pub mod server;
pub mod session;
pub mod state;
pub mod stats;
pub mod vision;
