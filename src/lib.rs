pub mod app;
pub mod config;
pub mod error;
pub mod notification;
pub mod state;
pub mod validation;
pub mod api {
    pub mod errors;
    pub mod highlights;
    pub mod macros;
    pub mod sessions;
}
pub mod auth {
    pub mod context;
    pub mod middleware;
    pub mod models;
    pub mod session_purge;
    pub mod sessions;
}
pub mod db {
    pub mod memory;
    pub mod models;
    pub mod repository;
}
pub mod highlights {
    pub mod date_math;
    pub mod service;
}
pub mod macros {
    pub mod registry;
    pub mod validate_for_publish;
}
pub mod resource {
    pub mod backend;
    pub mod diff;
    pub mod service;
}
pub mod search {
    pub mod client;
    pub mod memory;
    pub mod query;
}
