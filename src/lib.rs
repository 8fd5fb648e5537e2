pub mod config;
pub mod error;
pub mod model;
pub mod render;
pub mod scan;
pub mod store;
pub mod tasks {
    pub mod arrivals;
    pub mod intake;
    pub mod loader;
    pub mod pool;
}
pub mod show {
    pub mod cache;
    pub mod controller;
    pub mod frame;
    pub mod slide;
}
