pub mod allocator;
pub mod availability;
pub mod calendar;
pub mod config;
pub mod conflict;
pub mod duration;
pub mod model;
pub mod service;
pub mod store;
pub mod time;
pub mod validator;
pub mod workload;
