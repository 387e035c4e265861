pub mod rest;

pub use rest::UpstoxClient;
