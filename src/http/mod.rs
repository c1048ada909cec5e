pub mod client;

pub use client::HttpRegistrationService;
