mod client;

pub use client::{HttpTokenClient, TokenClient, TokenRequest};
