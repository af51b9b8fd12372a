//! Backend implementations: HTTP clients for real model servers plus a
//! scripted fake for tests.

pub mod fake;
pub mod ollama;
pub mod openai;
