//! 监听模糊测试器的请求，根据好/坏样例调用大模型生成新的种子

mod client;
mod generator;
mod prompt;
mod request;

pub use client::{ChatClient, DEFAULT_ENDPOINT, DEFAULT_MODEL, LanguageModel};
pub use generator::SeedGenerator;
pub use prompt::{SYSTEM_PROMPT, build_prompt, extract_seed};
pub use request::{SeedRequest, load_examples, sanitize_example};
