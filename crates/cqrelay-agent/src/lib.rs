pub mod compose;
pub mod history;
pub mod openai;
pub mod pipeline;
pub mod provider;
pub mod runtime;
pub mod tokens;
