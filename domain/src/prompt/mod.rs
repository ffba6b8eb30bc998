//! Prompt domain
//!
//! Templates for generating the expand and persona review prompts.

mod template;

pub use template::PromptTemplate;
