//! Reviewer client adapters

mod openai;

pub use openai::OpenAiReviewerClient;
