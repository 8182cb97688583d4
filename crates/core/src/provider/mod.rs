pub mod llm;
mod sse;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_provider;
pub mod xai;
mod xai_types;
