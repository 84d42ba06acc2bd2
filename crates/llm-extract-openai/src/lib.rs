//! `OpenAI` provider for `llm-extract`.
//!
//! This crate implements [`Provider`](llm_extract::Provider) for the
//! `OpenAI` Chat Completions API in streaming mode, which is all an
//! extraction needs: forced function calls, their argument deltas, and
//! token usage.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use llm_extract::{ExtractRequest, ExtractionContext, Parameter, StreamingExtractor};
//! use llm_extract_openai::{OpenAiConfig, OpenAiProvider};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = OpenAiProvider::new(OpenAiConfig {
//!     api_key: std::env::var("OPENAI_API_KEY")?,
//!     model: "gpt-4o-mini".into(),
//!     ..Default::default()
//! });
//!
//! let extractor = StreamingExtractor::new(ExtractionContext::new(Arc::new(provider)));
//! let request = ExtractRequest {
//!     data: Some("The parcel goes to 1 Infinite Loop, Cupertino".into()),
//!     ..ExtractRequest::new("Extract the delivery city", vec![Parameter::string("city")])
//! };
//!
//! let args = extractor.extract(&request).await?;
//! println!("{}", args["city"]);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod config;
mod convert;
mod provider;
mod stream;
mod types;

pub use config::OpenAiConfig;
pub use provider::OpenAiProvider;
