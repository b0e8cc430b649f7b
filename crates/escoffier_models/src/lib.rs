//! Structured-output generation client and model drivers for Escoffier.
//!
//! [`GenerationClient`] turns a free-form driver into a typed call: it asks
//! for JSON, parses and validates the reply, and reformulates a bounded
//! number of times when the reply does not match. [`OpenAiCompatDriver`]
//! talks to any OpenAI-compatible chat completions endpoint (vLLM, etc.).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod openai_compat;

pub use client::{
    CallParams, Completion, DEFAULT_REFORMULATION_RETRIES, GenerationClient, parse_output,
    structured_system_prompt,
};
pub use openai_compat::{DriverSettings, DriverSettingsBuilder, OpenAiCompatDriver};
