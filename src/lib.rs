//! Dummy application log generator.
//!
//! Lines look like
//! `2024-01-15T10:30:00.123456 [ERROR] (service_beta.py): metric_cpu_usage=42.50% metric_memory_mb=512MB metric_response_time_ms=87ms - <message>`
//! where the message comes from an Ollama or Groq backend when one is
//! configured, and from a fixed fallback otherwise.

pub mod backend;
pub mod config;
pub mod line;
pub mod runner;
pub mod sink;

#[cfg(test)]
mod test_support;
