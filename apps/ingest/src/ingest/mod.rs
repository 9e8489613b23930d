// Resume ingestion: storage event → text → structured fields → resume record.
// All LLM calls go through llm_client; storage and database through their traits.

pub mod event;
pub mod format;
pub mod handlers;
pub mod persist;
pub mod pipeline;
pub mod prompts;
pub mod structured;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;
