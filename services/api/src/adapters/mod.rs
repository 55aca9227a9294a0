pub mod db;
pub mod reflection_llm;
pub mod verse_api;

pub use db::DbAdapter;
pub use reflection_llm::OpenAiReflectionAdapter;
pub use verse_api::BibleApiAdapter;
