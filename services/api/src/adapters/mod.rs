pub mod blob_fs;
pub mod db;
pub mod generation_llm;

pub use blob_fs::FsBlobStore;
pub use db::DbAdapter;
pub use generation_llm::OpenAiGenerationAdapter;
