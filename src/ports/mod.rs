pub mod cache;
pub mod catalog;
pub mod llm;

pub mod mock;

pub use cache::CachePort;
pub use catalog::{ArtistDto, CatalogPort, TrackDto};
pub use llm::{CompletionRequest, CompletionResponse, LLMPort};
