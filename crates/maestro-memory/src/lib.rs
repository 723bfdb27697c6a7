pub mod store;

pub use store::{InMemoryConversationStore, RESUME_MARKER};
