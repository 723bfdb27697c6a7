use std::collections::HashMap;

use futures::future::BoxFuture;
use tokio::sync::RwLock;
use tracing::debug;

use maestro_core::error::{MaestroError, Result};
use maestro_core::traits::ConversationStore;
use maestro_core::types::{ConversationThread, ConversationTurn, TurnRole};

/// Transcript entry written when a conversation is restored from an export.
pub const RESUME_MARKER: &str = "[Conversation resumed from saved state]";

#[derive(Default)]
struct Tables {
    threads: HashMap<String, ConversationThread>,
    transcripts: HashMap<String, Vec<ConversationTurn>>,
    exports: HashMap<String, String>,
}

/// Process-lifetime conversation store.
///
/// All three tables sit behind one lock, so each operation observes and
/// leaves a consistent view. Sequences of operations on one id are not
/// serialized.
#[derive(Default)]
pub struct InMemoryConversationStore {
    tables: RwLock<Tables>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of conversations holding a memory handle.
    pub async fn len(&self) -> usize {
        self.tables.read().await.threads.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn get_or_create(
        &self,
        id: &str,
    ) -> BoxFuture<'_, Result<(ConversationThread, Vec<ConversationTurn>)>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let thread = match tables.threads.get(&id) {
                Some(thread) => thread.clone(),
                None => {
                    let thread = ConversationThread::new();
                    debug!(conversation_id = %id, thread_id = %thread.thread_id, "Created conversation");
                    tables.threads.insert(id.clone(), thread.clone());
                    thread
                }
            };
            let transcript = tables.transcripts.entry(id).or_default().clone();
            Ok((thread, transcript))
        })
    }

    fn append(&self, id: &str, role: TurnRole, text: &str) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        let turn = ConversationTurn::new(role, text);
        Box::pin(async move {
            self.tables
                .write()
                .await
                .transcripts
                .entry(id)
                .or_default()
                .push(turn);
            Ok(())
        })
    }

    fn update_thread(&self, id: &str, thread: ConversationThread) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            tables.exports.remove(&id);
            tables.threads.insert(id, thread);
            Ok(())
        })
    }

    fn transcript(&self, id: &str) -> BoxFuture<'_, Result<Vec<ConversationTurn>>> {
        let id = id.to_string();
        Box::pin(async move {
            Ok(self
                .tables
                .read()
                .await
                .transcripts
                .get(&id)
                .cloned()
                .unwrap_or_default())
        })
    }

    fn export(&self, id: &str) -> BoxFuture<'_, Result<String>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let thread = tables
                .threads
                .get(&id)
                .ok_or_else(|| MaestroError::ConversationNotFound(id.clone()))?;
            if let Some(cached) = tables.exports.get(&id) {
                return Ok(cached.clone());
            }
            let encoded = thread.serialize()?;
            tables.exports.insert(id, encoded.clone());
            Ok(encoded)
        })
    }

    fn import(&self, id: &str, serialized: &str) -> BoxFuture<'_, Result<ConversationThread>> {
        let id = id.to_string();
        let serialized = serialized.to_string();
        Box::pin(async move {
            let thread = ConversationThread::deserialize(&serialized)?;
            let mut tables = self.tables.write().await;
            tables.threads.insert(id.clone(), thread.clone());
            // Until the thread changes, export hands back the imported text.
            tables.exports.insert(id.clone(), serialized);
            tables
                .transcripts
                .entry(id.clone())
                .or_default()
                .push(ConversationTurn::new(TurnRole::System, RESUME_MARKER));
            debug!(conversation_id = %id, thread_id = %thread.thread_id, "Imported conversation");
            Ok(thread)
        })
    }

    fn clear(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            tables.threads.remove(&id);
            tables.transcripts.remove(&id);
            tables.exports.remove(&id);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maestro_core::types::ChatMessage;

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let store = InMemoryConversationStore::new();
        let (first, transcript) = store.get_or_create("c1").await.unwrap();
        assert!(transcript.is_empty());
        let (second, _) = store.get_or_create("c1").await.unwrap();
        assert_eq!(first.thread_id, second.thread_id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = InMemoryConversationStore::new();
        store.get_or_create("c1").await.unwrap();
        store.append("c1", TurnRole::User, "Hi, I'm Ada").await.unwrap();
        store.append("c1", TurnRole::Assistant, "Hello Ada").await.unwrap();

        let transcript = store.transcript("c1").await.unwrap();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, TurnRole::User);
        assert_eq!(transcript[1].message, "Hello Ada");
    }

    #[tokio::test]
    async fn test_export_unknown_id() {
        let store = InMemoryConversationStore::new();
        let err = store.export("ghost").await.unwrap_err();
        assert!(matches!(err, MaestroError::ConversationNotFound(id) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_export_import_is_byte_for_byte() {
        let store = InMemoryConversationStore::new();
        let (mut thread, _) = store.get_or_create("c1").await.unwrap();
        thread.messages.push(ChatMessage::user("remember 42"));
        store.update_thread("c1", thread.clone()).await.unwrap();

        let exported = store.export("c1").await.unwrap();
        let imported = store.import("c2", &exported).await.unwrap();
        assert_eq!(imported, thread);
        assert_eq!(store.export("c2").await.unwrap(), exported);
    }

    #[tokio::test]
    async fn test_reexport_returns_imported_text_verbatim() {
        let store = InMemoryConversationStore::new();
        let thread = ConversationThread::new();
        let pretty = serde_json::to_string_pretty(&thread).unwrap();

        store.import("c1", &pretty).await.unwrap();
        assert_eq!(store.export("c1").await.unwrap(), pretty);

        let (mut thread, _) = store.get_or_create("c1").await.unwrap();
        thread.messages.push(ChatMessage::user("new message"));
        store.update_thread("c1", thread.clone()).await.unwrap();
        assert_eq!(store.export("c1").await.unwrap(), thread.serialize().unwrap());
    }

    #[tokio::test]
    async fn test_import_into_existing_transcript_appends_marker() {
        let store = InMemoryConversationStore::new();
        store.get_or_create("c1").await.unwrap();
        store.append("c1", TurnRole::User, "one").await.unwrap();
        store.append("c1", TurnRole::Assistant, "two").await.unwrap();
        let exported = store.export("c1").await.unwrap();

        store.import("c1", &exported).await.unwrap();
        let transcript = store.transcript("c1").await.unwrap();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].message, "one");
        assert_eq!(transcript[1].message, "two");
        assert_eq!(transcript[2], ConversationTurn::new(TurnRole::System, RESUME_MARKER));
    }

    #[tokio::test]
    async fn test_import_into_fresh_id_starts_with_marker() {
        let store = InMemoryConversationStore::new();
        let exported = ConversationThread::new().serialize().unwrap();
        store.import("fresh", &exported).await.unwrap();
        let transcript = store.transcript("fresh").await.unwrap();
        assert_eq!(transcript, vec![ConversationTurn::new(TurnRole::System, RESUME_MARKER)]);
    }

    #[tokio::test]
    async fn test_import_malformed() {
        let store = InMemoryConversationStore::new();
        let err = store.import("c1", "{broken").await.unwrap_err();
        assert!(matches!(err, MaestroError::DeserializationFailure(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_then_get_or_create_is_fresh() {
        let store = InMemoryConversationStore::new();
        let (before, _) = store.get_or_create("c1").await.unwrap();
        store.append("c1", TurnRole::User, "hello").await.unwrap();
        store.export("c1").await.unwrap();

        store.clear("c1").await.unwrap();
        let (after, transcript) = store.get_or_create("c1").await.unwrap();
        assert!(transcript.is_empty());
        assert_ne!(before.thread_id, after.thread_id);
    }

    #[tokio::test]
    async fn test_clear_unknown_is_noop() {
        let store = InMemoryConversationStore::new();
        store.clear("never-existed").await.unwrap();
        store.clear("never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_get_or_create_yields_one_thread() {
        let store = std::sync::Arc::new(InMemoryConversationStore::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.get_or_create("shared").await.unwrap().0.thread_id
            }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }
}
