mod dirs;

use std::sync::Arc;

use crate::engine::Engine;
use crate::memory::MemoryStore;

/// A fresh engine over an in-memory store with an initialized root.
async fn test_engine() -> Engine {
    let engine = Engine::new(Arc::new(MemoryStore::new()), "test");
    engine.init().await.unwrap();
    engine
}
