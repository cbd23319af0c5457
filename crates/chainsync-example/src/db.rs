//! The narrow persistence interface the sync loop consumes, per spec.md §6:
//! `persist_chain(headers) → ()`, `canonical_head() → Header`. Both may
//! suspend; no concrete storage format is implied.

use tokio::sync::Mutex;

use crate::header::Header;

#[async_trait::async_trait]
pub trait PersistentHeaderDB: Send + Sync {
    async fn persist_chain(&self, headers: Vec<Header>) -> Result<(), String>;
    async fn canonical_head(&self) -> Header;
}

/// An in-memory `PersistentHeaderDB`, useful for tests and as a worked
/// example; not a production storage engine.
#[derive(Debug)]
pub struct InMemoryHeaderDB {
    chain: Mutex<Vec<Header>>,
}

impl InMemoryHeaderDB {
    pub fn new(genesis: Header) -> Self {
        Self {
            chain: Mutex::new(vec![genesis]),
        }
    }
}

#[async_trait::async_trait]
impl PersistentHeaderDB for InMemoryHeaderDB {
    async fn persist_chain(&self, headers: Vec<Header>) -> Result<(), String> {
        let mut chain = self.chain.lock().await;
        let expected_parent = chain.last().expect("genesis always present").hash;
        if let Some(first) = headers.first() {
            if first.parent_hash != expected_parent {
                return Err(format!(
                    "chain mismatch: expected parent {expected_parent}, got {}",
                    first.parent_hash
                ));
            }
        }
        chain.extend(headers);
        Ok(())
    }

    async fn canonical_head(&self) -> Header {
        self.chain.lock().await.last().expect("genesis always present").clone()
    }
}
