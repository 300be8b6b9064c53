//! Request id generation and correlation keys.
//!
//! Ids combine a per-client random prefix with a short random suffix, so
//! independent clients never need to coordinate. Batches are matched back to
//! their sender by a [`CorrelationKey`] hashed from the member ids; the key
//! is local bookkeeping and never goes on the wire.

use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

use crate::request::{JsonRpcRequest, JsonRpcResponse, RpcId};

const RANDOM_LEN: usize = 8;

fn random_string(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Generates string ids of the form `<kind>-<prefix>-<suffix>`.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
}

impl IdGenerator {
    /// `kind` names the client, e.g. `"http-client"` or `"ws-client"`.
    pub fn new(kind: &str) -> Self {
        Self {
            prefix: format!("{kind}-{}", random_string(RANDOM_LEN)),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// A fresh id for one request.
    pub fn next_id(&self) -> RpcId {
        RpcId::String(format!("{}-{}", self.prefix, random_string(RANDOM_LEN)))
    }
}

/// Lookup key for an in-flight request or batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// A single request, keyed by its id.
    Single(RpcId),
    /// Two or more requests, keyed by a hash of their ids.
    Batch(String),
}

impl CorrelationKey {
    /// Key for a set of ids; independent of their order.
    pub fn for_ids<'a, I>(ids: I) -> Self
    where
        I: IntoIterator<Item = &'a RpcId>,
    {
        let ids: Vec<&RpcId> = ids.into_iter().collect();
        if let [id] = ids.as_slice() {
            return Self::Single((*id).clone());
        }
        let mut tagged: Vec<String> = ids.into_iter().map(tag).collect();
        tagged.sort_unstable();
        let mut hasher = Sha256::new();
        for id in &tagged {
            hasher.update(id.as_bytes());
            hasher.update([0u8]);
        }
        Self::Batch(hex::encode(hasher.finalize()))
    }

    pub fn for_requests(requests: &[JsonRpcRequest]) -> Self {
        Self::for_ids(requests.iter().map(|r| &r.id))
    }

    pub fn for_responses(responses: &[JsonRpcResponse]) -> Self {
        Self::for_ids(responses.iter().map(|r| &r.id))
    }
}

impl std::fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(id) => write!(f, "{id}"),
            Self::Batch(hash) => write!(f, "batch:{}", &hash[..hash.len().min(16)]),
        }
    }
}

fn tag(id: &RpcId) -> String {
    match id {
        RpcId::Number(n) => format!("n:{n}"),
        RpcId::String(s) => format!("s:{s}"),
        RpcId::Null => "null".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn ids_share_prefix_and_are_unique() {
        let generator = IdGenerator::new("ws-client");
        assert!(generator.prefix().starts_with("ws-client-"));

        let ids: HashSet<_> = (0..1_000).map(|_| generator.next_id()).collect();
        assert_eq!(ids.len(), 1_000);
        for id in &ids {
            match id {
                RpcId::String(s) => assert!(s.starts_with(generator.prefix())),
                other => panic!("unexpected id {other}"),
            }
        }
    }

    #[test]
    fn independent_generators_get_distinct_prefixes() {
        let a = IdGenerator::new("http-client");
        let b = IdGenerator::new("http-client");
        assert_ne!(a.prefix(), b.prefix());
    }

    #[test]
    fn single_id_key_is_the_id() {
        let id = RpcId::Number(3);
        assert_eq!(CorrelationKey::for_ids([&id]), CorrelationKey::Single(id));
        let id = RpcId::String("n:3".into());
        assert_eq!(CorrelationKey::for_ids([&id]), CorrelationKey::Single(id));
    }

    #[test]
    fn batch_key_ignores_order() {
        let ids = [RpcId::from("a"), RpcId::from("b"), RpcId::Number(1)];
        let reversed: Vec<_> = ids.iter().rev().cloned().collect();
        let k1 = CorrelationKey::for_ids(&ids);
        let k2 = CorrelationKey::for_ids(&reversed);
        assert_eq!(k1, k2);
        assert!(matches!(k1, CorrelationKey::Batch(_)));
    }

    #[test]
    fn batch_key_distinguishes_id_types() {
        let as_strings = [RpcId::from("1"), RpcId::from("2")];
        let as_numbers = [RpcId::Number(1), RpcId::Number(2)];
        assert_ne!(
            CorrelationKey::for_ids(&as_strings),
            CorrelationKey::for_ids(&as_numbers)
        );
    }
}
