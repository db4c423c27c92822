// src/retry.rs

//! Batch-with-per-item-fallback strategy
//!
//! Expensive transactional operations (each rpm-ostree karg change stages a
//! new bootable root) are first attempted as a single batch. If the batch
//! fails, the same items are retried one at a time with independent
//! outcomes, so a single bad item cannot block the rest. Partial success
//! is a first-class return value here, not something inferred from logs.

use tracing::{info, warn};

/// Result for one item after the fallback pass.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub item: String,
    pub ok: bool,
}

/// Aggregate result of a batch-then-fallback application.
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// Whether the single batch attempt succeeded (no fallback needed)
    pub batch_succeeded: bool,
    pub items: Vec<ItemOutcome>,
}

impl BatchOutcome {
    pub fn all_ok(&self) -> bool {
        self.items.iter().all(|i| i.ok)
    }

    pub fn succeeded(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| i.ok)
            .map(|i| i.item.clone())
            .collect()
    }

    pub fn failed(&self) -> Vec<String> {
        self.items
            .iter()
            .filter(|i| !i.ok)
            .map(|i| i.item.clone())
            .collect()
    }
}

/// Attempt `batch` over all items at once; on failure, run `per_item` for
/// each item independently.
///
/// An empty item list is vacuous success and invokes neither closure.
pub fn batch_with_fallback<B, F>(items: &[String], batch: B, mut per_item: F) -> BatchOutcome
where
    B: FnOnce(&[String]) -> bool,
    F: FnMut(&str) -> bool,
{
    if items.is_empty() {
        return BatchOutcome {
            batch_succeeded: true,
            items: Vec::new(),
        };
    }

    if batch(items) {
        return BatchOutcome {
            batch_succeeded: true,
            items: items
                .iter()
                .map(|i| ItemOutcome {
                    item: i.clone(),
                    ok: true,
                })
                .collect(),
        };
    }

    warn!(
        "Batch application of {} items failed, falling back to individual mode",
        items.len()
    );

    let mut outcomes = Vec::with_capacity(items.len());
    for item in items {
        let ok = per_item(item);
        if ok {
            info!("Applied individually: {}", item);
        } else {
            warn!("Failed individually: {}", item);
        }
        outcomes.push(ItemOutcome {
            item: item.clone(),
            ok,
        });
    }

    BatchOutcome {
        batch_succeeded: false,
        items: outcomes,
    }
}
