//! One-shot widget resource loads.
//!
//! Each item with URL-referenced content gets a single pending load record
//! keyed by its id, covering every referenced slot. The record is
//! explicitly cancellable: removing the item drops the record, and a late
//! resolve for a cancelled id is ignored rather than racing a write into a
//! detached container. Loads never block the registry or the gesture
//! machines.

use std::collections::HashMap;

use crate::registry::{ItemId, WidgetPayload};

/// Which payload slot a request fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceSlot {
    Markup,
    Style,
    Script,
}

/// A fetch the host (or the sync pump) must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub item: ItemId,
    pub slot: ResourceSlot,
    pub url: String,
}

/// Progress reported by [`LoadQueue::resolve`].
#[derive(Debug, Clone, PartialEq)]
pub enum LoadProgress {
    /// Unknown or cancelled id, or a slot resolved twice; nothing happened.
    Ignored,
    /// More slots outstanding for this item.
    Pending,
    /// Every slot resolved; the merged payload is ready for the sandbox.
    Complete(WidgetPayload),
    /// A slot failed; the record is dropped and the item keeps a
    /// persistent error indicator.
    Failed { message: String },
}

/// Text-resource fetch primitive supplied by the host.
pub trait ResourceFetcher {
    fn fetch(&mut self, url: &str) -> std::result::Result<String, String>;
}

#[derive(Debug)]
struct PendingLoad {
    payload: WidgetPayload,
    outstanding: Vec<ResourceSlot>,
}

/// Pending load records plus the not-yet-collected request queue.
#[derive(Debug, Default)]
pub struct LoadQueue {
    pending: HashMap<ItemId, PendingLoad>,
    requests: Vec<ResourceRequest>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending load for every URL slot in the payload. Returns
    /// `false` when the payload references nothing remote.
    pub fn enqueue(&mut self, item: ItemId, payload: WidgetPayload) -> bool {
        let mut outstanding = Vec::new();
        if let Some(url) = payload.html_url.clone() {
            outstanding.push(ResourceSlot::Markup);
            self.requests.push(ResourceRequest {
                item,
                slot: ResourceSlot::Markup,
                url,
            });
        }
        if let Some(url) = payload.css_url.clone() {
            outstanding.push(ResourceSlot::Style);
            self.requests.push(ResourceRequest {
                item,
                slot: ResourceSlot::Style,
                url,
            });
        }
        if let Some(url) = payload.js_url.clone() {
            outstanding.push(ResourceSlot::Script);
            self.requests.push(ResourceRequest {
                item,
                slot: ResourceSlot::Script,
                url,
            });
        }

        if outstanding.is_empty() {
            return false;
        }
        self.pending.insert(item, PendingLoad { payload, outstanding });
        true
    }

    /// Drain the requests the host should fetch.
    pub fn take_requests(&mut self) -> Vec<ResourceRequest> {
        std::mem::take(&mut self.requests)
    }

    pub fn is_pending(&self, item: ItemId) -> bool {
        self.pending.contains_key(&item)
    }

    /// Cancel an item's load; its queued requests are dropped too.
    pub fn cancel(&mut self, item: ItemId) {
        self.pending.remove(&item);
        self.requests.retain(|request| request.item != item);
    }

    /// Cancel everything (bulk reset path).
    pub fn clear(&mut self) {
        self.pending.clear();
        self.requests.clear();
    }

    /// Feed one fetch result back in.
    pub fn resolve(
        &mut self,
        item: ItemId,
        slot: ResourceSlot,
        result: std::result::Result<String, String>,
    ) -> LoadProgress {
        let Some(pending) = self.pending.get_mut(&item) else {
            return LoadProgress::Ignored;
        };
        let Some(index) = pending.outstanding.iter().position(|&s| s == slot) else {
            return LoadProgress::Ignored;
        };

        match result {
            Ok(text) => {
                pending.outstanding.remove(index);
                match slot {
                    ResourceSlot::Markup => pending.payload.html = Some(text),
                    ResourceSlot::Style => pending.payload.css = Some(text),
                    ResourceSlot::Script => pending.payload.js = Some(text),
                }
                if pending.outstanding.is_empty() {
                    let done = self
                        .pending
                        .remove(&item)
                        .map(|load| load.payload)
                        .unwrap_or_default();
                    LoadProgress::Complete(done)
                } else {
                    LoadProgress::Pending
                }
            }
            Err(message) => {
                self.pending.remove(&item);
                LoadProgress::Failed { message }
            }
        }
    }
}
