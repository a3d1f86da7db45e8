//! The content store: single owner of the live content tree.

use crate::bus::{NotificationBus, SubscriptionId};
use crate::defaults::{default_section, default_tree};
use crate::hydrate::{overlay_blob, overlay_onto_defaults, same_shape, shape_name};
use crate::records::{next_record_id, record_id};
use parking_lot::RwLock;
use serde_json::{json, Map, Value};
use site_types::{
    keys, Clock, ContentChange, ContentError, ContentTree, KeyValueStore, SectionKey,
    SectionUpdate, SystemClock,
};
use std::sync::Arc;

pub const CONTENT_EXPORT_VERSION: &str = "1.0";

/// Owns the content tree, hydrates it lazily from the Persistent Store, writes the
/// whole tree back on every change and publishes a [`ContentChange`] afterwards.
///
/// A write that the store rejects is rolled back in memory, so readers never see
/// a value that would vanish on reload. Publishing happens after the tree lock is
/// released, so handlers are free to read the store.
///
/// Each process holds its own copy; writes from another process sharing the same
/// storage become visible only through [`ContentStore::reload`].
pub struct ContentStore {
    kv: Arc<dyn KeyValueStore>,
    bus: Arc<NotificationBus<ContentChange>>,
    clock: Arc<dyn Clock>,
    defaults: ContentTree,
    tree: RwLock<Option<ContentTree>>,
}

impl ContentStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, bus: Arc<NotificationBus<ContentChange>>) -> Self {
        Self::with_clock(kv, bus, Arc::new(SystemClock))
    }

    pub fn with_clock(
        kv: Arc<dyn KeyValueStore>,
        bus: Arc<NotificationBus<ContentChange>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            kv,
            bus,
            clock,
            defaults: default_tree(),
            tree: RwLock::new(None),
        }
    }

    pub fn bus(&self) -> &Arc<NotificationBus<ContentChange>> {
        &self.bus
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&ContentChange) + Send + Sync + 'static,
    {
        self.bus.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    fn load(&self) -> ContentTree {
        match self.kv.get(keys::CONTENT) {
            Ok(Some(blob)) => overlay_blob(&self.defaults, &blob),
            Ok(None) => self.defaults.clone(),
            Err(e) => {
                tracing::warn!(error = %e, "content storage unreadable, using defaults");
                self.defaults.clone()
            }
        }
    }

    /// (Re)read the stored blob and overlay it onto the defaults. Never fails:
    /// anything unreadable degrades to the compiled-in values.
    pub fn hydrate(&self) {
        let tree = self.load();
        *self.tree.write() = Some(tree);
    }

    fn read<R>(&self, f: impl FnOnce(&ContentTree) -> R) -> R {
        {
            let guard = self.tree.read();
            if let Some(tree) = guard.as_ref() {
                return f(tree);
            }
        }
        let mut guard = self.tree.write();
        let tree = guard.get_or_insert_with(|| self.load());
        f(tree)
    }

    /// Current value of `section`; the compiled-in default if nothing overrides it.
    pub fn get(&self, section: SectionKey) -> Value {
        self.read(|tree| tree.get(section.as_str()).cloned())
            .unwrap_or_else(|| default_section(section))
    }

    /// Copy of the whole tree, including sections this build does not know.
    pub fn snapshot(&self) -> ContentTree {
        self.read(|tree| tree.clone())
    }

    fn persist(&self, tree: &ContentTree) -> Result<(), ContentError> {
        let blob =
            serde_json::to_string(tree).map_err(|e| ContentError::Serialization(e.to_string()))?;
        self.kv.set(keys::CONTENT, &blob)?;
        Ok(())
    }

    fn check_shape(&self, section: SectionKey, value: &Value) -> Result<(), ContentError> {
        match self.defaults.get(section.as_str()) {
            Some(default) if !same_shape(default, value) => Err(ContentError::ShapeMismatch {
                section,
                expected: shape_name(default),
            }),
            _ => Ok(()),
        }
    }

    /// Read-modify-write of one section. `f` returns the new section value, the
    /// payload to publish and the caller's result. On a failed write the old
    /// value is restored and nothing is published.
    fn commit_section<R>(
        &self,
        section: SectionKey,
        f: impl FnOnce(&Value) -> Result<(Value, Value, R), ContentError>,
    ) -> Result<R, ContentError> {
        let (change, out) = {
            let mut guard = self.tree.write();
            let tree = guard.get_or_insert_with(|| self.load());
            let key = section.as_str();
            let current = tree
                .get(key)
                .cloned()
                .unwrap_or_else(|| default_section(section));
            let (next, payload, out) = f(&current)?;
            self.check_shape(section, &next)?;
            let previous = tree.insert(key.to_string(), next);
            if let Err(e) = self.persist(tree) {
                match previous {
                    Some(v) => {
                        tree.insert(key.to_string(), v);
                    }
                    None => {
                        tree.remove(key);
                    }
                }
                tracing::warn!(section = %section, error = %e, "content write failed, rolled back");
                return Err(e);
            }
            (
                ContentChange {
                    section,
                    data: payload,
                },
                out,
            )
        };
        tracing::debug!(section = %section, "content updated");
        self.bus.publish(&change);
        Ok(out)
    }

    /// Swap in a whole tree, persist it, then notify every known section.
    fn replace_all(&self, next: ContentTree) -> Result<(), ContentError> {
        let changes: Vec<ContentChange> = {
            let mut guard = self.tree.write();
            if let Err(e) = self.persist(&next) {
                tracing::warn!(error = %e, "content write failed, kept previous tree");
                return Err(e);
            }
            let changes = SectionKey::ALL
                .iter()
                .map(|k| ContentChange {
                    section: *k,
                    data: next
                        .get(k.as_str())
                        .cloned()
                        .unwrap_or_else(|| default_section(*k)),
                })
                .collect();
            *guard = Some(next);
            changes
        };
        for change in &changes {
            self.bus.publish(change);
        }
        Ok(())
    }

    /// Apply `update` to `section`: objects merge shallowly at the top level,
    /// anything else replaces the section. Persists, then publishes
    /// `{section, data}` where `data` is the value passed in.
    pub fn update(&self, section: SectionKey, update: SectionUpdate) -> Result<(), ContentError> {
        self.commit_section(section, |current| {
            Ok((update.apply(Some(current)), update.payload(), ()))
        })
    }

    /// Discard all overrides, including unknown sections, and restore the defaults.
    pub fn reset(&self) -> Result<(), ContentError> {
        self.replace_all(self.defaults.clone())?;
        tracing::info!("content reset to defaults");
        Ok(())
    }

    /// Append `record` to a list section under a fresh id (`max + 1`, or a
    /// millisecond timestamp for an empty list). Any id the caller set is ignored.
    /// Returns the stored record.
    pub fn insert_record(&self, section: SectionKey, record: Value) -> Result<Value, ContentError> {
        if !section.is_list() {
            return Err(ContentError::NotAList(section));
        }
        let Value::Object(mut fields) = record else {
            return Err(ContentError::InvalidRecord(
                "record must be a JSON object".to_string(),
            ));
        };
        let now = self.clock.now().timestamp_millis();
        self.commit_section(section, move |current| {
            let mut items = current.as_array().cloned().unwrap_or_default();
            let id = next_record_id(&items, now);
            fields.insert("id".to_string(), json!(id));
            let stored = Value::Object(fields);
            items.push(stored.clone());
            let next = Value::Array(items);
            Ok((next.clone(), next, stored))
        })
    }

    /// Shallow-merge `patch` into the record with `id`. The id itself cannot change.
    pub fn update_record(
        &self,
        section: SectionKey,
        id: i64,
        patch: Map<String, Value>,
    ) -> Result<Value, ContentError> {
        if !section.is_list() {
            return Err(ContentError::NotAList(section));
        }
        self.commit_section(section, move |current| {
            let mut items = current.as_array().cloned().unwrap_or_default();
            let record = items
                .iter_mut()
                .find(|r| record_id(r) == Some(id))
                .ok_or(ContentError::RecordNotFound { section, id })?;
            if let Value::Object(fields) = record {
                for (k, v) in patch {
                    if k != "id" {
                        fields.insert(k, v);
                    }
                }
            }
            let updated = record.clone();
            let next = Value::Array(items);
            Ok((next.clone(), next, updated))
        })
    }

    /// Remove the record with `id`. Returns false, without writing, if it is absent.
    pub fn delete_record(&self, section: SectionKey, id: i64) -> Result<bool, ContentError> {
        if !section.is_list() {
            return Err(ContentError::NotAList(section));
        }
        let result = self.commit_section(section, move |current| {
            let mut items = current.as_array().cloned().unwrap_or_default();
            let before = items.len();
            items.retain(|r| record_id(r) != Some(id));
            if items.len() == before {
                return Err(ContentError::RecordNotFound { section, id });
            }
            let next = Value::Array(items);
            Ok((next.clone(), next, ()))
        });
        match result {
            Ok(()) => Ok(true),
            Err(ContentError::RecordNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Backup document: `{version, exportedAt, content}`.
    pub fn export_content(&self) -> Value {
        json!({
            "version": CONTENT_EXPORT_VERSION,
            "exportedAt": self.clock.now().to_rfc3339(),
            "content": Value::Object(self.snapshot()),
        })
    }

    /// Replace the tree from a backup document. Documents without a version
    /// marker or a `content` object are rejected whole.
    pub fn import_content(&self, doc: &Value) -> Result<(), ContentError> {
        if !doc.get("version").map(Value::is_string).unwrap_or(false) {
            return Err(ContentError::ImportValidation(
                "missing version marker".to_string(),
            ));
        }
        let content = doc
            .get("content")
            .filter(|c| c.is_object())
            .ok_or_else(|| ContentError::ImportValidation("missing content object".to_string()))?;
        let tree = overlay_onto_defaults(&self.defaults, content);
        self.replace_all(tree)?;
        tracing::info!("content imported from backup");
        Ok(())
    }

    /// Re-read storage (e.g. after another process wrote to it) and publish a
    /// change for every known section whose value differs. Returns that count.
    pub fn reload(&self) -> usize {
        let fresh = self.load();
        let changes: Vec<ContentChange> = {
            let mut guard = self.tree.write();
            let previous = guard.replace(fresh.clone());
            match previous {
                None => Vec::new(),
                Some(old) => SectionKey::ALL
                    .iter()
                    .filter(|k| old.get(k.as_str()) != fresh.get(k.as_str()))
                    .map(|k| ContentChange {
                        section: *k,
                        data: fresh
                            .get(k.as_str())
                            .cloned()
                            .unwrap_or_else(|| default_section(*k)),
                    })
                    .collect(),
            }
        };
        for change in &changes {
            self.bus.publish(change);
        }
        changes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use site_storage::{FaultyKvStore, InMemoryKvStore};
    use site_types::ManualClock;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn store_over(kv: Arc<dyn KeyValueStore>) -> ContentStore {
        ContentStore::new(kv, Arc::new(NotificationBus::new()))
    }

    fn fresh() -> (Arc<InMemoryKvStore>, ContentStore) {
        let kv = Arc::new(InMemoryKvStore::new());
        let store = store_over(kv.clone());
        (kv, store)
    }

    #[test]
    fn empty_storage_yields_defaults_for_every_section() {
        let (_, store) = fresh();
        for key in SectionKey::ALL {
            assert_eq!(store.get(key), default_section(key));
        }
    }

    #[test]
    fn object_update_merges_top_level_only() {
        let (_, store) = fresh();
        let stats_before = store.get(SectionKey::HomePage)["stats"].clone();
        let hero = json!({"title": "New title"});
        store
            .update(
                SectionKey::HomePage,
                SectionUpdate::from_value(json!({"hero": hero})),
            )
            .unwrap();
        let home = store.get(SectionKey::HomePage);
        assert_eq!(home["hero"], hero);
        assert_eq!(home["stats"], stats_before);
        assert!(home["hero"].get("subtitle").is_none());
    }

    #[test]
    fn array_update_replaces() {
        let (_, store) = fresh();
        let next = json!([{"id": 1, "title": "Only"}]);
        store
            .update(SectionKey::Services, SectionUpdate::ReplaceValue(next.clone()))
            .unwrap();
        assert_eq!(store.get(SectionKey::Services), next);
    }

    #[test]
    fn update_persists_for_the_next_instance() {
        let (kv, store) = fresh();
        store
            .update(
                SectionKey::Contact,
                SectionUpdate::from_value(json!({"phone": "+1 555 0199"})),
            )
            .unwrap();
        let reopened = store_over(kv);
        assert_eq!(reopened.get(SectionKey::Contact)["phone"], "+1 555 0199");
        assert_eq!(
            reopened.get(SectionKey::Contact)["email"],
            default_section(SectionKey::Contact)["email"]
        );
    }

    #[test]
    fn notification_fires_once_per_update_with_payload() {
        let (_, store) = fresh();
        let seen: Arc<Mutex<Vec<ContentChange>>> = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        store.subscribe(move |c| s.lock().push(c.clone()));
        for i in 0..5 {
            store
                .update(
                    SectionKey::Theme,
                    SectionUpdate::from_value(json!({"primaryColor": format!("#00000{}", i)})),
                )
                .unwrap();
        }
        let seen = seen.lock();
        assert_eq!(seen.len(), 5);
        assert_eq!(seen[4].section, SectionKey::Theme);
        assert_eq!(seen[4].data, json!({"primaryColor": "#000004"}));
    }

    #[test]
    fn handlers_observe_post_update_state() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let store = Arc::new(store_over(kv));
        let observed = Arc::new(Mutex::new(None));
        let (st, ob) = (Arc::clone(&store), Arc::clone(&observed));
        store.subscribe(move |_| *ob.lock() = Some(st.get(SectionKey::Faq)));
        let faq = json!([{"id": 1, "question": "q", "answer": "a"}]);
        store
            .update(SectionKey::Faq, SectionUpdate::ReplaceValue(faq.clone()))
            .unwrap();
        assert_eq!(observed.lock().clone(), Some(faq));
    }

    #[test]
    fn failed_write_rolls_back_and_keeps_stored_blob() {
        let inner = Arc::new(InMemoryKvStore::new());
        let faulty = Arc::new(FaultyKvStore::new(inner.clone()));
        let store = store_over(faulty.clone());
        store
            .update(
                SectionKey::About,
                SectionUpdate::from_value(json!({"title": "Saved"})),
            )
            .unwrap();
        let blob_before = inner.get(keys::CONTENT).unwrap();

        let published = Arc::new(AtomicUsize::new(0));
        let p = Arc::clone(&published);
        store.subscribe(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });

        faulty.fail_nth_write(1);
        let err = store
            .update(
                SectionKey::About,
                SectionUpdate::from_value(json!({"title": "Lost"})),
            )
            .unwrap_err();
        assert!(matches!(err, ContentError::Storage(ref s) if s.is_quota()));
        assert_eq!(store.get(SectionKey::About)["title"], "Saved");
        assert_eq!(inner.get(keys::CONTENT).unwrap(), blob_before);
        assert_eq!(published.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn quota_exhaustion_from_inline_bytes_is_recoverable() {
        let kv = Arc::new(InMemoryKvStore::with_quota(16 * 1024));
        let store = store_over(kv);
        let big_photo = format!("data:image/png;base64,{}", "A".repeat(32 * 1024));
        let err = store
            .insert_record(SectionKey::Team, json!({"name": "New", "photo": big_photo}))
            .unwrap_err();
        assert!(matches!(err, ContentError::Storage(_)));
        assert_eq!(store.get(SectionKey::Team), default_section(SectionKey::Team));
        store
            .insert_record(SectionKey::Team, json!({"name": "New", "photo": "team/a.png"}))
            .unwrap();
    }

    #[test]
    fn unavailable_storage_reads_defaults_and_rejects_writes() {
        let faulty = Arc::new(FaultyKvStore::new(Arc::new(InMemoryKvStore::new())));
        faulty.set_unavailable(true);
        let store = store_over(faulty);
        assert_eq!(
            store.get(SectionKey::Services),
            default_section(SectionKey::Services)
        );
        assert!(store
            .update(SectionKey::Services, SectionUpdate::ReplaceValue(json!([])))
            .is_err());
        assert_eq!(
            store.get(SectionKey::Services),
            default_section(SectionKey::Services)
        );
    }

    #[test]
    fn corrupt_blob_falls_back_to_defaults() {
        let kv = Arc::new(InMemoryKvStore::new());
        kv.set(keys::CONTENT, "{\"services\": [").unwrap();
        let store = store_over(kv);
        assert_eq!(
            store.get(SectionKey::Services),
            default_section(SectionKey::Services)
        );
    }

    #[test]
    fn wrong_shape_updates_are_rejected() {
        let (_, store) = fresh();
        let err = store
            .update(
                SectionKey::Services,
                SectionUpdate::from_value(json!({"title": "x"})),
            )
            .unwrap_err();
        assert!(matches!(err, ContentError::ShapeMismatch { .. }));
        let err = store
            .update(SectionKey::HomePage, SectionUpdate::ReplaceValue(json!([])))
            .unwrap_err();
        assert!(matches!(err, ContentError::ShapeMismatch { .. }));
    }

    #[test]
    fn inserts_never_reuse_ids_across_deletes() {
        let (_, store) = fresh();
        let mut live: Vec<i64> = Vec::new();
        for i in 0..1000 {
            let rec = store
                .insert_record(SectionKey::Gallery, json!({"title": format!("img {}", i), "id": 1}))
                .unwrap();
            let id = rec["id"].as_i64().unwrap();
            live.push(id);
            if i % 3 == 0 {
                let victim = live.remove(live.len() / 2);
                assert!(store.delete_record(SectionKey::Gallery, victim).unwrap());
            }
            let items = store.get(SectionKey::Gallery);
            let ids: Vec<i64> = items
                .as_array()
                .unwrap()
                .iter()
                .filter_map(record_id)
                .collect();
            let unique: HashSet<i64> = ids.iter().copied().collect();
            assert_eq!(unique.len(), ids.len());
            assert_ne!(id, 1, "caller-supplied id must be ignored");
        }
        let defaults = default_section(SectionKey::Gallery).as_array().unwrap().len();
        assert_eq!(
            store.get(SectionKey::Gallery).as_array().unwrap().len(),
            defaults + live.len()
        );
    }

    #[test]
    fn insert_into_empty_list_uses_clock() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let clock = Arc::new(ManualClock::default());
        let store = ContentStore::with_clock(kv, Arc::new(NotificationBus::new()), clock.clone());
        store
            .update(SectionKey::Clients, SectionUpdate::ReplaceValue(json!([])))
            .unwrap();
        let rec = store
            .insert_record(SectionKey::Clients, json!({"name": "First"}))
            .unwrap();
        assert_eq!(rec["id"], json!(clock.now().timestamp_millis()));
    }

    #[test]
    fn insert_after_the_largest_id_still_yields_unique_ids() {
        let (_, store) = fresh();
        store
            .update(
                SectionKey::Clients,
                SectionUpdate::ReplaceValue(json!([{"id": i64::MAX, "name": "Last"}])),
            )
            .unwrap();
        for name in ["A", "B"] {
            store
                .insert_record(SectionKey::Clients, json!({ "name": name }))
                .unwrap();
        }
        let ids: Vec<i64> = store
            .get(SectionKey::Clients)
            .as_array()
            .unwrap()
            .iter()
            .filter_map(record_id)
            .collect();
        assert_eq!(ids, vec![i64::MAX, 1, 2]);
    }

    #[test]
    fn record_update_and_delete() {
        let (_, store) = fresh();
        let mut patch = Map::new();
        patch.insert("position".into(), json!("Partner"));
        patch.insert("id".into(), json!(99));
        let updated = store.update_record(SectionKey::Team, 2, patch).unwrap();
        assert_eq!(updated["id"], 2);
        assert_eq!(updated["position"], "Partner");
        assert_eq!(updated["name"], "Daniel Reyes");

        assert!(matches!(
            store.update_record(SectionKey::Team, 404, Map::new()),
            Err(ContentError::RecordNotFound { id: 404, .. })
        ));
        assert!(store.delete_record(SectionKey::Team, 2).unwrap());
        assert!(!store.delete_record(SectionKey::Team, 2).unwrap());
        assert!(matches!(
            store.insert_record(SectionKey::Theme, json!({})),
            Err(ContentError::NotAList(SectionKey::Theme))
        ));
    }

    #[test]
    fn reset_restores_defaults_and_notifies() {
        let (kv, store) = fresh();
        store
            .update(SectionKey::Services, SectionUpdate::ReplaceValue(json!([])))
            .unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        store.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        store.reset().unwrap();
        assert_eq!(
            store.get(SectionKey::Services),
            default_section(SectionKey::Services)
        );
        assert_eq!(count.load(Ordering::SeqCst), SectionKey::ALL.len());
        assert_eq!(
            store_over(kv).get(SectionKey::Services),
            default_section(SectionKey::Services)
        );
    }

    #[test]
    fn export_then_import_restores_content() {
        let (_, store) = fresh();
        store
            .update(SectionKey::Seo, SectionUpdate::from_value(json!({"title": "T"})))
            .unwrap();
        let backup = store.export_content();
        store.reset().unwrap();
        store.import_content(&backup).unwrap();
        assert_eq!(store.get(SectionKey::Seo)["title"], "T");

        assert!(matches!(
            store.import_content(&json!({"content": {}})),
            Err(ContentError::ImportValidation(_))
        ));
        assert!(matches!(
            store.import_content(&json!({"version": "1.0", "content": []})),
            Err(ContentError::ImportValidation(_))
        ));
        assert_eq!(store.get(SectionKey::Seo)["title"], "T");
    }

    #[test]
    fn reload_picks_up_writes_from_another_instance() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let tab_a = store_over(kv.clone());
        let tab_b = store_over(kv);
        assert_eq!(tab_b.get(SectionKey::Faq), default_section(SectionKey::Faq));

        tab_a
            .update(SectionKey::Faq, SectionUpdate::ReplaceValue(json!([])))
            .unwrap();
        assert_ne!(tab_b.get(SectionKey::Faq), json!([]));

        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        tab_b.subscribe(move |c| s.lock().push(c.section));
        assert_eq!(tab_b.reload(), 1);
        assert_eq!(tab_b.get(SectionKey::Faq), json!([]));
        assert_eq!(*seen.lock(), vec![SectionKey::Faq]);
    }

    #[test]
    fn services_end_to_end() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKvStore::new());
        let store = store_over(kv);
        let services = store.get(SectionKey::Services);
        let mut list = services.as_array().unwrap().clone();
        assert_eq!(list.len(), 5);

        let last_seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
        let view = Arc::clone(&last_seen);
        store.subscribe(move |c| {
            if c.section == SectionKey::Services {
                *view.lock() = Some(c.data.clone());
            }
        });

        list.push(json!({"id": 6, "title": "Fractional CFO", "description": "d"}));
        let next = Value::Array(list);
        store
            .update(SectionKey::Services, SectionUpdate::from_value(next.clone()))
            .unwrap();
        assert_eq!(store.get(SectionKey::Services).as_array().unwrap().len(), 6);
        assert_eq!(last_seen.lock().clone(), Some(next));
    }
}
