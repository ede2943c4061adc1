//! Authoritative in-memory pin list for the open map, and the sync layer
//! that keeps it consistent with the remote store.
//!
//! Local edits are applied optimistically. Each entry remembers the last
//! server-confirmed copy of its pin plus a version counter, so a late
//! confirmation can be recognised as stale and a failed update can be
//! rolled back.
use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::future::Future;
use std::ops::Deref;
use std::rc::Rc;

use tracing::{debug, info, warn};

use crate::calendar::DateSystem;
use crate::error::{MapError, SyncAction};
use crate::models::{ImagePoint, MapId, NewPin, PendingPlacement, Pin, PinId, PinPatch, Visibility};

/// Remote pin persistence. Errors are plain messages from the transport or
/// the server.
#[allow(async_fn_in_trait)]
pub trait PinRepository {
    async fn list_pins(&self, map: &MapId) -> Result<Vec<Pin>, String>;

    async fn create_pin(&self, map: &MapId, pin: &NewPin) -> Result<Pin, String>;

    async fn update_pin(&self, id: &PinId, patch: &PinPatch) -> Result<Pin, String>;

    async fn delete_pin(&self, id: &PinId) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Viewer {
    Gm,
    Player,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFilter {
    pub viewer: Viewer,
    /// Only meaningful for a GM, who may hide their own pins for a while.
    pub show_gm_pins: bool,
}

impl PinFilter {
    pub fn for_viewer(viewer: Viewer) -> Self {
        PinFilter {
            viewer,
            show_gm_pins: true,
        }
    }

    pub fn admits(&self, pin: &Pin) -> bool {
        match pin.visibility {
            Visibility::Players => true,
            Visibility::Gm => self.viewer == Viewer::Gm && self.show_gm_pins,
        }
    }
}

/// Pins that passed a [`PinFilter`], in store order. Only the store can
/// produce one, so anything taking `&VisiblePins` cannot see a pin the
/// viewer is not allowed to.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisiblePins(Vec<Pin>);

impl VisiblePins {
    pub fn get(&self, id: &PinId) -> Option<&Pin> {
        self.0.iter().find(|pin| &pin.id == id)
    }
}

impl Deref for VisiblePins {
    type Target = [Pin];

    fn deref(&self) -> &[Pin] {
        &self.0
    }
}

/// Handed out by [`PinStore::begin_update`]; its confirmation only lands if
/// no newer update was issued for the pin in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateTicket {
    pub pin_id: PinId,
    version: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    /// What the UI sees, optimistic edits included.
    pin: Pin,
    /// Last copy the server confirmed.
    confirmed: Pin,
    /// Bumped on every local update.
    version: u64,
    /// Version of the update `confirmed` came from.
    confirmed_version: u64,
}

impl Entry {
    fn confirmed(pin: Pin, version: u64) -> Self {
        Entry {
            confirmed: pin.clone(),
            pin,
            version,
            confirmed_version: version,
        }
    }
}

/// Taken when a reload request goes out. Removals made after that point
/// win over the pins the reload returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadMark(u64);

#[derive(Debug, Clone, Copy)]
struct Tombstone {
    removed_at: u64,
    /// The server confirmed the delete.
    settled: bool,
}

impl Tombstone {
    fn hides_from(&self, mark: ReloadMark) -> bool {
        !self.settled || self.removed_at > mark.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct PinStore {
    entries: Vec<Entry>,
    next_version: u64,
    removals: u64,
    /// Locally deleted pins. Held until a reload that started after the
    /// delete went through, so no older server snapshot brings them back.
    tombstones: BTreeMap<PinId, Tombstone>,
}

impl PinStore {
    pub fn new() -> Self {
        PinStore::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pins(&self) -> impl Iterator<Item = &Pin> {
        self.entries.iter().map(|entry| &entry.pin)
    }

    pub fn get(&self, id: &PinId) -> Option<&Pin> {
        self.entry(id).map(|entry| &entry.pin)
    }

    /// Last server-confirmed copy of a pin.
    pub fn confirmed(&self, id: &PinId) -> Option<&Pin> {
        self.entry(id).map(|entry| &entry.confirmed)
    }

    pub fn visible(&self, filter: &PinFilter) -> VisiblePins {
        VisiblePins(self.pins().filter(|pin| filter.admits(pin)).cloned().collect())
    }

    pub fn reload_mark(&self) -> ReloadMark {
        ReloadMark(self.removals)
    }

    /// Replace the whole list with a snapshot that is current right now.
    pub fn replace_all(&mut self, pins: Vec<Pin>) {
        let mark = self.reload_mark();
        self.apply_reload(pins, mark);
    }

    /// Replace the whole list with a snapshot requested at `mark`. Pins
    /// removed since then stay removed. Both version counters survive for
    /// pins that are still present, so in-flight confirmations are judged
    /// against the same baseline as before the reload.
    pub fn apply_reload(&mut self, pins: Vec<Pin>, mark: ReloadMark) {
        let tombstones = &self.tombstones;
        let previous = std::mem::take(&mut self.entries);
        self.entries = pins
            .into_iter()
            .filter(|pin| !tombstones.get(&pin.id).is_some_and(|t| t.hides_from(mark)))
            .map(|pin| match previous.iter().find(|entry| entry.pin.id == pin.id) {
                Some(old) => Entry {
                    confirmed: pin.clone(),
                    pin,
                    version: old.version,
                    confirmed_version: old.confirmed_version,
                },
                None => Entry::confirmed(pin, 0),
            })
            .collect();
        self.tombstones.retain(|_, t| t.hides_from(mark));
    }

    /// Add or overwrite a pin the server just returned.
    pub fn insert_confirmed(&mut self, pin: Pin) {
        let version = self.bump();
        match self.entry_mut(&pin.id) {
            Some(entry) => *entry = Entry::confirmed(pin, version),
            None => self.entries.push(Entry::confirmed(pin, version)),
        }
    }

    /// Apply `patch` locally right away.
    pub fn begin_update(&mut self, id: &PinId, patch: &PinPatch) -> Result<UpdateTicket, MapError> {
        let version = self.bump();
        let entry = self
            .entry_mut(id)
            .ok_or_else(|| MapError::UnknownPin(id.clone()))?;
        entry.pin.apply(patch);
        entry.version = version;
        Ok(UpdateTicket {
            pin_id: id.clone(),
            version,
        })
    }

    /// Record the server's answer to an update. The pin only takes the
    /// server copy if no newer local update happened since; the pin being
    /// gone or superseded yields [`MapError::StaleConfirmation`].
    pub fn confirm_update(&mut self, ticket: &UpdateTicket, server_pin: Pin) -> Result<(), MapError> {
        let stale = || MapError::StaleConfirmation(ticket.pin_id.clone());
        let entry = self.entry_mut(&ticket.pin_id).ok_or_else(stale)?;
        if ticket.version > entry.confirmed_version {
            entry.confirmed = server_pin.clone();
            entry.confirmed_version = ticket.version;
        }
        if entry.version != ticket.version {
            return Err(stale());
        }
        entry.pin = server_pin;
        Ok(())
    }

    /// Drop every optimistic edit on one pin.
    pub fn rollback(&mut self, id: &PinId) -> bool {
        match self.entry_mut(id) {
            Some(entry) => {
                entry.pin = entry.confirmed.clone();
                true
            }
            None => false,
        }
    }

    /// Remove locally and hold the id back from reloads.
    pub fn remove(&mut self, id: &PinId) -> Option<Pin> {
        let index = self.entries.iter().position(|entry| &entry.pin.id == id)?;
        self.removals += 1;
        self.tombstones.insert(
            id.clone(),
            Tombstone {
                removed_at: self.removals,
                settled: false,
            },
        );
        Some(self.entries.remove(index).pin)
    }

    /// Record the server's answer to a delete. A rejected delete lifts the
    /// tombstone so the next reload restores the pin.
    pub fn settle_delete(&mut self, id: &PinId, deleted: bool) {
        if deleted {
            if let Some(tombstone) = self.tombstones.get_mut(id) {
                tombstone.settled = true;
            }
        } else {
            self.tombstones.remove(id);
        }
    }

    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn entry(&self, id: &PinId) -> Option<&Entry> {
        self.entries.iter().find(|entry| &entry.pin.id == id)
    }

    fn entry_mut(&mut self, id: &PinId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|entry| &entry.pin.id == id)
    }
}

/// How an update that was accepted by the server ended locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Applied,
    /// The pin was deleted or edited again before the answer arrived.
    Discarded,
}

/// Drives a [`PinRepository`] for one map and keeps the shared [`PinStore`]
/// in step. Cheap to clone; clones share the store.
pub struct PinSync<R> {
    map: MapId,
    repo: Rc<R>,
    store: Rc<RefCell<PinStore>>,
}

impl<R> Clone for PinSync<R> {
    fn clone(&self) -> Self {
        PinSync {
            map: self.map.clone(),
            repo: Rc::clone(&self.repo),
            store: Rc::clone(&self.store),
        }
    }
}

impl<R: PinRepository + 'static> PinSync<R> {
    pub fn new(map: MapId, repo: R) -> Self {
        PinSync {
            map,
            repo: Rc::new(repo),
            store: Rc::new(RefCell::new(PinStore::new())),
        }
    }

    pub fn map(&self) -> &MapId {
        &self.map
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Read access for renderers. Mutation only goes through this type.
    pub fn store(&self) -> Ref<'_, PinStore> {
        self.store.borrow()
    }

    pub fn visible(&self, filter: &PinFilter) -> VisiblePins {
        self.store.borrow().visible(filter)
    }

    pub async fn load(&self) -> Result<usize, MapError> {
        let mark = self.store.borrow().reload_mark();
        let pins = self.repo.list_pins(&self.map).await.map_err(|message| {
            warn!(map = %self.map, %message, "loading pins failed");
            MapError::persistence(SyncAction::Load, message)
        })?;
        let count = pins.len();
        self.store.borrow_mut().apply_reload(pins, mark);
        info!(map = %self.map, count, "pins loaded");
        Ok(count)
    }

    /// Create a pin from a pending placement. Nothing is added locally until
    /// the server has assigned an id; on failure the caller keeps the
    /// placement so the user can retry.
    pub async fn place_pin<D: DateSystem>(&self, pending: &PendingPlacement, dates: &D) -> Result<Pin, MapError> {
        let new_pin = pending.to_new_pin(dates)?;
        let pin = self.repo.create_pin(&self.map, &new_pin).await.map_err(|message| {
            warn!(map = %self.map, %message, "creating pin failed");
            MapError::persistence(SyncAction::Create, message)
        })?;
        info!(pin = %pin.id, title = %pin.title, "pin created");
        self.store.borrow_mut().insert_confirmed(pin.clone());
        Ok(pin)
    }

    /// Move a pin. The new position is visible in the store as soon as this
    /// returns; the returned future persists it.
    pub fn move_pin(&self, id: &PinId, to: ImagePoint) -> impl Future<Output = Result<SyncOutcome, MapError>> + 'static {
        let started = if to.is_within_bounds() {
            self.begin(id, PinPatch::position(to))
        } else {
            Err(MapError::OutOfBounds { x: to.x, y: to.y })
        };
        let sync = self.clone();
        async move {
            let (ticket, patch) = started?;
            sync.finish_update(ticket, patch, SyncAction::Move).await
        }
    }

    /// Edit any subset of a pin's fields, with the same optimistic rules as
    /// [`PinSync::move_pin`].
    pub fn edit_pin(&self, id: &PinId, patch: PinPatch) -> impl Future<Output = Result<SyncOutcome, MapError>> + 'static {
        let started = validate_patch(&patch).and_then(|()| self.begin(id, patch));
        let sync = self.clone();
        async move {
            let (ticket, patch) = started?;
            sync.finish_update(ticket, patch, SyncAction::Edit).await
        }
    }

    /// Remove a pin locally at once and ask the server to delete it. A failed
    /// delete is reported but not rolled back; the next reload restores it.
    pub fn delete_pin(&self, id: &PinId) -> impl Future<Output = Result<(), MapError>> + 'static {
        let removed = self.store.borrow_mut().remove(id).is_some();
        let sync = self.clone();
        let id = id.clone();
        async move {
            if !removed {
                return Err(MapError::UnknownPin(id));
            }
            let result = sync.repo.delete_pin(&id).await;
            sync.store.borrow_mut().settle_delete(&id, result.is_ok());
            match result {
                Ok(()) => {
                    info!(pin = %id, "pin deleted");
                    Ok(())
                }
                Err(message) => {
                    warn!(pin = %id, %message, "deleting pin failed");
                    Err(MapError::persistence(SyncAction::Delete, message))
                }
            }
        }
    }

    fn begin(&self, id: &PinId, patch: PinPatch) -> Result<(UpdateTicket, PinPatch), MapError> {
        let ticket = self.store.borrow_mut().begin_update(id, &patch)?;
        Ok((ticket, patch))
    }

    async fn finish_update(self, ticket: UpdateTicket, patch: PinPatch, action: SyncAction) -> Result<SyncOutcome, MapError> {
        match self.repo.update_pin(&ticket.pin_id, &patch).await {
            Ok(server_pin) => match self.store.borrow_mut().confirm_update(&ticket, server_pin) {
                Ok(()) => Ok(SyncOutcome::Applied),
                Err(err) => {
                    debug!(%err, %action, "discarding confirmation");
                    Ok(SyncOutcome::Discarded)
                }
            },
            Err(message) => {
                warn!(pin = %ticket.pin_id, %action, %message, "update failed, restoring server state");
                self.recover(&ticket.pin_id).await;
                Err(MapError::persistence(action, message))
            }
        }
    }

    /// Reload everything from the server; if that fails too, fall back to
    /// this pin's last confirmed copy.
    async fn recover(&self, id: &PinId) {
        let mark = self.store.borrow().reload_mark();
        match self.repo.list_pins(&self.map).await {
            Ok(pins) => self.store.borrow_mut().apply_reload(pins, mark),
            Err(message) => {
                warn!(pin = %id, %message, "reload failed, rolling back pin");
                self.store.borrow_mut().rollback(id);
            }
        }
    }
}

fn validate_patch(patch: &PinPatch) -> Result<(), MapError> {
    if patch.is_empty() {
        return Err(MapError::Validation("nothing to update".to_string()));
    }
    if let Some(title) = &patch.title {
        if title.trim().is_empty() {
            return Err(MapError::Validation("a pin needs a title".to_string()));
        }
    }
    if let Some(at) = patch.target_position() {
        if !at.is_within_bounds() {
            return Err(MapError::OutOfBounds { x: at.x, y: at.y });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::DsaCalendar;
    use futures::channel::oneshot;
    use futures::executor::block_on;
    use futures::join;
    use std::cell::Cell;

    fn pin(id: &str, x: f64, y: f64, visibility: Visibility) -> Pin {
        Pin {
            id: PinId::new(id),
            x,
            y,
            title: id.to_string(),
            notes: None,
            related_article_id: None,
            visibility,
            date: None,
        }
    }

    /// In-memory server with switchable failures and gates that hold a
    /// response back until the test releases it.
    #[derive(Default)]
    struct ScriptedRepo {
        server: RefCell<Vec<Pin>>,
        next_id: Cell<u32>,
        calls: RefCell<Vec<String>>,
        fail_lists: Cell<bool>,
        fail_creates: Cell<bool>,
        fail_updates: Cell<bool>,
        fail_deletes: Cell<bool>,
        list_gate: RefCell<Option<oneshot::Receiver<()>>>,
        update_gate: RefCell<Option<oneshot::Receiver<()>>>,
        delete_gate: RefCell<Option<oneshot::Receiver<()>>>,
    }

    impl ScriptedRepo {
        fn with_pins(pins: Vec<Pin>) -> Self {
            ScriptedRepo {
                server: RefCell::new(pins),
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn server_pin(&self, id: &str) -> Option<Pin> {
            self.server.borrow().iter().find(|p| p.id.as_str() == id).cloned()
        }
    }

    impl PinRepository for ScriptedRepo {
        async fn list_pins(&self, _map: &MapId) -> Result<Vec<Pin>, String> {
            self.calls.borrow_mut().push("list".to_string());
            if self.fail_lists.get() {
                return Err("list unavailable".to_string());
            }
            // The snapshot is taken before the answer may be held back.
            let snapshot = self.server.borrow().clone();
            let gate = self.list_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(snapshot)
        }

        async fn create_pin(&self, _map: &MapId, new_pin: &NewPin) -> Result<Pin, String> {
            self.calls.borrow_mut().push("create".to_string());
            if self.fail_creates.get() {
                return Err("create rejected".to_string());
            }
            self.next_id.set(self.next_id.get() + 1);
            let created = Pin {
                id: PinId::new(format!("srv-{}", self.next_id.get())),
                x: new_pin.x,
                y: new_pin.y,
                title: new_pin.title.clone(),
                notes: new_pin.notes.clone(),
                related_article_id: new_pin.related_article_id.clone(),
                visibility: new_pin.visibility,
                date: new_pin.date.clone(),
            };
            self.server.borrow_mut().push(created.clone());
            Ok(created)
        }

        async fn update_pin(&self, id: &PinId, patch: &PinPatch) -> Result<Pin, String> {
            self.calls.borrow_mut().push(format!("update {id}"));
            if self.fail_updates.get() {
                return Err("timeout".to_string());
            }
            // The server applies the change, then the answer may be held back.
            let updated = {
                let mut server = self.server.borrow_mut();
                let stored = server
                    .iter_mut()
                    .find(|p| &p.id == id)
                    .ok_or_else(|| "not found".to_string())?;
                stored.apply(patch);
                stored.clone()
            };
            let gate = self.update_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            Ok(updated)
        }

        async fn delete_pin(&self, id: &PinId) -> Result<(), String> {
            self.calls.borrow_mut().push(format!("delete {id}"));
            let gate = self.delete_gate.borrow_mut().take();
            if let Some(gate) = gate {
                let _ = gate.await;
            }
            if self.fail_deletes.get() {
                return Err("forbidden".to_string());
            }
            self.server.borrow_mut().retain(|p| &p.id != id);
            Ok(())
        }
    }

    fn loaded(pins: Vec<Pin>) -> PinSync<ScriptedRepo> {
        let sync = PinSync::new(MapId::new("map-1"), ScriptedRepo::with_pins(pins));
        block_on(sync.load()).unwrap();
        sync
    }

    fn position(sync: &PinSync<ScriptedRepo>, id: &str) -> ImagePoint {
        sync.store().get(&PinId::new(id)).unwrap().position()
    }

    // --- store ---

    #[test]
    fn test_confirm_applies_only_latest_version() {
        let mut store = PinStore::new();
        store.replace_all(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let id = PinId::new("a");
        let first = store
            .begin_update(&id, &PinPatch::position(ImagePoint::new(20.0, 20.0)))
            .unwrap();
        let second = store
            .begin_update(&id, &PinPatch::position(ImagePoint::new(30.0, 30.0)))
            .unwrap();

        let server_second = pin("a", 30.0, 30.0, Visibility::Players);
        store.confirm_update(&second, server_second.clone()).unwrap();
        let late = store.confirm_update(&first, pin("a", 20.0, 20.0, Visibility::Players));
        assert_eq!(late, Err(MapError::StaleConfirmation(id.clone())));
        assert_eq!(store.get(&id), Some(&server_second));
        // The older answer must not become the rollback target either.
        assert_eq!(store.confirmed(&id), Some(&server_second));
    }

    #[test]
    fn test_confirm_for_removed_pin_is_stale() {
        let mut store = PinStore::new();
        store.replace_all(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let id = PinId::new("a");
        let ticket = store.begin_update(&id, &PinPatch::position(ImagePoint::new(1.0, 1.0))).unwrap();
        store.remove(&id);
        let result = store.confirm_update(&ticket, pin("a", 1.0, 1.0, Visibility::Players));
        assert!(matches!(result, Err(MapError::StaleConfirmation(_))));
        assert!(store.get(&id).is_none());
    }

    #[test]
    fn test_begin_update_unknown_pin() {
        let mut store = PinStore::new();
        let result = store.begin_update(&PinId::new("ghost"), &PinPatch::default());
        assert_eq!(result, Err(MapError::UnknownPin(PinId::new("ghost"))));
    }

    #[test]
    fn test_rollback_restores_confirmed_copy() {
        let mut store = PinStore::new();
        store.replace_all(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let id = PinId::new("a");
        store.begin_update(&id, &PinPatch::position(ImagePoint::new(99.0, 99.0))).unwrap();
        assert!(store.rollback(&id));
        assert_eq!(store.get(&id).unwrap().position(), ImagePoint::new(10.0, 10.0));
        assert!(!store.rollback(&PinId::new("ghost")));
    }

    #[test]
    fn test_replace_all_skips_pending_deletes() {
        let mut store = PinStore::new();
        let pins = vec![
            pin("a", 1.0, 1.0, Visibility::Players),
            pin("b", 2.0, 2.0, Visibility::Players),
        ];
        store.replace_all(pins.clone());
        store.remove(&PinId::new("a"));
        store.replace_all(pins.clone());
        assert_eq!(store.len(), 1);
        store.settle_delete(&PinId::new("a"), false);
        store.replace_all(pins);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_snapshot_older_than_delete_stays_hidden() {
        let mut store = PinStore::new();
        let pins = vec![pin("a", 1.0, 1.0, Visibility::Players)];
        store.replace_all(pins.clone());
        let before = store.reload_mark();
        store.remove(&PinId::new("a"));
        store.settle_delete(&PinId::new("a"), true);

        store.apply_reload(pins.clone(), before);
        assert!(store.is_empty());
        // A reload issued after the delete is trusted again.
        store.replace_all(pins);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_reload_keeps_confirmation_baseline() {
        let mut store = PinStore::new();
        store.replace_all(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let id = PinId::new("a");
        let ticket = store
            .begin_update(&id, &PinPatch::position(ImagePoint::new(20.0, 20.0)))
            .unwrap();

        // Answered from before the move reached the server.
        store.replace_all(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        store.confirm_update(&ticket, pin("a", 20.0, 20.0, Visibility::Players)).unwrap();
        assert_eq!(store.confirmed(&id).unwrap().position(), ImagePoint::new(20.0, 20.0));

        store.begin_update(&id, &PinPatch::position(ImagePoint::new(30.0, 30.0))).unwrap();
        store.rollback(&id);
        assert_eq!(store.get(&id).unwrap().position(), ImagePoint::new(20.0, 20.0));
    }

    // --- visibility ---

    #[test]
    fn test_player_never_sees_gm_pins() {
        let sync = loaded(vec![
            pin("secret", 5.0, 5.0, Visibility::Gm),
            pin("town", 50.0, 50.0, Visibility::Players),
        ]);
        let visible = sync.visible(&PinFilter::for_viewer(Viewer::Player));
        let ids: Vec<&str> = visible.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["town"]);

        // The toggle cannot widen a player's view.
        let filter = PinFilter {
            viewer: Viewer::Player,
            show_gm_pins: true,
        };
        assert!(sync.visible(&filter).get(&PinId::new("secret")).is_none());
    }

    #[test]
    fn test_gm_can_hide_gm_pins() {
        let sync = loaded(vec![
            pin("secret", 5.0, 5.0, Visibility::Gm),
            pin("town", 50.0, 50.0, Visibility::Players),
        ]);
        assert_eq!(sync.visible(&PinFilter::for_viewer(Viewer::Gm)).len(), 2);
        let hidden = PinFilter {
            viewer: Viewer::Gm,
            show_gm_pins: false,
        };
        assert_eq!(sync.visible(&hidden).len(), 1);
    }

    // --- sync ---

    #[test]
    fn test_load_failure_keeps_store() {
        let sync = loaded(vec![pin("a", 1.0, 1.0, Visibility::Players)]);
        sync.repository().fail_lists.set(true);
        let err = block_on(sync.load()).unwrap_err();
        assert_eq!(err.to_string(), "pins could not be loaded: list unavailable");
        assert_eq!(sync.store().len(), 1);
    }

    #[test]
    fn test_place_pin_adds_confirmed_pin() {
        let sync = loaded(vec![]);
        let mut pending = PendingPlacement::at(ImagePoint::new(40.0, 60.0));
        pending.title = "Gareth".to_string();
        pending.date_input = "1. Praios 1040 BF".to_string();
        let created = block_on(sync.place_pin(&pending, &DsaCalendar)).unwrap();
        assert_eq!(created.id, PinId::new("srv-1"));
        assert_eq!(sync.store().get(&created.id), Some(&created));
        assert!(created.date.is_some());
    }

    #[test]
    fn test_place_pin_rejects_out_of_bounds_without_calling_server() {
        let sync = loaded(vec![]);
        let mut pending = PendingPlacement::at(ImagePoint::new(120.0, 50.0));
        pending.title = "Nowhere".to_string();
        let err = block_on(sync.place_pin(&pending, &DsaCalendar)).unwrap_err();
        assert!(matches!(err, MapError::OutOfBounds { .. }));

        let untitled = PendingPlacement::at(ImagePoint::new(50.0, 50.0));
        let err = block_on(sync.place_pin(&untitled, &DsaCalendar)).unwrap_err();
        assert!(matches!(err, MapError::Validation(_)));

        assert_eq!(sync.repository().calls(), vec!["list"]);
        assert!(sync.store().is_empty());
    }

    #[test]
    fn test_place_pin_failure_adds_nothing() {
        let sync = loaded(vec![]);
        sync.repository().fail_creates.set(true);
        let mut pending = PendingPlacement::at(ImagePoint::new(10.0, 10.0));
        pending.title = "Havena".to_string();
        let err = block_on(sync.place_pin(&pending, &DsaCalendar)).unwrap_err();
        assert_eq!(err, MapError::persistence(SyncAction::Create, "create rejected"));
        assert!(sync.store().is_empty());
    }

    #[test]
    fn test_move_is_visible_before_confirmation() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let pending = sync.move_pin(&PinId::new("a"), ImagePoint::new(30.0, 40.0));
        assert_eq!(position(&sync, "a"), ImagePoint::new(30.0, 40.0));
        assert_eq!(block_on(pending), Ok(SyncOutcome::Applied));
        assert_eq!(position(&sync, "a"), ImagePoint::new(30.0, 40.0));
        assert_eq!(sync.repository().server_pin("a").unwrap().position(), ImagePoint::new(30.0, 40.0));
    }

    #[test]
    fn test_failed_move_reloads_server_state() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        block_on(sync.move_pin(&PinId::new("a"), ImagePoint::new(20.0, 20.0))).unwrap();

        sync.repository().fail_updates.set(true);
        let moving = sync.move_pin(&PinId::new("a"), ImagePoint::new(30.0, 30.0));
        assert_eq!(position(&sync, "a"), ImagePoint::new(30.0, 30.0));
        let err = block_on(moving).unwrap_err();
        assert_eq!(err.to_string(), "position could not be saved: timeout");
        assert_eq!(position(&sync, "a"), ImagePoint::new(20.0, 20.0));
        assert_eq!(sync.repository().calls().last().map(String::as_str), Some("list"));
    }

    #[test]
    fn test_failed_move_with_failed_reload_rolls_back_pin() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        block_on(sync.move_pin(&PinId::new("a"), ImagePoint::new(20.0, 20.0))).unwrap();

        sync.repository().fail_updates.set(true);
        sync.repository().fail_lists.set(true);
        let err = block_on(sync.move_pin(&PinId::new("a"), ImagePoint::new(30.0, 30.0))).unwrap_err();
        assert!(matches!(err, MapError::Persistence { action: SyncAction::Move, .. }));
        // Last confirmed update, not the original load and not the failed value.
        assert_eq!(position(&sync, "a"), ImagePoint::new(20.0, 20.0));
    }

    #[test]
    fn test_out_of_bounds_move_is_void() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let err = block_on(sync.move_pin(&PinId::new("a"), ImagePoint::new(50.0, 100.5))).unwrap_err();
        assert!(matches!(err, MapError::OutOfBounds { .. }));
        assert_eq!(position(&sync, "a"), ImagePoint::new(10.0, 10.0));
        assert_eq!(sync.repository().calls(), vec!["list"]);
    }

    #[test]
    fn test_delete_wins_over_in_flight_move() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let (release, gate) = oneshot::channel();
        *sync.repository().update_gate.borrow_mut() = Some(gate);

        let id = PinId::new("a");
        let moving = sync.move_pin(&id, ImagePoint::new(60.0, 60.0));
        let deleting = sync.delete_pin(&id);
        assert!(sync.store().get(&id).is_none());

        let (moved, deleted, ()) = block_on(async {
            join!(moving, deleting, async {
                let _ = release.send(());
            })
        });
        assert_eq!(moved, Ok(SyncOutcome::Discarded));
        assert_eq!(deleted, Ok(()));
        assert!(sync.store().get(&id).is_none());
        assert!(sync.repository().server_pin("a").is_none());
    }

    #[test]
    fn test_late_confirmation_does_not_override_newer_move() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let (release, gate) = oneshot::channel();
        *sync.repository().update_gate.borrow_mut() = Some(gate);

        let id = PinId::new("a");
        let first = sync.move_pin(&id, ImagePoint::new(20.0, 20.0));
        let second = sync.move_pin(&id, ImagePoint::new(30.0, 30.0));

        let (first, second, ()) = block_on(async {
            join!(first, second, async {
                let _ = release.send(());
            })
        });
        assert_eq!(second, Ok(SyncOutcome::Applied));
        assert_eq!(first, Ok(SyncOutcome::Discarded));
        assert_eq!(position(&sync, "a"), ImagePoint::new(30.0, 30.0));
    }

    #[test]
    fn test_reload_during_delete_does_not_resurrect() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let (release, gate) = oneshot::channel();
        *sync.repository().delete_gate.borrow_mut() = Some(gate);

        let deleting = sync.delete_pin(&PinId::new("a"));
        let reload = sync.load();
        let (deleted, reloaded, ()) = block_on(async {
            join!(deleting, reload, async {
                let _ = release.send(());
            })
        });
        assert_eq!(deleted, Ok(()));
        assert_eq!(reloaded, Ok(1), "server still had the pin during the reload");
        assert!(sync.store().is_empty());
    }

    #[test]
    fn test_rollback_after_stale_reload_keeps_confirmed_move() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let (release_list, list_gate) = oneshot::channel();
        let (release_update, update_gate) = oneshot::channel();
        *sync.repository().list_gate.borrow_mut() = Some(list_gate);
        *sync.repository().update_gate.borrow_mut() = Some(update_gate);

        let id = PinId::new("a");
        let reload = sync.load();
        let moving = sync.move_pin(&id, ImagePoint::new(20.0, 20.0));
        let (reloaded, moved, ()) = block_on(async {
            join!(reload, moving, async {
                let _ = release_list.send(());
                let _ = release_update.send(());
            })
        });
        assert_eq!(reloaded, Ok(1));
        assert_eq!(moved, Ok(SyncOutcome::Applied));
        assert_eq!(position(&sync, "a"), ImagePoint::new(20.0, 20.0));

        sync.repository().fail_updates.set(true);
        sync.repository().fail_lists.set(true);
        let err = block_on(sync.move_pin(&id, ImagePoint::new(30.0, 30.0))).unwrap_err();
        assert!(matches!(err, MapError::Persistence { action: SyncAction::Move, .. }));
        assert_eq!(position(&sync, "a"), ImagePoint::new(20.0, 20.0));
    }

    #[test]
    fn test_reload_older_than_finished_delete_does_not_resurrect() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let (release, gate) = oneshot::channel();
        *sync.repository().list_gate.borrow_mut() = Some(gate);

        let id = PinId::new("a");
        let reload = sync.load();
        let (reloaded, deleted) = block_on(async {
            join!(reload, async {
                let deleted = sync.delete_pin(&id).await;
                let _ = release.send(());
                deleted
            })
        });
        assert_eq!(deleted, Ok(()));
        assert_eq!(reloaded, Ok(1), "the snapshot predates the delete");
        assert!(sync.repository().server_pin("a").is_none());
        assert!(sync.store().get(&id).is_none());
    }

    #[test]
    fn test_failed_delete_is_not_rolled_back() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        sync.repository().fail_deletes.set(true);
        let err = block_on(sync.delete_pin(&PinId::new("a"))).unwrap_err();
        assert_eq!(err.to_string(), "pin could not be deleted: forbidden");
        assert!(sync.store().is_empty());
        // The next refresh corrects the stale absence.
        block_on(sync.load()).unwrap();
        assert_eq!(sync.store().len(), 1);
    }

    #[test]
    fn test_delete_unknown_pin() {
        let sync = loaded(vec![]);
        let err = block_on(sync.delete_pin(&PinId::new("ghost"))).unwrap_err();
        assert_eq!(err, MapError::UnknownPin(PinId::new("ghost")));
        assert_eq!(sync.repository().calls(), vec!["list"]);
    }

    #[test]
    fn test_edit_pin_updates_details() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let patch = PinPatch {
            title: Some("Festum".to_string()),
            visibility: Some(Visibility::Gm),
            ..Default::default()
        };
        let editing = sync.edit_pin(&PinId::new("a"), patch);
        assert_eq!(sync.store().get(&PinId::new("a")).unwrap().title, "Festum");
        assert_eq!(block_on(editing), Ok(SyncOutcome::Applied));
        assert!(sync.visible(&PinFilter::for_viewer(Viewer::Player)).is_empty());
    }

    #[test]
    fn test_edit_pin_rejects_blank_title_and_empty_patch() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        let blank = PinPatch {
            title: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            block_on(sync.edit_pin(&PinId::new("a"), blank)),
            Err(MapError::Validation(_))
        ));
        assert!(matches!(
            block_on(sync.edit_pin(&PinId::new("a"), PinPatch::default())),
            Err(MapError::Validation(_))
        ));
        assert_eq!(sync.store().get(&PinId::new("a")).unwrap().title, "a");
        assert_eq!(sync.repository().calls(), vec!["list"]);
    }

    #[test]
    fn test_failed_edit_restores_title() {
        let sync = loaded(vec![pin("a", 10.0, 10.0, Visibility::Players)]);
        sync.repository().fail_updates.set(true);
        let patch = PinPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = block_on(sync.edit_pin(&PinId::new("a"), patch)).unwrap_err();
        assert_eq!(err.to_string(), "pin details could not be saved: timeout");
        assert_eq!(sync.store().get(&PinId::new("a")).unwrap().title, "a");
    }
}
