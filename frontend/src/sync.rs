//! Fetch, project, mutate, fetch again.
//!
//! Every mutation is followed by a full resync: the views are always
//! re-derived from a freshly fetched entry list, never patched in place.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use chrono::NaiveDate;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::aggregate::{group_by_month_and_category, group_by_month_balance};
use crate::api::{ApiError, LedgerApi};
use crate::chart::{self, ChartData};
use crate::entry::{decode_rows, Entry, EntryDraft, EntryError, EntryId, HistoryPoint, DATE_FORMAT};
use crate::settings::AppConfig;
use crate::table::{current_period, render_balance_rows, render_entry_rows, RenderedRow};

pub const CONFIRM_DELETE: &str = "Supprimer cette entrée ?";
pub const UPDATE_FAILED: &str = "Erreur lors de la mise à jour.";
pub const SAVE_DONE: &str = "Sauvegarde effectuée.";
pub const LOCAL_COPY_DONE: &str = "Copie locale enregistrée.";

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Invalid(#[from] EntryError),
    #[error("update of entry {id} failed: {reason}")]
    UpdateRejected { id: EntryId, reason: String },
}

/// Blocking user interaction and page navigation.
pub trait Browser {
    fn confirm(&self, message: &str) -> bool;
    fn alert(&self, message: &str);
    fn navigate(&self, path: &str);
}

pub struct BrowserWindow {
    config: AppConfig,
}

impl BrowserWindow {
    pub fn new(config: AppConfig) -> Self {
        BrowserWindow { config }
    }
}

impl Browser for BrowserWindow {
    fn confirm(&self, message: &str) -> bool {
        web_sys::window()
            .and_then(|w| w.confirm_with_message(message).ok())
            .unwrap_or(false)
    }

    fn alert(&self, message: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.alert_with_message(message);
        }
    }

    fn navigate(&self, path: &str) {
        if let Some(window) = web_sys::window() {
            let _ = window.location().set_href(&self.config.endpoint(path));
        }
    }
}

/// Whether leaving the page should ask for confirmation.
#[derive(Clone, Debug)]
pub struct ExitGuard {
    armed: Rc<Cell<bool>>,
}

impl ExitGuard {
    pub fn new(armed: bool) -> Self {
        ExitGuard {
            armed: Rc::new(Cell::new(armed)),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.get()
    }

    pub fn arm(&self) {
        self.armed.set(true);
    }

    pub fn disarm(&self) {
        self.armed.set(false);
    }

    /// Installs the `beforeunload` hook. It stays active until the returned
    /// listener is dropped.
    pub fn listen(&self) -> Option<UnloadListener> {
        let window = web_sys::window()?;
        let armed = self.armed.clone();
        let closure = Closure::<dyn FnMut(web_sys::BeforeUnloadEvent)>::new(
            move |event: web_sys::BeforeUnloadEvent| {
                if armed.get() {
                    event.prevent_default();
                    event.set_return_value("");
                }
            },
        );
        window
            .add_event_listener_with_callback("beforeunload", closure.as_ref().unchecked_ref())
            .ok()?;
        Some(UnloadListener { closure })
    }
}

pub struct UnloadListener {
    closure: Closure<dyn FnMut(web_sys::BeforeUnloadEvent)>,
}

impl Drop for UnloadListener {
    fn drop(&mut self) {
        if let Some(window) = web_sys::window() {
            let _ = window.remove_event_listener_with_callback(
                "beforeunload",
                self.closure.as_ref().unchecked_ref(),
            );
        }
    }
}

/// Everything the page displays, derived from one fetch.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedgerViews {
    pub all: Vec<RenderedRow>,
    pub current: Vec<RenderedRow>,
    pub balance: Vec<RenderedRow>,
    pub chart: ChartData,
    /// Server rows dropped because they did not decode.
    pub skipped: usize,
}

pub fn project_views(entries: &[Entry], history: &[HistoryPoint], today: NaiveDate) -> LedgerViews {
    LedgerViews {
        all: render_entry_rows(entries),
        current: render_entry_rows(&current_period(entries, today)),
        balance: render_balance_rows(&group_by_month_balance(entries)),
        chart: chart::project(&group_by_month_and_category(history)),
        skipped: 0,
    }
}

pub fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct SyncController<A, B> {
    api: A,
    browser: B,
    guard: ExitGuard,
    last_date: RefCell<String>,
    clock: fn() -> NaiveDate,
}

impl<A: LedgerApi, B: Browser> SyncController<A, B> {
    pub fn new(api: A, browser: B, guard: ExitGuard) -> Self {
        Self::with_clock(api, browser, guard, local_today)
    }

    pub fn with_clock(api: A, browser: B, guard: ExitGuard, clock: fn() -> NaiveDate) -> Self {
        SyncController {
            api,
            browser,
            guard,
            last_date: RefCell::new(clock().format(DATE_FORMAT).to_string()),
            clock,
        }
    }

    pub fn guard(&self) -> &ExitGuard {
        &self.guard
    }

    /// Date to pre-fill in the entry form: the last one submitted, today
    /// before any submission.
    pub fn last_date(&self) -> String {
        self.last_date.borrow().clone()
    }

    pub async fn resync(&self) -> Result<LedgerViews, SyncError> {
        tracing::debug!("resync started");
        let entry_rows = self.api.fetch_entries().await.map_err(|err| {
            tracing::error!(error = %err, "fetching entries failed");
            err
        })?;
        let history_rows = self.api.fetch_history().await.map_err(|err| {
            tracing::error!(error = %err, "fetching history failed");
            err
        })?;

        let entries = decode_rows(entry_rows, Entry::from_wire);
        let history = decode_rows(history_rows, HistoryPoint::from_wire);

        let mut views = project_views(&entries.items, &history.items, (self.clock)());
        views.skipped = entries.skipped + history.skipped;
        tracing::info!(
            entries = entries.items.len(),
            months = views.balance.len(),
            skipped = views.skipped,
            "ledger views rebuilt"
        );
        Ok(views)
    }

    pub async fn create(&self, draft: &EntryDraft) -> Result<LedgerViews, SyncError> {
        *self.last_date.borrow_mut() = draft.date.clone();
        let payload = draft.validate()?;
        tracing::info!(date = %payload.date, amount = payload.amount, "submitting entry");
        self.api.submit(&payload).await?;
        self.resync().await
    }

    /// Returns `Ok(None)` when the user declines the confirmation.
    pub async fn delete(&self, id: EntryId) -> Result<Option<LedgerViews>, SyncError> {
        if !self.browser.confirm(CONFIRM_DELETE) {
            return Ok(None);
        }
        tracing::info!(%id, "deleting entry");
        self.api.delete(id).await?;
        self.resync().await.map(Some)
    }

    /// On failure the user is alerted and nothing is refetched, so an open
    /// edit form keeps its values.
    pub async fn update(&self, id: EntryId, draft: &EntryDraft) -> Result<LedgerViews, SyncError> {
        let outcome = match draft.validate() {
            Ok(payload) => {
                tracing::info!(%id, "updating entry");
                self.api.update(id, &payload).await.map_err(|e| e.to_string())
            }
            Err(err) => Err(err.to_string()),
        };
        if let Err(reason) = outcome {
            tracing::warn!(%id, %reason, "update refused");
            self.browser.alert(UPDATE_FAILED);
            return Err(SyncError::UpdateRejected { id, reason });
        }
        self.resync().await
    }

    /// Abandons an inline edit by redrawing from the server.
    pub async fn cancel_edit(&self) -> Result<LedgerViews, SyncError> {
        self.resync().await
    }

    pub async fn save_to_server(&self) -> Result<(), SyncError> {
        self.guard.disarm();
        let result = self.api.save().await;
        if result.is_ok() {
            self.browser.alert(SAVE_DONE);
        }
        self.guard.arm();
        result.map_err(SyncError::from)
    }

    pub fn local_copy(&self) {
        self.guard.disarm();
        self.browser.navigate("/local_copy");
        self.browser.alert(LOCAL_COPY_DONE);
        self.guard.arm();
    }

    /// Leaves the page; the guard stays down so no warning is shown.
    pub fn logout(&self) {
        self.guard.disarm();
        self.browser.navigate("/logout");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryPayload;
    use serde_json::{json, Value};

    #[derive(Default)]
    struct FakeServer {
        rows: RefCell<Vec<Value>>,
        next_id: Cell<i64>,
        entry_fetches: Cell<usize>,
        history_fetches: Cell<usize>,
        calls: RefCell<Vec<String>>,
        update_status: Cell<Option<u16>>,
        offline: Cell<bool>,
        guard_seen_by_save: Cell<Option<bool>>,
        guard: RefCell<Option<ExitGuard>>,
    }

    impl FakeServer {
        fn with_rows(rows: Vec<Value>) -> Self {
            let server = FakeServer::default();
            server.next_id.set(rows.len() as i64 + 1);
            *server.rows.borrow_mut() = rows;
            server
        }

        fn ids(&self) -> Vec<i64> {
            self.rows.borrow().iter().map(|r| r[0].as_i64().unwrap()).collect()
        }

        fn unreachable(&self, endpoint: &str) -> Result<(), ApiError> {
            if self.offline.get() {
                return Err(ApiError::Transport {
                    endpoint: endpoint.to_string(),
                    message: "offline".into(),
                });
            }
            Ok(())
        }
    }

    impl LedgerApi for FakeServer {
        async fn fetch_entries(&self) -> Result<Vec<Value>, ApiError> {
            self.unreachable("/entries")?;
            self.entry_fetches.set(self.entry_fetches.get() + 1);
            Ok(self.rows.borrow().clone())
        }

        async fn fetch_history(&self) -> Result<Vec<Value>, ApiError> {
            self.unreachable("/hist_data")?;
            self.history_fetches.set(self.history_fetches.get() + 1);
            Ok(self
                .rows
                .borrow()
                .iter()
                .map(|r| json!({"date": r[1], "amount": r[2], "category": r[4]}))
                .collect())
        }

        async fn submit(&self, payload: &EntryPayload) -> Result<(), ApiError> {
            self.calls.borrow_mut().push("submit".into());
            let id = self.next_id.get();
            self.next_id.set(id + 1);
            self.rows.borrow_mut().push(json!([
                id,
                payload.date,
                payload.amount,
                payload.description,
                payload.category
            ]));
            Ok(())
        }

        async fn update(&self, id: EntryId, payload: &EntryPayload) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(format!("update {}", id));
            if let Some(status) = self.update_status.get() {
                return Err(ApiError::Status {
                    endpoint: format!("/update/{}", id),
                    status,
                });
            }
            for row in self.rows.borrow_mut().iter_mut() {
                if row[0].as_i64() == Some(id.0) {
                    *row = json!([id.0, payload.date, payload.amount, payload.description, payload.category]);
                }
            }
            Ok(())
        }

        async fn delete(&self, id: EntryId) -> Result<(), ApiError> {
            self.calls.borrow_mut().push(format!("delete {}", id));
            self.rows.borrow_mut().retain(|r| r[0].as_i64() != Some(id.0));
            Ok(())
        }

        async fn save(&self) -> Result<(), ApiError> {
            self.calls.borrow_mut().push("save".into());
            let armed = self.guard.borrow().as_ref().map(|g| g.is_armed());
            self.guard_seen_by_save.set(armed);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeBrowser {
        refuse: Cell<bool>,
        confirms: RefCell<Vec<String>>,
        alerts: RefCell<Vec<String>>,
        visits: RefCell<Vec<String>>,
    }

    impl Browser for FakeBrowser {
        fn confirm(&self, message: &str) -> bool {
            self.confirms.borrow_mut().push(message.to_string());
            !self.refuse.get()
        }

        fn alert(&self, message: &str) {
            self.alerts.borrow_mut().push(message.to_string());
        }

        fn navigate(&self, path: &str) {
            self.visits.borrow_mut().push(path.to_string());
        }
    }

    fn may_2024() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn controller(rows: Vec<Value>) -> SyncController<FakeServer, FakeBrowser> {
        SyncController::with_clock(
            FakeServer::with_rows(rows),
            FakeBrowser::default(),
            ExitGuard::new(true),
            may_2024,
        )
    }

    fn two_games() -> Vec<Value> {
        vec![
            json!([1, "2024-05-01", 10, "x", "jeux"]),
            json!([2, "2024-05-15", -5, "y", "jeux"]),
        ]
    }

    fn draft(date: &str, amount: &str) -> EntryDraft {
        EntryDraft {
            date: date.into(),
            amount: amount.into(),
            description: "test".into(),
            category: "divers".into(),
        }
    }

    #[tokio::test]
    async fn resync_builds_every_view() {
        let sync = controller(vec![
            json!([1, "2024-05-01", 10, "x", "jeux"]),
            json!([2, "2024-05-15", 20, "y", "virement"]),
            json!([3, "2024-04-02", 1.5, "z", "jeux"]),
            json!([4, "2024-04-03", "oops", "bad", "jeux"]),
        ]);
        let views = sync.resync().await.unwrap();
        assert_eq!(views.all.len(), 3);
        assert_eq!(views.current.len(), 2);
        assert_eq!(views.balance.len(), 2);
        assert_eq!(views.balance[0].text(1), "30.00");
        assert_eq!(views.chart.labels, vec!["Avr 2024", "Mai 2024"]);
        assert_eq!(views.chart.datasets[0].label, "jeux");
        assert_eq!(views.chart.datasets[0].data, vec![1.5, 10.0]);
        assert_eq!(views.chart.datasets[1].data, vec![0.0, 20.0]);
        // the malformed row is dropped from both payloads
        assert_eq!(views.skipped, 2);
    }

    #[tokio::test]
    async fn monthly_balance_of_two_games() {
        let sync = controller(two_games());
        let views = sync.resync().await.unwrap();
        assert_eq!(views.balance.len(), 1);
        assert_eq!(views.balance[0].text(0), "mai 2024");
        assert_eq!(views.balance[0].text(1), "5.00");
    }

    #[tokio::test]
    async fn confirmed_delete_resyncs_once() {
        let sync = controller(two_games());
        let views = sync.delete(EntryId(2)).await.unwrap().unwrap();

        assert_eq!(sync.browser.confirms.borrow().as_slice(), [CONFIRM_DELETE]);
        assert_eq!(sync.api.entry_fetches.get(), 1);
        assert_eq!(sync.api.history_fetches.get(), 1);
        assert!(views.all.iter().all(|r| r.id() != Some(EntryId(2))));
        assert_eq!(views.all.len(), 1);
        assert_eq!(sync.api.ids(), vec![1]);
    }

    #[tokio::test]
    async fn declined_delete_does_nothing() {
        let sync = controller(two_games());
        sync.browser.refuse.set(true);
        assert!(sync.delete(EntryId(2)).await.unwrap().is_none());
        assert!(sync.api.calls.borrow().is_empty());
        assert_eq!(sync.api.entry_fetches.get(), 0);
        assert_eq!(sync.api.ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn refused_update_alerts_without_resync() {
        let sync = controller(two_games());
        sync.api.update_status.set(Some(400));

        let err = sync.update(EntryId(1), &draft("2024-05-02", "12")).await.unwrap_err();
        assert!(matches!(err, SyncError::UpdateRejected { id: EntryId(1), .. }));
        assert_eq!(sync.browser.alerts.borrow().as_slice(), [UPDATE_FAILED]);
        assert_eq!(sync.api.entry_fetches.get(), 0);
        assert_eq!(sync.api.history_fetches.get(), 0);
    }

    #[tokio::test]
    async fn invalid_update_never_reaches_the_server() {
        let sync = controller(two_games());
        let err = sync.update(EntryId(1), &draft("2024-05-02", "douze")).await.unwrap_err();
        assert!(matches!(err, SyncError::UpdateRejected { .. }));
        assert!(sync.api.calls.borrow().is_empty());
        assert_eq!(sync.browser.alerts.borrow().len(), 1);
    }

    #[tokio::test]
    async fn accepted_update_resyncs() {
        let sync = controller(two_games());
        let views = sync.update(EntryId(1), &draft("2024-05-20", "12.5")).await.unwrap();
        assert_eq!(sync.api.entry_fetches.get(), 1);
        assert_eq!(views.all[0].id(), Some(EntryId(1)));
        assert_eq!(views.all[0].text(1), "12.5");
        assert_eq!(views.balance[0].text(1), "7.50");
        assert!(sync.browser.alerts.borrow().is_empty());
    }

    #[tokio::test]
    async fn create_remembers_the_date() {
        let sync = controller(two_games());
        assert_eq!(sync.last_date(), "2024-05-20");

        let views = sync.create(&draft("2024-05-03", "4")).await.unwrap();
        assert_eq!(sync.last_date(), "2024-05-03");
        assert_eq!(views.all.len(), 3);
        assert_eq!(sync.api.calls.borrow().as_slice(), ["submit"]);
        assert_eq!(sync.api.entry_fetches.get(), 1);
    }

    #[tokio::test]
    async fn invalid_create_is_rejected_locally() {
        let sync = controller(two_games());
        let err = sync.create(&draft("2024-05-03", "")).await.unwrap_err();
        assert!(matches!(err, SyncError::Invalid(EntryError::InvalidAmount(_))));
        assert!(sync.api.calls.borrow().is_empty());
        assert_eq!(sync.api.entry_fetches.get(), 0);
    }

    #[tokio::test]
    async fn fetch_failures_propagate() {
        let sync = controller(two_games());
        sync.api.offline.set(true);
        let err = sync.resync().await.unwrap_err();
        assert!(matches!(err, SyncError::Api(ApiError::Transport { .. })));
        assert!(sync.cancel_edit().await.is_err());
    }

    #[tokio::test]
    async fn unknown_category_degrades() {
        let sync = controller(vec![json!([1, "2024-05-01", 3, "?", "foo"])]);
        let views = sync.resync().await.unwrap();
        assert_eq!(views.all[0].text(3), "foo");
        assert_eq!(views.chart.datasets[0].label, "foo");
        assert_eq!(views.chart.datasets[0].background_color, "#bbb");
    }

    #[tokio::test]
    async fn guard_is_lowered_only_around_intentional_exits() {
        let sync = controller(two_games());
        *sync.api.guard.borrow_mut() = Some(sync.guard().clone());

        sync.save_to_server().await.unwrap();
        assert_eq!(sync.api.guard_seen_by_save.get(), Some(false));
        assert!(sync.guard().is_armed());
        assert_eq!(sync.browser.alerts.borrow().as_slice(), [SAVE_DONE]);

        sync.local_copy();
        assert!(sync.guard().is_armed());
        assert_eq!(sync.browser.visits.borrow().as_slice(), ["/local_copy"]);

        sync.logout();
        assert!(!sync.guard().is_armed());
        assert_eq!(sync.browser.visits.borrow().last().map(String::as_str), Some("/logout"));
    }

    #[test]
    fn projection_is_idempotent() {
        let entries = decode_rows(two_games(), Entry::from_wire).items;
        let history: Vec<HistoryPoint> = entries.iter().map(HistoryPoint::from).collect();
        assert_eq!(
            project_views(&entries, &history, may_2024()),
            project_views(&entries, &history, may_2024())
        );
    }
}
