//! Order collection with write-through persistence.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use mercado_cache::{cache_key, Cache, KvStore};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::checkout::{Order, OrderStatus};
use crate::clock::Clock;
use crate::error::CommerceError;
use crate::ids::OrderId;

/// Outcome of [`OrderStore::load`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    /// Orders now in memory.
    pub loaded: usize,
    /// Orders whose timestamps were replaced with the load time.
    pub repaired: usize,
    /// Records skipped because they could not be decoded.
    pub dropped: usize,
    /// The stored payload was unreadable; memory is empty and storage was
    /// left as it was.
    pub corrupted: bool,
}

impl LoadReport {
    /// Whether storage holds data that memory does not. Writes are held back
    /// until [`OrderStore::clear`] or [`OrderStore::clear_corrupted`] runs.
    pub fn is_lossy(&self) -> bool {
        self.corrupted || self.dropped > 0
    }
}

/// Owns every order and is the only writer of the orders key.
///
/// Orders are kept newest-first. Every mutation rewrites the whole
/// collection while holding the store lock; a failed write is recorded in
/// [`last_error`](Self::last_error) and the in-memory change stands. After a
/// lossy [`load`](Self::load) nothing is written until the stored data is
/// explicitly discarded.
pub struct OrderStore {
    cache: Cache,
    key: String,
    clock: Arc<dyn Clock>,
    state: Mutex<OrderState>,
}

#[derive(Default)]
struct OrderState {
    orders: Vec<Order>,
    last_error: Option<String>,
    /// Storage holds records that did not load.
    unreadable: bool,
}

impl OrderStore {
    /// Empty store persisting under `orders:<environment>`. Call
    /// [`load`](Self::load) to read what is already stored.
    pub fn new(store: Arc<dyn KvStore>, environment: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: Cache::new(store),
            key: cache_key!("orders", environment),
            clock,
            state: Mutex::new(OrderState::default()),
        }
    }

    /// Create and load in one step.
    pub fn open(
        store: Arc<dyn KvStore>,
        environment: &str,
        clock: Arc<dyn Clock>,
    ) -> (Self, LoadReport) {
        let orders = Self::new(store, environment, clock);
        let report = orders.load();
        (orders, report)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Replace memory with what storage holds.
    pub fn load(&self) -> LoadReport {
        let mut state = self.lock();
        state.orders.clear();
        state.last_error = None;
        state.unreadable = false;

        let raw = match self.cache.get_raw(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return LoadReport::default(),
            Err(e) => return corrupted(&mut state, &self.key, e.to_string()),
        };
        let records = match serde_json::from_slice::<Value>(&raw) {
            Ok(Value::Array(records)) => records,
            Ok(other) => {
                let kind = match other {
                    Value::Object(_) => "object",
                    Value::String(_) => "string",
                    Value::Number(_) => "number",
                    Value::Bool(_) => "boolean",
                    _ => "null",
                };
                return corrupted(&mut state, &self.key, format!("expected a list of orders, found {kind}"));
            }
            Err(e) => return corrupted(&mut state, &self.key, e.to_string()),
        };

        let now = self.clock.now();
        let mut report = LoadReport::default();
        for mut record in records {
            let repaired = repair_timestamps(&mut record, now);
            match serde_json::from_value::<Order>(record) {
                Ok(order) if state.orders.iter().any(|o| o.id == order.id) => {
                    warn!(order_id = %order.id, "skipping duplicate stored order");
                    report.dropped += 1;
                }
                Ok(order) => {
                    if repaired {
                        report.repaired += 1;
                    }
                    state.orders.push(order);
                }
                Err(e) => {
                    warn!(key = %self.key, error = %e, "skipping undecodable order record");
                    report.dropped += 1;
                }
            }
        }

        if report.dropped > 0 {
            state.unreadable = true;
            state.last_error = Some(format!(
                "{} stored order(s) could not be decoded; run clear_corrupted to discard them",
                report.dropped
            ));
        }
        report.loaded = state.orders.len();
        info!(
            key = %self.key,
            loaded = report.loaded,
            repaired = report.repaired,
            dropped = report.dropped,
            "orders loaded"
        );
        report
    }

    /// Add a new order at the front.
    pub fn add_order(&self, order: Order) -> Result<(), CommerceError> {
        let mut state = self.lock();
        if state.orders.iter().any(|o| o.id == order.id) {
            return Err(CommerceError::DuplicateOrder(order.id.to_string()));
        }
        info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            "order added"
        );
        state.orders.insert(0, order);
        self.persist(&mut state);
        Ok(())
    }

    /// Move an order along its lifecycle.
    pub fn set_status(&self, id: &OrderId, status: OrderStatus) -> Result<Order, CommerceError> {
        let now = self.clock.now();
        let mut state = self.lock();
        let order = state
            .orders
            .iter_mut()
            .find(|o| &o.id == id)
            .ok_or_else(|| CommerceError::OrderNotFound(id.to_string()))?;

        if !order.status.can_transition_to(status) {
            return Err(CommerceError::InvalidStatusTransition {
                from: order.status.to_string(),
                to: status.to_string(),
            });
        }

        info!(order_id = %id, from = %order.status, to = %status, "order status changed");
        order.status = status;
        order.updated_at = now;
        let updated = order.clone();
        self.persist(&mut state);
        Ok(updated)
    }

    pub fn cancel(&self, id: &OrderId) -> Result<Order, CommerceError> {
        self.set_status(id, OrderStatus::Cancelled)
    }

    /// Forget every order and delete the storage key.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.orders.clear();
        match self.cache.delete(&self.key) {
            Ok(()) => {
                state.last_error = None;
                state.unreadable = false;
            }
            Err(e) => record_failure(&mut state, &self.key, e.into()),
        }
        info!(key = %self.key, "orders cleared");
    }

    /// Replace an unreadable payload with an empty list.
    pub fn clear_corrupted(&self) {
        let mut state = self.lock();
        state.orders.clear();
        state.unreadable = false;
        self.persist(&mut state);
        info!(key = %self.key, "corrupted orders replaced with an empty list");
    }

    /// All orders, newest first.
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.clone()
    }

    pub fn get(&self, id: &OrderId) -> Option<Order> {
        self.lock().orders.iter().find(|o| &o.id == id).cloned()
    }

    /// Find by id or order number.
    pub fn find(&self, reference: &str) -> Option<Order> {
        self.lock()
            .orders
            .iter()
            .find(|o| o.id.as_str() == reference || o.order_number.eq_ignore_ascii_case(reference))
            .cloned()
    }

    pub fn with_status(&self, status: OrderStatus) -> Vec<Order> {
        self.lock()
            .orders
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().orders.is_empty()
    }

    /// Most recent load or write problem, if the last operation had one.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    fn lock(&self) -> MutexGuard<'_, OrderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &mut OrderState) {
        if state.unreadable {
            warn!(key = %self.key, "stored orders did not fully load; not overwriting them");
            state.last_error =
                Some("storage holds unreadable order records; run clear_corrupted".to_string());
            return;
        }
        match self.cache.set(&self.key, &state.orders) {
            Ok(()) => state.last_error = None,
            Err(e) => record_failure(state, &self.key, e.into()),
        }
    }
}

impl fmt::Debug for OrderStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderStore")
            .field("key", &self.key)
            .field("orders", &self.len())
            .finish_non_exhaustive()
    }
}

fn record_failure(state: &mut OrderState, key: &str, error: CommerceError) {
    warn!(key, error = %error, "order persistence failed; keeping in-memory state");
    state.last_error = Some(error.to_string());
}

fn corrupted(state: &mut OrderState, key: &str, error: String) -> LoadReport {
    warn!(key, error = %error, "stored orders are unreadable; starting empty");
    state.unreadable = true;
    state.last_error = Some(format!("stored orders are unreadable: {error}"));
    LoadReport {
        corrupted: true,
        ..LoadReport::default()
    }
}

/// Replace missing or unparseable `created_at` / `updated_at` with `now`.
fn repair_timestamps(record: &mut Value, now: DateTime<Utc>) -> bool {
    let Some(fields) = record.as_object_mut() else {
        return false;
    };
    let mut repaired = false;
    for field in ["created_at", "updated_at"] {
        let valid = fields
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| DateTime::parse_from_rfc3339(s).is_ok());
        if !valid {
            let order_id = fields.get("id").and_then(serde_json::Value::as_str).unwrap_or("?");
            warn!(
                order_id,
                field,
                "replacing invalid order timestamp with the current time"
            );
            fields.insert(field.to_string(), Value::String(now.to_rfc3339()));
            repaired = true;
        }
    }
    repaired
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::{OrderItem, PaymentDetails, PaymentMethod};
    use crate::clock::ManualClock;
    use crate::currency::{ExchangeRate, RateSource};
    use crate::ids::ProductId;
    use crate::money::{Currency, Money};
    use chrono::{Duration, TimeZone};
    use mercado_cache::{CacheError, MemoryStore};
    use rust_decimal_macros::dec;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 7, 1, 9, 0, 0).unwrap()))
    }

    fn order(id: &str, now: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(id),
            order_number: format!("ORD-{}-{}", now.timestamp(), id.to_uppercase()),
            items: vec![OrderItem {
                product_id: ProductId::new("rice"),
                name: "Rice".into(),
                unit_price: Money::usd(dec!(2)),
                quantity: 5,
                unit: "kg".into(),
                line_total: Money::usd(dec!(10)),
            }],
            subtotal: Money::usd(dec!(10)),
            logistics: Money::usd(dec!(5)),
            tax: Money::usd(dec!(0)),
            total: Money::usd(dec!(15)),
            currency: Currency::VES,
            exchange_rate: Some(ExchangeRate::new(dec!(36), now, RateSource::Official).unwrap()),
            payment_method: PaymentMethod::CashOnDelivery,
            payment_details: PaymentDetails::CashOnDelivery,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
            fiscal_data: None,
            delivery_info: None,
        }
    }

    struct ReadOnly(MemoryStore);

    impl KvStore for ReadOnly {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            self.0.get(key)
        }

        fn set(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
            Err(CacheError::StoreError("disk full".into()))
        }

        fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::StoreError("disk full".into()))
        }

        fn keys(&self) -> Result<Vec<String>, CacheError> {
            self.0.keys()
        }
    }

    #[test]
    fn test_newest_first_and_write_through() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let store = OrderStore::new(kv.clone(), "test", clock.clone());

        store.add_order(order("a", clock.now())).unwrap();
        store.add_order(order("b", clock.now())).unwrap();

        let ids: Vec<String> = store.orders().into_iter().map(|o| o.id.into_inner()).collect();
        assert_eq!(ids, ["b", "a"]);

        let (reopened, report) = OrderStore::open(kv, "test", clock);
        assert_eq!(report.loaded, 2);
        assert_eq!(reopened.orders(), store.orders());
    }

    #[test]
    fn test_environments_do_not_share_orders() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let production = OrderStore::new(kv.clone(), "production", clock.clone());
        production.add_order(order("a", clock.now())).unwrap();

        let (staging, _) = OrderStore::open(kv, "staging", clock);
        assert_eq!(staging.key(), "orders:staging");
        assert!(staging.is_empty());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let clock = clock();
        let store = OrderStore::new(Arc::new(MemoryStore::new()), "test", clock.clone());
        store.add_order(order("a", clock.now())).unwrap();
        assert!(matches!(
            store.add_order(order("a", clock.now())),
            Err(CommerceError::DuplicateOrder(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_status_transitions() {
        let clock = clock();
        let store = OrderStore::new(Arc::new(MemoryStore::new()), "test", clock.clone());
        let id = OrderId::new("a");
        store.add_order(order("a", clock.now())).unwrap();

        clock.advance(Duration::minutes(5));
        let updated = store.set_status(&id, OrderStatus::Confirmed).unwrap();
        assert_eq!(updated.status, OrderStatus::Confirmed);
        assert_eq!(updated.updated_at, clock.now());
        assert!(updated.created_at < updated.updated_at);

        let before = store.get(&id).unwrap();
        assert!(matches!(
            store.set_status(&id, OrderStatus::Delivered),
            Err(CommerceError::InvalidStatusTransition { .. })
        ));
        assert_eq!(store.get(&id).unwrap(), before);

        store.cancel(&id).unwrap();
        assert!(store.cancel(&id).is_err());
        assert_eq!(store.with_status(OrderStatus::Cancelled).len(), 1);

        assert!(matches!(
            store.set_status(&OrderId::new("ghost"), OrderStatus::Confirmed),
            Err(CommerceError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_repairs_bad_timestamps() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let mut record = serde_json::to_value(order("a", clock.now())).unwrap();
        record["created_at"] = Value::String("yesterday-ish".into());
        record.as_object_mut().unwrap().remove("updated_at");
        kv.set("orders:test", &serde_json::to_vec(&vec![record]).unwrap()).unwrap();

        clock.advance(Duration::hours(1));
        let (store, report) = OrderStore::open(kv, "test", clock.clone());

        assert_eq!(report.loaded, 1);
        assert_eq!(report.repaired, 1);
        assert!(!report.corrupted);
        let loaded = store.get(&OrderId::new("a")).unwrap();
        assert_eq!(loaded.created_at, clock.now());
        assert_eq!(loaded.updated_at, clock.now());
    }

    #[test]
    fn test_skips_undecodable_records() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let good = serde_json::to_value(order("a", clock.now())).unwrap();
        let payload = serde_json::json!([good, { "id": "b", "status": "teleported" }, 42]);
        kv.set("orders:test", &serde_json::to_vec(&payload).unwrap()).unwrap();

        let (store, report) = OrderStore::open(kv, "test", clock);

        assert_eq!(report.loaded, 1);
        assert_eq!(report.dropped, 2);
        assert!(report.is_lossy());
        assert!(store.last_error().is_some());
    }

    #[test]
    fn test_record_without_rate_survives_status_change() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let good = serde_json::to_value(order("a", clock.now())).unwrap();
        let mut legacy = serde_json::to_value(order("legacy", clock.now())).unwrap();
        legacy.as_object_mut().unwrap().remove("exchange_rate");
        kv.set("orders:test", &serde_json::to_vec(&vec![good, legacy]).unwrap()).unwrap();

        let (store, report) = OrderStore::open(kv.clone(), "test", clock.clone());
        assert_eq!(report.loaded, 2);
        assert!(!report.is_lossy());

        store.set_status(&OrderId::new("a"), OrderStatus::Confirmed).unwrap();

        let (reopened, _) = OrderStore::open(kv, "test", clock);
        let ids: Vec<String> = reopened.orders().into_iter().map(|o| o.id.into_inner()).collect();
        assert_eq!(ids, ["a", "legacy"]);
        assert_eq!(reopened.get(&OrderId::new("legacy")).unwrap().exchange_rate, None);
    }

    #[test]
    fn test_lossy_load_holds_writes_until_cleared() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let good = serde_json::to_value(order("a", clock.now())).unwrap();
        let payload = serde_json::json!([good, { "id": "b", "status": "teleported" }]);
        let stored = serde_json::to_vec(&payload).unwrap();
        kv.set("orders:test", &stored).unwrap();

        let (store, _) = OrderStore::open(kv.clone(), "test", clock.clone());
        store.set_status(&OrderId::new("a"), OrderStatus::Confirmed).unwrap();

        assert_eq!(store.get(&OrderId::new("a")).unwrap().status, OrderStatus::Confirmed);
        assert!(store.last_error().unwrap().contains("clear_corrupted"));
        assert_eq!(kv.get("orders:test").unwrap().unwrap(), stored);

        store.clear_corrupted();
        store.add_order(order("c", clock.now())).unwrap();
        assert_eq!(store.last_error(), None);
        let (reopened, report) = OrderStore::open(kv, "test", clock);
        assert!(!report.is_lossy());
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_corrupted_payload_left_for_clear_corrupted() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        kv.set("orders:test", b"{not json").unwrap();

        let (store, report) = OrderStore::open(kv.clone(), "test", clock.clone());

        assert!(report.corrupted);
        assert!(store.is_empty());
        assert!(store.last_error().is_some());
        assert_eq!(kv.get("orders:test").unwrap().unwrap(), b"{not json");

        store.add_order(order("a", clock.now())).unwrap();
        assert_eq!(kv.get("orders:test").unwrap().unwrap(), b"{not json");
        assert!(store.last_error().is_some());

        store.clear_corrupted();
        assert_eq!(kv.get("orders:test").unwrap().unwrap(), b"[]");
        assert_eq!(store.last_error(), None);

        let (reloaded, report) = OrderStore::open(kv, "test", clock);
        assert!(!report.corrupted);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_clear_deletes_key() {
        let clock = clock();
        let kv = Arc::new(MemoryStore::new());
        let store = OrderStore::new(kv.clone(), "test", clock.clone());
        store.add_order(order("a", clock.now())).unwrap();

        store.clear();

        assert!(store.is_empty());
        assert!(!kv.exists("orders:test").unwrap());
    }

    #[test]
    fn test_write_failure_keeps_memory() {
        let clock = clock();
        let store = OrderStore::new(Arc::new(ReadOnly(MemoryStore::new())), "test", clock.clone());

        store.add_order(order("a", clock.now())).unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.last_error().unwrap().contains("disk full"));
    }

    #[test]
    fn test_find_by_order_number() {
        let clock = clock();
        let store = OrderStore::new(Arc::new(MemoryStore::new()), "test", clock.clone());
        let placed = order("a", clock.now());
        let number = placed.order_number.clone();
        store.add_order(placed).unwrap();

        assert!(store.find(&number.to_lowercase()).is_some());
        assert!(store.find("a").is_some());
        assert!(store.find("zzz").is_none());
    }
}
