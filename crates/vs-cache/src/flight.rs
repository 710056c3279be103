use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use crate::error::{CacheError, CacheResult};

type Slot<V> = Option<CacheResult<V>>;
type InFlight<K, V> = Arc<Mutex<HashMap<K, watch::Receiver<Slot<V>>>>>;

/// Per-key request coalescer.
///
/// [`join`](Self::join) decides, under one lock, whether the caller is
/// served from storage, must wait for a computation already in flight, or
/// becomes the leader of a new one. At most one leader exists per key.
pub struct SingleFlight<K, V> {
    in_flight: InFlight<K, V>,
}

/// Outcome of [`SingleFlight::join`].
pub enum Flight<K: Eq + Hash, V> {
    /// The lookup found a settled value; nothing to compute.
    Settled(V),
    /// The caller owns the computation and must resolve the ticket.
    Leader(Ticket<K, V>),
    /// Another caller owns the computation; wait for its result.
    Follower(Waiter<V>),
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Join the flight for `key`.
    ///
    /// If no computation is in flight, `lookup` runs while the lock is held;
    /// `Ok(Some(v))` settles the call, `Ok(None)` makes the caller leader,
    /// and an error is returned without registering anything.
    ///
    /// One lock covers every key, so a slow `lookup` (the record tables read
    /// from disk) delays joins on unrelated keys. Striping the map by key hash
    /// is the next step if that shows up under load.
    pub fn join<F>(&self, key: &K, lookup: F) -> CacheResult<Flight<K, V>>
    where
        F: FnOnce() -> CacheResult<Option<V>>,
    {
        let mut map = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(rx) = map.get(key) {
            return Ok(Flight::Follower(Waiter { rx: rx.clone() }));
        }
        if let Some(value) = lookup()? {
            return Ok(Flight::Settled(value));
        }
        let (tx, rx) = watch::channel(None);
        map.insert(key.clone(), rx);
        Ok(Flight::Leader(Ticket {
            key: key.clone(),
            sender: Some(tx),
            in_flight: Arc::clone(&self.in_flight),
        }))
    }

    /// Number of computations currently in flight.
    pub fn len(&self) -> usize {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Leadership of one in-flight computation.
///
/// Resolving publishes the result to every waiter and frees the key.
/// Dropping an unresolved ticket (e.g. the computing task panicked)
/// publishes [`CacheError::Abandoned`] instead, so waiters never hang.
pub struct Ticket<K: Eq + Hash, V> {
    key: K,
    sender: Option<watch::Sender<Slot<V>>>,
    in_flight: InFlight<K, V>,
}

impl<K: Eq + Hash, V> Ticket<K, V> {
    /// Wait handle for the leader itself.
    pub fn subscribe(&self) -> Waiter<V> {
        let rx = match &self.sender {
            Some(tx) => tx.subscribe(),
            // Unreachable while the ticket is alive: the sender is only
            // taken when the ticket is consumed or dropped.
            None => watch::channel(Some(Err(CacheError::Abandoned))).1,
        };
        Waiter { rx }
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn resolve(mut self, result: CacheResult<V>) {
        self.finish(result);
    }

    fn finish(&mut self, result: CacheResult<V>) {
        if let Some(tx) = self.sender.take() {
            self.in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.key);
            tx.send_replace(Some(result));
        }
    }
}

impl<K: Eq + Hash, V> Drop for Ticket<K, V> {
    fn drop(&mut self) {
        self.finish(Err(CacheError::Abandoned));
    }
}

/// Handle on the result of an in-flight computation.
pub struct Waiter<V> {
    rx: watch::Receiver<Slot<V>>,
}

impl<V: Clone> Waiter<V> {
    pub async fn wait(mut self) -> CacheResult<V> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CacheError::Abandoned)?
            .clone();
        slot.unwrap_or(Err(CacheError::Abandoned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_hit_settles() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let flight = flights.join(&1, || Ok(Some("cached".into()))).unwrap();
        assert!(matches!(flight, Flight::Settled(ref v) if v == "cached"));
        assert!(flights.is_empty());
    }

    #[test]
    fn lookup_error_registers_nothing() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let result = flights.join(&1, || Err(CacheError::Abandoned));
        assert!(result.is_err());
        assert!(!flights.is_in_flight(&1));
    }

    #[tokio::test]
    async fn second_caller_follows_leader() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let Flight::Leader(ticket) = flights.join(&7, || Ok(None)).unwrap() else {
            panic!("first caller should lead");
        };
        let mut lookups = 0;
        let Flight::Follower(waiter) = flights
            .join(&7, || {
                lookups += 1;
                Ok(None)
            })
            .unwrap()
        else {
            panic!("second caller should follow");
        };
        assert_eq!(lookups, 0, "followers never run the lookup");
        assert_eq!(flights.len(), 1);

        let leader_waiter = ticket.subscribe();
        ticket.resolve(Ok("done".into()));

        assert_eq!(waiter.wait().await.unwrap(), "done");
        assert_eq!(leader_waiter.wait().await.unwrap(), "done");
        assert!(!flights.is_in_flight(&7));
    }

    #[tokio::test]
    async fn dropped_ticket_abandons_waiters_and_frees_key() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let Flight::Leader(ticket) = flights.join(&3, || Ok(None)).unwrap() else {
            panic!("should lead");
        };
        let waiter = ticket.subscribe();
        drop(ticket);

        assert!(matches!(waiter.wait().await, Err(CacheError::Abandoned)));
        assert!(matches!(
            flights.join(&3, || Ok(None)).unwrap(),
            Flight::Leader(_)
        ));
    }

    #[tokio::test]
    async fn different_keys_do_not_coalesce() {
        let flights: SingleFlight<u32, String> = SingleFlight::new();
        let a = flights.join(&1, || Ok(None)).unwrap();
        let b = flights.join(&2, || Ok(None)).unwrap();
        assert!(matches!(a, Flight::Leader(_)));
        assert!(matches!(b, Flight::Leader(_)));
        assert_eq!(flights.len(), 2);
    }
}
