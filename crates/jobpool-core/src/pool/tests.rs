use super::*;
use crate::{Error, Result};
use core::{
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
    time::Duration,
};
use futures::future::join_all;
use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingManager {
    dialed: AtomicUsize,
    unreachable: AtomicBool,
    /// Connections with a serial below this value report as broken.
    stale_below: AtomicUsize,
}

#[derive(Debug)]
struct Conn {
    serial: usize,
}

impl CountingManager {
    fn dialed(&self) -> usize {
        self.dialed.load(Ordering::SeqCst)
    }
}

impl ManageConnection for CountingManager {
    type Connection = Conn;

    async fn connect(&self) -> Result<Conn> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(Error::Connection {
                context: "backend unreachable".to_string(),
            });
        }
        let serial = self.dialed.fetch_add(1, Ordering::SeqCst);
        Ok(Conn { serial })
    }

    fn has_broken(&self, conn: &mut Conn) -> bool {
        conn.serial < self.stale_below.load(Ordering::SeqCst)
    }
}

fn config(max_size: usize, min_size: usize) -> PoolConfig {
    PoolConfig::default()
        .with_max_size(max_size)
        .with_min_size(min_size)
        .with_acquire_timeout(Duration::from_millis(100))
}

async fn pool(max_size: usize, min_size: usize) -> Pool<CountingManager> {
    Pool::new(CountingManager::default(), config(max_size, min_size))
        .await
        .unwrap()
}

#[tokio::test]
async fn establishes_min_size_connections_eagerly() {
    let pool = pool(4, 2).await;

    assert_eq!(pool.manager().dialed(), 2);
    assert_eq!(
        pool.state(),
        PoolState {
            max_size: 4,
            open: 2,
            idle: 2,
            in_use: 0,
        }
    );
}

#[tokio::test]
async fn rejects_inconsistent_sizes() {
    let err = Pool::new(CountingManager::default(), config(0, 0))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidInput { .. }));

    let err = Pool::new(CountingManager::default(), config(2, 3))
        .await
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidInput { .. }));
}

#[tokio::test]
async fn unreachable_backend_fails_construction() {
    let manager = CountingManager::default();
    manager.unreachable.store(true, Ordering::SeqCst);

    let err = Pool::new(manager, config(5, 5)).await.err().unwrap();
    assert!(matches!(err, Error::Connection { .. }));
}

#[tokio::test]
async fn released_connections_are_reused() {
    let pool = pool(2, 0).await;

    let first = pool.acquire().await.unwrap();
    let id = first.id();
    pool.release(first);

    let second = pool.acquire().await.unwrap();
    assert_eq!(second.id(), id);
    assert_eq!(pool.manager().dialed(), 1);
    assert_eq!(pool.state().in_use, 1);
    assert_eq!(pool.state().idle, 0);

    drop(second);
    assert_eq!(pool.state().in_use, 0);
    assert_eq!(pool.state().idle, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn never_exceeds_capacity_or_double_hands_out() {
    const MAX_SIZE: usize = 4;
    let pool = Pool::new(
        CountingManager::default(),
        config(MAX_SIZE, 1).with_acquire_timeout(Duration::from_secs(30)),
    )
    .await
    .unwrap();

    let holding = Arc::new(Mutex::new(HashSet::new()));
    let peak = Arc::new(AtomicUsize::new(0));

    let tasks = (0..64).map(|_| {
        let pool = pool.clone();
        let holding = Arc::clone(&holding);
        let peak = Arc::clone(&peak);
        tokio::spawn(async move {
            for _ in 0..8 {
                let conn = pool.acquire().await.unwrap();
                {
                    let mut holding = holding.lock().unwrap();
                    assert!(holding.insert(conn.id()), "connection handed out twice");
                    peak.fetch_max(holding.len(), Ordering::SeqCst);
                }
                tokio::task::yield_now().await;
                holding.lock().unwrap().remove(&conn.id());
            }
        })
    });

    for res in join_all(tasks).await {
        res.unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= MAX_SIZE);
    assert!(pool.manager().dialed() <= MAX_SIZE);
    let state = pool.state();
    assert!(state.open <= MAX_SIZE);
    assert_eq!(state.in_use, 0);
    assert_eq!(state.idle, state.open);
}

#[tokio::test(start_paused = true)]
async fn saturated_pool_times_out_at_the_deadline() {
    let pool = pool(1, 1).await;
    let _held = pool.acquire().await.unwrap();

    let started = Instant::now();
    let err = pool.acquire().await.unwrap_err();
    let elapsed = started.elapsed();

    assert!(matches!(err, Error::PoolTimeout { .. }));
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(150));
    assert_eq!(pool.state().in_use, 1);
}

#[tokio::test]
async fn waiter_receives_the_released_connection() {
    let pool = pool(1, 1).await;
    let held = pool.acquire().await.unwrap();
    let held_id = held.id();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|conn| conn.id()) })
    };

    sleep(Duration::from_millis(10)).await;
    drop(held);

    assert_eq!(waiter.await.unwrap().unwrap(), held_id);
    assert_eq!(pool.manager().dialed(), 1);
}

#[tokio::test]
async fn waiters_are_served_in_arrival_order() {
    let pool = Pool::new(
        CountingManager::default(),
        config(1, 1).with_acquire_timeout(Duration::from_secs(5)),
    )
    .await
    .unwrap();
    let held = pool.acquire().await.unwrap();
    let served = Arc::new(Mutex::new(Vec::new()));

    let mut waiters = Vec::new();
    for i in 0..4 {
        let pool = pool.clone();
        let served = Arc::clone(&served);
        waiters.push(tokio::spawn(async move {
            let _conn = pool.acquire().await.unwrap();
            served.lock().unwrap().push(i);
        }));
        sleep(Duration::from_millis(5)).await;
    }

    drop(held);
    for waiter in waiters {
        waiter.await.unwrap();
    }

    assert_eq!(*served.lock().unwrap(), vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn cancelled_acquire_returns_promptly_without_leaking() {
    let pool = pool(1, 1).await;
    let held = pool.acquire().await.unwrap();

    let cancel = CancellationToken::new();
    let waiter = {
        let pool = pool.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + Duration::from_secs(60);
            let started = Instant::now();
            let res = pool.acquire_until(deadline, &cancel).await;
            (res.map(|conn| conn.id()), started.elapsed())
        })
    };

    sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let (res, elapsed) = waiter.await.unwrap();
    assert!(matches!(res, Err(Error::AcquireCancelled)));
    assert!(elapsed < Duration::from_secs(1));
    assert_eq!(pool.state().in_use, 1);

    drop(held);
    assert_eq!(pool.state().in_use, 0);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn dropping_a_pending_acquire_leaves_no_slot_behind() {
    let pool = pool(1, 1).await;
    let held = pool.acquire().await.unwrap();

    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        pool.acquire_until(
            Instant::now() + Duration::from_secs(60),
            &CancellationToken::new(),
        ),
    )
    .await;
    assert!(abandoned.is_err());

    drop(held);
    assert_eq!(pool.state().in_use, 0);
    assert_eq!(pool.state().idle, 1);
}

#[tokio::test]
async fn broken_connections_are_discarded_and_replaced() {
    let pool = pool(2, 1).await;

    let mut conn = pool.acquire().await.unwrap();
    let broken_id = conn.id();
    conn.mark_broken();
    drop(conn);

    assert_eq!(pool.state().open, 0);
    assert_eq!(pool.state().in_use, 0);

    let replacement = pool.acquire().await.unwrap();
    assert_ne!(replacement.id(), broken_id);
    assert_eq!(pool.manager().dialed(), 2);
    assert_eq!(pool.state().open, 1);
}

#[tokio::test]
async fn idle_connections_reported_broken_are_skipped() {
    let pool = pool(2, 2).await;
    pool.manager().stale_below.store(2, Ordering::SeqCst);

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.serial, 2);
    assert_eq!(pool.manager().dialed(), 3);

    let state = pool.state();
    assert_eq!(state.open, 1);
    assert_eq!(state.idle, 0);
}

#[tokio::test(start_paused = true)]
async fn idle_timeout_recycles_old_connections() {
    let pool = Pool::new(
        CountingManager::default(),
        config(1, 1).with_idle_timeout(Some(Duration::from_millis(50))),
    )
    .await
    .unwrap();

    sleep(Duration::from_millis(100)).await;

    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.serial, 1);
    assert_eq!(pool.state().open, 1);
}

#[tokio::test]
async fn failed_dial_returns_the_slot() {
    let pool = pool(1, 0).await;
    pool.manager().unreachable.store(true, Ordering::SeqCst);

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::Connection { .. }));
    assert_eq!(
        pool.state(),
        PoolState {
            max_size: 1,
            open: 0,
            idle: 0,
            in_use: 0,
        }
    );

    pool.manager().unreachable.store(false, Ordering::SeqCst);
    assert!(pool.acquire().await.is_ok());
}

#[tokio::test]
async fn cleared_broken_mark_keeps_the_connection() {
    let pool = pool(1, 1).await;

    let mut conn = pool.acquire().await.unwrap();
    let id = conn.id();
    conn.mark_broken();
    conn.set_broken(false);
    assert!(!conn.is_broken());
    drop(conn);

    assert_eq!(pool.state().idle, 1);
    assert_eq!(pool.acquire().await.unwrap().id(), id);
    assert_eq!(pool.manager().dialed(), 1);
}

#[tokio::test]
async fn panicking_holder_still_releases() {
    let pool = pool(1, 1).await;

    let task = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let _conn = pool.acquire().await.unwrap();
            panic!("job blew up");
        })
    };
    assert!(task.await.unwrap_err().is_panic());

    let state = pool.state();
    assert_eq!(state.in_use, 0);
    assert_eq!(state.idle, 1);
}

#[tokio::test]
async fn close_fails_waiters_and_drains_connections() {
    let pool = pool(2, 2).await;
    let first = pool.acquire().await.unwrap();
    let second = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|conn| conn.id()) })
    };
    sleep(Duration::from_millis(10)).await;

    pool.close();
    assert!(pool.is_closed());
    assert!(matches!(waiter.await.unwrap(), Err(Error::PoolClosed)));
    assert!(matches!(pool.acquire().await, Err(Error::PoolClosed)));

    drop(first);
    drop(second);
    let state = pool.state();
    assert_eq!(state.open, 0);
    assert_eq!(state.idle, 0);
}
