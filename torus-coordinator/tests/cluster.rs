//! End-to-end tests running a real coordinator against real workers
//! over localhost TCP.
//!
//! Each worker runs on its own single-threaded runtime so a test can
//! kill it outright, dropping its listener and every open connection
//! the way a crashed worker process would.

use std::time::Duration;

use torus_coordinator::pool::WorkerPool;
use torus_coordinator::{monitor, server, ControlState, Coordinator, CoordinatorConfig, SimEvent};
use torus_proto::ControlClient;
use torus_types::{Grid, ALIVE};

struct WorkerHandle {
    addr: String,
    runtime: Option<tokio::runtime::Runtime>,
}

impl WorkerHandle {
    fn spawn() -> Self {
        let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        std_listener.set_nonblocking(true).unwrap();
        let addr = std_listener.local_addr().unwrap().to_string();
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        runtime.spawn(async move {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            let _ = torus_worker::serve(listener).await;
        });
        Self {
            addr,
            runtime: Some(runtime),
        }
    }

    /// Simulates a worker crash: all tasks, connections, and the
    /// listener go away immediately.
    fn kill(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.kill();
    }
}

fn test_config(worker_addrs: Vec<String>, failure_threshold: u32) -> CoordinatorConfig {
    CoordinatorConfig {
        listen_addr: "127.0.0.1:0".into(),
        worker_addrs,
        heartbeat_interval: Duration::from_millis(50),
        call_timeout: Duration::from_secs(2),
        failure_threshold,
    }
}

async fn start_cluster(
    workers: usize,
    failure_threshold: u32,
) -> (Vec<WorkerHandle>, Coordinator) {
    let handles: Vec<WorkerHandle> = (0..workers).map(|_| WorkerHandle::spawn()).collect();
    let addrs: Vec<String> = handles.iter().map(|h| h.addr.clone()).collect();
    let pool = WorkerPool::new(addrs.clone(), failure_threshold);
    pool.connect_all(Duration::from_secs(2)).await;
    let coordinator = Coordinator::new(test_config(addrs, failure_threshold), pool);
    (handles, coordinator)
}

fn grid_from(rows: &[&[u8]]) -> Grid {
    Grid::from_rows(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
}

/// Deterministic pseudo-random seed pattern.
fn seed_grid(width: u16, height: u16) -> Grid {
    let mut grid = Grid::new(width, height).unwrap();
    for y in 0..height {
        for x in 0..width {
            if (x as usize * 3 + y as usize * 5 + x as usize * y as usize) % 7 == 0 {
                grid.set(x, y, ALIVE);
            }
        }
    }
    grid
}

async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration, what: &str) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn blinker_advances_one_turn_across_three_workers() {
    let (_workers, coordinator) = start_cluster(3, 3).await;
    let vertical = grid_from(&[
        &[0, 0, 0, 0, 0],
        &[0, 0, 255, 0, 0],
        &[0, 0, 255, 0, 0],
        &[0, 0, 255, 0, 0],
        &[0, 0, 0, 0, 0],
    ]);
    let horizontal = grid_from(&[
        &[0, 0, 0, 0, 0],
        &[0, 0, 0, 0, 0],
        &[0, 255, 255, 255, 0],
        &[0, 0, 0, 0, 0],
        &[0, 0, 0, 0, 0],
    ]);

    coordinator.process(vertical, 1).await.unwrap();
    coordinator.wait_until_idle().await;

    let world = coordinator.get_world();
    assert!(!world.processing);
    assert_eq!(world.turn, 1);
    assert_eq!(world.grid, horizontal);

    let (turn, count) = coordinator.alive_cells_count();
    assert_eq!((turn, count), (1, 3));

    // Exactly the four tips flipped, reported once.
    let (turn, mut changed) = coordinator.turn_updates();
    assert_eq!(turn, 1);
    changed.sort();
    let mut expected: Vec<_> = [(1, 2), (2, 1), (2, 3), (3, 2)]
        .iter()
        .map(|&(x, y)| torus_types::Cell::new(x, y))
        .collect();
    expected.sort();
    assert_eq!(changed, expected);
    assert!(coordinator.turn_updates().1.is_empty());
}

#[tokio::test]
async fn distributed_run_matches_single_slab_reference() {
    let (_workers, coordinator) = start_cluster(3, 3).await;
    let seed = seed_grid(7, 12);
    let turns = 5;

    let mut events = coordinator.subscribe_events();
    coordinator.process(seed.clone(), turns).await.unwrap();
    coordinator.wait_until_idle().await;

    let mut expected = seed;
    for _ in 0..turns {
        expected = torus_engine::step_grid(&expected).0;
    }
    let world = coordinator.get_world();
    assert_eq!(world.turn, turns);
    assert_eq!(world.grid, expected);

    // Turn events came out strictly sequential.
    let mut completed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SimEvent::TurnComplete { turn, .. } = event {
            completed.push(turn);
        }
    }
    assert_eq!(completed, (1..=turns).collect::<Vec<_>>());
}

#[tokio::test]
async fn failed_worker_partition_is_redistributed_within_the_turn() {
    let (mut workers, coordinator) = start_cluster(3, 3).await;
    // Crash one worker after connect; no monitor is running, so the
    // coordinator only finds out via the failed compute call.
    workers[1].kill();

    let seed = seed_grid(6, 9);
    coordinator.process(seed.clone(), 1).await.unwrap();
    coordinator.wait_until_idle().await;

    let world = coordinator.get_world();
    assert_eq!(world.turn, 1);
    assert_eq!(world.grid, torus_engine::step_grid(&seed).0);
}

#[tokio::test]
async fn pause_freezes_the_reported_turn_until_resume() {
    let (_workers, coordinator) = start_cluster(2, 3).await;
    coordinator.process(seed_grid(16, 16), 1_000_000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let paused_at = coordinator.pause();
    // A turn already in flight may still merge; after it settles the
    // counter must freeze until resume.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let settled = coordinator.get_world().turn;
    assert!(settled == paused_at || settled == paused_at + 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    let frozen = coordinator.get_world();
    assert_eq!(frozen.turn, settled);
    assert!(frozen.processing);

    coordinator.resume();
    wait_for(
        || coordinator.get_world().turn > settled,
        Duration::from_secs(5),
        "turns to advance after resume",
    )
    .await;

    // Stop is observable without another resume.
    coordinator.pause();
    coordinator.stop();
    tokio::time::timeout(Duration::from_secs(5), coordinator.wait_until_idle())
        .await
        .unwrap();
    assert!(!coordinator.get_world().processing);
}

#[tokio::test]
async fn exhaustion_halts_with_the_last_completed_grid() {
    let (mut workers, coordinator) = start_cluster(2, 3).await;
    let seed = seed_grid(10, 10);
    coordinator.process(seed.clone(), 1_000_000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    for worker in &mut workers {
        worker.kill();
    }
    tokio::time::timeout(Duration::from_secs(10), coordinator.wait_until_idle())
        .await
        .expect("loop must halt once workers are exhausted");

    let world = coordinator.get_world();
    assert!(!world.processing);
    // The retained grid is a fully merged generation, never a partial
    // mix of two turns.
    let mut expected = seed;
    for _ in 0..world.turn {
        expected = torus_engine::step_grid(&expected).0;
    }
    assert_eq!(world.grid, expected);
}

#[tokio::test]
async fn process_supersedes_a_running_simulation() {
    let (_workers, coordinator) = start_cluster(2, 3).await;
    coordinator.process(seed_grid(12, 12), 1_000_000).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seed = seed_grid(5, 8);
    coordinator.process(seed.clone(), 2).await.unwrap();
    coordinator.wait_until_idle().await;

    let world = coordinator.get_world();
    assert_eq!(world.turn, 2);
    let mut expected = seed;
    for _ in 0..2 {
        expected = torus_engine::step_grid(&expected).0;
    }
    assert_eq!(world.grid, expected);
}

#[tokio::test]
async fn monitor_demotes_dead_workers_and_promotes_on_restart() {
    let mut worker = WorkerHandle::spawn();
    let addr = worker.addr.clone();
    let pool = WorkerPool::new(vec![addr.clone()], 3);
    pool.connect_all(Duration::from_secs(2)).await;
    assert!(pool.all()[0].is_alive());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(monitor::run(
        pool.clone(),
        Duration::from_millis(50),
        Duration::from_millis(500),
        shutdown_rx,
    ));

    worker.kill();
    let proxy = pool.all()[0].clone();
    wait_for(
        || !proxy.is_alive(),
        Duration::from_secs(5),
        "demotion after three failed heartbeats",
    )
    .await;

    // Bring a worker back on the same address; the monitor should
    // redial and promote it.
    let mut revived = None;
    for _ in 0..50 {
        match std::net::TcpListener::bind(&addr) {
            Ok(listener) => {
                revived = Some(listener);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
        }
    }
    let std_listener = revived.expect("could not rebind worker address");
    std_listener.set_nonblocking(true).unwrap();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .unwrap();
    runtime.spawn(async move {
        let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
        let _ = torus_worker::serve(listener).await;
    });

    wait_for(
        || proxy.is_alive(),
        Duration::from_secs(5),
        "promotion after reconnect",
    )
    .await;
    assert_eq!(proxy.consecutive_failures(), 0);

    shutdown_tx.send(true).unwrap();
    runtime.shutdown_background();
}

#[tokio::test]
async fn control_plane_round_trip_over_tcp() {
    let (_workers, coordinator) = start_cluster(2, 3).await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let serve_task = tokio::spawn(server::serve(coordinator.clone(), listener));

    let mut events = coordinator.subscribe_events();
    let mut client = ControlClient::connect(addr).await.unwrap();
    let seed = seed_grid(6, 6);
    client.process(seed.clone(), 3).await.unwrap();

    let mut world = client.get_world().await.unwrap();
    while world.processing {
        tokio::time::sleep(Duration::from_millis(20)).await;
        world = client.get_world().await.unwrap();
    }
    assert_eq!(world.turn, 3);

    let (turn, count) = client.get_alive_cells_count().await.unwrap();
    assert_eq!(turn, 3);
    assert_eq!(count, world.grid.alive_count());

    // Control misuse is a no-op, not an error.
    assert_eq!(client.pause().await.unwrap(), 3);
    client.resume().await.unwrap();
    client.stop().await.unwrap();

    client.shutdown().await.unwrap();
    serve_task.await.unwrap().unwrap();

    // The run ended in the shutting-down state.
    let mut saw_shutdown = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            SimEvent::StateChange {
                state: ControlState::ShuttingDown,
                ..
            }
        ) {
            saw_shutdown = true;
        }
    }
    assert!(saw_shutdown);
}
