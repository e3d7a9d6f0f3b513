//! Halo exchange between live workers on a channel network

use halo_life::comm::{ChannelNetwork, ChannelTransport};
use halo_life::core::config::EngineConfig;
use halo_life::core::error::LifeError;
use halo_life::core::types::Cell;
use halo_life::grid::GlobalGrid;
use halo_life::partition::Decomposition;
use halo_life::simulation::Worker;
use std::time::Duration;
use tokio::task::JoinSet;

fn spawn_workers(
    grid: &GlobalGrid,
    decomposition: &Decomposition,
    blank_halo: bool,
) -> Vec<Worker<ChannelTransport>> {
    let mut network = ChannelNetwork::new(decomposition.worker_count(), Duration::from_secs(2));
    decomposition
        .partitions()
        .map(|partition| {
            let mut padded = grid.padded_subgrid(&partition);
            if blank_halo {
                // Stale ring: everything outside the interior starts dead
                let width = partition.padded_width();
                let height = partition.padded_height();
                for (index, cell) in padded.iter_mut().enumerate() {
                    let (row, col) = (index / width, index % width);
                    if row == 0 || col == 0 || row == height - 1 || col == width - 1 {
                        *cell = Cell::Dead;
                    }
                }
            }
            let transport = network.endpoint(partition.rank).unwrap();
            Worker::new(decomposition, padded, transport, &EngineConfig::default()).unwrap()
        })
        .collect()
}

async fn exchange_all(workers: Vec<Worker<ChannelTransport>>) -> Vec<Worker<ChannelTransport>> {
    let mut tasks = JoinSet::new();
    for mut worker in workers {
        tasks.spawn(async move {
            worker.exchange_halo().await.unwrap();
            worker
        });
    }
    let mut done = Vec::new();
    while let Some(worker) = tasks.join_next().await {
        done.push(worker.unwrap());
    }
    done.sort_by_key(|w| w.rank());
    done
}

/// Every buffer slot, halo included, must equal the global cell it stands for
fn assert_halo_matches(grid: &GlobalGrid, worker: &Worker<ChannelTransport>) {
    let p = worker.partition();
    let buffer = worker.current();
    for local_row in 0..p.padded_height() {
        for local_col in 0..p.padded_width() {
            let row = p.row_start as isize + local_row as isize - 1;
            let col = p.col_start as isize + local_col as isize - 1;
            assert_eq!(
                buffer.get(local_row, local_col),
                grid.get_wrapped(row, col),
                "rank {} slot ({local_row}, {local_col}) = global ({row}, {col})",
                p.rank
            );
        }
    }
}

#[tokio::test]
async fn test_two_partitions_agree_on_shared_rows() {
    let grid = GlobalGrid::random(8, 0.5, 42).unwrap();
    let d = Decomposition::for_workers(8, 2).unwrap();
    assert_eq!((d.width_chunks(), d.height_chunks()), (1, 2));

    let workers = spawn_workers(&grid, &d, true);
    let top_before = workers[0].owned_cells();
    let bottom_before = workers[1].owned_cells();
    let workers = exchange_all(workers).await;

    let (top, bottom) = (&workers[0], &workers[1]);
    for col in 0..8 {
        // Halo row below rank 1 is rank 2's first owned row
        assert_eq!(top.current().get(5, col + 1), bottom_before[col]);
        // Halo row above rank 1 wraps to rank 2's last owned row
        assert_eq!(top.current().get(0, col + 1), bottom_before[3 * 8 + col]);
        // And symmetrically for rank 2
        assert_eq!(bottom.current().get(0, col + 1), top_before[3 * 8 + col]);
        assert_eq!(bottom.current().get(5, col + 1), top_before[col]);
    }
    for worker in &workers {
        assert_halo_matches(&grid, worker);
    }
}

#[tokio::test]
async fn test_every_halo_slot_refreshed_on_3x3_layout() {
    let grid = GlobalGrid::random(10, 0.5, 7).unwrap();
    let d = Decomposition::for_workers(10, 9).unwrap();
    let workers = exchange_all(spawn_workers(&grid, &d, true)).await;
    assert_eq!(workers.len(), 9);
    for worker in &workers {
        assert_halo_matches(&grid, worker);
    }
}

#[tokio::test]
async fn test_single_worker_wraps_its_own_halo() {
    let grid = GlobalGrid::random(6, 0.5, 13).unwrap();
    let d = Decomposition::new(6, 1, 1).unwrap();
    let workers = exchange_all(spawn_workers(&grid, &d, true)).await;
    assert_halo_matches(&grid, &workers[0]);
}

#[tokio::test]
async fn test_fast_worker_runs_one_generation_ahead() {
    let grid = GlobalGrid::random(8, 0.5, 3).unwrap();
    let d = Decomposition::for_workers(8, 2).unwrap();
    let mut workers = spawn_workers(&grid, &d, false);
    let mut slow = workers.pop().unwrap();
    let mut fast = workers.pop().unwrap();

    // Generation 1 sends from the fast worker can land while the slow one
    // is still on generation 0; they are held until asked for
    let slow_task = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        slow.step().await.unwrap();
        slow.step().await.unwrap();
        slow
    });
    fast.step().await.unwrap();
    fast.step().await.unwrap();
    let slow = slow_task.await.unwrap();

    assert_eq!(fast.generation(), 2);
    assert_eq!(slow.generation(), 2);

    let mut expected = GlobalGrid::new(8);
    expected.insert_region(fast.partition(), &fast.owned_cells()).unwrap();
    expected.insert_region(slow.partition(), &slow.owned_cells()).unwrap();
    let single = halo_life::coordinator::run(
        &grid,
        2,
        &EngineConfig {
            workers: 1,
            ..EngineConfig::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(expected, single.grid);
}

#[tokio::test]
async fn test_silent_neighbor_times_out() {
    let grid = GlobalGrid::random(8, 0.5, 1).unwrap();
    let d = Decomposition::for_workers(8, 2).unwrap();
    let mut network = ChannelNetwork::new(2, Duration::from_millis(50));
    let p = d.partition(1).unwrap();
    let transport = network.endpoint(1).unwrap();
    let _silent = network.endpoint(2).unwrap();
    let mut worker =
        Worker::new(&d, grid.padded_subgrid(&p), transport, &EngineConfig::default()).unwrap();

    let err = worker.exchange_halo().await.unwrap_err();
    assert!(matches!(err, LifeError::Timeout { rank: 1, peer: 2, tag: 0 }));
}
