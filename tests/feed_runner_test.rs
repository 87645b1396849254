//! Integration tests for the JSON-lines feed and protocol TVL reconciliation
//! under concurrent pools.

use alloy_primitives::{Address, B256, I256, U256};
use lending_indexer::{
    datasource::MockContractReader,
    db::init_db,
    domain::{ChainEvent, EventKind, EventMeta, PoolCreationParams, WAD},
    EventRouter, FeedRunner, IndexerError, Repository,
};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tempfile::TempDir;
use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

const RESERVE_FACTOR: U256 = U256::from_limbs([100_000_000_000_000_000, 0, 0, 0]);
const POOLS: u8 = 6;

fn wad(n: u64) -> U256 {
    U256::from(n) * WAD
}

fn milli(n: u64) -> U256 {
    U256::from(n) * U256::from(1_000_000_000_000_000u64)
}

fn pool_addr(i: u8) -> Address {
    Address::repeat_byte(0x10 + i)
}

fn router_addr(i: u8) -> Address {
    Address::repeat_byte(0x40 + i)
}

async fn setup() -> (Arc<Repository>, MockContractReader, EventRouter, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let mock = MockContractReader::new();
    let router = EventRouter::new(repo.clone(), Arc::new(mock.clone()), RESERVE_FACTOR);
    (repo, mock, router, temp_dir)
}

fn event(block: u64, log: u64, tx_to: Option<Address>, kind: EventKind) -> ChainEvent {
    ChainEvent {
        meta: EventMeta {
            block_number: block,
            log_index: log,
            timestamp: 1_700_000_000 + block,
            tx_hash: B256::repeat_byte((block % 251) as u8),
            tx_to,
            address: Address::repeat_byte(0xee),
        },
        kind,
    }
}

fn pool_created(block: u64, i: u8, optimal_utilization: U256) -> ChainEvent {
    event(
        block,
        0,
        None,
        EventKind::LendingPoolCreated {
            params: PoolCreationParams {
                collateral_token: Address::repeat_byte(0xc0),
                borrow_token: Address::repeat_byte(0xb0),
                ltv: milli(800),
                supply_liquidity: U256::ZERO,
                base_rate: milli(20),
                rate_at_optimal: milli(100),
                optimal_utilization,
                max_utilization: milli(950),
                max_rate: milli(1000),
                liquidation_threshold: milli(850),
                liquidation_bonus: milli(50),
            },
            router: router_addr(i),
            router_implementation: Address::repeat_byte(0xa1),
            lending_pool: pool_addr(i),
            lending_pool_implementation: Address::repeat_byte(0xa2),
            shares_token: Address::repeat_byte(0xa3),
        },
    )
}

fn supply(block: u64, log: u64, i: u8, amount: U256) -> ChainEvent {
    event(
        block,
        log,
        Some(pool_addr(i)),
        EventKind::SupplyLiquidity {
            user: Address::repeat_byte(0x70 + i),
            amount,
            shares: amount,
        },
    )
}

fn borrow(block: u64, log: u64, i: u8, amount: U256) -> ChainEvent {
    event(
        block,
        log,
        Some(pool_addr(i)),
        EventKind::BorrowDebt {
            user: Address::repeat_byte(0x70 + i),
            protocol_fee: U256::ZERO,
            user_amount: amount,
            shares: amount,
            amount,
        },
    )
}

fn to_feed(events: &[ChainEvent]) -> String {
    events
        .iter()
        .map(|e| serde_json::to_string(e).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn signed(v: U256) -> I256 {
    I256::try_from(v).unwrap()
}

/// Protocol TVL must equal the sum of every pool's cached snapshot.
async fn assert_tvl_matches_caches(repo: &Repository, pools: u8) {
    let mut supply = I256::ZERO;
    let mut borrow = I256::ZERO;
    let mut observed = 0u64;
    for i in 0..pools {
        let pool = repo.get_pool(&pool_addr(i)).await.unwrap().unwrap();
        if let Some(last) = pool.last_snapshot {
            supply += signed(last.supply);
            borrow += signed(last.borrow);
            observed += 1;
        }
    }
    let tvl = repo.get_protocol_tvl().await.unwrap().unwrap();
    assert_eq!(tvl.total_supply_assets, supply);
    assert_eq!(tvl.total_borrow_assets, borrow);
    assert_eq!(tvl.pool_count, observed);
}

#[tokio::test]
async fn test_feed_interleaved_pools() {
    let (repo, mock, router, _temp) = setup().await;
    let mut events = Vec::new();
    for i in 0..POOLS {
        mock.set_totals(router_addr(i), wad(100 * (i as u64 + 1)), wad(10 * i as u64));
        events.push(pool_created(1 + i as u64, i, milli(800)));
    }
    for round in 0..5u64 {
        for i in 0..POOLS {
            let block = 100 + round * 10 + i as u64;
            events.push(supply(block, 0, i, wad(10)));
            events.push(borrow(block, 1, i, wad(1)));
        }
    }

    let runner = FeedRunner::new(router, 4);
    let stats = runner.run_lines(to_feed(&events).as_bytes()).await.unwrap();

    assert_eq!(stats.events, events.len() as u64);
    assert_eq!(stats.applied, events.len() as u64);
    assert_eq!(stats.duplicates, 0);
    assert_eq!(stats.malformed, 0);
    assert_eq!(stats.snapshots_written, 10 * POOLS as u64);
    assert_eq!(stats.snapshots_skipped, 0);

    for i in 0..POOLS {
        let snapshots = repo.list_snapshots(&pool_addr(i)).await.unwrap();
        assert_eq!(snapshots.len(), 10);
        let pool = repo.get_pool(&pool_addr(i)).await.unwrap().unwrap();
        assert_eq!(pool.snapshot_version, 10);

        let balance = repo
            .get_user_pool_balance(&Address::repeat_byte(0x70 + i), &pool_addr(i))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.total_supplied, wad(50));
        assert_eq!(balance.total_borrowed, wad(5));
    }
    assert_tvl_matches_caches(&repo, POOLS).await;
}

#[tokio::test]
async fn test_feed_skips_malformed_lines_and_replays() {
    let (repo, mock, router, _temp) = setup().await;
    mock.set_totals(router_addr(0), wad(100), wad(20));

    let create = serde_json::to_string(&pool_created(1, 0, milli(800))).unwrap();
    let first = serde_json::to_string(&supply(2, 0, 0, wad(100))).unwrap();
    let feed = format!(
        "{create}\n\n{{not json}}\n{first}\n{first}\n{{\"meta\": {{}}, \"event\": \"Paused\"}}\n"
    );

    let runner = FeedRunner::new(router, 2);
    let stats = runner.run_lines(feed.as_bytes()).await.unwrap();

    assert_eq!(stats.events, 3);
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.malformed, 2);
    assert_eq!(stats.snapshots_written, 1);

    let balance = repo
        .get_user_pool_balance(&Address::repeat_byte(0x70), &pool_addr(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_supplied, wad(100));
    assert_eq!(repo.list_snapshots(&pool_addr(0)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_feed_stops_on_fatal_error() {
    let (repo, mock, router, _temp) = setup().await;
    // utilization rounds to zero, which lands on the degenerate lower segment
    mock.set_totals(router_addr(0), wad(1000), U256::from(1u64));

    let events = vec![
        pool_created(1, 0, U256::ZERO),
        borrow(2, 0, 0, wad(20)),
        supply(3, 0, 0, wad(5)),
    ];
    let runner = FeedRunner::new(router, 2);
    let err = runner
        .run_lines(to_feed(&events).as_bytes())
        .await
        .unwrap_err();
    assert!(matches!(err, IndexerError::Rate(_)));

    // the failing event's record stays, later events of the pool never run
    let balance = repo
        .get_user_pool_balance(&Address::repeat_byte(0x70), &pool_addr(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_borrowed, wad(20));
    assert_eq!(balance.total_supplied, U256::ZERO);
    assert!(repo.list_snapshots(&pool_addr(0)).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_dispatch_reconciles_tvl() {
    let (repo, mock, router, _temp) = setup().await;
    for i in 0..POOLS {
        mock.set_totals(router_addr(i), wad(1000), wad(100 + i as u64));
        router
            .dispatch(&pool_created(1 + i as u64, i, milli(800)))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..POOLS {
        let router = router.clone();
        handles.push(tokio::spawn(async move {
            for n in 0..4u64 {
                router
                    .dispatch(&supply(100 + n * 10 + i as u64, 0, i, wad(1)))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_tvl_matches_caches(&repo, POOLS).await;
    let tvl = repo.get_protocol_tvl().await.unwrap().unwrap();
    assert_eq!(tvl.total_supply_assets, signed(wad(1000 * POOLS as u64)));
    assert_eq!(tvl.pool_count, POOLS as u64);
}

#[tokio::test]
async fn test_feed_counts_invalid_utf8_as_malformed() {
    let (repo, _mock, router, _temp) = setup().await;
    let paused = serde_json::to_string(&event(1, 0, None, EventKind::Paused)).unwrap();
    let mut feed = b"\xff\xfe garbage\n".to_vec();
    feed.extend_from_slice(paused.as_bytes());
    feed.push(b'\n');

    let runner = FeedRunner::new(router, 2);
    let stats = runner.run_lines(&feed[..]).await.unwrap();

    assert_eq!(stats.malformed, 1);
    assert_eq!(stats.events, 1);
    assert_eq!(stats.applied, 1);
    assert!(repo.get_factory_config().await.unwrap().unwrap().paused);
}

/// Reader whose every read fails.
struct BrokenPipe;

impl AsyncRead for BrokenPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "feed closed")))
    }
}

#[tokio::test]
async fn test_feed_read_error_settles_in_flight_events() {
    let (repo, mock, router, _temp) = setup().await;
    mock.set_totals(router_addr(0), wad(100), U256::ZERO);

    let mut feed = to_feed(&[pool_created(1, 0, milli(800)), supply(2, 0, 0, wad(7))]);
    feed.push('\n');
    let reader = BufReader::new(feed.as_bytes().chain(BrokenPipe));

    let runner = FeedRunner::new(router, 2);
    let err = runner.run_lines(reader).await.unwrap_err();
    assert!(matches!(err, IndexerError::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));

    // the supply spawned before the failure ran to completion
    let balance = repo
        .get_user_pool_balance(&Address::repeat_byte(0x70), &pool_addr(0))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(balance.total_supplied, wad(7));
    assert_eq!(repo.list_snapshots(&pool_addr(0)).await.unwrap().len(), 1);
}
