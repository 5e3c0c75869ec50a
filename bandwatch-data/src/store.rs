//! Bounded, time-ordered candle history per (market, symbol, interval).
//!
//! Each series lives in its own bucket behind its own lock, so writers to different
//! series never contend. Every mutating operation that grows a bucket trims it back
//! to `max_candles` while still holding that bucket's lock: readers observe either
//! the state before the upsert or the state after the eviction, never in between.

use crate::{
    event::{UpdateEvent, UpdateKind},
    instrument::BucketKey,
};
use fnv::FnvHashMap;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};
use tracing::trace;

/// Latest known OHLC state of one fixed-width time bucket.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Deserialize, Serialize)]
pub struct Candle {
    /// Bucket start in epoch milliseconds.
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
}

#[derive(Copy, Clone, Debug)]
struct Entry {
    candle: Candle,
    /// Transport sequence number of the last streaming write, 0 if only backfilled.
    sequence: u64,
}

#[derive(Debug, Default)]
struct Bucket {
    candles: BTreeMap<i64, Entry>,
}

impl Bucket {
    fn upsert(&mut self, candle: Candle) {
        self.candles
            .entry(candle.timestamp)
            .and_modify(|entry| entry.candle = candle)
            .or_insert(Entry {
                candle,
                sequence: 0,
            });
    }

    fn upsert_sequenced(&mut self, candle: Candle, sequence: u64) -> bool {
        match self.candles.get_mut(&candle.timestamp) {
            Some(entry) if entry.sequence > sequence => false,
            Some(entry) => {
                *entry = Entry { candle, sequence };
                true
            }
            None => {
                self.candles.insert(candle.timestamp, Entry { candle, sequence });
                true
            }
        }
    }

    fn evict(&mut self, max_candles: usize) -> usize {
        let mut removed = 0;
        while self.candles.len() > max_candles {
            self.candles.pop_first();
            removed += 1;
        }
        removed
    }
}

/// Shared candle history, handed to each component as an `Arc<CandleStore>`.
#[derive(Debug)]
pub struct CandleStore {
    max_candles: usize,
    buckets: RwLock<FnvHashMap<BucketKey, Arc<Mutex<Bucket>>>>,
}

impl CandleStore {
    pub fn new(max_candles: usize) -> Self {
        Self {
            max_candles,
            buckets: RwLock::new(FnvHashMap::default()),
        }
    }

    /// Retention bound applied by [`Self::upsert_batch`] and [`Self::upsert_sequenced`].
    pub fn max_candles(&self) -> usize {
        self.max_candles
    }

    fn bucket(&self, key: &BucketKey) -> Option<Arc<Mutex<Bucket>>> {
        self.buckets.read().get(key).cloned()
    }

    fn bucket_or_insert(&self, key: &BucketKey) -> Arc<Mutex<Bucket>> {
        if let Some(bucket) = self.bucket(key) {
            return bucket;
        }
        Arc::clone(self.buckets.write().entry(key.clone()).or_default())
    }

    /// Insert or overwrite the candle at `candle.timestamp`. Does not evict.
    pub fn upsert(&self, key: &BucketKey, candle: Candle) {
        self.bucket_or_insert(key).lock().upsert(candle);
    }

    /// Trim the bucket to the `max_candles` most recent entries.
    pub fn evict(&self, key: &BucketKey, max_candles: usize) -> UpdateEvent {
        if let Some(bucket) = self.bucket(key) {
            let removed = bucket.lock().evict(max_candles);
            if removed > 0 {
                trace!(%key, removed, "evicted candles");
            }
        }
        UpdateEvent::for_bucket(UpdateKind::CandleCleanup, key)
    }

    /// Upsert every candle then evict, as one unit with respect to other users of the bucket.
    pub fn upsert_batch<Iter>(&self, key: &BucketKey, candles: Iter) -> UpdateEvent
    where
        Iter: IntoIterator<Item = Candle>,
    {
        let bucket = self.bucket_or_insert(key);
        let mut bucket = bucket.lock();
        candles.into_iter().for_each(|candle| bucket.upsert(candle));
        let removed = bucket.evict(self.max_candles);
        trace!(%key, removed, len = bucket.candles.len(), "applied candle batch");
        UpdateEvent::for_bucket(UpdateKind::CandleCleanup, key)
    }

    /// Upsert a streaming candle unless a message read later from the transport already
    /// wrote that timestamp, then evict. Returns `None` if the candle was stale.
    pub fn upsert_sequenced(
        &self,
        key: &BucketKey,
        candle: Candle,
        sequence: u64,
    ) -> Option<UpdateEvent> {
        let bucket = self.bucket_or_insert(key);
        let mut bucket = bucket.lock();
        if !bucket.upsert_sequenced(candle, sequence) {
            trace!(%key, sequence, timestamp = candle.timestamp, "dropped stale candle");
            return None;
        }
        bucket.evict(self.max_candles);
        Some(UpdateEvent::for_bucket(UpdateKind::CandleCleanup, key))
    }

    /// Candles of the bucket in ascending timestamp order.
    pub fn snapshot(&self, key: &BucketKey) -> Vec<Candle> {
        self.bucket(key)
            .map(|bucket| {
                bucket
                    .lock()
                    .candles
                    .values()
                    .map(|entry| entry.candle)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Candle with the largest timestamp.
    pub fn latest(&self, key: &BucketKey) -> Option<Candle> {
        self.bucket(key)
            .and_then(|bucket| bucket.lock().candles.last_key_value().map(|(_, entry)| entry.candle))
    }

    pub fn len(&self, key: &BucketKey) -> usize {
        self.bucket(key)
            .map(|bucket| bucket.lock().candles.len())
            .unwrap_or_default()
    }

    /// Number of tracked series.
    pub fn bucket_count(&self) -> usize {
        self.buckets.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{Interval, MarketKind};
    use rust_decimal_macros::dec;

    fn key(symbol: &str) -> BucketKey {
        BucketKey::from((MarketKind::Futures, symbol, Interval::Minute1))
    }

    fn candle(timestamp: i64, close: Decimal) -> Candle {
        Candle {
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
        }
    }

    #[test]
    fn test_backfilled_candle_survives_eviction_to_one() {
        let store = CandleStore::new(50);
        let key = key("BTCUSDT");

        store.upsert(
            &key,
            Candle {
                timestamp: 1700000000000,
                open: dec!(100.0),
                high: dec!(101.0),
                low: dec!(99.5),
                close: dec!(100.5),
            },
        );
        let event = store.evict(&key, 1);

        assert_eq!(event, UpdateEvent::for_bucket(UpdateKind::CandleCleanup, &key));
        let candles = store.snapshot(&key);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, dec!(100.5));
    }

    #[test]
    fn test_evict_retains_most_recent_timestamps() {
        struct TestCase {
            inserted: usize,
            max_candles: usize,
            expected: Vec<i64>,
        }

        let tests = vec![
            TestCase {
                // TC0: fewer candles than the bound are all kept
                inserted: 3,
                max_candles: 5,
                expected: vec![0, 60_000, 120_000],
            },
            TestCase {
                // TC1: exactly the bound
                inserted: 3,
                max_candles: 3,
                expected: vec![0, 60_000, 120_000],
            },
            TestCase {
                // TC2: oldest candles are discarded
                inserted: 6,
                max_candles: 2,
                expected: vec![240_000, 300_000],
            },
            TestCase {
                // TC3: zero bound empties the bucket
                inserted: 2,
                max_candles: 0,
                expected: vec![],
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let store = CandleStore::new(test.max_candles);
            let key = key("ETHUSDT");
            // Insert in descending order so retention cannot depend on insertion order
            for i in (0..test.inserted as i64).rev() {
                store.upsert(&key, candle(i * 60_000, Decimal::from(i)));
            }
            store.evict(&key, test.max_candles);

            let actual: Vec<i64> = store.snapshot(&key).iter().map(|c| c.timestamp).collect();
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_evict_keeps_largest_timestamps_for_shuffled_input() {
        let store = CandleStore::new(10);
        let key = key("SOLUSDT");

        // 101 is prime so i * 37 % 101 visits every value in 0..101 exactly once
        for i in 0..101_i64 {
            let minute = (i * 37) % 101;
            store.upsert_batch(&key, [candle(minute * 60_000, Decimal::from(minute))]);
            assert!(store.len(&key) <= 10);
        }

        let actual: Vec<i64> = store.snapshot(&key).iter().map(|c| c.timestamp / 60_000).collect();
        assert_eq!(actual, (91..101).collect::<Vec<_>>());
    }

    #[test]
    fn test_evict_is_idempotent() {
        let store = CandleStore::new(3);
        let key = key("BNBUSDT");
        store.upsert_batch(&key, (0..10).map(|i| candle(i * 60_000, Decimal::from(i))));

        let before = store.snapshot(&key);
        store.evict(&key, 3);
        store.evict(&key, 3);
        assert_eq!(store.snapshot(&key), before);

        // Evicting an unknown bucket is a no-op that still reports the cleanup
        let unknown = self::key("XRPUSDT");
        let event = store.evict(&unknown, 3);
        assert_eq!(event.kind, UpdateKind::CandleCleanup);
        assert_eq!(store.len(&unknown), 0);
    }

    #[test]
    fn test_upsert_is_idempotent_per_timestamp() {
        let store = CandleStore::new(10);
        let key = key("BTCUSDT");
        let record = Candle {
            timestamp: 60_000,
            open: dec!(1.10),
            high: dec!(1.30),
            low: dec!(1.00),
            close: dec!(1.20),
        };

        store.upsert(&key, record);
        let once = store.snapshot(&key);
        store.upsert(&key, record);

        assert_eq!(store.snapshot(&key), once);
        assert_eq!(store.latest(&key), Some(record));
    }

    #[test]
    fn test_upsert_overwrites_live_bucket() {
        let store = CandleStore::new(10);
        let key = key("BTCUSDT");

        store.upsert(&key, candle(60_000, dec!(10)));
        store.upsert(&key, candle(60_000, dec!(11)));

        assert_eq!(store.len(&key), 1);
        assert_eq!(store.latest(&key).map(|c| c.close), Some(dec!(11)));
    }

    #[test]
    fn test_upsert_sequenced_drops_stale_writes() {
        let store = CandleStore::new(10);
        let key = key("BTCUSDT");

        assert!(store.upsert_sequenced(&key, candle(60_000, dec!(2)), 7).is_some());
        // An earlier-read message completing late must not overwrite the newer state
        assert!(store.upsert_sequenced(&key, candle(60_000, dec!(1)), 3).is_none());
        assert_eq!(store.latest(&key).map(|c| c.close), Some(dec!(2)));

        // Replaying the same message is harmless
        assert!(store.upsert_sequenced(&key, candle(60_000, dec!(2)), 7).is_some());
        // A different timestamp is unaffected by the sequence of its neighbour
        assert!(store.upsert_sequenced(&key, candle(120_000, dec!(3)), 5).is_some());
        assert_eq!(store.len(&key), 2);
    }

    #[test]
    fn test_backfill_overwrites_streamed_candle_fields() {
        let store = CandleStore::new(10);
        let key = key("BTCUSDT");

        store.upsert_sequenced(&key, candle(60_000, dec!(2)), 9);
        store.upsert_batch(&key, [candle(60_000, dec!(3))]);

        assert_eq!(store.latest(&key).map(|c| c.close), Some(dec!(3)));
    }

    #[test]
    fn test_latest_and_snapshot_of_unknown_bucket() {
        let store = CandleStore::new(10);
        let key = key("DOGEUSDT");

        assert_eq!(store.latest(&key), None);
        assert!(store.snapshot(&key).is_empty());
        assert_eq!(store.bucket_count(), 0);
    }

    #[test]
    fn test_concurrent_readers_never_observe_untrimmed_bucket() {
        let store = Arc::new(CandleStore::new(5));
        let key = key("BTCUSDT");

        let writers: Vec<_> = (0..4_i64)
            .map(|writer| {
                let store = Arc::clone(&store);
                let key = key.clone();
                std::thread::spawn(move || {
                    for i in 0..500_i64 {
                        let minute = i * 4 + writer;
                        store.upsert_batch(
                            &key,
                            [
                                candle(minute * 60_000, Decimal::from(minute)),
                                candle((minute + 1_000) * 60_000, Decimal::from(minute)),
                            ],
                        );
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            let key = key.clone();
            std::thread::spawn(move || {
                for _ in 0..2_000 {
                    let candles = store.snapshot(&key);
                    assert!(candles.len() <= 5);
                    assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
                }
            })
        };

        writers.into_iter().for_each(|handle| handle.join().unwrap());
        reader.join().unwrap();

        assert_eq!(store.len(&key), 5);
        assert_eq!(
            store.latest(&key).map(|c| c.timestamp),
            Some((1_999 + 1_000) * 60_000)
        );
    }
}
