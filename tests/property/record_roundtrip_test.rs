//! Property-based tests for record persistence: whatever the repository
//! stores comes back unchanged, through both backends.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

use tabsig::database::{KeyValueStore, MemoryStore, SqliteStore, StorageAdapter, StoreQuota};
use tabsig::managers::tab_repository::TabRepository;
use tabsig::types::tab::{FaviconDescriptor, TabRecord, TabSignature};

fn arb_favicon() -> impl Strategy<Value = FaviconDescriptor> {
    prop_oneof![
        "\\PC{1,2}".prop_map(FaviconDescriptor::SystemEmoji),
        "\\PC{1,2}".prop_map(FaviconDescriptor::RemoteEmojiImage),
        "https://[a-z]{1,10}\\.com/[a-z]{1,8}\\.png".prop_map(FaviconDescriptor::Url),
    ]
}

fn arb_record() -> impl Strategy<Value = TabRecord> {
    (
        any::<i64>(),
        "https://[a-z]{1,12}\\.(com|org)/[a-z0-9/]{0,20}",
        any::<u32>(),
        prop::option::of(0i64..2_000_000_000),
        prop::option::of("\\PC{0,40}"),
        prop::option::of(arb_favicon()),
    )
        .prop_map(|(id, url, index, closed_secs, title, favicon)| {
            let mut record = TabRecord::new(
                id,
                &url,
                index,
                TabSignature {
                    title,
                    favicon,
                },
            );
            if let Some(secs) = closed_secs {
                let at: DateTime<Utc> = Utc.timestamp_opt(secs, 0).unwrap();
                record.mark_closed(at);
            }
            record
        })
}

fn roundtrip(store: Arc<dyn KeyValueStore>, record: &TabRecord) -> Option<TabRecord> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    rt.block_on(async {
        let repo = TabRepository::new(StorageAdapter::new(store));
        repo.update_many(std::slice::from_ref(record)).await.unwrap();
        repo.get_by_id(record.id).await.unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn memory_store_preserves_records(record in arb_record()) {
        let loaded = roundtrip(Arc::new(MemoryStore::new()), &record);
        prop_assert_eq!(loaded, Some(record));
    }

    #[test]
    fn sqlite_store_preserves_records(record in arb_record()) {
        let store = SqliteStore::open_in_memory(StoreQuota::unlimited()).unwrap();
        let loaded = roundtrip(Arc::new(store), &record);
        prop_assert_eq!(loaded, Some(record));
    }
}
