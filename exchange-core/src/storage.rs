//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `events` - Append-only, hash-chained event log (key: sequence, big-endian)
//! - `state` - Latest engine snapshot (key: `latest`)

use crate::{
    engine::EngineState,
    error::{Error, Result},
    types::{EventRecord, ExchangeEvent},
    Config,
};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};

/// Column family names
const CF_EVENTS: &str = "events";
const CF_STATE: &str = "state";

const STATE_KEY: &[u8] = b"latest";

/// Storage wrapper for RocksDB
///
/// Owned by the single writer; the chain head is cached in memory.
pub struct Storage {
    db: DB,
    next_sequence: u64,
    head_hash: [u8; 32],
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("path", &self.db.path())
            .field("next_sequence", &self.next_sequence)
            .finish()
    }
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        // Create directory if not exists
        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        if config.rocksdb.enable_statistics {
            db_opts.enable_statistics();
        }

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_EVENTS, Self::cf_options_events()),
            ColumnFamilyDescriptor::new(CF_STATE, Self::cf_options_state()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        let mut storage = Self {
            db,
            next_sequence: 0,
            head_hash: [0u8; 32],
        };
        if let Some(last) = storage.last_event()? {
            storage.next_sequence = last.sequence + 1;
            storage.head_hash = last.record_hash;
        }

        tracing::info!(
            path = ?path,
            events = storage.next_sequence,
            "Opened RocksDB"
        );

        Ok(storage)
    }

    fn cf_options_events() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts.set_bottommost_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_state() -> Options {
        let mut opts = Options::default();
        // State is read on every start-up, use LZ4 for speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    /// Number of records in the event log
    pub fn event_count(&self) -> u64 {
        self.next_sequence
    }

    /// Append events and the resulting snapshot (atomic)
    ///
    /// The in-memory chain head only advances once the batch is written.
    pub fn commit(
        &mut self,
        events: Vec<ExchangeEvent>,
        state: &EngineState,
    ) -> Result<Vec<EventRecord>> {
        let mut batch = WriteBatch::default();
        let mut records = Vec::with_capacity(events.len());
        let mut sequence = self.next_sequence;
        let mut head_hash = self.head_hash;

        let cf_events = self.cf_handle(CF_EVENTS)?;
        for event in events {
            let record = EventRecord::new(sequence, event, head_hash)?;
            batch.put_cf(cf_events, sequence.to_be_bytes(), bincode::serialize(&record)?);
            head_hash = record.record_hash;
            sequence += 1;
            records.push(record);
        }

        let cf_state = self.cf_handle(CF_STATE)?;
        batch.put_cf(cf_state, STATE_KEY, bincode::serialize(state)?);

        self.db.write(batch)?;
        self.next_sequence = sequence;
        self.head_hash = head_hash;

        tracing::debug!(
            records = records.len(),
            next_sequence = sequence,
            "Committed events and snapshot"
        );

        Ok(records)
    }

    /// Latest engine snapshot, if any
    pub fn load_state(&self) -> Result<Option<EngineState>> {
        let cf = self.cf_handle(CF_STATE)?;
        match self.db.get_cf(cf, STATE_KEY)? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Event record by sequence number
    pub fn get_event(&self, sequence: u64) -> Result<Option<EventRecord>> {
        let cf = self.cf_handle(CF_EVENTS)?;
        match self.db.get_cf(cf, sequence.to_be_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Most recent event record
    pub fn last_event(&self) -> Result<Option<EventRecord>> {
        let cf = self.cf_handle(CF_EVENTS)?;

        if let Some(item) = self.db.iterator_cf(cf, IteratorMode::End).next() {
            let (_, value) = item?;
            return Ok(Some(bincode::deserialize(&value)?));
        }

        Ok(None)
    }

    /// All event records in sequence order
    pub fn events(&self) -> Result<Vec<EventRecord>> {
        let cf = self.cf_handle(CF_EVENTS)?;

        let mut records = Vec::with_capacity(self.next_sequence as usize);
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            records.push(bincode::deserialize(&value)?);
        }
        Ok(records)
    }

    /// Re-hash the event log, returning the number of records checked
    pub fn verify_chain(&self) -> Result<u64> {
        let cf = self.cf_handle(CF_EVENTS)?;
        let mut expected_previous = [0u8; 32];
        let mut checked = 0u64;

        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_, value) = item?;
            let record: EventRecord = bincode::deserialize(&value)?;
            let index = checked;
            if record.sequence != index {
                return Err(Error::InvariantViolation(format!(
                    "event log gap: expected sequence {}, found {}",
                    index, record.sequence
                )));
            }
            if record.previous_hash != expected_previous {
                return Err(Error::InvariantViolation(format!(
                    "event {} does not chain onto its predecessor",
                    index
                )));
            }
            if record.compute_hash()? != record.record_hash {
                return Err(Error::InvariantViolation(format!(
                    "event {} hash mismatch",
                    index
                )));
            }
            expected_previous = record.record_hash;
            checked += 1;
        }

        Ok(checked)
    }

    /// Close database (graceful shutdown)
    pub fn close(self) -> Result<()> {
        drop(self.db);
        tracing::info!("RocksDB closed gracefully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fee::FeeConfig;
    use crate::ledger::Ledger;
    use crate::revenue::RevenueAccount;
    use crate::types::{AccountId, Wei};
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();
        (config, temp_dir)
    }

    fn test_state(units: u64) -> EngineState {
        let mut ledger = Ledger::new();
        ledger.mint(&AccountId::new("alice"), units).unwrap();
        EngineState {
            owner: AccountId::new("owner"),
            fee_config: FeeConfig::default(),
            ledger,
            revenue: RevenueAccount::default(),
            reserve: Wei(1_000),
        }
    }

    fn pawned(units: u64) -> ExchangeEvent {
        ExchangeEvent::Pawned {
            account: AccountId::new("alice"),
            units,
            paid: Wei(100),
            fee: Wei(1),
        }
    }

    #[test]
    fn test_storage_open_empty() {
        let (config, _temp) = test_config();
        let storage = Storage::open(&config).unwrap();
        assert_eq!(storage.event_count(), 0);
        assert!(storage.load_state().unwrap().is_none());
        assert!(storage.last_event().unwrap().is_none());
    }

    #[test]
    fn test_commit_and_read_back() {
        let (config, _temp) = test_config();
        let mut storage = Storage::open(&config).unwrap();

        let records = storage
            .commit(vec![pawned(1), pawned(2)], &test_state(3))
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].previous_hash, records[0].record_hash);

        assert_eq!(storage.event_count(), 2);
        assert_eq!(storage.get_event(1).unwrap().unwrap().event, pawned(2));
        assert_eq!(storage.load_state().unwrap(), Some(test_state(3)));
        assert_eq!(storage.verify_chain().unwrap(), 2);
    }

    #[test]
    fn test_reopen_continues_chain() {
        let (config, _temp) = test_config();
        {
            let mut storage = Storage::open(&config).unwrap();
            storage.commit(vec![pawned(1)], &test_state(1)).unwrap();
            storage.close().unwrap();
        }

        let mut storage = Storage::open(&config).unwrap();
        assert_eq!(storage.event_count(), 1);
        storage.commit(vec![pawned(2)], &test_state(3)).unwrap();

        assert_eq!(storage.verify_chain().unwrap(), 2);
        assert_eq!(storage.events().unwrap().len(), 2);
        assert_eq!(storage.load_state().unwrap(), Some(test_state(3)));
    }

    #[test]
    fn test_verify_chain_counts_stored_records() {
        let (config, _temp) = test_config();
        let mut storage = Storage::open(&config).unwrap();
        storage
            .commit(vec![pawned(1), pawned(2)], &test_state(3))
            .unwrap();

        // Truncate the log behind the cached head
        let cf = storage.cf_handle(CF_EVENTS).unwrap();
        storage.db.delete_cf(cf, 1u64.to_be_bytes()).unwrap();

        assert_eq!(storage.event_count(), 2);
        assert_eq!(storage.verify_chain().unwrap(), 1);
    }

    #[test]
    fn test_verify_chain_detects_tampering() {
        let (config, _temp) = test_config();
        let mut storage = Storage::open(&config).unwrap();
        storage
            .commit(vec![pawned(1), pawned(2)], &test_state(3))
            .unwrap();

        let mut record = storage.get_event(0).unwrap().unwrap();
        record.event = pawned(50);
        let cf = storage.cf_handle(CF_EVENTS).unwrap();
        storage
            .db
            .put_cf(cf, 0u64.to_be_bytes(), bincode::serialize(&record).unwrap())
            .unwrap();

        assert!(matches!(
            storage.verify_chain(),
            Err(Error::InvariantViolation(_))
        ));
    }
}
