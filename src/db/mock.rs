use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::{self, BoxFuture, FutureExt};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::Db;
use crate::errors::RegistryError;
use crate::record::{Record, RecordDetails, Times};
use crate::validation::Field;

/// An in-memory store with the same uniqueness and ordering rules as
/// the real one.
#[derive(Default)]
pub struct MockDb {
    /// Records in insertion order.
    records: Mutex<Vec<Record>>,
    unavailable: AtomicBool,
}

impl MockDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail as if the store were down.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(&self) -> Result<(), RegistryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RegistryError::Sqlx {
                source: sqlx::Error::PoolTimedOut,
            })
        } else {
            Ok(())
        }
    }

    fn list_now(&self) -> Result<Vec<Record>, RegistryError> {
        self.check_available()?;

        // newest first; among equal times, the later insertion first
        let mut records: Vec<Record> = self.lock().iter().rev().cloned().collect();
        records.sort_by(|a, b| b.times().created_at().cmp(&a.times().created_at()));

        Ok(records)
    }

    fn insert_now(&self, details: RecordDetails) -> Result<Record, RegistryError> {
        self.check_available()?;

        let mut records = self.lock();
        check_unique(&records, None, &details)?;

        let now = OffsetDateTime::now_utc();
        let record = Record::new(Uuid::new_v4(), details, Times::new(now, now));
        records.push(record.clone());

        Ok(record)
    }

    fn retrieve_now(&self, id: &Uuid) -> Result<Option<Record>, RegistryError> {
        self.check_available()?;

        Ok(self.lock().iter().find(|r| r.id() == id).cloned())
    }

    fn update_now(&self, id: &Uuid, details: RecordDetails) -> Result<Record, RegistryError> {
        self.check_available()?;

        let mut records = self.lock();
        check_unique(&records, Some(id), &details)?;

        let existing = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or(RegistryError::NonExistentId(*id))?;

        let times = Times::new(existing.times().created_at(), OffsetDateTime::now_utc());
        *existing = Record::new(*id, details, times);

        Ok(existing.clone())
    }

    fn delete_now(&self, id: &Uuid) -> Result<(), RegistryError> {
        self.check_available()?;

        let mut records = self.lock();
        let before = records.len();
        records.retain(|r| r.id() != id);

        if records.len() == before {
            Err(RegistryError::NonExistentId(*id))
        } else {
            Ok(())
        }
    }
}

fn check_unique(records: &[Record], except: Option<&Uuid>, details: &RecordDetails) -> Result<(), RegistryError> {
    let others = records.iter().filter(|r| Some(r.id()) != except);

    for other in others {
        if other.details().phone_number == details.phone_number {
            return Err(RegistryError::Duplicate(Field::PhoneNumber));
        }

        if other.details().car_number == details.car_number {
            return Err(RegistryError::Duplicate(Field::CarNumber));
        }
    }

    Ok(())
}

impl Db for MockDb {
    fn list(&self) -> BoxFuture<Result<Vec<Record>, RegistryError>> {
        future::ready(self.list_now()).boxed()
    }

    fn insert(&self, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>> {
        future::ready(self.insert_now(details)).boxed()
    }

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Record>, RegistryError>> {
        future::ready(self.retrieve_now(id)).boxed()
    }

    fn update(&self, id: &Uuid, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>> {
        future::ready(self.update_now(id, details)).boxed()
    }

    fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), RegistryError>> {
        future::ready(self.delete_now(id)).boxed()
    }

    fn ping(&self) -> BoxFuture<Result<(), RegistryError>> {
        future::ready(self.check_available()).boxed()
    }
}
