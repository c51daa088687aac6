use futures::future::BoxFuture;
use uuid::Uuid;

use crate::errors::RegistryError;
use crate::record::{Record, RecordDetails};

pub mod mock;

pub trait Db {
    /// Returns every record, newest first.
    fn list(&self) -> BoxFuture<Result<Vec<Record>, RegistryError>>;

    /// Stores a new record, assigning its ID and times.
    fn insert(&self, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>>;

    fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Record>, RegistryError>>;

    /// Replaces the fields of an existing record.
    fn update(&self, id: &Uuid, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>>;

    fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), RegistryError>>;

    /// Checks that the store can be reached.
    fn ping(&self) -> BoxFuture<Result<(), RegistryError>>;
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use sqlx::{
        self,
        postgres::{PgPool, PgRow},
    };
    use time::{Date, OffsetDateTime};
    use uuid::Uuid;

    use crate::errors::RegistryError;
    use crate::record::{Gender, Record, RecordDetails, Times};
    use crate::validation::Field;

    const RECORDS_PHONE_NUMBER_CONSTRAINT: &str = "records_phone_number";
    const RECORDS_CAR_NUMBER_CONSTRAINT: &str = "records_car_number";

    pub struct PgDb {
        pool: PgPool,
    }

    impl PgDb {
        pub fn new(pool: PgPool) -> Self {
            PgDb { pool }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
        fn list(&self) -> BoxFuture<Result<Vec<Record>, RegistryError>> {
            async move {
                let query = sqlx::query(include_str!("queries/list.sql"));

                let records = query
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(records)
            }
            .boxed()
        }

        fn insert(&self, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>> {
            async move {
                let query = sqlx::query(include_str!("queries/create.sql"));

                let record = query
                    .bind(&details.username)
                    .bind(&details.phone_number)
                    .bind(details.birth_date)
                    .bind(details.gender.as_str())
                    .bind(&details.car_number)
                    .bind(&details.car_type)
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn retrieve(&self, id: &Uuid) -> BoxFuture<Result<Option<Record>, RegistryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/retrieve.sql"));

                let record = query
                    .bind(id)
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(record)
            }
            .boxed()
        }

        fn update(&self, id: &Uuid, details: RecordDetails) -> BoxFuture<Result<Record, RegistryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/update.sql"));

                let record = query
                    .bind(id)
                    .bind(&details.username)
                    .bind(&details.phone_number)
                    .bind(details.birth_date)
                    .bind(details.gender.as_str())
                    .bind(&details.car_number)
                    .bind(&details.car_type)
                    .try_map(|row: PgRow| record_from_row(&row))
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                record.ok_or(RegistryError::NonExistentId(id))
            }
            .boxed()
        }

        fn delete(&self, id: &Uuid) -> BoxFuture<Result<(), RegistryError>> {
            let id = *id;

            async move {
                let query = sqlx::query(include_str!("queries/delete.sql"));

                let count = query
                    .bind(id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(RegistryError::NonExistentId(id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn ping(&self) -> BoxFuture<Result<(), RegistryError>> {
            async move {
                let query = sqlx::query(include_str!("queries/ping.sql"));

                query.execute(&self.pool).await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }
    }

    fn record_from_row(row: &PgRow) -> Result<Record, sqlx::Error> {
        let id: Uuid = try_get(row, "id")?;
        let created_at: OffsetDateTime = try_get(row, "created_at")?;
        let updated_at: OffsetDateTime = try_get(row, "updated_at")?;
        let birth_date: Date = try_get(row, "birth_date")?;

        let gender: String = try_get(row, "gender")?;
        // the table constrains this, so a failure means the schema drifted
        let gender: Gender = gender
            .parse()
            .map_err(|e| sqlx::Error::Decode(Box::new(e)))?;

        let details = RecordDetails {
            username: try_get(row, "username")?,
            phone_number: try_get(row, "phone_number")?,
            birth_date,
            gender,
            car_number: try_get(row, "car_number")?,
            car_type: try_get(row, "car_type")?,
        };

        Ok(Record::new(id, details, Times::new(created_at, updated_at)))
    }

    fn try_get<'a, T: sqlx::Type<sqlx::Postgres> + sqlx::decode::Decode<'a, sqlx::Postgres>>(
        row: &'a PgRow,
        column: &str,
    ) -> Result<T, sqlx::Error> {
        use sqlx::prelude::*;

        row.try_get(column)
    }

    fn map_sqlx_error(error: sqlx::Error) -> RegistryError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(RECORDS_PHONE_NUMBER_CONSTRAINT) => {
                RegistryError::Duplicate(Field::PhoneNumber)
            }
            Error::Database(ref e) if e.constraint() == Some(RECORDS_CAR_NUMBER_CONSTRAINT) => {
                RegistryError::Duplicate(Field::CarNumber)
            }
            _ => RegistryError::Sqlx { source: error },
        }
    }
}
