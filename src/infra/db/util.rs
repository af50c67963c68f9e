use std::sync::Arc;

use futures::{Stream, StreamExt};
use sqlx::{
    FromRow, Postgres,
    postgres::{PgPool, PgRow},
};
use tokio::sync::mpsc;

use crate::application::repos::{EntityStream, RepoError, StreamEvent};

pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::Database(db) if db.message().contains("duplicate key") => {
            RepoError::Duplicate {
                constraint: db.constraint().unwrap_or("unknown").to_string(),
            }
        }
        sqlx::Error::Database(db)
            if db.message().contains("violates foreign key constraint")
                || db.message().contains("invalid input syntax") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.message().contains("violates") => RepoError::Integrity {
            message: db.message().to_string(),
        },
        sqlx::Error::Database(db)
            if db
                .message()
                .contains("canceling statement due to user request") =>
        {
            RepoError::Timeout
        }
        other => RepoError::from_persistence(other),
    }
}

/// Zero affected rows on a keyed write means the key does not exist.
pub(super) fn expect_affected(rows_affected: u64) -> Result<(), RepoError> {
    if rows_affected == 0 {
        Err(RepoError::NotFound)
    } else {
        Ok(())
    }
}

/// Run `sql` on a background task and forward each row through a bounded channel.
///
/// A row that fails to decode is reported and skipped; any other failure is
/// reported and ends the export. [`StreamEvent::End`] is always sent last unless
/// the receiver has gone away.
pub(super) fn spawn_export<R, T>(pool: Arc<PgPool>, sql: &'static str, buffer: usize) -> EntityStream<T>
where
    R: for<'r> FromRow<'r, PgRow> + Send + Unpin + 'static,
    T: From<R> + Send + 'static,
{
    let (sender, receiver) = mpsc::channel(buffer.max(1));

    tokio::spawn(async move {
        let rows = sqlx::query_as::<Postgres, R>(sql).fetch(pool.as_ref());
        forward_rows(rows, sender).await;
    });

    receiver
}

async fn forward_rows<S, R, T>(rows: S, sender: mpsc::Sender<StreamEvent<T>>)
where
    S: Stream<Item = Result<R, sqlx::Error>>,
    T: From<R>,
{
    let mut rows = std::pin::pin!(rows);
    while let Some(row) = rows.next().await {
        let (event, fatal) = match row {
            Ok(row) => (StreamEvent::Row(T::from(row)), false),
            Err(err) => {
                let fatal = !is_decode_error(&err);
                (StreamEvent::Error(map_sqlx_error(err)), fatal)
            }
        };
        if sender.send(event).await.is_err() {
            return;
        }
        if fatal {
            break;
        }
    }
    let _ = sender.send(StreamEvent::End).await;
}

fn is_decode_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            RepoError::NotFound
        ));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::PoolTimedOut),
            RepoError::Persistence(_)
        ));
    }

    #[test]
    fn zero_affected_rows_is_not_found() {
        assert!(matches!(expect_affected(0), Err(RepoError::NotFound)));
        assert!(expect_affected(1).is_ok());
    }

    #[test]
    fn only_decode_failures_are_skippable() {
        assert!(is_decode_error(&sqlx::Error::ColumnNotFound("pos".into())));
        assert!(!is_decode_error(&sqlx::Error::PoolClosed));
    }

    async fn collect(rows: Vec<Result<i32, sqlx::Error>>) -> Vec<StreamEvent<i32>> {
        let (sender, mut receiver) = mpsc::channel(1);
        tokio::spawn(forward_rows(futures::stream::iter(rows), sender));
        let mut events = Vec::new();
        while let Some(event) = receiver.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn decode_failures_are_reported_and_the_export_continues() {
        let events = collect(vec![
            Ok(1),
            Err(sqlx::Error::ColumnNotFound("pos".into())),
            Ok(2),
        ])
        .await;

        assert_eq!(events.len(), 4);
        assert!(matches!(events[0], StreamEvent::Row(1)));
        assert!(matches!(events[1], StreamEvent::Error(RepoError::Persistence(_))));
        assert!(matches!(events[2], StreamEvent::Row(2)));
        assert!(matches!(events[3], StreamEvent::End));
    }

    #[tokio::test]
    async fn driver_failures_end_the_export() {
        let events = collect(vec![Ok(1), Err(sqlx::Error::PoolClosed), Ok(2)]).await;

        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], StreamEvent::Row(1)));
        assert!(matches!(events[1], StreamEvent::Error(_)));
        assert!(matches!(events[2], StreamEvent::End));
    }
}
