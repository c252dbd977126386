//! Cancellable row streams.

use futures::{Stream, TryStreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{DbError, Result};

/// Next item of a driver row stream, or `Cancelled` as soon as the token
/// fires, even while the server has not produced the next row yet.
pub async fn next_row<S, T, E>(stream: &mut S, cancel: &CancellationToken) -> Result<Option<T>>
where
    S: Stream<Item = std::result::Result<T, E>> + Unpin,
    DbError: From<E>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(DbError::Cancelled),
        row = stream.try_next() => Ok(row?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stalled_stream_is_cancelled() {
        let cancel = CancellationToken::new();
        let mut rows = stream::pending::<std::result::Result<i32, DbError>>();

        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(5), next_row(&mut rows, &cancel))
            .await
            .expect("cancellation should end the wait");
        assert!(matches!(result, Err(DbError::Cancelled)));
    }

    #[tokio::test]
    async fn test_rows_pass_through_until_end() {
        let cancel = CancellationToken::new();
        let mut rows = stream::iter(vec![Ok::<_, DbError>(1), Ok(2)]);

        assert_eq!(next_row(&mut rows, &cancel).await.unwrap(), Some(1));
        assert_eq!(next_row(&mut rows, &cancel).await.unwrap(), Some(2));
        assert_eq!(next_row(&mut rows, &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cancel_wins_over_ready_row() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rows = stream::iter(vec![Ok::<_, DbError>(1)]);

        assert!(matches!(
            next_row(&mut rows, &cancel).await,
            Err(DbError::Cancelled)
        ));
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let cancel = CancellationToken::new();
        let mut rows = stream::iter(vec![Err::<i32, _>(DbError::Query("lost".into()))]);

        let err = next_row(&mut rows, &cancel).await.unwrap_err();
        assert_eq!(err.to_string(), DbError::Query("lost".into()).to_string());
    }
}
