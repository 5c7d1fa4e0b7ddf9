use std::{
    ops::{Deref, DerefMut},
    sync::Arc,
};

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::Key;
use diesel::{
    SqliteConnection,
    connection::TransactionManager,
    r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection},
};

use crate::util_resp::FailureResponse;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub key: Key,
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.key.clone()
    }
}

/// Runs on every connection the pool hands out. SQLite does not enforce
/// foreign keys unless asked, and cascade deletes depend on it.
#[derive(Debug)]
pub struct ForeignKeyCustomizer;

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error>
    for ForeignKeyCustomizer
{
    fn on_acquire(
        &self,
        conn: &mut SqliteConnection,
    ) -> Result<(), diesel::r2d2::Error> {
        use diesel::RunQueryDsl;

        diesel::sql_query("PRAGMA foreign_keys = ON;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        diesel::sql_query("PRAGMA busy_timeout = 5000;")
            .execute(conn)
            .map_err(diesel::r2d2::Error::QueryError)?;
        Ok(())
    }
}

pub fn build_pool(db_url: &str) -> DbPool {
    Pool::builder()
        .max_size(if db_url == ":memory:" { 1 } else { 10 })
        .connection_customizer(Box::new(ForeignKeyCustomizer))
        .build(ConnectionManager::<SqliteConnection>::new(db_url))
        .expect("failed to build database pool")
}

/// Per-request slot holding the (at most one) database connection checked out
/// for this request, plus whether a transaction was opened on it. Inserted
/// into the request extensions by [`commit_on_success`] and filled lazily by
/// the [`ThreadSafeConn`] extractor.
#[derive(Clone, Default)]
pub struct ConnSlot {
    inner: Arc<tokio::sync::Mutex<Option<(Arc<tokio::sync::Mutex<PooledConn>>, bool)>>>,
}

/// Commits the request's open transaction when the handler produced a
/// success or redirect status, and rolls it back otherwise.
pub async fn commit_on_success(
    State(_pool): State<DbPool>,
    mut req: Request,
    next: Next,
) -> Response {
    let slot = ConnSlot::default();
    req.extensions_mut().insert(slot.clone());

    let res = next.run(req).await;

    let guard = slot.inner.lock().await;
    if let Some((conn, true)) = guard.as_ref().map(|(c, tx)| (c.clone(), *tx))
    {
        // The handler has returned, so nothing else holds the lock.
        let mut conn = conn
            .try_lock()
            .expect("connection still locked after request completed");

        let outcome = if res.status().is_success()
            || res.status().is_redirection()
            || res.status().is_informational()
        {
            <SqliteConnection as diesel::Connection>::TransactionManager::commit_transaction(
                &mut **conn,
            )
        } else {
            <SqliteConnection as diesel::Connection>::TransactionManager::rollback_transaction(
                &mut **conn,
            )
        };

        if let Err(e) = outcome {
            tracing::error!("failed to finish request transaction: {e}");
        }
    }

    res
}

/// A database connection shared for the lifetime of one request. When `TX` is
/// true the connection has an open transaction, which is committed or rolled
/// back by [`commit_on_success`] once the response status is known.
#[derive(Clone)]
pub struct ThreadSafeConn<const TX: bool> {
    pub inner: Arc<tokio::sync::Mutex<PooledConn>>,
}

#[async_trait]
impl<const TX: bool, S> FromRequestParts<S> for ThreadSafeConn<TX>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let slot = parts
            .extensions
            .get::<ConnSlot>()
            .cloned()
            .ok_or(FailureResponse::ServerError(()))?;

        let mut guard = slot.inner.lock().await;

        if let Some((conn, _)) = guard.as_ref() {
            return Ok(ThreadSafeConn {
                inner: conn.clone(),
            });
        }

        let pool = DbPool::from_ref(state);
        let mut conn = tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| FailureResponse::ServerError(()))?
            .map_err(|_| FailureResponse::ServerError(()))?;

        if TX {
            <SqliteConnection as diesel::Connection>::TransactionManager::begin_transaction(
                &mut *conn,
            )
            .map_err(|_| FailureResponse::ServerError(()))?;
        }

        let conn = Arc::new(tokio::sync::Mutex::new(conn));
        *guard = Some((conn.clone(), TX));

        Ok(ThreadSafeConn { inner: conn })
    }
}

/// Exclusive handle on the request's connection, for handlers which do their
/// database work inline.
pub struct Conn<const TX: bool> {
    inner: tokio::sync::OwnedMutexGuard<PooledConn>,
}

impl<const TX: bool> Deref for Conn<TX> {
    type Target = PooledConn;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

impl<const TX: bool> DerefMut for Conn<TX> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.deref_mut()
    }
}

#[async_trait]
impl<const TX: bool, S> FromRequestParts<S> for Conn<TX>
where
    S: Send + Sync,
    DbPool: FromRef<S>,
{
    type Rejection = FailureResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let conn = ThreadSafeConn::<TX>::from_request_parts(parts, state).await?;

        Ok(Conn {
            inner: conn
                .inner
                .try_lock_owned()
                .map_err(|_| FailureResponse::ServerError(()))?,
        })
    }
}
