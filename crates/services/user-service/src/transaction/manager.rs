//! Backend-agnostic transaction manager.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use common::{AppError, AppResult};

use super::{TxExecutor, TxRepository};

/// Opens a new executor against the backend.
pub type BeginFn<E> = Arc<dyn Fn() -> BoxFuture<'static, AppResult<E>> + Send + Sync>;

/// Builds the scoped write repository bound to an open executor.
pub type ScopeFn<E> = for<'a> fn(&'a mut E) -> Box<dyn TxRepository + 'a>;

/// Runs callbacks atomically against whichever backend supplied `begin` and `scope`.
///
/// Each call owns its executor from begin to commit or rollback; the callback
/// only ever sees the scoped repository, never the executor itself.
pub struct TransactionManager<E> {
    begin: BeginFn<E>,
    scope: ScopeFn<E>,
}

impl<E> Clone for TransactionManager<E> {
    fn clone(&self) -> Self {
        Self {
            begin: Arc::clone(&self.begin),
            scope: self.scope,
        }
    }
}

impl<E: TxExecutor> TransactionManager<E> {
    pub fn new<B, Fut>(begin: B, scope: ScopeFn<E>) -> Self
    where
        B: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<E>> + Send + 'static,
    {
        let begin: BeginFn<E> = Arc::new(move || -> BoxFuture<'static, AppResult<E>> {
            Box::pin(begin())
        });
        Self { begin, scope }
    }

    /// Execute a callback within a transaction.
    ///
    /// Commits when the callback succeeds. On failure rolls back and returns
    /// the callback's error untouched, or [`AppError::RollbackFailed`] carrying
    /// both errors when the rollback itself fails.
    pub async fn execute_tx<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut dyn TxRepository) -> BoxFuture<'r, AppResult<T>> + Send,
    {
        self.run(None, f).await
    }

    /// Like [`execute_tx`](Self::execute_tx), but a cancelled token aborts the
    /// in-flight callback and rolls back instead of committing.
    pub async fn execute_tx_cancellable<T, F>(&self, token: &CancellationToken, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut dyn TxRepository) -> BoxFuture<'r, AppResult<T>> + Send,
    {
        self.run(Some(token), f).await
    }

    async fn run<T, F>(&self, cancel: Option<&CancellationToken>, f: F) -> AppResult<T>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut dyn TxRepository) -> BoxFuture<'r, AppResult<T>> + Send,
    {
        if cancel.is_some_and(CancellationToken::is_cancelled) {
            return Err(AppError::Cancelled);
        }

        let begin = (self.begin)();
        let begun = match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(AppError::Cancelled),
                    result = begin => result,
                }
            }
            None => begin.await,
        };
        let mut executor = begun.map_err(|e| AppError::TransactionBegin(Box::new(e)))?;

        let outcome = {
            let mut scoped = (self.scope)(&mut executor);
            let work = f(&mut *scoped);
            match cancel {
                Some(token) => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => Err(AppError::Cancelled),
                        result = work => result,
                    }
                }
                None => work.await,
            }
        };

        match outcome {
            Ok(value) => {
                executor
                    .commit()
                    .await
                    .map_err(|e| AppError::TransactionCommit(Box::new(e)))?;
                Ok(value)
            }
            Err(original) => match executor.rollback().await {
                Ok(()) => Err(original),
                Err(rollback) => {
                    tracing::error!(error = %original, rollback_error = %rollback, "Transaction rollback failed");
                    Err(AppError::RollbackFailed {
                        original: Box::new(original),
                        rollback: Box::new(rollback),
                    })
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use uuid::Uuid;

    use domain::{
        NewPermission, NewRole, NewUser, Permission, PermissionUpdate, Role, RoleUpdate, User,
        UserUpdate,
    };

    use super::*;

    #[derive(Default)]
    struct Counters {
        begins: AtomicUsize,
        commits: AtomicUsize,
        rollbacks: AtomicUsize,
        writes: AtomicUsize,
    }

    #[derive(Clone, Copy, Default)]
    struct Faults {
        begin: bool,
        stall_begin: bool,
        commit: bool,
        rollback: bool,
    }

    struct FakeTx {
        counters: Arc<Counters>,
        faults: Faults,
    }

    #[async_trait]
    impl TxExecutor for FakeTx {
        async fn commit(self) -> AppResult<()> {
            self.counters.commits.fetch_add(1, Ordering::SeqCst);
            if self.faults.commit {
                return Err(AppError::internal("commit refused"));
            }
            Ok(())
        }

        async fn rollback(self) -> AppResult<()> {
            self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
            if self.faults.rollback {
                return Err(AppError::internal("connection reset"));
            }
            Ok(())
        }
    }

    struct FakeScope<'a> {
        tx: &'a mut FakeTx,
    }

    impl FakeScope<'_> {
        fn record(&self) {
            self.tx.counters.writes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl TxRepository for FakeScope<'_> {
        async fn create_user(&mut self, user: NewUser) -> AppResult<User> {
            self.record();
            let now = Utc::now();
            Ok(User {
                id: Uuid::new_v4(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                first_name: user.first_name,
                last_name: user.last_name,
                is_active: user.is_active,
                created_at: now,
                updated_at: now,
                roles: Vec::new(),
            })
        }

        async fn update_user(&mut self, _id: Uuid, _update: UserUpdate) -> AppResult<()> {
            self.record();
            Err(AppError::not_found("user"))
        }

        async fn update_user_password(&mut self, _id: Uuid, _hash: String) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn replace_user_roles(&mut self, _user_id: Uuid, _role_ids: Vec<Uuid>) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn create_role(&mut self, _role: NewRole) -> AppResult<Role> {
            self.record();
            Err(AppError::internal("not used"))
        }

        async fn update_role(&mut self, _id: Uuid, _update: RoleUpdate) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn replace_role_permissions(
            &mut self,
            _role_id: Uuid,
            _permission_ids: Vec<Uuid>,
        ) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn create_permission(&mut self, _permission: NewPermission) -> AppResult<Permission> {
            self.record();
            Err(AppError::internal("not used"))
        }

        async fn update_permission(&mut self, _id: Uuid, _update: PermissionUpdate) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn delete_user(&mut self, _id: Uuid) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn delete_role(&mut self, _id: Uuid) -> AppResult<()> {
            self.record();
            Ok(())
        }

        async fn delete_permission(&mut self, _id: Uuid) -> AppResult<()> {
            self.record();
            Ok(())
        }
    }

    fn fake_scope(tx: &mut FakeTx) -> Box<dyn TxRepository + '_> {
        Box::new(FakeScope { tx })
    }

    fn manager(faults: Faults) -> (TransactionManager<FakeTx>, Arc<Counters>) {
        let counters = Arc::new(Counters::default());
        let shared = Arc::clone(&counters);
        let manager = TransactionManager::new(
            move || {
                let counters = Arc::clone(&shared);
                async move {
                    counters.begins.fetch_add(1, Ordering::SeqCst);
                    if faults.begin {
                        return Err(AppError::unavailable("fake backend"));
                    }
                    if faults.stall_begin {
                        std::future::pending::<()>().await;
                    }
                    Ok(FakeTx { counters, faults })
                }
            },
            fake_scope,
        );
        (manager, counters)
    }

    fn new_user() -> NewUser {
        NewUser {
            username: "jdoe".to_string(),
            email: "jdoe@example.com".to_string(),
            password_hash: "hash".to_string(),
            first_name: "John".to_string(),
            last_name: "Doe".to_string(),
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_success_commits_once_and_returns_value() {
        let (manager, counters) = manager(Faults::default());

        let user = manager
            .execute_tx(|repo| {
                Box::pin(async move {
                    let user = repo.create_user(new_user()).await?;
                    repo.replace_user_roles(user.id, vec![Uuid::new_v4()]).await?;
                    Ok(user)
                })
            })
            .await
            .unwrap();

        assert_eq!(user.username, "jdoe");
        assert_eq!(counters.writes.load(Ordering::SeqCst), 2);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_callback_error_rolls_back_and_propagates_verbatim() {
        let (manager, counters) = manager(Faults::default());

        let err = manager
            .execute_tx(|repo| {
                Box::pin(async move {
                    repo.create_user(new_user()).await?;
                    Err::<(), _>(AppError::validation("invalid role id"))
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(&err, AppError::Validation(msg) if msg == "invalid role id"));
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repository_error_propagates_kind() {
        let (manager, counters) = manager(Faults::default());

        let err = manager
            .execute_tx(|repo| {
                Box::pin(async move {
                    let update = UserUpdate {
                        username: "x".to_string(),
                        email: "x@example.com".to_string(),
                        first_name: String::new(),
                        last_name: String::new(),
                        is_active: true,
                    };
                    repo.update_user(Uuid::new_v4(), update).await
                })
            })
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rollback_failure_reports_both_errors() {
        let (manager, counters) = manager(Faults {
            rollback: true,
            ..Default::default()
        });

        let err = manager
            .execute_tx(|_repo| {
                Box::pin(async move { Err::<(), _>(AppError::validation("invalid role id")) })
            })
            .await
            .unwrap_err();

        match &err {
            AppError::RollbackFailed { original, rollback } => {
                assert!(matches!(original.as_ref(), AppError::Validation(_)));
                assert!(rollback.to_string().contains("connection reset"));
            }
            other => panic!("expected rollback failure, got {other:?}"),
        }
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_begin_failure_has_no_side_effects() {
        let (manager, counters) = manager(Faults {
            begin: true,
            ..Default::default()
        });
        let invoked = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&invoked);

        let err = manager
            .execute_tx(move |_repo| {
                seen.fetch_add(1, Ordering::SeqCst);
                Box::pin(async move { Ok(()) })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransactionBegin(_)));
        assert_eq!(invoked.load(Ordering::SeqCst), 0);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 0);
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_commit_failure_is_wrapped() {
        let (manager, counters) = manager(Faults {
            commit: true,
            ..Default::default()
        });

        let err = manager
            .execute_tx(|_repo| Box::pin(async move { Ok(()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::TransactionCommit(_)));
        assert!(err.to_string().contains("commit refused"));
        assert_eq!(counters.commits.load(Ordering::SeqCst), 1);
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_while_begin_is_pending() {
        let (manager, counters) = manager(Faults {
            stall_begin: true,
            ..Default::default()
        });
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = manager
            .execute_tx_cancellable(&token, |_repo| Box::pin(async move { Ok(()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(counters.begins.load(Ordering::SeqCst), 1);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 0);
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_during_callback_rolls_back() {
        let (manager, counters) = manager(Faults::default());
        let token = CancellationToken::new();
        let trigger = token.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = manager
            .execute_tx_cancellable(&token, |repo| {
                Box::pin(async move {
                    repo.create_user(new_user()).await?;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(())
                })
            })
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(counters.rollbacks.load(Ordering::SeqCst), 1);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_already_cancelled_token_never_begins() {
        let (manager, counters) = manager(Faults::default());
        let token = CancellationToken::new();
        token.cancel();

        let err = manager
            .execute_tx_cancellable(&token, |_repo| Box::pin(async move { Ok(()) }))
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(counters.begins.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_calls_each_own_an_executor() {
        let (manager, counters) = manager(Faults::default());

        let calls = (0..8).map(|_| {
            let manager = manager.clone();
            tokio::spawn(async move {
                let update = RoleUpdate {
                    name: "reviewer".to_string(),
                    description: String::new(),
                };
                manager
                    .execute_tx(move |repo| {
                        Box::pin(async move { repo.update_role(Uuid::new_v4(), update).await })
                    })
                    .await
            })
        });

        for result in futures::future::join_all(calls).await {
            assert!(result.unwrap().is_ok());
        }
        assert_eq!(counters.begins.load(Ordering::SeqCst), 8);
        assert_eq!(counters.commits.load(Ordering::SeqCst), 8);
    }
}
