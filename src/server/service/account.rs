//! Account use cases.
//!
//! [`AccountService`] performs the account operations against the repository and is what the
//! worker handlers call. [`AccountTasks`] is the producer side used by request handlers: writes
//! are enqueued on the Critical queue and executed later by a worker.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::server::{
    data::account::AccountRepository,
    error::{data::DataError, Error},
    model::{
        dto::{OAuth2SaveUser, SignUpRequest, UserUpdate},
        entity::{Account, AccountInfo, NewAccount},
        task::{QueueClass, TaskName},
    },
    worker::client::TaskClient,
};

const DEFAULT_ROLE: &str = "Customer";
const LOCAL_KIND: &str = "swipe";

/// Executes account operations directly against the repository
#[derive(Clone)]
pub struct AccountService {
    repo: Arc<dyn AccountRepository>,
}

impl AccountService {
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self { repo }
    }

    /// Creates a local account for a sign up request.
    ///
    /// Signing up with an email that already has an account succeeds without changes, so a
    /// redelivered task has no further effect. `req.password` is stored as given: it is
    /// already the digest computed by [`AccountTasks::sign_up`].
    ///
    /// # Returns
    /// - `Ok(Some(id))` - Account created
    /// - `Ok(None)` - An account already exists for the email
    /// - `Err(Error)` - Repository failure
    pub async fn sign_up(&self, req: SignUpRequest) -> Result<Option<i64>, Error> {
        if self.exists(&req.email).await? {
            tracing::info!("Account for {} already exists, skipping sign up", req.email);
            return Ok(None);
        }

        let username = format!("{} {}", req.first_name, req.last_name)
            .trim()
            .to_string();

        let id = self
            .repo
            .insert(NewAccount {
                username,
                email: req.email,
                password: req.password,
                role: DEFAULT_ROLE.to_string(),
                kind: LOCAL_KIND.to_string(),
            })
            .await?;

        tracing::debug!("Created account {}", id);

        Ok(Some(id))
    }

    pub async fn update_user_info(&self, req: UserUpdate) -> Result<(), Error> {
        self.repo
            .save_info(AccountInfo {
                email: req.email,
                username: req.username,
                role: req.role,
            })
            .await
    }

    /// Stores an account authenticated by an OAuth2 provider unless one exists for the email
    pub async fn oauth2_save_user(&self, req: OAuth2SaveUser) -> Result<Option<i64>, Error> {
        if self.exists(&req.email).await? {
            tracing::debug!("Account for {} already exists", req.email);
            return Ok(None);
        }

        let id = self
            .repo
            .insert(NewAccount {
                username: req.username,
                email: req.email,
                password: String::new(),
                role: DEFAULT_ROLE.to_string(),
                kind: req.provider,
            })
            .await?;

        Ok(Some(id))
    }

    async fn exists(&self, email: &str) -> Result<bool, Error> {
        match self.repo.get_by_email(email).await {
            Ok(_) => Ok(true),
            Err(Error::DataError(DataError::NotFound(_))) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

// TODO: replace with a salted password hash (argon2) once login lands in this crate.
fn hash_password(password: &str) -> String {
    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Producer side of the account operations.
///
/// Writes are enqueued as tasks on the Critical queue and return once the broker accepted
/// them. Reads go straight to the repository.
#[derive(Clone)]
pub struct AccountTasks {
    client: TaskClient,
    repo: Arc<dyn AccountRepository>,
}

impl AccountTasks {
    pub fn new(client: TaskClient, repo: Arc<dyn AccountRepository>) -> Self {
        Self { client, repo }
    }

    /// Enqueues a sign up with the password replaced by its digest
    pub async fn sign_up(&self, mut req: SignUpRequest) -> Result<(), Error> {
        req.password = hash_password(&req.password);

        self.client
            .enqueue_payload(QueueClass::Critical, TaskName::SignUp, &req)
            .await
    }

    pub async fn update_user_info(&self, req: UserUpdate) -> Result<(), Error> {
        self.client
            .enqueue_payload(QueueClass::Critical, TaskName::UpdateUserInfo, &req)
            .await
    }

    pub async fn oauth2_save_user(&self, req: OAuth2SaveUser) -> Result<(), Error> {
        self.client
            .enqueue_payload(QueueClass::Critical, TaskName::OAuth2SaveUser, &req)
            .await
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Account, Error> {
        self.repo.get_by_email(email).await
    }
}

#[cfg(test)]
mod tests {
    use swipex_test_utils::prelude::*;

    use super::*;
    use crate::server::{
        data::account::SqlAccountRepository,
        error::worker::WorkerError,
        model::task::TaskEnvelope,
        worker::{
            queue::{MemoryBroker, TaskBroker},
            testing::OfflineBroker,
        },
    };

    fn sign_up_request(email: &str) -> SignUpRequest {
        SignUpRequest {
            email: email.to_string(),
            password: "hunter2".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone_number: "0123456789".to_string(),
        }
    }

    async fn service() -> Result<(TestSetup, Arc<SqlAccountRepository>, AccountService), TestError>
    {
        let test = TestSetup::new().await?;
        let repo = Arc::new(SqlAccountRepository::new(Arc::new(test.db.clone())));
        let service = AccountService::new(repo.clone());

        Ok((test, repo, service))
    }

    #[tokio::test]
    async fn sign_up_creates_customer_account() -> Result<(), TestError> {
        let (_test, repo, service) = service().await?;

        let id = service
            .sign_up(sign_up_request("ada@example.com"))
            .await
            .expect("Sign up should succeed");
        let account = repo.get_by_email("ada@example.com").await.unwrap();

        assert_eq!(Some(account.id), id);
        assert_eq!(account.username, "Ada Lovelace");
        assert_eq!(account.role, "Customer");
        assert_eq!(account.kind, "swipe");
        assert_eq!(account.password, "hunter2");

        Ok(())
    }

    /// Expect a repeated sign up for the same email to keep the first account
    #[tokio::test]
    async fn sign_up_is_idempotent() -> Result<(), TestError> {
        let (_test, repo, service) = service().await?;

        let first = service.sign_up(sign_up_request("ada@example.com")).await.unwrap();
        let mut again = sign_up_request("ada@example.com");
        again.first_name = "Someone".to_string();
        let second = service.sign_up(again).await.unwrap();

        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(
            repo.get_by_email("ada@example.com").await.unwrap().username,
            "Ada Lovelace"
        );

        Ok(())
    }

    #[tokio::test]
    async fn update_user_info_changes_account() -> Result<(), TestError> {
        let (_test, repo, service) = service().await?;
        service.sign_up(sign_up_request("ada@example.com")).await.unwrap();

        service
            .update_user_info(UserUpdate {
                email: "ada@example.com".to_string(),
                username: Some("ada".to_string()),
                role: None,
            })
            .await
            .expect("Update should succeed");
        let account = repo.get_by_email("ada@example.com").await.unwrap();

        assert_eq!(account.username, "ada");
        assert_eq!(account.role, "Customer");

        Ok(())
    }

    #[tokio::test]
    async fn oauth2_save_user_records_provider_once() -> Result<(), TestError> {
        let (_test, repo, service) = service().await?;
        let req = OAuth2SaveUser {
            email: "grace@example.com".to_string(),
            username: "grace".to_string(),
            provider: "google".to_string(),
        };

        let first = service.oauth2_save_user(req.clone()).await.unwrap();
        let second = service.oauth2_save_user(req).await.unwrap();
        let account = repo.get_by_email("grace@example.com").await.unwrap();

        assert!(first.is_some());
        assert_eq!(second, None);
        assert_eq!(account.kind, "google");

        Ok(())
    }

    #[tokio::test]
    async fn producer_enqueues_on_critical_queue() -> Result<(), TestError> {
        let test = TestSetup::new().await?;
        let broker = Arc::new(MemoryBroker::new());
        let tasks = AccountTasks::new(
            TaskClient::new(broker.clone()),
            Arc::new(SqlAccountRepository::new(Arc::new(test.db.clone()))),
        );

        tasks.sign_up(sign_up_request("ada@example.com")).await.unwrap();
        tasks
            .update_user_info(UserUpdate {
                email: "ada@example.com".to_string(),
                username: None,
                role: Some("Admin".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(broker.len(QueueClass::Critical).await.unwrap(), 2);
        assert_eq!(broker.len(QueueClass::Default).await.unwrap(), 0);

        let delivery = broker.pop(&[QueueClass::Critical]).await.unwrap().unwrap();
        let envelope = TaskEnvelope::decode(&delivery.raw).unwrap();
        assert_eq!(envelope.name, TaskName::SignUp);
        assert_eq!(envelope.payload["email"], "ada@example.com");

        Ok(())
    }

    #[tokio::test]
    async fn producer_never_enqueues_plaintext_password() -> Result<(), TestError> {
        let test = TestSetup::new().await?;
        let broker = Arc::new(MemoryBroker::new());
        let tasks = AccountTasks::new(
            TaskClient::new(broker.clone()),
            Arc::new(SqlAccountRepository::new(Arc::new(test.db.clone()))),
        );

        tasks.sign_up(sign_up_request("ada@example.com")).await.unwrap();

        let delivery = broker.pop(&[QueueClass::Critical]).await.unwrap().unwrap();
        assert!(!delivery.raw.contains("hunter2"));
        let envelope = TaskEnvelope::decode(&delivery.raw).unwrap();
        assert_eq!(envelope.payload["password"], hash_password("hunter2"));

        Ok(())
    }

    #[tokio::test]
    async fn producer_returns_broker_failure() -> Result<(), TestError> {
        let test = TestSetup::new().await?;
        let tasks = AccountTasks::new(
            TaskClient::new(Arc::new(OfflineBroker::default())),
            Arc::new(SqlAccountRepository::new(Arc::new(test.db.clone()))),
        );

        let result = tasks.sign_up(sign_up_request("ada@example.com")).await;

        assert!(matches!(
            result,
            Err(Error::WorkerError(WorkerError::BrokerUnavailable(_)))
        ));

        Ok(())
    }
}
