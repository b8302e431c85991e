//! Creating two accounts as one unit of work.
//!
//! The second signup fails transiently on its first attempt; the infallible
//! transaction rolls the first account back, rewinds the host log, and
//! re-runs the whole body until both accounts exist.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use durable_tx_core::{TelemetryConfig, infallible_transaction, init_telemetry, operation};
use durable_tx_memory::InMemoryHost;

#[derive(Debug, thiserror::Error)]
#[error("account service error: {0}")]
struct AccountError(String);

#[derive(Default)]
struct AccountService {
    accounts: Mutex<HashMap<u64, (String, String)>>,
    next_id: AtomicU64,
    signup_outages: AtomicU32,
}

impl AccountService {
    fn create(&self, username: &str, email: &str) -> Result<u64, AccountError> {
        if username == "bar"
            && self
                .signup_outages
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        {
            return Err(AccountError(format!("signup for {username} timed out")));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.accounts
            .lock()
            .unwrap()
            .insert(id, (username.to_string(), email.to_string()));
        tracing::info!(id, username, "account created");
        Ok(id)
    }

    fn delete(&self, id: u64) -> Result<(), AccountError> {
        self.accounts.lock().unwrap().remove(&id);
        tracing::info!(id, "account deleted");
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    let _telemetry = init_telemetry(&TelemetryConfig::default());

    let service = Arc::new(AccountService {
        signup_outages: AtomicU32::new(1),
        ..AccountService::default()
    });

    let create_account = {
        let on_execute = Arc::clone(&service);
        let on_compensate = Arc::clone(&service);
        operation(
            move |(username, email): (String, String)| on_execute.create(&username, &email),
            move |_, account_id| on_compensate.delete(account_id),
        )
    };

    let host = InMemoryHost::new();
    let (foo_id, bar_id) = infallible_transaction(&host, |tx| {
        let create_account = create_account.clone();
        Box::pin(async move {
            let foo_id = tx
                .execute(
                    &create_account,
                    ("foo".to_string(), "foo@example.com".to_string()),
                )
                .await?;
            let bar_id = tx
                .execute(
                    &create_account,
                    ("bar".to_string(), "bar@example.com".to_string()),
                )
                .await?;
            Ok((foo_id, bar_id))
        })
    })
    .await;

    println!("created accounts foo={foo_id} bar={bar_id}");
    println!("host rewound {} time(s)", host.rewinds().len());
}
