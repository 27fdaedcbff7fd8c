//! Shared fixtures for bot integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bot::{CommandHandler, Cooldowns, RecordingSender, Update};
use database::{balance, user, Database, Tokens};
use ledger::{DepositEngine, LedgerConfig, RequestLifecycle, Settings, SqliteSettings};
use lookup_providers::mock::{FailingProvider, StaticProvider};
use payment_gateway::ScriptedGateway;
use serde_json::json;

pub const OWNER: i64 = 1000;
pub const USER: i64 = 7012345678;
pub const FRIEND: i64 = 7099999999;

pub struct TestBot {
    pub db: Database,
    pub sender: Arc<RecordingSender>,
    pub gateway: Arc<ScriptedGateway>,
    pub handler: Arc<CommandHandler<RecordingSender>>,
    next_update: AtomicI64,
}

/// A bot over an in-memory ledger with no cooldowns.
///
/// `nama` and `ceknik` always find a record, `nopol` is always down.
pub async fn test_bot() -> TestBot {
    test_bot_with_rate_limit(1000).await
}

pub async fn test_bot_with_rate_limit(per_minute: u32) -> TestBot {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.migrate().await.unwrap();

    let settings = Settings::new(
        Arc::new(SqliteSettings::new(db.clone(), Duration::ZERO)),
        Arc::new(LedgerConfig::default()),
    );
    let lifecycle = RequestLifecycle::new(db.clone(), settings.clone())
        .with_provider(
            "nama",
            Arc::new(StaticProvider::new(
                "nama",
                json!({"nama": "BUDI SANTOSO", "kota": "JAKARTA"}),
            )),
        )
        .with_provider(
            "ceknik",
            Arc::new(StaticProvider::new("ceknik", json!({"nik": "3171234567890001"}))),
        )
        .with_provider("nopol", Arc::new(FailingProvider::down("nopol")));

    let gateway = Arc::new(ScriptedGateway::new());
    let deposits = DepositEngine::new(db.clone(), settings.clone(), gateway.clone())
        .with_poll_timing(Duration::from_millis(10), Duration::from_secs(5));

    let sender = Arc::new(RecordingSender::new());
    let handler = Arc::new(
        CommandHandler::new(
            sender.clone(),
            db.clone(),
            settings,
            lifecycle,
            deposits,
            vec![OWNER.to_string()],
        )
        .with_rate_limit(per_minute)
        .with_cooldowns(Cooldowns::new(HashMap::new(), Duration::ZERO)),
    );

    TestBot {
        db,
        sender,
        gateway,
        handler,
        next_update: AtomicI64::new(1),
    }
}

impl TestBot {
    pub async fn say(&self, user_id: i64, text: &str) -> bot::Result<()> {
        let id = self.next_update.fetch_add(1, Ordering::SeqCst);
        self.handler.handle(Update::text(id, user_id, text)).await
    }

    pub async fn press(&self, user_id: i64, data: &str) -> bot::Result<()> {
        let id = self.next_update.fetch_add(1, Ordering::SeqCst);
        self.handler.handle(Update::button(id, user_id, data)).await
    }

    /// The last text delivered to a user's chat.
    pub fn last(&self, user_id: i64) -> String {
        self.sender
            .last_text(&user_id.to_string())
            .unwrap_or_default()
    }

    pub async fn credit(&self, user_id: i64, tokens: i64) {
        user::get_or_create_user(self.db.pool(), &user_id.to_string(), None, None)
            .await
            .unwrap();
        balance::credit(self.db.pool(), &user_id.to_string(), Tokens::whole(tokens))
            .await
            .unwrap();
    }

    pub async fn balance(&self, user_id: i64) -> Tokens {
        balance::balance(self.db.pool(), &user_id.to_string())
            .await
            .unwrap()
    }
}

/// Wait until a text containing `needle` reaches `chat_id`.
pub async fn wait_for(sender: &RecordingSender, chat_id: &str, needle: &str) -> String {
    for _ in 0..200 {
        if let Some(text) = sender
            .texts_to(chat_id)
            .into_iter()
            .find(|t| t.contains(needle))
        {
            return text;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!(
        "no message containing {:?} reached {}; got {:?}",
        needle,
        chat_id,
        sender.texts_to(chat_id)
    );
}
