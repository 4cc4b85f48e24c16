use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError},
};

use tokio::{
    net::TcpListener,
    sync::{Mutex, OwnedMutexGuard},
};
use tracing::{debug, error, info, warn};

use teloxide::{prelude::*, types::Update};

use relay_core::{
    config::Config,
    domain::ChatId,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    relay::RelayEngine,
    sqlite::SqliteStore,
    state::InMemoryConversationStore,
    webhook::{RetryPolicy, WebhookRegistrar},
};

use crate::{
    build_bot,
    server::{self, ServerState},
    update::to_incoming,
    TelegramMessenger, TelegramWebhookApi,
};

pub struct AppState {
    pub engine: Arc<RelayEngine>,
    pub chat_locks: Arc<ChatLocks>,
}

impl AppState {
    /// Processes `update` on its own task, serialized with other updates from the same chat.
    pub fn dispatch(self: &Arc<Self>, update: Update) {
        let Some(incoming) = to_incoming(&update) else {
            debug!(update_id = update.id, "ignoring unsupported update");
            return;
        };

        let state = Arc::clone(self);
        tokio::spawn(async move {
            let chat_id = incoming.chat_id();
            let _guard = state.chat_locks.lock_chat(chat_id).await;
            if let Err(e) = state.engine.handle(incoming).await {
                error!(chat_id = chat_id.0, error = %e, "failed to handle update");
            }
        });
    }
}

type LockMap = HashMap<ChatId, Arc<Mutex<()>>>;

/// One async mutex per chat with pending or running work.
///
/// An entry lives only while some task holds or waits on it, so the map stays
/// bounded by the number of chats in flight.
#[derive(Default)]
pub struct ChatLocks {
    inner: Arc<StdMutex<LockMap>>,
}

impl ChatLocks {
    pub async fn lock_chat(&self, chat_id: ChatId) -> ChatGuard {
        let lock = self
            .map()
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ChatGuard {
            locks: Arc::clone(&self.inner),
            chat_id,
            guard: Some(guard),
        }
    }

    /// Number of chats currently holding or waiting on a lock.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn map(&self) -> MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds a chat's lock; dropping it releases the lock and forgets idle chats.
pub struct ChatGuard {
    locks: Arc<StdMutex<LockMap>>,
    chat_id: ChatId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ChatGuard {
    fn drop(&mut self) {
        self.guard.take();
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // The map holds one reference; any other belongs to a queued task.
        if map
            .get(&self.chat_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.chat_id);
        }
    }
}

pub async fn run_webhook(cfg: Config) -> anyhow::Result<()> {
    let bot = build_bot(&cfg.telegram_bot_token, cfg.send_timeout)?;

    match bot.get_me().await {
        Ok(me) => info!(username = %me.username(), "bot identity confirmed"),
        Err(e) => warn!(error = %e, "could not fetch bot identity"),
    }

    let store = Arc::new(SqliteStore::open(&cfg.database_path)?);
    info!(path = %store.path().display(), "opened user directory");

    // Throttle outbound sends so broadcasts stay under Telegram's limits; the adapter
    // still honors a RetryAfter if one slips through.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let engine = RelayEngine::new(
        cfg.admin_chat_id,
        messenger,
        store.clone(),
        store,
        Arc::new(InMemoryConversationStore::new()),
    )
    .with_broadcast_concurrency(cfg.broadcast_concurrency);

    let state = Arc::new(AppState {
        engine: Arc::new(engine),
        chat_locks: Arc::new(ChatLocks::default()),
    });

    let registrar = WebhookRegistrar::new(
        Arc::new(TelegramWebhookApi::new(bot)),
        cfg.webhook_url(),
        cfg.webhook_secret.clone(),
        RetryPolicy {
            max_attempts: cfg.webhook_max_attempts,
            retry_delay: cfg.webhook_retry_delay,
        },
    );

    let dispatcher = state.clone();
    let app = server::app(
        &cfg.webhook_path,
        ServerState {
            webhook_secret: cfg.webhook_secret.clone(),
            status: registrar.status(),
            sink: Arc::new(move |update| dispatcher.dispatch(update)),
        },
    );

    let listener = TcpListener::bind(cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, path = %cfg.webhook_path, "listening for webhook updates");

    // Registration runs behind the listener so the first delivery has somewhere to land.
    tokio::spawn(async move {
        if let Err(e) = registrar.register().await {
            error!(error = %e, "webhook registration failed; serving without updates");
        }
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn chat_locks_serialize_same_chat_only() {
        let locks = Arc::new(ChatLocks::default());
        let guard = locks.lock_chat(ChatId(1)).await;

        // A different chat is not blocked.
        let other = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(2))).await;
        assert!(other.is_ok());

        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(1))).await;
        assert!(same.is_err());

        drop(guard);
        let same = tokio::time::timeout(Duration::from_millis(50), locks.lock_chat(ChatId(1))).await;
        assert!(same.is_ok());
    }

    #[tokio::test]
    async fn released_chats_are_forgotten() {
        let locks = ChatLocks::default();
        for id in 0..100 {
            let _guard = locks.lock_chat(ChatId(id)).await;
            assert_eq!(locks.len(), 1);
        }
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn queued_waiter_keeps_the_chat_entry() {
        let locks = Arc::new(ChatLocks::default());
        let first = locks.lock_chat(ChatId(7)).await;

        let waiter = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock_chat(ChatId(7)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.len(), 1);
        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn contended_chats_drain_to_empty() {
        let locks = Arc::new(ChatLocks::default());
        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let locks = Arc::clone(&locks);
                tokio::spawn(async move {
                    let _guard = locks.lock_chat(ChatId(i % 5)).await;
                    tokio::task::yield_now().await;
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert!(locks.is_empty());
    }
}
