use std::sync::Arc;

use crate::analytics::AnalyticsSource;
use crate::api::rate_limit::RateLimiter;
use crate::chat::{ChatHub, ChatService};
use crate::config::AppConfig;
use crate::store::Store;

/// Everything a handler can reach: the store plus the long-lived services
/// built on top of it.
pub struct AppState<S> {
    pub store: Arc<S>,
    pub chat: ChatService<S>,
    pub analytics: Arc<dyn AnalyticsSource>,
    pub limiter: Arc<RateLimiter>,
    pub config: Arc<AppConfig>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            chat: self.chat.clone(),
            analytics: self.analytics.clone(),
            limiter: self.limiter.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> AppState<S> {
    pub fn new(store: Arc<S>, analytics: Arc<dyn AnalyticsSource>, config: AppConfig) -> Self {
        let chat = ChatService::new(store.clone(), Arc::new(ChatHub::new()));
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        Self {
            store,
            chat,
            analytics,
            limiter,
            config: Arc::new(config),
        }
    }
}
