//! Per-platform protocol adapters.

mod facebook;
mod google;
mod instagram;
mod linkedin;
pub(crate) mod oauth2;
mod telegram;
mod tiktok;
mod twitter;

use std::collections::HashMap;
use std::sync::Arc;

use postbridge_core::ports::PlatformAdapter;
use postbridge_domain::Platform;

pub use facebook::FacebookAdapter;
pub use google::GoogleAdapter;
pub use instagram::InstagramAdapter;
pub use linkedin::LinkedinAdapter;
pub use telegram::TelegramAdapter;
pub use tiktok::TiktokAdapter;
pub use twitter::TwitterAdapter;

/// Build the full adapter table. Platforms without configuration are
/// filtered out by the registry; building every adapter is cheap.
pub fn build_adapters(client: reqwest::Client) -> HashMap<Platform, Arc<dyn PlatformAdapter>> {
    let mut adapters: HashMap<Platform, Arc<dyn PlatformAdapter>> = HashMap::new();
    adapters.insert(Platform::Google, Arc::new(GoogleAdapter::new(client.clone())));
    adapters.insert(Platform::Facebook, Arc::new(FacebookAdapter::new(client.clone())));
    adapters.insert(Platform::Linkedin, Arc::new(LinkedinAdapter::new(client.clone())));
    adapters.insert(Platform::Twitter, Arc::new(TwitterAdapter::new(client.clone())));
    adapters.insert(Platform::Instagram, Arc::new(InstagramAdapter::new(client.clone())));
    adapters.insert(Platform::Tiktok, Arc::new(TiktokAdapter::new(client)));
    adapters.insert(Platform::Telegram, Arc::new(TelegramAdapter::new()));
    adapters
}
