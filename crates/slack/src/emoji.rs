use std::sync::Arc;

use ghrelay_core::domain::emoji::{EmojiKey, FALLBACK_EMOJI};
use ghrelay_db::repositories::{EmojiRepository, RepositoryError};

/// Emoji lookups overlaying stored overrides on the compiled-in defaults.
#[derive(Clone)]
pub struct EmojiCatalog {
    repository: Arc<dyn EmojiRepository>,
}

impl EmojiCatalog {
    pub fn new(repository: Arc<dyn EmojiRepository>) -> Self {
        Self { repository }
    }

    pub async fn emoji_for(&self, key: EmojiKey) -> Result<String, RepositoryError> {
        let stored = self.repository.find_override(key).await?;
        Ok(resolve(stored, key.default_emoji()))
    }

    pub async fn set(&self, key: EmojiKey, emoji: &str) -> Result<(), RepositoryError> {
        self.repository.save_override(key, emoji).await
    }

    pub async fn current(&self) -> Result<Vec<(EmojiKey, String)>, RepositoryError> {
        let mut current = Vec::with_capacity(EmojiKey::ALL.len());
        for key in EmojiKey::ALL {
            current.push((key, self.emoji_for(key).await?));
        }
        Ok(current)
    }
}

fn resolve(stored: Option<String>, default: &str) -> String {
    match stored {
        Some(emoji) if !emoji.trim().is_empty() => emoji,
        _ if !default.is_empty() => default.to_owned(),
        _ => FALLBACK_EMOJI.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ghrelay_core::domain::emoji::{EmojiKey, FALLBACK_EMOJI};
    use ghrelay_db::repositories::{EmojiRepository, InMemoryEmojiRepository};

    use super::{resolve, EmojiCatalog};

    #[tokio::test]
    async fn unset_key_falls_back_to_default_and_set_value_wins() {
        let catalog = EmojiCatalog::new(Arc::new(InMemoryEmojiRepository::default()));
        assert_eq!(catalog.emoji_for(EmojiKey::PrOpened).await.expect("lookup"), ":eight_pointed_black_star:");

        catalog.set(EmojiKey::PrOpened, ":sparkles:").await.expect("set");
        assert_eq!(catalog.emoji_for(EmojiKey::PrOpened).await.expect("lookup"), ":sparkles:");
        assert_eq!(catalog.emoji_for(EmojiKey::PrMerged).await.expect("lookup"), ":rocket:");
    }

    #[tokio::test]
    async fn blank_override_is_ignored() {
        let repository = Arc::new(InMemoryEmojiRepository::default());
        repository.save_override(EmojiKey::PrClosed, "  ").await.expect("save");
        let catalog = EmojiCatalog::new(repository);

        assert_eq!(catalog.emoji_for(EmojiKey::PrClosed).await.expect("lookup"), ":x:");
    }

    #[test]
    fn missing_default_uses_fallback() {
        assert_eq!(resolve(None, ""), FALLBACK_EMOJI);
    }

    #[tokio::test]
    async fn current_lists_all_keys_in_display_order() {
        let catalog = EmojiCatalog::new(Arc::new(InMemoryEmojiRepository::default()));
        let keys: Vec<_> = catalog.current().await.expect("current").into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, EmojiKey::ALL.to_vec());
    }
}
