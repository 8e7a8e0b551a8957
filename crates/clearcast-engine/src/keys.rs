use std::sync::Mutex;

use clearcast_contracts::keys::{ApiKey, KeyProvider};

use crate::config::non_empty_env;

pub const KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

type Selector = Box<dyn Fn() -> Option<String> + Send + Sync>;

/// Holds the selected key in memory and asks `selector` for a new one when
/// the session requests a selection. `None` means the selector was dismissed
/// and the current key stays; a blank entry clears the slot.
pub struct SelectableKeyProvider {
    slot: Mutex<Option<ApiKey>>,
    selector: Selector,
}

impl SelectableKeyProvider {
    pub fn new(
        initial: Option<ApiKey>,
        selector: impl Fn() -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: Mutex::new(initial),
            selector: Box::new(selector),
        }
    }

    /// Seeds the slot from `GEMINI_API_KEY`, then `GOOGLE_API_KEY`.
    pub fn from_env(selector: impl Fn() -> Option<String> + Send + Sync + 'static) -> Self {
        Self::new(key_from_env(), selector)
    }
}

impl KeyProvider for SelectableKeyProvider {
    fn has_key(&self) -> bool {
        self.current_key().is_some()
    }

    fn prompt_key_selection(&self) {
        let Some(entered) = (self.selector)() else {
            return;
        };
        if let Ok(mut slot) = self.slot.lock() {
            *slot = ApiKey::new(entered);
        }
    }

    fn current_key(&self) -> Option<ApiKey> {
        self.slot.lock().ok().and_then(|slot| slot.clone())
    }
}

pub fn key_from_env() -> Option<ApiKey> {
    KEY_ENV_VARS
        .iter()
        .find_map(|name| non_empty_env(name))
        .and_then(ApiKey::new)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use clearcast_contracts::keys::{ApiKey, KeyProvider};

    use super::SelectableKeyProvider;

    #[test]
    fn selection_replaces_and_clears_the_slot() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let provider = SelectableKeyProvider::new(ApiKey::new("old"), move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Some("fresh-key".to_string())
            } else {
                Some("   ".to_string())
            }
        });
        assert!(provider.has_key());

        provider.prompt_key_selection();
        assert_eq!(
            provider.current_key().map(|key| key.expose().to_string()),
            Some("fresh-key".to_string())
        );

        provider.prompt_key_selection();
        assert!(!provider.has_key());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn dismissed_selection_leaves_no_key() {
        let provider = SelectableKeyProvider::new(None, || None);
        assert!(!provider.has_key());
        provider.prompt_key_selection();
        assert!(provider.current_key().is_none());
    }

    #[test]
    fn dismissed_selection_keeps_the_current_key() {
        let provider = SelectableKeyProvider::new(ApiKey::new("abc"), || None);
        provider.prompt_key_selection();
        assert_eq!(
            provider.current_key().map(|key| key.expose().to_string()),
            Some("abc".to_string())
        );
    }
}
