//! In-memory [`ArticleStore`] with the same ordering and dedup rules as
//! the libSQL store. Used by tests and dry runs.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use postsmith_shared::{Article, NewArticle, Result};

use crate::{ArticleStore, InsertOutcome, validate_new};

/// Article store backed by a `Vec` behind a mutex.
#[derive(Default)]
pub struct MemoryStore {
    articles: Mutex<Vec<Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.articles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn insert_if_absent(&self, article: &NewArticle) -> Result<InsertOutcome> {
        validate_new(article)?;
        let mut articles = self.articles.lock().await;

        if let Some(existing) = articles.iter().find(|a| a.link == article.link) {
            return Ok(InsertOutcome {
                inserted: false,
                id: existing.id,
            });
        }

        let id = articles.iter().map(|a| a.id).max().unwrap_or(0) + 1;
        articles.push(Article {
            id,
            title: article.title.clone(),
            link: article.link.clone(),
            date: article.date.clone(),
            excerpt: article.excerpt.clone(),
            scraped_at: Utc::now(),
        });
        Ok(InsertOutcome { inserted: true, id })
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let mut all = self.articles.lock().await.clone();
        all.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn get_one(&self, id: i64) -> Result<Option<Article>> {
        Ok(self
            .articles
            .lock()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_article(title: &str, date: &str) -> NewArticle {
        NewArticle {
            title: title.into(),
            link: format!("https://x/{title}"),
            date: date.into(),
            excerpt: String::new(),
        }
    }

    #[tokio::test]
    async fn dedups_on_link() {
        let store = MemoryStore::new();
        let a = store.insert_if_absent(&new_article("a", "2023-01-01")).await.unwrap();
        let b = store.insert_if_absent(&new_article("a", "2024-01-01")).await.unwrap();
        assert!(a.inserted);
        assert!(!b.inserted);
        assert_eq!(a.id, b.id);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn orders_like_sql_store() {
        let store = MemoryStore::new();
        store.insert_if_absent(&new_article("first", "2023-01-01")).await.unwrap();
        store.insert_if_absent(&new_article("second", "2023-01-01")).await.unwrap();
        store.insert_if_absent(&new_article("newest", "2024-06-01")).await.unwrap();

        let titles: Vec<String> = store
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.title)
            .collect();
        assert_eq!(titles, vec!["newest", "first", "second"]);
    }

    #[tokio::test]
    async fn get_one_missing_is_none() {
        let store = MemoryStore::new();
        assert!(store.get_one(1).await.unwrap().is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_same_link_has_one_winner() {
        let store = std::sync::Arc::new(MemoryStore::new());

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = std::sync::Arc::clone(&store);
                tokio::spawn(async move {
                    let article = NewArticle {
                        title: format!("T{i}"),
                        link: "https://x/same".into(),
                        date: "2023-01-01".into(),
                        excerpt: String::new(),
                    };
                    store.insert_if_absent(&article).await
                })
            })
            .collect();

        let mut outcomes = Vec::new();
        for handle in handles {
            outcomes.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(outcomes.iter().filter(|o| o.inserted).count(), 1);
        assert!(outcomes.iter().all(|o| o.id == outcomes[0].id));
        assert_eq!(store.len().await, 1);
    }
}
