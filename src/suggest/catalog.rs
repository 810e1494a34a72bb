use std::collections::HashSet;

use async_trait::async_trait;

use super::{Client, Error};

pub struct Article {
    pub title: String,
    pub keywords: Vec<String>,
}

impl Article {
    pub fn new(title: &str, keywords: &[&str]) -> Self {
        Self {
            title: title.to_owned(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }
}

/// Keyword index over a fixed set of articles.
///
/// A keyword found in the subject weighs twice as much as one found only in
/// the description. Ties keep catalog order.
pub struct Catalog {
    articles: Vec<Article>,
    limit: usize,
}

impl Catalog {
    pub fn new(articles: Vec<Article>, limit: usize) -> Self {
        Self { articles, limit }
    }

    /// Articles of the help center shipped with the service.
    pub fn builtin(limit: usize) -> Self {
        let articles = vec![
            Article::new(
                "Resetting your password",
                &["password", "reset", "forgot", "login", "credentials"],
            ),
            Article::new(
                "Account lockout troubleshooting",
                &["locked", "lockout", "account", "unlock", "login"],
            ),
            Article::new(
                "Setting up two-factor authentication",
                &["2fa", "mfa", "authentication", "verification", "code"],
            ),
            Article::new(
                "Understanding your invoice",
                &["invoice", "charge", "billing", "overage", "breakdown"],
            ),
            Article::new(
                "Updating payment methods",
                &["payment", "card", "billing", "subscription"],
            ),
            Article::new("Requesting a refund", &["refund", "charge", "money"]),
            Article::new(
                "Connecting to your database instance",
                &["database", "postgresql", "connection", "connect", "instance"],
            ),
            Article::new(
                "Managing API keys",
                &["api", "key", "keys", "401", "unauthorized"],
            ),
            Article::new(
                "Troubleshooting API errors",
                &["api", "error", "integration", "failing", "timeout"],
            ),
            Article::new(
                "Customizing the dashboard",
                &["dashboard", "dark", "mode", "theme", "layout"],
            ),
            Article::new(
                "Submitting a feature request",
                &["feature", "request", "idea"],
            ),
            Article::new(
                "Fixing email delivery problems",
                &["email", "link", "inbox", "spam"],
            ),
        ];
        Self::new(articles, limit)
    }

    pub fn search(&self, subject: &str, description: &str) -> Vec<String> {
        let subject = words(subject);
        let description = words(description);

        let mut scored = self
            .articles
            .iter()
            .map(|article| {
                let score = article
                    .keywords
                    .iter()
                    .map(|keyword| {
                        if subject.contains(keyword.as_str()) {
                            2
                        } else if description.contains(keyword.as_str()) {
                            1
                        } else {
                            0
                        }
                    })
                    .sum::<usize>();
                (score, article)
            })
            .filter(|(score, _)| *score > 0)
            .collect::<Vec<_>>();
        scored.sort_by(|(a, _), (b, _)| b.cmp(a));

        scored
            .into_iter()
            .take(self.limit)
            .map(|(_, article)| article.title.clone())
            .collect()
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Client for Catalog {
    async fn suggest(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<Vec<String>, Error> {
        Ok(self.search(subject, description))
    }
}

#[cfg(test)]
mod tests {
    use super::{Article, Catalog};

    #[test]
    fn ranks_subject_matches_higher() {
        let catalog = Catalog::builtin(3);
        let titles = catalog.search(
            "Unable to login",
            "My account is locked and I cannot log in at all",
        );
        assert_eq!(
            titles,
            ["Account lockout troubleshooting", "Resetting your password"],
        );
    }

    #[test]
    fn keeps_catalog_order_on_ties() {
        let catalog = Catalog::new(
            vec![
                Article::new("First", &["invoice"]),
                Article::new("Second", &["invoice"]),
                Article::new("Unrelated", &["dashboard"]),
            ],
            5,
        );
        let titles = catalog.search("Invoice", "");
        assert_eq!(titles, ["First", "Second"]);
    }

    #[test]
    fn respects_limit() {
        let catalog = Catalog::new(
            vec![
                Article::new("One", &["api"]),
                Article::new("Two", &["api"]),
                Article::new("Three", &["api"]),
            ],
            2,
        );
        assert_eq!(catalog.search("API", "api").len(), 2);
    }

    #[test]
    fn finds_nothing_for_unrelated_text() {
        let catalog = Catalog::builtin(3);
        assert!(catalog
            .search("Hello there", "Just wanted to say hello to everyone")
            .is_empty());
    }

    #[test]
    fn matches_whole_words_case_insensitively() {
        let catalog = Catalog::new(vec![Article::new("Keys", &["key"])], 3);
        assert_eq!(catalog.search("API KEY rotated", ""), ["Keys"]);
        assert!(catalog.search("keyboard broken", "").is_empty());
    }
}
