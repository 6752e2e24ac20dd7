//! Built-in source registry: AI/ML company blogs, newsletters, news, and research feeds.
//!
//! Used whenever the config file declares no `[[sources]]` of its own.

use crate::types::{SourceCategory, SourceDescriptor, SourceKind};

/// Name of the built-in arXiv source.
pub const ARXIV_SOURCE: &str = "arXiv AI";

/// Name of the built-in PubMed source.
pub const PUBMED_SOURCE: &str = "PubMed AI";

/// The default feed list.
pub fn default_sources() -> Vec<SourceDescriptor> {
    let feed = |name: &str, url: &str, category, organization: &str| SourceDescriptor {
        name: name.into(),
        url: url.into(),
        category,
        organization: organization.into(),
        kind: SourceKind::Feed,
    };

    vec![
        feed("OpenAI Blog", "https://openai.com/blog/rss.xml", SourceCategory::Blog, "OpenAI"),
        feed(
            "Google AI Blog",
            "https://ai.googleblog.com/feeds/posts/default?alt=rss",
            SourceCategory::Blog,
            "Google",
        ),
        feed("Meta AI Blog", "https://ai.facebook.com/blog/rss/", SourceCategory::Blog, "Meta"),
        feed(
            "Microsoft Research Blog",
            "https://www.microsoft.com/en-us/research/feed/",
            SourceCategory::Blog,
            "Microsoft",
        ),
        feed(
            "Hugging Face Blog",
            "https://huggingface.co/blog/feed.xml",
            SourceCategory::Blog,
            "Hugging Face",
        ),
        feed(
            "Stability AI Blog",
            "https://stability.ai/blog/rss.xml",
            SourceCategory::Blog,
            "Stability AI",
        ),
        feed(
            "The Batch (deeplearning.ai)",
            "https://www.deeplearning.ai/the-batch/feed/rss/",
            SourceCategory::Newsletter,
            "deeplearning.ai",
        ),
        feed(
            "The Gradient",
            "https://thegradient.pub/rss/",
            SourceCategory::Newsletter,
            "The Gradient",
        ),
        feed(
            "VentureBeat AI",
            "https://venturebeat.com/category/ai/feed/",
            SourceCategory::News,
            "VentureBeat",
        ),
        SourceDescriptor {
            name: ARXIV_SOURCE.into(),
            url: "http://export.arxiv.org/api/query?search_query=cat:cs.AI&sortBy=submittedDate"
                .into(),
            category: SourceCategory::Research,
            organization: "arXiv".into(),
            kind: SourceKind::PagedApi,
        },
        SourceDescriptor {
            name: PUBMED_SOURCE.into(),
            url: "https://eutils.ncbi.nlm.nih.gov/entrez/eutils/esearch.fcgi?db=pubmed&term=artificial+intelligence&sort=pub_date"
                .into(),
            category: SourceCategory::Research,
            organization: "NCBI".into(),
            kind: SourceKind::EntrezApi,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn registry_names_are_unique() {
        let sources = default_sources();
        let names: HashSet<_> = sources.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names.len(), sources.len());
    }

    #[test]
    fn only_arxiv_is_paged() {
        let paged: Vec<_> = default_sources()
            .into_iter()
            .filter(|s| s.kind == SourceKind::PagedApi)
            .collect();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].name, ARXIV_SOURCE);
        assert_eq!(paged[0].category, SourceCategory::Research);
    }

    #[test]
    fn pubmed_goes_through_entrez() {
        let sources = default_sources();
        let pubmed = sources.iter().find(|s| s.name == PUBMED_SOURCE).unwrap();
        assert_eq!(pubmed.kind, SourceKind::EntrezApi);
        assert!(pubmed.url.contains("esearch.fcgi"));
        assert!(pubmed.url.contains("db=pubmed"));
    }
}
