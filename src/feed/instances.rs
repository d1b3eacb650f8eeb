/// Built-in RSSHub mirrors, in the order they are tried.
pub const RSSHUB_INSTANCES: &[&str] = &[
    "https://rsshub.app",
    "https://rsshub.rssforever.com",
    "https://rsshub.feeded.xyz",
    "https://hub.slarker.me",
    "https://rsshub.liumingye.cn",
    "https://rsshub-instance.zeabur.app",
    "https://rss.fatpandac.com",
    "https://rsshub.pseudoyu.com",
    "https://rsshub.friesport.ac.cn",
    "https://rsshub.atgw.io",
    "https://rsshub.rss.tips",
    "https://rsshub.mubibai.com",
    "https://rsshub.ktachibana.party",
    "https://rsshub.woodland.cafe",
    "https://rsshub.aierliz.xyz",
];

/// Returns the mirror list, with `priority` (if given and non-blank) moved to
/// the front exactly once.
pub fn list(priority: Option<&str>) -> Vec<String> {
    list_from(RSSHUB_INSTANCES, priority)
}

fn list_from(builtin: &[&str], priority: Option<&str>) -> Vec<String> {
    let priority = priority
        .map(|p| p.trim().trim_end_matches('/'))
        .filter(|p| !p.is_empty());

    let mut instances = Vec::with_capacity(builtin.len() + 1);
    if let Some(p) = priority {
        instances.push(p.to_string());
    }
    for &base in builtin {
        if Some(base) == priority || instances.iter().any(|i| i == base) {
            continue;
        }
        instances.push(base.to_string());
    }
    instances
}

/// Ordered, de-duplicated set of mirror base URLs.
///
/// Constructed once from configuration and read-only afterwards; cloning is
/// cheap enough to hand one to every concurrent resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRegistry {
    instances: Vec<String>,
}

impl InstanceRegistry {
    /// Registry over the built-in mirrors, with an optional priority mirror first.
    pub fn new(priority: Option<&str>) -> Self {
        Self {
            instances: list(priority),
        }
    }

    /// Registry over an explicit mirror list. Duplicates are dropped, first
    /// occurrence wins.
    pub fn with_instances<I, S>(instances: I, priority: Option<&str>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let owned: Vec<String> = instances
            .into_iter()
            .map(|s| s.as_ref().trim_end_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect();
        let borrowed: Vec<&str> = owned.iter().map(String::as_str).collect();
        Self {
            instances: list_from(&borrowed, priority),
        }
    }

    /// Same mirrors with `priority` moved (or added) to the front. A blank
    /// priority returns an unchanged copy.
    pub fn with_priority(&self, priority: &str) -> Self {
        Self::with_instances(&self.instances, Some(priority))
    }

    pub fn instances(&self) -> &[String] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for InstanceRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}
