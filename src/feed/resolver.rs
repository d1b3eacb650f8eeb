use crate::feed::instances::InstanceRegistry;

/// Pseudo-scheme marking a path that is served by every RSSHub mirror.
pub const RSSHUB_SCHEME: &str = "rsshub://";

/// Normalizes a raw caller-supplied feed reference.
///
/// - A JSON object with a string `url` field is unwrapped (some clients
///   double-encode the tool argument). Anything that fails to parse as such
///   is used verbatim.
/// - A reference without `://` is treated as an RSSHub path.
pub fn normalize_input(raw: &str) -> String {
    let mut url = raw.trim().to_string();

    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(&url) {
        if let Some(inner) = map.get("url").and_then(|v| v.as_str()) {
            if !inner.is_empty() {
                url = inner.trim().to_string();
            }
        }
    }

    if !url.contains("://") {
        url = format!("{RSSHUB_SCHEME}{url}");
    }

    url
}

/// Expands a feed reference into the ordered candidate URLs to try.
///
/// Never returns an empty list. RSSHub references (either the `rsshub://`
/// shorthand or a full URL on a known mirror) fan out to one candidate per
/// registry instance; everything else is a single literal candidate.
pub fn resolve(raw: &str, registry: &InstanceRegistry) -> Vec<String> {
    let url = normalize_input(raw);

    if let Some(path) = url.strip_prefix(RSSHUB_SCHEME) {
        return fan_out(path, registry);
    }

    for base in registry.instances() {
        if let Some(rest) = url.strip_prefix(base.as_str()) {
            // "https://rsshub.app.example.com" is not the rsshub.app mirror.
            if rest.is_empty() || rest.starts_with('/') {
                let path = rest.strip_prefix('/').unwrap_or(rest);
                return fan_out(path, registry);
            }
        }
    }

    vec![url]
}

fn fan_out(path: &str, registry: &InstanceRegistry) -> Vec<String> {
    let candidates: Vec<String> = registry
        .instances()
        .iter()
        .map(|base| format!("{base}/{path}"))
        .collect();

    if candidates.is_empty() {
        // An empty registry still has to yield something to attempt.
        tracing::warn!(path = %path, "No RSSHub instances configured");
        return vec![format!("{RSSHUB_SCHEME}{path}")];
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn registry() -> InstanceRegistry {
        InstanceRegistry::with_instances(["https://a.example", "https://b.example"], None)
    }

    #[test]
    fn test_shorthand_fans_out_in_order() {
        let urls = resolve("rsshub://bilibili/user/dynamic/208259", &registry());
        assert_eq!(
            urls,
            vec![
                "https://a.example/bilibili/user/dynamic/208259",
                "https://b.example/bilibili/user/dynamic/208259",
            ]
        );
    }

    #[test]
    fn test_bare_path_treated_as_shorthand() {
        assert_eq!(
            resolve("zhihu/hot", &registry()),
            resolve("rsshub://zhihu/hot", &registry())
        );
    }

    #[test]
    fn test_json_wrapped_input_unwrapped() {
        let urls = resolve(r#"{"url": "rsshub://zhihu/hot"}"#, &registry());
        assert_eq!(urls[0], "https://a.example/zhihu/hot");
    }

    #[test]
    fn test_json_without_url_field_used_verbatim() {
        assert_eq!(normalize_input(r#"{"foo": 1}"#), r#"rsshub://{"foo": 1}"#);
    }

    #[test]
    fn test_json_string_literal_not_unwrapped() {
        // A JSON string is not an object, so the text is used as-is.
        assert_eq!(
            normalize_input(r#""https://x.example/feed""#),
            r#""https://x.example/feed""#
        );
    }

    #[test]
    fn test_known_mirror_url_fans_out() {
        let urls = resolve("https://b.example/github/issue/rust-lang/rust", &registry());
        assert_eq!(
            urls,
            vec![
                "https://a.example/github/issue/rust-lang/rust",
                "https://b.example/github/issue/rust-lang/rust",
            ]
        );
    }

    #[test]
    fn test_priority_instance_first() {
        let registry = InstanceRegistry::with_instances(
            ["https://a.example", "https://b.example"],
            Some("https://mine.example"),
        );
        let urls = resolve("rsshub://x/y", &registry);
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], "https://mine.example/x/y");
    }

    #[test]
    fn test_mirror_lookalike_host_not_fanned_out() {
        let urls = resolve("https://a.example.evil.test/feed", &registry());
        assert_eq!(urls, vec!["https://a.example.evil.test/feed".to_string()]);
    }

    #[test]
    fn test_plain_url_single_candidate() {
        let urls = resolve("https://blog.example.org/feed.xml", &registry());
        assert_eq!(urls, vec!["https://blog.example.org/feed.xml"]);
    }

    #[test]
    fn test_default_registry_fans_out_to_every_builtin() {
        let registry = InstanceRegistry::default();
        let urls = resolve("rsshub://zhihu/hot", &registry);
        assert_eq!(urls.len(), registry.len());
        assert_eq!(urls[0], "https://rsshub.app/zhihu/hot");
    }

    #[test]
    fn test_empty_registry_still_yields_candidate() {
        let registry = InstanceRegistry::with_instances(Vec::<String>::new(), None);
        assert_eq!(resolve("zhihu/hot", &registry).len(), 1);
    }

    proptest! {
        #[test]
        fn prop_shorthand_one_candidate_per_instance(path in "[a-z0-9]{1,10}(/[a-z0-9]{1,10}){0,3}") {
            let registry = InstanceRegistry::default();
            let urls = resolve(&format!("rsshub://{path}"), &registry);
            prop_assert_eq!(urls.len(), registry.len());
            for (url, base) in urls.iter().zip(registry.instances()) {
                prop_assert_eq!(url, &format!("{base}/{path}"));
            }
        }

        #[test]
        fn prop_bare_path_matches_shorthand(path in "[a-z0-9]{1,10}(/[a-z0-9]{1,10}){0,3}") {
            let registry = registry();
            prop_assert_eq!(resolve(&path, &registry), resolve(&format!("rsshub://{path}"), &registry));
        }

        #[test]
        fn prop_never_empty(input in "\\PC{0,40}") {
            prop_assert!(!resolve(&input, &registry()).is_empty());
        }
    }
}
