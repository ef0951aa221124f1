//! Slug derivation and sibling-unique assignment

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use crate::db::SlugClaim;
use crate::models::TreeNode;
use crate::tree::{TreeError, TreeStore};

const DISALLOWED_PATTERN: &str = r"[^a-z0-9\s_-]";
const SEPARATOR_RUN_PATTERN: &str = r"[-\s]+";

/// Turn `text` into a URL-safe slug.
///
/// Latin diacritics are folded to ASCII, other non-ASCII characters and
/// punctuation are dropped, runs of whitespace and hyphens collapse to a
/// single hyphen.
///
/// ```rust
/// use jobboard_core::tree::slugify;
///
/// assert_eq!(slugify("Senior Rust Developer"), "senior-rust-developer");
/// assert_eq!(slugify("  Zürich -- Oerlikon "), "zurich-oerlikon");
/// assert_eq!(slugify("C++ & Go!"), "c-go");
/// ```
pub fn slugify(text: &str) -> String {
    static DISALLOWED: OnceLock<Regex> = OnceLock::new();
    static SEPARATOR_RUN: OnceLock<Regex> = OnceLock::new();
    let disallowed =
        DISALLOWED.get_or_init(|| Regex::new(DISALLOWED_PATTERN).expect("valid slug pattern"));
    let separator_run = SEPARATOR_RUN
        .get_or_init(|| Regex::new(SEPARATOR_RUN_PATTERN).expect("valid slug pattern"));

    let folded: String = text.to_lowercase().chars().flat_map(fold_char).collect();
    let cleaned = disallowed.replace_all(&folded, "");
    let hyphenated = separator_run.replace_all(cleaned.trim(), "-");
    hyphenated.trim_matches(|c| c == '-' || c == '_').to_string()
}

fn fold_char(c: char) -> Vec<char> {
    let folded: &str = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => "a",
        'ç' | 'ć' | 'č' => "c",
        'ď' => "d",
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => "e",
        'ì' | 'í' | 'î' | 'ï' => "i",
        'ł' => "l",
        'ñ' | 'ń' | 'ň' => "n",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ő' => "o",
        'ř' => "r",
        'ś' | 'š' => "s",
        'ť' => "t",
        'ù' | 'ú' | 'û' | 'ü' | 'ů' | 'ű' => "u",
        'ý' | 'ÿ' => "y",
        'ź' | 'ż' | 'ž' => "z",
        'ß' => "ss",
        'æ' => "ae",
        'œ' => "oe",
        c if c.is_ascii() => return vec![c],
        _ => "",
    };
    folded.chars().collect()
}

/// Assigns slugs that are unique among a node's siblings.
///
/// Candidates are `base`, `base-2`, `base-3`, ... where `base` is
/// [`slugify`] of the node name. Each candidate is written with
/// [`crate::db::NodeStore::try_set_slug`], which rejects it when a sibling
/// already holds it, so two concurrent assignments under one parent never
/// end up with the same slug.
#[derive(Debug, Clone, Default)]
pub struct SlugAssigner;

impl SlugAssigner {
    pub fn new() -> Self {
        Self
    }

    /// Slug of `node`, assigning one first if it has none.
    ///
    /// Idempotent: a node that already has a slug keeps it.
    pub async fn assign(&self, node: &mut TreeNode, tree: &TreeStore) -> Result<String, TreeError> {
        if let Some(slug) = &node.slug {
            return Ok(slug.clone());
        }

        let mut base = slugify(&node.name);
        if base.is_empty() {
            base = node.kind().as_str().to_string();
        }

        // Known sibling slugs are skipped without a write; the conditional
        // write still decides for siblings that appear concurrently.
        let taken: HashSet<String> = tree
            .siblings_of(node)
            .await?
            .into_iter()
            .filter_map(|sibling| sibling.slug)
            .collect();

        let mut suffix = 0u64;
        loop {
            suffix += 1;
            let candidate = if suffix == 1 {
                base.clone()
            } else {
                format!("{base}-{suffix}")
            };
            if taken.contains(&candidate) {
                continue;
            }

            match tree.node_store().try_set_slug(node.id, &candidate).await? {
                SlugClaim::Claimed => {
                    tracing::debug!(path = %node.path, slug = %candidate, "Assigned slug");
                    node.slug = Some(candidate.clone());
                    return Ok(candidate);
                }
                SlugClaim::Taken => {
                    tracing::warn!(
                        path = %node.path,
                        slug = %candidate,
                        "Slug claimed concurrently by a sibling, trying next candidate"
                    );
                }
                SlugClaim::AlreadySet(existing) => {
                    node.slug = Some(existing.clone());
                    return Ok(existing);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryNodeStore;
    use crate::models::{NewNode, PlaceType};
    use std::sync::Arc;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Berlin"), "berlin");
        assert_eq!(slugify("New   York City"), "new-york-city");
        assert_eq!(slugify("São Paulo"), "sao-paulo");
        assert_eq!(slugify("Straße"), "strasse");
        assert_eq!(slugify("under_score"), "under_score");
    }

    #[test]
    fn slugify_strips_everything_unsafe() {
        assert_eq!(slugify("!!!"), "");
        assert_eq!(slugify("東京"), "");
        assert_eq!(slugify("-Rust-"), "rust");
    }

    #[tokio::test]
    async fn sibling_collisions_get_numeric_suffixes() {
        let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
        let assigner = SlugAssigner::new();
        let mut germany = tree
            .insert_root(NewNode::place("Germany", PlaceType::Country))
            .await
            .unwrap();

        let mut first = tree
            .insert_child(&mut germany, NewNode::place("Berlin", PlaceType::City))
            .await
            .unwrap();
        let mut second = tree
            .insert_child(&mut germany, NewNode::place("Berlin", PlaceType::City))
            .await
            .unwrap();
        let mut third = tree
            .insert_child(&mut germany, NewNode::place("Berlin", PlaceType::City))
            .await
            .unwrap();

        assert_eq!(assigner.assign(&mut first, &tree).await.unwrap(), "berlin");
        assert_eq!(assigner.assign(&mut second, &tree).await.unwrap(), "berlin-2");
        assert_eq!(assigner.assign(&mut third, &tree).await.unwrap(), "berlin-3");
    }

    #[tokio::test]
    async fn assign_is_idempotent() {
        let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
        let assigner = SlugAssigner::new();
        let mut node = tree
            .insert_root(NewNode::category("Data Science", None))
            .await
            .unwrap();

        let first = assigner.assign(&mut node, &tree).await.unwrap();
        let second = assigner.assign(&mut node, &tree).await.unwrap();
        assert_eq!(first, "data-science");
        assert_eq!(first, second);

        // A stale snapshot picks up the stored slug instead of claiming another
        let mut stale = node.clone();
        stale.slug = None;
        assert_eq!(assigner.assign(&mut stale, &tree).await.unwrap(), "data-science");
    }

    #[tokio::test]
    async fn same_slug_is_allowed_under_different_parents() {
        let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
        let assigner = SlugAssigner::new();
        let mut usa = tree
            .insert_root(NewNode::place("USA", PlaceType::Country))
            .await
            .unwrap();
        let mut canada = tree
            .insert_root(NewNode::place("Canada", PlaceType::Country))
            .await
            .unwrap();

        let mut a = tree
            .insert_child(&mut usa, NewNode::place("London", PlaceType::City))
            .await
            .unwrap();
        let mut b = tree
            .insert_child(&mut canada, NewNode::place("London", PlaceType::City))
            .await
            .unwrap();

        assert_eq!(assigner.assign(&mut a, &tree).await.unwrap(), "london");
        assert_eq!(assigner.assign(&mut b, &tree).await.unwrap(), "london");
    }

    #[tokio::test]
    async fn unsluggable_names_fall_back_to_kind() {
        let tree = TreeStore::with_defaults(Arc::new(MemoryNodeStore::new()));
        let mut node = tree
            .insert_root(NewNode::category("???", None))
            .await
            .unwrap();
        assert_eq!(
            SlugAssigner::new().assign(&mut node, &tree).await.unwrap(),
            "category"
        );
    }
}
