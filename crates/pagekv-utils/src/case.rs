use convert_case::{Case, Casing};

/// Normalize a context/attribute key to kebab-case.
///
/// `publishedAt`, `published_at` and `Published At` all map to
/// `published-at`. Empty and whitespace-only keys normalize to `""`.
#[must_use]
pub fn kebab_key(key: &str) -> String {
    let trimmed = key.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    trimmed.to_case(Case::Kebab)
}
