//! Endpoint normalization: turn concrete request paths into path templates.
//!
//! ```
//! use apilens_analyzer::normalize::EndpointNormalizer;
//!
//! let normalizer = EndpointNormalizer::new(&[]);
//! assert_eq!(normalizer.normalize("/api/users/42?fields=name"), "/api/users/:id");
//! ```

use regex::Regex;

/// Placeholder substituted for id-like path segments.
pub const ID_PLACEHOLDER: &str = ":id";

/// Segments at least this long and made only of hex digits are treated as ids.
const MIN_HEX_ID_LEN: usize = 16;

pub struct EndpointNormalizer {
    patterns: Vec<Regex>,
}

impl EndpointNormalizer {
    /// Build a normalizer with extra id patterns. Each pattern must match a
    /// whole segment; invalid patterns are logged and skipped.
    pub fn new(id_patterns: &[String]) -> Self {
        Self {
            patterns: compile_patterns(id_patterns),
        }
    }

    /// Strip the query string and fragment, then replace id-like segments.
    pub fn normalize(&self, endpoint: &str) -> String {
        let path = endpoint
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        path.split('/')
            .map(|segment| {
                if self.is_id_segment(segment) {
                    ID_PLACEHOLDER
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn is_id_segment(&self, segment: &str) -> bool {
        if segment.is_empty() {
            return false;
        }
        is_numeric(segment)
            || is_uuid(segment)
            || is_long_hex(segment)
            || self.patterns.iter().any(|re| re.is_match(segment))
    }
}

fn is_numeric(segment: &str) -> bool {
    segment.bytes().all(|b| b.is_ascii_digit())
}

/// 8-4-4-4-12 hex groups.
fn is_uuid(segment: &str) -> bool {
    let groups: Vec<&str> = segment.split('-').collect();
    groups.len() == 5
        && groups
            .iter()
            .zip([8, 4, 4, 4, 12])
            .all(|(g, len)| g.len() == len && g.bytes().all(|b| b.is_ascii_hexdigit()))
}

fn is_long_hex(segment: &str) -> bool {
    segment.len() >= MIN_HEX_ID_LEN && segment.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Compile pattern strings anchored to the whole segment.
fn compile_patterns(patterns: &[String]) -> Vec<Regex> {
    patterns
        .iter()
        .filter_map(|p| {
            Regex::new(&format!("^(?:{p})$"))
                .map_err(|e| tracing::warn!("invalid endpoint id pattern {:?}: {}", p, e))
                .ok()
        })
        .collect()
}
