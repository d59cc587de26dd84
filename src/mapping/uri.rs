//! URI generation
//!
//! Generated URIs have the form `{prefix}/{segment}`. The segment comes from
//! the generator: a random UUID, or a normalized field value. When a
//! candidate is already taken the generator is asked again with an
//! incremented retry counter, which value-based generators turn into a
//! `_{retry}` suffix.

use thiserror::Error;
use uuid::Uuid;

use super::instance::ResourceInstance;
use crate::rdf::NamedNode;

/// URI generation errors
#[derive(Error, Debug)]
pub enum UriError {
    /// Source field absent from the instance
    #[error("Cannot generate URI: field '{field}' has no value")]
    MissingSource { field: String },

    /// Source field normalizes to nothing
    #[error("Cannot generate URI: field '{field}' normalizes to an empty segment")]
    EmptySource { field: String },

    /// Candidate is not an absolute IRI
    #[error("Generated URI '{uri}' is invalid: {reason}")]
    Invalid { uri: String, reason: String },

    /// Every retry collided with an existing URI
    #[error("No free URI under '{prefix}' after {attempts} attempts")]
    Exhausted { prefix: String, attempts: u32 },
}

pub type UriResult<T> = Result<T, UriError>;

/// Characters removed by [`normalize`]
pub const UNSAFE_CHARACTERS: &[char] = &[
    '!', '"', '#', '$', '%', '&', '\'', '(', ')', '*', '+', ',', '/', ':', ';', '<', '=', '>',
    '?', '@', '[', '\\', ']', '^', '`', '{', '|', '}', '~',
];

/// Turn free text into a URI path segment
///
/// Unsafe and control characters are dropped, whitespace runs become a
/// single `-`, and the result is lowercased.
pub fn normalize(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !UNSAFE_CHARACTERS.contains(c) && !(c.is_control() && !c.is_whitespace()))
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .trim_matches('-')
        .to_lowercase()
}

/// Strategy producing candidate URIs
pub trait UriGenerator: Send + Sync {
    /// Candidate for the given retry; retry 0 is the first attempt
    fn generate(&self, prefix: &str, instance: &ResourceInstance, retry: u32) -> UriResult<String>;

    /// Field the generator reads, checked when the descriptor is built
    fn required_field(&self) -> Option<&str> {
        None
    }
}

/// `{prefix}/{uuid}`
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidUriGenerator;

impl UriGenerator for UuidUriGenerator {
    fn generate(&self, prefix: &str, _instance: &ResourceInstance, _retry: u32) -> UriResult<String> {
        Ok(join(prefix, &Uuid::new_v4().to_string()))
    }
}

/// `{prefix}/{normalize(field)}`, `_{retry}` appended on retries
#[derive(Debug, Clone)]
pub struct FieldUriGenerator {
    field: String,
}

impl FieldUriGenerator {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

impl UriGenerator for FieldUriGenerator {
    fn generate(&self, prefix: &str, instance: &ResourceInstance, retry: u32) -> UriResult<String> {
        let source = instance
            .single(&self.field)
            .ok_or_else(|| UriError::MissingSource {
                field: self.field.clone(),
            })?;
        let segment = normalize(source.as_str());
        if segment.is_empty() {
            return Err(UriError::EmptySource {
                field: self.field.clone(),
            });
        }
        let uri = join(prefix, &segment);
        Ok(if retry > 0 {
            format!("{}_{}", uri, retry)
        } else {
            uri
        })
    }

    fn required_field(&self) -> Option<&str> {
        Some(&self.field)
    }
}

fn join(prefix: &str, segment: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), segment)
}

/// Generate the first candidate that `exists` reports free
///
/// Tries retries `0..=max_retries`. Every candidate must be a valid IRI.
pub fn generate_unique<E, F>(
    generator: &dyn UriGenerator,
    prefix: &str,
    instance: &ResourceInstance,
    max_retries: u32,
    mut exists: F,
) -> Result<NamedNode, E>
where
    E: From<UriError>,
    F: FnMut(&NamedNode) -> Result<bool, E>,
{
    for retry in 0..=max_retries {
        let candidate = generator.generate(prefix, instance, retry)?;
        let uri = NamedNode::new(candidate.as_str()).map_err(|e| UriError::Invalid {
            uri: candidate.clone(),
            reason: e.to_string(),
        })?;
        if !exists(&uri)? {
            return Ok(uri);
        }
    }
    Err(UriError::Exhausted {
        prefix: prefix.to_string(),
        attempts: max_retries + 1,
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_normalize_strips_unsafe_characters() {
        let all_unsafe: String = UNSAFE_CHARACTERS.iter().collect();
        let normalized = normalize(&format!("a{}b", all_unsafe));
        assert_eq!(normalized, "ab");
        for c in UNSAFE_CHARACTERS {
            assert!(!normalize(&format!("x{c}y z")).contains(*c));
        }
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  Plot   A\t12\n"), "plot-a-12");
        assert_eq!(normalize("Maïs / Grain"), "maïs-grain");
        assert_eq!(normalize("a\u{0007}b"), "ab");
        assert_eq!(normalize("  ?? "), "");
    }

    #[test]
    fn test_field_generator_retry_suffix() {
        let generator = FieldUriGenerator::new("name");
        let mut instance = ResourceInstance::new(None);
        instance.set("name", "Plot A");
        assert_eq!(
            generator.generate("http://e.org/id/plot/", &instance, 0).unwrap(),
            "http://e.org/id/plot/plot-a"
        );
        assert_eq!(
            generator.generate("http://e.org/id/plot", &instance, 3).unwrap(),
            "http://e.org/id/plot/plot-a_3"
        );
        assert!(matches!(
            generator.generate("http://e.org", &ResourceInstance::new(None), 0),
            Err(UriError::MissingSource { .. })
        ));
    }

    #[test]
    fn test_generate_unique_skips_taken_candidates() {
        let generator = FieldUriGenerator::new("name");
        let mut instance = ResourceInstance::new(None);
        instance.set("name", "Plot A");
        let taken: HashSet<&str> = ["http://e.org/plot-a", "http://e.org/plot-a_1"].into();

        let uri: NamedNode = generate_unique::<UriError, _>(&generator, "http://e.org", &instance, 5, |c| {
            Ok(taken.contains(c.as_str()))
        })
        .unwrap();
        assert_eq!(uri.as_str(), "http://e.org/plot-a_2");
    }

    #[test]
    fn test_generate_unique_exhausts() {
        let generator = FieldUriGenerator::new("name");
        let mut instance = ResourceInstance::new(None);
        instance.set("name", "Plot A");
        let result = generate_unique::<UriError, _>(&generator, "http://e.org", &instance, 2, |_| Ok(true));
        assert!(matches!(result, Err(UriError::Exhausted { attempts: 3, .. })));
    }

    #[test]
    fn test_invalid_prefix_is_rejected() {
        let result = generate_unique::<UriError, _>(
            &UuidUriGenerator,
            "not a prefix",
            &ResourceInstance::new(None),
            0,
            |_| Ok(false),
        );
        assert!(matches!(result, Err(UriError::Invalid { .. })));
    }

    #[test]
    fn test_uuid_generator_is_unique() {
        let a = UuidUriGenerator.generate("http://e.org", &ResourceInstance::new(None), 0).unwrap();
        let b = UuidUriGenerator.generate("http://e.org", &ResourceInstance::new(None), 0).unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("http://e.org/"));
    }
}
