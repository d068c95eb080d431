use crate::error::DiscoveryError;
use crate::reading::MeterIdentity;

/// One entry of a vendor's meter listing.
pub trait Candidate {
    /// Whether the vendor prefers this candidate over the others.
    fn is_preferred(&self) -> bool;

    /// The identifier to read from when this candidate is chosen.
    fn identity(&self) -> &str;
}

/// Picks the first preferred candidate, falling back to the first one listed.
pub fn select_identity<C: Candidate>(candidates: &[C]) -> Result<MeterIdentity, DiscoveryError> {
    if let Some(preferred) = candidates.iter().find(|c| c.is_preferred()) {
        tracing::info!("Selected meter identity {}", preferred.identity());
        return Ok(MeterIdentity::new(preferred.identity()));
    }

    match candidates.first() {
        Some(first) => {
            tracing::warn!(
                "No preferred meter among {} candidates, falling back to {}",
                candidates.len(),
                first.identity()
            );
            Ok(MeterIdentity::new(first.identity()))
        }
        None => Err(DiscoveryError("no usable candidate".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestCandidate {
        id: &'static str,
        preferred: bool,
    }

    impl Candidate for TestCandidate {
        fn is_preferred(&self) -> bool {
            self.preferred
        }

        fn identity(&self) -> &str {
            self.id
        }
    }

    fn candidate(id: &'static str, preferred: bool) -> TestCandidate {
        TestCandidate { id, preferred }
    }

    #[test]
    fn test_selects_preferred_candidate() {
        let candidates = [candidate("A", false), candidate("B", true), candidate("C", false)];
        assert_eq!(select_identity(&candidates).unwrap(), MeterIdentity::new("B"));
    }

    #[test]
    fn test_first_preferred_wins() {
        let candidates = [candidate("A", false), candidate("B", true), candidate("C", true)];
        assert_eq!(select_identity(&candidates).unwrap().as_str(), "B");
    }

    #[test]
    fn test_falls_back_to_first_candidate() {
        let candidates = [candidate("A", false), candidate("C", false)];
        assert_eq!(select_identity(&candidates).unwrap().as_str(), "A");
    }

    #[test]
    fn test_empty_list_fails() {
        let candidates: [TestCandidate; 0] = [];
        assert_eq!(
            select_identity(&candidates),
            Err(DiscoveryError("no usable candidate".to_string()))
        );
    }
}
