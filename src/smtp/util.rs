use rand::{Rng, distributions::Alphanumeric};

use super::types::ProbeConclusion;

/// Random lowercase local part used for catch-all detection.
pub fn random_local_part(len: usize) -> String {
    let length = len.clamp(6, 32);
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect()
}

pub fn confidence_for(conclusion: &ProbeConclusion, catch_all: bool) -> f32 {
    match conclusion {
        ProbeConclusion::Deliverable => 0.95,
        ProbeConclusion::Undeliverable => 0.95,
        ProbeConclusion::Inconclusive(_) if catch_all => 0.7,
        ProbeConclusion::Inconclusive(_) => 0.4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_local_part_is_clamped_and_lowercase() {
        assert_eq!(random_local_part(1).len(), 6);
        assert_eq!(random_local_part(100).len(), 32);
        let part = random_local_part(16);
        assert!(part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn catch_all_raises_inconclusive_confidence() {
        let inconclusive = ProbeConclusion::Inconclusive("catch-all".into());
        assert!(confidence_for(&inconclusive, true) > confidence_for(&inconclusive, false));
    }
}
