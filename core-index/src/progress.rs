//! Progress reporting.
//!
//! Long operations report `(phase, (done, total))` through a synchronous
//! callback invoked on whichever task performs the work. Reports are advisory
//! and never affect control flow.

/// Progress callback: `(phase, (done, total))`
pub type Progress<'a> = dyn Fn(&str, (u64, u64)) + Send + Sync + 'a;

/// Listing pages of recently updated remote items
pub const PHASE_UPDATE: &str = "update";

/// Fetching remote tails for fingerprinting
pub const PHASE_HASHES: &str = "hashes";

/// Sending a local file to the remote store
pub const PHASE_UPLOAD: &str = "upload";

pub(crate) fn report(progress: Option<&Progress<'_>>, phase: &str, done: u64, total: u64) {
    if let Some(callback) = progress {
        callback(phase, (done, total));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_callback_may_borrow_local_state() {
        let seen = Mutex::new(Vec::new());
        let callback = |phase: &str, counts: (u64, u64)| {
            seen.lock().unwrap().push((phase.to_string(), counts));
        };

        report(Some(&callback), PHASE_UPDATE, 1, 3);
        report(None, PHASE_UPDATE, 2, 3);
        report(Some(&callback), PHASE_HASHES, 0, 0);

        assert_eq!(
            seen.into_inner().unwrap(),
            vec![
                ("update".to_string(), (1, 3)),
                ("hashes".to_string(), (0, 0)),
            ]
        );
    }
}
