//! Progress reporting for source fetches.

use serde::{Deserialize, Serialize};

/// Byte progress of a source fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub downloaded: u64,
    /// Total size from `Content-Length`, when the server sent one
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percentage(&self) -> Option<f64> {
        match self.total {
            Some(total) if total > 0 => {
                Some(((self.downloaded as f64 / total as f64) * 100.0).min(100.0))
            }
            _ => None,
        }
    }
}

/// Callback type for fetch progress updates.
pub type DownloadProgressCallback = Box<dyn Fn(DownloadProgress) + Send + Sync + 'static>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_percentage() {
        let known = DownloadProgress {
            downloaded: 25,
            total: Some(100),
        };
        assert_eq!(known.percentage(), Some(25.0));

        let unknown = DownloadProgress {
            downloaded: 25,
            total: None,
        };
        assert_eq!(unknown.percentage(), None);
    }
}
