//! Log file naming.

use std::path::{Path, PathBuf};

use crate::analysis::types::NodeId;

/// Resolves the log file of a node inside a run directory.
///
/// Files are named `log-<scheduler>-<iter>-<id>.txt`, `log-<iter>-<id>.txt`
/// or `log-<id>.txt` depending on which qualifiers a run uses.
#[derive(Debug, Clone)]
pub struct LogNaming {
    pub dir: PathBuf,
    pub scheduler: Option<String>,
    pub iteration: Option<String>,
}

impl LogNaming {
    pub fn new(dir: impl AsRef<Path>, scheduler: Option<String>, iteration: Option<String>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            scheduler,
            iteration,
        }
    }

    pub fn file_name(&self, id: NodeId) -> String {
        match (&self.scheduler, &self.iteration) {
            (Some(s), Some(i)) => format!("log-{}-{}-{}.txt", s, i, id),
            (None, Some(i)) => format!("log-{}-{}.txt", i, id),
            (Some(s), None) => format!("log-{}-{}.txt", s, id),
            (None, None) => format!("log-{}.txt", id),
        }
    }

    pub fn path(&self, id: NodeId) -> PathBuf {
        self.dir.join(self.file_name(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_forms() {
        let full = LogNaming::new("/tmp", Some("alice".into()), Some("3".into()));
        assert_eq!(full.file_name(7), "log-alice-3-7.txt");
        assert_eq!(full.path(7), PathBuf::from("/tmp/log-alice-3-7.txt"));

        let iter_only = LogNaming::new(".", None, Some("3".into()));
        assert_eq!(iter_only.file_name(2), "log-3-2.txt");

        let bare = LogNaming::new(".", None, None);
        assert_eq!(bare.file_name(12), "log-12.txt");
    }
}
