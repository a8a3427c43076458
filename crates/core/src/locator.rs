//! Locates the calibration tool and the legacy scripts next to the executable

use std::path::{Path, PathBuf};

/// Subdirectory of the application directory that may hold the tool
pub const SCRIPTS_DIR: &str = "scripts";

type ExistsFn = Box<dyn Fn(&Path) -> bool>;

/// Resolves file names against an ordered list of candidate directories,
/// returning the first candidate that exists.
pub struct ToolLocator {
    base_dir: PathBuf,
    exists: ExistsFn,
}

impl ToolLocator {
    /// Locator that checks the real filesystem
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self::with_existence_check(base_dir, |p: &Path| p.is_file())
    }

    pub fn with_existence_check(
        base_dir: impl Into<PathBuf>,
        exists: impl Fn(&Path) -> bool + 'static,
    ) -> Self {
        Self {
            base_dir: base_dir.into(),
            exists: Box::new(exists),
        }
    }

    /// Directory of the running executable, falling back to the working directory
    pub fn for_current_exe() -> Self {
        let base_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Candidates for the calibration tool: `scripts/` first, then the app dir
    pub fn tool_candidates(&self, file_name: &str) -> Vec<PathBuf> {
        vec![
            self.base_dir.join(SCRIPTS_DIR).join(file_name),
            self.base_dir.join(file_name),
        ]
    }

    /// Candidates for a fallback script: the app dir first, then `scripts/`
    pub fn script_candidates(&self, file_name: &str) -> Vec<PathBuf> {
        vec![
            self.base_dir.join(file_name),
            self.base_dir.join(SCRIPTS_DIR).join(file_name),
        ]
    }

    pub fn find_tool(&self, file_name: &str) -> Option<PathBuf> {
        self.first_existing(self.tool_candidates(file_name))
    }

    pub fn find_script(&self, file_name: &str) -> Option<PathBuf> {
        self.first_existing(self.script_candidates(file_name))
    }

    /// Stops checking at the first hit
    pub fn first_existing(&self, candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
        candidates.into_iter().find(|p| (self.exists)(p))
    }
}

impl std::fmt::Debug for ToolLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolLocator")
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_tool_prefers_scripts_dir() {
        let locator = ToolLocator::with_existence_check("/app", |_| true);
        assert_eq!(
            locator.find_tool("dispwin.exe"),
            Some(PathBuf::from("/app/scripts/dispwin.exe"))
        );
    }

    #[test]
    fn test_script_prefers_app_dir() {
        let locator = ToolLocator::with_existence_check("/app", |_| true);
        assert_eq!(
            locator.find_script("revert.bat"),
            Some(PathBuf::from("/app/revert.bat"))
        );
    }

    #[test]
    fn test_falls_through_to_second_candidate() {
        let locator = ToolLocator::with_existence_check("/app", |p| p == Path::new("/app/dispwin.exe"));
        assert_eq!(
            locator.find_tool("dispwin.exe"),
            Some(PathBuf::from("/app/dispwin.exe"))
        );
    }

    #[test]
    fn test_nothing_found() {
        let locator = ToolLocator::with_existence_check("/app", |_| false);
        assert_eq!(locator.find_tool("dispwin.exe"), None);
        assert_eq!(locator.find_script("srgb-to-gamma.bat"), None);
    }

    #[test]
    fn test_lookup_is_lazy() {
        let checked = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&checked);
        let locator = ToolLocator::with_existence_check("/app", move |p| {
            log.borrow_mut().push(p.to_path_buf());
            true
        });

        locator.find_tool("dispwin.exe");
        assert_eq!(checked.borrow().len(), 1);
    }

    #[test]
    fn test_real_filesystem_check() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(SCRIPTS_DIR)).unwrap();
        std::fs::write(dir.path().join(SCRIPTS_DIR).join("dispwin.exe"), b"").unwrap();

        let locator = ToolLocator::new(dir.path());
        assert_eq!(
            locator.find_tool("dispwin.exe"),
            Some(dir.path().join(SCRIPTS_DIR).join("dispwin.exe"))
        );
        assert_eq!(locator.find_script("revert.bat"), None);
    }
}
