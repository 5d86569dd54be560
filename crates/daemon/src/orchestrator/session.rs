use std::path::{Path, PathBuf};

use engine::{
    AssetManifest, ConversationTurn, EditingLibrary, PlanRequest, DESCRIPTION_PLACEHOLDER,
};
use serde::Serialize;

/// State of one editing session. Created empty, mutated only through the
/// methods below; nothing is ever deleted from it.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    library: EditingLibrary,
    assets: AssetManifest,
    history: Vec<ConversationTurn>,
    description: Option<String>,
    current_output: Option<PathBuf>,
    last_code: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Session {
            library: EditingLibrary::default(),
            assets: AssetManifest::new(),
            history: Vec::new(),
            description: None,
            current_output: None,
            last_code: None,
        }
    }

    pub fn library(&self) -> EditingLibrary {
        self.library
    }

    pub fn assets(&self) -> &AssetManifest {
        &self.assets
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    pub fn has_description(&self) -> bool {
        self.description.is_some()
    }

    /// Stored description, or the placeholder until one exists
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or(DESCRIPTION_PLACEHOLDER)
    }

    pub fn current_output(&self) -> Option<&Path> {
        self.current_output.as_deref()
    }

    pub fn last_code(&self) -> Option<&str> {
        self.last_code.as_deref()
    }

    pub fn set_library(&mut self, library: EditingLibrary) {
        self.library = library;
    }

    pub fn add_asset(&mut self, name: impl Into<String>, path: impl Into<String>) {
        self.assets.insert(name, path);
    }

    pub fn append_turn(&mut self, turn: ConversationTurn) {
        self.history.push(turn);
    }

    /// First description wins; later calls are no-ops. Returns whether it was stored.
    pub fn set_description(&mut self, description: String) -> bool {
        if self.description.is_some() {
            return false;
        }
        self.description = Some(description);
        true
    }

    /// The previous output is superseded, not deleted
    pub fn set_current_output(&mut self, path: PathBuf) {
        self.current_output = Some(path);
    }

    pub fn set_last_code(&mut self, code: String) {
        self.last_code = Some(code);
    }

    /// What to show: the latest output if it is still on disk, else the main video
    pub fn preview_path(&self) -> Option<PathBuf> {
        if let Some(output) = &self.current_output {
            if output.exists() {
                return Some(output.clone());
            }
        }
        self.assets.main_video().map(PathBuf::from)
    }

    /// Planning request for `message` against the current state
    pub fn plan_request(&self, message: &str) -> PlanRequest {
        PlanRequest {
            library: self.library,
            user_message: message.to_string(),
            description: self.description().to_string(),
            assets: self.assets.clone(),
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::MAIN_VIDEO;

    #[test]
    fn starts_with_placeholders() {
        let session = Session::new();
        assert_eq!(session.description(), DESCRIPTION_PLACEHOLDER);
        assert!(!session.has_description());
        assert!(session.assets().is_empty());
        assert!(session.history().is_empty());
        assert!(session.current_output().is_none());
        assert!(session.preview_path().is_none());
        assert_eq!(session.library(), EditingLibrary::MoviePy);
    }

    #[test]
    fn description_is_set_once() {
        let mut session = Session::new();
        assert!(session.set_description("first".to_string()));
        assert!(!session.set_description("second".to_string()));
        assert_eq!(session.description(), "first");
    }

    #[test]
    fn preview_prefers_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = Session::new();
        session.add_asset(MAIN_VIDEO, "uploads/main_video.mp4");
        assert_eq!(
            session.preview_path(),
            Some(PathBuf::from("uploads/main_video.mp4"))
        );

        let gone = dir.path().join("output_gone.mp4");
        session.set_current_output(gone);
        assert_eq!(
            session.preview_path(),
            Some(PathBuf::from("uploads/main_video.mp4"))
        );

        let first = dir.path().join("output_1.mp4");
        let second = dir.path().join("output_2.mp4");
        std::fs::write(&first, b"1").unwrap();
        std::fs::write(&second, b"2").unwrap();
        session.set_current_output(first.clone());
        session.set_current_output(second.clone());
        assert_eq!(session.preview_path(), Some(second));
        assert!(first.exists());
    }

    #[test]
    fn plan_request_snapshots_state() {
        let mut session = Session::new();
        session.set_library(EditingLibrary::Movis);
        session.add_asset(MAIN_VIDEO, "uploads/main_video.mp4");
        session.append_turn(ConversationTurn::user("hello"));

        let req = session.plan_request("cut the intro");
        assert_eq!(req.library, EditingLibrary::Movis);
        assert_eq!(req.user_message, "cut the intro");
        assert_eq!(req.description, DESCRIPTION_PLACEHOLDER);
        assert_eq!(req.history.len(), 1);
        assert_eq!(req.assets.main_video(), Some("uploads/main_video.mp4"));
    }
}
