use serde::{Deserialize, Serialize};

use crate::artifact::OUTPUT_FILE;
use crate::assets::AssetManifest;
use crate::conversation::ConversationTurn;
use crate::library::EditingLibrary;

/// Shown until a description has been generated
pub const DESCRIPTION_PLACEHOLDER: &str = "No description yet.";

/// Everything the planner needs for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub library: EditingLibrary,
    pub user_message: String,
    pub description: String,
    pub assets: AssetManifest,
    pub history: Vec<ConversationTurn>,
}

impl PlanRequest {
    /// Precondition check; the planner turns a violation into its fallback
    pub fn validate(&self) -> Result<(), String> {
        if self.user_message.trim().is_empty() {
            return Err("the request message is empty".to_string());
        }
        if self.assets.main_video().is_none() {
            return Err("no main video has been uploaded".to_string());
        }
        Ok(())
    }

    /// Follow-up request asking for a fix of `code`, same context as `self`.
    /// The fix still has to satisfy `self.user_message`.
    pub fn repair(&self, code: &str, error: &str) -> PlanRequest {
        PlanRequest {
            user_message: repair_message(&self.user_message, code, error),
            ..self.clone()
        }
    }

    pub fn system_prompt(&self) -> String {
        let main_video = self.assets.main_video().unwrap_or_default();
        let asset_names = self
            .assets
            .iter()
            .map(|(name, path)| format!("assets[\"{}\"] = {}", name, path))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "You are a professional Python video editor assistant. \
             You only generate Python code for {library} video editing and descriptive text. \
             Main video description: {description}\n\
             Main video file path: {main_video}\n\
             Available assets (file paths):\n{asset_names}\n\
             Edited Video File Path: {output}\n\n\
             Rules:\n\
             - Always respond in JSON following the exact schema.\n\
             - 'message': Friendly reply to the user in plain text (never include code here).\n\
             - 'editing_code': Only include valid Python editing code when edits are required.\n\
             - 'required_libs': List libraries needed only if editing_code is provided.\n\
             - 'reason': A short 1-2 sentence explanation of why you replied this way.\n\
             - Do not output instructions to run the code; the system runs it automatically.\n\
             - If code is provided, it must be complete and executable.\n\
             - A dict named `assets` is predefined; open inputs with assets[\"<name>\"] (e.g. assets[\"main_video\"]), never with literal paths.\n\
             - Write the edited video to '{output}' in the current directory.\n\
             - Never hallucinate features. If unsure, ask the user for clarification instead of guessing.\n",
            library = self.library,
            description = self.description,
            main_video = main_video,
            asset_names = asset_names,
            output = OUTPUT_FILE,
        )
    }
}

/// User message of a repair request
pub fn repair_message(instruction: &str, code: &str, error: &str) -> String {
    format!(
        "The code written for the request \"{}\" failed with error:\n{}\n\n\
         Here is the broken code:\n{}\n\n\
         Please return corrected code in JSON schema format.",
        instruction, error, code
    )
}
