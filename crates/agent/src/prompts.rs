use std::fs;
use std::path::PathBuf;

/// Built-in system prompts, compiled in so a missing prompt file degrades
/// to a working default instead of failing the agent.
const DEFAULT_MEANING_PROMPT: &str = include_str!("../prompts/meaning.txt");
const DEFAULT_RESEARCHER_PROMPT: &str = include_str!("../prompts/researcher.txt");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PromptName {
    Meaning,
    Researcher,
}

impl PromptName {
    pub fn file_stem(&self) -> &'static str {
        match self {
            Self::Meaning => "meaning",
            Self::Researcher => "researcher",
        }
    }

    fn builtin(&self) -> &'static str {
        match self {
            Self::Meaning => DEFAULT_MEANING_PROMPT,
            Self::Researcher => DEFAULT_RESEARCHER_PROMPT,
        }
    }
}

/// Resolves system prompts from a directory of `<name>.txt` files, falling
/// back to the built-in defaults.
#[derive(Clone, Debug)]
pub struct PromptStore {
    dir: PathBuf,
}

impl PromptStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn system_prompt(&self, name: PromptName) -> String {
        let path = self.dir.join(format!("{}.txt", name.file_stem()));
        match fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => contents,
            _ => name.builtin().to_string(),
        }
    }
}
