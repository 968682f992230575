use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tutor_core::variants::CallProfile;

/// Reads every `*.md` file in `dir_path`, keyed by file stem.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let entry = entry?;
        let path = entry.path();

        if path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("md") {
            let prompt_key = path
                .file_stem()
                .and_then(|s| s.to_str())
                .context("Could not get file stem for prompt file")?
                .to_string();

            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

            prompts.insert(prompt_key, content);
        }
    }

    Ok(prompts)
}

/// Swaps in the prompt file for the profile's mode, if there is a non-blank one.
pub fn apply_override(profile: CallProfile, prompts: &HashMap<String, String>) -> CallProfile {
    let key = profile.kind.prompt_key();
    match prompts.get(key).map(|p| p.trim()).filter(|p| !p.is_empty()) {
        Some(instruction) => {
            tracing::info!("Using system instruction override from {}.md", key);
            profile.with_system_instruction(instruction)
        }
        None => profile,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_successfully() -> Result<()> {
        // 1. Arrange: one prompt per mode, plus files that must be skipped.
        let dir = tempdir()?;
        let dir_path = dir.path();

        // `{{field}}` in `writeln!` writes a literal `{field}` placeholder.
        let mut interview = File::create(dir_path.join("interview.md"))?;
        writeln!(interview, "Interview me about {{field}}.")?;

        let mut chat = File::create(dir_path.join("free_chat.md"))?;
        writeln!(chat, "Be a cheerful friend.")?;

        let mut ignored_file = File::create(dir_path.join("config.txt"))?;
        writeln!(ignored_file, "some config")?;

        std::fs::create_dir(dir_path.join("subdir"))?;

        // 2. Act
        let prompts = load_prompts(dir_path)?;

        // 3. Assert
        assert_eq!(prompts.len(), 2, "Should only load .md files");
        assert_eq!(
            prompts.get("interview").unwrap(),
            "Interview me about {field}.\n"
        );
        assert_eq!(prompts.get("free_chat").unwrap(), "Be a cheerful friend.\n");
        assert!(prompts.get("config").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let dir_path = Path::new("nonexistent_dir_for_testing_prompts");

        let result = load_prompts(dir_path);

        assert!(result.is_err());
    }

    #[test]
    fn test_apply_override_matches_mode() {
        let mut prompts = HashMap::new();
        prompts.insert(
            "interview".to_string(),
            "Interview me about {field}.\n".to_string(),
        );
        prompts.insert("coding".to_string(), "   ".to_string());

        let interview = apply_override(CallProfile::interview("chemistry").unwrap(), &prompts);
        assert_eq!(interview.system_instruction, "Interview me about chemistry.");

        // Blank prompt files are ignored.
        let coding = CallProfile::coding("C", "prints primes");
        let expected = coding.system_instruction.clone();
        assert_eq!(apply_override(coding, &prompts).system_instruction, expected);

        let chat = apply_override(CallProfile::free_chat(), &prompts);
        assert_eq!(chat, CallProfile::free_chat());
    }
}
