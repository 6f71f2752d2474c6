//! System prompts and user-prompt rendering.

use gittime_core::{CommitContext, RepoSnapshot};

/// Most files kept per classified feature.
pub const MAX_FILES_PER_FEATURE: usize = 10;

pub const IDENTIFY_FEATURES_SYSTEM: &str = "\
You are a software architect mapping a GitHub repository into its concrete features. \
You receive the README, the file tree, recent commit headlines and the releases or tags.

List specific capabilities, not broad areas. \"Authentication\" is too broad; \
\"JWT Token Refresh\" or \"Google OAuth2 Login\" is right. \
Split large areas into the individual things a user or developer could point at.

Rules:
1. Ground every feature in the actual files and commit messages you were given.
2. Together the features should cover the whole project.
3. Return between 8 and 25 features depending on the size of the project.
4. For each feature give:
   - name: 2 to 7 words that stand alone
   - description: one paragraph on what it does and how it is built
   - files: up to 10 paths from the file tree that implement it

Respond with a JSON array only, for example:
[
  {
    \"name\": \"CSV Data Export\",
    \"description\": \"Streams filtered dashboard rows to the browser as a CSV download.\",
    \"files\": [\"src/export/csv.ts\", \"src/routes/export.ts\"]
  }
]
";

pub const EVOLUTION_SYSTEM: &str = "\
You are a senior code reviewer. You receive one feature (name and description) and \
one commit that touched the feature's files, with per-file stats and patch excerpts.

Write 2 to 4 sentences explaining how this commit changed the feature. Mention the \
files involved and say whether it was a new capability, a bug fix, a refactor or a \
performance change. Reply with plain prose only: no JSON, no headings, no lists.
";

/// User prompt for feature classification.
pub fn classification_prompt(snapshot: &RepoSnapshot) -> String {
    let mut prompt = String::new();
    if let Some(description) = snapshot.description.as_deref().filter(|d| !d.is_empty()) {
        prompt.push_str(&format!("## Repository\n{} - {}\n\n", snapshot.repo, description));
    }
    prompt.push_str(&format!("## README\n{}\n\n", snapshot.readme_excerpt()));
    prompt.push_str(&format!("## File tree\n{}\n\n", snapshot.tree_listing()));
    prompt.push_str(&format!(
        "## Recent commits (read these carefully for specific features)\n{}\n\n",
        snapshot.commits_summary()
    ));
    prompt.push_str(&format!("## Releases / tags\n{}\n", snapshot.releases_summary()));
    prompt
}

/// User prompt for a single commit summary.
pub fn evolution_prompt(context: &CommitContext) -> String {
    context.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gittime_core::RepoRef;

    #[test]
    fn test_classification_prompt_sections() {
        let snapshot = RepoSnapshot {
            repo: RepoRef::new("acme", "widgets"),
            description: Some("Widget toolkit".into()),
            readme: "# Widgets".into(),
            tree_paths: vec!["src/lib.rs".into()],
            ..Default::default()
        };
        let prompt = classification_prompt(&snapshot);
        assert!(prompt.starts_with("## Repository\nacme/widgets - Widget toolkit"));
        assert!(prompt.contains("## README\n# Widgets"));
        assert!(prompt.contains("## File tree\nsrc/lib.rs"));
        assert!(prompt.contains("No releases or tags found."));
    }
}
