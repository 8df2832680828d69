use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::FuzzError;

/// Reads every `.ink` file under `root`, keyed by `/`-separated relative path.
pub fn read_story_sources(root: &Path) -> Result<BTreeMap<String, String>, FuzzError> {
    let mut sources = BTreeMap::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("ink") {
            continue;
        }

        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let relative = relative.to_string_lossy().replace('\\', "/");

        let content = fs::read_to_string(path).map_err(|source| FuzzError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        sources.insert(relative, content);
    }

    if sources.is_empty() {
        return Err(FuzzError::SourceEmpty {
            path: root.to_path_buf(),
        });
    }

    Ok(sources)
}
