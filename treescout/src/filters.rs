//! Entry classification helpers shared by the search tasks.
//!
//! Content mode only opens files that look like text. Rather than sniffing
//! bytes, the decision is made from the extension alone against an
//! allow-list of text, source and configuration formats; a file with no
//! extension at all (README, Makefile, LICENSE) is assumed to be text.

use std::path::Path;

/// Extensions treated as text when no override is configured
pub const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "cpp", "h", "hpp", "c", "cc", "cxx", "java", "py", "js", "ts", "jsx", "tsx", "html",
    "htm", "css", "xml", "json", "md", "ini", "conf", "cfg", "log", "rs", "toml", "yaml", "yml",
    "go", "rb", "php", "cs", "kt", "swift", "sh", "bash", "zsh", "ps1", "bat", "sql", "csv",
    "tsv", "tex", "rst", "lua", "pl", "r", "scala", "vue", "svelte", "gradle", "cmake", "mk",
    "properties", "env", "gitignore",
];

/// Checks whether content mode should scan a file with this name.
///
/// `overrides` replaces [`TEXT_EXTENSIONS`] entirely when present.
pub fn is_text_file(path: &Path, overrides: Option<&[String]>) -> bool {
    let Some(ext) = path.extension() else {
        return true;
    };
    let Some(ext_str) = ext.to_str() else {
        return false;
    };

    match overrides {
        Some(exts) => exts.iter().any(|e| e.eq_ignore_ascii_case(ext_str)),
        None => TEXT_EXTENSIONS
            .iter()
            .any(|&text_ext| text_ext.eq_ignore_ascii_case(ext_str)),
    }
}

/// Coarse type label shown next to a result
pub fn file_type_label(path: &Path, is_dir: bool, is_symlink: bool) -> String {
    if is_symlink {
        return "Shortcut".to_string();
    }
    if is_dir {
        return "Folder".to_string();
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{} File", ext.to_uppercase()),
        _ => "File".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_text_file() {
        assert!(is_text_file(Path::new("notes.txt"), None));
        assert!(is_text_file(Path::new("main.RS"), None)); // Test case insensitivity
        assert!(is_text_file(Path::new("Makefile"), None)); // No extension
        assert!(!is_text_file(Path::new("photo.png"), None));
        assert!(!is_text_file(Path::new("archive.tar.gz"), None));
    }

    #[test]
    fn test_is_text_file_with_overrides() {
        let exts = vec!["dat".to_string()];
        assert!(is_text_file(Path::new("table.DAT"), Some(&exts)));
        assert!(!is_text_file(Path::new("notes.txt"), Some(&exts)));
        assert!(is_text_file(Path::new("README"), Some(&exts)));
    }

    #[test]
    fn test_file_type_label() {
        assert_eq!(file_type_label(Path::new("a/src"), true, false), "Folder");
        assert_eq!(file_type_label(Path::new("link"), false, true), "Shortcut");
        assert_eq!(file_type_label(Path::new("lib.rs"), false, false), "RS File");
        assert_eq!(file_type_label(Path::new("LICENSE"), false, false), "File");
        assert_eq!(file_type_label(Path::new("x.tar.gz"), false, false), "GZ File");
    }
}
