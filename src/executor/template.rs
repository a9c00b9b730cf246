//! Placeholder substitution for tool argument templates.

use std::collections::HashMap;
use std::path::Path;

/// Variables available to a tool's argument list.
///
/// Placeholders use the `{name}` syntax. Unknown placeholders are left as
/// written, and substituted values are never re-scanned, so an upload named
/// `{output}.png` cannot redirect where a tool writes.
///
/// # Example
///
/// ```
/// use convertd::executor::TemplateContext;
/// use std::path::Path;
///
/// let ctx = TemplateContext::new()
///     .with_paths(
///         Path::new("/uploads/scan.png"),
///         Path::new("/converted/scan-1.txt"),
///         Path::new("/converted"),
///     )
///     .with_var("lang", "deu");
///
/// assert_eq!(ctx.substitute("{filestem}.txt"), "scan.txt");
/// assert_eq!(ctx.substitute("-l {lang}"), "-l deu");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    vars: HashMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the path-derived variables:
    /// `{input}`, `{output}`, `{output_dir}`, `{filename}`, `{filestem}`,
    /// `{extension}` and `{dirname}` (the last four describe the input).
    pub fn with_paths(mut self, input: &Path, output: &Path, output_dir: &Path) -> Self {
        self.set("input", &input.display().to_string());
        self.set("output", &output.display().to_string());
        self.set("output_dir", &output_dir.display().to_string());

        if let Some(name) = input.file_name() {
            self.set("filename", &name.to_string_lossy());
        }
        if let Some(stem) = input.file_stem() {
            self.set("filestem", &stem.to_string_lossy());
        }
        if let Some(ext) = input.extension() {
            self.set("extension", &ext.to_string_lossy());
        }
        if let Some(parent) = input.parent() {
            self.set("dirname", &parent.display().to_string());
        }

        self
    }

    pub fn with_var(mut self, key: &str, value: &str) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.vars.insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Replace every known `{name}` in `template` in a single pass.
    pub fn substitute(&self, template: &str) -> String {
        let mut result = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            result.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match self.vars.get(key) {
                        Some(value) => result.push_str(value),
                        None => {
                            result.push('{');
                            result.push_str(key);
                            result.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    result.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        result.push_str(rest);
        result
    }

    pub fn substitute_all(&self, templates: &[String]) -> Vec<String> {
        templates.iter().map(|t| self.substitute(t)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn ctx() -> TemplateContext {
        TemplateContext::new().with_paths(
            &PathBuf::from("/uploads/talk.mov"),
            &PathBuf::from("/converted/talk-1.mp4"),
            &PathBuf::from("/converted"),
        )
    }

    #[test]
    fn test_path_variables() {
        let ctx = ctx();
        assert_eq!(ctx.substitute("{input}"), "/uploads/talk.mov");
        assert_eq!(ctx.substitute("{output}"), "/converted/talk-1.mp4");
        assert_eq!(ctx.substitute("{filename}"), "talk.mov");
        assert_eq!(ctx.substitute("{extension}"), "mov");
        assert_eq!(ctx.substitute("{dirname}/{filestem}.srt"), "/uploads/talk.srt");
        assert_eq!(ctx.substitute("{output_dir}/thumb.jpg"), "/converted/thumb.jpg");
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        assert_eq!(ctx().substitute("-vf scale={width}:-2"), "-vf scale={width}:-2");
    }

    #[test]
    fn test_unterminated_brace_kept() {
        assert_eq!(ctx().substitute("{input"), "{input");
        assert_eq!(ctx().substitute("a{"), "a{");
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let ctx = TemplateContext::new()
            .with_var("input", "{output}")
            .with_var("output", "/etc/passwd");
        assert_eq!(ctx.substitute("{input}"), "{output}");
    }

    #[test]
    fn test_substitute_all() {
        let ctx = ctx().with_var("crf", "23");
        let args = vec![
            "-i".to_string(),
            "{input}".to_string(),
            "-crf".to_string(),
            "{crf}".to_string(),
            "{output}".to_string(),
        ];
        assert_eq!(
            ctx.substitute_all(&args),
            vec!["-i", "/uploads/talk.mov", "-crf", "23", "/converted/talk-1.mp4"]
        );
    }
}
