use std::path::{Path, PathBuf, MAIN_SEPARATOR};

use serde_json::json;

use crate::error::{Result, TetherError};

pub const DEFAULT_CLONE_TEMPLATE: &str = "{{ home }}/src/{{ remote_path }}";

/// Renders the deterministic clone location for a remote. The template may
/// reference `home`, `sep`, and `remote_path`.
pub fn render_clone_path(template: &str, home: &Path, remote_path: &str) -> Result<PathBuf> {
    let context = tera::Context::from_serialize(json!({
        "home": home.to_string_lossy(),
        "sep": MAIN_SEPARATOR.to_string(),
        "remote_path": remote_path,
    }))
    .map_err(|err| TetherError::Other(anyhow::Error::new(err)))?;
    let rendered = tera::Tera::one_off(template, &context, false)
        .map_err(|err| TetherError::Other(anyhow::Error::new(err)))?;
    Ok(PathBuf::from(rendered))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use crate::util::template::{render_clone_path, DEFAULT_CLONE_TEMPLATE};

    #[test]
    fn renders_default_template() {
        let path = render_clone_path(
            DEFAULT_CLONE_TEMPLATE,
            Path::new("/home/dev"),
            "github.com/acme/widgets",
        )
        .expect("render clone path");
        assert_eq!(
            path,
            Path::new("/home/dev/src/github.com/acme/widgets").to_path_buf()
        );
    }

    #[test]
    fn renders_custom_template_with_separator() {
        let path = render_clone_path(
            "{{ home }}{{ sep }}clones{{ sep }}{{ remote_path }}",
            Path::new("/home/dev"),
            "gitlab.com/acme/other",
        )
        .expect("render clone path");
        assert_eq!(
            path,
            Path::new("/home/dev/clones/gitlab.com/acme/other").to_path_buf()
        );
    }
}
