//! Importer command-line assembly
//!
//! The importer is launched through the shell, so the command is built as
//! a single string: an optional environment prefix, the quoted binary,
//! the connection arguments, and a subcommand suffix (`import '<fifo>'`,
//! `n2h <pointer>`, `refresh`). A masked variant hides the password and
//! every environment value for operator display.

use std::collections::BTreeMap;

/// Quote a string for POSIX shell interpolation.
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Everything needed to address the importer binary.
#[derive(Debug, Clone)]
pub struct ImporterCommand {
    pub bin: String,
    pub autoload: String,
    pub portal_class: String,
    pub store_home: String,
    pub username: String,
    pub password: String,
    pub env: BTreeMap<String, String>,
}

impl ImporterCommand {
    /// The real command line for `sh -c`.
    pub fn shell_line(&self, suffix: &str) -> String {
        self.render(suffix, false)
    }

    /// Display variant with secrets replaced by `***`.
    pub fn masked_line(&self, suffix: &str) -> String {
        self.render(suffix, true)
    }

    fn render(&self, suffix: &str, masked: bool) -> String {
        let mut line = String::new();

        for (key, value) in &self.env {
            let rendered = if masked {
                "'***'".to_string()
            } else {
                shell_quote(value)
            };
            line.push_str(&format!("{}={} ", key, rendered));
        }

        let password = if masked { "***" } else { &self.password };

        line.push_str(&format!(
            "{} {} {} -u {} -p {}",
            shell_quote(&self.bin),
            shell_quote(&format!("--autoload={}", self.autoload)),
            shell_quote(&format!(
                "--connection-string=local:{},{}",
                self.portal_class, self.store_home
            )),
            shell_quote(&self.username),
            shell_quote(password),
        ));

        if !suffix.is_empty() {
            line.push(' ');
            line.push_str(suffix);
        }

        line
    }
}
