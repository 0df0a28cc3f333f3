/*!
## Interpreter configuration

Every field has a default so a configuration file only needs to name what
it changes:

```toml
prompt = "> "
shell_escape = false

[limits]
compile_stack = 4096
```
*/

use crate::error;
use crate::lang::Error;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub prompt: String,
    pub continuation_prompt: String,
    pub comment_prefix: char,
    pub shell_prefix: char,
    pub macro_prefix: char,
    pub file_prefix: char,
    pub shell_escape: bool,
    /// Consecutive end-of-input reads on the primary stream before quitting.
    pub eof_limit: usize,
    pub startup: Option<PathBuf>,
    pub log: Option<String>,
    pub limits: Limits,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub compile_stack: usize,
    pub run_stack: usize,
    pub value_stack: usize,
    pub input_depth: usize,
    pub name_length: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            prompt: "cmd> ".to_string(),
            continuation_prompt: "...> ".to_string(),
            comment_prefix: '#',
            shell_prefix: '$',
            macro_prefix: ':',
            file_prefix: '@',
            shell_escape: true,
            eof_limit: 3,
            startup: None,
            log: None,
            limits: Limits::default(),
        }
    }
}

impl Default for Limits {
    fn default() -> Limits {
        Limits {
            compile_stack: 8192,
            run_stack: 256,
            value_stack: 256,
            input_depth: 16,
            name_length: 32,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Config, Error> {
        toml::from_str(text).map_err(|e| error!(SyntaxError; format!("CONFIG: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Config, Error> {
        match std::fs::read_to_string(path) {
            Ok(text) => Config::from_toml(&text),
            Err(e) => Err(error!(FileNotFound; format!("{}: {}", path.display(), e))),
        }
    }

    /// `$HOME/.cmdlang.toml` if it exists, else the defaults.
    pub fn discover() -> Result<Config, Error> {
        if let Some(home) = std::env::var_os("HOME") {
            let path = Path::new(&home).join(".cmdlang.toml");
            if path.is_file() {
                return Config::load(&path);
            }
        }
        Ok(Config::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let c = Config::from_toml("prompt = \"> \"\n[limits]\nrun_stack = 8\n").unwrap();
        assert_eq!(c.prompt, "> ");
        assert_eq!(c.limits.run_stack, 8);
        assert_eq!(c.limits.compile_stack, 8192);
        assert_eq!(c.macro_prefix, ':');
    }

    #[test]
    fn test_bad_file() {
        assert!(Config::from_toml("prompt = [").is_err());
    }
}
