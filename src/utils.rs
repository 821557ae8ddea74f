use std::borrow::Cow;

use rustyline::{
    highlight::Highlighter, history::DefaultHistory, ColorMode, Completer,
    Config, DefaultEditor, Editor, Helper, Hinter, Validator,
};
use secrecy::{ExposeSecret, SecretString};

/// Asks a yes/no question, an empty answer counts as yes.
pub fn prompt_question(
    rl: &mut DefaultEditor,
    question: &str,
) -> anyhow::Result<bool> {
    let response = rl.readline(question)?;
    let response = response.trim().to_lowercase();
    Ok(response.is_empty() || response.starts_with('y'))
}

/// Takes the first non-empty value of `given` and `configured`, asks for it
/// otherwise.
pub fn value_or_prompt(
    rl: &mut DefaultEditor,
    given: Option<&str>,
    configured: Option<&str>,
    what: &str,
    interactive: bool,
) -> anyhow::Result<String> {
    if let Some(value) = given
        .or(configured)
        .filter(|value| !value.trim().is_empty())
    {
        return Ok(value.to_owned());
    }
    if !interactive {
        anyhow::bail!("no {what} given, pass it as option or set it in the config");
    }
    Ok(rl.readline(&format!("{what} > "))?.trim().to_owned())
}

#[derive(Completer, Helper, Hinter, Validator)]
struct Masking;

impl Highlighter for Masking {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        Cow::Owned("*".repeat(line.chars().count()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize) -> bool {
        true
    }
}

/// Reads a line without echoing it.
pub fn prompt_secret(prompt: &str) -> anyhow::Result<SecretString> {
    let config = Config::builder()
        .auto_add_history(false)
        .color_mode(ColorMode::Forced)
        .build();
    let mut rl: Editor<Masking, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(Masking));
    Ok(SecretString::from(rl.readline(prompt)?))
}

/// Reads a secret twice and insists both entries match.
pub fn prompt_secret_confirmed(what: &str) -> anyhow::Result<SecretString> {
    let first = prompt_secret(&format!("{what} > "))?;
    let second = prompt_secret(&format!("Repeat {what} > "))?;
    if first.expose_secret() != second.expose_secret() {
        anyhow::bail!("the two {what} entries don't match");
    }
    Ok(first)
}
