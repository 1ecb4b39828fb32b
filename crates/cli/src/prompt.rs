use rustyline::error::ReadlineError;

use gpudog_core::credentials::Credentials;

/// Ask for the push credentials on the terminal. Blocking; run it off the runtime.
pub fn ask_credentials() -> anyhow::Result<Credentials> {
    let mut editor = rustyline::DefaultEditor::new()?;
    let app_token = read_required(&mut editor, "appToken: ")?;
    let uid = read_required(&mut editor, "uid: ")?;
    Ok(Credentials { app_token, uid })
}

fn read_required(editor: &mut rustyline::DefaultEditor, prompt: &str) -> anyhow::Result<String> {
    loop {
        match editor.readline(prompt) {
            Ok(line) => {
                let value = line.trim();
                if !value.is_empty() {
                    return Ok(value.to_owned());
                }
                eprintln!("value must not be empty");
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => {
                anyhow::bail!("credential input aborted");
            }
            Err(e) => return Err(e.into()),
        }
    }
}
